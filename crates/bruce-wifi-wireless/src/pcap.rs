//! Classic libpcap file reading and writing
//!
//! The writer always produces little-endian microsecond files. The reader
//! accepts both byte orders and the nanosecond variant.

use std::io::{self, Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Result, WirelessError};

const PCAP_MAGIC: u32 = 0xa1b2c3d4;
const PCAP_MAGIC_NANO: u32 = 0xa1b23c4d;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_SNAPLEN: u32 = 65535;
const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

/// Bare 802.11 frames
pub const LINKTYPE_IEEE802_11: u32 = 105;

/// 802.11 frames behind a radiotap header
pub const LINKTYPE_IEEE802_11_RADIOTAP: u32 = 127;

pub struct PcapWriter<W: Write> {
    w: W,
    linktype: u32,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(mut w: W, linktype: u32) -> io::Result<Self> {
        write_global_header(&mut w, linktype)?;
        Ok(Self { w, linktype })
    }

    pub fn linktype(&self) -> u32 {
        self.linktype
    }

    pub fn write_packet(&mut self, ts: SystemTime, data: &[u8]) -> io::Result<()> {
        let (sec, usec) = system_time_to_sec_usec(ts);
        write_record_header(&mut self.w, sec, usec, data.len() as u32)?;
        self.w.write_all(data)?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

fn write_global_header<W: Write>(w: &mut W, linktype: u32) -> io::Result<()> {
    w.write_all(&PCAP_MAGIC.to_le_bytes())?;
    w.write_all(&PCAP_VERSION_MAJOR.to_le_bytes())?;
    w.write_all(&PCAP_VERSION_MINOR.to_le_bytes())?;
    w.write_all(&0i32.to_le_bytes())?; // thiszone
    w.write_all(&0u32.to_le_bytes())?; // sigfigs
    w.write_all(&PCAP_SNAPLEN.to_le_bytes())?;
    w.write_all(&linktype.to_le_bytes())?;
    Ok(())
}

fn write_record_header<W: Write>(w: &mut W, sec: u32, usec: u32, len: u32) -> io::Result<()> {
    w.write_all(&sec.to_le_bytes())?;
    w.write_all(&usec.to_le_bytes())?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&len.to_le_bytes())?;
    Ok(())
}

fn system_time_to_sec_usec(ts: SystemTime) -> (u32, u32) {
    let dur = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    let sec = dur.as_secs().min(u32::MAX as u64) as u32;
    (sec, dur.subsec_micros())
}

#[derive(Debug, Clone, Copy)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Self::Little => LittleEndian::read_u32(buf),
            Self::Big => BigEndian::read_u32(buf),
        }
    }
}

/// One captured packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcapPacket {
    pub timestamp: SystemTime,
    pub data: Vec<u8>,
}

pub struct PcapReader<R: Read> {
    r: R,
    endian: Endian,
    nanos: bool,
    linktype: u32,
}

impl<R: Read> PcapReader<R> {
    pub fn new(mut r: R) -> Result<Self> {
        let mut header = [0u8; GLOBAL_HEADER_LEN];
        r.read_exact(&mut header)
            .map_err(|e| WirelessError::Pcap(format!("missing global header: {}", e)))?;

        let (endian, nanos) = match (
            LittleEndian::read_u32(&header[0..4]),
            BigEndian::read_u32(&header[0..4]),
        ) {
            (PCAP_MAGIC, _) => (Endian::Little, false),
            (PCAP_MAGIC_NANO, _) => (Endian::Little, true),
            (_, PCAP_MAGIC) => (Endian::Big, false),
            (_, PCAP_MAGIC_NANO) => (Endian::Big, true),
            (magic, _) => {
                return Err(WirelessError::Pcap(format!(
                    "unknown magic {:#010x}",
                    magic
                )))
            }
        };

        let linktype = endian.u32(&header[20..24]);
        Ok(Self {
            r,
            endian,
            nanos,
            linktype,
        })
    }

    pub fn linktype(&self) -> u32 {
        self.linktype
    }

    /// Next packet, or `None` at a clean end of file
    pub fn next_packet(&mut self) -> Result<Option<PcapPacket>> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        let mut filled = 0;
        while filled < RECORD_HEADER_LEN {
            let n = self.r.read(&mut header[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(WirelessError::Pcap("truncated record header".into()));
            }
            filled += n;
        }

        let sec = self.endian.u32(&header[0..4]);
        let frac = self.endian.u32(&header[4..8]);
        let incl_len = self.endian.u32(&header[8..12]);
        if incl_len > PCAP_SNAPLEN * 4 {
            return Err(WirelessError::Pcap(format!(
                "record length {} is implausible",
                incl_len
            )));
        }

        let mut data = vec![0u8; incl_len as usize];
        self.r
            .read_exact(&mut data)
            .map_err(|e| WirelessError::Pcap(format!("truncated record: {}", e)))?;

        let frac = if self.nanos {
            Duration::from_nanos(frac as u64)
        } else {
            Duration::from_micros(frac as u64)
        };
        let timestamp = UNIX_EPOCH + Duration::from_secs(sec as u64) + frac;
        Ok(Some(PcapPacket { timestamp, data }))
    }
}

impl<R: Read> Iterator for PcapReader<R> {
    type Item = Result<PcapPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcap_header_and_record() {
        let mut writer = PcapWriter::new(Vec::new(), LINKTYPE_IEEE802_11).unwrap();
        let packet = vec![0x01, 0x02, 0x03, 0x04];
        let ts = UNIX_EPOCH + Duration::from_secs(1) + Duration::from_micros(2);
        writer.write_packet(ts, &packet).unwrap();

        let buf = writer.into_inner();
        assert_eq!(buf.len(), 24 + 16 + packet.len());

        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        assert_eq!(magic, PCAP_MAGIC);
        let linktype = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        assert_eq!(linktype, LINKTYPE_IEEE802_11);

        let incl_len = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        let orig_len = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        assert_eq!(incl_len, packet.len() as u32);
        assert_eq!(orig_len, packet.len() as u32);
    }

    #[test]
    fn test_reader_reads_back_writer_output() {
        let mut writer = PcapWriter::new(Vec::new(), LINKTYPE_IEEE802_11_RADIOTAP).unwrap();
        let ts = UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_micros(250);
        writer.write_packet(ts, &[0xAA; 30]).unwrap();
        writer.write_packet(ts, &[0xBB; 2]).unwrap();
        let buf = writer.into_inner();

        let mut reader = PcapReader::new(buf.as_slice()).unwrap();
        assert_eq!(reader.linktype(), LINKTYPE_IEEE802_11_RADIOTAP);
        let first = reader.next_packet().unwrap().unwrap();
        assert_eq!(first.data, vec![0xAA; 30]);
        assert_eq!(first.timestamp, ts);
        let rest: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].data, vec![0xBB; 2]);
    }

    #[test]
    fn test_reader_big_endian_nanos() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PCAP_MAGIC_NANO.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&PCAP_SNAPLEN.to_be_bytes());
        buf.extend_from_slice(&LINKTYPE_IEEE802_11.to_be_bytes());
        buf.extend_from_slice(&5u32.to_be_bytes());
        buf.extend_from_slice(&1_000u32.to_be_bytes());
        buf.extend_from_slice(&3u32.to_be_bytes());
        buf.extend_from_slice(&3u32.to_be_bytes());
        buf.extend_from_slice(&[1, 2, 3]);

        let mut reader = PcapReader::new(buf.as_slice()).unwrap();
        assert_eq!(reader.linktype(), LINKTYPE_IEEE802_11);
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.data, vec![1, 2, 3]);
        assert_eq!(
            packet.timestamp,
            UNIX_EPOCH + Duration::from_secs(5) + Duration::from_nanos(1_000)
        );
        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_reader_rejects_garbage_and_truncation() {
        assert!(PcapReader::new(&[0u8; 24][..]).is_err());

        let mut writer = PcapWriter::new(Vec::new(), LINKTYPE_IEEE802_11).unwrap();
        writer.write_packet(UNIX_EPOCH, &[0xCC; 10]).unwrap();
        let mut buf = writer.into_inner();
        buf.truncate(buf.len() - 3);
        let mut reader = PcapReader::new(buf.as_slice()).unwrap();
        assert!(reader.next_packet().is_err());
    }
}
