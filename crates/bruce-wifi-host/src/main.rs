use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{Context, Result};
use bruce_wifi_host::{consume, serial, CaptureStore, Cli, OutputFormat, SessionReport};
use clap::Parser;
use serde_json::json;

fn main() {
    let cli = Cli::parse();
    let format = cli.output_format;
    if let Err(err) = run(cli) {
        emit_error(format, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = cli.root.clone().unwrap_or_else(|| cli.output_dir.clone());
    let log_cfg = bruce_wifi_logging::fs::read_config(&root);
    let _guards = bruce_wifi_logging::init("bruce-wifi-host", &root, &log_cfg)?;
    if let Err(err) = bruce_wifi_logging::run_retention(&root, &log_cfg) {
        tracing::warn!("log retention failed: {err:#}");
    }

    let input = open_input(&cli)?;
    let mut store = CaptureStore::open(&cli.output_dir)?;
    let report = consume(input, &mut store)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    emit_report(cli.output_format, &store, &report)
}

fn open_input(cli: &Cli) -> Result<Box<dyn BufRead>> {
    if cli.input.as_os_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = if serial::is_tty(&cli.input) {
        serial::open_serial(&cli.input, cli.baud)?
    } else {
        File::open(&cli.input).with_context(|| format!("opening {}", cli.input.display()))?
    };
    Ok(Box::new(BufReader::new(file)))
}

fn emit_report(format: OutputFormat, store: &CaptureStore, report: &SessionReport) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let payload = json!({
                "status": "ok",
                "message": "stream finished",
                "data": {
                    "output_dir": store.dir(),
                    "report": report,
                },
            });
            println!("{payload}");
        }
        OutputFormat::Text => {
            let s = &report.store;
            println!("Output directory: {}", store.dir().display());
            println!(
                "Networks: {}  PMKIDs: {}  Handshakes: {}  Raw packets: {}",
                s.networks, s.pmkids, s.handshakes, s.raw_packets
            );
            if report.stream_errors > 0 || s.rejected_records > 0 {
                println!(
                    "Skipped: {} malformed stream entries, {} unusable records",
                    report.stream_errors, s.rejected_records
                );
            }
            match &report.suggested_command {
                Some(cmd) => println!("Crack with: {cmd}"),
                None => println!("Nothing crackable captured"),
            }
        }
    }
    Ok(())
}

fn emit_error(format: OutputFormat, err: &anyhow::Error) {
    let details: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "status": "error",
                "message": err.to_string(),
                "details": details,
            })
        ),
        OutputFormat::Text => {
            eprintln!("Error: {err}");
            for detail in details.iter().skip(1) {
                eprintln!("  -> {detail}");
            }
        }
    }
}
