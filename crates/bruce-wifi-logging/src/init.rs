use std::path::Path;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::targets::SUBSYSTEMS;

/// Set for child processes when logging is switched off
pub const ENV_LOGS_DISABLED: &str = "BRUCE_WIFI_LOGS_DISABLED";

static RELOAD: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

/// Keeps the non-blocking file writers alive; drop at process exit to flush.
pub struct LoggingGuards {
    _file_guards: Vec<WorkerGuard>,
}

/// Console goes to stderr: stdout may be carrying the record stream.
fn console_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .compact()
}

/// Stderr-only logging with a reloadable filter.
pub fn init_console(cfg: &LoggingConfig) -> LoggingGuards {
    let (filter_layer, handle) = reload::Layer::new(build_filter(cfg));
    let _ = RELOAD.set(handle);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(ErrorLayer::default())
        .with(console_layer())
        .try_init()
        .ok();
    let _ = LogTracer::init();
    apply_env(cfg);

    LoggingGuards {
        _file_guards: Vec::new(),
    }
}

pub fn init(component: &str, root: &Path, cfg: &LoggingConfig) -> Result<LoggingGuards> {
    if !cfg.file_logging {
        return Ok(init_console(cfg));
    }

    let log_dir = root.join("logs");
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        let guards = init_console(cfg);
        tracing::warn!("File logging disabled ({}): {}", log_dir.display(), err);
        return Ok(guards);
    }

    let (filter_layer, handle) = reload::Layer::new(build_filter(cfg));
    let _ = RELOAD.set(handle);

    let mut guards = Vec::new();

    let component_appender =
        tracing_appender::rolling::daily(&log_dir, component_log_name(component));
    let (component_writer, component_guard) = tracing_appender::non_blocking(component_appender);
    let component_layer = file_layer(component_writer).with_filter(component_targets());
    guards.push(component_guard);

    let mut subsystem_layers = Vec::with_capacity(SUBSYSTEMS.len());
    for (target, filename) in SUBSYSTEMS {
        let (layer, guard) = subsystem_layer(&log_dir, filename, target);
        subsystem_layers.push(layer);
        guards.push(guard);
    }

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(ErrorLayer::default())
        .with(console_layer())
        .with(component_layer)
        .with(subsystem_layers)
        .try_init()
        .ok();
    let _ = LogTracer::init();
    apply_env(cfg);

    Ok(LoggingGuards {
        _file_guards: guards,
    })
}

/// Swap the active filter for one built from `cfg`.
pub fn apply(cfg: &LoggingConfig) -> Result<()> {
    let handle = RELOAD
        .get()
        .ok_or_else(|| anyhow::anyhow!("logging not initialized"))?;
    handle.reload(build_filter(cfg))?;
    apply_env(cfg);
    Ok(())
}

pub fn apply_env(cfg: &LoggingConfig) {
    if cfg.enabled {
        std::env::remove_var(ENV_LOGS_DISABLED);
    } else {
        std::env::set_var(ENV_LOGS_DISABLED, "1");
    }
}

fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    if !cfg.enabled {
        return EnvFilter::new("off");
    }
    EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn component_log_name(component: &str) -> String {
    if component.ends_with(".log") {
        component.to_string()
    } else {
        format!("{component}.log")
    }
}

fn component_targets() -> Targets {
    SUBSYSTEMS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::TRACE), |targets, (target, _)| {
            targets.with_target(*target, LevelFilter::OFF)
        })
}

fn file_layer<S, W>(writer: W) -> fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format<fmt::format::Compact>, W>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_writer(writer)
}

fn subsystem_layer<S>(
    log_dir: &Path,
    filename: &str,
    target: &'static str,
) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    let appender = tracing_appender::rolling::daily(log_dir, filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = file_layer(writer)
        .with_filter(Targets::new().with_target(target, LevelFilter::TRACE))
        .boxed();
    (layer, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_log_name() {
        assert_eq!(component_log_name("bruce-wifi"), "bruce-wifi.log");
        assert_eq!(component_log_name("host.log"), "host.log");
    }

    #[test]
    fn test_subsystems_excluded_from_component_log() {
        let targets = component_targets();
        for (target, _) in SUBSYSTEMS {
            assert!(!targets.would_enable(target, &tracing::Level::ERROR));
        }
        assert!(targets.would_enable("bruce_wifi_core", &tracing::Level::INFO));
    }

    #[test]
    fn test_apply_env_tracks_enabled() {
        apply_env(&LoggingConfig {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(std::env::var(ENV_LOGS_DISABLED).as_deref(), Ok("1"));
        apply_env(&LoggingConfig::default());
        assert!(std::env::var(ENV_LOGS_DISABLED).is_err());
    }
}
