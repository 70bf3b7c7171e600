use anyhow::Result;
use bruce_wifi_core::{dispatch_command, open_stream, resolve_root, Cli, OutputFormat, ToolConfig};
use clap::Parser;
use serde_json::{json, Value};

fn main() {
    let cli = Cli::parse();
    let format = cli.output_format;
    if let Err(err) = run(cli) {
        emit_error(format, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = resolve_root(cli.root)?;
    let log_cfg = bruce_wifi_logging::fs::read_config(&root);
    let _guards = bruce_wifi_logging::init("bruce-wifi", &root, &log_cfg)?;
    if let Err(err) = bruce_wifi_logging::run_retention(&root, &log_cfg) {
        tracing::warn!("log retention failed: {err:#}");
    }

    let config = ToolConfig::from_env();
    let stream = open_stream(&cli.stream)?;
    let (message, data) = dispatch_command(&root, &config, cli.command, stream)?;
    emit_success(cli.output_format, message, data)
}

// stdout may be carrying the record stream, so every summary goes to stderr

fn emit_success(format: OutputFormat, message: String, data: Value) -> Result<()> {
    let payload = json!({
        "status": "ok",
        "message": message,
        "data": data,
    });

    match format {
        OutputFormat::Json => eprintln!("{payload}"),
        OutputFormat::Text => {
            eprintln!("{}", payload["message"].as_str().unwrap_or_default());
            if !payload["data"].is_null() {
                eprintln!("{}", serde_json::to_string_pretty(&payload["data"])?);
            }
        }
    }
    Ok(())
}

fn emit_error(format: OutputFormat, err: &anyhow::Error) {
    let details: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    match format {
        OutputFormat::Json => eprintln!(
            "{}",
            json!({
                "status": "error",
                "message": err.to_string(),
                "details": details,
                "data": Value::Null,
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
