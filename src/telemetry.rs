use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// JSON trace file used by `--logs`.
pub fn tracing_log_path() -> PathBuf {
    env::var("BARKMETER_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("barkmeter_trace.jsonl"))
}

fn max_level(config: &AppConfig) -> LevelFilter {
    if config.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber once. `--no-logs` installs nothing.
pub fn init_tracing(config: &AppConfig) {
    if config.no_logs {
        return;
    }
    let level = max_level(config);
    let to_file = config.logs;

    let _ = TRACING_INIT.get_or_init(|| {
        if to_file {
            let path = tracing_log_path();
            if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
                let subscriber = tracing_subscriber::fmt()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .with_max_level(level)
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false)
                    .finish();
                let _ = tracing::subscriber::set_global_default(subscriber);
                return;
            }
        }
        let subscriber = tracing_subscriber::fmt()
            .with_timer(UtcTime::rfc_3339())
            .with_max_level(level)
            .with_target(false)
            .with_writer(io::stderr)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
