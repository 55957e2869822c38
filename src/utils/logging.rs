use env_logger::{Builder, Target};
use log::{Level, LevelFilter, SetLoggerError};
use std::env;
use std::io::Write;

pub fn init_logging() -> Result<(), SetLoggerError> {
    let log_level = parse_level(&env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));

    let mut builder = Builder::from_default_env();

    builder.format(|buf, record| {
        let timestamp = buf.timestamp();
        let target = record.target();

        match record.level() {
            Level::Info => writeln!(buf, "{} [INFO] [{}]: {}", timestamp, target, record.args()),
            level => writeln!(
                buf,
                "{} [{}] [{}:{}] {}: {}",
                timestamp,
                level,
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                target,
                record.args()
            ),
        }
    });

    // Filter out noisy modules in production
    if env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production" {
        builder.filter_module("reqwest", LevelFilter::Warn);
        builder.filter_module("hyper", LevelFilter::Warn);
        builder.filter_module("tokio", LevelFilter::Info);
        builder.filter_module("sqlx", LevelFilter::Warn);
        builder.filter_module("axum", LevelFilter::Warn);
    }

    builder.filter_level(log_level).target(Target::Stdout).try_init()
}

fn parse_level(value: &str) -> LevelFilter {
    match value.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

pub fn log_error_with_context(error: &anyhow::Error, context: &str) {
    log::error!("[{}] {}", context, error);

    for cause in error.chain().skip(1) {
        log::error!("  Caused by: {}", cause);
    }
}

pub fn log_provider_error(operation: &str, call_id: &str, error: &dyn std::fmt::Display) {
    log::warn!("[Provider] {} for call '{}' failed: {}", operation, call_id, error);
}

pub fn log_reconcile_batch(listing: &str, total: usize, updated: usize, failed: usize, duration_ms: u64) {
    log::info!(
        "[Reconcile] {} listing: {} meetings, {} updated, {} failed in {}ms",
        listing,
        total,
        updated,
        failed,
        duration_ms
    );
}

pub fn log_database_operation(operation: &str, table: &str, duration_ms: u64) {
    log::debug!("[Database] {} on table {} took {}ms", operation, table, duration_ms);
}

pub fn log_http_request(method: &str, path: &str, status: u16, duration_ms: u64) {
    if status >= 500 {
        log::warn!("[HTTP] {} {} -> {} in {}ms", method, path, status, duration_ms);
    } else {
        log::info!("[HTTP] {} {} -> {} in {}ms", method, path, status, duration_ms);
    }
}

pub fn log_auth_event(event: &str, external_id: &str) {
    log::info!("[Auth] {} for user '{}'", event, external_id);
}
