use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{filter, fmt, EnvFilter};

/// Target of the audit events written to `<data_dir>/logs/audit.log`.
pub const AUDIT_TARGET: &str = "ledger";

/// Installs the global subscriber: human readable output on stdout and
/// `ledger` events in the audit file. Keep the guard alive for the lifetime
/// of the process or buffered audit lines are lost.
pub fn init_tracing(data_dir: &Path, default_filter: &str) -> std::io::Result<WorkerGuard> {
    let logs_dir = data_dir.join("logs");
    std::fs::create_dir_all(&logs_dir)?;

    let file_appender = tracing_appender::rolling::never(logs_dir, "audit.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let audit_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|metadata| metadata.target() == AUDIT_TARGET));

    let default_filter = default_filter.to_string();
    let stdout_layer = fmt::layer()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_filter(filter::filter_fn(|metadata| metadata.target() != AUDIT_TARGET));

    tracing_subscriber::registry()
        .with(audit_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}

/// Reports panics on stderr and in `<data_dir>/panic.log`.
pub fn install_panic_hook(data_dir: &Path) {
    let panic_log = data_dir.join("panic.log");
    std::panic::set_hook(Box::new(move |info| {
        let msg = match info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<Any>",
            },
        };
        let location = match info.location() {
            Some(l) => format!("at {}:{}:{}", l.file(), l.line(), l.column()),
            None => "unknown location".to_string(),
        };
        let err_msg = format!("CRASH: {} {}\n", msg, location);
        eprintln!("{}", err_msg);
        let _ = std::fs::write(&panic_log, err_msg);
    }));
}
