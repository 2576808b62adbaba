use std::{fs, path::Path, sync::OnceLock};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::*;
pub use writer::*;

use crate::configs::LoggingConfig;

static FILE_WRITER: OnceLock<CappedFileWriter> = OnceLock::new();

/// `println!` that also lands in the log file once logging is set up. Used
/// for startup output printed before (or outside) the tracing subscriber.
#[macro_export]
macro_rules! log_println {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        std::println!("{}", msg);
        $crate::common::logger::append_to_file_raw(&format!("{}\n", msg));
    }};
}

pub fn append_to_file_raw(msg: &str) {
    if let Some(mut writer) = FILE_WRITER.get().cloned() {
        use std::io::Write;
        let _ = writer.write_all(strip_ansi_escapes(msg).as_bytes());
    }
}

/// Builds the filter directive: configured level, chatty dependencies
/// pinned to `warn`, then user supplied filters.
fn filter_directive(config: &LoggingConfig) -> String {
    let mut directive = format!(
        "{},hyper=warn,reqwest=warn,tungstenite=warn,tokio_tungstenite=warn",
        config.level
    );
    if let Some(extra) = config.filters.as_deref().filter(|f| !f.is_empty()) {
        directive.push(',');
        directive.push_str(extra);
    }
    directive
}

pub fn init(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let stdout_layer = fmt::layer()
        .event_format(LineFormatter::new(true))
        .with_ansi(true);

    let file_layer = config.file.as_ref().map(|file_config| {
        if let Some(parent) = Path::new(&file_config.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {}", e);
            }
        }

        let writer = CappedFileWriter::new(&file_config.path, file_config.max_lines);
        let _ = FILE_WRITER.set(writer.clone());
        fmt::layer()
            .with_writer(writer)
            .event_format(LineFormatter::new(false))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
