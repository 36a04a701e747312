use log::{LevelFilter, Metadata, Record};
use std::sync::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use chrono::Local;

/// Append-only file logger used when `[logging] file` is configured.
pub struct Logger {
    file: Mutex<std::fs::File>,
    level: LevelFilter,
}

impl Logger {
    pub fn new(log_file: &str, level: LevelFilter) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;

        Ok(Self {
            file: Mutex::new(file),
            level,
        })
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(mut file) = self.file.lock() {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            // A failed write has nowhere better to go.
            let _ = writeln!(
                file,
                "{} [{}] {}: {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Installs the file logger when a path is given, `env_logger` otherwise.
pub fn init(log_file: Option<&str>, debug: bool) -> anyhow::Result<()> {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };

    match log_file {
        Some(path) => {
            let logger = Logger::new(path, level)?;
            log::set_boxed_logger(Box::new(logger))?;
            log::set_max_level(level);
        }
        None => {
            let mut builder = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("info"),
            );
            if debug {
                builder.filter_level(level);
            }
            builder.try_init()?;
        }
    }
    Ok(())
}
