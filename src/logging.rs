//! Logger installation for the wrapper binary.
use std::{fs::File, path::Path};

use env_logger::{Builder, Env, Target};

use crate::{Error, LoggerType, Result};

/// Default log file for [`LoggerType::Filesystem`].
pub const LOG_FILE: &str = "wrapper.log";

/// Install the global logger. The filter defaults to `info` and can be overridden with `RUST_LOG`.
///
/// # Errors
///
/// Fails if the log file cannot be created or a logger is already installed.
pub fn init(logger: LoggerType) -> Result<()> {
    init_with_file(logger, LOG_FILE)
}

/// Like [`init()`] but writes [`LoggerType::Filesystem`] output to `path`.
pub fn init_with_file(logger: LoggerType, path: impl AsRef<Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if logger == LoggerType::Filesystem {
        let file = File::create(path)?;
        builder.target(Target::Pipe(Box::new(file))).write_style(env_logger::WriteStyle::Never);
    }
    builder
        .try_init()
        .map_err(|err| Error::Config(err.to_string()))
}
