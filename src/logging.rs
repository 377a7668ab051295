//! Logger initialisation and the fatal level
//!
//! Kanso logs through the `log` facade with `env_logger` as the backend.
//! `RUST_LOG` still wins over the default filter chosen on the command line.
//!
//! `log` has no level above `error`, so unrecoverable conditions are logged
//! with [`fatal!`]: an `error` record on the [`FATAL_TARGET`] target, which
//! the formatter prints as `FATAL`. The macro only logs; the caller still
//! propagates the error.

use env_logger::{Builder, Env};
use log::{Level, Record};
use std::io::Write;

/// Target of records emitted by [`fatal!`].
pub const FATAL_TARGET: &str = "kanso::fatal";

/// Verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Normal,
    Debug,
    Trace,
}

impl Verbosity {
    pub fn from_flags(debug: bool, trace: bool) -> Self {
        if trace {
            Verbosity::Trace
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default `env_logger` filter for this verbosity.
    pub fn default_filter(&self) -> &'static str {
        match self {
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// Level tag printed in front of a record.
pub fn level_tag(record: &Record) -> &'static str {
    if record.target() == FATAL_TARGET {
        return "FATAL";
    }
    match record.level() {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn builder(verbosity: Verbosity) -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or(verbosity.default_filter()));
    builder.format(|buf, record| writeln!(buf, "{}: {}", level_tag(record), record.args()));
    builder
}

/// Installs the global logger. Later calls are ignored.
pub fn init(verbosity: Verbosity) {
    // A second install only happens in tests.
    let _ = builder(verbosity).try_init();
}

/// Logs an unrecoverable condition. Takes `format!` arguments.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {
        ::log::error!(target: $crate::logging::FATAL_TARGET, $($arg)+)
    };
}
