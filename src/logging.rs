//! `tracing` subscriber setup.
//!
//! Output goes to stderr unless `RAMBLE_LOG_FILE` names a file. The filter
//! comes from `RAMBLE_LOG` and defaults to `warn`.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

const DEFAULT_FILTER: &str = "warn";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Installs the global subscriber described by `env`.
pub fn init_logging(env: &EnvConfig) -> Result<(), LoggingError> {
    let filter = build_filter(env.log_filter.as_deref())?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &env.log_file {
        Some(path) => {
            let path = PathBuf::from(path);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| LoggingError::File { path, source })?;
            builder
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .try_init()
        }
        None => builder
            .with_writer(io::stderr)
            .with_ansi(!env.no_color)
            .try_init(),
    };

    installed.map_err(|_| LoggingError::AlreadyInitialized)
}

fn build_filter(directives: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let directives = directives.unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directives).map_err(|source| LoggingError::Filter {
        filter: directives.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_defaults_to_warn() {
        let filter = build_filter(None).expect("default filter parses");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn custom_filter_directives_are_accepted() {
        let filter = build_filter(Some("ramble=debug,openai_api=trace")).expect("valid directives");
        let rendered = filter.to_string();
        assert!(rendered.contains("ramble=debug"));
        assert!(rendered.contains("openai_api=trace"));
    }

    #[test]
    fn malformed_filter_is_reported() {
        let error = build_filter(Some("ramble=notalevel")).expect_err("bad level");
        assert!(error.to_string().contains("ramble=notalevel"));
    }

    #[test]
    fn unopenable_log_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = EnvConfig {
            log_file: Some(dir.path().join("missing").join("ramble.log").display().to_string()),
            ..EnvConfig::default()
        };

        let error = init_logging(&env).expect_err("parent directory does not exist");
        assert!(matches!(error, LoggingError::File { .. }));
    }
}
