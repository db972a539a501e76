use std::path::PathBuf;

/// Every way a run can fail. None of these are retried; each one aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("source unavailable ({path}): {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sink unavailable ({target}): {source}")]
    SinkUnavailable {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn malformed(line: u64, reason: impl std::fmt::Display) -> Self {
        Error::MalformedRecord { line, reason: reason.to_string() }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = Error::malformed(7, "missing field `duration`");
        assert_eq!(e.to_string(), "malformed record at line 7: missing field `duration`");

        let e = Error::SourceUnavailable {
            path: PathBuf::from("/nope/events.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(e.to_string().starts_with("source unavailable (/nope/events.json)"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
