use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Error, Result};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// One JSON object per line.
    #[default]
    Jsonl,
    /// Header row followed by one record per line.
    Csv,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: InputFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WindowConfig {
    /// Trailing span in minutes. Signed so a bad value reaches `validate` instead of the parser.
    pub size_minutes: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    File,
    Stdout,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
    /// Output file; defaults to `output_<size_minutes>.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JobConfig {
    pub source: SourceConfig,
    pub window: WindowConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

impl JobConfig {
    pub fn new(path: impl Into<PathBuf>, size_minutes: i64) -> Self {
        Self {
            source: SourceConfig { path: path.into(), format: InputFormat::default() },
            window: WindowConfig { size_minutes },
            sink: SinkConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.path.as_os_str().is_empty() {
            return Err(Error::invalid_config("source.path must be set"));
        }
        if self.window.size_minutes <= 0 {
            return Err(Error::invalid_config(format!(
                "window size must be a positive number of minutes, got {}",
                self.window.size_minutes
            )));
        }
        if self.sink.kind == SinkKind::Stdout && self.sink.path.is_some() {
            return Err(Error::invalid_config("sink.path cannot be combined with the stdout sink"));
        }
        Ok(())
    }

    /// Where a file sink writes; `None` for stdout.
    pub fn output_path(&self) -> Option<PathBuf> {
        match self.sink.kind {
            SinkKind::Stdout => None,
            SinkKind::File => Some(
                self.sink
                    .path
                    .clone()
                    .unwrap_or_else(|| default_output_path(self.window.size_minutes)),
            ),
        }
    }
}

pub fn default_output_path(size_minutes: i64) -> PathBuf {
    PathBuf::from(format!("output_{}.json", size_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let cfg: JobConfig = toml::from_str(
            r#"
            [source]
            path = "events.json"

            [window]
            size_minutes = 10
            "#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.source.format, InputFormat::Jsonl);
        assert_eq!(cfg.sink.kind, SinkKind::File);
        assert_eq!(cfg.output_path(), Some(PathBuf::from("output_10.json")));
    }

    #[test]
    fn parses_full_toml() {
        let cfg: JobConfig = toml::from_str(
            r#"
            [source]
            path = "events.csv"
            format = "csv"

            [window]
            size_minutes = 3

            [sink]
            kind = "stdout"
            "#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.source.format, InputFormat::Csv);
        assert_eq!(cfg.output_path(), None);
    }

    #[test]
    fn rejects_non_positive_window() {
        for size in [0, -5] {
            let err = JobConfig::new("events.json", size).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidConfiguration(_)), "{err}");
        }
    }

    #[test]
    fn rejects_stdout_with_path_and_empty_source() {
        let mut cfg = JobConfig::new("events.json", 1);
        cfg.sink = SinkConfig { kind: SinkKind::Stdout, path: Some("x.json".into()) };
        assert!(cfg.validate().is_err());

        assert!(JobConfig::new("", 1).validate().is_err());
    }
}
