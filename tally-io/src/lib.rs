//! tally-io: file sources and sinks.
//! - `FileSource`: reads JSONL or CSV one line at a time and yields `Event`s
//! - `FileSink`: writes each `Average` as a JSON line to a file or stdout

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tally_core::config::InputFormat;
use tally_core::{Average, Error, Event, Result, Sink, Source};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Lines};

/// Reads events from a file, pulling one line per `next_event` call.
///
/// Every line holds one record. Any line that does not parse into an `Event`,
/// a blank one included, ends the stream with `Error::MalformedRecord`.
pub struct FileSource {
    path: PathBuf,
    format: InputFormat,
    lines: Lines<BufReader<File>>,
    line_no: u64,
    csv_headers: Option<csv::StringRecord>,
}

impl FileSource {
    pub async fn open(path: impl Into<PathBuf>, format: InputFormat) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)
            .await
            .map_err(|source| Error::SourceUnavailable { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), ?format, "opened source");
        Ok(Self {
            path,
            format,
            lines: BufReader::new(file).lines(),
            line_no: 0,
            csv_headers: None,
        })
    }

    pub async fn jsonl(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path, InputFormat::Jsonl).await
    }

    pub async fn csv(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path, InputFormat::Csv).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        let line = self
            .lines
            .next_line()
            .await
            .map_err(|source| Error::SourceUnavailable { path: self.path.clone(), source })?;
        if line.is_some() {
            self.line_no += 1;
        }
        Ok(line)
    }
}

#[async_trait]
impl Source for FileSource {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        match self.format {
            InputFormat::Jsonl => {
                let Some(line) = self.next_line().await? else { return Ok(None) };
                parse_json_line(&line, self.line_no).map(Some)
            }
            InputFormat::Csv => {
                if self.csv_headers.is_none() {
                    let Some(header) = self.next_line().await? else { return Ok(None) };
                    self.csv_headers = Some(parse_csv_header(&header, self.line_no)?);
                }
                let Some(line) = self.next_line().await? else { return Ok(None) };
                match &self.csv_headers {
                    Some(headers) => parse_csv_line(&line, headers, self.line_no).map(Some),
                    None => Ok(None),
                }
            }
        }
    }
}

pub fn parse_json_line(line: &str, line_no: u64) -> Result<Event> {
    serde_json::from_str(line).map_err(|e| Error::malformed(line_no, e))
}

fn csv_record(line: &str, line_no: u64) -> Result<csv::StringRecord> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match rdr.records().next() {
        Some(row) => row.map_err(|e| Error::malformed(line_no, e)),
        None => Err(Error::malformed(line_no, "empty csv row")),
    }
}

fn parse_csv_header(line: &str, line_no: u64) -> Result<csv::StringRecord> {
    let headers = csv_record(line, line_no)?;
    for required in ["timestamp", "duration"] {
        if !headers.iter().any(|h| h == required) {
            return Err(Error::malformed(line_no, format!("csv header has no `{required}` column")));
        }
    }
    Ok(headers)
}

pub fn parse_csv_line(line: &str, headers: &csv::StringRecord, line_no: u64) -> Result<Event> {
    csv_record(line, line_no)?
        .deserialize(Some(headers))
        .map_err(|e| Error::malformed(line_no, e))
}

/// JSON with a space after every `:` and `,`, all on one line.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serializes `record` as one newline-terminated output line.
pub fn encode_line<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    record.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Writes each record as a single JSON line to stdout or a file.
pub struct FileSink {
    target: String,
    label: &'static str,
    writer: BufWriter<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl FileSink {
    /// Creates (or truncates) `path`.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let target = path.display().to_string();
        let file = File::create(path)
            .await
            .map_err(|source| Error::SinkUnavailable { target: target.clone(), source })?;
        Ok(Self { target, label: "file", writer: BufWriter::new(Box::new(file)) })
    }

    pub fn stdout() -> Self {
        Self {
            target: "<stdout>".to_string(),
            label: "stdout",
            writer: BufWriter::new(Box::new(tokio::io::stdout())),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn unavailable(&self, source: std::io::Error) -> Error {
        Error::SinkUnavailable { target: self.target.clone(), source }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn on_element(&mut self, record: Average) -> Result<()> {
        let line = encode_line(&record)?;
        if let Err(e) = self.writer.write_all(&line).await {
            return Err(self.unavailable(e));
        }
        tally_core::metrics::BYTES_WRITTEN
            .with_label_values(&[self.label])
            .inc_by(line.len() as u64);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if let Err(e) = self.writer.flush().await {
            return Err(self.unavailable(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::record::parse_event_time;

    fn tmp_file(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("tally_test_{}_{}.tmp", name, nanos));
        p
    }

    async fn drain(src: &mut FileSource) -> Result<Vec<Event>> {
        let mut out = Vec::new();
        while let Some(ev) = src.next_event().await? {
            out.push(ev);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn jsonl_reads_one_event_per_line() {
        let path = tmp_file("jsonl");
        let content = concat!(
            "{\"timestamp\": \"2018-12-26 18:11:08.509654\",\"event_name\": \"translation_delivered\",\"duration\": 20}\n",
            "{\"timestamp\": \"2018-12-26 18:15:19.903159\",\"duration\": 31.5}",
        );
        tokio::fs::write(&path, content).await.unwrap();

        let mut src = FileSource::jsonl(&path).await.unwrap();
        let events = drain(&mut src).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, parse_event_time("2018-12-26 18:11:08.509654").unwrap());
        assert_eq!(events[0].duration, 20.0);
        assert_eq!(events[1].duration, 31.5);
        // exhausted sources stay exhausted
        assert!(src.next_event().await.unwrap().is_none());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn blank_line_is_a_malformed_record() {
        let path = tmp_file("blank_jsonl");
        let content = concat!(
            "{\"timestamp\": \"2018-12-26 18:11:08.509654\",\"duration\": 20}\n",
            "\n",
            "{\"timestamp\": \"2018-12-26 18:15:19.903159\",\"duration\": 30}\n",
        );
        tokio::fs::write(&path, content).await.unwrap();

        let mut src = FileSource::jsonl(&path).await.unwrap();
        assert!(src.next_event().await.unwrap().is_some());
        assert!(matches!(
            src.next_event().await,
            Err(Error::MalformedRecord { line: 2, .. })
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn jsonl_malformed_line_reports_line_number() {
        let path = tmp_file("bad_jsonl");
        let content = concat!(
            "{\"timestamp\": \"2018-12-26 18:11:08.509654\",\"duration\": 20}\n",
            "{\"timestamp\": \"2018-12-26 18:15:19.903159\"}\n",
        );
        tokio::fs::write(&path, content).await.unwrap();

        let mut src = FileSource::jsonl(&path).await.unwrap();
        assert!(src.next_event().await.unwrap().is_some());
        match src.next_event().await {
            Err(Error::MalformedRecord { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("duration"), "{reason}");
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_is_source_unavailable() {
        let path = tmp_file("does_not_exist");
        assert!(matches!(
            FileSource::jsonl(&path).await,
            Err(Error::SourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn csv_reads_rows_by_header() {
        let path = tmp_file("csv");
        let csv_data = "client_name,timestamp,duration\nairliberty, 2024-01-01 00:00:01.500000 ,10\n\"acme, inc\",2024-01-01 00:00:30,20.5\n";
        tokio::fs::write(&path, csv_data).await.unwrap();

        let mut src = FileSource::csv(&path).await.unwrap();
        let events = drain(&mut src).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, parse_event_time("2024-01-01 00:00:01.5").unwrap());
        assert_eq!(events[1].duration, 20.5);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn csv_without_duration_column_is_malformed() {
        let path = tmp_file("csv_header");
        tokio::fs::write(&path, "timestamp,nr_words\n2024-01-01 00:00:01,3\n").await.unwrap();

        let mut src = FileSource::csv(&path).await.unwrap();
        assert!(matches!(
            src.next_event().await,
            Err(Error::MalformedRecord { line: 1, .. })
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn csv_blank_row_is_malformed() {
        let path = tmp_file("csv_blank");
        tokio::fs::write(&path, "timestamp,duration\n2024-01-01 00:00:01,3\n  \n").await.unwrap();

        let mut src = FileSource::csv(&path).await.unwrap();
        assert!(src.next_event().await.unwrap().is_some());
        assert!(matches!(
            src.next_event().await,
            Err(Error::MalformedRecord { line: 3, .. })
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn file_sink_truncates_and_writes_json_lines() {
        let path = tmp_file("sink");
        tokio::fs::write(&path, "stale content\n").await.unwrap();

        let minute = parse_event_time("2024-01-01 00:01:00").unwrap();
        let mut sink = FileSink::create(&path).await.unwrap();
        sink.on_element(Average::new(minute, 20.0)).await.unwrap();
        sink.on_element(Average::new(minute, 25.5)).await.unwrap();
        sink.flush().await.unwrap();

        let data = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = data.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"date": "2024-01-01 00:01:00", "average_delivery_time": 20.0}"#,
                r#"{"date": "2024-01-01 00:01:00", "average_delivery_time": 25.5}"#,
            ]
        );

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn encoded_lines_space_separators() {
        let line = encode_line(&serde_json::json!({"a": [1, 2], "b": {"c": "x, y: z"}})).unwrap();
        assert_eq!(
            String::from_utf8(line).unwrap(),
            "{\"a\": [1, 2], \"b\": {\"c\": \"x, y: z\"}}\n"
        );
    }

    #[tokio::test]
    async fn sink_in_missing_directory_is_unavailable() {
        let mut path = tmp_file("no_such_dir");
        path.push("out.json");
        assert!(matches!(
            FileSink::create(&path).await,
            Err(Error::SinkUnavailable { .. })
        ));
    }
}
