//! Report output in JSON or JSON Lines form.
//!
//! A single job writes one report object. A directory run writes either one
//! JSON array or one report per line.

use serde::Serialize;
use std::io::{self, Write};

/// Report serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON object or array
    Json,
    /// One JSON object per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLines => "jsonl",
        }
    }
}

/// Serializes reports to a writer.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    written: usize,
}

impl<W: Write> ReportWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            written: 0,
        }
    }

    /// Write one item followed by a newline.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.written += 1;
        Ok(())
    }

    /// Write a batch: a JSON array, or one line per item.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, items)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, items).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
                self.written += items.len();
            }
            OutputFormat::JsonLines => {
                for item in items {
                    self.write(item)?;
                }
            }
        }
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Anchor, JobReport, TileRecord};

    fn report(width: u32) -> JobReport {
        JobReport {
            source: None,
            content_hash: None,
            width,
            height: 480,
            tile_size: 640,
            apply_threshold: true,
            columns: 1,
            rows: 1,
            tiles: vec![TileRecord {
                index: 0,
                anchor: Anchor::new(0, 0),
                threshold: Some(128),
                payload_bytes: 2048,
                latency_ms: 12,
            }],
            elapsed_ms: 20,
        }
    }

    #[test]
    fn test_write_single_report() {
        let mut buffer = Vec::new();
        let mut writer = ReportWriter::new(&mut buffer, OutputFormat::Json, false);
        writer.write(&report(640)).unwrap();
        assert_eq!(writer.items_written(), 1);

        let output = String::from_utf8(buffer).unwrap();
        let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(value["width"], 640);
        assert_eq!(value["tiles"][0]["threshold"], 128);
    }

    #[test]
    fn test_jsonl_batch_one_line_each() {
        let mut buffer = Vec::new();
        let mut writer = ReportWriter::new(&mut buffer, OutputFormat::JsonLines, true);
        writer.write_all(&[report(640), report(800)]).unwrap();
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"width\":800"));
    }

    #[test]
    fn test_json_batch_is_array() {
        let mut buffer = Vec::new();
        let mut writer = ReportWriter::new(&mut buffer, OutputFormat::Json, true);
        writer.write_all(&[report(640), report(800)]).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("NDJSON"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("yaml"), None);
        assert_eq!(OutputFormat::JsonLines.extension(), "jsonl");
    }
}
