//! Minimal append-only CSV logs shared by the event logger and the
//! performance tracker, plus a reader for the report generator.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// An append-only CSV file with a fixed header.
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
    header: &'static [&'static str],
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>, header: &'static [&'static str]) -> Self {
        Self {
            path: path.into(),
            header,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &'static [&'static str] {
        self.header
    }

    /// Append `rows` in one open/flush, writing the header first if the file
    /// is missing or empty.
    pub fn append_rows<R, F>(&self, rows: R) -> io::Result<()>
    where
        R: IntoIterator<Item = Vec<F>>,
        F: AsRef<str>,
    {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);

        if needs_header {
            write_record(&mut writer, self.header.iter())?;
        }
        for row in rows {
            write_record(&mut writer, row.iter())?;
        }
        writer.flush()
    }
}

fn write_record<W, I, F>(writer: &mut W, fields: I) -> io::Result<()>
where
    W: Write,
    I: Iterator<Item = F>,
    F: AsRef<str>,
{
    let line = fields
        .map(|field| escape_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{line}")
}

pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// A parsed CSV file: header plus data rows.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Read a CSV file. A missing file is an empty table.
    pub fn read(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut records = parse_records(content).into_iter();
        let header = records.next().unwrap_or_default();
        Self {
            header,
            rows: records.collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }
}

fn parse_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    records
}
