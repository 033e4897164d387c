//! Delimited row files.
//!
//! Decoding and encoding run on the blocking pool; decoded rows are handed to
//! the async side through a bounded channel so a slow consumer throttles the
//! reader.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

const ROW_BUFFER: usize = 64;

/// Decode/encode settings for delimited files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOptions {
    /// First line holds column names
    pub has_headers: bool,
    /// Field separator
    pub delimiter: u8,
}

impl Default for RowOptions {
    fn default() -> Self {
        Self {
            has_headers: false,
            delimiter: b',',
        }
    }
}

impl RowOptions {
    pub fn with_headers(mut self) -> Self {
        self.has_headers = true;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// One decoded record, optionally tied to the file's header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    headers: Option<Arc<Vec<String>>>,
    fields: Vec<String>,
}

impl Row {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            headers: None,
            fields,
        }
    }

    pub fn with_headers(headers: Arc<Vec<String>>, fields: Vec<String>) -> Self {
        Self {
            headers: Some(headers),
            fields,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref().map(Vec::as_slice)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Field under the named column, when the row carries headers.
    pub fn field(&self, column: &str) -> Option<&str> {
        let index = self.headers()?.iter().position(|h| h == column)?;
        self.get(index)
    }
}

pub type RowStream = BoxStream<'static, Result<Row>>;

enum Ingest {
    Idle(PathBuf, RowOptions),
    Running(mpsc::Receiver<Result<Row>>),
}

/// Streams rows out of `path`. Nothing is opened until the stream is first polled.
pub fn ingest(path: PathBuf, options: RowOptions) -> RowStream {
    stream::unfold(Ingest::Idle(path, options), |state| async move {
        let mut rx = match state {
            Ingest::Idle(path, options) => spawn_reader(path, options),
            Ingest::Running(rx) => rx,
        };
        rx.recv().await.map(|row| (row, Ingest::Running(rx)))
    })
    .boxed()
}

fn spawn_reader(path: PathBuf, options: RowOptions) -> mpsc::Receiver<Result<Row>> {
    let (tx, rx) = mpsc::channel(ROW_BUFFER);

    tokio::task::spawn_blocking(move || {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                let _ = tx.blocking_send(Err(Error::io(&path, e)));
                return;
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(options.has_headers)
            .delimiter(options.delimiter)
            .flexible(true)
            .from_reader(file);

        let headers = if options.has_headers {
            match reader.headers() {
                Ok(record) => Some(Arc::new(record.iter().map(str::to_owned).collect::<Vec<_>>())),
                Err(source) => {
                    let _ = tx.blocking_send(Err(Error::Rows { path, source }));
                    return;
                }
            }
        } else {
            None
        };

        let mut count = 0usize;
        for record in reader.records() {
            let row = match record {
                Ok(record) => {
                    let fields = record.iter().map(str::to_owned).collect();
                    Ok(Row {
                        headers: headers.clone(),
                        fields,
                    })
                }
                Err(source) => Err(Error::Rows {
                    path: path.clone(),
                    source,
                }),
            };

            let failed = row.is_err();
            if tx.blocking_send(row).is_err() || failed {
                break;
            }
            count += 1;
        }

        tracing::debug!(path = %path.display(), rows = count, "row ingest finished");
    });

    rx
}

/// Writes `rows` to `path`, replacing it. With `has_headers`, the header line of
/// the first row (if it carries one) is written first.
pub async fn emit(path: PathBuf, rows: Vec<Row>, options: RowOptions) -> Result<()> {
    let task_path = path.clone();
    let joined = tokio::task::spawn_blocking(move || write_rows(task_path, &rows, options)).await;

    match joined {
        Ok(result) => result,
        Err(join) => Err(Error::Io {
            path,
            source: std::io::Error::other(join),
        }),
    }
}

fn write_rows(path: PathBuf, rows: &[Row], options: RowOptions) -> Result<()> {
    let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .from_writer(file);

    let codec = |source: csv::Error| Error::Rows {
        path: path.clone(),
        source,
    };

    if options.has_headers {
        if let Some(headers) = rows.first().and_then(Row::headers) {
            writer.write_record(headers).map_err(codec)?;
        }
    }

    for row in rows {
        writer.write_record(row.fields()).map_err(codec)?;
    }

    writer.flush().map_err(|e| Error::io(&path, e))?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "rows written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup_by_column() {
        let headers = Arc::new(vec!["name".to_string(), "qty".to_string()]);
        let row = Row::with_headers(headers, vec!["apple".to_string(), "3".to_string()]);

        assert_eq!(row.field("qty"), Some("3"));
        assert_eq!(row.field("missing"), None);
        assert_eq!(row.get(0), Some("apple"));
    }

    #[test]
    fn headerless_rows_have_no_columns() {
        let row = Row::new(vec!["a".to_string()]);
        assert_eq!(row.field("a"), None);
        assert!(row.headers().is_none());
    }
}
