//! Append-only run store for greenbench.
//!
//! The store is a plain CSV file with a fixed header. Rows are only ever
//! appended; scoring reads the whole file back. Derived tables (scores,
//! stats) are written atomically since they are recomputed wholesale.

use greenbench_types::{RUN_STORE_HEADER, RunRecord};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open run store {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to run store {}", .path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read run store {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("run store {} has unexpected header [{found}]", .path.display())]
    Header { path: PathBuf, found: String },

    #[error("failed to encode table {}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write table {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait RunStore {
    fn append(&mut self, record: &RunRecord) -> Result<(), StoreError>;
    fn read_all(&self) -> Result<Vec<RunRecord>, StoreError>;
}

/// CSV-backed store. One open/flush cycle per appended record, so a crashed
/// measurement session keeps every completed run.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunStore for CsvStore {
    fn append(&mut self, record: &RunRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Open {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        // Header goes in only when the file is new or empty; re-opening an
        // existing store must not repeat it mid-file.
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        writer.serialize(record).map_err(|source| StoreError::Append {
            path: self.path.clone(),
            source,
        })?;
        writer.flush().map_err(|source| StoreError::Append {
            path: self.path.clone(),
            source: csv::Error::from(source),
        })?;

        Ok(())
    }

    fn read_all(&self) -> Result<Vec<RunRecord>, StoreError> {
        let file = fs::File::open(&self.path).map_err(|source| StoreError::Open {
            path: self.path.clone(),
            source,
        })?;

        let mut reader = csv::Reader::from_reader(file);

        let headers = reader
            .headers()
            .map_err(|source| StoreError::Read {
                path: self.path.clone(),
                source,
            })?
            .clone();

        if headers.iter().ne(RUN_STORE_HEADER.iter().copied()) {
            return Err(StoreError::Header {
                path: self.path.clone(),
                found: headers.iter().collect::<Vec<_>>().join(","),
            });
        }

        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: RunRecord = row.map_err(|source| StoreError::Read {
                path: self.path.clone(),
                source,
            })?;
            records.push(record);
        }

        Ok(records)
    }
}

/// In-memory store for tests and wiring.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    pub records: Vec<RunRecord>,
}

impl RunStore for MemStore {
    fn append(&mut self, record: &RunRecord) -> Result<(), StoreError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self.records.clone())
    }
}

/// Writes a derived CSV table in one atomic rename.
///
/// An empty row set produces an empty file; the header row comes from the
/// first serialized row's field names.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        for row in rows {
            writer.serialize(row).map_err(|source| StoreError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
        }
        writer.flush().map_err(|source| StoreError::Encode {
            path: path.to_path_buf(),
            source: csv::Error::from(source),
        })?;
    }

    atomic_write(path, &buf).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all().ok();
    }

    fs::rename(&tmp, path)?;
    Ok(())
}
