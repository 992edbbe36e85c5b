//! Flat-file storage: append-only logs plus sharded content files

use crate::config::OutputConfig;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Ids per content shard directory
pub const SHARD_SIZE: u64 = 100_000;

/// Path of the content file for `id` under `folder`
///
/// Files are sharded by `id / 100000` into three-digit directories and named
/// by the eight-digit id, e.g. id 100 lives at `<folder>/000/00000100`.
pub fn content_path(folder: &Path, id: u64) -> PathBuf {
    folder
        .join(format!("{:03}", id / SHARD_SIZE))
        .join(format!("{:08}", id))
}

/// An append-only log file, flushed after every line
#[derive(Debug)]
struct AppendLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl AppendLog {
    fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StorageError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn append(&mut self, line: &str) -> StorageResult<()> {
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.writer.flush().map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Storage backed by the table log, the finished log and a content folder
///
/// Both logs are opened once in append mode and stay open for the lifetime
/// of the value. Every append is flushed, and dropping the value closes them.
#[derive(Debug)]
pub struct FileStorage {
    folder: PathBuf,
    table: AppendLog,
    finished: AppendLog,
}

impl FileStorage {
    /// Opens (creating if needed) the logs named in `config`
    pub fn open(config: &OutputConfig) -> StorageResult<Self> {
        tracing::debug!(
            "Opening {} and {} for appending",
            config.table_path.display(),
            config.finished_path.display()
        );

        Ok(Self {
            folder: config.folder.clone(),
            table: AppendLog::open(&config.table_path)?,
            finished: AppendLog::open(&config.finished_path)?,
        })
    }
}

impl Storage for FileStorage {
    fn append_table(&mut self, line: &str) -> StorageResult<()> {
        self.table.append(line)
    }

    fn append_finished(&mut self, id: u64) -> StorageResult<()> {
        self.finished.append(&id.to_string())
    }

    fn write_content(&mut self, id: u64, text: &str) -> StorageResult<()> {
        let path = content_path(&self.folder, id);

        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard).map_err(|source| StorageError::Write {
                path: shard.to_path_buf(),
                source,
            })?;
        }

        fs::write(&path, text).map_err(|source| StorageError::Write { path, source })
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.table.flush()?;
        self.finished.flush()
    }
}
