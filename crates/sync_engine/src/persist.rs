use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info};
use serde::{Deserialize, Serialize};
use sync_core::NoteRecord;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::categorize::{categorize, default_categories, Category};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store directory missing or not writable: {0}")]
    Directory(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("store file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
    #[error("store write task failed: {0}")]
    Task(String),
}

/// Storage collaborator the controller hands accepted records to.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a record and returns the id of the category it was filed under.
    async fn save_record(&self, record: &NoteRecord) -> Result<Option<String>, StoreError>;

    /// Whether a record with this id was persisted by an earlier run.
    async fn record_exists(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Ensure the directory exists and is writable; create it if missing.
pub fn ensure_store_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StoreError::Directory("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file and rename.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, StoreError> {
        ensure_store_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| StoreError::Io(e.error))?;
        Ok(target)
    }
}

pub const STORE_FILENAME: &str = "collection.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNote {
    #[serde(flatten)]
    pub record: NoteRecord,
    pub category_id: Option<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    categories: Vec<Category>,
    notes: BTreeMap<String, StoredNote>,
}

/// A single JSON document holding categories and every saved note, rewritten
/// atomically after each save.
pub struct JsonFileStore {
    writer: AtomicFileWriter,
    path: PathBuf,
    document: Mutex<StoreDocument>,
    // Held across the blocking write so file contents follow save order.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store in `dir`, seeding the default categories on first use.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        ensure_store_dir(dir)?;
        let path = dir.join(STORE_FILENAME);
        let document = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<StoreDocument>(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => StoreDocument::default(),
            Err(err) => return Err(err.into()),
        };
        let document = if document.categories.is_empty() {
            StoreDocument {
                categories: default_categories(),
                ..document
            }
        } else {
            document
        };
        engine_info!(
            "Opened record store {:?} ({} notes, {} categories)",
            path,
            document.notes.len(),
            document.categories.len()
        );
        Ok(Self {
            writer: AtomicFileWriter::new(dir.to_path_buf()),
            path,
            document: Mutex::new(document),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn categories(&self) -> Vec<Category> {
        self.lock().categories.clone()
    }

    pub fn notes(&self) -> Vec<StoredNote> {
        self.lock().notes.values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreDocument> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn save_record(&self, record: &NoteRecord) -> Result<Option<String>, StoreError> {
        let _write = self.write_lock.lock().await;
        let (category_id, previous, content) = {
            let mut document = self.lock();
            let category_id = categorize(record, &document.categories)
                .map(|category| category.id.clone());
            let previous = document.notes.insert(
                record.id.clone(),
                StoredNote {
                    record: record.clone(),
                    category_id: category_id.clone(),
                    saved_at: Utc::now(),
                },
            );
            (category_id, previous, serde_json::to_string_pretty(&*document))
        };

        let written = match content {
            Ok(content) => write_blocking(self.writer.clone(), content).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = written {
            let mut document = self.lock();
            match previous {
                Some(previous) => document.notes.insert(record.id.clone(), previous),
                None => document.notes.remove(&record.id),
            };
            return Err(err);
        }
        engine_debug!("Saved record {} (category {:?})", record.id, category_id);
        Ok(category_id)
    }

    async fn record_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.lock().notes.contains_key(id))
    }
}

async fn write_blocking(writer: AtomicFileWriter, content: String) -> Result<PathBuf, StoreError> {
    tokio::task::spawn_blocking(move || writer.write(STORE_FILENAME, &content))
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
}
