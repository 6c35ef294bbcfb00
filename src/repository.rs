//! Reminder repository
//!
//! The only writer of the store. Every read-then-write happens behind one lock, so creating,
//! deleting and delivering reminders never lose each other's updates. File IO runs on the
//! blocking pool

use core::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde_json::Map;
use tokio::sync::Mutex;
use tokio::task;
use tokio::task::JoinError;
use uuid::Uuid;

use crate::assets::Assets;
use crate::assets::plain_filename;
use crate::reminder::AudioType;
use crate::reminder::Reminder;
use crate::reminder::StoredRecord;
use crate::storage;
use crate::storage::FileStore;

/// Repository errors
#[derive(Debug)]
pub enum Error {
    /// The request is missing something or has something invalid
    Validation(String),

    /// No reminder with that ID
    NotFound,

    /// The store could not be written
    Storage(storage::Error),

    /// The blocking store task did not finish
    Task(JoinError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Validation(message) => write!(f, "{message}"),
            Error::NotFound => write!(f, "Reminder not found"),
            Error::Storage(error) => write!(f, "Storage error: {error}"),
            Error::Task(error) => write!(f, "Storage task failed: {error}"),
        }
    }
}

impl From<storage::Error> for Error {
    fn from(error: storage::Error) -> Self {
        Error::Storage(error)
    }
}

/// Result type for all repository interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a Reminder
pub struct CreateReminderValues<'a> {
    /// What to remind about, required
    pub text: Option<&'a str>,

    /// When to remind, required
    pub time: Option<&'a str>,

    /// Name of the audio cue
    pub audio_filename: Option<&'a str>,

    /// Origin of the audio cue
    pub audio_type: Option<AudioType>,
}

/// Outcome of a due check
#[derive(Debug, Default)]
pub struct Partition {
    /// Records whose time has come, as stored
    pub due: Vec<StoredRecord>,

    /// Everything else, records without a usable time included
    pub pending: Vec<StoredRecord>,
}

/// Split records into due and pending
///
/// Only the time decides. Records without a usable time are pending forever, they are logged but
/// never dropped
pub fn partition_due(records: Vec<StoredRecord>, now: DateTime<Utc>) -> Partition {
    let mut partition = Partition::default();

    for record in records {
        match record.due_at() {
            Ok(time) if time <= now => partition.due.push(record),
            Ok(_) => partition.pending.push(record),
            Err(err) => {
                tracing::warn!(
                    "Could not process record {}, keeping it: {err}",
                    record.id().unwrap_or("N/A")
                );
                partition.pending.push(record);
            }
        }
    }

    partition
}

/// Reminder repository
#[derive(Clone, Debug)]
pub struct Reminders {
    /// The store, behind the one lock all mutations take
    store: Arc<Mutex<FileStore>>,

    /// Assets referenced by reminders
    assets: Assets,
}

impl Reminders {
    /// Create a repository over a store
    pub fn new(store: FileStore, assets: Assets) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            assets,
        }
    }

    /// All records, malformed ones included
    pub async fn list_all(&self) -> Result<Vec<StoredRecord>> {
        let store = self.store.lock().await;

        load(&store).await
    }

    /// Create a reminder
    pub async fn create(&self, values: &CreateReminderValues<'_>) -> Result<Reminder> {
        let text = values
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::Validation("Missing text or time".to_string()))?;

        let time = values
            .time
            .filter(|time| !time.trim().is_empty())
            .ok_or_else(|| Error::Validation("Missing text or time".to_string()))?;

        crate::reminder::parse_time(time).map_err(|err| Error::Validation(err.to_string()))?;

        let audio_filename = values
            .audio_filename
            .filter(|filename| !filename.is_empty())
            .map(|filename| {
                plain_filename(filename)
                    .map(ToString::to_string)
                    .ok_or_else(|| Error::Validation("Invalid audio filename".to_string()))
            })
            .transpose()?;

        // a type without a file means nothing
        let audio_type = audio_filename.as_ref().and(values.audio_type);

        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            time: time.to_string(),
            audio_filename,
            audio_type,
            extra: Map::new(),
        };

        let store = self.store.lock().await;

        let mut records = load(&store).await?;
        records.push(StoredRecord::Reminder(reminder.clone()));

        persist(&store, records).await?;

        tracing::info!("Created reminder {} due at {}", reminder.id, reminder.time);

        Ok(reminder)
    }

    /// Delete a reminder by ID
    ///
    /// The uploaded audio it referenced is cleaned up as well
    pub async fn delete(&self, id: &str) -> Result<StoredRecord> {
        let store = self.store.lock().await;

        let mut records = load(&store).await?;

        let position = records
            .iter()
            .position(|record| record.id() == Some(id))
            .ok_or(Error::NotFound)?;

        let record = records.remove(position);

        if let StoredRecord::Reminder(reminder) = &record {
            self.assets.cleanup(reminder);
        }

        persist(&store, records).await?;

        tracing::info!("Deleted reminder {id}");

        Ok(record)
    }

    /// Take out all records that are due at `now`
    ///
    /// `publish` sees the due records first, the remainder is persisted right after, all under
    /// the lock. Nothing is written when nothing is due
    pub async fn deliver_due<F>(&self, now: DateTime<Utc>, publish: F) -> Result<Vec<StoredRecord>>
    where
        F: FnOnce(&[StoredRecord]),
    {
        let store = self.store.lock().await;

        let Partition { due, pending } = partition_due(load(&store).await?, now);

        if due.is_empty() {
            return Ok(due);
        }

        publish(&due);

        persist(&store, pending).await?;

        Ok(due)
    }
}

async fn load(store: &FileStore) -> Result<Vec<StoredRecord>> {
    let store = store.clone();

    task::spawn_blocking(move || store.load())
        .await
        .map_err(Error::Task)
}

async fn persist(store: &FileStore, records: Vec<StoredRecord>) -> Result<()> {
    let store = store.clone();

    task::spawn_blocking(move || store.replace_all(records))
        .await
        .map_err(Error::Task)??;

    Ok(())
}
