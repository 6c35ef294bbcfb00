//! All things related to the storage of reminders
//!
//! The store is one JSON document holding every pending reminder. It is only ever read as a whole
//! and replaced as a whole

use core::fmt;
use std::fs;
use std::io;
use std::io::Write;
#[cfg(test)]
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use serde_json::Value;

use crate::reminder::StoredRecord;

/// Storage errors
#[derive(Debug)]
pub enum Error {
    /// The backing file could not be read or written
    Io(io::Error),

    /// The records could not be turned into JSON
    Serialize(serde_json::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(error) => write!(f, "IO error: {error}"),
            Error::Serialize(error) => write!(f, "Serialize error: {error}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialize(error)
    }
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// File storage
///
/// Does no locking of its own, the caller makes sure there is one writer at a time
#[derive(Clone, Debug)]
pub struct FileStore {
    /// Location of the JSON document
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by the given file, the file does not have to exist yet
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { path: path.into() }
    }

    /// Location of the JSON document
    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records
    ///
    /// Never fails: a missing file is an empty store, an unreadable or corrupt file is logged and
    /// treated as empty as well
    pub fn load(&self) -> Vec<StoredRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No data file at {}, starting empty", self.path.display());
                return Vec::new();
            }
            Err(err) => {
                tracing::error!("Could not read {}: {err}", self.path.display());
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(values) => {
                let records = values
                    .into_iter()
                    .map(|value| {
                        serde_json::from_value(value.clone())
                            .unwrap_or(StoredRecord::Unparsed(value))
                    })
                    .collect::<Vec<StoredRecord>>();

                tracing::debug!("Loaded {} records from {}", records.len(), self.path.display());

                records
            }
            Err(err) => {
                tracing::error!("Could not parse {}, treating as empty: {err}", self.path.display());
                Vec::new()
            }
        }
    }

    /// Replace all records
    ///
    /// Records are sorted by time first. The document is written next to the target and renamed
    /// over it, readers never see a half-written file
    pub fn replace_all(&self, mut records: Vec<StoredRecord>) -> Result<()> {
        sort_by_time(&mut records);

        let content = serialize(&records)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temporary_path = self.temporary_path();

        let written = fs::File::create(&temporary_path).and_then(|mut file| {
            file.write_all(&content)?;
            file.sync_all()
        });

        if let Err(err) = written.and_then(|()| fs::rename(&temporary_path, &self.path)) {
            // leftovers are harmless, but do not pile them up
            let _ = fs::remove_file(&temporary_path);

            return Err(err.into());
        }

        tracing::debug!("Saved {} records to {}", records.len(), self.path.display());

        Ok(())
    }

    /// Sibling file used for the atomic replace
    fn temporary_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_default();
        file_name.push(".tmp");

        self.path.with_file_name(file_name)
    }
}

/// Sort by parsed time, records without a usable time go last
///
/// The sort is stable, so equal times keep their relative order
fn sort_by_time(records: &mut [StoredRecord]) {
    records.sort_by_key(|record| match record.due_at() {
        Ok(time) => (false, Some(time)),
        Err(_) => (true, None),
    });
}

/// Serialize with a four space indent, non-ASCII as-is and a trailing newline
fn serialize(records: &[StoredRecord]) -> Result<Vec<u8>> {
    let mut content = Vec::new();

    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut content, formatter);
    records.serialize(&mut serializer)?;

    content.push(b'\n');

    Ok(content)
}
