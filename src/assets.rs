//! Audio assets
//!
//! Two directories: built-in default sounds and sounds uploaded by users. Only uploaded sounds are
//! ever removed, and only by name

use core::fmt;
use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::reminder::AudioType;
use crate::reminder::Reminder;

/// Asset errors
#[derive(Debug)]
pub enum Error {
    /// Not a plain file name, or nothing usable left after sanitizing
    InvalidName,

    /// No such file
    NotFound,

    /// Filesystem trouble
    Io(io::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidName => write!(f, "Invalid file name"),
            Error::NotFound => write!(f, "File not found"),
            Error::Io(error) => write!(f, "IO error: {error}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

/// Available audio files, per origin
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct AudioFiles {
    /// Built-in sounds
    pub available: Vec<String>,

    /// Uploaded sounds
    pub uploaded: Vec<String>,
}

/// The audio asset directories
#[derive(Clone, Debug)]
pub struct Assets {
    /// Built-in sounds
    default_dir: PathBuf,

    /// Uploaded sounds
    uploaded_dir: PathBuf,
}

impl Assets {
    /// Use the given directories, creating them when missing
    pub fn new<D, U>(default_dir: D, uploaded_dir: U) -> io::Result<Self>
    where
        D: Into<PathBuf>,
        U: Into<PathBuf>,
    {
        let assets = Self {
            default_dir: default_dir.into(),
            uploaded_dir: uploaded_dir.into(),
        };

        fs::create_dir_all(&assets.default_dir)?;
        fs::create_dir_all(&assets.uploaded_dir)?;

        Ok(assets)
    }

    /// Directory for the given origin
    fn dir(&self, audio_type: AudioType) -> &Path {
        match audio_type {
            AudioType::DefaultAudio => &self.default_dir,
            AudioType::UploadedAudio => &self.uploaded_dir,
        }
    }

    /// Location of an asset, only plain file names so it can never leave its directory
    pub fn resolve(&self, audio_type: AudioType, filename: &str) -> Result<PathBuf, Error> {
        let filename = plain_filename(filename).ok_or(Error::InvalidName)?;

        Ok(self.dir(audio_type).join(filename))
    }

    /// List the files of both directories
    pub fn list(&self) -> AudioFiles {
        AudioFiles {
            available: list_files(&self.default_dir),
            uploaded: list_files(&self.uploaded_dir),
        }
    }

    /// Store an uploaded file under a unique name
    ///
    /// Returns the name it was stored under
    pub fn store_upload(&self, original_name: &str, content: &[u8]) -> Result<String, Error> {
        let filename = secure_filename(original_name).ok_or(Error::InvalidName)?;
        let filename = format!("{}_{filename}", Uuid::new_v4());

        fs::write(self.uploaded_dir.join(&filename), content)?;

        tracing::info!("Stored uploaded audio: {filename}");

        Ok(filename)
    }

    /// Remove an uploaded file
    pub fn remove_upload(&self, filename: &str) -> Result<(), Error> {
        let path = self.resolve(AudioType::UploadedAudio, filename)?;

        if !path.is_file() {
            return Err(Error::NotFound);
        }

        fs::remove_file(&path)?;

        tracing::info!("Removed uploaded audio: {}", path.display());

        Ok(())
    }

    /// Remove the uploaded asset a deleted reminder referenced
    ///
    /// Best-effort, problems are logged and never reach the caller. Default assets are left alone
    pub fn cleanup(&self, reminder: &Reminder) {
        let Some(filename) = reminder.uploaded_audio() else {
            return;
        };

        match self.remove_upload(filename) {
            Ok(()) => {}
            Err(Error::NotFound | Error::InvalidName) => {
                tracing::warn!(
                    "Uploaded audio {filename:?} of reminder {} not found, nothing to clean up",
                    reminder.id
                );
            }
            Err(err) => {
                tracing::error!(
                    "Could not remove uploaded audio {filename:?} of reminder {}: {err}",
                    reminder.id
                );
            }
        }
    }
}

/// Names of the regular files in a directory, sorted
fn list_files(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!("Could not list {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut files = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|file_type| file_type.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect::<Vec<String>>();

    files.sort();

    files
}

/// Accept a name only when it is one plain path component
///
/// Names of existing files are taken as they are, spaces and non-ASCII included
pub fn plain_filename(filename: &str) -> Option<&str> {
    if filename.contains(['/', '\\', '\0']) {
        return None;
    }

    let mut components = Path::new(filename).components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(filename),
        _ => None,
    }
}

/// Make a file name safe to use on the filesystem
///
/// Normalizes to plain ASCII, turns path separators and whitespace into underscores and drops
/// everything that is not alphanumeric, `_`, `.` or `-`. Returns `None` when nothing is left
///
/// `../../etc/passwd` becomes `etc_passwd`
pub fn secure_filename(filename: &str) -> Option<String> {
    let ascii = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|ch| if ch == '/' || ch == '\\' { ' ' } else { ch })
        .collect::<String>();

    let joined = ascii.split_whitespace().collect::<Vec<&str>>().join("_");

    let cleaned = joined
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
        .collect::<String>();

    let trimmed = cleaned.trim_matches(|ch| ch == '.' || ch == '_');

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;
    use tempfile::tempdir;

    use super::*;

    fn reminder(audio_filename: &str, audio_type: AudioType) -> Reminder {
        Reminder {
            id: "a".to_string(),
            text: "Stand up".to_string(),
            time: "2024-01-01T00:00:00+00:00".to_string(),
            audio_filename: Some(audio_filename.to_string()),
            audio_type: Some(audio_type),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(Some("beep.mp3".to_string()), secure_filename("beep.mp3"));
        assert_eq!(Some("my_cool_song.mp3".to_string()), secure_filename("my cool song.mp3"));
        assert_eq!(Some("etc_passwd".to_string()), secure_filename("../../etc/passwd"));
        assert_eq!(Some("chuong_bao.mp3".to_string()), secure_filename("chuông báo.mp3"));
        assert_eq!(None, secure_filename(".."));
        assert_eq!(None, secure_filename("日本"));
        assert_eq!(None, secure_filename(""));
    }

    #[test]
    fn test_store_and_list_uploads() {
        let dir = tempdir().unwrap();
        let assets = Assets::new(dir.path().join("default"), dir.path().join("uploaded")).unwrap();
        fs::write(dir.path().join("default").join("default_beep.mp3"), b"beep").unwrap();

        let filename = assets.store_upload("my song.mp3", b"la la").unwrap();
        assert!(filename.ends_with("_my_song.mp3"));

        let files = assets.list();
        assert_eq!(vec!["default_beep.mp3".to_string()], files.available);
        assert_eq!(vec![filename.clone()], files.uploaded);

        let other = assets.store_upload("my song.mp3", b"la la").unwrap();
        assert_ne!(filename, other);

        assert!(matches!(assets.store_upload("..", b""), Err(Error::InvalidName)));
    }

    #[test]
    fn test_remove_upload() {
        let dir = tempdir().unwrap();
        let assets = Assets::new(dir.path().join("default"), dir.path().join("uploaded")).unwrap();

        let filename = assets.store_upload("song.mp3", b"la la").unwrap();

        assert!(assets.remove_upload(&filename).is_ok());
        assert!(matches!(assets.remove_upload(&filename), Err(Error::NotFound)));
    }

    #[test]
    fn test_cleanup_only_touches_own_upload() {
        let dir = tempdir().unwrap();
        let default_dir = dir.path().join("default");
        let uploaded_dir = dir.path().join("uploaded");
        let assets = Assets::new(&default_dir, &uploaded_dir).unwrap();

        fs::write(default_dir.join("beep.mp3"), b"beep").unwrap();
        fs::write(uploaded_dir.join("beep.mp3"), b"beep").unwrap();
        let mine = assets.store_upload("mine.mp3", b"mine").unwrap();
        let theirs = assets.store_upload("theirs.mp3", b"theirs").unwrap();

        assets.cleanup(&reminder(&mine, AudioType::UploadedAudio));

        assert!(!uploaded_dir.join(&mine).exists());
        assert!(uploaded_dir.join(&theirs).exists());
        assert!(uploaded_dir.join("beep.mp3").exists());
        assert!(default_dir.join("beep.mp3").exists());

        // default assets are never removed, not even when the name matches
        assets.cleanup(&reminder("beep.mp3", AudioType::DefaultAudio));
        assert!(default_dir.join("beep.mp3").exists());
        assert!(uploaded_dir.join("beep.mp3").exists());

        // a missing file is fine
        assets.cleanup(&reminder(&mine, AudioType::UploadedAudio));
    }

    #[test]
    fn test_plain_filename() {
        assert_eq!(Some("beep.mp3"), plain_filename("beep.mp3"));
        assert_eq!(Some("my beep.mp3"), plain_filename("my beep.mp3"));
        assert_eq!(Some("chuông báo.mp3"), plain_filename("chuông báo.mp3"));
        assert_eq!(None, plain_filename(""));
        assert_eq!(None, plain_filename("."));
        assert_eq!(None, plain_filename(".."));
        assert_eq!(None, plain_filename("/beep.mp3"));
        assert_eq!(None, plain_filename("sounds/beep.mp3"));
        assert_eq!(None, plain_filename("sounds/"));
        assert_eq!(None, plain_filename("..\\beep.mp3"));
    }

    #[test]
    fn test_resolve_stays_inside_directory() {
        let dir = tempdir().unwrap();
        let assets = Assets::new(dir.path().join("default"), dir.path().join("uploaded")).unwrap();

        assert!(matches!(
            assets.resolve(AudioType::DefaultAudio, "../uploaded/secret.mp3"),
            Err(Error::InvalidName)
        ));

        let path = assets.resolve(AudioType::DefaultAudio, "my beep.mp3").unwrap();
        assert_eq!(dir.path().join("default").join("my beep.mp3"), path);
    }
}
