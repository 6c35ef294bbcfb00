//! Reminders
//!
//! The one persisted entity, plus the tolerant wrapper used to read it back from disk

use core::fmt;

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Formats accepted for timestamps without an offset, interpreted as UTC
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Where an audio cue lives
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioType {
    /// Built-in sounds, never deleted
    DefaultAudio,

    /// Sounds uploaded by users, removed together with their reminder
    UploadedAudio,
}

/// A pending reminder
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Reminder {
    /// Reminder ID, assigned once at creation
    pub id: String,

    /// What to remind about
    pub text: String,

    /// When to remind, as submitted by the client
    pub time: String,

    /// Name of the audio cue, if any
    #[serde(default)]
    pub audio_filename: Option<String>,

    /// Origin of the audio cue
    #[serde(default)]
    pub audio_type: Option<AudioType>,

    /// Fields we do not know about, kept so a rewrite does not lose them
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reminder {
    /// Does this reminder reference an uploaded asset?
    pub fn uploaded_audio(&self) -> Option<&str> {
        match self.audio_type {
            Some(AudioType::UploadedAudio) => self.audio_filename.as_deref(),
            _ => None,
        }
    }

    /// Parse the trigger time
    pub fn due_at(&self) -> Result<DateTime<Utc>, TimeError> {
        parse_time(&self.time)
    }
}

/// A record as found in the store
///
/// Records that do not look like a reminder are carried along untouched, they are never
/// scheduled and never dropped
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredRecord {
    /// Well-formed reminder
    Reminder(Reminder),

    /// Anything else
    Unparsed(Value),
}

impl StoredRecord {
    /// ID of the record, when it has one
    pub fn id(&self) -> Option<&str> {
        match self {
            StoredRecord::Reminder(reminder) => Some(&reminder.id),
            StoredRecord::Unparsed(value) => value.get("id").and_then(Value::as_str),
        }
    }

    /// Parsed trigger time, used for ordering and for the due check
    pub fn due_at(&self) -> Result<DateTime<Utc>, TimeError> {
        match self {
            StoredRecord::Reminder(reminder) => reminder.due_at(),
            StoredRecord::Unparsed(value) => match value.get("time") {
                Some(Value::String(time)) => parse_time(time),
                _ => Err(TimeError::Missing),
            },
        }
    }
}

/// Why a trigger time could not be used
#[derive(Debug, PartialEq, Eq)]
pub enum TimeError {
    /// No time at all
    Missing,

    /// Time is not a timestamp we understand
    Invalid(String),
}

impl std::error::Error for TimeError {}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimeError::Missing => write!(f, "Missing time"),
            TimeError::Invalid(time) => write!(f, "Invalid time: {time:?}"),
        }
    }
}

/// Parse a timestamp strictly
///
/// RFC 3339 with `Z` or a numeric offset, or a timestamp without offset which is taken as UTC
pub fn parse_time(time: &str) -> Result<DateTime<Utc>, TimeError> {
    let time = time.trim();

    if time.is_empty() {
        return Err(TimeError::Missing);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(time) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(time, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimeError::Invalid(time.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_time_with_offset() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(Ok(expected), parse_time("2024-01-01T00:00:00+00:00"));
        assert_eq!(Ok(expected), parse_time("2024-01-01T00:00:00Z"));
        assert_eq!(Ok(expected), parse_time("2024-01-01T02:00:00+02:00"));
        assert_eq!(Ok(expected), parse_time("2023-12-31T19:00:00.000-05:00"));
    }

    #[test]
    fn test_parse_time_without_offset_is_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap();

        assert_eq!(Ok(expected), parse_time("2024-01-01T10:30:00"));
        assert_eq!(Ok(expected), parse_time("2024-01-01T10:30"));
        assert_eq!(Ok(expected), parse_time("2024-01-01 10:30:00"));
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert_eq!(Err(TimeError::Missing), parse_time(""));
        assert_eq!(Err(TimeError::Missing), parse_time("   "));
        assert!(matches!(parse_time("tomorrow"), Err(TimeError::Invalid(_))));
        assert!(matches!(parse_time("2024-13-01T00:00:00Z"), Err(TimeError::Invalid(_))));
        assert!(matches!(parse_time("-2024-01-01"), Err(TimeError::Invalid(_))));
    }

    #[test]
    fn test_stored_record_variants() {
        let reminder: StoredRecord = serde_json::from_value(json!({
            "id": "a",
            "text": "Stand up",
            "time": "2024-01-01T00:00:00+00:00",
            "audio_filename": null,
            "audio_type": null,
        }))
        .unwrap();
        assert!(matches!(reminder, StoredRecord::Reminder(_)));
        assert_eq!(Some("a"), reminder.id());

        let missing_time: StoredRecord =
            serde_json::from_value(json!({ "id": "b", "text": "No time" })).unwrap();
        assert!(matches!(missing_time, StoredRecord::Unparsed(_)));
        assert_eq!(Some("b"), missing_time.id());
        assert_eq!(Err(TimeError::Missing), missing_time.due_at());

        let unknown_audio: StoredRecord = serde_json::from_value(json!({
            "id": "c",
            "text": "Odd sound",
            "time": "2024-01-01T00:00:00+00:00",
            "audio_type": "cloud_audio",
        }))
        .unwrap();
        assert!(matches!(unknown_audio, StoredRecord::Unparsed(_)));
        assert!(unknown_audio.due_at().is_ok());
    }

    #[test]
    fn test_unknown_fields_survive() {
        let value = json!({
            "id": "a",
            "text": "Stand up",
            "time": "2024-01-01T00:00:00+00:00",
            "audio_filename": "beep.mp3",
            "audio_type": "default_audio",
            "color": "red",
        });

        let record: StoredRecord = serde_json::from_value(value.clone()).unwrap();
        assert!(matches!(record, StoredRecord::Reminder(_)));
        assert_eq!(value, serde_json::to_value(&record).unwrap());
    }

    #[test]
    fn test_uploaded_audio() {
        let mut reminder = Reminder {
            id: "a".to_string(),
            text: "Stand up".to_string(),
            time: "2024-01-01T00:00:00+00:00".to_string(),
            audio_filename: Some("beep.mp3".to_string()),
            audio_type: Some(AudioType::DefaultAudio),
            extra: Map::new(),
        };
        assert_eq!(None, reminder.uploaded_audio());

        reminder.audio_type = Some(AudioType::UploadedAudio);
        assert_eq!(Some("beep.mp3"), reminder.uploaded_audio());
    }
}
