//! Reminder API endpoints

use axum::Extension;
use serde::Deserialize;

use crate::reminder::AudioType;
use crate::reminder::Reminder;
use crate::reminder::StoredRecord;
use crate::repository;
use crate::repository::CreateReminderValues;
use crate::repository::Reminders;

use super::Error;
use super::Form;
use super::Message;
use super::PathParameters;
use super::Success;

/// List all pending reminders
///
/// Malformed records are listed as they are stored
///
/// Request:
/// ```sh
/// curl -v http://localhost:5000/reminders
/// ```
///
/// Response:
/// ```json
/// [ { "id": "<uuid>", "text": "Stand up", "time": "2024-01-01T00:00:00+00:00", ... } ]
/// ```
pub async fn list(
    Extension(reminders): Extension<Reminders>,
) -> Result<Success<Vec<StoredRecord>>, Error> {
    reminders
        .list_all()
        .await
        .map(Success::ok)
        .map_err(repository_error)
}

/// Create reminder form
///
/// `text` and `time` are optional here so a missing one gets a proper message
#[derive(Debug, Deserialize)]
pub struct CreateReminderForm {
    /// What to remind about
    text: Option<String>,

    /// When to remind, RFC 3339 or UTC without offset
    time: Option<String>,

    /// Name of the audio cue, any plain file name as listed by `/audio_files`
    audio_filename: Option<String>,

    /// Origin of the audio cue
    audio_type: Option<AudioType>,
}

/// Create a reminder based on the [`CreateReminderForm`](CreateReminderForm) form
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "text": "Stand up", "time": "2024-01-01T00:00:00+00:00" }' \
///     http://localhost:5000/reminders
/// ```
///
/// Response:
/// ```json
/// { "id": "<uuid>", "text": "Stand up", "time": "2024-01-01T00:00:00+00:00", ... }
/// ```
pub async fn create(
    Extension(reminders): Extension<Reminders>,
    Form(form): Form<CreateReminderForm>,
) -> Result<Success<Reminder>, Error> {
    let values = CreateReminderValues {
        text: form.text.as_deref(),
        time: form.time.as_deref(),
        audio_filename: form.audio_filename.as_deref(),
        audio_type: form.audio_type,
    };

    reminders
        .create(&values)
        .await
        .map(Success::created)
        .map_err(repository_error)
}

/// Delete a reminder, and the uploaded sound it used
///
/// Request:
/// ```sh
/// curl -v -XDELETE http://localhost:5000/reminders/<uuid>
/// ```
pub async fn delete(
    Extension(reminders): Extension<Reminders>,
    PathParameters(reminder_id): PathParameters<String>,
) -> Result<Success<Message>, Error> {
    reminders
        .delete(&reminder_id)
        .await
        .map_err(repository_error)?;

    Ok(Success::ok(Message::new("Reminder deleted")))
}

fn repository_error(err: repository::Error) -> Error {
    match err {
        repository::Error::Validation(message) => Error::bad_request(message),
        repository::Error::NotFound => Error::not_found("Reminder not found"),
        repository::Error::Storage(err) => {
            Error::internal_server_error("Could not save reminders").with_description(err)
        }
        repository::Error::Task(err) => {
            Error::internal_server_error("Could not access reminders").with_description(err)
        }
    }
}
