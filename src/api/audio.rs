//! Audio API endpoints
//!
//! Listing, uploading, serving and removing sounds

use axum::Extension;
use axum::extract::Multipart;
use axum::extract::Request;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::assets;
use crate::assets::Assets;
use crate::assets::AudioFiles;
use crate::reminder::AudioType;

use super::Error;
use super::Message;
use super::PathParameters;
use super::Success;

/// Name of the multipart field holding the upload
const UPLOAD_FIELD: &str = "audio_file";

/// List the built-in and uploaded sounds
///
/// Response:
/// ```json
/// { "available": [ "default_beep.mp3" ], "uploaded": [ "<uuid>_song.mp3" ] }
/// ```
pub async fn list(Extension(assets): Extension<Assets>) -> Success<AudioFiles> {
    Success::ok(assets.list())
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    message: &'static str,
    filename: String,
    audio_type: AudioType,
}

/// Upload a sound
///
/// Request:
/// ```sh
/// curl -v -F 'audio_file=@song.mp3' http://localhost:5000/upload_audio
/// ```
///
/// Response:
/// ```json
/// { "message": "File uploaded successfully", "filename": "<uuid>_song.mp3", "audio_type": "uploaded_audio" }
/// ```
pub async fn upload(
    Extension(assets): Extension<Assets>,
    mut multipart: Multipart,
) -> Result<Success<UploadResponse>, Error> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| Error::bad_request("Invalid multipart body").with_description(err))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.is_empty() {
            return Err(Error::bad_request("No selected file"));
        }

        let content = field
            .bytes()
            .await
            .map_err(|err| Error::bad_request("Invalid multipart body").with_description(err))?;

        let filename = assets
            .store_upload(&original_name, &content)
            .map_err(|err| match err {
                assets::Error::InvalidName => Error::bad_request("Invalid file name"),
                err => Error::internal_server_error("Error saving file").with_description(err),
            })?;

        return Ok(Success::ok(UploadResponse {
            message: "File uploaded successfully",
            filename,
            audio_type: AudioType::UploadedAudio,
        }));
    }

    Err(Error::bad_request("No audio_file part in the request"))
}

/// Serve a built-in sound
pub async fn serve_default(
    Extension(assets): Extension<Assets>,
    PathParameters(filename): PathParameters<String>,
    request: Request,
) -> Result<Response, Error> {
    serve(&assets, AudioType::DefaultAudio, &filename, request).await
}

/// Serve an uploaded sound
pub async fn serve_uploaded(
    Extension(assets): Extension<Assets>,
    PathParameters(filename): PathParameters<String>,
    request: Request,
) -> Result<Response, Error> {
    serve(&assets, AudioType::UploadedAudio, &filename, request).await
}

/// Remove an uploaded sound
///
/// Request:
/// ```sh
/// curl -v -XDELETE http://localhost:5000/uploaded_audio/<uuid>_song.mp3
/// ```
pub async fn delete_uploaded(
    Extension(assets): Extension<Assets>,
    PathParameters(filename): PathParameters<String>,
) -> Result<Success<Message>, Error> {
    match assets.remove_upload(&filename) {
        Ok(()) => Ok(Success::ok(Message::new("File deleted successfully"))),
        Err(assets::Error::NotFound | assets::Error::InvalidName) => {
            Err(Error::not_found("File not found in uploaded folder"))
        }
        Err(err) => Err(Error::internal_server_error("Error deleting file").with_description(err)),
    }
}

async fn serve(
    assets: &Assets,
    audio_type: AudioType,
    filename: &str,
    request: Request,
) -> Result<Response, Error> {
    let path = assets
        .resolve(audio_type, filename)
        .map_err(|_| Error::not_found("Audio file not found"))?;

    if !path.is_file() {
        return Err(Error::not_found("Audio file not found"));
    }

    let Ok(response) = ServeFile::new(path).oneshot(request).await;

    Ok(response.into_response())
}
