//! All API endpoint setup

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;

pub use request::Form;
pub use request::PathParameters;
pub use response::Error;
pub use response::Message;
pub use response::Success;

mod audio;
mod events;
mod reminders;
mod request;
mod response;
mod time;

/// Largest accepted audio upload
const UPLOAD_LIMIT: usize = 32 * 1024 * 1024;

/// Get the Axum router for all API routes
pub fn router() -> Router {
    Router::new()
        .route("/reminders", get(reminders::list).post(reminders::create))
        .route("/reminders/{reminder}", delete(reminders::delete))
        .route("/time", get(time::now))
        .route("/audio_files", get(audio::list))
        .route(
            "/upload_audio",
            post(audio::upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/default_audio/{filename}", get(audio::serve_default))
        .route(
            "/uploaded_audio/{filename}",
            get(audio::serve_uploaded).delete(audio::delete_uploaded),
        )
        .route("/ws", get(events::connect))
}
