//! Server clock, so clients can correct for their own skew

use chrono::SecondsFormat;
use chrono::Utc;
use serde::Serialize;

use super::Success;

#[derive(Debug, Serialize)]
pub struct TimeResponse {
    server_time: String,
}

/// Current server time
///
/// Response:
/// ```json
/// { "server_time": "2024-01-01T00:00:00.000000+00:00" }
/// ```
pub async fn now() -> Success<TimeResponse> {
    Success::ok(TimeResponse {
        server_time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
    })
}
