//! Turns a non-success response into an `ApiError`.

use tracing::debug;

use crate::error::{ApiError, RequestError, RECORD_NOT_FOUND};
use crate::http::HttpResponse;
use crate::types::ErrorBody;

/// Header line the API puts in front of its validation messages.
pub const VALIDATION_HEADER: &str = "validation failure list:";

/// Normalize an unexpected response.
///
/// The body is parsed first; if that fails the result is `UnmarshalFailure`
/// whatever the status. Otherwise:
/// - 400: validation lines minus the header, each terminated by `;`
/// - 404: the fixed `RECORD_NOT_FOUND` message
/// - anything else: the server's message unchanged
pub fn normalize_response(response: HttpResponse) -> ApiError {
    let body = match parse_error_body(&response.body) {
        Ok(body) => body,
        Err(err) => return err,
    };

    let message = match response.status {
        400 => join_validation_messages(&body.error_message),
        404 => RECORD_NOT_FOUND.to_string(),
        _ => body.error_message,
    };

    debug!(status = response.status, %message, "normalized error response");
    RequestError::new(response.status, message).into()
}

fn parse_error_body(body: &[u8]) -> Result<ErrorBody, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ErrorBody::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::UnmarshalFailure(e.to_string()))
}

fn join_validation_messages(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case(VALIDATION_HEADER))
        .map(|line| format!("{line};"))
        .collect()
}
