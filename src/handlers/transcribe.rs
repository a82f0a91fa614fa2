use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

/// `POST /transcribe`
///
/// Accepts either a multipart form with a `file` field or a JSON body with a
/// base64 `audio_data` string, and answers with the backend's transcript:
///
/// ```json
/// { "status": "success", "text": "hello there", "language": "en" }
/// ```
pub async fn transcribe(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, AppError> {
    let result = state
        .pipeline
        .handle_transcribe(&req, payload)
        .await
        .inspect_err(|e| super::log_failure("/transcribe", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "text": result.text,
        "language": result.language
    })))
}
