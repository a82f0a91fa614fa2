use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Request body for `POST /ask-ollama`.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub prompt: Option<String>,
    /// Falls back to `backends.default_model` when absent
    pub model: Option<String>,
}

/// `POST /ask-ollama`
///
/// Relays one prompt to the language-model backend and returns only its
/// `response` text.
pub async fn ask_ollama(
    state: web::Data<AppState>,
    body: web::Json<AskRequest>,
) -> Result<HttpResponse, AppError> {
    let AskRequest { prompt, model } = body.into_inner();

    let prompt = prompt.ok_or_else(|| AppError::Input("No prompt provided".to_string()))?;
    let model = model.unwrap_or_else(|| state.config.backends.default_model.clone());

    info!(model = %model, prompt_len = prompt.len(), "Forwarding prompt");

    let response = state
        .backend
        .generate(&model, &prompt)
        .await
        .inspect_err(|e| super::log_failure("/ask-ollama", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "response": response
    })))
}
