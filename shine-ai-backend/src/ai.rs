//! `POST /ai`: forwards a completion request to Anthropic with the server's key.
//!
//! Whenever a completion can't be produced (no key, upstream failure, garbage in)
//! the route still answers 200 with `{ "fallback": true }` so the client switches to
//! its local content instead of showing an error.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use shine_types::assist::{AiRequest, ChatMessage, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, FallbackSignal};

use crate::AppState;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
}

fn fallback() -> Response {
    Json(FallbackSignal::FALLBACK).into_response()
}

pub async fn complete(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(api_key) = state.config.anthropic_api_key.as_deref() else {
        return fallback();
    };

    let request: AiRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("unreadable completion request: {e}");
            return fallback();
        }
    };

    match forward(&state, api_key, &request).await {
        Ok(completion) => Json(completion).into_response(),
        Err(message) => {
            log::warn!("completion failed, signalling fallback: {message}");
            fallback()
        }
    }
}

async fn forward(state: &AppState, api_key: &str, request: &AiRequest) -> Result<Value, String> {
    let upstream = MessagesRequest {
        model: request
            .model
            .as_deref()
            .filter(|model| !model.is_empty())
            .unwrap_or(DEFAULT_MODEL),
        max_tokens: request
            .max_tokens
            .filter(|&tokens| tokens > 0)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        system: Some(request.system.as_str()).filter(|system| !system.is_empty()),
        messages: &request.messages,
    };

    let response = state
        .http
        .post(format!(
            "{}/v1/messages",
            state.config.anthropic_base_url.trim_end_matches('/')
        ))
        .header("Content-Type", "application/json")
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&upstream)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("upstream responded with {status}: {body}"));
    }

    response.json::<Value>().await.map_err(|e| e.to_string())
}
