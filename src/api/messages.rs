use crate::api::AppState;
use crate::api::schemas::messaging::{ListMessagesParams, MessageListResponse, SendMessageParams};
use crate::error::{AppError, Result};
use axum::{
    Form, Json,
    body::Bytes,
    extract::{FromRequest, Query, Request, State, rejection::QueryRejection},
    http::{StatusCode, header},
};

/// Lists stored messages, optionally filtered by `?status=`.
///
/// # Errors
/// Returns `AppError::Validation` if the query string is malformed.
/// Returns `AppError::Persistence` if the store cannot be queried.
pub async fn list_messages(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListMessagesParams>, QueryRejection>,
) -> Result<Json<MessageListResponse>> {
    let Query(params) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    let messages = state.message_service.list(params.status.as_deref()).await?;
    Ok(Json(messages.into()))
}

/// Accepts a message for asynchronous delivery.
///
/// `text` is read from the query string, falling back to a JSON or form-encoded body.
/// Responds with `204 No Content` once the message is queued; persistence happens afterwards.
///
/// # Errors
/// Returns `AppError::Validation` if the text is missing, blank or too long, or the query or body is malformed.
/// Returns `AppError::UnsupportedMediaType` if a body is sent in any other format.
/// Returns `AppError::Dispatch` if the message could not be queued.
pub async fn send_message(
    State(state): State<AppState>,
    query: std::result::Result<Query<SendMessageParams>, QueryRejection>,
    request: Request,
) -> Result<StatusCode> {
    let Query(params) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let text = match params.text {
        Some(text) => Some(text),
        None => text_from_body(request).await?,
    };

    state.message_service.submit(text)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn text_from_body(request: Request) -> Result<Option<String>> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(params) = Json::<SendMessageParams>::from_request(request, &())
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        return Ok(params.text);
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(params) = Form::<SendMessageParams>::from_request(request, &())
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        return Ok(params.text);
    }

    let body = Bytes::from_request(request, &()).await.map_err(|e| AppError::Validation(e.body_text()))?;
    if body.is_empty() {
        Ok(None)
    } else {
        Err(AppError::UnsupportedMediaType(format!(
            "Unsupported content type {content_type:?}; send text as a query parameter, JSON or form body"
        )))
    }
}
