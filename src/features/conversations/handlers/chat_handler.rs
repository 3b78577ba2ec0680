use std::sync::Arc;

use axum::{extract::State, Json};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, UserIdentity};
use crate::features::conversations::dtos::ChatRequestDto;
use crate::features::conversations::models::NormalizedOutput;
use crate::features::conversations::services::ConversationService;
use crate::shared::types::ApiResponse;

/// POST /api/chat
/// Run one chat turn, creating the thread when no id is given
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequestDto,
    responses(
        (status = 200, description = "Normalized assistant reply", body = ApiResponse<NormalizedOutput>),
        (status = 400, description = "Missing user header or invalid query"),
        (status = 404, description = "Thread not found"),
        (status = 503, description = "Agent unavailable, safe to retry")
    ),
    tag = "chat",
    security(
        ("user_id" = [])
    )
)]
pub async fn chat(
    user: UserIdentity,
    State(service): State<Arc<ConversationService>>,
    AppJson(dto): AppJson<ChatRequestDto>,
) -> Result<Json<ApiResponse<NormalizedOutput>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let output = service
        .chat(user.as_str(), &dto.query, dto.conversation_id)
        .await?;

    Ok(Json(ApiResponse::success(Some(output), None, None)))
}
