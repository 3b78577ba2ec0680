use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, UserIdentity};
use crate::features::conversations::dtos::{
    CreateThreadDto, RenameThreadDto, ThreadDetailDto, ThreadSummaryDto,
};
use crate::features::conversations::services::ConversationService;
use crate::shared::types::{ApiResponse, Meta};

/// POST /api/threads
/// Create an empty conversation thread
#[utoipa::path(
    post,
    path = "/api/threads",
    request_body = CreateThreadDto,
    responses(
        (status = 201, description = "Thread created", body = ApiResponse<ThreadDetailDto>),
        (status = 400, description = "Missing user header or invalid name")
    ),
    tag = "threads",
    security(
        ("user_id" = [])
    )
)]
pub async fn create_thread(
    user: UserIdentity,
    State(service): State<Arc<ConversationService>>,
    AppJson(dto): AppJson<CreateThreadDto>,
) -> Result<(StatusCode, Json<ApiResponse<ThreadDetailDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let thread = service
        .create_thread(user.as_str(), dto.thread_name.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(thread.into()),
            Some("Thread created".to_string()),
            None,
        )),
    ))
}

/// GET /api/threads
/// List the caller's threads, most recently updated first
#[utoipa::path(
    get,
    path = "/api/threads",
    responses(
        (status = 200, description = "List of threads", body = ApiResponse<Vec<ThreadSummaryDto>>),
        (status = 400, description = "Missing or invalid user header")
    ),
    tag = "threads",
    security(
        ("user_id" = [])
    )
)]
pub async fn list_threads(
    user: UserIdentity,
    State(service): State<Arc<ConversationService>>,
) -> Result<Json<ApiResponse<Vec<ThreadSummaryDto>>>> {
    let threads: Vec<ThreadSummaryDto> = service
        .list_threads(user.as_str())
        .await?
        .into_iter()
        .map(ThreadSummaryDto::from)
        .collect();
    let total = threads.len() as i64;

    Ok(Json(ApiResponse::success(
        Some(threads),
        None,
        Some(Meta { total }),
    )))
}

/// GET /api/threads/{id}
/// Get a thread with all of its messages
#[utoipa::path(
    get,
    path = "/api/threads/{id}",
    params(
        ("id" = Uuid, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Thread details", body = ApiResponse<ThreadDetailDto>),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads",
    security(
        ("user_id" = [])
    )
)]
pub async fn get_thread(
    user: UserIdentity,
    State(service): State<Arc<ConversationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ThreadDetailDto>>> {
    let thread = service.get_thread(user.as_str(), id).await?;

    Ok(Json(ApiResponse::success(Some(thread.into()), None, None)))
}

/// PUT /api/threads/{id}/rename
/// Rename a thread; messages and totals are untouched
#[utoipa::path(
    put,
    path = "/api/threads/{id}/rename",
    params(
        ("id" = Uuid, Path, description = "Thread ID")
    ),
    request_body = RenameThreadDto,
    responses(
        (status = 200, description = "Thread renamed", body = ApiResponse<ThreadDetailDto>),
        (status = 400, description = "Invalid name"),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads",
    security(
        ("user_id" = [])
    )
)]
pub async fn rename_thread(
    user: UserIdentity,
    State(service): State<Arc<ConversationService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<RenameThreadDto>,
) -> Result<Json<ApiResponse<ThreadDetailDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let thread = service
        .rename_thread(user.as_str(), id, &dto.new_name)
        .await?;

    Ok(Json(ApiResponse::success(
        Some(thread.into()),
        Some("Thread renamed".to_string()),
        None,
    )))
}

/// DELETE /api/threads/{id}
/// Delete a thread and all of its messages
#[utoipa::path(
    delete,
    path = "/api/threads/{id}",
    params(
        ("id" = Uuid, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Thread deleted"),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads",
    security(
        ("user_id" = [])
    )
)]
pub async fn delete_thread(
    user: UserIdentity,
    State(service): State<Arc<ConversationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_thread(user.as_str(), id).await?;

    Ok(Json(ApiResponse::success(
        None,
        Some("Thread deleted".to_string()),
        None,
    )))
}
