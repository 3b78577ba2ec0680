use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::conversations::{dtos, handlers, models};
use crate::shared::constants::USER_ID_HEADER;
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Threads
        handlers::thread_handler::create_thread,
        handlers::thread_handler::list_threads,
        handlers::thread_handler::get_thread,
        handlers::thread_handler::rename_thread,
        handlers::thread_handler::delete_thread,
        // Chat
        handlers::chat_handler::chat,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Threads
            dtos::CreateThreadDto,
            dtos::RenameThreadDto,
            dtos::ThreadSummaryDto,
            dtos::ThreadDetailDto,
            dtos::MessageDto,
            dtos::MessageMetadataDto,
            models::MessageRole,
            ApiResponse<dtos::ThreadDetailDto>,
            ApiResponse<Vec<dtos::ThreadSummaryDto>>,
            // Chat
            dtos::ChatRequestDto,
            models::NormalizedOutput,
            ApiResponse<models::NormalizedOutput>,
        )
    ),
    tags(
        (name = "threads", description = "Conversation thread management"),
        (name = "chat", description = "Trading assistant chat turns"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "TradeAssist API",
        version = "0.1.0",
        description = "Conversation API for the trading assistant",
    )
)]
pub struct ApiDoc;

/// Adds the user identity header as an API key scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER))),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for path in [
            "/api/threads",
            "/api/threads/{id}",
            "/api/threads/{id}/rename",
            "/api/chat",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == path), "missing {}", path);
        }
    }

    #[test]
    fn test_user_header_security_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();

        assert!(components.security_schemes.contains_key("user_id"));
    }
}
