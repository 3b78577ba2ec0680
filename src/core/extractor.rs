use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;

use crate::core::error::AppError;
use crate::shared::constants::USER_ID_HEADER;
use crate::shared::validation::USER_ID_REGEX;

/// Custom JSON extractor that provides consistent error responses
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppJsonRejection;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => Err(AppJsonRejection(rejection)),
        }
    }
}

pub struct AppJsonRejection(JsonRejection);

impl IntoResponse for AppJsonRejection {
    fn into_response(self) -> Response {
        let message = match self.0 {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("Invalid JSON syntax: {}", err),
            JsonRejection::MissingJsonContentType(err) => {
                format!("Missing JSON content type: {}", err)
            }
            _ => "Failed to parse JSON body".to_string(),
        };

        AppError::BadRequest(message).into_response()
    }
}

/// Caller identity taken from the `x-user-uuid` header.
///
/// The value is opaque and is not checked against any identity provider. It is
/// only required to be present and to be a safe path/key segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity(pub String);

impl UserIdentity {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(AppError::Validation(format!(
                "{} header must not be empty",
                USER_ID_HEADER
            )));
        }
        if !USER_ID_REGEX.is_match(value) {
            return Err(AppError::Validation(format!(
                "{} header contains unsupported characters",
                USER_ID_HEADER
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| {
                AppError::Validation(format!("Missing {} header", USER_ID_HEADER))
            })?
            .to_str()
            .map_err(|_| {
                AppError::Validation(format!("{} header must be valid ASCII", USER_ID_HEADER))
            })?;

        UserIdentity::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_identity_accepts_uuid() {
        let id = UserIdentity::parse("b4d6f3e2-8c9a-4d2b-9f1e-3a5c7d8e9f1a").unwrap();
        assert_eq!(id.as_str(), "b4d6f3e2-8c9a-4d2b-9f1e-3a5c7d8e9f1a");
    }

    #[test]
    fn test_user_identity_trims_whitespace() {
        let id = UserIdentity::parse("  trader_01  ").unwrap();
        assert_eq!(id.as_str(), "trader_01");
    }

    #[test]
    fn test_user_identity_rejects_blank_and_unsafe_values() {
        assert!(matches!(
            UserIdentity::parse("   "),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            UserIdentity::parse("../etc"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            UserIdentity::parse("a/b"),
            Err(AppError::Validation(_))
        ));
    }
}
