//! Mapping domain errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::catalog::CatalogError;
use crate::character::{CharacterError, StoreError};
use crate::combat::BattleError;
use crate::shop::ShopError;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error on its way to the client
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(e: impl std::fmt::Display) -> Self {
        warn!("Internal error: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::not_found(e.to_string()),
            StoreError::AlreadyExists(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            StoreError::Serialization(_) | StoreError::Database(_) => Self::internal(e),
        }
    }
}

impl From<CharacterError> for ApiError {
    fn from(e: CharacterError) -> Self {
        match e {
            CharacterError::NoAttributePoints => Self::new(StatusCode::CONFLICT, e.to_string()),
            _ => Self::bad_request(e.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(_) => Self::not_found(e.to_string()),
            CatalogError::Invalid(_) => Self::bad_request(e.to_string()),
            CatalogError::Database(_) => Self::internal(e),
        }
    }
}

impl From<ShopError> for ApiError {
    fn from(e: ShopError) -> Self {
        match e {
            ShopError::InsufficientGold { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ShopError::UnknownItem(_) => Self::not_found(e.to_string()),
            ShopError::Catalog(e) => e.into(),
            ShopError::Store(e) => e.into(),
        }
    }
}

impl From<BattleError> for ApiError {
    fn from(e: BattleError) -> Self {
        match e {
            BattleError::CharacterBusy(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            BattleError::NotFound(_) => Self::not_found(e.to_string()),
            _ => Self::bad_request(e.to_string()),
        }
    }
}
