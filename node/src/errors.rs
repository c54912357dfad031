// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use busline_kernel::{KernelError, ValidationError};
use busline_persistence::PersistenceError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("invalid JSON body: {0}")]
    MalformedPayload(String),
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(#[from] PersistenceError),
    #[error("recovery failed: {0}")]
    Recovery(String),
    #[error("Internal server error")]
    Internal,
}

impl NodeError {
    pub fn status(&self) -> StatusCode {
        match self {
            NodeError::Validation(_) | NodeError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            NodeError::NotFound(_) => StatusCode::NOT_FOUND,
            NodeError::Storage(_) | NodeError::Recovery(_) | NodeError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage details stay in the server log.
        let message = match &self {
            NodeError::Storage(e) => {
                tracing::error!("storage failure: {}", e);
                "failed to persist report".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<KernelError> for NodeError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::Validation(v) => NodeError::Validation(v),
            KernelError::NotFound(device) => NodeError::NotFound(device),
            KernelError::OutOfOrder { .. } => {
                tracing::error!("kernel rejected append: {}", e);
                NodeError::Internal
            }
        }
    }
}
