//! Error types for the navigation core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Route provider error: {0}")]
    RouteProvider(String),

    #[error("Background location unavailable: {0}")]
    BackgroundUnavailable(String),

    #[error("Notifications unavailable: {0}")]
    NotificationUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NavError>;
