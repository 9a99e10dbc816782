//! Route handlers

pub mod auth;
pub mod weather;

use crate::middleware::LOGIN_PATH;
use crate::session::AuthenticatedUser;
use axum::Json;
use serde_json::{json, Value};

/// Landing document listing the endpoints
pub async fn index(user: Option<AuthenticatedUser>) -> Json<Value> {
    Json(json!({
        "user": user.and_then(|u| u.name),
        "endpoints": {
            "login": LOGIN_PATH,
            "logout": auth::LOGOUT_PATH,
            "user": "/authentication/user",
            "weatherForecast": "/weather-forecast",
        }
    }))
}
