//! Protected weather forecast endpoint

use crate::server::AppState;
use crate::session::AuthenticatedUser;
use crate::weather::WeatherForecast;
use axum::extract::State;
use axum::Json;

pub async fn forecast(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Json<Vec<WeatherForecast>> {
    tracing::debug!(subject = ?user.subject, "Serving weather forecast");
    Json(state.forecaster.forecast().await)
}
