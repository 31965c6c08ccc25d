use axum::{extract::State, response::Json, routing::get, Router};

use crate::{errors::ServiceError, services::analytics::DashboardStats, ApiResponse, AppState};

/// Build the dashboard Router scoped under `/api/v1/dashboard`.
pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_dashboard_stats))
}

/// Store-wide counts, revenue and best sellers
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard statistics computed", body = ApiResponse<DashboardStats>),
        (status = 500, description = "One of the underlying queries failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Dashboard"
)]
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardStats>>, ServiceError> {
    let stats = state.services.dashboard.get_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
