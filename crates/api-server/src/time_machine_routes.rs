//! Time Machine API Routes
//!
//! Timeline query endpoint for the replay view.

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use time_machine::symbols::display_symbol;
use time_machine::{EpochUnit, Timeframe, TimelineQuery, TimelineResponse, WindowRequest};

use crate::config::ServerConfig;
use crate::csv_source::parse_timestamp;
use crate::request_id::RequestId;
use crate::{ApiResponse, AppError, AppState};

/// Query string for `GET /api/time-machine/timeline`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineParams {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    /// Epoch seconds or a datetime string
    pub start: Option<String>,
    pub end: Option<String>,
    pub window_days: Option<i64>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl TimelineParams {
    pub fn into_query(self, config: &ServerConfig) -> Result<TimelineQuery, AppError> {
        let symbol = self
            .symbol
            .filter(|s| !s.trim().is_empty())
            .map(|s| display_symbol(&s))
            .unwrap_or_else(|| config.default_symbol.clone());

        let timeframe = match self.timeframe.as_deref() {
            Some(tf) if !tf.trim().is_empty() => tf.trim().parse::<Timeframe>()?,
            _ => config.default_timeframe,
        };

        Ok(TimelineQuery {
            symbol,
            timeframe,
            window: WindowRequest {
                start: bound("start", self.start.as_deref())?,
                end: bound("end", self.end.as_deref())?,
                window_days: self.window_days,
            },
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(config.default_limit),
        })
    }
}

fn bound(name: &str, raw: Option<&str>) -> Result<Option<i64>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_timestamp(s, EpochUnit::Seconds).map(Some).ok_or_else(|| {
            AppError::with_status(
                StatusCode::BAD_REQUEST,
                anyhow::anyhow!("Invalid {name} time: {s}"),
            )
        }),
    }
}

pub fn time_machine_routes() -> Router<AppState> {
    Router::new().route("/api/time-machine/timeline", get(get_timeline))
}

/// Merged, windowed and paged timeline for one symbol
async fn get_timeline(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<ApiResponse<TimelineResponse>>, AppError> {
    let query = params.into_query(&state.config)?;
    let response = state.timeline.query(&query).await?;

    tracing::info!(
        "[{}] Timeline {} {} page {}: {} of {} points",
        request_id,
        response.symbol,
        response.timeframe,
        response.page,
        response.points.len(),
        response.total
    );

    Ok(Json(ApiResponse::success(response)))
}
