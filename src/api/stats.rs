use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_tz_offset;
use crate::db::{now_millis, FastSession};
use crate::stats::{self, TzOffset, WeeklyStats};
use crate::AppState;

const TZ_OFFSET_PARAM: &str = "tzOffsetMinutes";

/// Only `tzOffsetMinutes` is accepted, at most once.
fn parse_weekly_query(params: &[(String, String)]) -> Result<TzOffset, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    let mut offset = None;

    for (key, value) in params {
        if key != TZ_OFFSET_PARAM {
            errors.add(key.as_str(), format!("Unrecognized query parameter '{}'", key));
        } else if offset.is_some() {
            errors.add(TZ_OFFSET_PARAM, "Expected a single value");
        } else {
            offset = Some(value.as_str());
        }
    }

    let offset = errors.check(TZ_OFFSET_PARAM, validate_tz_offset(offset));
    errors.finish()?;

    Ok(offset.unwrap_or_default())
}

/// Totals, average and streak for the trailing seven local days
pub async fn weekly(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<WeeklyStats>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::validation_field("query", e.body_text()))?;
    let offset = parse_weekly_query(&params)?;

    let now = now_millis();
    let window = FastSession::spans_since(&state.db, &auth.id, stats::window_start(now, offset)).await?;
    let starts = FastSession::starts_since(&state.db, &auth.id, stats::streak_start(now, offset)).await?;

    Ok(Json(stats::weekly_stats(&window, &starts, now, offset)))
}
