use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::auth::AuthUser;
use super::error::{is_unique_violation, ApiError, ValidationErrorBuilder};
use super::extract::JsonBody;
use super::validation::{
    validate_hours_target, validate_iso_week, validate_path_id, validate_period, validate_year,
};
use crate::db::{Goal, GoalFields, GoalRequest, GoalResponse};
use crate::AppState;

fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

fn map_goal_write_error(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::conflict("A weekly goal already exists for this week")
    } else {
        ApiError::from(err)
    }
}

/// Validate a goal body. On create `period` and `hoursTarget` are required.
fn validate_goal_request(request: &GoalRequest, partial: bool) -> Result<GoalFields, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let period = match &request.period {
        Some(period) => errors.check("period", validate_period(period)),
        None => {
            if !partial {
                errors.add("period", "Required");
            }
            None
        }
    };

    let hours_target = match &request.hours_target {
        Some(hours) => errors.check("hoursTarget", validate_hours_target(hours)),
        None => {
            if !partial {
                errors.add("hoursTarget", "Required");
            }
            None
        }
    };

    let start_iso_week = request
        .start_iso_week
        .as_ref()
        .and_then(|week| errors.check("startISOWeek", validate_iso_week(week)));
    let year = request
        .year
        .as_ref()
        .and_then(|year| errors.check("year", validate_year(year)));

    errors.finish()?;

    Ok(GoalFields {
        period,
        hours_target,
        start_iso_week,
        year,
    })
}

pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<GoalResponse>>, ApiError> {
    let goals = Goal::list_for_user(&state.db, &auth.id).await?;
    Ok(Json(goals.iter().map(Goal::to_response).collect()))
}

pub async fn get_goal(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<GoalResponse>, ApiError> {
    validate_path_id(&id)?;

    let goal = Goal::find_for_user(&state.db, &auth.id, &id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(goal.to_response()))
}

pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    JsonBody(request): JsonBody<GoalRequest>,
) -> Result<(StatusCode, Json<GoalResponse>), ApiError> {
    let fields = validate_goal_request(&request, false)?;

    let (Some(period), Some(hours_target)) = (fields.period, fields.hours_target) else {
        return Err(ApiError::bad_request("Invalid request"));
    };

    let goal = Goal::create(
        &state.db,
        &auth.id,
        period,
        hours_target,
        fields.start_iso_week,
        fields.year,
    )
    .await
    .map_err(map_goal_write_error)?;

    info!(user_id = %auth.id, goal_id = %goal.id, period = period.as_str(), "Goal created");

    Ok((StatusCode::CREATED, Json(goal.to_response())))
}

pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<GoalRequest>,
) -> Result<Json<GoalResponse>, ApiError> {
    validate_path_id(&id)?;
    let fields = validate_goal_request(&request, true)?;

    let goal = Goal::update_for_user(&state.db, &auth.id, &id, &fields)
        .await
        .map_err(map_goal_write_error)?
        .ok_or_else(not_found)?;

    info!(user_id = %auth.id, goal_id = %goal.id, "Goal updated");

    Ok(Json(goal.to_response()))
}

pub async fn delete_goal(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_path_id(&id)?;

    if !Goal::delete_for_user(&state.db, &auth.id, &id).await? {
        return Err(not_found());
    }

    info!(user_id = %auth.id, goal_id = %id, "Goal deleted");

    Ok(StatusCode::NO_CONTENT)
}
