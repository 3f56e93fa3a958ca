//! Fasting session endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::JsonBody;
use super::validation::{validate_datetime, validate_note, validate_path_id, validate_preset};
use crate::db::{
    now_millis, EditFastRequest, FastEdit, FastSession, FastSessionResponse, StartFastRequest,
    StopOutcome, User, LIST_LIMIT,
};
use crate::AppState;

fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

/// Validated start request
struct StartFast {
    preset: i64,
    start_at: i64,
}

fn validate_start_request(request: &StartFastRequest, now_ms: i64) -> Result<StartFast, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let preset = match &request.preset {
        Some(preset) => errors.check("preset", validate_preset(preset)),
        None => {
            errors.add("preset", "Required");
            None
        }
    };

    let start_at = match &request.start_at {
        Some(start_at) => errors.check("startAt", validate_datetime(start_at)),
        None => Some(now_ms),
    };

    match (preset, start_at) {
        (Some(preset), Some(start_at)) if errors.is_empty() => Ok(StartFast { preset, start_at }),
        _ => Err(errors.into_error()),
    }
}

fn validate_edit_request(request: &EditFastRequest) -> Result<FastEdit, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let note = request.note.as_ref().and_then(|note| {
        errors
            .check("note", validate_note(note))
            .map(|_| note.clone())
    });
    let preset = request
        .preset
        .as_ref()
        .and_then(|preset| errors.check("preset", validate_preset(preset)));
    let start_at = request
        .start_at
        .as_deref()
        .and_then(|start_at| errors.check("startAt", validate_datetime(start_at)));
    let end_at = request
        .end_at
        .as_deref()
        .and_then(|end_at| errors.check("endAt", validate_datetime(end_at)));

    errors.finish()?;

    Ok(FastEdit {
        note,
        preset,
        start_at,
        end_at,
    })
}

/// List the caller's most recent sessions, newest first
pub async fn list_fasts(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<FastSessionResponse>>, ApiError> {
    let sessions = FastSession::list_for_user(&state.db, &auth.id, LIST_LIMIT).await?;
    Ok(Json(sessions.iter().map(FastSession::to_response).collect()))
}

/// Get one session with its owner expanded
pub async fn get_fast(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FastSessionResponse>, ApiError> {
    validate_path_id(&id)?;

    let session = FastSession::find_for_user(&state.db, &auth.id, &id)
        .await?
        .ok_or_else(not_found)?;

    let response = match User::find_by_id(&state.db, &session.user_id).await? {
        Some(owner) => session.to_response_with_owner(owner.email),
        None => session.to_response(),
    };

    Ok(Json(response))
}

/// Start a new active session
pub async fn start_fast(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    JsonBody(request): JsonBody<StartFastRequest>,
) -> Result<(StatusCode, Json<FastSessionResponse>), ApiError> {
    let start = validate_start_request(&request, now_millis())?;

    let session = FastSession::create(&state.db, &auth.id, start.preset, start.start_at).await?;

    info!(
        user_id = %auth.id,
        fast_id = %session.id,
        preset = session.preset,
        "Fast started"
    );

    Ok((StatusCode::CREATED, Json(session.to_response())))
}

/// Stop an active session now
pub async fn stop_fast(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FastSessionResponse>, ApiError> {
    validate_path_id(&id)?;

    match FastSession::stop(&state.db, &auth.id, &id, now_millis()).await? {
        StopOutcome::Stopped(session) => {
            info!(
                user_id = %auth.id,
                fast_id = %session.id,
                duration_mins = session.duration_mins,
                "Fast stopped"
            );
            Ok(Json(session.to_response()))
        }
        StopOutcome::AlreadyStopped => Err(ApiError::bad_request("Already stopped")),
        StopOutcome::NotFound => Err(not_found()),
    }
}

/// Edit a session's note, preset or times
pub async fn edit_fast(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<EditFastRequest>,
) -> Result<Json<FastSessionResponse>, ApiError> {
    validate_path_id(&id)?;
    let edit = validate_edit_request(&request)?;

    let mut session = FastSession::find_for_user(&state.db, &auth.id, &id)
        .await?
        .ok_or_else(not_found)?;

    session
        .apply_edit(&edit)
        .map_err(|e| ApiError::validation_field("endAt", e.to_string()))?;
    session.save(&state.db).await?;

    info!(user_id = %auth.id, fast_id = %session.id, "Fast edited");

    Ok(Json(session.to_response()))
}

pub async fn delete_fast(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_path_id(&id)?;

    if !FastSession::delete_for_user(&state.db, &auth.id, &id).await? {
        return Err(not_found());
    }

    info!(user_id = %auth.id, fast_id = %id, "Fast deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NumberInput;

    const NOW: i64 = 1_710_504_000_000;

    #[test]
    fn test_start_defaults_to_now() {
        let request = StartFastRequest {
            preset: Some(NumberInput::Text("12".into())),
            start_at: None,
        };
        let start = validate_start_request(&request, NOW).ok().unwrap();
        assert_eq!(start.preset, 12);
        assert_eq!(start.start_at, NOW);
    }

    #[test]
    fn test_start_requires_preset() {
        let err = validate_start_request(&StartFastRequest::default(), NOW)
            .err()
            .unwrap();
        assert_eq!(err.details().unwrap()[0].path, "preset");
        assert_eq!(err.details().unwrap()[0].message, "Required");
    }

    #[test]
    fn test_start_reports_every_bad_field() {
        let request = StartFastRequest {
            preset: Some(NumberInput::Int(16)),
            start_at: Some("tomorrow".into()),
        };
        let err = validate_start_request(&request, NOW).err().unwrap();
        let paths: Vec<&str> = err.details().unwrap().iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["preset", "startAt"]);
    }

    #[test]
    fn test_edit_validation() {
        let request = EditFastRequest {
            note: Some("x".repeat(281)),
            preset: None,
            start_at: None,
            end_at: Some("2024-03-15T12:00:00Z".into()),
        };
        let err = validate_edit_request(&request).unwrap_err();
        assert_eq!(err.details().unwrap().len(), 1);
        assert_eq!(err.details().unwrap()[0].path, "note");

        let edit = validate_edit_request(&EditFastRequest {
            note: Some("  fine  ".into()),
            end_at: Some("2024-03-15T12:00:00Z".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(edit.note.as_deref(), Some("  fine  "));
        assert_eq!(edit.end_at, Some(NOW));
        assert_eq!(edit.preset, None);
    }
}
