//! Goal models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{now_rfc3339, NumberInput};

/// Stored as lowercase TEXT; any other stored value fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum GoalPeriod {
    Week,
    Month,
}

impl GoalPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPeriod::Week => "week",
            GoalPeriod::Month => "month",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub period: GoalPeriod,
    pub hours_target: i64,
    pub start_iso_week: Option<i64>,
    pub year: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Validated goal fields. On create `period` and `hours_target` are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalFields {
    pub period: Option<GoalPeriod>,
    pub hours_target: Option<i64>,
    pub start_iso_week: Option<i64>,
    pub year: Option<i64>,
}

impl Goal {
    pub fn to_response(&self) -> GoalResponse {
        GoalResponse {
            id: self.id.clone(),
            user: self.user_id.clone(),
            period: self.period,
            hours_target: self.hours_target,
            start_iso_week: self.start_iso_week,
            year: self.year,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    /// Insert a goal. A second weekly goal for the same year and week fails
    /// with a UNIQUE constraint error; monthly goals are never deduplicated.
    pub async fn create(
        db: &SqlitePool,
        user_id: &str,
        period: GoalPeriod,
        hours_target: i64,
        start_iso_week: Option<i64>,
        year: Option<i64>,
    ) -> Result<Goal, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO goals (id, user_id, period, hours_target, start_iso_week, year, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(period.as_str())
        .bind(hours_target)
        .bind(start_iso_week)
        .bind(year)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = ?")
            .bind(&id)
            .fetch_one(db)
            .await
    }

    pub async fn list_for_user(db: &SqlitePool, user_id: &str) -> Result<Vec<Goal>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(
            "SELECT * FROM goals WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn find_for_user(
        db: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<Option<Goal>, sqlx::Error> {
        sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    /// Apply the provided fields. Returns None when the goal does not exist.
    pub async fn update_for_user(
        db: &SqlitePool,
        user_id: &str,
        id: &str,
        fields: &GoalFields,
    ) -> Result<Option<Goal>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE goals SET
                period = COALESCE(?, period),
                hours_target = COALESCE(?, hours_target),
                start_iso_week = COALESCE(?, start_iso_week),
                year = COALESCE(?, year),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(fields.period.map(|p| p.as_str()))
        .bind(fields.hours_target)
        .bind(fields.start_iso_week)
        .bind(fields.year)
        .bind(now_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Self::find_for_user(db, user_id, id).await
    }

    pub async fn delete_for_user(
        db: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResponse {
    pub id: String,
    pub user: String,
    pub period: GoalPeriod,
    pub hours_target: i64,
    #[serde(rename = "startISOWeek", skip_serializing_if = "Option::is_none")]
    pub start_iso_week: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Body for create and update. Unknown keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoalRequest {
    pub period: Option<String>,
    pub hours_target: Option<NumberInput>,
    #[serde(rename = "startISOWeek")]
    pub start_iso_week: Option<NumberInput>,
    pub year: Option<NumberInput>,
}
