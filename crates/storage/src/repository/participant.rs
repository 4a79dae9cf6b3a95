use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, StorageError, unique_as_violation};
use crate::models::{NewParticipant, Participant, ParticipantStatus, Submission};

const PARTICIPANT_COLUMNS: &str = r#"
    participant_id, competition_id, user_id, status,
    submission_title, submission_description, media_refs,
    vote_count, ranking, applied_at, approved_at
"#;

#[derive(FromRow)]
struct ParticipantRow {
    participant_id: Uuid,
    competition_id: Uuid,
    user_id: Uuid,
    status: String,
    submission_title: String,
    submission_description: String,
    media_refs: Vec<String>,
    vote_count: i64,
    ranking: Option<i64>,
    applied_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ParticipantRow> for Participant {
    type Error = StorageError;

    fn try_from(row: ParticipantRow) -> Result<Self> {
        Ok(Participant {
            participant_id: row.participant_id,
            competition_id: row.competition_id,
            user_id: row.user_id,
            status: row.status.parse().map_err(StorageError::Decode)?,
            submission: Submission {
                title: row.submission_title,
                description: row.submission_description,
                media_refs: row.media_refs,
            },
            vote_count: row.vote_count,
            ranking: row.ranking,
            applied_at: row.applied_at,
            approved_at: row.approved_at,
        })
    }
}

pub struct ParticipantRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ParticipantRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Participant> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE participant_id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        row.try_into()
    }

    /// List a competition's participants, oldest application first
    pub async fn list(
        &self,
        competition_id: Uuid,
        status: Option<ParticipantStatus>,
    ) -> Result<Vec<Participant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS}
            FROM participants
            WHERE competition_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY applied_at ASC, participant_id ASC
            "#
        ))
        .bind(competition_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Participant::try_from).collect()
    }

    pub async fn create(&self, new: &NewParticipant) -> Result<Participant> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            INSERT INTO participants (
                participant_id, competition_id, user_id, status,
                submission_title, submission_description, media_refs,
                applied_at, approved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.competition_id)
        .bind(new.user_id)
        .bind(new.status.as_str())
        .bind(&new.submission.title)
        .bind(&new.submission.description)
        .bind(&new.submission.media_refs)
        .bind(new.applied_at)
        .bind(new.approved_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some("23503")
            {
                return StorageError::NotFound;
            }
            unique_as_violation(e, "user already entered this competition")
        })?;

        row.try_into()
    }

    /// Insert the promoted copy, or return the row an earlier attempt wrote
    pub async fn create_or_get_promoted(
        &self,
        competition_id: Uuid,
        source: &Participant,
        now: DateTime<Utc>,
    ) -> Result<Participant> {
        let new = NewParticipant::promoted(competition_id, source, now);

        sqlx::query(
            r#"
            INSERT INTO participants (
                participant_id, competition_id, user_id, status,
                submission_title, submission_description, media_refs,
                applied_at, approved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (competition_id, user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.competition_id)
        .bind(new.user_id)
        .bind(new.status.as_str())
        .bind(&new.submission.title)
        .bind(&new.submission.description)
        .bind(&new.submission.media_refs)
        .bind(new.applied_at)
        .bind(new.approved_at)
        .execute(self.pool)
        .await?;

        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS}
            FROM participants
            WHERE competition_id = $1 AND user_id = $2
            "#
        ))
        .bind(competition_id)
        .bind(source.user_id)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// pending → approved while holding the competition row lock, so two
    /// approvals can never both take the last free slot.
    pub async fn approve(&self, id: Uuid, approved_at: DateTime<Utc>) -> Result<Participant> {
        let mut tx = self.pool.begin().await?;

        let max_participants: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT c.max_participants
            FROM competitions c
            INNER JOIN participants p ON p.competition_id = c.competition_id
            WHERE p.participant_id = $1
            FOR UPDATE OF c
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        if let Some(max) = max_participants {
            let approved: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*)
                FROM participants
                WHERE status = 'approved'
                  AND competition_id = (SELECT competition_id FROM participants WHERE participant_id = $1)
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            if approved >= i64::from(max) {
                return Err(StorageError::CapacityReached {
                    approved,
                    max: i64::from(max),
                });
            }
        }

        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            UPDATE participants
            SET status = 'approved', approved_at = $2
            WHERE participant_id = $1 AND status = 'pending'
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(approved_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StorageError::Conflict("participant is not pending".to_string()))?;

        tx.commit().await?;

        row.try_into()
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        from: &[ParticipantStatus],
        to: ParticipantStatus,
    ) -> Result<Participant> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();

        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            UPDATE participants
            SET status = $3
            WHERE participant_id = $1 AND status = ANY($2)
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&from)
        .bind(to.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self.find_by_id(id).await?;
                Err(StorageError::Conflict(format!(
                    "participant is {}",
                    current.status
                )))
            }
        }
    }

    /// Single atomic increment of the cached counter
    pub async fn increment_vote_count(&self, id: Uuid) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            UPDATE participants
            SET vote_count = vote_count + 1
            WHERE participant_id = $1
            RETURNING vote_count
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)
    }
}
