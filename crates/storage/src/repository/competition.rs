use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, StorageError, unique_as_violation};
use crate::models::{
    AdvancementInfo, Competition, CompetitionStatus, NewCompetition, QualificationRules,
    TimeWindow,
};

const COMPETITION_COLUMNS: &str = r#"
    competition_id, title, tier, status,
    registration_start, registration_end, voting_start, voting_end,
    max_participants, requires_approval, top_n, min_votes,
    source_competition_id, next_tier_competition_id, advanced_participant_count,
    advancement_date, created_at
"#;

#[derive(FromRow)]
struct CompetitionRow {
    competition_id: Uuid,
    title: String,
    tier: String,
    status: String,
    registration_start: DateTime<Utc>,
    registration_end: DateTime<Utc>,
    voting_start: DateTime<Utc>,
    voting_end: DateTime<Utc>,
    max_participants: Option<i32>,
    requires_approval: bool,
    top_n: Option<i32>,
    min_votes: Option<i64>,
    source_competition_id: Option<Uuid>,
    next_tier_competition_id: Option<Uuid>,
    advanced_participant_count: Option<i32>,
    advancement_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CompetitionRow> for Competition {
    type Error = StorageError;

    fn try_from(row: CompetitionRow) -> Result<Self> {
        let advancement_info = match (
            row.next_tier_competition_id,
            row.advanced_participant_count,
            row.advancement_date,
        ) {
            (Some(next_tier_competition_id), Some(advanced_participant_count), Some(date)) => {
                Some(AdvancementInfo {
                    next_tier_competition_id,
                    advanced_participant_count,
                    advancement_date: date,
                })
            }
            (None, None, None) => None,
            _ => {
                return Err(StorageError::Decode(format!(
                    "competition {} has partial advancement info",
                    row.competition_id
                )));
            }
        };

        Ok(Competition {
            competition_id: row.competition_id,
            title: row.title,
            tier: row.tier.parse().map_err(StorageError::Decode)?,
            status: row.status.parse().map_err(StorageError::Decode)?,
            registration_window: TimeWindow::new(row.registration_start, row.registration_end),
            voting_window: TimeWindow::new(row.voting_start, row.voting_end),
            max_participants: row.max_participants,
            qualification_rules: QualificationRules {
                requires_approval: row.requires_approval,
                top_n: row.top_n,
                min_votes: row.min_votes,
            },
            source_competition_id: row.source_competition_id,
            advancement_info,
            created_at: row.created_at,
        })
    }
}

/// Repository for Competition database operations
pub struct CompetitionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CompetitionRepository<'a> {
    /// Create a new CompetitionRepository
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a competition by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Competition> {
        let row = sqlx::query_as::<_, CompetitionRow>(&format!(
            "SELECT {COMPETITION_COLUMNS} FROM competitions WHERE competition_id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        row.try_into()
    }

    /// Get the competition that was spawned by advancing `source_id`
    pub async fn find_by_source(&self, source_id: Uuid) -> Result<Option<Competition>> {
        let row = sqlx::query_as::<_, CompetitionRow>(&format!(
            "SELECT {COMPETITION_COLUMNS} FROM competitions WHERE source_competition_id = $1"
        ))
        .bind(source_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Competition::try_from).transpose()
    }

    /// Create a new competition
    pub async fn create(&self, new: &NewCompetition) -> Result<Competition> {
        let row = sqlx::query_as::<_, CompetitionRow>(&format!(
            r#"
            INSERT INTO competitions (
                competition_id, title, tier, status,
                registration_start, registration_end, voting_start, voting_end,
                max_participants, requires_approval, top_n, min_votes, source_competition_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {COMPETITION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(new.tier.as_str())
        .bind(new.status.as_str())
        .bind(new.registration_window.start)
        .bind(new.registration_window.end)
        .bind(new.voting_window.start)
        .bind(new.voting_window.end)
        .bind(new.max_participants)
        .bind(new.qualification_rules.requires_approval)
        .bind(new.qualification_rules.top_n)
        .bind(new.qualification_rules.min_votes)
        .bind(new.source_competition_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| unique_as_violation(e, "source_competition_id already used"))?;

        row.try_into()
    }

    /// Insert the advanced competition unless one already exists for the same source
    pub async fn create_or_get_advanced(&self, new: &NewCompetition) -> Result<Competition> {
        let source_id = new.source_competition_id.ok_or_else(|| {
            StorageError::ConstraintViolation("source_competition_id is required".to_string())
        })?;

        match self.create(new).await {
            Ok(competition) => Ok(competition),
            Err(StorageError::ConstraintViolation(_)) => self
                .find_by_source(source_id)
                .await?
                .ok_or(StorageError::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Compare-and-set the status column
    pub async fn transition_status(
        &self,
        id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<Competition> {
        let row = sqlx::query_as::<_, CompetitionRow>(&format!(
            r#"
            UPDATE competitions
            SET status = $3
            WHERE competition_id = $1 AND status = $2
            RETURNING {COMPETITION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self.find_by_id(id).await?;
                Err(StorageError::Conflict(format!(
                    "status is {}, expected {}",
                    current.status, from
                )))
            }
        }
    }

    /// Record the promotion of this competition's winners; succeeds only once
    pub async fn set_advancement_info(&self, id: Uuid, info: &AdvancementInfo) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE competitions
            SET next_tier_competition_id = $2,
                advanced_participant_count = $3,
                advancement_date = $4
            WHERE competition_id = $1 AND next_tier_competition_id IS NULL
            "#,
        )
        .bind(id)
        .bind(info.next_tier_competition_id)
        .bind(info.advanced_participant_count)
        .bind(info.advancement_date)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a lost race
            self.find_by_id(id).await?;
            return Err(StorageError::Conflict("already_advanced".to_string()));
        }

        Ok(())
    }
}
