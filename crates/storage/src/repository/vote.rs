use std::net::IpAddr;

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, StorageError, unique_as_violation};
use crate::models::{NewVote, PriorVotes, RecordedVote};

#[derive(FromRow)]
struct PriorVotesRow {
    by_account: bool,
    by_ip: bool,
}

/// Append-only vote ledger
pub struct VoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VoteRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the vote and bump the participant's counter in one transaction.
    /// The unique constraint on (voter_user_id, participant_id) turns a
    /// concurrent duplicate into a `ConstraintViolation` and rolls back the
    /// whole unit.
    pub async fn record(&self, vote: &NewVote) -> Result<RecordedVote> {
        let mut tx = self.pool.begin().await?;
        let vote_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO votes (
                vote_id, competition_id, participant_id, voter_user_id,
                voter_ip, cast_at, voter_verified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(vote_id)
        .bind(vote.competition_id)
        .bind(vote.participant_id)
        .bind(vote.voter_user_id)
        .bind(vote.voter_ip.to_string())
        .bind(vote.cast_at)
        .bind(vote.voter_verified)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_as_violation(e, "duplicate_vote"))?;

        let vote_count: i64 = sqlx::query_scalar(
            r#"
            UPDATE participants
            SET vote_count = vote_count + 1
            WHERE participant_id = $1
            RETURNING vote_count
            "#,
        )
        .bind(vote.participant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        tx.commit().await?;

        Ok(RecordedVote {
            vote_id,
            vote_count,
        })
    }

    pub async fn prior_votes(
        &self,
        participant_id: Uuid,
        voter_user_id: Uuid,
        voter_ip: IpAddr,
    ) -> Result<PriorVotes> {
        let row = sqlx::query_as::<_, PriorVotesRow>(
            r#"
            SELECT
                COALESCE(BOOL_OR(voter_user_id = $2), FALSE) AS by_account,
                COALESCE(BOOL_OR(voter_ip = $3), FALSE) AS by_ip
            FROM votes
            WHERE participant_id = $1
              AND (voter_user_id = $2 OR voter_ip = $3)
            "#,
        )
        .bind(participant_id)
        .bind(voter_user_id)
        .bind(voter_ip.to_string())
        .fetch_one(self.pool)
        .await?;

        Ok(PriorVotes {
            by_account: row.by_account,
            by_ip: row.by_ip,
        })
    }

    pub async fn count_for_participant(&self, participant_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE participant_id = $1")
            .bind(participant_id)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
