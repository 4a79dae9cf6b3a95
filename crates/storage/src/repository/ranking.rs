use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::RankingMap;

#[derive(FromRow)]
struct RankRow {
    participant_id: Uuid,
    ranking: Option<i64>,
    previous_ranking: Option<i64>,
}

/// Persists materialized rankings. The current ranking lives in
/// `participants.ranking`, the one before it in `participants.previous_ranking`.
pub struct RankingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RankingRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn materialize(
        &self,
        competition_id: Uuid,
        ranks: &RankingMap,
    ) -> Result<RankingMap> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT competition_id FROM competitions WHERE competition_id = $1")
            .bind(competition_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound)?;

        // Serializes concurrent recomputes of the same competition. A row lock
        // on competitions would also block vote inserts through their foreign key.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(competition_id)
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, RankRow>(
            r#"
            SELECT participant_id, ranking, previous_ranking
            FROM participants
            WHERE competition_id = $1
            "#,
        )
        .bind(competition_id)
        .fetch_all(&mut *tx)
        .await?;

        let current: RankingMap = rows
            .iter()
            .filter_map(|r| r.ranking.map(|rank| (r.participant_id, rank)))
            .collect();

        if current == *ranks {
            let previous = rows
                .iter()
                .filter_map(|r| r.previous_ranking.map(|rank| (r.participant_id, rank)))
                .collect();
            tx.commit().await?;
            return Ok(previous);
        }

        sqlx::query(
            r#"
            UPDATE participants
            SET previous_ranking = ranking, ranking = NULL
            WHERE competition_id = $1
            "#,
        )
        .bind(competition_id)
        .execute(&mut *tx)
        .await?;

        let (ids, values): (Vec<Uuid>, Vec<i64>) =
            ranks.iter().map(|(id, rank)| (*id, *rank)).unzip();

        sqlx::query(
            r#"
            UPDATE participants p
            SET ranking = r.rank
            FROM UNNEST($2::UUID[], $3::BIGINT[]) AS r(participant_id, rank)
            WHERE p.participant_id = r.participant_id AND p.competition_id = $1
            "#,
        )
        .bind(competition_id)
        .bind(&ids)
        .bind(&values)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(current)
    }
}
