//! Standings, leaderboard pages and rank trends.
//!
//! Order: `vote_count` descending, then `applied_at` ascending, then
//! participant id so equal timestamps still sort deterministically.
//!
//! Ranks use standard competition ranking ("1224"): participants with equal
//! vote counts share a rank and the next distinct count takes its position in
//! the ordered list. The same ranks drive both leaderboard display and
//! winner selection.

use std::sync::Arc;

use storage::Store;
use storage::dto::common::PaginationParams;
use storage::dto::ranking::{LeaderboardEntry, LeaderboardPage, Trend};
use storage::models::{Participant, ParticipantStatus, RankingMap};
use uuid::Uuid;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct RankedParticipant {
    pub rank: i64,
    pub participant: Participant,
}

/// Rank the approved participants in `participants`; everyone else is
/// dropped.
pub fn rank_participants(participants: Vec<Participant>) -> Vec<RankedParticipant> {
    let mut approved: Vec<Participant> = participants
        .into_iter()
        .filter(|p| p.status == ParticipantStatus::Approved)
        .collect();

    approved.sort_by(|a, b| {
        b.vote_count
            .cmp(&a.vote_count)
            .then(a.applied_at.cmp(&b.applied_at))
            .then(a.participant_id.cmp(&b.participant_id))
    });

    let mut ranked: Vec<RankedParticipant> = Vec::with_capacity(approved.len());
    for (position, participant) in approved.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(prev) if prev.participant.vote_count == participant.vote_count => prev.rank,
            _ => position as i64 + 1,
        };
        ranked.push(RankedParticipant { rank, participant });
    }

    ranked
}

#[derive(Clone)]
pub struct RankingEngine {
    store: Arc<dyn Store>,
}

impl RankingEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current standings without touching the materialized snapshot
    pub async fn standings(&self, competition_id: Uuid) -> Result<Vec<RankedParticipant>> {
        self.store
            .find_competition(competition_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;

        let participants = self
            .store
            .list_participants(competition_id, Some(ParticipantStatus::Approved))
            .await
            .map_err(EngineError::Persistence)?;

        Ok(rank_participants(participants))
    }

    /// Recompute the ranking, materialize it, and return one page of it with
    /// trends relative to the ranking materialized immediately before.
    pub async fn leaderboard(
        &self,
        competition_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<LeaderboardPage> {
        if limit == 0 || limit > PaginationParams::MAX_PAGE_SIZE as usize {
            return Err(EngineError::Validation(format!(
                "limit must be between 1 and {}",
                PaginationParams::MAX_PAGE_SIZE
            )));
        }

        let standings = self.standings(competition_id).await?;
        let ranks: RankingMap = standings
            .iter()
            .map(|r| (r.participant.participant_id, r.rank))
            .collect();

        let previous = self
            .store
            .materialize_ranking(competition_id, &ranks)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;

        let total = standings.len() as u64;
        let entries = standings
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|ranked| {
                let trend = Trend::between(
                    previous.get(&ranked.participant.participant_id).copied(),
                    ranked.rank,
                );
                let mut participant = ranked.participant;
                participant.ranking = Some(ranked.rank);
                LeaderboardEntry {
                    rank: ranked.rank,
                    trend,
                    vote_count: participant.vote_count,
                    participant,
                }
            })
            .collect();

        Ok(LeaderboardPage { entries, total })
    }
}
