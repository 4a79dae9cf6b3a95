//! Promotion of a completed competition's winners into the next tier.
//!
//! Re-running `advance` after a failure part-way through is safe: the next
//! competition is keyed by its source competition, winner registration is
//! keyed by (competition, user), and `advancement_info` is written last as a
//! write-once flag. The flag is both the exactly-once gate and the mutual
//! exclusion between two concurrent attempts.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use storage::Store;
use storage::dto::advancement::{AdvancementCriteria, AdvancementOutcome};
use storage::models::{
    AdvancementInfo, Competition, CompetitionStatus, NewCompetition, QualificationRules, Tier,
    TimeWindow,
};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::collaborators::{EngineEvent, Notifier};
use crate::error::{EngineError, Result};
use crate::ranking::{RankedParticipant, RankingEngine};

// Schedule of a promoted competition, in days
const REGISTRATION_OPENS_AFTER: i64 = 7;
const REGISTRATION_LENGTH: i64 = 14;
const VOTING_GAP: i64 = 1;
const VOTING_LENGTH: i64 = 7;

/// Floor for the derived `top_n` of a promoted competition
const MIN_NEXT_TOP_N: u32 = 5;

/// Default winner count: at least 3, otherwise the top tenth
pub fn default_top_n(approved: usize) -> usize {
    approved.div_ceil(10).max(3)
}

/// Everyone ranked inside `top_n` (so a tie at the cut advances as a whole),
/// then whoever of those reached `min_votes`.
pub fn select_winners(
    standings: &[RankedParticipant],
    top_n: usize,
    min_votes: i64,
) -> Vec<RankedParticipant> {
    standings
        .iter()
        .filter(|r| r.rank <= top_n as i64)
        .filter(|r| r.participant.vote_count >= min_votes)
        .cloned()
        .collect()
}

fn tier_multiplier(tier: Tier) -> i64 {
    match tier {
        Tier::Local => 1,
        Tier::National => 2,
        Tier::Global => 3,
    }
}

/// Qualification rules for the competition the winners are promoted into.
pub fn next_rules(
    next_tier: Tier,
    used_top_n: usize,
    winners: &[RankedParticipant],
) -> QualificationRules {
    let top_n = (used_top_n as u32 / 2).max(MIN_NEXT_TOP_N);

    let total: i64 = winners.iter().map(|w| w.participant.vote_count).sum();
    let min_votes = if winners.is_empty() {
        0
    } else {
        let average = Decimal::from(total) / Decimal::from(winners.len() as i64);
        (average * Decimal::from(tier_multiplier(next_tier)))
            .ceil()
            .to_i64()
            .unwrap_or(i64::MAX)
    };

    QualificationRules {
        requires_approval: true,
        top_n: Some(top_n.min(i32::MAX as u32) as i32),
        min_votes: Some(min_votes),
    }
}

/// Draft definition of the next-tier competition, scheduled relative to `now`.
pub fn next_competition(
    source: &Competition,
    next_tier: Tier,
    rules: QualificationRules,
    now: DateTime<Utc>,
) -> NewCompetition {
    let registration_start = now + TimeDelta::days(REGISTRATION_OPENS_AFTER);
    let registration_end = registration_start + TimeDelta::days(REGISTRATION_LENGTH);
    let voting_start = registration_end + TimeDelta::days(VOTING_GAP);
    let voting_end = voting_start + TimeDelta::days(VOTING_LENGTH);

    NewCompetition {
        title: format!("{} ({} round)", source.title, next_tier),
        tier: next_tier,
        status: CompetitionStatus::Draft,
        registration_window: TimeWindow::new(registration_start, registration_end),
        voting_window: TimeWindow::new(voting_start, voting_end),
        max_participants: None,
        qualification_rules: rules,
        source_competition_id: Some(source.competition_id),
    }
}

#[derive(Clone)]
pub struct AdvancementOrchestrator {
    store: Arc<dyn Store>,
    ranking: RankingEngine,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl AdvancementOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        ranking: RankingEngine,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            ranking,
            clock,
            notifier,
        }
    }

    pub async fn advance(
        &self,
        competition_id: Uuid,
        next_tier: Tier,
        criteria: AdvancementCriteria,
    ) -> Result<AdvancementOutcome> {
        criteria.validate()?;

        let source = self
            .store
            .find_competition(competition_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;

        if source.status != CompetitionStatus::Completed {
            return Err(EngineError::State("competition_not_completed".to_string()));
        }
        match source.tier.next() {
            Some(tier) if tier == next_tier => {}
            Some(_) => {
                return Err(EngineError::State(format!(
                    "illegal_tier_transition: {} -> {}",
                    source.tier, next_tier
                )));
            }
            None => return Err(EngineError::State("final_tier".to_string())),
        }
        if source.is_advanced() {
            return Err(EngineError::State("already_advanced".to_string()));
        }

        let standings = self.ranking.standings(competition_id).await?;
        let top_n = criteria
            .top_n
            .map(|n| n as usize)
            .or(source.qualification_rules.top_n.map(|n| n.max(1) as usize))
            .unwrap_or_else(|| default_top_n(standings.len()));
        let min_votes = criteria
            .min_votes
            .or(source.qualification_rules.min_votes)
            .unwrap_or(0);

        let winners = select_winners(&standings, top_n, min_votes);
        if winners.is_empty() {
            tracing::warn!(%competition_id, top_n, min_votes, "no participant qualified");
            return Err(EngineError::NoQualifiers);
        }
        if winners.len() > top_n {
            tracing::warn!(
                %competition_id,
                top_n,
                winners = winners.len(),
                "tie at the cut promotes more than top_n participants"
            );
        }

        let now = self.clock.now();
        let rules = next_rules(next_tier, top_n, &winners);
        let next = self
            .store
            .create_advanced_competition(&next_competition(&source, next_tier, rules, now))
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;

        let mut participants = Vec::with_capacity(winners.len());
        for (index, winner) in winners.iter().enumerate() {
            let registered = self
                .store
                .register_advanced_participant(next.competition_id, &winner.participant, now)
                .await
                .map_err(|e| {
                    tracing::error!(
                        %competition_id,
                        next_competition_id = %next.competition_id,
                        registered = index,
                        winners = winners.len(),
                        error = ?e,
                        "winner registration failed, advancement incomplete"
                    );
                    EngineError::from_storage(e, "competition")
                })?;
            participants.push(registered);
        }

        let info = AdvancementInfo {
            next_tier_competition_id: next.competition_id,
            advanced_participant_count: participants.len() as i32,
            advancement_date: now,
        };
        self.store
            .set_advancement_info(competition_id, &info)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;

        tracing::info!(
            %competition_id,
            next_competition_id = %next.competition_id,
            tier = %next_tier,
            advanced = info.advanced_participant_count,
            "competition advanced"
        );
        self.notifier.notify(EngineEvent::AdvancementCompleted {
            source_competition_id: competition_id,
            next_competition_id: next.competition_id,
            advanced_participant_count: info.advanced_participant_count,
        });

        Ok(AdvancementOutcome {
            competition: next,
            participants,
        })
    }
}

#[cfg(test)]
mod tests {
    use storage::models::{Participant, ParticipantStatus};

    use super::*;
    use crate::testing::Harness;

    async fn seeded(h: &Harness, tier: Tier, votes: &[i64]) -> (Competition, Vec<Participant>) {
        let competition = h.completed_competition(tier).await;
        let mut participants = Vec::new();
        for (i, &count) in votes.iter().enumerate() {
            participants.push(
                h.participant_with_votes(
                    competition.competition_id,
                    count,
                    h.now() + TimeDelta::seconds(i as i64),
                )
                .await,
            );
        }
        (competition, participants)
    }

    fn counts(outcome: &AdvancementOutcome, source: &[Participant]) -> Vec<i64> {
        outcome
            .participants
            .iter()
            .map(|p| {
                source
                    .iter()
                    .find(|s| s.user_id == p.user_id)
                    .map(|s| s.vote_count)
                    .unwrap_or(-1)
            })
            .collect()
    }

    #[test]
    fn test_default_top_n() {
        assert_eq!(default_top_n(0), 3);
        assert_eq!(default_top_n(30), 3);
        assert_eq!(default_top_n(31), 4);
        assert_eq!(default_top_n(100), 10);
    }

    #[tokio::test]
    async fn test_top_three_winners() {
        let h = Harness::new();
        let (competition, participants) = seeded(&h, Tier::Local, &[100, 85, 70, 55, 40]).await;

        let outcome = h
            .engine
            .advance(
                competition.competition_id,
                Tier::National,
                AdvancementCriteria {
                    top_n: Some(3),
                    min_votes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(counts(&outcome, &participants), vec![100, 85, 70]);
        assert!(
            outcome
                .participants
                .iter()
                .all(|p| p.status == ParticipantStatus::Approved
                    && p.approved_at == Some(h.now())
                    && p.vote_count == 0)
        );
    }

    #[tokio::test]
    async fn test_min_votes_filters_inside_top_n() {
        let h = Harness::new();
        let (competition, participants) = seeded(&h, Tier::Local, &[100, 85, 70, 55, 40]).await;

        let outcome = h
            .engine
            .advance(
                competition.competition_id,
                Tier::National,
                AdvancementCriteria {
                    top_n: Some(5),
                    min_votes: Some(50),
                },
            )
            .await
            .unwrap();

        assert_eq!(counts(&outcome, &participants), vec![100, 85, 70, 55]);
    }

    #[tokio::test]
    async fn test_tie_at_the_cut_advances_together() {
        let h = Harness::new();
        let (competition, _) = seeded(&h, Tier::Local, &[9, 8, 8, 1]).await;

        let outcome = h
            .engine
            .advance(
                competition.competition_id,
                Tier::National,
                AdvancementCriteria {
                    top_n: Some(2),
                    min_votes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.participants.len(), 3);
    }

    #[tokio::test]
    async fn test_flat_board_advances_every_tied_participant() {
        let h = Harness::new();
        let (competition, participants) = seeded(&h, Tier::Local, &[0, 0, 0, 0, 0]).await;

        let outcome = h
            .engine
            .advance(competition.competition_id, Tier::National, Default::default())
            .await
            .unwrap();

        assert_eq!(outcome.participants.len(), participants.len());
        let source = h.store.find_competition(competition.competition_id).await.unwrap();
        assert_eq!(source.advancement_info.unwrap().advanced_participant_count, 5);
    }

    #[tokio::test]
    async fn test_advances_exactly_once() {
        let h = Harness::new();
        let (competition, _) = seeded(&h, Tier::Local, &[5, 4, 3]).await;

        let first = h
            .engine
            .advance(competition.competition_id, Tier::National, Default::default())
            .await
            .unwrap();
        let err = h
            .engine
            .advance(competition.competition_id, Tier::National, Default::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "state");
        assert_eq!(err.reason(), "already_advanced");
        let source = h.store.find_competition(competition.competition_id).await.unwrap();
        let info = source.advancement_info.unwrap();
        assert_eq!(info.next_tier_competition_id, first.competition.competition_id);
        assert_eq!(info.advanced_participant_count, 3);
        assert_eq!(h.notifier.advancement_events(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_advances_spawn_one_competition() {
        let h = Harness::new();
        let (competition, _) = seeded(&h, Tier::Local, &[9, 7, 5, 2]).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = h.engine.clone();
                let id = competition.competition_id;
                tokio::spawn(
                    async move { engine.advance(id, Tier::National, Default::default()).await },
                )
            })
            .collect();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        let succeeded: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(succeeded.len(), 1);
        let failed = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(failed.kind(), "state");
        assert_eq!(failed.reason(), "already_advanced");

        let spawned: Vec<_> = h
            .store
            .competitions()
            .into_iter()
            .filter(|c| c.source_competition_id == Some(competition.competition_id))
            .collect();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].competition_id, succeeded[0].competition.competition_id);

        let registered = h
            .store
            .list_participants(spawned[0].competition_id, None)
            .await
            .unwrap();
        let mut users: Vec<_> = registered.iter().map(|p| p.user_id).collect();
        users.sort();
        users.dedup();
        assert_eq!(registered.len(), 3);
        assert_eq!(users.len(), 3);
        assert_eq!(h.notifier.advancement_events(), 1);
    }

    #[tokio::test]
    async fn test_rejects_illegal_progressions() {
        let h = Harness::new();
        let (local, _) = seeded(&h, Tier::Local, &[5]).await;
        let (global, _) = seeded(&h, Tier::Global, &[5]).await;

        let err = h
            .engine
            .advance(local.competition_id, Tier::Global, Default::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state");

        let err = h
            .engine
            .advance(global.competition_id, Tier::Global, Default::default())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "final_tier");

        let open = h.voting_competition().await;
        let err = h
            .engine
            .advance(open.competition_id, Tier::National, Default::default())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "competition_not_completed");

        let err = h
            .engine
            .advance(
                local.competition_id,
                Tier::National,
                AdvancementCriteria {
                    top_n: Some(0),
                    min_votes: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_no_qualifiers_is_an_error() {
        let h = Harness::new();
        let (competition, _) = seeded(&h, Tier::Local, &[3, 2]).await;

        let err = h
            .engine
            .advance(
                competition.competition_id,
                Tier::National,
                AdvancementCriteria {
                    top_n: None,
                    min_votes: Some(10),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NoQualifiers));
        assert!(h.store.competitions().iter().all(|c| c.source_competition_id.is_none()));
    }

    #[tokio::test]
    async fn test_retry_after_partial_failure_does_not_duplicate() {
        let h = Harness::new();
        let (competition, _) = seeded(&h, Tier::Local, &[30, 20, 10]).await;

        h.store.fail_registrations_after(1);
        let err = h
            .engine
            .advance(competition.competition_id, Tier::National, Default::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        let source = h.store.find_competition(competition.competition_id).await.unwrap();
        assert!(source.advancement_info.is_none());

        h.store.clear_faults();
        let outcome = h
            .engine
            .advance(competition.competition_id, Tier::National, Default::default())
            .await
            .unwrap();

        let spawned: Vec<Competition> = h
            .store
            .competitions()
            .into_iter()
            .filter(|c| c.source_competition_id == Some(competition.competition_id))
            .collect();
        assert_eq!(spawned.len(), 1);
        let registered = h
            .store
            .list_participants(outcome.competition.competition_id, None)
            .await
            .unwrap();
        assert_eq!(registered.len(), 3);
    }

    #[tokio::test]
    async fn test_next_competition_schedule_and_rules() {
        let h = Harness::new();
        let (competition, _) = seeded(&h, Tier::Local, &[100, 85, 70, 55, 40]).await;

        let outcome = h
            .engine
            .advance(
                competition.competition_id,
                Tier::National,
                AdvancementCriteria {
                    top_n: Some(3),
                    min_votes: None,
                },
            )
            .await
            .unwrap();
        let next = outcome.competition;
        let now = h.now();

        assert_eq!(next.tier, Tier::National);
        assert_eq!(next.status, CompetitionStatus::Draft);
        assert_eq!(next.source_competition_id, Some(competition.competition_id));
        assert_eq!(next.registration_window.start, now + TimeDelta::days(7));
        assert_eq!(next.registration_window.end, now + TimeDelta::days(21));
        assert_eq!(next.voting_window.start, now + TimeDelta::days(22));
        assert_eq!(next.voting_window.end, now + TimeDelta::days(29));

        // Average of 100, 85, 70 is 85; doubled for the national tier
        assert!(next.qualification_rules.requires_approval);
        assert_eq!(next.qualification_rules.top_n, Some(5));
        assert_eq!(next.qualification_rules.min_votes, Some(170));
    }

    #[test]
    fn test_global_multiplier_rounds_up() {
        let winners: Vec<RankedParticipant> = [10, 11]
            .iter()
            .enumerate()
            .map(|(i, &votes)| RankedParticipant {
                rank: i as i64 + 1,
                participant: Participant {
                    participant_id: Uuid::new_v4(),
                    competition_id: Uuid::new_v4(),
                    user_id: Uuid::new_v4(),
                    status: ParticipantStatus::Approved,
                    submission: Default::default(),
                    vote_count: votes,
                    ranking: None,
                    applied_at: Utc::now(),
                    approved_at: None,
                },
            })
            .collect();

        let rules = next_rules(Tier::Global, 20, &winners);

        // 10.5 * 3 = 31.5
        assert_eq!(rules.min_votes, Some(32));
        assert_eq!(rules.top_n, Some(10));
    }
}
