//! Entry point for casting a vote.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. competition exists, is `voting_open` and its voting window contains `now`
//! 2. participant exists, belongs to the competition and is approved
//! 3. the voter is verified
//! 4. the voter is not the participant's owner
//! 5. fraud guard admission
//! 6. ledger append
//!
//! Nothing is written before step 6, and step 6 writes the ledger row and the
//! counter as one unit, so every rejection leaves no trace.

use std::net::IpAddr;
use std::sync::Arc;

use serde::Deserialize;
use storage::Store;
use storage::dto::vote::VoteReceipt;
use storage::models::{CompetitionStatus, NewVote, ParticipantStatus};
use uuid::Uuid;

use crate::clock::Clock;
use crate::collaborators::{EngineEvent, Notifier};
use crate::error::{EngineError, Result};
use crate::fraud_guard::{Admission, FraudGuard};
use crate::ledger::VoteLedger;
use crate::velocity::{VelocityKey, VelocityWindow};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CastVote {
    pub competition_id: Uuid,
    pub participant_id: Uuid,
    pub voter_user_id: Uuid,
    pub voter_ip: IpAddr,
    /// Verification decision as reported by the identity service at call time
    pub voter_verified: bool,
}

#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn Store>,
    guard: FraudGuard,
    ledger: VoteLedger,
    velocity: Arc<VelocityWindow>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl AdmissionController {
    pub fn new(
        store: Arc<dyn Store>,
        guard: FraudGuard,
        ledger: VoteLedger,
        velocity: Arc<VelocityWindow>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            guard,
            ledger,
            velocity,
            clock,
            notifier,
        }
    }

    pub async fn cast_vote(&self, cmd: CastVote) -> Result<VoteReceipt> {
        let now = self.clock.now();

        let competition = self
            .store
            .find_competition(cmd.competition_id)
            .await
            // An unknown id stays `NotFound` so clients can tell a typo from a closed vote
            .map_err(|e| EngineError::from_storage(e, "competition"))?;
        if competition.status != CompetitionStatus::VotingOpen
            || !competition.voting_window.contains(now)
        {
            return Err(EngineError::WindowClosed("voting_closed".to_string()));
        }

        let participant = self
            .store
            .find_participant(cmd.participant_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "participant"))?;
        if participant.competition_id != cmd.competition_id {
            return Err(EngineError::NotFound("participant".to_string()));
        }
        if participant.status != ParticipantStatus::Approved {
            return Err(EngineError::State(format!(
                "participant_{}",
                participant.status
            )));
        }

        if !cmd.voter_verified {
            return Err(EngineError::Permission("unverified".to_string()));
        }
        if participant.user_id == cmd.voter_user_id {
            return Err(EngineError::Permission("self_vote".to_string()));
        }

        let key =
            VelocityKey::for_scope(self.guard.config().scope, cmd.voter_ip, cmd.voter_user_id);
        let _gate = self.velocity.gate(&key).await;

        let admission = self
            .guard
            .admit(
                cmd.competition_id,
                cmd.participant_id,
                cmd.voter_user_id,
                cmd.voter_ip,
                now,
            )
            .await?;
        if let Admission::Deny(reason) = admission {
            tracing::warn!(
                competition_id = %cmd.competition_id,
                participant_id = %cmd.participant_id,
                voter_ip = %cmd.voter_ip,
                ?reason,
                "vote denied"
            );
            return Err(reason.into_error(self.guard.config()));
        }

        let vote = NewVote {
            competition_id: cmd.competition_id,
            participant_id: cmd.participant_id,
            voter_user_id: cmd.voter_user_id,
            voter_ip: cmd.voter_ip,
            cast_at: now,
            voter_verified: cmd.voter_verified,
        };
        let receipt = match self.ledger.append(&vote).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        competition_id = %cmd.competition_id,
                        participant_id = %cmd.participant_id,
                        error = ?e,
                        "ledger append failed"
                    );
                }
                return Err(e);
            }
        };
        self.velocity.record(key, now);

        tracing::info!(
            competition_id = %receipt.competition_id,
            participant_id = %receipt.participant_id,
            vote_count = receipt.vote_count,
            "vote accepted"
        );
        self.notifier.notify(EngineEvent::VoteAccepted {
            competition_id: receipt.competition_id,
            participant_id: receipt.participant_id,
            vote_count: receipt.vote_count,
        });

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use futures::future::join_all;

    use super::*;
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_vote_then_duplicate_then_self_vote() {
        let h = Harness::new();
        let competition = h.voting_competition().await;
        let p1 = h.approved_participant(competition.competition_id).await;
        let u2 = Uuid::new_v4();

        let receipt = h.engine.cast_vote(h.cast(&p1, u2, 1)).await.unwrap();
        assert_eq!(receipt.vote_count, 1);
        assert_eq!(h.store.votes().len(), 1);
        assert_eq!(h.store.votes()[0].voter_user_id, u2);

        let err = h.engine.cast_vote(h.cast(&p1, u2, 1)).await.unwrap_err();
        assert_eq!(err.kind(), "duplicate_vote");
        let stored = h.store.find_participant(p1.participant_id).await.unwrap();
        assert_eq!(stored.vote_count, 1);

        let err = h
            .engine
            .cast_vote(h.cast(&p1, p1.user_id, 2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "permission");
        assert_eq!(err.reason(), "self_vote");

        assert_eq!(h.notifier.vote_events(), 1);
    }

    #[tokio::test]
    async fn test_checks_run_in_order() {
        let h = Harness::new();
        let competition = h.voting_competition().await;
        let participant = h.approved_participant(competition.competition_id).await;

        // Unverified self vote reports the verification failure first
        let mut cmd = h.cast(&participant, participant.user_id, 1);
        cmd.voter_verified = false;
        let err = h.engine.cast_vote(cmd).await.unwrap_err();
        assert_eq!(err.reason(), "unverified");

        // Unknown participant inside a closed window reports the window
        h.clock.advance(TimeDelta::hours(2));
        let mut cmd = h.cast(&participant, Uuid::new_v4(), 1);
        cmd.participant_id = Uuid::new_v4();
        let err = h.engine.cast_vote(cmd).await.unwrap_err();
        assert_eq!(err.kind(), "window_closed");
    }

    #[tokio::test]
    async fn test_window_and_participant_preconditions() {
        let h = Harness::new();
        let competition = h.voting_competition().await;
        let other = h.voting_competition().await;
        let participant = h.approved_participant(competition.competition_id).await;

        let mut cmd = h.cast(&participant, Uuid::new_v4(), 1);
        cmd.competition_id = Uuid::new_v4();
        assert_eq!(h.engine.cast_vote(cmd).await.unwrap_err().kind(), "not_found");

        let mut cmd = h.cast(&participant, Uuid::new_v4(), 1);
        cmd.competition_id = other.competition_id;
        assert_eq!(h.engine.cast_vote(cmd).await.unwrap_err().kind(), "not_found");

        let pending = h.pending_participant(competition.competition_id).await;
        let err = h
            .engine
            .cast_vote(h.cast(&pending, Uuid::new_v4(), 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state");

        h.store
            .transition_status(
                competition.competition_id,
                competition.status,
                storage::models::CompetitionStatus::VotingClosed,
            )
            .await
            .unwrap();
        let err = h
            .engine
            .cast_vote(h.cast(&participant, Uuid::new_v4(), 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "window_closed");
    }

    #[tokio::test]
    async fn test_votes_need_voting_open_status() {
        let h = Harness::new();

        for status in [
            CompetitionStatus::Draft,
            CompetitionStatus::RegistrationOpen,
            CompetitionStatus::RegistrationClosed,
        ] {
            let competition = h.competition_in_voting_window(status).await;
            let participant = h.approved_participant(competition.competition_id).await;

            let err = h
                .engine
                .cast_vote(h.cast(&participant, Uuid::new_v4(), 1))
                .await
                .unwrap_err();
            assert_eq!(err.reason(), "voting_closed", "status {status}");

            let stored = h.store.find_participant(participant.participant_id).await.unwrap();
            assert_eq!(stored.vote_count, 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_identical_votes_admit_exactly_one() {
        let h = Harness::new();
        let competition = h.voting_competition().await;
        let participant = h.approved_participant(competition.competition_id).await;
        let cmd = h.cast(&participant, Uuid::new_v4(), 1);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let engine = h.engine.clone();
                let cmd = cmd.clone();
                tokio::spawn(async move { engine.cast_vote(cmd).await })
            })
            .collect();
        let results: Vec<Result<VoteReceipt>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::DuplicateVote(_))))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 49);

        let audit = h.engine.ledger().audit(participant.participant_id).await.unwrap();
        assert_eq!((audit.ledger_count, audit.cached_count), (1, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_distinct_voters_keep_counter_in_sync() {
        let h = Harness::new();
        let competition = h.voting_competition().await;
        let participant = h.approved_participant(competition.competition_id).await;

        let handles: Vec<_> = (0..40u8)
            .map(|n| {
                let engine = h.engine.clone();
                let cmd = h.cast(&participant, Uuid::new_v4(), n);
                tokio::spawn(async move { engine.cast_vote(cmd).await })
            })
            .collect();
        for joined in join_all(handles).await {
            joined.unwrap().unwrap();
        }

        let audit = h.engine.ledger().audit(participant.participant_id).await.unwrap();
        assert_eq!(audit.ledger_count, 40);
        assert!(audit.is_consistent());
    }

    #[tokio::test]
    async fn test_rate_limit_rolls_with_the_window() {
        let h = Harness::new();
        let competition = h.voting_competition().await;
        let participant = h.approved_participant(competition.competition_id).await;
        let start = h.now();

        // First vote at t=0, the next nine at t=51..59
        h.engine
            .cast_vote(h.cast(&participant, Uuid::new_v4(), 7))
            .await
            .unwrap();
        for secs in 51..60 {
            h.clock.set(start + TimeDelta::seconds(secs));
            h.engine
                .cast_vote(h.cast(&participant, Uuid::new_v4(), 7))
                .await
                .unwrap();
        }

        let err = h
            .engine
            .cast_vote(h.cast(&participant, Uuid::new_v4(), 7))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::RateLimitExceeded {
                count: 10,
                ceiling: 10,
                window_secs: 60
            }
        ));

        // Another address is unaffected
        h.engine
            .cast_vote(h.cast(&participant, Uuid::new_v4(), 8))
            .await
            .unwrap();

        h.clock.set(start + TimeDelta::seconds(61));
        h.engine
            .cast_vote(h.cast(&participant, Uuid::new_v4(), 7))
            .await
            .unwrap();

        let stored = h.store.find_participant(participant.participant_id).await.unwrap();
        assert_eq!(stored.vote_count, 12);
    }

    #[tokio::test]
    async fn test_ip_and_voter_scope_budgets_each_account() {
        let mut config = crate::config::EngineConfig::default();
        config.fraud_guard.ip_ceiling = 1;
        config.fraud_guard.scope = crate::config::VelocityScope::IpAndVoter;
        let h = Harness::with_config(config);
        let competition = h.voting_competition().await;
        let first = h.approved_participant(competition.competition_id).await;
        let second = h.approved_participant(competition.competition_id).await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        h.engine.cast_vote(h.cast(&first, alice, 5)).await.unwrap();
        let err = h
            .engine
            .cast_vote(h.cast(&second, alice, 5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rate_limit_exceeded");

        // Same address, different account
        h.engine.cast_vote(h.cast(&first, bob, 5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_ledger_outage_leaves_no_partial_effect() {
        let h = Harness::new();
        let competition = h.voting_competition().await;
        let participant = h.approved_participant(competition.competition_id).await;
        let cmd = h.cast(&participant, Uuid::new_v4(), 3);

        h.store.fail_ledger_writes(true);
        let err = h.engine.cast_vote(cmd.clone()).await.unwrap_err();
        assert_eq!(err.kind(), "persistence");
        assert_eq!(
            h.engine
                .velocity()
                .count_within(&VelocityKey::Ip(h.ip(3)), h.now()),
            0
        );
        assert_eq!(h.notifier.vote_events(), 0);

        // A fresh attempt after recovery goes through exactly once
        h.store.clear_faults();
        h.engine.cast_vote(cmd.clone()).await.unwrap();
        assert_eq!(
            h.engine.cast_vote(cmd).await.unwrap_err().kind(),
            "duplicate_vote"
        );
        let stored = h.store.find_participant(participant.participant_id).await.unwrap();
        assert_eq!(stored.vote_count, 1);
    }
}
