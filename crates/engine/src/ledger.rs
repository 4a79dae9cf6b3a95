use std::sync::Arc;

use storage::dto::vote::{LedgerAudit, VoteReceipt};
use storage::models::NewVote;
use storage::{StorageError, Store};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Durable, append-only record of accepted votes.
///
/// The one-vote-per-(voter, participant) rule is enforced by the store's
/// unique constraint at write time, not by a lookup beforehand.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn Store>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append the vote and bump the participant's counter as one unit.
    ///
    /// A `Persistence` error here is never retried in-process: the caller
    /// re-submits the whole cast, and the unique constraint makes that safe.
    pub async fn append(&self, vote: &NewVote) -> Result<VoteReceipt> {
        let recorded = self.store.record_vote(vote).await.map_err(|e| match e {
            StorageError::ConstraintViolation(_) => {
                EngineError::DuplicateVote("already_voted".to_string())
            }
            other => EngineError::from_storage(other, "participant"),
        })?;

        Ok(VoteReceipt {
            vote_id: recorded.vote_id,
            competition_id: vote.competition_id,
            participant_id: vote.participant_id,
            vote_count: recorded.vote_count,
            cast_at: vote.cast_at,
        })
    }

    pub async fn increment_vote_count(&self, participant_id: Uuid) -> Result<i64> {
        self.store
            .increment_vote_count(participant_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "participant"))
    }

    /// Compare the ledger's row count with the cached counter
    pub async fn audit(&self, participant_id: Uuid) -> Result<LedgerAudit> {
        let participant = self
            .store
            .find_participant(participant_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "participant"))?;
        let ledger_count = self
            .store
            .count_votes(participant_id)
            .await
            .map_err(EngineError::Persistence)?;

        let audit = LedgerAudit {
            participant_id,
            ledger_count,
            cached_count: participant.vote_count,
        };
        if !audit.is_consistent() {
            tracing::error!(
                %participant_id,
                ledger_count,
                cached_count = participant.vote_count,
                "vote counter drifted from ledger"
            );
        }

        Ok(audit)
    }
}
