use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CastVoteRequest {
    pub participant_id: Uuid,
}

/// Returned to the voter once the vote is in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteReceipt {
    pub vote_id: Uuid,
    pub competition_id: Uuid,
    pub participant_id: Uuid,
    /// Participant's vote count including this vote
    pub vote_count: i64,
    pub cast_at: DateTime<Utc>,
}

/// Ledger rows versus the cached counter for one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LedgerAudit {
    pub participant_id: Uuid,
    pub ledger_count: i64,
    pub cached_count: i64,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.ledger_count == self.cached_count
    }
}
