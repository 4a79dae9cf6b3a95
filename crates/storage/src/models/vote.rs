use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An accepted vote. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Vote {
    pub vote_id: Uuid,
    pub competition_id: Uuid,
    pub participant_id: Uuid,
    pub voter_user_id: Uuid,
    #[schema(value_type = String)]
    pub voter_ip: IpAddr,
    pub cast_at: DateTime<Utc>,
    /// Verification state of the voter at cast time
    pub voter_verified: bool,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub competition_id: Uuid,
    pub participant_id: Uuid,
    pub voter_user_id: Uuid,
    pub voter_ip: IpAddr,
    pub cast_at: DateTime<Utc>,
    pub voter_verified: bool,
}

impl NewVote {
    pub fn into_vote(self, vote_id: Uuid) -> Vote {
        Vote {
            vote_id,
            competition_id: self.competition_id,
            participant_id: self.participant_id,
            voter_user_id: self.voter_user_id,
            voter_ip: self.voter_ip,
            cast_at: self.cast_at,
            voter_verified: self.voter_verified,
        }
    }
}

/// Result of a ledger append: the new row and the counter after increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedVote {
    pub vote_id: Uuid,
    pub vote_count: i64,
}

/// Existing ledger rows for a participant matching the voter's account or IP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorVotes {
    pub by_account: bool,
    pub by_ip: bool,
}

/// Materialized ranks of one competition, keyed by participant id
pub type RankingMap = HashMap<Uuid, i64>;
