use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Participant;

/// Movement of a participant relative to the previous materialized ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Same,
    New,
}

impl Trend {
    pub fn between(previous: Option<i64>, current: i64) -> Self {
        match previous {
            None => Self::New,
            Some(prev) if current < prev => Self::Up,
            Some(prev) if current > prev => Self::Down,
            Some(_) => Self::Same,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub trend: Trend,
    pub vote_count: i64,
    pub participant: Participant,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    /// Number of ranked participants across all pages
    pub total: u64,
}
