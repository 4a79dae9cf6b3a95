use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(format!("unknown participant status '{}'", other)),
        }
    }
}

/// The entry a participant submitted. Carried verbatim across tiers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Submission {
    pub title: String,
    pub description: String,
    pub media_refs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    pub participant_id: Uuid,
    pub competition_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipantStatus,
    pub submission: Submission,
    /// Cached tally of ledger rows for this participant
    pub vote_count: i64,
    /// Last materialized rank; derived, never ground truth
    pub ranking: Option<i64>,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub competition_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipantStatus,
    pub submission: Submission,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl NewParticipant {
    /// An application awaiting organizer review
    pub fn application(
        competition_id: Uuid,
        user_id: Uuid,
        submission: Submission,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            competition_id,
            user_id,
            status: ParticipantStatus::Pending,
            submission,
            applied_at,
            approved_at: None,
        }
    }

    /// A pre-approved entry carried over from a lower tier
    pub fn promoted(competition_id: Uuid, source: &Participant, now: DateTime<Utc>) -> Self {
        Self {
            competition_id,
            user_id: source.user_id,
            status: ParticipantStatus::Approved,
            submission: source.submission.clone(),
            applied_at: now,
            approved_at: Some(now),
        }
    }

    pub fn into_participant(self, participant_id: Uuid) -> Participant {
        Participant {
            participant_id,
            competition_id: self.competition_id,
            user_id: self.user_id,
            status: self.status,
            submission: self.submission,
            vote_count: 0,
            ranking: None,
            applied_at: self.applied_at,
            approved_at: self.approved_at,
        }
    }
}
