use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Stage of a competition in the promotion ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Local,
    National,
    Global,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::National => "national",
            Self::Global => "global",
        }
    }

    /// The only tier winners of this tier may be promoted into
    pub fn next(&self) -> Option<Tier> {
        match self {
            Self::Local => Some(Self::National),
            Self::National => Some(Self::Global),
            Self::Global => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "national" => Ok(Self::National),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// Competition lifecycle. Transitions only ever move forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    Draft,
    RegistrationOpen,
    RegistrationClosed,
    VotingOpen,
    VotingClosed,
    Completed,
}

impl CompetitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::RegistrationOpen => "registration_open",
            Self::RegistrationClosed => "registration_closed",
            Self::VotingOpen => "voting_open",
            Self::VotingClosed => "voting_closed",
            Self::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: CompetitionStatus) -> bool {
        next > *self
    }

    /// Participants are frozen once voting has closed
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::VotingClosed | Self::Completed)
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompetitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "registration_open" => Ok(Self::RegistrationOpen),
            "registration_closed" => Ok(Self::RegistrationClosed),
            "voting_open" => Ok(Self::VotingOpen),
            "voting_closed" => Ok(Self::VotingClosed),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown competition status '{}'", other)),
        }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

/// Entry rules for a competition.
///
/// `top_n` and `min_votes` describe the bar participants must clear to be
/// promoted out of this competition; absent values fall back to the
/// advancement defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QualificationRules {
    pub requires_approval: bool,
    pub top_n: Option<i32>,
    pub min_votes: Option<i64>,
}

impl Default for QualificationRules {
    fn default() -> Self {
        Self {
            requires_approval: true,
            top_n: None,
            min_votes: None,
        }
    }
}

/// Written exactly once, when this competition's winners were promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AdvancementInfo {
    pub next_tier_competition_id: Uuid,
    pub advanced_participant_count: i32,
    pub advancement_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Competition {
    pub competition_id: Uuid,
    pub title: String,
    pub tier: Tier,
    pub status: CompetitionStatus,
    pub registration_window: TimeWindow,
    pub voting_window: TimeWindow,
    pub max_participants: Option<i32>,
    pub qualification_rules: QualificationRules,
    pub source_competition_id: Option<Uuid>,
    pub advancement_info: Option<AdvancementInfo>,
    pub created_at: DateTime<Utc>,
}

impl Competition {
    pub fn is_advanced(&self) -> bool {
        self.advancement_info.is_some()
    }
}

/// Fields required to insert a competition
#[derive(Debug, Clone)]
pub struct NewCompetition {
    pub title: String,
    pub tier: Tier,
    pub status: CompetitionStatus,
    pub registration_window: TimeWindow,
    pub voting_window: TimeWindow,
    pub max_participants: Option<i32>,
    pub qualification_rules: QualificationRules,
    pub source_competition_id: Option<Uuid>,
}

impl NewCompetition {
    pub fn into_competition(self, competition_id: Uuid, created_at: DateTime<Utc>) -> Competition {
        Competition {
            competition_id,
            title: self.title,
            tier: self.tier,
            status: self.status,
            registration_window: self.registration_window,
            voting_window: self.voting_window,
            max_participants: self.max_participants,
            qualification_rules: self.qualification_rules,
            source_competition_id: self.source_competition_id,
            advancement_info: None,
            created_at,
        }
    }
}
