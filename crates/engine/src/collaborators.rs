//! Seams to the services the engine relies on but does not own: identity
//! verification and notification delivery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storage::models::ParticipantStatus;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Pending,
    Rejected,
}

impl VerificationStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verification(&self, user_id: Uuid) -> Result<VerificationStatus>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    VoteAccepted {
        competition_id: Uuid,
        participant_id: Uuid,
        vote_count: i64,
    },
    ParticipationChanged {
        competition_id: Uuid,
        participant_id: Uuid,
        user_id: Uuid,
        status: ParticipantStatus,
    },
    AdvancementCompleted {
        source_competition_id: Uuid,
        next_competition_id: Uuid,
        advanced_participant_count: i32,
    },
}

/// Fire-and-forget delivery. Implementations must not block and must swallow
/// their own failures; the operation that emitted the event has already
/// succeeded.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: EngineEvent);
}

/// Emits events as log lines only
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: EngineEvent) {
        tracing::debug!(?event, "engine event");
    }
}
