use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use storage::Store;
use uuid::Uuid;

use crate::config::FraudGuardConfig;
use crate::error::{EngineError, Result};
use crate::velocity::{VelocityKey, VelocityWindow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// This account already has a vote for the participant
    DuplicateAccount,
    /// Another account on this IP already voted for the participant
    DuplicateIp,
    RateLimited { count: usize, ceiling: u32 },
}

impl DenyReason {
    pub fn into_error(self, config: &FraudGuardConfig) -> EngineError {
        match self {
            Self::DuplicateAccount => EngineError::DuplicateVote("already_voted".to_string()),
            Self::DuplicateIp => EngineError::DuplicateVote("ip_already_voted".to_string()),
            Self::RateLimited { count, ceiling } => EngineError::RateLimitExceeded {
                count,
                ceiling,
                window_secs: config.window.num_seconds(),
            },
        }
    }
}

/// Admission gate for votes. Reads the ledger and the velocity window; writes
/// nothing, so evaluating it twice gives the same answer.
#[derive(Clone)]
pub struct FraudGuard {
    store: Arc<dyn Store>,
    velocity: Arc<VelocityWindow>,
    config: FraudGuardConfig,
}

impl FraudGuard {
    pub fn new(
        store: Arc<dyn Store>,
        velocity: Arc<VelocityWindow>,
        config: FraudGuardConfig,
    ) -> Self {
        Self {
            store,
            velocity,
            config,
        }
    }

    pub fn config(&self) -> &FraudGuardConfig {
        &self.config
    }

    pub async fn admit(
        &self,
        competition_id: Uuid,
        participant_id: Uuid,
        voter_user_id: Uuid,
        voter_ip: IpAddr,
        now: DateTime<Utc>,
    ) -> Result<Admission> {
        let prior = self
            .store
            .prior_votes(participant_id, voter_user_id, voter_ip)
            .await
            .map_err(EngineError::Persistence)?;

        // Account duplicate is the more specific reason and wins over IP
        if prior.by_account {
            return Ok(Admission::Deny(DenyReason::DuplicateAccount));
        }
        if prior.by_ip && self.config.deny_shared_ip {
            return Ok(Admission::Deny(DenyReason::DuplicateIp));
        }

        let key = VelocityKey::for_scope(self.config.scope, voter_ip, voter_user_id);
        let count = self.velocity.count_within(&key, now);
        if count >= self.config.ip_ceiling as usize {
            tracing::debug!(
                %competition_id,
                %voter_ip,
                count,
                ceiling = self.config.ip_ceiling,
                "velocity ceiling reached"
            );
            return Ok(Admission::Deny(DenyReason::RateLimited {
                count,
                ceiling: self.config.ip_ceiling,
            }));
        }

        Ok(Admission::Allow)
    }
}
