use std::str::FromStr;

use chrono::TimeDelta;
use serde::Deserialize;

/// What a velocity window is keyed by.
///
/// `Ip` bounds the whole address; `IpAndVoter` gives each account behind a
/// shared address its own budget while still bounding every account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityScope {
    #[default]
    Ip,
    IpAndVoter,
}

impl FromStr for VelocityScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" => Ok(Self::Ip),
            "ip_voter" | "ip_and_voter" => Ok(Self::IpAndVoter),
            other => Err(format!("unknown velocity scope '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FraudGuardConfig {
    /// Accepted votes allowed per key inside the trailing window
    pub ip_ceiling: u32,
    pub window: TimeDelta,
    pub scope: VelocityScope,
    /// Reject a vote when the same IP already voted for the participant
    pub deny_shared_ip: bool,
}

impl Default for FraudGuardConfig {
    fn default() -> Self {
        Self {
            ip_ceiling: 10,
            window: TimeDelta::seconds(60),
            scope: VelocityScope::Ip,
            deny_shared_ip: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub fraud_guard: FraudGuardConfig,
}
