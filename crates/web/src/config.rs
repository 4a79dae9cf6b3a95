use std::time::Duration;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use engine::{EngineConfig, FraudGuardConfig, VelocityScope};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub api_keys: String,
    pub identity_url: Option<String>,
    /// Treat every voter as verified when no identity service is configured
    pub allow_unverified_voters: bool,
    pub trusted_proxy_hops: usize,
    pub notify_webhook_url: Option<String>,
    pub engine: EngineConfig,
    pub velocity_sweep: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = FraudGuardConfig::default();

        let ip_ceiling = match lookup("VOTE_IP_CEILING") {
            Some(v) => v.parse().context("VOTE_IP_CEILING must be a number")?,
            None => defaults.ip_ceiling,
        };
        let window_secs: i64 = match lookup("VOTE_IP_WINDOW_SECS") {
            Some(v) => v.parse().context("VOTE_IP_WINDOW_SECS must be a number")?,
            None => defaults.window.num_seconds(),
        };
        if window_secs < 1 {
            anyhow::bail!("VOTE_IP_WINDOW_SECS must be positive");
        }
        let scope = match lookup("VOTE_VELOCITY_SCOPE") {
            Some(v) => v.parse::<VelocityScope>().map_err(anyhow::Error::msg)?,
            None => defaults.scope,
        };
        let deny_shared_ip = match lookup("VOTE_DENY_SHARED_IP") {
            Some(v) => v
                .parse()
                .context("VOTE_DENY_SHARED_IP must be true or false")?,
            None => defaults.deny_shared_ip,
        };
        let trusted_proxy_hops = match lookup("TRUSTED_PROXY_HOPS") {
            Some(v) => v.parse().context("TRUSTED_PROXY_HOPS must be a number")?,
            None => 0,
        };
        let allow_unverified_voters = match lookup("ALLOW_UNVERIFIED_VOTERS") {
            Some(v) => v
                .parse()
                .context("ALLOW_UNVERIFIED_VOTERS must be true or false")?,
            None => false,
        };
        let identity_url = lookup("IDENTITY_URL").filter(|v| !v.trim().is_empty());
        if identity_url.is_none() && !allow_unverified_voters {
            anyhow::bail!("IDENTITY_URL is required unless ALLOW_UNVERIFIED_VOTERS=true");
        }
        let sweep_secs: u64 = match lookup("VELOCITY_SWEEP_SECS") {
            Some(v) => v.parse().context("VELOCITY_SWEEP_SECS must be a number")?,
            None => 30,
        };

        Ok(Self {
            host: lookup("HOST").context("Cannot load HOST env variable")?,
            port: lookup("PORT")
                .context("Cannot load PORT env variable")?
                .parse()
                .context("PORT must be a number")?,
            database_url: lookup("DATABASE_URL")
                .context("Cannot load DATABASE_URL env variable")?,
            api_keys: lookup("API_KEYS").unwrap_or_default(),
            identity_url,
            allow_unverified_voters,
            trusted_proxy_hops,
            notify_webhook_url: lookup("NOTIFY_WEBHOOK_URL").filter(|v| !v.trim().is_empty()),
            engine: EngineConfig {
                fraud_guard: FraudGuardConfig {
                    ip_ceiling,
                    window: TimeDelta::seconds(window_secs),
                    scope,
                    deny_shared_ip,
                },
            },
            velocity_sweep: Duration::from_secs(sweep_secs.max(1)),
        })
    }
}
