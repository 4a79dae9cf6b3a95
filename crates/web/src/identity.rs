use async_trait::async_trait;
use engine::{EngineError, IdentityVerifier, VerificationStatus};
use serde::Deserialize;
use storage::StorageError;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    status: VerificationStatus,
}

/// Asks the identity service for a user's verification decision.
pub struct HttpIdentityVerifier {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIdentityVerifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn unavailable(error: impl std::fmt::Display) -> EngineError {
        EngineError::Persistence(StorageError::Unavailable(format!(
            "identity service: {}",
            error
        )))
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verification(&self, user_id: Uuid) -> engine::Result<VerificationStatus> {
        let url = format!("{}/users/{}/verification", self.base_url, user_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::unavailable)?;

        // Unknown users are simply not verified
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(VerificationStatus::Pending);
        }

        let body = response
            .error_for_status()
            .map_err(Self::unavailable)?
            .json::<VerificationResponse>()
            .await
            .map_err(Self::unavailable)?;

        Ok(body.status)
    }
}

/// Every caller counts as verified. Installed only with
/// `ALLOW_UNVERIFIED_VOTERS=true` and no `IDENTITY_URL`.
pub struct TrustAllVerifier;

#[async_trait]
impl IdentityVerifier for TrustAllVerifier {
    async fn verification(&self, _user_id: Uuid) -> engine::Result<VerificationStatus> {
        Ok(VerificationStatus::Verified)
    }
}
