use std::sync::Arc;

use engine::{IdentityVerifier, VotingEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: VotingEngine,
    pub identity: Arc<dyn IdentityVerifier>,
    /// Reverse proxies whose `X-Forwarded-For` entries are believed
    pub trusted_proxy_hops: usize,
}
