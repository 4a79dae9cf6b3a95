//! Voting-integrity and tier-advancement engine.
//!
//! `VotingEngine` wires the components over one [`Store`], one [`Clock`] and
//! one [`Notifier`]:
//!
//! - [`admission::AdmissionController`] casts votes
//! - [`fraud_guard::FraudGuard`] decides duplicate and velocity admission
//! - [`ledger::VoteLedger`] appends votes and audits counters
//! - [`ranking::RankingEngine`] builds leaderboards with trends
//! - [`advancement::AdvancementOrchestrator`] promotes winners one tier up
//! - [`registration::Registrar`] and [`lifecycle::CompetitionService`] cover
//!   participation and competition status

pub mod admission;
pub mod advancement;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod fraud_guard;
pub mod ledger;
pub mod lifecycle;
pub mod ranking;
pub mod registration;
pub mod velocity;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use storage::Store;
use storage::dto::advancement::{AdvancementCriteria, AdvancementOutcome};
use storage::dto::ranking::LeaderboardPage;
use storage::dto::vote::VoteReceipt;
use storage::models::Tier;
use uuid::Uuid;

pub use admission::CastVote;
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    EngineEvent, IdentityVerifier, Notifier, TracingNotifier, VerificationStatus,
};
pub use config::{EngineConfig, FraudGuardConfig, VelocityScope};
pub use error::{EngineError, Result};

use admission::AdmissionController;
use advancement::AdvancementOrchestrator;
use fraud_guard::FraudGuard;
use ledger::VoteLedger;
use lifecycle::CompetitionService;
use ranking::RankingEngine;
use registration::Registrar;
use velocity::VelocityWindow;

#[derive(Clone)]
pub struct VotingEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    velocity: Arc<VelocityWindow>,
    admission: AdmissionController,
    ledger: VoteLedger,
    ranking: RankingEngine,
    advancement: AdvancementOrchestrator,
    registrar: Registrar,
    competitions: CompetitionService,
}

impl VotingEngine {
    pub fn new(
        store: Arc<dyn Store>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let velocity = Arc::new(VelocityWindow::new(config.fraud_guard.window));
        let guard = FraudGuard::new(
            Arc::clone(&store),
            Arc::clone(&velocity),
            config.fraud_guard.clone(),
        );
        let ledger = VoteLedger::new(Arc::clone(&store));
        let ranking = RankingEngine::new(Arc::clone(&store));

        let admission = AdmissionController::new(
            Arc::clone(&store),
            guard,
            ledger.clone(),
            Arc::clone(&velocity),
            Arc::clone(&clock),
            Arc::clone(&notifier),
        );
        let advancement = AdvancementOrchestrator::new(
            Arc::clone(&store),
            ranking.clone(),
            Arc::clone(&clock),
            Arc::clone(&notifier),
        );
        let registrar = Registrar::new(Arc::clone(&store), Arc::clone(&clock), notifier);
        let competitions = CompetitionService::new(store);

        Self {
            config,
            clock,
            velocity,
            admission,
            ledger,
            ranking,
            advancement,
            registrar,
            competitions,
        }
    }

    pub async fn cast_vote(&self, cmd: CastVote) -> Result<VoteReceipt> {
        self.admission.cast_vote(cmd).await
    }

    pub async fn leaderboard(
        &self,
        competition_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<LeaderboardPage> {
        self.ranking.leaderboard(competition_id, limit, offset).await
    }

    pub async fn advance(
        &self,
        competition_id: Uuid,
        next_tier: Tier,
        criteria: AdvancementCriteria,
    ) -> Result<AdvancementOutcome> {
        self.advancement
            .advance(competition_id, next_tier, criteria)
            .await
    }

    pub fn competitions(&self) -> &CompetitionService {
        &self.competitions
    }

    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn ranking(&self) -> &RankingEngine {
        &self.ranking
    }

    pub fn velocity(&self) -> Arc<VelocityWindow> {
        Arc::clone(&self.velocity)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Evict velocity keys whose window has fully elapsed
    pub fn sweep_velocity(&self) -> usize {
        self.velocity.sweep(self.clock.now())
    }
}
