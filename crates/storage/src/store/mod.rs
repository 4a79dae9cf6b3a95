//! Persistence boundary of the voting engine.
//!
//! Every method here is a single atomic unit on the backing store. Callers
//! never compose read-then-write sequences out of these to enforce an
//! invariant; the invariant lives in the method itself:
//!
//! - `record_vote` inserts the ledger row and bumps the cached counter in one
//!   transaction, and rejects a second row for the same (voter, participant)
//!   pair with `StorageError::ConstraintViolation`.
//! - `approve_participant` checks `max_participants` and flips the status
//!   under the same lock.
//! - `create_advanced_competition` and `register_advanced_participant` are
//!   idempotent on their natural keys so a failed advancement can be re-run.
//! - `set_advancement_info` is a conditional write that only the first caller
//!   wins.

mod memory;
mod postgres;

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AdvancementInfo, Competition, CompetitionStatus, NewCompetition, NewParticipant, NewVote,
    Participant, ParticipantStatus, PriorVotes, RankingMap, RecordedVote,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_competition(&self, new: &NewCompetition) -> Result<Competition>;

    async fn find_competition(&self, competition_id: Uuid) -> Result<Competition>;

    /// Insert the next-tier competition for `new.source_competition_id`, or
    /// return the one a previous attempt already created.
    async fn create_advanced_competition(&self, new: &NewCompetition) -> Result<Competition>;

    /// Compare-and-set on the status column. Fails with `Conflict` when the
    /// stored status is no longer `from`.
    async fn transition_status(
        &self,
        competition_id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<Competition>;

    /// Write-once. Fails with `Conflict("already_advanced")` if already set.
    async fn set_advancement_info(&self, competition_id: Uuid, info: &AdvancementInfo)
    -> Result<()>;

    /// Fails with `ConstraintViolation` when the user already has an entry
    /// in the competition.
    async fn insert_participant(&self, new: &NewParticipant) -> Result<Participant>;

    async fn find_participant(&self, participant_id: Uuid) -> Result<Participant>;

    async fn list_participants(
        &self,
        competition_id: Uuid,
        status: Option<ParticipantStatus>,
    ) -> Result<Vec<Participant>>;

    /// pending → approved, bounded by the competition's `max_participants`.
    async fn approve_participant(
        &self,
        participant_id: Uuid,
        approved_at: DateTime<Utc>,
    ) -> Result<Participant>;

    /// Move a participant to `to` if its current status is one of `from`.
    async fn update_participant_status(
        &self,
        participant_id: Uuid,
        from: &[ParticipantStatus],
        to: ParticipantStatus,
    ) -> Result<Participant>;

    /// Pre-approved copy of `source` inside `competition_id`; returns the
    /// existing row if this user was already registered there.
    async fn register_advanced_participant(
        &self,
        competition_id: Uuid,
        source: &Participant,
        now: DateTime<Utc>,
    ) -> Result<Participant>;

    /// One combined lookup of existing votes for `participant_id` by this
    /// account or from this IP.
    async fn prior_votes(
        &self,
        participant_id: Uuid,
        voter_user_id: Uuid,
        voter_ip: IpAddr,
    ) -> Result<PriorVotes>;

    /// Append to the ledger and increment the participant's counter as one
    /// unit.
    async fn record_vote(&self, vote: &NewVote) -> Result<RecordedVote>;

    /// Atomic `vote_count = vote_count + 1`, returning the new value.
    async fn increment_vote_count(&self, participant_id: Uuid) -> Result<i64>;

    /// Number of ledger rows for a participant.
    async fn count_votes(&self, participant_id: Uuid) -> Result<i64>;

    /// Replace the competition's current ranking with `ranks` if it differs,
    /// keeping the replaced one as the previous ranking. Returns the previous
    /// ranking after the call.
    async fn materialize_ranking(&self, competition_id: Uuid, ranks: &RankingMap)
    -> Result<RankingMap>;
}
