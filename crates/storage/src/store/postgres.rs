use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Store;
use crate::Database;
use crate::error::Result;
use crate::models::{
    AdvancementInfo, Competition, CompetitionStatus, NewCompetition, NewParticipant, NewVote,
    Participant, ParticipantStatus, PriorVotes, RankingMap, RecordedVote,
};
use crate::repository::{
    competition::CompetitionRepository, participant::ParticipantRepository,
    ranking::RankingRepository, vote::VoteRepository,
};

/// `Store` backed by PostgreSQL through the table repositories
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_competition(&self, new: &NewCompetition) -> Result<Competition> {
        CompetitionRepository::new(self.db.pool()).create(new).await
    }

    async fn find_competition(&self, competition_id: Uuid) -> Result<Competition> {
        CompetitionRepository::new(self.db.pool())
            .find_by_id(competition_id)
            .await
    }

    async fn create_advanced_competition(&self, new: &NewCompetition) -> Result<Competition> {
        CompetitionRepository::new(self.db.pool())
            .create_or_get_advanced(new)
            .await
    }

    async fn transition_status(
        &self,
        competition_id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<Competition> {
        CompetitionRepository::new(self.db.pool())
            .transition_status(competition_id, from, to)
            .await
    }

    async fn set_advancement_info(
        &self,
        competition_id: Uuid,
        info: &AdvancementInfo,
    ) -> Result<()> {
        CompetitionRepository::new(self.db.pool())
            .set_advancement_info(competition_id, info)
            .await
    }

    async fn insert_participant(&self, new: &NewParticipant) -> Result<Participant> {
        ParticipantRepository::new(self.db.pool()).create(new).await
    }

    async fn find_participant(&self, participant_id: Uuid) -> Result<Participant> {
        ParticipantRepository::new(self.db.pool())
            .find_by_id(participant_id)
            .await
    }

    async fn list_participants(
        &self,
        competition_id: Uuid,
        status: Option<ParticipantStatus>,
    ) -> Result<Vec<Participant>> {
        ParticipantRepository::new(self.db.pool())
            .list(competition_id, status)
            .await
    }

    async fn approve_participant(
        &self,
        participant_id: Uuid,
        approved_at: DateTime<Utc>,
    ) -> Result<Participant> {
        ParticipantRepository::new(self.db.pool())
            .approve(participant_id, approved_at)
            .await
    }

    async fn update_participant_status(
        &self,
        participant_id: Uuid,
        from: &[ParticipantStatus],
        to: ParticipantStatus,
    ) -> Result<Participant> {
        ParticipantRepository::new(self.db.pool())
            .update_status(participant_id, from, to)
            .await
    }

    async fn register_advanced_participant(
        &self,
        competition_id: Uuid,
        source: &Participant,
        now: DateTime<Utc>,
    ) -> Result<Participant> {
        ParticipantRepository::new(self.db.pool())
            .create_or_get_promoted(competition_id, source, now)
            .await
    }

    async fn prior_votes(
        &self,
        participant_id: Uuid,
        voter_user_id: Uuid,
        voter_ip: IpAddr,
    ) -> Result<PriorVotes> {
        VoteRepository::new(self.db.pool())
            .prior_votes(participant_id, voter_user_id, voter_ip)
            .await
    }

    async fn record_vote(&self, vote: &NewVote) -> Result<RecordedVote> {
        VoteRepository::new(self.db.pool()).record(vote).await
    }

    async fn increment_vote_count(&self, participant_id: Uuid) -> Result<i64> {
        ParticipantRepository::new(self.db.pool())
            .increment_vote_count(participant_id)
            .await
    }

    async fn count_votes(&self, participant_id: Uuid) -> Result<i64> {
        VoteRepository::new(self.db.pool())
            .count_for_participant(participant_id)
            .await
    }

    async fn materialize_ranking(
        &self,
        competition_id: Uuid,
        ranks: &RankingMap,
    ) -> Result<RankingMap> {
        RankingRepository::new(self.db.pool())
            .materialize(competition_id, ranks)
            .await
    }
}
