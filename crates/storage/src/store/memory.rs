use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::Store;
use crate::error::{Result, StorageError};
use crate::models::{
    AdvancementInfo, Competition, CompetitionStatus, NewCompetition, NewParticipant, NewVote,
    Participant, ParticipantStatus, PriorVotes, RankingMap, RecordedVote, Vote,
};

#[derive(Default)]
struct State {
    competitions: HashMap<Uuid, Competition>,
    participants: HashMap<Uuid, Participant>,
    previous_rankings: HashMap<Uuid, RankingMap>,
    votes: Vec<Vote>,
    vote_keys: HashSet<(Uuid, Uuid)>,
    faults: Faults,
}

#[derive(Default)]
struct Faults {
    registrations_left: Option<usize>,
    ledger_down: bool,
}

/// Single-process store. One lock guards all tables, which gives every
/// `Store` method the same all-or-nothing behaviour a database transaction
/// would.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more advanced registrations succeed, then fail every following
    /// one with `Unavailable` until `clear_faults` is called.
    pub fn fail_registrations_after(&self, n: usize) {
        self.state.lock().faults.registrations_left = Some(n);
    }

    /// Make every ledger write fail with `Unavailable`.
    pub fn fail_ledger_writes(&self, down: bool) {
        self.state.lock().faults.ledger_down = down;
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Snapshot of every ledger row, in append order.
    pub fn votes(&self) -> Vec<Vote> {
        self.state.lock().votes.clone()
    }

    pub fn competitions(&self) -> Vec<Competition> {
        self.state.lock().competitions.values().cloned().collect()
    }
}

fn approved_in(state: &State, competition_id: Uuid) -> i64 {
    state
        .participants
        .values()
        .filter(|p| p.competition_id == competition_id && p.status == ParticipantStatus::Approved)
        .count() as i64
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_competition(&self, new: &NewCompetition) -> Result<Competition> {
        let mut state = self.state.lock();

        if let Some(source_id) = new.source_competition_id
            && state
                .competitions
                .values()
                .any(|c| c.source_competition_id == Some(source_id))
        {
            return Err(StorageError::ConstraintViolation(
                "source_competition_id already used".to_string(),
            ));
        }

        let competition = new.clone().into_competition(Uuid::new_v4(), Utc::now());
        state
            .competitions
            .insert(competition.competition_id, competition.clone());

        Ok(competition)
    }

    async fn find_competition(&self, competition_id: Uuid) -> Result<Competition> {
        self.state
            .lock()
            .competitions
            .get(&competition_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn create_advanced_competition(&self, new: &NewCompetition) -> Result<Competition> {
        let source_id = new.source_competition_id.ok_or_else(|| {
            StorageError::ConstraintViolation("source_competition_id is required".to_string())
        })?;

        let mut state = self.state.lock();
        if let Some(existing) = state
            .competitions
            .values()
            .find(|c| c.source_competition_id == Some(source_id))
        {
            return Ok(existing.clone());
        }

        let competition = new.clone().into_competition(Uuid::new_v4(), Utc::now());
        state
            .competitions
            .insert(competition.competition_id, competition.clone());

        Ok(competition)
    }

    async fn transition_status(
        &self,
        competition_id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<Competition> {
        let mut state = self.state.lock();
        let competition = state
            .competitions
            .get_mut(&competition_id)
            .ok_or(StorageError::NotFound)?;

        if competition.status != from {
            return Err(StorageError::Conflict(format!(
                "status is {}, expected {}",
                competition.status, from
            )));
        }
        competition.status = to;

        Ok(competition.clone())
    }

    async fn set_advancement_info(
        &self,
        competition_id: Uuid,
        info: &AdvancementInfo,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let competition = state
            .competitions
            .get_mut(&competition_id)
            .ok_or(StorageError::NotFound)?;

        if competition.advancement_info.is_some() {
            return Err(StorageError::Conflict("already_advanced".to_string()));
        }
        competition.advancement_info = Some(info.clone());

        Ok(())
    }

    async fn insert_participant(&self, new: &NewParticipant) -> Result<Participant> {
        let mut state = self.state.lock();

        if !state.competitions.contains_key(&new.competition_id) {
            return Err(StorageError::NotFound);
        }
        if state
            .participants
            .values()
            .any(|p| p.competition_id == new.competition_id && p.user_id == new.user_id)
        {
            return Err(StorageError::ConstraintViolation(
                "user already entered this competition".to_string(),
            ));
        }

        let participant = new.clone().into_participant(Uuid::new_v4());
        state
            .participants
            .insert(participant.participant_id, participant.clone());

        Ok(participant)
    }

    async fn find_participant(&self, participant_id: Uuid) -> Result<Participant> {
        self.state
            .lock()
            .participants
            .get(&participant_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_participants(
        &self,
        competition_id: Uuid,
        status: Option<ParticipantStatus>,
    ) -> Result<Vec<Participant>> {
        let state = self.state.lock();
        let mut participants: Vec<Participant> = state
            .participants
            .values()
            .filter(|p| p.competition_id == competition_id)
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        participants.sort_by_key(|p| (p.applied_at, p.participant_id));

        Ok(participants)
    }

    async fn approve_participant(
        &self,
        participant_id: Uuid,
        approved_at: DateTime<Utc>,
    ) -> Result<Participant> {
        let mut state = self.state.lock();
        let participant = state
            .participants
            .get(&participant_id)
            .ok_or(StorageError::NotFound)?;

        if participant.status != ParticipantStatus::Pending {
            return Err(StorageError::Conflict(format!(
                "participant is {}",
                participant.status
            )));
        }

        let competition_id = participant.competition_id;
        let max = state
            .competitions
            .get(&competition_id)
            .ok_or(StorageError::NotFound)?
            .max_participants;
        if let Some(max) = max {
            let approved = approved_in(&state, competition_id);
            if approved >= i64::from(max) {
                return Err(StorageError::CapacityReached {
                    approved,
                    max: i64::from(max),
                });
            }
        }

        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or(StorageError::NotFound)?;
        participant.status = ParticipantStatus::Approved;
        participant.approved_at = Some(approved_at);

        Ok(participant.clone())
    }

    async fn update_participant_status(
        &self,
        participant_id: Uuid,
        from: &[ParticipantStatus],
        to: ParticipantStatus,
    ) -> Result<Participant> {
        let mut state = self.state.lock();
        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or(StorageError::NotFound)?;

        if !from.contains(&participant.status) {
            return Err(StorageError::Conflict(format!(
                "participant is {}",
                participant.status
            )));
        }
        participant.status = to;

        Ok(participant.clone())
    }

    async fn register_advanced_participant(
        &self,
        competition_id: Uuid,
        source: &Participant,
        now: DateTime<Utc>,
    ) -> Result<Participant> {
        let mut state = self.state.lock();

        if let Some(existing) = state
            .participants
            .values()
            .find(|p| p.competition_id == competition_id && p.user_id == source.user_id)
        {
            return Ok(existing.clone());
        }

        match state.faults.registrations_left {
            Some(0) => {
                return Err(StorageError::Unavailable(
                    "injected registration failure".to_string(),
                ));
            }
            Some(left) => state.faults.registrations_left = Some(left - 1),
            None => {}
        }

        if !state.competitions.contains_key(&competition_id) {
            return Err(StorageError::NotFound);
        }

        let participant = NewParticipant::promoted(competition_id, source, now)
            .into_participant(Uuid::new_v4());
        state
            .participants
            .insert(participant.participant_id, participant.clone());

        Ok(participant)
    }

    async fn prior_votes(
        &self,
        participant_id: Uuid,
        voter_user_id: Uuid,
        voter_ip: IpAddr,
    ) -> Result<PriorVotes> {
        let state = self.state.lock();
        let prior = state
            .votes
            .iter()
            .filter(|v| v.participant_id == participant_id)
            .fold(PriorVotes::default(), |acc, v| PriorVotes {
                by_account: acc.by_account || v.voter_user_id == voter_user_id,
                by_ip: acc.by_ip || v.voter_ip == voter_ip,
            });

        Ok(prior)
    }

    async fn record_vote(&self, vote: &NewVote) -> Result<RecordedVote> {
        let mut state = self.state.lock();

        if state.faults.ledger_down {
            return Err(StorageError::Unavailable("injected ledger failure".to_string()));
        }
        if !state.participants.contains_key(&vote.participant_id) {
            return Err(StorageError::NotFound);
        }
        if !state
            .vote_keys
            .insert((vote.voter_user_id, vote.participant_id))
        {
            return Err(StorageError::ConstraintViolation("duplicate_vote".to_string()));
        }

        let vote = vote.clone().into_vote(Uuid::new_v4());
        let vote_id = vote.vote_id;
        let participant = state
            .participants
            .get_mut(&vote.participant_id)
            .ok_or(StorageError::NotFound)?;
        participant.vote_count += 1;
        let vote_count = participant.vote_count;
        state.votes.push(vote);

        Ok(RecordedVote {
            vote_id,
            vote_count,
        })
    }

    async fn increment_vote_count(&self, participant_id: Uuid) -> Result<i64> {
        let mut state = self.state.lock();
        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or(StorageError::NotFound)?;
        participant.vote_count += 1;

        Ok(participant.vote_count)
    }

    async fn count_votes(&self, participant_id: Uuid) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .votes
            .iter()
            .filter(|v| v.participant_id == participant_id)
            .count() as i64)
    }

    async fn materialize_ranking(
        &self,
        competition_id: Uuid,
        ranks: &RankingMap,
    ) -> Result<RankingMap> {
        let mut state = self.state.lock();

        if !state.competitions.contains_key(&competition_id) {
            return Err(StorageError::NotFound);
        }

        let current: RankingMap = state
            .participants
            .values()
            .filter(|p| p.competition_id == competition_id)
            .filter_map(|p| p.ranking.map(|rank| (p.participant_id, rank)))
            .collect();

        if current == *ranks {
            return Ok(state
                .previous_rankings
                .get(&competition_id)
                .cloned()
                .unwrap_or_default());
        }

        for participant in state
            .participants
            .values_mut()
            .filter(|p| p.competition_id == competition_id)
        {
            participant.ranking = ranks.get(&participant.participant_id).copied();
        }
        state.previous_rankings.insert(competition_id, current.clone());

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::models::{QualificationRules, Submission, Tier, TimeWindow};

    fn new_competition() -> NewCompetition {
        let now = Utc::now();
        NewCompetition {
            title: "Spring Open".to_string(),
            tier: Tier::Local,
            status: CompetitionStatus::VotingOpen,
            registration_window: TimeWindow::new(now - Duration::days(2), now - Duration::days(1)),
            voting_window: TimeWindow::new(now - Duration::hours(1), now + Duration::hours(1)),
            max_participants: Some(1),
            qualification_rules: QualificationRules::default(),
            source_competition_id: None,
        }
    }

    async fn seed(store: &MemoryStore) -> (Competition, Participant) {
        let competition = store.insert_competition(&new_competition()).await.unwrap();
        let participant = store
            .insert_participant(&NewParticipant::application(
                competition.competition_id,
                Uuid::new_v4(),
                Submission::default(),
                Utc::now(),
            ))
            .await
            .unwrap();
        (competition, participant)
    }

    fn vote_for(participant: &Participant, voter: Uuid) -> NewVote {
        NewVote {
            competition_id: participant.competition_id,
            participant_id: participant.participant_id,
            voter_user_id: voter,
            voter_ip: "10.0.0.1".parse().unwrap(),
            cast_at: Utc::now(),
            voter_verified: true,
        }
    }

    #[tokio::test]
    async fn test_record_vote_rejects_second_row_for_pair() {
        let store = MemoryStore::new();
        let (_, participant) = seed(&store).await;
        let voter = Uuid::new_v4();

        let first = store.record_vote(&vote_for(&participant, voter)).await.unwrap();
        assert_eq!(first.vote_count, 1);

        let second = store.record_vote(&vote_for(&participant, voter)).await;
        assert!(matches!(second, Err(StorageError::ConstraintViolation(_))));

        let stored = store.find_participant(participant.participant_id).await.unwrap();
        assert_eq!(stored.vote_count, 1);
        assert_eq!(store.count_votes(participant.participant_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ledger_outage_leaves_no_partial_effect() {
        let store = MemoryStore::new();
        let (_, participant) = seed(&store).await;
        store.fail_ledger_writes(true);

        let result = store.record_vote(&vote_for(&participant, Uuid::new_v4())).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));

        let stored = store.find_participant(participant.participant_id).await.unwrap();
        assert_eq!(stored.vote_count, 0);
        assert!(store.votes().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let (_, participant) = seed(&store).await;

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = participant.participant_id;
                tokio::spawn(async move { store.increment_vote_count(id).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.find_participant(participant.participant_id).await.unwrap();
        assert_eq!(stored.vote_count, 100);
    }

    #[tokio::test]
    async fn test_approval_respects_capacity() {
        let store = MemoryStore::new();
        let (competition, first) = seed(&store).await;
        let second = store
            .insert_participant(&NewParticipant::application(
                competition.competition_id,
                Uuid::new_v4(),
                Submission::default(),
                Utc::now(),
            ))
            .await
            .unwrap();

        store
            .approve_participant(first.participant_id, Utc::now())
            .await
            .unwrap();
        let result = store.approve_participant(second.participant_id, Utc::now()).await;

        assert!(matches!(
            result,
            Err(StorageError::CapacityReached { approved: 1, max: 1 })
        ));
    }

    #[tokio::test]
    async fn test_advancement_info_is_write_once() {
        let store = MemoryStore::new();
        let (competition, _) = seed(&store).await;
        let info = AdvancementInfo {
            next_tier_competition_id: Uuid::new_v4(),
            advanced_participant_count: 3,
            advancement_date: Utc::now(),
        };

        store
            .set_advancement_info(competition.competition_id, &info)
            .await
            .unwrap();
        let second = store
            .set_advancement_info(competition.competition_id, &info)
            .await;

        assert!(matches!(second, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_materialize_keeps_previous_until_ranking_changes() {
        let store = MemoryStore::new();
        let (competition, participant) = seed(&store).await;
        let id = competition.competition_id;

        let first: RankingMap = [(participant.participant_id, 1)].into_iter().collect();
        assert!(store.materialize_ranking(id, &first).await.unwrap().is_empty());
        // Unchanged ranking does not rotate the snapshot
        assert!(store.materialize_ranking(id, &first).await.unwrap().is_empty());

        let second: RankingMap = [(participant.participant_id, 2)].into_iter().collect();
        let previous = store.materialize_ranking(id, &second).await.unwrap();
        assert_eq!(previous.get(&participant.participant_id), Some(&1));
    }
}
