//! In-memory fixture shared by the engine's unit tests.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use storage::models::{
    Competition, CompetitionStatus, NewCompetition, NewParticipant, NewVote, Participant,
    ParticipantStatus, QualificationRules, Submission, Tier, TimeWindow,
};
use storage::{MemoryStore, Store};
use uuid::Uuid;

use crate::admission::CastVote;
use crate::clock::{Clock, ManualClock};
use crate::collaborators::{EngineEvent, Notifier};
use crate::config::EngineConfig;
use crate::fraud_guard::FraudGuard;
use crate::VotingEngine;

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingNotifier {
    fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn vote_events(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::VoteAccepted { .. }))
    }

    pub fn participation_events(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::ParticipationChanged { .. }))
    }

    pub fn advancement_events(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::AdvancementCompleted { .. }))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: EngineConfig,
    pub engine: VotingEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let clock = Arc::new(ManualClock::new(start));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = VotingEngine::new(
            store.clone(),
            config.clone(),
            clock.clone(),
            notifier.clone(),
        );

        Self {
            store,
            clock,
            notifier,
            config,
            engine,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ip(&self, n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
    }

    pub fn guard(&self) -> FraudGuard {
        FraudGuard::new(
            self.store.clone(),
            self.engine.velocity(),
            self.config.fraud_guard.clone(),
        )
    }

    pub fn vote(&self, participant: &Participant, voter: Uuid, ip: u8) -> NewVote {
        NewVote {
            competition_id: participant.competition_id,
            participant_id: participant.participant_id,
            voter_user_id: voter,
            voter_ip: self.ip(ip),
            cast_at: self.now(),
            voter_verified: true,
        }
    }

    pub fn cast(&self, participant: &Participant, voter: Uuid, ip: u8) -> CastVote {
        CastVote {
            competition_id: participant.competition_id,
            participant_id: participant.participant_id,
            voter_user_id: voter,
            voter_ip: self.ip(ip),
            voter_verified: true,
        }
    }

    async fn competition(
        &self,
        tier: Tier,
        status: CompetitionStatus,
        registration_window: TimeWindow,
        voting_window: TimeWindow,
        max_participants: Option<i32>,
        qualification_rules: QualificationRules,
    ) -> Competition {
        self.store
            .insert_competition(&NewCompetition {
                title: "Night skies".to_string(),
                tier,
                status,
                registration_window,
                voting_window,
                max_participants,
                qualification_rules,
                source_competition_id: None,
            })
            .await
            .unwrap()
    }

    /// Local competition whose voting runs from an hour ago to an hour ahead
    pub async fn voting_competition(&self) -> Competition {
        self.competition_in_voting_window(CompetitionStatus::VotingOpen)
            .await
    }

    /// Voting window contains `now` whatever `status` says
    pub async fn competition_in_voting_window(&self, status: CompetitionStatus) -> Competition {
        let now = self.now();
        self.competition(
            Tier::Local,
            status,
            TimeWindow::new(now - TimeDelta::days(8), now - TimeDelta::days(1)),
            TimeWindow::new(now - TimeDelta::hours(1), now + TimeDelta::hours(1)),
            None,
            QualificationRules::default(),
        )
        .await
    }

    /// Registration open from an hour ago to a week ahead
    pub async fn registration_competition(
        &self,
        rules: QualificationRules,
        max_participants: Option<i32>,
    ) -> Competition {
        let now = self.now();
        self.competition(
            Tier::Local,
            CompetitionStatus::RegistrationOpen,
            TimeWindow::new(now - TimeDelta::hours(1), now + TimeDelta::days(7)),
            TimeWindow::new(now + TimeDelta::days(8), now + TimeDelta::days(15)),
            max_participants,
            rules,
        )
        .await
    }

    pub async fn completed_competition(&self, tier: Tier) -> Competition {
        let now = self.now();
        self.competition(
            tier,
            CompetitionStatus::Completed,
            TimeWindow::new(now - TimeDelta::days(30), now - TimeDelta::days(20)),
            TimeWindow::new(now - TimeDelta::days(10), now - TimeDelta::days(3)),
            None,
            QualificationRules::default(),
        )
        .await
    }

    async fn participant(
        &self,
        competition_id: Uuid,
        status: ParticipantStatus,
        applied_at: DateTime<Utc>,
    ) -> Participant {
        let approved_at = (status == ParticipantStatus::Approved).then_some(applied_at);
        self.store
            .insert_participant(&NewParticipant {
                competition_id,
                user_id: Uuid::new_v4(),
                status,
                submission: Submission {
                    title: "Entry".to_string(),
                    ..Default::default()
                },
                applied_at,
                approved_at,
            })
            .await
            .unwrap()
    }

    pub async fn approved_participant(&self, competition_id: Uuid) -> Participant {
        self.participant(competition_id, ParticipantStatus::Approved, self.now())
            .await
    }

    pub async fn pending_participant(&self, competition_id: Uuid) -> Participant {
        self.participant(competition_id, ParticipantStatus::Pending, self.now())
            .await
    }

    /// Approved participant whose cached counter already reads `votes`
    pub async fn participant_with_votes(
        &self,
        competition_id: Uuid,
        votes: i64,
        applied_at: DateTime<Utc>,
    ) -> Participant {
        let participant = self
            .participant(competition_id, ParticipantStatus::Approved, applied_at)
            .await;
        for _ in 0..votes {
            self.store
                .increment_vote_count(participant.participant_id)
                .await
                .unwrap();
        }
        self.store
            .find_participant(participant.participant_id)
            .await
            .unwrap()
    }
}
