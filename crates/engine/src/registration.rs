use std::sync::Arc;

use storage::models::{
    CompetitionStatus, NewParticipant, Participant, ParticipantStatus, Submission,
};
use storage::{StorageError, Store};
use uuid::Uuid;

use crate::clock::Clock;
use crate::collaborators::{EngineEvent, Notifier};
use crate::error::{EngineError, Result};

/// Participation lifecycle: application, review and withdrawal.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl Registrar {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }

    /// Enter `user_id` into a competition whose registration is open.
    ///
    /// Competitions without `requires_approval` approve the entry on the spot
    /// when capacity allows; a full competition leaves it pending for review.
    pub async fn apply(
        &self,
        competition_id: Uuid,
        user_id: Uuid,
        submission: Submission,
    ) -> Result<Participant> {
        let now = self.clock.now();
        let competition = self
            .store
            .find_competition(competition_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;

        if competition.status != CompetitionStatus::RegistrationOpen
            || !competition.registration_window.contains(now)
        {
            return Err(EngineError::WindowClosed("registration_closed".to_string()));
        }

        let new = NewParticipant::application(competition_id, user_id, submission, now);
        let mut participant = self
            .store
            .insert_participant(&new)
            .await
            .map_err(|e| match e {
                StorageError::ConstraintViolation(_) => {
                    EngineError::State("already_applied".to_string())
                }
                other => EngineError::from_storage(other, "competition"),
            })?;

        if !competition.qualification_rules.requires_approval {
            match self
                .store
                .approve_participant(participant.participant_id, now)
                .await
            {
                Ok(approved) => participant = approved,
                Err(StorageError::CapacityReached { approved, max }) => {
                    tracing::warn!(
                        %competition_id,
                        participant_id = %participant.participant_id,
                        approved,
                        max,
                        "competition full, entry left pending"
                    );
                }
                Err(e) => return Err(EngineError::from_storage(e, "participant")),
            }
        }

        tracing::info!(
            %competition_id,
            participant_id = %participant.participant_id,
            status = %participant.status,
            "application received"
        );
        self.changed(&participant);
        Ok(participant)
    }

    pub async fn approve(&self, participant_id: Uuid) -> Result<Participant> {
        let participant = self
            .store
            .approve_participant(participant_id, self.clock.now())
            .await
            .map_err(|e| EngineError::from_storage(e, "participant"))?;

        self.changed(&participant);
        Ok(participant)
    }

    pub async fn reject(&self, participant_id: Uuid) -> Result<Participant> {
        let participant = self
            .store
            .update_participant_status(
                participant_id,
                &[ParticipantStatus::Pending],
                ParticipantStatus::Rejected,
            )
            .await
            .map_err(|e| EngineError::from_storage(e, "participant"))?;

        self.changed(&participant);
        Ok(participant)
    }

    /// Owner-initiated exit. Votes already cast stay in the ledger; the entry
    /// simply stops being ranked.
    pub async fn withdraw(&self, participant_id: Uuid, user_id: Uuid) -> Result<Participant> {
        let participant = self
            .store
            .find_participant(participant_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "participant"))?;
        if participant.user_id != user_id {
            return Err(EngineError::Permission("not_owner".to_string()));
        }

        let competition = self
            .store
            .find_competition(participant.competition_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;
        if competition.status.is_frozen() {
            return Err(EngineError::State("competition_frozen".to_string()));
        }

        let participant = self
            .store
            .update_participant_status(
                participant_id,
                &[ParticipantStatus::Pending, ParticipantStatus::Approved],
                ParticipantStatus::Withdrawn,
            )
            .await
            .map_err(|e| EngineError::from_storage(e, "participant"))?;

        self.changed(&participant);
        Ok(participant)
    }

    fn changed(&self, participant: &Participant) {
        self.notifier.notify(EngineEvent::ParticipationChanged {
            competition_id: participant.competition_id,
            participant_id: participant.participant_id,
            user_id: participant.user_id,
            status: participant.status,
        });
    }
}
