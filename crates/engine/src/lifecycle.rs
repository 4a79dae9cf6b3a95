use std::sync::Arc;

use storage::models::{Competition, CompetitionStatus, NewCompetition};
use storage::{StorageError, Store};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Organizer-side competition lifecycle.
#[derive(Clone)]
pub struct CompetitionService {
    store: Arc<dyn Store>,
}

impl CompetitionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new: NewCompetition) -> Result<Competition> {
        validate_new(&new)?;

        let competition = self
            .store
            .insert_competition(&new)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))?;

        tracing::info!(
            competition_id = %competition.competition_id,
            tier = %competition.tier,
            "competition created"
        );
        Ok(competition)
    }

    pub async fn get(&self, competition_id: Uuid) -> Result<Competition> {
        self.store
            .find_competition(competition_id)
            .await
            .map_err(|e| EngineError::from_storage(e, "competition"))
    }

    /// Move the competition forward to `to`. Skipping ahead is allowed; going
    /// back or staying put is not.
    pub async fn transition(
        &self,
        competition_id: Uuid,
        to: CompetitionStatus,
    ) -> Result<Competition> {
        let current = self.get(competition_id).await?;
        if !current.status.can_transition_to(to) {
            return Err(EngineError::State(format!(
                "illegal_status_transition: {} -> {}",
                current.status, to
            )));
        }

        let competition = self
            .store
            .transition_status(competition_id, current.status, to)
            .await
            .map_err(|e| match e {
                // Someone else moved it between our read and the swap
                StorageError::Conflict(_) => EngineError::State("status_changed".to_string()),
                other => EngineError::from_storage(other, "competition"),
            })?;

        tracing::info!(
            %competition_id,
            from = %current.status,
            to = %to,
            "competition status changed"
        );
        Ok(competition)
    }
}

fn validate_new(new: &NewCompetition) -> Result<()> {
    if new.title.trim().is_empty() {
        return Err(EngineError::Validation("title must not be empty".to_string()));
    }
    if !new.registration_window.is_well_formed() {
        return Err(EngineError::Validation(
            "registration window must start before it ends".to_string(),
        ));
    }
    if !new.voting_window.is_well_formed() {
        return Err(EngineError::Validation(
            "voting window must start before it ends".to_string(),
        ));
    }
    if new.voting_window.start < new.registration_window.end {
        return Err(EngineError::Validation(
            "voting cannot start before registration ends".to_string(),
        ));
    }
    if new.max_participants.is_some_and(|max| max < 1) {
        return Err(EngineError::Validation(
            "max_participants must be positive".to_string(),
        ));
    }

    let rules = &new.qualification_rules;
    if rules.top_n.is_some_and(|n| n < 1) {
        return Err(EngineError::Validation("top_n must be at least 1".to_string()));
    }
    if rules.min_votes.is_some_and(|v| v < 0) {
        return Err(EngineError::Validation("min_votes cannot be negative".to_string()));
    }

    Ok(())
}
