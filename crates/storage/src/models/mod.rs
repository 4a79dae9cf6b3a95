mod competition;
mod participant;
mod vote;

pub use competition::{
    AdvancementInfo, Competition, CompetitionStatus, NewCompetition, QualificationRules, Tier,
    TimeWindow,
};
pub use participant::{NewParticipant, Participant, ParticipantStatus, Submission};
pub use vote::{NewVote, PriorVotes, RankingMap, RecordedVote, Vote};
