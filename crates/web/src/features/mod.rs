pub mod advancement;
pub mod competitions;
pub mod leaderboard;
pub mod participants;
pub mod votes;
