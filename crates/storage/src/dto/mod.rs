pub mod advancement;
pub mod common;
pub mod competition;
pub mod participant;
pub mod ranking;
pub mod vote;
