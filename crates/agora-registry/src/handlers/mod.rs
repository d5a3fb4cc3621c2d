//! Request handlers

pub mod agents;
pub mod rfp;
pub mod assignments;
pub mod health;
