//! User profiles and the onboarding walkthrough.

pub mod handlers;
pub mod models;
