use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::onboarding::models::OnboardingStep;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub university: Option<String>,
    pub career_path: Option<String>,
    pub personality_type: Option<String>,
    pub work_model: Option<String>,
    pub career_goal: Option<String>,
    pub industries: Vec<String>,
    pub companies: Vec<String>,
    pub completed_steps: Vec<String>,
    /// Next unanswered onboarding step, or `done`.
    pub onboarding_step: String,
    /// Archive key of the latest uploaded CV.
    pub cv_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, full_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            full_name,
            university: None,
            career_path: None,
            personality_type: None,
            work_model: None,
            career_goal: None,
            industries: Vec::new(),
            companies: Vec::new(),
            completed_steps: Vec::new(),
            onboarding_step: OnboardingStep::ALL[0].as_str().to_string(),
            cv_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}
