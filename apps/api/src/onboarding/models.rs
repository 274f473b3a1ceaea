use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::user::User;

/// `onboarding_step` value once every step has an answer.
pub const ONBOARDING_DONE: &str = "done";

const MAX_TEXT_LEN: usize = 200;
const MAX_LIST_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnboardingStep {
    University,
    CareerPath,
    Personality,
    WorkModel,
    CareerGoal,
    Industry,
    Company,
}

impl OnboardingStep {
    /// Walkthrough order.
    pub const ALL: [OnboardingStep; 7] = [
        OnboardingStep::University,
        OnboardingStep::CareerPath,
        OnboardingStep::Personality,
        OnboardingStep::WorkModel,
        OnboardingStep::CareerGoal,
        OnboardingStep::Industry,
        OnboardingStep::Company,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::University => "university",
            OnboardingStep::CareerPath => "career_path",
            OnboardingStep::Personality => "personality",
            OnboardingStep::WorkModel => "work_model",
            OnboardingStep::CareerGoal => "career_goal",
            OnboardingStep::Industry => "industry",
            OnboardingStep::Company => "company",
        }
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnboardingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown onboarding step '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Remote,
    Hybrid,
    Onsite,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkMode::Remote => "remote",
            WorkMode::Hybrid => "hybrid",
            WorkMode::Onsite => "onsite",
        }
    }
}

/// One answered onboarding question: `{"step": "...", "value": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", content = "value", rename_all = "snake_case")]
pub enum OnboardingAnswer {
    University(String),
    CareerPath(String),
    Personality(String),
    WorkModel(WorkMode),
    CareerGoal(String),
    Industry(Vec<String>),
    Company(Vec<String>),
}

impl OnboardingAnswer {
    pub fn step(&self) -> OnboardingStep {
        match self {
            OnboardingAnswer::University(_) => OnboardingStep::University,
            OnboardingAnswer::CareerPath(_) => OnboardingStep::CareerPath,
            OnboardingAnswer::Personality(_) => OnboardingStep::Personality,
            OnboardingAnswer::WorkModel(_) => OnboardingStep::WorkModel,
            OnboardingAnswer::CareerGoal(_) => OnboardingStep::CareerGoal,
            OnboardingAnswer::Industry(_) => OnboardingStep::Industry,
            OnboardingAnswer::Company(_) => OnboardingStep::Company,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!("invalid email address '{email}'")));
    }
    Ok(email)
}

fn validate_text(step: OnboardingStep, value: String) -> Result<String, AppError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{step} must not be empty")));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "{step} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(value)
}

fn validate_list(step: OnboardingStep, values: Vec<String>) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(values.len());
    for value in values {
        let value = validate_text(step, value)?;
        if !seen.insert(value.to_lowercase()) {
            return Err(AppError::Validation(format!(
                "{step} contains duplicate entry '{value}'"
            )));
        }
        cleaned.push(value);
    }
    if cleaned.is_empty() || cleaned.len() > MAX_LIST_LEN {
        return Err(AppError::Validation(format!(
            "{step} needs between 1 and {MAX_LIST_LEN} entries"
        )));
    }
    Ok(cleaned)
}

/// First step in walkthrough order without an answer, or `done`.
pub fn next_step(completed: &[String]) -> String {
    OnboardingStep::ALL
        .into_iter()
        .find(|step| !completed.iter().any(|c| c == step.as_str()))
        .map(|step| step.as_str().to_string())
        .unwrap_or_else(|| ONBOARDING_DONE.to_string())
}

/// Validates `answer` and writes it into `user`. Leaves `user` untouched on error.
pub fn apply_answer(user: &mut User, answer: OnboardingAnswer) -> Result<(), AppError> {
    let step = answer.step();
    match answer {
        OnboardingAnswer::University(v) => user.university = Some(validate_text(step, v)?),
        OnboardingAnswer::CareerPath(v) => user.career_path = Some(validate_text(step, v)?),
        OnboardingAnswer::Personality(v) => user.personality_type = Some(validate_text(step, v)?),
        OnboardingAnswer::WorkModel(mode) => user.work_model = Some(mode.as_str().to_string()),
        OnboardingAnswer::CareerGoal(v) => user.career_goal = Some(validate_text(step, v)?),
        OnboardingAnswer::Industry(v) => user.industries = validate_list(step, v)?,
        OnboardingAnswer::Company(v) => user.companies = validate_list(step, v)?,
    }

    if !user.completed_steps.iter().any(|s| s == step.as_str()) {
        user.completed_steps.push(step.as_str().to_string());
    }
    user.onboarding_step = next_step(&user.completed_steps);
    user.updated_at = Utc::now();
    Ok(())
}
