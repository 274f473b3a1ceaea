//! Processing status: the per-user record a client polls while a CV is processed.
//!
//! `ProcessingStatus` is the persisted stage name; each status maps to a fixed
//! progress value. `PipelineStage` names the unit of work a failure is attributed to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ExtractText,
    PersonalInfo,
    Skills,
    WorkExperience,
    Education,
    Embeddings,
    Persist,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::ExtractText,
        PipelineStage::PersonalInfo,
        PipelineStage::Skills,
        PipelineStage::WorkExperience,
        PipelineStage::Education,
        PipelineStage::Embeddings,
        PipelineStage::Persist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ExtractText => "extract_text",
            PipelineStage::PersonalInfo => "personal_info",
            PipelineStage::Skills => "skills",
            PipelineStage::WorkExperience => "work_experience",
            PipelineStage::Education => "education",
            PipelineStage::Embeddings => "embeddings",
            PipelineStage::Persist => "persist",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown pipeline stage '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Started,
    ExtractingText,
    TextExtracted,
    ProcessingPersonalInfo,
    PersonalInfoExtracted,
    ProcessingSkills,
    SkillsExtracted,
    ProcessingExperience,
    ExperienceExtracted,
    ProcessingEducation,
    EducationExtracted,
    /// Concurrent extraction: all four sections in flight.
    ProcessingSections,
    SectionsExtracted,
    GeneratingEmbeddings,
    SavingProfile,
    Completed,
    Error,
}

impl ProcessingStatus {
    const ALL: [ProcessingStatus; 17] = [
        ProcessingStatus::Started,
        ProcessingStatus::ExtractingText,
        ProcessingStatus::TextExtracted,
        ProcessingStatus::ProcessingPersonalInfo,
        ProcessingStatus::PersonalInfoExtracted,
        ProcessingStatus::ProcessingSkills,
        ProcessingStatus::SkillsExtracted,
        ProcessingStatus::ProcessingExperience,
        ProcessingStatus::ExperienceExtracted,
        ProcessingStatus::ProcessingEducation,
        ProcessingStatus::EducationExtracted,
        ProcessingStatus::ProcessingSections,
        ProcessingStatus::SectionsExtracted,
        ProcessingStatus::GeneratingEmbeddings,
        ProcessingStatus::SavingProfile,
        ProcessingStatus::Completed,
        ProcessingStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Started => "started",
            ProcessingStatus::ExtractingText => "extracting_text",
            ProcessingStatus::TextExtracted => "text_extracted",
            ProcessingStatus::ProcessingPersonalInfo => "processing_personal_info",
            ProcessingStatus::PersonalInfoExtracted => "personal_info_extracted",
            ProcessingStatus::ProcessingSkills => "processing_skills",
            ProcessingStatus::SkillsExtracted => "skills_extracted",
            ProcessingStatus::ProcessingExperience => "processing_experience",
            ProcessingStatus::ExperienceExtracted => "experience_extracted",
            ProcessingStatus::ProcessingEducation => "processing_education",
            ProcessingStatus::EducationExtracted => "education_extracted",
            ProcessingStatus::ProcessingSections => "processing_sections",
            ProcessingStatus::SectionsExtracted => "sections_extracted",
            ProcessingStatus::GeneratingEmbeddings => "generating_embeddings",
            ProcessingStatus::SavingProfile => "saving_profile",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Error => "error",
        }
    }

    /// Progress reported alongside the status. `Error` keeps whatever progress
    /// the run had reached, so it has no fixed value of its own.
    pub fn progress(&self) -> Option<u8> {
        let p = match self {
            ProcessingStatus::Started => 0,
            ProcessingStatus::ExtractingText => 10,
            ProcessingStatus::TextExtracted => 20,
            ProcessingStatus::ProcessingPersonalInfo | ProcessingStatus::ProcessingSections => 30,
            ProcessingStatus::PersonalInfoExtracted => 40,
            ProcessingStatus::ProcessingSkills => 50,
            ProcessingStatus::SkillsExtracted => 60,
            ProcessingStatus::ProcessingExperience => 70,
            ProcessingStatus::ExperienceExtracted => 80,
            ProcessingStatus::ProcessingEducation => 90,
            ProcessingStatus::EducationExtracted | ProcessingStatus::SectionsExtracted => 95,
            ProcessingStatus::GeneratingEmbeddings => 96,
            ProcessingStatus::SavingProfile => 98,
            ProcessingStatus::Completed => 100,
            ProcessingStatus::Error => return None,
        };
        Some(p)
    }

    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Error)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown processing status '{s}'"))
    }
}

/// What went wrong, as stored in the status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    /// `source()` chain below the top-level error, outermost first.
    pub causes: Vec<String>,
    pub retryable: bool,
}

impl ErrorDetail {
    pub fn from_error(err: &(dyn std::error::Error + 'static), retryable: bool) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            causes,
            retryable,
        }
    }
}

/// The per-user status record. Last write wins; no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub user_id: Uuid,
    pub status: ProcessingStatus,
    pub progress: u8,
    pub failed_stage: Option<PipelineStage>,
    pub latest_data: Option<Value>,
    pub error: Option<ErrorDetail>,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    /// A fresh record for a new run. Discards anything left by a previous upload.
    pub fn started(user_id: Uuid) -> Self {
        Self {
            user_id,
            status: ProcessingStatus::Started,
            progress: 0,
            failed_stage: None,
            latest_data: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Moves to `status`. `latest_data` is only replaced when new data is given.
    pub fn advance(&mut self, status: ProcessingStatus, data: Option<Value>) {
        self.status = status;
        if let Some(progress) = status.progress() {
            self.progress = progress;
        }
        if data.is_some() {
            self.latest_data = data;
        }
        self.updated_at = Utc::now();
    }

    /// Marks the run failed at `stage`, keeping the progress reached so far.
    pub fn fail(&mut self, stage: PipelineStage, detail: ErrorDetail) {
        self.status = ProcessingStatus::Error;
        self.failed_stage = Some(stage);
        self.error = Some(detail);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_strings_round_trip() {
        for status in ProcessingStatus::ALL {
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                json!(status.as_str())
            );
        }
        assert!("finished".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn test_stage_strings_round_trip() {
        for stage in PipelineStage::ALL {
            assert_eq!(stage.as_str().parse::<PipelineStage>().unwrap(), stage);
        }
        assert!("ocr".parse::<PipelineStage>().is_err());
    }

    #[test]
    fn test_sequential_progress_is_monotonic() {
        let order = [
            ProcessingStatus::Started,
            ProcessingStatus::ExtractingText,
            ProcessingStatus::TextExtracted,
            ProcessingStatus::ProcessingPersonalInfo,
            ProcessingStatus::PersonalInfoExtracted,
            ProcessingStatus::ProcessingSkills,
            ProcessingStatus::SkillsExtracted,
            ProcessingStatus::ProcessingExperience,
            ProcessingStatus::ExperienceExtracted,
            ProcessingStatus::ProcessingEducation,
            ProcessingStatus::EducationExtracted,
            ProcessingStatus::GeneratingEmbeddings,
            ProcessingStatus::SavingProfile,
            ProcessingStatus::Completed,
        ];
        let progress: Vec<u8> = order.iter().map(|s| s.progress().unwrap()).collect();
        assert!(progress.windows(2).all(|w| w[0] < w[1]), "{progress:?}");
        assert_eq!(progress.last(), Some(&100));
    }

    #[test]
    fn test_advance_keeps_latest_data_without_new_payload() {
        let mut record = StatusRecord::started(Uuid::new_v4());
        record.advance(
            ProcessingStatus::SkillsExtracted,
            Some(json!({"skills": ["Rust"]})),
        );
        record.advance(ProcessingStatus::ProcessingExperience, None);
        assert_eq!(record.progress, 70);
        assert_eq!(record.latest_data, Some(json!({"skills": ["Rust"]})));
    }

    #[test]
    fn test_fail_keeps_progress_and_records_stage() {
        let mut record = StatusRecord::started(Uuid::new_v4());
        record.advance(ProcessingStatus::ProcessingSkills, None);
        record.fail(
            PipelineStage::Skills,
            ErrorDetail {
                message: "boom".into(),
                causes: vec![],
                retryable: false,
            },
        );
        assert_eq!(record.status, ProcessingStatus::Error);
        assert_eq!(record.progress, 50);
        assert_eq!(record.failed_stage, Some(PipelineStage::Skills));
        assert!(record.status.is_terminal());
    }

    #[derive(Debug, thiserror::Error)]
    #[error("write failed")]
    struct WriteFailed(#[source] std::io::Error);

    #[test]
    fn test_error_detail_walks_source_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let detail = ErrorDetail::from_error(&WriteFailed(inner), true);
        assert_eq!(detail.message, "write failed");
        assert_eq!(detail.causes, vec!["disk on fire".to_string()]);
        assert!(detail.retryable);
    }
}
