//! CV processing pipeline. Turns an uploaded PDF into structured profile data.
//!
//! Flow: extract text → personal info → skills → work experience → education
//!       → embeddings → persist.
//!
//! Every stage writes the status record before and after it runs. The first
//! failing stage is recorded in the status record and aborts the run; stages
//! that already completed stay persisted. Nothing is retried here: retryable
//! transport failures are handled (or not) inside the LLM client.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cv::extract::{ExtractError, TextExtractor};
use crate::cv::models::{
    CvData, EducationEnvelope, ExtractedSections, PersonalInfo, SkillsEnvelope,
    WorkExperienceEnvelope,
};
use crate::cv::prompts::{render, Section};
use crate::cv::status::{ErrorDetail, PipelineStage, ProcessingStatus, StatusRecord};
use crate::llm_client::{CompletionModel, EmbeddingModel, LlmError};
use crate::storage::{ProfileStore, StoreError};

/// How the four LLM section stages are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionMode {
    /// One stage after another, each with its own status updates.
    #[default]
    Sequential,
    /// All four in flight at once, joined before the embedding stage.
    Concurrent,
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Sequential => f.write_str("sequential"),
            ExtractionMode::Concurrent => f.write_str("concurrent"),
        }
    }
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExtractionMode::Sequential),
            "concurrent" => Ok(ExtractionMode::Concurrent),
            other => Err(format!("unknown extraction mode '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum FailureKind {
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("model returned malformed JSON: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// A pipeline failure, attributed to the stage that raised it.
#[derive(Debug, Error)]
#[error("CV processing failed at stage '{stage}': {kind}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub kind: FailureKind,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, kind: impl Into<FailureKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    /// Whether running the upload again could succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            FailureKind::Model(e) => e.is_retryable(),
            FailureKind::Store(_) => true,
            FailureKind::Extraction(_) | FailureKind::MalformedOutput(_) => false,
        }
    }
}

/// Owns the status record of one run and writes it through on every change.
pub struct StatusTracker {
    store: Arc<dyn ProfileStore>,
    record: StatusRecord,
}

impl StatusTracker {
    pub fn record(&self) -> &StatusRecord {
        &self.record
    }

    pub fn user_id(&self) -> Uuid {
        self.record.user_id
    }

    async fn advance(
        &mut self,
        stage: PipelineStage,
        status: ProcessingStatus,
        data: Option<serde_json::Value>,
    ) -> Result<(), PipelineError> {
        self.record.advance(status, data);
        self.store
            .write_status(&self.record)
            .await
            .map_err(|e| PipelineError::new(stage, e))?;
        debug!(
            "CV status for user {} -> {} ({}%)",
            self.record.user_id, self.record.status, self.record.progress
        );
        Ok(())
    }

    /// Best effort: the pipeline error is what the caller sees, even if this write fails.
    async fn record_failure(&mut self, err: &PipelineError) {
        self.record
            .fail(err.stage, ErrorDetail::from_error(err, err.is_retryable()));
        if let Err(write_err) = self.store.write_status(&self.record).await {
            error!(
                "Failed to record CV processing error for user {}: {write_err}",
                self.record.user_id
            );
        }
    }
}

pub struct CvProcessor {
    extractor: Arc<dyn TextExtractor>,
    completions: Arc<dyn CompletionModel>,
    embeddings: Arc<dyn EmbeddingModel>,
    store: Arc<dyn ProfileStore>,
    mode: ExtractionMode,
}

impl CvProcessor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        completions: Arc<dyn CompletionModel>,
        embeddings: Arc<dyn EmbeddingModel>,
        store: Arc<dyn ProfileStore>,
        mode: ExtractionMode,
    ) -> Self {
        Self {
            extractor,
            completions,
            embeddings,
            store,
            mode,
        }
    }

    /// Resets the user's status record to `started` and returns its tracker.
    /// Split from `run` so an HTTP handler can answer before the work starts.
    pub async fn begin(&self, user_id: Uuid) -> Result<StatusTracker, StoreError> {
        let record = StatusRecord::started(user_id);
        self.store.write_status(&record).await?;
        info!("Starting CV processing for user {user_id} ({} mode)", self.mode);
        Ok(StatusTracker {
            store: self.store.clone(),
            record,
        })
    }

    /// `begin` + `run`.
    pub async fn process(
        &self,
        user_id: Uuid,
        document: Bytes,
        document_key: Option<String>,
    ) -> Result<CvData, PipelineError> {
        let tracker = self
            .begin(user_id)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::ExtractText, e))?;
        self.run(tracker, document, document_key).await
    }

    /// Runs every stage against a tracker obtained from `begin`.
    pub async fn run(
        &self,
        mut tracker: StatusTracker,
        document: Bytes,
        document_key: Option<String>,
    ) -> Result<CvData, PipelineError> {
        let user_id = tracker.user_id();
        match self.run_stages(&mut tracker, document, document_key).await {
            Ok(cv) => {
                info!("CV processing completed for user {user_id}");
                Ok(cv)
            }
            Err(err) => {
                error!("CV processing for user {user_id} failed: {err}");
                tracker.record_failure(&err).await;
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        tracker: &mut StatusTracker,
        document: Bytes,
        document_key: Option<String>,
    ) -> Result<CvData, PipelineError> {
        let user_id = tracker.user_id();

        // Stage 1: raw text
        tracker
            .advance(PipelineStage::ExtractText, ProcessingStatus::ExtractingText, None)
            .await?;
        let text = self
            .extractor
            .extract(document)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::ExtractText, e))?;
        tracker
            .advance(PipelineStage::ExtractText, ProcessingStatus::TextExtracted, None)
            .await?;
        info!("Extracted {} characters from CV of user {user_id}", text.len());

        // Stages 2-5: structured sections
        let sections = match self.mode {
            ExtractionMode::Sequential => self.extract_sequential(tracker, &text).await?,
            ExtractionMode::Concurrent => self.extract_concurrent(tracker, &text).await?,
        };

        // Stage 6: embeddings
        tracker
            .advance(
                PipelineStage::Embeddings,
                ProcessingStatus::GeneratingEmbeddings,
                None,
            )
            .await?;
        let skills_vector = self
            .embed_or_empty(&sections.skills_text())
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Embeddings, e))?;
        let achievements_vector = self
            .embed_or_empty(&sections.achievements_text())
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Embeddings, e))?;

        // Stage 7: persist
        tracker
            .advance(PipelineStage::Persist, ProcessingStatus::SavingProfile, None)
            .await?;
        let cv = CvData::from_sections(
            text,
            sections,
            skills_vector,
            achievements_vector,
            document_key,
        );
        self.store
            .save_cv(user_id, &cv)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Persist, e))?;
        tracker
            .advance(PipelineStage::Persist, ProcessingStatus::Completed, None)
            .await?;

        Ok(cv)
    }

    async fn extract_sequential(
        &self,
        tracker: &mut StatusTracker,
        text: &str,
    ) -> Result<ExtractedSections, PipelineError> {
        tracker
            .advance(
                PipelineStage::PersonalInfo,
                ProcessingStatus::ProcessingPersonalInfo,
                None,
            )
            .await?;
        let personal_info: PersonalInfo =
            self.extract_section(Section::PersonalInfo, text).await?;
        tracker
            .advance(
                PipelineStage::PersonalInfo,
                ProcessingStatus::PersonalInfoExtracted,
                Some(json!({ "personal_info": personal_info })),
            )
            .await?;

        tracker
            .advance(PipelineStage::Skills, ProcessingStatus::ProcessingSkills, None)
            .await?;
        let skills: SkillsEnvelope = self.extract_section(Section::Skills, text).await?;
        tracker
            .advance(
                PipelineStage::Skills,
                ProcessingStatus::SkillsExtracted,
                Some(json!({ "skills": skills.skills })),
            )
            .await?;

        tracker
            .advance(
                PipelineStage::WorkExperience,
                ProcessingStatus::ProcessingExperience,
                None,
            )
            .await?;
        let work: WorkExperienceEnvelope = self
            .extract_section(Section::WorkExperience, text)
            .await?;
        tracker
            .advance(
                PipelineStage::WorkExperience,
                ProcessingStatus::ExperienceExtracted,
                Some(json!({ "work_experience": work.work_experience })),
            )
            .await?;

        tracker
            .advance(
                PipelineStage::Education,
                ProcessingStatus::ProcessingEducation,
                None,
            )
            .await?;
        let education: EducationEnvelope =
            self.extract_section(Section::Education, text).await?;
        tracker
            .advance(
                PipelineStage::Education,
                ProcessingStatus::EducationExtracted,
                Some(json!({ "education": education.education })),
            )
            .await?;

        Ok(ExtractedSections {
            personal_info,
            skills: skills.skills,
            work_experience: work.work_experience,
            education: education.education,
        })
    }

    async fn extract_concurrent(
        &self,
        tracker: &mut StatusTracker,
        text: &str,
    ) -> Result<ExtractedSections, PipelineError> {
        tracker
            .advance(
                PipelineStage::PersonalInfo,
                ProcessingStatus::ProcessingSections,
                None,
            )
            .await?;

        // First failure drops the other in-flight calls.
        let (personal_info, skills, work, education) = tokio::try_join!(
            self.extract_section::<PersonalInfo>(Section::PersonalInfo, text),
            self.extract_section::<SkillsEnvelope>(Section::Skills, text),
            self.extract_section::<WorkExperienceEnvelope>(Section::WorkExperience, text),
            self.extract_section::<EducationEnvelope>(Section::Education, text),
        )?;

        let sections = ExtractedSections {
            personal_info,
            skills: skills.skills,
            work_experience: work.work_experience,
            education: education.education,
        };
        tracker
            .advance(
                PipelineStage::Education,
                ProcessingStatus::SectionsExtracted,
                Some(json!(sections)),
            )
            .await?;
        Ok(sections)
    }

    /// One completion call, parsed strictly. No repair: anything that is not the
    /// expected JSON object fails the stage.
    async fn extract_section<T: DeserializeOwned>(
        &self,
        section: Section,
        text: &str,
    ) -> Result<T, PipelineError> {
        let stage = section.stage();
        let (template, max_tokens) = section.prompt();
        let prompt = render(template, text);

        info!("Requesting {stage} extraction");
        let raw = self
            .completions
            .complete(&prompt, max_tokens)
            .await
            .map_err(|e| PipelineError::new(stage, e))?;
        debug!("{stage} completion: {raw}");

        parse_section(raw.trim()).map_err(|e| PipelineError::new(stage, e))
    }

    async fn embed_or_empty(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.embeddings.embed(text).await
    }
}

/// Every section reply is a single JSON object; arrays and scalars are malformed
/// even when the target type could be built from them.
fn parse_section<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(serde::de::Error::custom("expected a JSON object"));
    }
    serde_json::from_value(value)
}
