//! Row types for the CV tables and their conversions into domain types.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::cv::models::{CvData, Education, PersonalInfo, WorkExperience};
use crate::cv::similarity::ProfileVectors;
use crate::cv::status::{ErrorDetail, StatusRecord};
use crate::storage::StoreError;

#[derive(Debug, FromRow)]
pub struct CvProfileRow {
    pub user_id: Uuid,
    pub raw_text: String,
    pub personal_info: Json<PersonalInfo>,
    pub skills: Vec<String>,
    pub work_experience: Json<Vec<WorkExperience>>,
    pub education: Json<Vec<Education>>,
    pub skills_vector: Vec<f32>,
    pub achievements_vector: Vec<f32>,
    pub document_key: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl From<CvProfileRow> for CvData {
    fn from(row: CvProfileRow) -> Self {
        CvData {
            raw_text: row.raw_text,
            personal_info: row.personal_info.0,
            skills: row.skills,
            work_experience: row.work_experience.0,
            education: row.education.0,
            skills_vector: row.skills_vector,
            achievements_vector: row.achievements_vector,
            document_key: row.document_key,
            processed_at: row.processed_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StatusRow {
    pub user_id: Uuid,
    pub status: String,
    pub progress: i16,
    pub failed_stage: Option<String>,
    pub latest_data: Option<Json<Value>>,
    pub error: Option<Json<ErrorDetail>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<StatusRow> for StatusRecord {
    type Error = StoreError;

    fn try_from(row: StatusRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(StoreError::Corrupt)?;
        let failed_stage = row
            .failed_stage
            .map(|s| s.parse())
            .transpose()
            .map_err(StoreError::Corrupt)?;
        let progress = u8::try_from(row.progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| StoreError::Corrupt(format!("progress {} out of range", row.progress)))?;

        Ok(StatusRecord {
            user_id: row.user_id,
            status,
            progress,
            failed_stage,
            latest_data: row.latest_data.map(|j| j.0),
            error: row.error.map(|j| j.0),
            updated_at: row.updated_at,
        })
    }
}

/// Projection used by similarity search.
#[derive(Debug, FromRow)]
pub struct CandidateRow {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub skills: Vec<String>,
    pub skills_vector: Vec<f32>,
    pub achievements_vector: Vec<f32>,
}

impl From<CandidateRow> for ProfileVectors {
    fn from(row: CandidateRow) -> Self {
        ProfileVectors {
            user_id: row.user_id,
            name: row.name,
            skills: row.skills,
            skills_vector: row.skills_vector,
            achievements_vector: row.achievements_vector,
        }
    }
}
