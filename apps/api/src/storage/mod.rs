//! Persistence seams: profile/CV/status records, uploaded documents, upload locks.
//!
//! Each seam is a trait held as `Arc<dyn …>` in `AppState`, so handlers and the
//! CV pipeline never name a concrete backend.

pub mod archive;
pub mod locks;
#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::cv::models::CvData;
use crate::cv::similarity::ProfileVectors;
use crate::cv::status::StatusRecord;
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Users, CV processing status and processed CV data.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Inserts a new user. Fails with `Duplicate` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    async fn user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Overwrites the profile and onboarding fields of an existing user.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Upserts the user's single status record (last write wins).
    async fn write_status(&self, record: &StatusRecord) -> Result<(), StoreError>;

    async fn status(&self, user_id: Uuid) -> Result<Option<StatusRecord>, StoreError>;

    /// Replaces the user's CV data and points `cv_url` at its source document.
    async fn save_cv(&self, user_id: Uuid, cv: &CvData) -> Result<(), StoreError>;

    async fn cv(&self, user_id: Uuid) -> Result<Option<CvData>, StoreError>;

    /// Embedding vectors of every processed CV except `exclude`'s.
    async fn cv_candidates(&self, exclude: Uuid) -> Result<Vec<ProfileVectors>, StoreError>;
}
