//! In-memory `ProfileStore` for tests. Also keeps every status write so tests
//! can assert on the sequence a run went through.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cv::models::CvData;
use crate::cv::similarity::ProfileVectors;
use crate::cv::status::StatusRecord;
use crate::models::user::User;
use crate::storage::{ProfileStore, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    statuses: HashMap<Uuid, StatusRecord>,
    status_writes: Vec<StatusRecord>,
    cvs: HashMap<Uuid, CvData>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn status_history(&self, user_id: Uuid) -> Vec<StatusRecord> {
        let inner = self.inner.lock().unwrap();
        inner
            .status_writes
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn cv_count(&self) -> usize {
        self.inner.lock().unwrap().cvs.len()
    }

    pub fn status_count(&self) -> usize {
        self.inner.lock().unwrap().statuses.len()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!(
                "user with email {}",
                user.email
            )));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.users.get_mut(&user.id) {
            let cv_url = existing.cv_url.take();
            *existing = User {
                cv_url,
                ..user.clone()
            };
        }
        Ok(())
    }

    async fn write_status(&self, record: &StatusRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.statuses.insert(record.user_id, record.clone());
        inner.status_writes.push(record.clone());
        Ok(())
    }

    async fn status(&self, user_id: Uuid) -> Result<Option<StatusRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().statuses.get(&user_id).cloned())
    }

    async fn save_cv(&self, user_id: Uuid, cv: &CvData) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.cvs.insert(user_id, cv.clone());
        if let (Some(user), Some(key)) = (inner.users.get_mut(&user_id), &cv.document_key) {
            user.cv_url = Some(key.clone());
        }
        Ok(())
    }

    async fn cv(&self, user_id: Uuid) -> Result<Option<CvData>, StoreError> {
        Ok(self.inner.lock().unwrap().cvs.get(&user_id).cloned())
    }

    async fn cv_candidates(&self, exclude: Uuid) -> Result<Vec<ProfileVectors>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .cvs
            .iter()
            .filter(|(id, _)| **id != exclude)
            .map(|(id, cv)| ProfileVectors::from_cv(*id, cv))
            .collect())
    }
}
