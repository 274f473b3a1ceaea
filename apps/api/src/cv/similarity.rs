//! Similar-profile search over the skills and achievements embeddings.
//!
//! Brute force: every other processed CV is scored against the requester's
//! vectors. Score = mean cosine similarity over the vectors both sides carry.

use serde::Serialize;
use uuid::Uuid;

use crate::cv::models::CvData;
use crate::errors::AppError;
use crate::storage::ProfileStore;

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 50;

/// The slice of a processed CV needed to rank it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileVectors {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub skills: Vec<String>,
    pub skills_vector: Vec<f32>,
    pub achievements_vector: Vec<f32>,
}

impl ProfileVectors {
    pub fn from_cv(user_id: Uuid, cv: &CvData) -> Self {
        Self {
            user_id,
            name: cv.personal_info.name.clone(),
            skills: cv.skills.clone(),
            skills_vector: cv.skills_vector.clone(),
            achievements_vector: cv.achievements_vector.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarProfile {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub skills: Vec<String>,
    pub score: f64,
    pub skills_similarity: Option<f64>,
    pub achievements_similarity: Option<f64>,
}

/// Cosine similarity; `None` when lengths differ or either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(dot / denom)
}

/// Scores `candidates` against `target` and keeps the best `limit`.
/// The target's own record is never returned, whatever the caller passed in.
pub fn rank_similar(
    target: &ProfileVectors,
    candidates: Vec<ProfileVectors>,
    limit: usize,
) -> Vec<SimilarProfile> {
    let mut ranked: Vec<SimilarProfile> = candidates
        .into_iter()
        .filter(|c| c.user_id != target.user_id)
        .filter_map(|c| {
            let skills_similarity = cosine_similarity(&target.skills_vector, &c.skills_vector);
            let achievements_similarity =
                cosine_similarity(&target.achievements_vector, &c.achievements_vector);
            let parts: Vec<f64> = [skills_similarity, achievements_similarity]
                .into_iter()
                .flatten()
                .collect();
            if parts.is_empty() {
                return None;
            }
            Some(SimilarProfile {
                user_id: c.user_id,
                name: c.name,
                skills: c.skills,
                score: parts.iter().sum::<f64>() / parts.len() as f64,
                skills_similarity,
                achievements_similarity,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

/// Up to `limit` profiles closest to `user_id`'s processed CV.
pub async fn find_similar_profiles(
    store: &dyn ProfileStore,
    user_id: Uuid,
    limit: usize,
) -> Result<Vec<SimilarProfile>, AppError> {
    let cv = store
        .cv(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No processed CV for user {user_id}")))?;
    let target = ProfileVectors::from_cv(user_id, &cv);

    let candidates = store.cv_candidates(user_id).await?;
    let limit = limit.clamp(1, MAX_LIMIT);
    Ok(rank_similar(&target, candidates, limit))
}
