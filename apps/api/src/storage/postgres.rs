//! Postgres-backed `ProfileStore`. Table layout lives in `sql/schema.sql`.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::cv::models::CvData;
use crate::cv::similarity::ProfileVectors;
use crate::cv::status::StatusRecord;
use crate::models::cv::{CandidateRow, CvProfileRow, StatusRow};
use crate::models::user::User;
use crate::storage::{ProfileStore, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users
                (id, email, full_name, university, career_path, personality_type, work_model,
                 career_goal, industries, companies, completed_steps, onboarding_step, cv_url,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.university)
        .bind(&user.career_path)
        .bind(&user.personality_type)
        .bind(&user.work_model)
        .bind(&user.career_goal)
        .bind(&user.industries)
        .bind(&user.companies)
        .bind(&user.completed_steps)
        .bind(&user.onboarding_step)
        .bind(&user.cv_url)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                StoreError::Duplicate(format!("user with email {}", user.email)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users SET
                full_name = $2, university = $3, career_path = $4, personality_type = $5,
                work_model = $6, career_goal = $7, industries = $8, companies = $9,
                completed_steps = $10, onboarding_step = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.university)
        .bind(&user.career_path)
        .bind(&user.personality_type)
        .bind(&user.work_model)
        .bind(&user.career_goal)
        .bind(&user.industries)
        .bind(&user.companies)
        .bind(&user.completed_steps)
        .bind(&user.onboarding_step)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_status(&self, record: &StatusRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cv_processing_status
                (user_id, status, progress, failed_stage, latest_data, error, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                status = EXCLUDED.status,
                progress = EXCLUDED.progress,
                failed_stage = EXCLUDED.failed_stage,
                latest_data = EXCLUDED.latest_data,
                error = EXCLUDED.error,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.user_id)
        .bind(record.status.as_str())
        .bind(i16::from(record.progress))
        .bind(record.failed_stage.map(|s| s.as_str()))
        .bind(record.latest_data.as_ref().map(Json))
        .bind(record.error.as_ref().map(Json))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn status(&self, user_id: Uuid) -> Result<Option<StatusRecord>, StoreError> {
        let row = sqlx::query_as::<_, StatusRow>(
            "SELECT * FROM cv_processing_status WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(StatusRecord::try_from).transpose()
    }

    async fn save_cv(&self, user_id: Uuid, cv: &CvData) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO cv_profiles
                (user_id, raw_text, personal_info, skills, work_experience, education,
                 skills_vector, achievements_vector, document_key, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                raw_text = EXCLUDED.raw_text,
                personal_info = EXCLUDED.personal_info,
                skills = EXCLUDED.skills,
                work_experience = EXCLUDED.work_experience,
                education = EXCLUDED.education,
                skills_vector = EXCLUDED.skills_vector,
                achievements_vector = EXCLUDED.achievements_vector,
                document_key = EXCLUDED.document_key,
                processed_at = EXCLUDED.processed_at
            "#,
        )
        .bind(user_id)
        .bind(&cv.raw_text)
        .bind(Json(&cv.personal_info))
        .bind(&cv.skills)
        .bind(Json(&cv.work_experience))
        .bind(Json(&cv.education))
        .bind(&cv.skills_vector)
        .bind(&cv.achievements_vector)
        .bind(&cv.document_key)
        .bind(cv.processed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users SET cv_url = COALESCE($2, cv_url), updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(&cv.document_key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Saved CV profile for user {user_id}");
        Ok(())
    }

    async fn cv(&self, user_id: Uuid) -> Result<Option<CvData>, StoreError> {
        let row = sqlx::query_as::<_, CvProfileRow>("SELECT * FROM cv_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CvData::from))
    }

    async fn cv_candidates(&self, exclude: Uuid) -> Result<Vec<ProfileVectors>, StoreError> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT user_id, personal_info->>'name' AS name, skills,
                   skills_vector, achievements_vector
            FROM cv_profiles
            WHERE user_id <> $1
            "#,
        )
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProfileVectors::from).collect())
    }
}
