//! Fakes for every trait seam, shared by unit and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::cv::extract::{ExtractError, TextExtractor};
use crate::cv::pipeline::{CvProcessor, ExtractionMode};
use crate::cv::prompts::Section;
use crate::llm_client::{CompletionModel, EmbeddingModel, LlmError};
use crate::state::AppState;
use crate::storage::archive::{cv_object_key, ArchiveError, DocumentArchive};
use crate::storage::locks::InProcessLocks;
use crate::storage::memory::MemoryStore;

/// Model responses for a small but complete CV, in `Section::ALL` order.
pub fn cv_responses() -> Vec<String> {
    vec![
        json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "phone": "+44 20 0000 0000",
            "summary": "Engineer"
        }),
        json!({"skills": ["Rust", "SQL"]}),
        json!({"work_experience": [{
            "company": "Analytical Engines Ltd",
            "position": "Engineer",
            "start_date": "2019",
            "end_date": "2024",
            "description": "Compilers",
            "achievements": ["Reduced build times by 30%", "Mentored 3 juniors"]
        }]}),
        json!({"education": [{
            "institution": "University of London",
            "degree": "BSc",
            "field": "Mathematics",
            "start_date": "2015",
            "end_date": "2018",
            "achievements": []
        }]}),
    ]
    .into_iter()
    .map(|v| v.to_string())
    .collect()
}

pub struct StaticExtractor(pub String);

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract(&self, _document: Bytes) -> Result<String, ExtractError> {
        Ok(self.0.clone())
    }
}

pub struct FailingExtractor;

#[async_trait]
impl TextExtractor for FailingExtractor {
    async fn extract(&self, _document: Bytes) -> Result<String, ExtractError> {
        Err(ExtractError::Unreadable("xref table is damaged".into()))
    }
}

/// Answers each prompt with the response scripted for its section, whatever
/// order the calls arrive in.
pub struct ScriptedCompletions {
    responses: Vec<String>,
    failure: Mutex<Option<(usize, LlmError)>>,
    calls: AtomicUsize,
}

impl ScriptedCompletions {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Like `new`, but the section at `section_index` fails once with `error`.
    pub fn failing_at(responses: Vec<String>, section_index: usize, error: LlmError) -> Self {
        let scripted = Self::new(responses);
        *scripted.failure.lock().unwrap() = Some((section_index, error));
        scripted
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn section_index(prompt: &str) -> usize {
        Section::ALL
            .iter()
            .position(|section| {
                let (template, _) = section.prompt();
                let preamble = template.split("{cv_text}").next().unwrap_or(template);
                prompt.starts_with(preamble)
            })
            .expect("prompt does not match any section template")
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletions {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = Self::section_index(prompt);

        let mut failure = self.failure.lock().unwrap();
        if matches!(&*failure, Some((i, _)) if *i == index) {
            if let Some((_, err)) = failure.take() {
                return Err(err);
            }
        }
        Ok(self.responses[index].clone())
    }
}

#[derive(Default)]
pub struct FakeEmbeddings {
    fail: bool,
    inputs: Mutex<Vec<String>>,
}

impl FakeEmbeddings {
    pub fn failing() -> Self {
        Self {
            fail: true,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingModel for FakeEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.inputs.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(LlmError::Api {
                status: 500,
                message: "embedding backend unavailable".into(),
            });
        }
        // Deterministic, non-zero, and different for different texts.
        let len = text.len() as f32;
        let vowels = text.chars().filter(|c| "aeiouAEIOU".contains(*c)).count() as f32;
        Ok(vec![1.0, len, vowels + 1.0])
    }
}

/// Records stored documents instead of uploading them.
#[derive(Default)]
pub struct MemoryArchive {
    stored: Mutex<Vec<(String, usize)>>,
    fail: bool,
}

impl MemoryArchive {
    pub fn failing() -> Self {
        Self {
            stored: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.stored.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }
}

#[async_trait]
impl DocumentArchive for MemoryArchive {
    async fn store_cv(&self, user_id: Uuid, document: Bytes) -> Result<String, ArchiveError> {
        if self.fail {
            return Err(ArchiveError::Upload("bucket does not exist".into()));
        }
        let key = cv_object_key(user_id, Uuid::new_v4());
        self.stored.lock().unwrap().push((key.clone(), document.len()));
        Ok(key)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/career_test".into(),
        redis_url: None,
        s3_bucket: "career-test".into(),
        s3_endpoint: "http://localhost:9000".into(),
        aws_access_key_id: "test".into(),
        aws_secret_access_key: "test".into(),
        openai_api_key: "sk-test".into(),
        openai_base_url: "http://localhost:1".into(),
        port: 0,
        rust_log: "debug".into(),
        max_upload_bytes: 64 * 1024,
        extraction_mode: ExtractionMode::Sequential,
        upload_lock_ttl_secs: 600,
    }
}

/// An `AppState` wired to in-memory fakes, plus handles to inspect them.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub archive: Arc<MemoryArchive>,
    pub completions: Arc<ScriptedCompletions>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(
            Arc::new(StaticExtractor("Ada Lovelace\nSkills: Rust, SQL".into())),
            ScriptedCompletions::new(cv_responses()),
            MemoryArchive::default(),
        )
    }

    pub fn with(
        extractor: Arc<dyn TextExtractor>,
        completions: ScriptedCompletions,
        archive: MemoryArchive,
    ) -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::default());
        let archive = Arc::new(archive);
        let completions = Arc::new(completions);
        let processor = CvProcessor::new(
            extractor,
            completions.clone(),
            Arc::new(FakeEmbeddings::default()),
            store.clone(),
            config.extraction_mode,
        );
        let state = AppState {
            store: store.clone(),
            archive: archive.clone(),
            locks: Arc::new(InProcessLocks::new(Duration::from_secs(
                config.upload_lock_ttl_secs,
            ))),
            processor: Arc::new(processor),
            config,
        };
        Self {
            state,
            store,
            archive,
            completions,
        }
    }
}

pub const MULTIPART_BOUNDARY: &str = "career-api-test-boundary";

/// A `multipart/form-data` body with a single file field.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}")
}
