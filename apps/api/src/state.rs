use std::sync::Arc;

use crate::config::Config;
use crate::cv::pipeline::CvProcessor;
use crate::storage::archive::DocumentArchive;
use crate::storage::locks::UploadLocks;
use crate::storage::ProfileStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub archive: Arc<dyn DocumentArchive>,
    /// Redis-backed when `REDIS_URL` is set, otherwise in-process.
    pub locks: Arc<dyn UploadLocks>,
    pub processor: Arc<CvProcessor>,
    pub config: Config,
}
