//! Persistence of onboarding progress.
//!
//! Two backends:
//!
//! - [`MemoryOnboardingStore`]: process-local, lost on exit.
//! - [`JsonFileOnboardingStore`]: one JSON document on disk,
//!   `{ "state": { ... }, "completed": bool }`. A missing file reads as
//!   defaults.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use cv_core::CvError;
use cv_core::error::CvResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::state::OnboardingState;

/// Persistence collaborator for the onboarding controller.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    /// Saved progress, or defaults if nothing was saved.
    async fn load(&self) -> CvResult<OnboardingState>;
    async fn save(&self, state: &OnboardingState) -> CvResult<()>;
    async fn set_completed(&self, completed: bool) -> CvResult<()>;
    async fn is_completed(&self) -> CvResult<bool>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    state: Option<OnboardingState>,
    #[serde(default)]
    completed: bool,
}

impl Document {
    fn loaded_state(&self) -> OnboardingState {
        self.state.as_ref().map(OnboardingState::persisted).unwrap_or_else(|| OnboardingState {
            is_loading: false,
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryOnboardingStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryOnboardingStore {
    doc: Mutex<Document>,
}

impl MemoryOnboardingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OnboardingStore for MemoryOnboardingStore {
    async fn load(&self) -> CvResult<OnboardingState> {
        Ok(self.doc.lock().unwrap_or_else(PoisonError::into_inner).loaded_state())
    }

    async fn save(&self, state: &OnboardingState) -> CvResult<()> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner).state = Some(state.persisted());
        Ok(())
    }

    async fn set_completed(&self, completed: bool) -> CvResult<()> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner).completed = completed;
        Ok(())
    }

    async fn is_completed(&self) -> CvResult<bool> {
        Ok(self.doc.lock().unwrap_or_else(PoisonError::into_inner).completed)
    }
}

// ---------------------------------------------------------------------------
// JsonFileOnboardingStore
// ---------------------------------------------------------------------------

/// File-backed store. Writes are serialized and replace the file atomically
/// via a temporary sibling.
pub struct JsonFileOnboardingStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileOnboardingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    async fn read(&self) -> CvResult<Document> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CvError::Persistence(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &Document) -> CvResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("[onboarding] saved {}", self.path.display());
        Ok(())
    }

    async fn update(&self, apply: impl FnOnce(&mut Document) + Send) -> CvResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = match self.read().await {
            Ok(doc) => doc,
            // An unreadable document is replaced rather than blocking every later write.
            Err(CvError::Persistence(e)) => {
                warn!("[onboarding] discarding unreadable state file: {e}");
                Document::default()
            }
            Err(e) => return Err(e),
        };
        apply(&mut doc);
        self.write(&doc).await
    }
}

#[async_trait]
impl OnboardingStore for JsonFileOnboardingStore {
    async fn load(&self) -> CvResult<OnboardingState> {
        Ok(self.read().await?.loaded_state())
    }

    async fn save(&self, state: &OnboardingState) -> CvResult<()> {
        let persisted = state.persisted();
        self.update(move |doc| doc.state = Some(persisted)).await
    }

    async fn set_completed(&self, completed: bool) -> CvResult<()> {
        self.update(move |doc| doc.completed = completed).await
    }

    async fn is_completed(&self) -> CvResult<bool> {
        Ok(self.read().await?.completed)
    }
}
