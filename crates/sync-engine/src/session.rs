//! Session lifecycle: login construction, hydration, the background
//! periodic loop, and logout teardown.

use log::{debug, info, warn};
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use quillpad_core::sync::{
    backoff_seconds, SyncCycleTrigger, SyncSummary, SYNC_FOREGROUND_INTERVAL_SECS,
    SYNC_INTERVAL_JITTER_SECS, SYNC_PENDING_INTERVAL_SECS,
};
use quillpad_core::Result;
use quillpad_remote::RemoteStore;
use quillpad_storage_sqlite::{
    LinkRepository, LocalStore, NoteRepository, SyncQueueRepository, TagRepository,
};

use crate::engine::{SyncEngine, SyncEngineOptions};

/// One authenticated session: the per-user store, its repositories, the
/// sync engine, and the background loop. Constructed at login, consumed by
/// `logout`.
pub struct Session {
    user_id: String,
    engine: SyncEngine,
    notes: Arc<NoteRepository>,
    tags: Arc<TagRepository>,
    links: Arc<LinkRepository>,
    queue: Arc<SyncQueueRepository>,
    store: Option<LocalStore>,
    background: Option<JoinHandle<()>>,
}

impl Session {
    pub fn login(data_dir: &Path, user_id: &str, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        Self::login_with_options(data_dir, user_id, remote, SyncEngineOptions::default())
    }

    /// Open (or create) the user's store and build the engine around it.
    /// Switching users is logout-then-login; stores are never shared.
    pub fn login_with_options(
        data_dir: &Path,
        user_id: &str,
        remote: Arc<dyn RemoteStore>,
        options: SyncEngineOptions,
    ) -> Result<Self> {
        let store = LocalStore::open(data_dir, user_id)?;
        let notes = Arc::new(NoteRepository::new(store.pool(), store.writer()));
        let tags = Arc::new(TagRepository::new(store.pool(), store.writer()));
        let links = Arc::new(LinkRepository::new(store.pool(), store.writer()));
        let queue = Arc::new(SyncQueueRepository::new(store.pool(), store.writer()));

        let engine = SyncEngine::new(
            Arc::clone(&notes),
            Arc::clone(&tags),
            Arc::clone(&links),
            Arc::clone(&queue),
            remote,
            options,
        );

        info!("[Sync] Session opened for user {user_id}");
        Ok(Self {
            user_id: user_id.to_string(),
            engine,
            notes,
            tags,
            links,
            queue,
            store: Some(store),
            background: None,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn engine(&self) -> SyncEngine {
        self.engine.clone()
    }

    pub fn notes(&self) -> Arc<NoteRepository> {
        Arc::clone(&self.notes)
    }

    pub fn tags(&self) -> Arc<TagRepository> {
        Arc::clone(&self.tags)
    }

    pub fn links(&self) -> Arc<LinkRepository> {
        Arc::clone(&self.links)
    }

    pub fn queue(&self) -> Arc<SyncQueueRepository> {
        Arc::clone(&self.queue)
    }

    /// Initial hydration after login: one sync cycle bounded by `timeout`.
    /// On expiry the app proceeds with whatever local data exists instead
    /// of hanging.
    pub async fn hydrate(&self, timeout: Duration) -> SyncSummary {
        match tokio::time::timeout(timeout, self.engine.sync(SyncCycleTrigger::Hydration)).await {
            Ok(summary) => summary,
            Err(_) => {
                warn!("[Sync] Hydration timed out, continuing with local data");
                SyncSummary::timed_out()
            }
        }
    }

    /// Start the periodic cycle loop. Idempotent; the loop dies with the
    /// session.
    pub fn start_background_sync(&mut self) {
        if let Some(handle) = self.background.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        let engine = self.engine.clone();
        let queue = Arc::clone(&self.queue);
        self.background = Some(tokio::spawn(async move {
            let mut consecutive_failures: i32 = 0;
            loop {
                if engine.is_online() {
                    let summary = engine.sync(SyncCycleTrigger::Periodic).await;
                    debug!(
                        "[Sync] Periodic cycle status={:?} pushed={} pulled={}",
                        summary.status, summary.pushed, summary.pulled
                    );
                    if summary.errors.is_empty() {
                        consecutive_failures = 0;
                    } else {
                        consecutive_failures += 1;
                    }
                }

                let jitter = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(0..=SYNC_INTERVAL_JITTER_SECS)
                };
                let mut delay_secs = SYNC_FOREGROUND_INTERVAL_SECS + jitter;
                if engine.is_online() {
                    if consecutive_failures > 0 {
                        delay_secs = backoff_seconds(consecutive_failures) as u64 + jitter;
                    } else if matches!(queue.pending_count(), Ok(pending) if pending > 0) {
                        delay_secs = SYNC_PENDING_INTERVAL_SECS;
                    }
                }
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            }
        }));
    }

    /// Tear the session down: stop the loop, forget engine state, and
    /// destroy the on-disk store so nothing leaks to the next account.
    pub async fn logout(mut self) -> Result<()> {
        if let Some(handle) = self.background.take() {
            handle.abort();
        }
        self.engine.clear_session_state();
        if let Some(store) = self.store.take() {
            store.destroy()?;
        }
        info!("[Sync] Session closed for user {}", self.user_id);
        Ok(())
    }
}
