//! Engine construction and the single-flight sync cycle gate.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use quillpad_core::sync::{
    EchoSuppressor, SyncCycleTrigger, SyncSummary, ECHO_GRACE_MS, RETRY_CEILING,
};
use quillpad_remote::RemoteStore;
use quillpad_storage_sqlite::{LinkRepository, NoteRepository, SyncQueueRepository, TagRepository};

use crate::conflicts::{ConflictHandler, NoteConflict};

type CycleFuture = Shared<BoxFuture<'static, SyncSummary>>;

/// Tunables for one engine instance. Tests shrink the echo grace so cycles
/// settle quickly.
#[derive(Clone)]
pub struct SyncEngineOptions {
    /// Delay before a pushed mutation's echo token is released.
    pub echo_grace: Duration,
    /// Attempts allowed per queue entry before it is dropped and reported.
    pub retry_ceiling: i32,
}

impl Default for SyncEngineOptions {
    fn default() -> Self {
        Self {
            echo_grace: Duration::from_millis(ECHO_GRACE_MS),
            retry_ceiling: RETRY_CEILING,
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) notes: Arc<NoteRepository>,
    pub(crate) tags: Arc<TagRepository>,
    pub(crate) links: Arc<LinkRepository>,
    pub(crate) queue: Arc<SyncQueueRepository>,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) echo: Arc<EchoSuppressor>,
    pub(crate) options: SyncEngineOptions,
    pub(crate) online: AtomicBool,
    pub(crate) current_cycle: AsyncMutex<Option<CycleFuture>>,
    pub(crate) conflicts: StdMutex<HashMap<String, NoteConflict>>,
    pub(crate) conflict_handler: StdMutex<Option<ConflictHandler>>,
}

/// The per-session sync engine. Cheap to clone; clones share one engine.
///
/// All cross-cutting sync state — the pending-echo token set, the in-flight
/// cycle slot, the conflict registry and callback — lives behind this one
/// handle, constructed at login and torn down at logout. Nothing here is
/// process-global, so two sessions never share state.
#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(
        notes: Arc<NoteRepository>,
        tags: Arc<TagRepository>,
        links: Arc<LinkRepository>,
        queue: Arc<SyncQueueRepository>,
        remote: Arc<dyn RemoteStore>,
        options: SyncEngineOptions,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                notes,
                tags,
                links,
                queue,
                remote,
                echo: Arc::new(EchoSuppressor::new()),
                options,
                online: AtomicBool::new(false),
                current_cycle: AsyncMutex::new(None),
                conflicts: StdMutex::new(HashMap::new()),
                conflict_handler: StdMutex::new(None),
            }),
        }
    }

    pub fn echo_suppressor(&self) -> Arc<EchoSuppressor> {
        Arc::clone(&self.inner.echo)
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Record connectivity. An offline-to-online transition triggers a
    /// cycle immediately and returns its summary.
    pub async fn set_online(&self, online: bool) -> Option<SyncSummary> {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            info!("[Sync] Connectivity restored, starting sync cycle");
            return Some(self.sync(SyncCycleTrigger::Reconnect).await);
        }
        None
    }

    /// Run a full sync cycle, or join the one already in flight.
    ///
    /// Only one cycle runs per engine; a second caller awaits the shared
    /// in-flight future and receives the same summary instead of starting
    /// duplicate network traffic.
    pub async fn sync(&self, trigger: SyncCycleTrigger) -> SyncSummary {
        let cycle = {
            let mut current = self.inner.current_cycle.lock().await;
            let in_flight = current
                .as_ref()
                .filter(|cycle| cycle.peek().is_none())
                .cloned();
            match in_flight {
                Some(existing) => existing,
                None => {
                    let engine = self.clone();
                    let fresh: CycleFuture =
                        async move { engine.run_cycle(trigger).await }.boxed().shared();
                    *current = Some(fresh.clone());
                    fresh
                }
            }
        };

        let summary = cycle.await;

        // Clear the slot once the cycle it holds has settled, whichever
        // caller gets here first.
        let mut current = self.inner.current_cycle.lock().await;
        if current
            .as_ref()
            .map(|cycle| cycle.peek().is_some())
            .unwrap_or(false)
        {
            *current = None;
        }
        summary
    }

    async fn run_cycle(&self, trigger: SyncCycleTrigger) -> SyncSummary {
        if !self.is_online() {
            debug!("[Sync] Skipping cycle while offline");
            return SyncSummary::offline();
        }

        let started = std::time::Instant::now();
        let mut summary = SyncSummary::new();
        self.pull(&mut summary).await;
        self.push(&mut summary).await;

        debug!(
            "[Sync] Cycle complete trigger={:?} status={:?} pulled={} pushed={} conflicts={} failed={} duration_ms={}",
            trigger,
            summary.status,
            summary.pulled,
            summary.pushed,
            summary.conflicts,
            summary.failed,
            started.elapsed().as_millis()
        );
        summary
    }

    /// Forget session-scoped sync state. Called on logout so no tokens or
    /// unresolved conflicts leak into the next session on this device.
    pub fn clear_session_state(&self) {
        self.inner.echo.clear();
        if let Ok(mut conflicts) = self.inner.conflicts.lock() {
            conflicts.clear();
        }
        if let Ok(mut handler) = self.inner.conflict_handler.lock() {
            handler.take();
        }
    }
}
