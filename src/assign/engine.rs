//! Engine: periodic reload-then-assign loop with a graceful stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{Mutex as AsyncMutex, Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, Span, debug, error, info, warn};

use super::cycle::{AssignmentCycle, CycleReport};
use super::registry::Registry;
use crate::error::{Error, Result};
use crate::model::{TeamId, User};
use crate::store::{ConversationStore, TeamStore};
use crate::telemetry::cycle::{record_cycle_result, start_cycle_span};
use crate::telemetry::metrics;

/// State shared between the engine handle and its background task.
struct Shared {
    /// Current snapshot. Swapped whole on reload; a cycle holds one `Arc`
    /// for its entire pass.
    registry: RwLock<Arc<Registry>>,
    conversations: Arc<dyn ConversationStore>,
    teams: Arc<dyn TeamStore>,
    system_user: User,
    /// Held for the whole of every reload, cycle or tick, so loop ticks and
    /// manual calls never interleave. The unlocked helpers below assume the
    /// caller holds it.
    turn: AsyncMutex<()>,
}

impl Shared {
    async fn reload(&self) -> Result<()> {
        // Build off-lock so slow store calls never block readers.
        let registry = match Registry::load(self.teams.as_ref()).await {
            Ok(registry) => registry,
            Err(e) => {
                metrics::registry_reloads().add(1, &[KeyValue::new("result", "error")]);
                return Err(e);
            }
        };
        let teams = registry.len();
        *self.registry.write().await = Arc::new(registry);
        metrics::registry_reloads().add(1, &[KeyValue::new("result", "ok")]);
        debug!(teams, "assignment registry reloaded");
        Ok(())
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        let snapshot = Arc::clone(&*self.registry.read().await);
        AssignmentCycle::new(&snapshot, self.conversations.as_ref(), &self.system_user)
            .run()
            .await
    }

    async fn tick(&self) {
        let span = start_cycle_span();
        async {
            // A failed reload keeps the previous snapshot in place.
            if let Err(e) = self.reload().await {
                error!(error = %e, "error reloading assignment registry");
            }
            match self.run_cycle().await {
                Ok(report) => {
                    record_cycle_result(&Span::current(), report.fetched, report.assigned)
                }
                Err(e) => error!(error = %e, "error assigning conversations"),
            }
        }
        .instrument(span)
        .await
    }
}

/// Assigns unassigned team conversations to team members, round-robin,
/// on a fixed interval.
pub struct Engine {
    shared: Arc<Shared>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Flips to `true` once the background task has exited.
    exited: Arc<watch::Sender<bool>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Engine {
    /// Create an engine and load its first registry snapshot.
    ///
    /// `system_user` is the actor automatic assignments are attributed to.
    pub async fn new(
        conversations: Arc<dyn ConversationStore>,
        teams: Arc<dyn TeamStore>,
        system_user: User,
    ) -> Result<Self> {
        let registry = Registry::load(teams.as_ref()).await?;
        Ok(Self {
            shared: Arc::new(Shared {
                registry: RwLock::new(Arc::new(registry)),
                conversations,
                teams,
                system_user,
                turn: AsyncMutex::new(()),
            }),
            shutdown: Arc::new(Notify::new()),
            task: Mutex::new(None),
            exited: Arc::new(watch::Sender::new(false)),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Rebuild the registry from current team data.
    ///
    /// On failure the previous snapshot stays in place. Waits for any
    /// running tick of the background loop; fails with `Stopped` after
    /// [`stop`](Self::stop).
    pub async fn reload(&self) -> Result<()> {
        let _turn = self.shared.turn.lock().await;
        self.ensure_not_stopped()?;
        self.shared.reload().await
    }

    /// Run one assignment cycle against the current snapshot.
    ///
    /// Serialized with the background loop like [`reload`](Self::reload).
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _turn = self.shared.turn.lock().await;
        self.ensure_not_stopped()?;
        self.shared.run_cycle().await
    }

    /// One tick by hand: reload, then assign. Reload and cycle errors are
    /// logged, not returned. Serialized with the background loop.
    pub async fn tick(&self) -> Result<()> {
        let _turn = self.shared.turn.lock().await;
        self.ensure_not_stopped()?;
        self.shared.tick().await;
        Ok(())
    }

    fn ensure_not_stopped(&self) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            Err(Error::Stopped)
        } else {
            Ok(())
        }
    }

    /// `(team, member count, cap)` for every team in the current snapshot.
    pub async fn pool_sizes(&self) -> Vec<(TeamId, usize, u32)> {
        self.shared.registry.read().await.summary()
    }

    /// Start the periodic loop on the current tokio runtime.
    ///
    /// The first tick fires one `interval` after starting. Ticks never
    /// overlap; a tick that overruns delays the next one.
    pub fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval);
        }
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::Stopped);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let shutdown = Arc::clone(&self.shutdown);
        let exited = Arc::clone(&self.exited);
        let span = tracing::info_span!(
            "autoassign.engine",
            system_user_id = %self.shared.system_user.id,
        );
        *task = Some(tokio::spawn(
            async move {
                run_loop(shared, shutdown, interval).await;
                exited.send_replace(true);
            }
            .instrument(span),
        ));
        Ok(())
    }

    /// Stop the loop and wait for any in-flight tick to finish.
    ///
    /// Once any call returns, including concurrent or repeated ones, the
    /// loop makes no further store calls. Only the first call signals
    /// shutdown; the others just wait for the task to exit.
    pub async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.shutdown.notify_one();
        }

        // Taking the lock orders this after any concurrent start().
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "auto-assignment task ended abnormally");
            }
            self.exited.send_replace(true);
        }

        if self.started.load(Ordering::Acquire) {
            let mut exited = self.exited.subscribe();
            // Only fails if the sender is dropped, and self holds it.
            let _ = exited.wait_for(|done| *done).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Without a stop() the task exits at its next wakeup.
        self.shutdown.notify_one();
    }
}

async fn run_loop(shared: Arc<Shared>, shutdown: Arc<Notify>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms = period.as_millis() as u64, "auto-assignment engine started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                info!("auto-assignment engine stopped");
                return;
            }
            _ = ticker.tick() => {
                let _turn = shared.turn.lock().await;
                shared.tick().await;
            }
        }
    }
}
