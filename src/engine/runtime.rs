// src/engine/runtime.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at, sleep, sleep_until};
use tracing::{debug, info};

use crate::backend::{Collaborators, SessionProvider};
use crate::engine::EngineSettings;
use crate::engine::core::{CoreCommand, CoreRuntime};
use crate::engine::executor::{release_session, run_task};
use crate::engine::status::OrchestratorStatus;
use crate::errors::{FarmhandError, Result};
use crate::types::{ActivationOptions, ModuleType, Task};

/// The orchestrator: a cheap, cloneable handle around the core state and the
/// injected collaborators.
///
/// This is the async IO shell around [`CoreRuntime`], which holds all the
/// scheduling semantics. While started, one background loop:
/// - polls the queue every `queue_poll` and hands the head task to the
///   executor when nothing is in flight
/// - runs the smart-mode tick every `smart_poll`
/// - sleeps until the timer wheel's next deadline and fires it
///
/// Tasks run on their own Tokio task so the loop keeps accepting triggers
/// while a module is busy; the core's in-flight guard keeps execution
/// strictly one at a time. There is no execution deadline: a module that
/// never returns stalls every account.
pub struct Orchestrator<P: SessionProvider> {
    inner: Arc<Inner<P>>,
}

struct Inner<P: SessionProvider> {
    core: Mutex<CoreRuntime>,
    collab: Collaborators<P>,
    /// Wakes the loop for an immediate poll and deadline refresh.
    wake: Notify,
    /// Signalled whenever a task finishes or its cooldown ends.
    settled: Notify,
    running: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl<P: SessionProvider> Clone for Orchestrator<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: SessionProvider> fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("core", &*self.inner.core())
            .finish_non_exhaustive()
    }
}

impl<P: SessionProvider> Orchestrator<P> {
    pub fn new(collab: Collaborators<P>, settings: EngineSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(CoreRuntime::new(settings)),
                collab,
                wake: Notify::new(),
                settled: Notify::new(),
                running: Mutex::new(None),
            }),
        }
    }

    /// Start the queue poll and smart-mode poll.
    ///
    /// Idempotent: returns `false` if the loop was already running. Must be
    /// called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.inner.running();
        if running.is_some() {
            debug!("orchestrator already running; start ignored");
            return false;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), shutdown_rx));
        *running = Some(RunningLoop { shutdown, handle });

        info!("orchestrator started");
        true
    }

    /// Stop both polls and tear everything down.
    ///
    /// Clears every account's timers and schedule, empties the queue and
    /// closes every known session. Close failures are logged and swallowed.
    /// A task already in flight is not interrupted; it finishes on its own
    /// and its outcome is still recorded.
    pub async fn stop(&self) {
        let running = self.inner.running().take();

        if let Some(running) = running {
            let _ = running.shutdown.send(());
            if let Err(err) = running.handle.await {
                debug!(error = %err, "orchestrator loop ended abnormally");
            }
        }

        let commands = self.inner.core().stop();
        self.inner.execute_commands(commands).await;
        info!("orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running().is_some()
    }

    /// Activate (or re-activate) an account.
    ///
    /// Looks the account up, tears down any existing schedule for it, then
    /// queues one task per enabled module and registers the recurring
    /// timers (and the smart-mode kickoff when enabled).
    pub async fn activate_account(&self, account_id: &str, options: ActivationOptions) -> Result<()> {
        let account = self
            .inner
            .collab
            .accounts
            .find(account_id)
            .await?
            .ok_or_else(|| FarmhandError::AccountNotFound(account_id.to_string()))?;

        let commands = self
            .inner
            .core()
            .activate(&account, options, Instant::now(), Utc::now());
        self.inner.execute_commands(commands).await;

        self.inner.wake.notify_one();
        Ok(())
    }

    /// Deactivate an account: clear its timers, drop its queued tasks and
    /// close its session. No-op for an inactive account.
    pub async fn deactivate_account(&self, account_id: &str) {
        let commands = self.inner.core().deactivate(account_id);
        self.inner.execute_commands(commands).await;
        self.inner.wake.notify_one();
    }

    /// Manually queue one run of `module` for `account_id` and ask the loop
    /// for an immediate poll.
    ///
    /// Returns the queued task, or `None` if one was already pending.
    pub fn run_module(&self, account_id: &str, module: ModuleType) -> Option<Task> {
        let task = self.inner.core().enqueue(account_id, module, Utc::now());
        if task.is_some() {
            info!(account = %account_id, %module, "manual run queued");
        }
        self.inner.wake.notify_one();
        task
    }

    pub fn status(&self) -> OrchestratorStatus {
        let is_running = self.is_running();
        self.inner.core().status(is_running)
    }

    /// Pending tasks for one account, in queue order.
    pub fn account_task_queue(&self, account_id: &str) -> Vec<Task> {
        self.inner.core().account_queue(account_id)
    }

    /// Resolve once nothing is queued and nothing is in flight.
    ///
    /// Only makes progress while the orchestrator is started.
    pub async fn wait_idle(&self) {
        loop {
            let settled = self.inner.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            if self.inner.core().is_idle() {
                return;
            }
            settled.await;
        }
    }

    /// Run a closure against the core state (diagnostics and tests).
    pub fn inspect<R>(&self, f: impl FnOnce(&CoreRuntime) -> R) -> R {
        f(&self.inner.core())
    }
}

impl<P: SessionProvider> Inner<P> {
    fn core(&self) -> MutexGuard<'_, CoreRuntime> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute_commands(&self, commands: Vec<CoreCommand>) {
        for command in commands {
            match command {
                CoreCommand::CloseSession(account_id) => {
                    release_session(&self.collab, &account_id).await;
                }
            }
        }
    }

    /// Hand the head of the queue to the executor if nothing is in flight.
    fn try_dispatch(self: &Arc<Self>) {
        let Some(task) = self.core().begin_next(Utc::now()) else {
            return;
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.execute(task).await });
    }

    async fn execute(self: Arc<Self>, task: Task) {
        let report = run_task(task, &self.collab).await;

        let more_queued = self.core().finish_task(&report);
        self.settled.notify_waiters();

        if more_queued {
            let cooldown = self.core().settings().cooldown;
            debug!(?cooldown, "cooling down before next task");
            sleep(cooldown).await;

            self.core().end_cooldown();
            self.wake.notify_one();
            self.settled.notify_waiters();
        }
    }

    async fn fire_timers(self: &Arc<Self>) {
        let fired = self.core().fire_due_timers(Instant::now(), Utc::now());

        for account_id in fired.smart_kickoffs {
            let claimed = self.core().claim_smart_kickoff(&account_id, Instant::now());
            if claimed {
                self.smart_check(&account_id).await;
            }
        }
    }

    async fn smart_tick(self: &Arc<Self>) {
        let due = self.core().smart_due_accounts(Instant::now());
        for account_id in due {
            self.smart_check(&account_id).await;
        }
    }

    async fn smart_check(&self, account_id: &str) {
        let cache = match self.collab.status_cache.fetch(account_id).await {
            Ok(cache) => cache,
            Err(err) => {
                debug!(account = %account_id, error = %format!("{err:#}"), "status cache unavailable");
                None
            }
        };

        let enqueued =
            self.core()
                .apply_smart_check(account_id, cache.as_ref(), Instant::now(), Utc::now());
        if !enqueued.is_empty() {
            debug!(account = %account_id, count = enqueued.len(), "smart mode queued tasks");
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Main loop.
///
/// - Polls the queue on a fixed cadence (first poll immediately).
/// - Runs the smart-mode tick on its own cadence (first tick after one period).
/// - Fires the timer wheel at its next deadline.
/// - Re-polls immediately when woken by the public API or a finished cooldown.
async fn run_loop<P: SessionProvider>(inner: Arc<Inner<P>>, mut shutdown: oneshot::Receiver<()>) {
    let settings = *inner.core().settings();

    let mut queue_poll = interval(settings.queue_poll);
    queue_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let start = Instant::now();
    let first_smart = start.checked_add(settings.smart_poll).unwrap_or(start);
    let mut smart_poll = interval_at(first_smart, settings.smart_poll);
    smart_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        queue_poll = ?settings.queue_poll,
        smart_poll = ?settings.smart_poll,
        "orchestrator loop started"
    );

    loop {
        let next_deadline = inner.core().next_deadline();

        tokio::select! {
            _ = &mut shutdown => break,
            _ = queue_poll.tick() => inner.try_dispatch(),
            _ = smart_poll.tick() => inner.smart_tick().await,
            _ = sleep_until_deadline(next_deadline) => inner.fire_timers().await,
            _ = inner.wake.notified() => inner.try_dispatch(),
        }
    }

    info!("orchestrator loop exiting");
}
