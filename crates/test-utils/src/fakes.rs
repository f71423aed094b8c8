#![allow(dead_code)]

//! In-memory collaborators that record every call and let tests script
//! outcomes.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::Notify;

use farmhand::backend::{
    Account, AccountDirectory, ActionLog, ActionLogEntry, Authenticator, BoxFuture, Collaborators,
    GameModule, GameStatusCache, ModuleReport, ModuleResult, ModuleTable, Notifier, PlayerInfo,
    SessionProvider, StatusCache,
};
use farmhand::types::ModuleType;

/// Session handed out by [`FakeSessions`].
#[derive(Debug)]
pub struct FakeSession {
    pub id: usize,
    pub account_id: String,
}

/// Records acquire/release calls; acquisition can be made to fail per
/// account.
#[derive(Debug, Default)]
pub struct FakeSessions {
    open: Mutex<HashMap<String, Arc<FakeSession>>>,
    acquired: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    fail_acquire: Mutex<HashSet<String>>,
    fail_release: Mutex<bool>,
    created: AtomicUsize,
}

impl FakeSessions {
    pub fn fail_acquire_for(&self, account_id: &str) {
        self.fail_acquire.lock().unwrap().insert(account_id.to_string());
    }

    pub fn fail_release(&self, fail: bool) {
        *self.fail_release.lock().unwrap() = fail;
    }

    pub fn acquired(&self) -> Vec<String> {
        self.acquired.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }

    pub fn release_count(&self, account_id: &str) -> usize {
        self.released
            .lock()
            .unwrap()
            .iter()
            .filter(|id| *id == account_id)
            .count()
    }

    pub fn is_open(&self, account_id: &str) -> bool {
        self.open.lock().unwrap().contains_key(account_id)
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl SessionProvider for FakeSessions {
    type Session = FakeSession;

    fn acquire<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, Result<Arc<FakeSession>>> {
        Box::pin(async move {
            self.acquired.lock().unwrap().push(account.id.clone());
            if self.fail_acquire.lock().unwrap().contains(&account.id) {
                return Err(anyhow!("browser failed to start for {}", account.id));
            }
            let mut open = self.open.lock().unwrap();
            let session = open.entry(account.id.clone()).or_insert_with(|| {
                let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                Arc::new(FakeSession {
                    id,
                    account_id: account.id.clone(),
                })
            });
            Ok(Arc::clone(session))
        })
    }

    fn release<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.released.lock().unwrap().push(account_id.to_string());
            self.open.lock().unwrap().remove(account_id);
            if *self.fail_release.lock().unwrap() {
                return Err(anyhow!("browser refused to close"));
            }
            Ok(())
        })
    }
}

/// Login that can be made to fail per account and reports scripted levels.
#[derive(Debug, Default)]
pub struct FakeAuth {
    fail_for: Mutex<HashSet<String>>,
    levels: Mutex<HashMap<String, u32>>,
    logins: AtomicUsize,
}

impl FakeAuth {
    pub fn fail_for(&self, account_id: &str) {
        self.fail_for.lock().unwrap().insert(account_id.to_string());
    }

    pub fn set_level(&self, account_id: &str, level: u32) {
        self.levels.lock().unwrap().insert(account_id.to_string(), level);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

impl Authenticator<FakeSession> for FakeAuth {
    fn ensure_logged_in<'a>(&'a self, _session: &'a FakeSession, account: &'a Account) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.lock().unwrap().contains(&account.id) {
                return Err(anyhow!("invalid credentials for {}", account.email));
            }
            Ok(())
        })
    }

    fn player_info<'a>(
        &'a self,
        _session: &'a FakeSession,
        account: &'a Account,
    ) -> BoxFuture<'a, Result<Option<PlayerInfo>>> {
        Box::pin(async move {
            Ok(self
                .levels
                .lock()
                .unwrap()
                .get(&account.id)
                .map(|level| PlayerInfo { level: *level }))
        })
    }
}

/// Tracks how many module cycles are running at once, across all modules.
#[derive(Debug, Default)]
pub struct InFlightProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlightProbe {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// One scripted result of [`ScriptedModule::run_full_cycle`].
#[derive(Debug, Clone)]
pub enum Scripted {
    Succeed(String),
    Fail(String),
    Locked,
}

/// Module whose results are popped from a script; succeeds once the script
/// runs out. Optionally takes simulated time per run, or blocks until
/// released.
#[derive(Debug)]
pub struct ScriptedModule {
    module: ModuleType,
    script: Mutex<VecDeque<Scripted>>,
    runs: Mutex<Vec<String>>,
    run_time: Mutex<Duration>,
    gate: Mutex<Option<Arc<Notify>>>,
    probe: Arc<InFlightProbe>,
}

impl ScriptedModule {
    pub fn new(module: ModuleType, probe: Arc<InFlightProbe>) -> Self {
        Self {
            module,
            script: Mutex::new(VecDeque::new()),
            runs: Mutex::new(Vec::new()),
            run_time: Mutex::new(Duration::ZERO),
            gate: Mutex::new(None),
            probe,
        }
    }

    pub fn push(&self, outcome: Scripted) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn fail_next(&self, message: &str) {
        self.push(Scripted::Fail(message.to_string()));
    }

    pub fn lock_next(&self) {
        self.push(Scripted::Locked);
    }

    /// Every run takes `d` of (possibly paused) Tokio time.
    pub fn set_run_time(&self, d: Duration) {
        *self.run_time.lock().unwrap() = d;
    }

    /// Every run from now on blocks until [`release`](Self::release).
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    /// Unblock the held run (if any) and stop holding later ones.
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_one();
        }
    }

    /// Account ids of cycles that reached the module, in order.
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    fn next_outcome(&self) -> Scripted {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Succeed(format!("{} ok", self.module)))
    }
}

impl GameModule<FakeSession> for ScriptedModule {
    fn is_unlocked<'a>(&'a self, _session: &'a FakeSession, _account: &'a Account) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let mut script = self.script.lock().unwrap();
            if matches!(script.front(), Some(Scripted::Locked)) {
                script.pop_front();
                return Ok(false);
            }
            Ok(true)
        })
    }

    fn run_full_cycle<'a>(&'a self, _session: &'a FakeSession, account: &'a Account) -> BoxFuture<'a, Result<ModuleReport>> {
        Box::pin(async move {
            self.probe.enter();
            self.runs.lock().unwrap().push(account.id.clone());

            let run_time = *self.run_time.lock().unwrap();
            if !run_time.is_zero() {
                tokio::time::sleep(run_time).await;
            }
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let outcome = self.next_outcome();
            self.probe.exit();

            match outcome {
                Scripted::Succeed(summary) => Ok(ModuleReport::new(summary)),
                Scripted::Fail(message) => Err(anyhow!(message)),
                Scripted::Locked => Err(anyhow!("locked outcome scripted after unlock check")),
            }
        })
    }
}

/// A notification as seen by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Started { account: String, module: ModuleType },
    Completed { account: String, module: ModuleType, result: ModuleResult },
    Error { account: String, module: ModuleType, message: String },
    LevelUp { account: String, old: u32, new: u32 },
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, n: Notification) {
        self.events.lock().unwrap().push(n);
    }
}

impl Notifier for RecordingNotifier {
    fn module_started(&self, account_id: &str, _email: &str, module: ModuleType, _message: &str) {
        self.push(Notification::Started {
            account: account_id.to_string(),
            module,
        });
    }

    fn module_completed(&self, account_id: &str, _email: &str, module: ModuleType, result: &ModuleResult) {
        self.push(Notification::Completed {
            account: account_id.to_string(),
            module,
            result: result.clone(),
        });
    }

    fn module_error(&self, account_id: &str, _email: &str, module: ModuleType, message: &str) {
        self.push(Notification::Error {
            account: account_id.to_string(),
            module,
            message: message.to_string(),
        });
    }

    fn level_up(&self, account_id: &str, _email: &str, old_level: u32, new_level: u32) {
        self.push(Notification::LevelUp {
            account: account_id.to_string(),
            old: old_level,
            new: new_level,
        });
    }
}

#[derive(Debug, Default)]
pub struct MemoryActionLog {
    entries: Mutex<Vec<ActionLogEntry>>,
}

impl MemoryActionLog {
    pub fn entries(&self) -> Vec<ActionLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl ActionLog for MemoryActionLog {
    fn record<'a>(&'a self, entry: ActionLogEntry) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: Mutex<BTreeMap<String, Account>>,
}

impl MemoryAccounts {
    pub fn insert(&self, id: &str) {
        self.accounts.lock().unwrap().insert(
            id.to_string(),
            Account {
                id: id.to_string(),
                email: format!("{id}@example.com"),
            },
        );
    }

    pub fn remove(&self, id: &str) {
        self.accounts.lock().unwrap().remove(id);
    }
}

impl AccountDirectory for MemoryAccounts {
    fn find<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<Option<Account>>> {
        Box::pin(async move { Ok(self.accounts.lock().unwrap().get(account_id).cloned()) })
    }
}

/// Status cache with snapshots set by the test; counts fetches per account.
#[derive(Debug, Default)]
pub struct MemoryStatusCache {
    snapshots: Mutex<HashMap<String, GameStatusCache>>,
    fetches: Mutex<Vec<String>>,
}

impl MemoryStatusCache {
    pub fn set(&self, account_id: &str, cache: GameStatusCache) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(account_id.to_string(), cache);
    }

    pub fn clear(&self, account_id: &str) {
        self.snapshots.lock().unwrap().remove(account_id);
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

impl StatusCache for MemoryStatusCache {
    fn fetch<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<Option<GameStatusCache>>> {
        Box::pin(async move {
            self.fetches.lock().unwrap().push(account_id.to_string());
            Ok(self.snapshots.lock().unwrap().get(account_id).cloned())
        })
    }
}

/// Every fake wired together, with handles kept for assertions.
pub struct Harness {
    pub accounts: Arc<MemoryAccounts>,
    pub sessions: Arc<FakeSessions>,
    pub auth: Arc<FakeAuth>,
    pub farm: Arc<ScriptedModule>,
    pub forestry: Arc<ScriptedModule>,
    pub stalls: Arc<ScriptedModule>,
    pub notifier: Arc<RecordingNotifier>,
    pub action_log: Arc<MemoryActionLog>,
    pub status_cache: Arc<MemoryStatusCache>,
    pub probe: Arc<InFlightProbe>,
}

impl Harness {
    /// Harness knowing the given account ids (emails are `<id>@example.com`).
    pub fn new(account_ids: &[&str]) -> Self {
        let accounts = Arc::new(MemoryAccounts::default());
        for id in account_ids {
            accounts.insert(id);
        }
        let probe = Arc::new(InFlightProbe::default());

        Self {
            accounts,
            sessions: Arc::new(FakeSessions::default()),
            auth: Arc::new(FakeAuth::default()),
            farm: Arc::new(ScriptedModule::new(ModuleType::Farm, Arc::clone(&probe))),
            forestry: Arc::new(ScriptedModule::new(ModuleType::Forestry, Arc::clone(&probe))),
            stalls: Arc::new(ScriptedModule::new(ModuleType::Stalls, Arc::clone(&probe))),
            notifier: Arc::new(RecordingNotifier::default()),
            action_log: Arc::new(MemoryActionLog::default()),
            status_cache: Arc::new(MemoryStatusCache::default()),
            probe,
        }
    }

    pub fn module(&self, module: ModuleType) -> &Arc<ScriptedModule> {
        match module {
            ModuleType::Farm => &self.farm,
            ModuleType::Forestry => &self.forestry,
            ModuleType::Stalls => &self.stalls,
        }
    }

    pub fn collaborators(&self) -> Collaborators<FakeSessions> {
        Collaborators {
            accounts: self.accounts.clone(),
            sessions: Arc::clone(&self.sessions),
            auth: self.auth.clone(),
            modules: ModuleTable {
                farm: self.farm.clone(),
                forestry: self.forestry.clone(),
                stalls: self.stalls.clone(),
            },
            notifier: self.notifier.clone(),
            action_log: self.action_log.clone(),
            status_cache: self.status_cache.clone(),
        }
    }
}
