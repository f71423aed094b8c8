use chrono::Utc;
use tokio::time::{Duration, Instant};

use farmhand::backend::{Account, ModuleReport};
use farmhand::engine::{
    CoreCommand, CoreRuntime, EngineSettings, TaskOutcome, TaskReport, TimerKey, TimerWheel,
};
use farmhand::types::{ActivationOptions, MAX_INTERVAL_MINUTES, ModuleType, Task};
use farmhand_test_utils::init_tracing;

const MIN: Duration = Duration::from_secs(60);

fn account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        email: format!("{id}@example.com"),
    }
}

fn core() -> CoreRuntime {
    init_tracing();
    CoreRuntime::new(EngineSettings::default())
}

fn report(task: Task, outcome: TaskOutcome) -> TaskReport {
    TaskReport {
        task,
        outcome,
        finished_at: Utc::now(),
    }
}

fn succeed(core: &mut CoreRuntime) -> Task {
    let task = core.begin_next(Utc::now()).expect("a task to run");
    core.finish_task(&report(task.clone(), TaskOutcome::Succeeded(ModuleReport::new("ok"))));
    core.end_cooldown();
    task
}

fn queued(core: &CoreRuntime) -> Vec<(String, ModuleType)> {
    core.queue()
        .iter()
        .map(|t| (t.account_id.clone(), t.module))
        .collect()
}

#[test]
fn activation_enqueues_one_task_per_enabled_module() {
    let mut core = core();
    let t0 = Instant::now();

    let opts = ActivationOptions::default()
        .with_interval(ModuleType::Farm, 5)
        .with_interval(ModuleType::Stalls, 30);
    let commands = core.activate(&account("alice"), opts, t0, Utc::now());

    assert!(commands.is_empty());
    assert_eq!(
        queued(&core),
        vec![
            ("alice".to_string(), ModuleType::Farm),
            ("alice".to_string(), ModuleType::Stalls),
        ]
    );
    assert!(core.timers().contains(&TimerKey::Module {
        account_id: "alice".into(),
        module: ModuleType::Farm,
    }));
    assert!(!core.timers().contains(&TimerKey::Module {
        account_id: "alice".into(),
        module: ModuleType::Forestry,
    }));
    assert_eq!(core.next_deadline(), Some(t0 + 5 * MIN));
}

#[test]
fn farm_every_five_minutes_yields_exactly_one_more_task() {
    let mut core = core();
    let t0 = Instant::now();

    core.activate(
        &account("alice"),
        ActivationOptions::default().with_interval(ModuleType::Farm, 5),
        t0,
        Utc::now(),
    );
    assert_eq!(core.queue().len(), 1);
    succeed(&mut core);
    assert!(core.queue().is_empty());

    let fired = core.fire_due_timers(t0 + 5 * MIN - Duration::from_millis(1), Utc::now());
    assert!(fired.enqueued.is_empty());

    let fired = core.fire_due_timers(t0 + 5 * MIN, Utc::now());
    assert_eq!(fired.enqueued.len(), 1);
    assert_eq!(fired.enqueued[0].module, ModuleType::Farm);
    assert_eq!(core.queue().len(), 1);

    // Re-armed for the next period, not fired again.
    let fired = core.fire_due_timers(t0 + 5 * MIN + Duration::from_secs(30), Utc::now());
    assert!(fired.enqueued.is_empty());
    assert_eq!(core.next_deadline(), Some(t0 + 10 * MIN));
}

#[test]
fn missed_periods_collapse_into_one_queued_task() {
    let mut core = core();
    let t0 = Instant::now();

    core.activate(
        &account("alice"),
        ActivationOptions::default().with_interval(ModuleType::Farm, 1),
        t0,
        Utc::now(),
    );

    // Nothing consumes the queue for ten minutes.
    for m in 1..=10 {
        core.fire_due_timers(t0 + m * MIN, Utc::now());
    }
    assert_eq!(core.queue().len(), 1);
    assert_eq!(core.account_queue("alice").len(), 1);
}

#[test]
fn oversized_interval_is_clamped_instead_of_overflowing() {
    let mut core = core();
    let t0 = Instant::now();

    let opts = ActivationOptions::default()
        .with_interval(ModuleType::Farm, u64::MAX / 30)
        .with_interval(ModuleType::Stalls, u64::MAX);
    core.activate(&account("alice"), opts, t0, Utc::now());

    assert_eq!(
        queued(&core),
        vec![
            ("alice".to_string(), ModuleType::Farm),
            ("alice".to_string(), ModuleType::Stalls),
        ],
        "activation still runs both modules right away"
    );
    let week = Duration::from_secs(MAX_INTERVAL_MINUTES * 60);
    assert_eq!(core.next_deadline(), Some(t0 + week));

    succeed(&mut core);
    succeed(&mut core);
    let fired = core.fire_due_timers(t0 + week, Utc::now());
    assert_eq!(fired.enqueued.len(), 2);
    assert_eq!(core.next_deadline(), Some(t0 + 2 * week));
}

#[test]
fn timer_wheel_skips_unrepresentable_deadlines() {
    let mut wheel = TimerWheel::new();
    let now = Instant::now();
    let key = TimerKey::Module {
        account_id: "alice".into(),
        module: ModuleType::Farm,
    };

    assert!(wheel.schedule_every(key.clone(), Duration::MAX, now).is_none());
    assert!(!wheel.contains(&key));
    assert_eq!(wheel.next_deadline(), None);

    assert!(wheel.schedule_every(key.clone(), MIN, now).is_some());
    assert_eq!(wheel.next_deadline(), Some(now + MIN));
}

#[test]
fn reactivation_tears_down_the_previous_schedule() {
    let mut core = core();
    let t0 = Instant::now();

    core.activate(
        &account("alice"),
        ActivationOptions::default()
            .with_interval(ModuleType::Farm, 5)
            .with_interval(ModuleType::Forestry, 10),
        t0,
        Utc::now(),
    );

    let commands = core.activate(
        &account("alice"),
        ActivationOptions::default().with_interval(ModuleType::Stalls, 2),
        t0 + MIN,
        Utc::now(),
    );

    assert_eq!(commands, vec![CoreCommand::CloseSession("alice".into())]);
    assert_eq!(queued(&core), vec![("alice".to_string(), ModuleType::Stalls)]);
    assert_eq!(core.timers().len(), 1);
    assert_eq!(core.next_deadline(), Some(t0 + 3 * MIN));
}

#[test]
fn deactivate_clears_queue_and_timers_and_requests_close() {
    let mut core = core();
    let t0 = Instant::now();

    core.activate(
        &account("alice"),
        ActivationOptions::default()
            .with_interval(ModuleType::Farm, 5)
            .with_interval(ModuleType::Forestry, 5)
            .with_smart_mode(true),
        t0,
        Utc::now(),
    );
    core.activate(
        &account("bob"),
        ActivationOptions::default().with_interval(ModuleType::Farm, 5),
        t0,
        Utc::now(),
    );

    let commands = core.deactivate("alice");
    assert_eq!(commands, vec![CoreCommand::CloseSession("alice".into())]);
    assert!(core.account_queue("alice").is_empty());
    assert_eq!(core.account_queue("bob").len(), 1);
    assert!(!core.is_active("alice"));
    assert_eq!(core.timers().len(), 1, "only bob's farm timer remains");

    let fired = core.fire_due_timers(t0 + 60 * MIN, Utc::now());
    assert!(fired.enqueued.iter().all(|t| t.account_id == "bob"));
    assert!(fired.smart_kickoffs.is_empty());
}

#[test]
fn deactivate_unknown_account_is_a_noop() {
    let mut core = core();
    assert!(core.deactivate("ghost").is_empty());
}

#[test]
fn only_one_task_in_flight_and_guard_held_through_cooldown() {
    let mut core = core();
    let t0 = Instant::now();

    core.activate(
        &account("alice"),
        ActivationOptions::default()
            .with_interval(ModuleType::Farm, 5)
            .with_interval(ModuleType::Forestry, 5),
        t0,
        Utc::now(),
    );

    let first = core.begin_next(Utc::now()).expect("first task");
    assert!(core.is_processing());
    assert_eq!(core.current_task(), Some(&first));
    assert!(core.begin_next(Utc::now()).is_none(), "guard blocks a second dispatch");

    let more = core.finish_task(&report(first, TaskOutcome::Failed("boom".into())));
    assert!(more, "forestry is still queued");
    assert!(core.is_processing(), "cooldown keeps the guard");
    assert!(core.current_task().is_none());
    assert!(core.begin_next(Utc::now()).is_none());

    core.end_cooldown();
    let second = core.begin_next(Utc::now()).expect("second task after cooldown");
    assert_eq!(second.module, ModuleType::Forestry);

    let more = core.finish_task(&report(second, TaskOutcome::Succeeded(ModuleReport::new("ok"))));
    assert!(!more);
    assert!(!core.is_processing(), "no cooldown when the queue is empty");
    assert!(core.is_idle());
}

#[test]
fn stats_follow_outcomes() {
    let mut core = core();
    let t0 = Instant::now();
    core.activate(&account("alice"), ActivationOptions::default(), t0, Utc::now());

    for (module, outcome) in [
        (ModuleType::Farm, TaskOutcome::Succeeded(ModuleReport::new("ok"))),
        (ModuleType::Farm, TaskOutcome::Succeeded(ModuleReport::new("ok"))),
        (ModuleType::Forestry, TaskOutcome::Failed("boom".into())),
        (ModuleType::Stalls, TaskOutcome::Skipped("locked".into())),
        (ModuleType::Stalls, TaskOutcome::Aborted),
    ] {
        core.enqueue("alice", module, Utc::now());
        let task = core.begin_next(Utc::now()).expect("task");
        core.finish_task(&report(task, outcome));
        core.end_cooldown();
    }

    let status = core.status(true);
    let alice = status.account("alice").expect("alice is active");

    let farm = alice.stats[&ModuleType::Farm];
    assert_eq!((farm.success, farm.error), (2, 0));
    assert!(farm.last_success.is_some());
    assert!(farm.last_error.is_none());

    let forestry = alice.stats[&ModuleType::Forestry];
    assert_eq!((forestry.success, forestry.error), (0, 1));

    let stalls = alice.stats[&ModuleType::Stalls];
    assert_eq!((stalls.success, stalls.error, stalls.skipped), (0, 0, 1));

    assert_eq!(alice.last_run.len(), 3, "last run is stamped on dispatch");
}

#[test]
fn status_lists_active_accounts_in_id_order() {
    let mut core = core();
    let t0 = Instant::now();
    for id in ["carol", "alice", "bob"] {
        core.activate(
            &account(id),
            ActivationOptions::default().with_interval(ModuleType::Farm, 5),
            t0,
            Utc::now(),
        );
    }

    let status = core.status(false);
    let ids: Vec<&str> = status
        .active_accounts
        .iter()
        .map(|a| a.account_id.as_str())
        .collect();
    assert_eq!(ids, vec!["alice", "bob", "carol"]);
    assert_eq!(status.queue_length, 3);
    assert_eq!(status.queue[0].account_id, "carol", "queue keeps activation order");
    assert!(!status.is_running);
    assert!(status.active_accounts[0].stats.len() == 3);
}

#[test]
fn stop_clears_everything_and_closes_known_sessions() {
    let mut core = core();
    let t0 = Instant::now();

    core.activate(
        &account("alice"),
        ActivationOptions::default().with_interval(ModuleType::Farm, 5),
        t0,
        Utc::now(),
    );
    core.activate(
        &account("bob"),
        ActivationOptions::default().with_interval(ModuleType::Farm, 5),
        t0,
        Utc::now(),
    );
    // A manual run for an account that was never activated still opens a session.
    core.enqueue("carol", ModuleType::Stalls, Utc::now());
    succeed(&mut core);
    succeed(&mut core);
    succeed(&mut core);

    let commands = core.stop();
    assert_eq!(
        commands,
        vec![
            CoreCommand::CloseSession("alice".into()),
            CoreCommand::CloseSession("bob".into()),
            CoreCommand::CloseSession("carol".into()),
        ]
    );
    assert!(core.queue().is_empty());
    assert!(core.timers().is_empty());
    assert!(core.status(false).active_accounts.is_empty());
    assert_eq!(core.stats().get("alice", ModuleType::Farm).success, 1, "stats survive stop");
}
