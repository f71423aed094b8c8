use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;
use tokio::time::{Duration, Instant};

use farmhand::backend::{Account, GameStatusCache, ModuleReport};
use farmhand::engine::{CoreRuntime, EngineSettings, TaskOutcome, TaskReport};
use farmhand::types::{ActivationOptions, ModuleType, Task};
use farmhand_test_utils::CacheBuilder;

const ACCOUNTS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Clone)]
enum Op {
    Activate { account: usize, farm: u64, forestry: u64, stalls: u64, smart: bool },
    Deactivate(usize),
    RunModule(usize, ModuleType),
    Advance(u64),
    Dispatch,
    Finish(bool),
    EndCooldown,
    SmartTick { farm_ready: bool },
}

fn module_strategy() -> impl Strategy<Value = ModuleType> {
    prop_oneof![
        Just(ModuleType::Farm),
        Just(ModuleType::Forestry),
        Just(ModuleType::Stalls),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => (0..3usize, 0..4u64, 0..4u64, 0..4u64, any::<bool>()).prop_map(
            |(account, farm, forestry, stalls, smart)| Op::Activate { account, farm, forestry, stalls, smart }
        ),
        1 => (0..3usize).prop_map(Op::Deactivate),
        2 => (0..3usize, module_strategy()).prop_map(|(a, m)| Op::RunModule(a, m)),
        3 => (1..400u64).prop_map(Op::Advance),
        3 => Just(Op::Dispatch),
        3 => any::<bool>().prop_map(Op::Finish),
        2 => Just(Op::EndCooldown),
        2 => any::<bool>().prop_map(|farm_ready| Op::SmartTick { farm_ready }),
    ]
}

fn account(i: usize) -> Account {
    Account {
        id: ACCOUNTS[i].to_string(),
        email: format!("{}@example.com", ACCOUNTS[i]),
    }
}

fn cache(farm_ready: bool) -> GameStatusCache {
    let b = CacheBuilder::at(Utc::now());
    let b = if farm_ready {
        b.field("ready", None)
    } else {
        b.field("growing", Some("01:00:00"))
    };
    b.build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn core_invariants_hold_for_any_operation_sequence(ops in proptest::collection::vec(op_strategy(), 1..120)) {
        let mut core = CoreRuntime::new(EngineSettings::default());
        let t0 = Instant::now();
        let mut now = t0;
        let mut in_flight: Option<Task> = None;
        // Last smart enqueue per account for farm, tracked independently.
        let mut smart_farm: Vec<Option<Instant>> = vec![None; ACCOUNTS.len()];

        for op in ops {
            match op {
                Op::Activate { account: a, farm, forestry, stalls, smart } => {
                    let opts = ActivationOptions::default()
                        .with_interval(ModuleType::Farm, farm)
                        .with_interval(ModuleType::Forestry, forestry)
                        .with_interval(ModuleType::Stalls, stalls)
                        .with_smart_mode(smart);
                    core.activate(&account(a), opts, now, Utc::now());
                    smart_farm[a] = None;
                    prop_assert!(core.is_active(ACCOUNTS[a]));
                }
                Op::Deactivate(a) => {
                    core.deactivate(ACCOUNTS[a]);
                    smart_farm[a] = None;
                    prop_assert!(core.account_queue(ACCOUNTS[a]).is_empty());
                    prop_assert!(!core.is_active(ACCOUNTS[a]));
                }
                Op::RunModule(a, m) => {
                    core.enqueue(ACCOUNTS[a], m, Utc::now());
                }
                Op::Advance(secs) => {
                    now += Duration::from_secs(secs);
                    let fired = core.fire_due_timers(now, Utc::now());
                    for id in fired.smart_kickoffs {
                        core.claim_smart_kickoff(&id, now);
                    }
                }
                Op::Dispatch => {
                    let started = core.begin_next(Utc::now());
                    if in_flight.is_some() {
                        prop_assert!(started.is_none(), "second task started while one is in flight");
                    }
                    if let Some(task) = started {
                        in_flight = Some(task);
                    }
                }
                Op::Finish(ok) => {
                    if let Some(task) = in_flight.take() {
                        let outcome = if ok {
                            TaskOutcome::Succeeded(ModuleReport::new("ok"))
                        } else {
                            TaskOutcome::Failed("boom".into())
                        };
                        core.finish_task(&TaskReport { task, outcome, finished_at: Utc::now() });
                    }
                }
                Op::EndCooldown => {
                    if in_flight.is_none() {
                        core.end_cooldown();
                    }
                }
                Op::SmartTick { farm_ready } => {
                    let snapshot = cache(farm_ready);
                    for id in core.smart_due_accounts(now) {
                        let a = ACCOUNTS.iter().position(|x| *x == id).unwrap_or(0);
                        let before = core.queue().iter().filter(|t| t.account_id == id && t.module == ModuleType::Farm).count();
                        core.apply_smart_check(&id, Some(&snapshot), now, Utc::now());
                        let after = core.queue().iter().filter(|t| t.account_id == id && t.module == ModuleType::Farm).count();

                        if farm_ready {
                            let allowed = smart_farm[a]
                                .is_none_or(|last| now.duration_since(last) >= Duration::from_secs(300));
                            if allowed {
                                smart_farm[a] = Some(now);
                            } else {
                                prop_assert_eq!(before, after, "farm enqueued inside the suppression window");
                            }
                        } else {
                            prop_assert_eq!(before, after);
                        }
                    }
                }
            }

            // At most one task in flight, and the core agrees with us.
            prop_assert_eq!(core.current_task().map(|t| t.id), in_flight.as_ref().map(|t| t.id));
            if in_flight.is_some() {
                prop_assert!(core.is_processing());
            }

            // No duplicate keys in the queue.
            let mut keys = HashSet::new();
            for t in core.queue().iter() {
                prop_assert!(keys.insert((t.account_id.clone(), t.module)), "duplicate queued task {:?}", t);
            }

            // Inactive accounts never show up in the status snapshot.
            let status = core.status(true);
            for id in ACCOUNTS {
                if !core.is_active(id) {
                    prop_assert!(status.account(id).is_none());
                }
            }
        }
    }
}
