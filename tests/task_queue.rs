use chrono::Utc;
use proptest::prelude::*;

use farmhand::engine::TaskQueue;
use farmhand::types::{ModuleType, Task};

fn task(id: u64, account: &str, module: ModuleType) -> Task {
    Task {
        id,
        account_id: account.to_string(),
        module,
        created_at: Utc::now(),
    }
}

#[test]
fn duplicate_key_is_a_noop() {
    let mut q = TaskQueue::new();

    assert!(q.insert_if_absent(task(1, "alice", ModuleType::Farm)));
    assert!(!q.insert_if_absent(task(2, "alice", ModuleType::Farm)));
    assert!(q.insert_if_absent(task(3, "alice", ModuleType::Forestry)));
    assert!(q.insert_if_absent(task(4, "bob", ModuleType::Farm)));

    let ids: Vec<u64> = q.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 3, 4], "first instance wins, order preserved");
}

#[test]
fn key_can_be_requeued_once_popped() {
    let mut q = TaskQueue::new();
    q.insert_if_absent(task(1, "alice", ModuleType::Farm));

    let head = q.pop_front().expect("head");
    assert_eq!(head.id, 1);
    assert!(q.insert_if_absent(task(2, "alice", ModuleType::Farm)));
    assert_eq!(q.len(), 1);
}

#[test]
fn remove_account_keeps_other_accounts_in_order() {
    let mut q = TaskQueue::new();
    q.insert_if_absent(task(1, "alice", ModuleType::Farm));
    q.insert_if_absent(task(2, "bob", ModuleType::Farm));
    q.insert_if_absent(task(3, "alice", ModuleType::Stalls));
    q.insert_if_absent(task(4, "carol", ModuleType::Forestry));

    assert_eq!(q.remove_account("alice"), 2);
    assert!(q.for_account("alice").is_empty());

    let ids: Vec<u64> = q.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2, 4]);
    assert_eq!(q.remove_account("nobody"), 0);
}

#[test]
fn removed_and_cleared_keys_can_be_queued_again() {
    let mut q = TaskQueue::new();
    q.insert_if_absent(task(1, "alice", ModuleType::Farm));
    q.insert_if_absent(task(2, "bob", ModuleType::Farm));

    q.remove_account("alice");
    assert!(!q.contains("alice", ModuleType::Farm));
    assert!(q.contains("bob", ModuleType::Farm));
    assert!(q.insert_if_absent(task(3, "alice", ModuleType::Farm)));

    q.clear();
    assert!(q.is_empty());
    assert!(!q.contains("bob", ModuleType::Farm));
    assert!(q.insert_if_absent(task(4, "bob", ModuleType::Farm)));
    assert_eq!(q.len(), 1);
}

#[test]
fn for_account_lists_in_queue_order() {
    let mut q = TaskQueue::new();
    q.insert_if_absent(task(1, "alice", ModuleType::Stalls));
    q.insert_if_absent(task(2, "bob", ModuleType::Farm));
    q.insert_if_absent(task(3, "alice", ModuleType::Farm));

    let modules: Vec<ModuleType> = q.for_account("alice").iter().map(|t| t.module).collect();
    assert_eq!(modules, vec![ModuleType::Stalls, ModuleType::Farm]);
}

fn module_strategy() -> impl Strategy<Value = ModuleType> {
    prop_oneof![
        Just(ModuleType::Farm),
        Just(ModuleType::Forestry),
        Just(ModuleType::Stalls),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Insert(usize, ModuleType),
    Pop,
    RemoveAccount(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..3usize, module_strategy()).prop_map(|(a, m)| Op::Insert(a, m)),
        2 => Just(Op::Pop),
        1 => (0..3usize).prop_map(Op::RemoveAccount),
    ]
}

const ACCOUNTS: [&str; 3] = ["alice", "bob", "carol"];

proptest! {
    #[test]
    fn never_holds_two_tasks_with_the_same_key(ops in proptest::collection::vec(op_strategy(), 0..200)) {
        let mut q = TaskQueue::new();
        let mut next_id = 0;

        for op in ops {
            match op {
                Op::Insert(a, m) => {
                    next_id += 1;
                    q.insert_if_absent(task(next_id, ACCOUNTS[a], m));
                }
                Op::Pop => {
                    q.pop_front();
                }
                Op::RemoveAccount(a) => {
                    q.remove_account(ACCOUNTS[a]);
                    prop_assert!(q.for_account(ACCOUNTS[a]).is_empty());
                }
            }

            for account in ACCOUNTS {
                for module in ModuleType::ALL {
                    let n = q.iter().filter(|t| t.account_id == account && t.module == module).count();
                    prop_assert!(n <= 1, "{account}/{module} queued {n} times");
                    prop_assert_eq!(q.contains(account, module), n == 1);
                }
            }
            prop_assert!(q.len() <= ACCOUNTS.len() * ModuleType::ALL.len());
        }
    }

    #[test]
    fn ids_leave_in_insertion_order(ops in proptest::collection::vec((0..3usize, module_strategy()), 1..50)) {
        let mut q = TaskQueue::new();
        for (i, (a, m)) in ops.into_iter().enumerate() {
            q.insert_if_absent(task(i as u64, ACCOUNTS[a], m));
        }

        let mut last = None;
        while let Some(t) = q.pop_front() {
            if let Some(prev) = last {
                prop_assert!(t.id > prev);
            }
            last = Some(t.id);
        }
    }
}
