// ==============================================
// BLACK-BOX CACHE BEHAVIOR (integration)
// ==============================================
//
// End-to-end scenarios against the public API. The processor runs on its
// own thread, so these tests quiesce through the insertion/removal
// listeners instead of sleeping: every processed write produces one
// insertion signal, every removal one removal signal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cachette::{CacheBuilder, EvictionPolicy, MockClock, Stats};
use crossbeam_channel::{unbounded, Receiver, Sender};

const WAIT: Duration = Duration::from_secs(10);

fn signal_pair() -> (Sender<()>, Receiver<()>) {
    unbounded()
}

fn await_signals(rx: &Receiver<()>, count: usize) {
    for i in 0..count {
        rx.recv_timeout(WAIT)
            .unwrap_or_else(|_| panic!("timed out waiting for signal {}/{count}", i + 1));
    }
}

// ==============================================
// Scenario: basic put/get
// ==============================================

#[test]
fn basic_put_get() {
    let (tx, inserted) = signal_pair();
    let cache = CacheBuilder::new()
        .on_insertion(move |_k: &String, _v| {
            let _ = tx.send(());
        })
        .build();

    cache.put("1".to_string(), 1);
    cache.put("2".to_string(), 2);
    await_signals(&inserted, 2);

    assert_eq!(cache.get_if_present(&"1".to_string()).as_deref(), Some(&1));
    assert_eq!(cache.get_if_present(&"2".to_string()).as_deref(), Some(&2));

    let mut stats = Stats::default();
    cache.stats(&mut stats);
    assert_eq!(stats.hit_count, 2);
    assert_eq!(stats.miss_count, 0);
    cache.close();
}

// ==============================================
// Scenario: capacity-bound eviction
// ==============================================

#[test]
fn lru_capacity_eviction_notifies_removal() {
    let (tx, inserted) = signal_pair();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let removed_sink = Arc::clone(&removed);

    let cache = CacheBuilder::new()
        .maximum_size(3)
        .policy(EvictionPolicy::Lru)
        .on_removal(move |k: &u64, v: &u64| removed_sink.lock().unwrap().push((*k, *v)))
        .on_insertion(move |_k, _v| {
            let _ = tx.send(());
        })
        .build();

    for key in 1..=4_u64 {
        cache.put(key, key);
    }
    await_signals(&inserted, 4);

    assert_eq!(cache.len(), 3);
    assert_eq!(removed.lock().unwrap().as_slice(), &[(1, 1)]);

    let mut stats = Stats::default();
    cache.stats(&mut stats);
    assert_eq!(stats.eviction_count, 1);
    cache.close();
}

// ==============================================
// Scenario: expire-after-access
// ==============================================

#[test]
fn expire_after_access_sweeps_idle_entries() {
    let clock = Arc::new(MockClock::new());
    let (ins_tx, inserted) = signal_pair();
    let (rem_tx, removed) = signal_pair();

    let cache = CacheBuilder::new()
        .expire_after_access(Duration::from_secs(1))
        .clock(Arc::clone(&clock) as _)
        .on_insertion(move |_k: &u64, _v: &u64| {
            let _ = ins_tx.send(());
        })
        .on_removal(move |_k: &u64, _v: &u64| {
            let _ = rem_tx.send(());
        })
        .build();

    cache.put(1, 1);
    await_signals(&inserted, 1);

    clock.advance(Duration::from_secs(1));
    cache.put(2, 2);
    cache.put(3, 3);
    await_signals(&inserted, 2);
    // Entry 1 sits exactly at its horizon: still alive.
    assert_eq!(cache.len(), 3);

    clock.advance_nanos(1);
    cache.put(4, 4);
    // The insertion signal precedes the sweep; the eviction of entry 1 is
    // the quiescence point here.
    await_signals(&inserted, 1);
    await_signals(&removed, 1);

    assert_eq!(cache.get_if_present(&1), None);
    assert_eq!(cache.len(), 3);
    cache.close();
}

#[test]
fn expire_after_write_sweeps_stale_writes() {
    let clock = Arc::new(MockClock::new());
    let (tx, inserted) = signal_pair();

    let cache = CacheBuilder::new()
        .expire_after_write(Duration::from_secs(2))
        .clock(Arc::clone(&clock) as _)
        .on_insertion(move |_k: &u64, _v: &u64| {
            let _ = tx.send(());
        })
        .build();

    cache.put(1, 1);
    await_signals(&inserted, 1);

    clock.advance(Duration::from_secs(3));
    // Reads do not push the write horizon.
    assert_eq!(cache.get_if_present(&1), None, "stale write must not be served");

    cache.put(2, 2);
    await_signals(&inserted, 1);
    assert_eq!(cache.len(), 1);
    cache.close();
}

// ==============================================
// Scenario: invalidate / invalidate-all
// ==============================================

#[test]
fn invalidate_then_get_returns_none() {
    let (tx, inserted) = signal_pair();
    let cache = CacheBuilder::new()
        .on_insertion(move |_k: &u64, _v: &u64| {
            let _ = tx.send(());
        })
        .build();

    cache.put(1, 1);
    await_signals(&inserted, 1);

    cache.invalidate(&1);
    assert_eq!(cache.get_if_present(&1), None);
    cache.close();
}

#[test]
fn invalidate_all_notifies_each_entry_exactly_once() {
    let (ins_tx, inserted) = signal_pair();
    let (rem_tx, removed_signal) = signal_pair();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let removed_sink = Arc::clone(&removed);

    let cache = CacheBuilder::new()
        .on_removal(move |k: &u64, v: &u64| {
            removed_sink.lock().unwrap().push((*k, *v));
            let _ = rem_tx.send(());
        })
        .on_insertion(move |_k, _v| {
            let _ = ins_tx.send(());
        })
        .build();

    for key in 1..=3_u64 {
        cache.put(key, key);
    }
    await_signals(&inserted, 3);

    cache.invalidate_all();
    await_signals(&removed_signal, 3);

    let mut notifications = removed.lock().unwrap().clone();
    notifications.sort_unstable();
    assert_eq!(notifications, vec![(1, 1), (2, 2), (3, 3)]);
    assert_eq!(cache.len(), 0);
    for key in 1..=3_u64 {
        assert_eq!(cache.get_if_present(&key), None);
    }
    cache.close();
}

// ==============================================
// Scenario: concurrent close
// ==============================================

#[test]
fn close_is_idempotent_across_threads() {
    let (tx, inserted) = signal_pair();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let removed_sink = Arc::clone(&removed);

    let cache = Arc::new(
        CacheBuilder::new()
            .on_removal(move |k: &u64, v: &u64| removed_sink.lock().unwrap().push((*k, *v)))
            .on_insertion(move |_k, _v| {
                let _ = tx.send(());
            })
            .build(),
    );
    for key in 0..5_u64 {
        cache.put(key, key);
    }
    await_signals(&inserted, 5);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || cache.close()));
    }
    for handle in handles {
        handle.join().expect("close must not panic");
    }

    // Each entry was removed exactly once by the single close drain.
    let mut keys: Vec<u64> = removed.lock().unwrap().iter().map(|(k, _)| *k).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![0, 1, 2, 3, 4]);

    assert_eq!(cache.get_if_present(&1), None);
    cache.put(9, 9);
    cache.invalidate(&9);
    assert_eq!(cache.len(), 0);
}

// ==============================================
// Quiescent-state invariants
// ==============================================

#[test]
fn directory_never_exceeds_capacity_at_quiescence() {
    for policy in [
        EvictionPolicy::Lru,
        EvictionPolicy::Slru,
        EvictionPolicy::TinyLfu,
    ] {
        let (tx, inserted) = signal_pair();
        let cache = CacheBuilder::new()
            .maximum_size(10)
            .policy(policy)
            .on_insertion(move |_k: &u64, _v: &u64| {
                let _ = tx.send(());
            })
            .build();

        for key in 0..100_u64 {
            cache.put(key, key);
        }
        await_signals(&inserted, 100);

        assert_eq!(cache.len(), 10, "policy {policy:?}");
        cache.close();
    }
}

#[test]
fn overwrite_is_visible_before_quiescence() {
    let cache = CacheBuilder::new().build();
    for round in 0..100_u64 {
        cache.put(7_u64, round);
        assert_eq!(cache.get_if_present(&7).as_deref(), Some(&round));
    }
    cache.close();
}

#[test]
fn hits_and_misses_add_up() {
    let (tx, inserted) = signal_pair();
    let cache = CacheBuilder::new()
        .on_insertion(move |_k: &u64, _v: &u64| {
            let _ = tx.send(());
        })
        .build();

    for key in 0..10_u64 {
        cache.put(key, key);
    }
    await_signals(&inserted, 10);

    for key in 0..20_u64 {
        let _ = cache.get_if_present(&key);
    }

    let mut stats = Stats::default();
    cache.stats(&mut stats);
    assert_eq!(stats.hit_count, 10);
    assert_eq!(stats.miss_count, 10);
    assert_eq!(stats.request_count(), 20);
    assert_eq!(stats.hit_rate(), 0.5);
    cache.close();
}

#[test]
fn concurrent_writers_and_readers_do_not_lose_updates() {
    let cache = Arc::new(
        CacheBuilder::new()
            .maximum_size(0)
            .policy(EvictionPolicy::Lru)
            .build(),
    );

    let mut handles = Vec::new();
    for t in 0..4_u64 {
        let cache = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || {
            for i in 0..500_u64 {
                let key = t * 1000 + i;
                cache.put(key, key);
                assert_eq!(cache.get_if_present(&key).as_deref(), Some(&key));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.len(), 2000);
    cache.close();
}
