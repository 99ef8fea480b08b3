use std::panic;
use std::sync::{Arc, Barrier};
use std::thread;

use mdc::propagation::{inherit, spawn, spawn_with};
use mdc::Snapshot;

#[test]
fn worker_inherits_trace_but_not_later_writes() {
    mdc::clear();
    mdc::put("traceId", "abc123");

    let worker = spawn(|| {
        let trace_id = mdc::get("traceId");
        mdc::put("spanId", "s1");

        (trace_id, mdc::get("traceId"), mdc::get("spanId"))
    });

    let (seen_trace_id, trace_id, span_id) = worker.join().unwrap();

    assert_eq!(seen_trace_id.as_deref(), Some("abc123"));
    assert_eq!(trace_id.as_deref(), Some("abc123"));
    assert_eq!(span_id.as_deref(), Some("s1"));

    assert_eq!(mdc::get("spanId"), None);
    assert_eq!(mdc::get("traceId").as_deref(), Some("abc123"));
}

#[test]
fn parent_writes_after_spawn_are_not_seen() {
    mdc::clear();
    mdc::put("a", "1");

    let spawned = Arc::new(Barrier::new(2));
    let written = Arc::new(Barrier::new(2));

    let worker = {
        let spawned = spawned.clone();
        let written = written.clone();

        spawn(move || {
            spawned.wait();
            written.wait();

            mdc::put("b", "x");
            mdc::get("a")
        })
    };

    spawned.wait();
    mdc::put("a", "2");
    written.wait();

    assert_eq!(worker.join().unwrap().as_deref(), Some("1"));
    assert_eq!(mdc::get("a").as_deref(), Some("2"));
    assert_eq!(mdc::get("b"), None);
}

#[test]
fn siblings_from_one_snapshot_stay_independent() {
    let snapshot: Snapshot = [("t", "abc")].into_iter().collect();
    let barrier = Arc::new(Barrier::new(2));

    let workers = ["X", "Y"].map(|who| {
        let snapshot = snapshot.clone();
        let barrier = barrier.clone();

        thread::spawn(move || {
            mdc::restore(&snapshot);
            barrier.wait();

            mdc::put("who", who);
            barrier.wait();

            (mdc::get("who"), mdc::get("t"))
        })
    });

    let [x, y] = workers.map(|worker| worker.join().unwrap());

    assert_eq!(x, (Some("X".to_owned()), Some("abc".to_owned())));
    assert_eq!(y, (Some("Y".to_owned()), Some("abc".to_owned())));
    assert!(!snapshot.contains_key("who"));
}

#[test]
fn worker_of_thread_without_context_has_none() {
    mdc::clear();

    let worker = spawn(mdc::snapshot);

    assert!(worker.join().unwrap().is_none());
}

#[test]
fn empty_context_is_inherited_as_present() {
    mdc::clear();
    mdc::restore(&Snapshot::new());

    let worker = spawn(mdc::snapshot);
    let inherited = worker.join().unwrap();

    assert!(inherited.is_some_and(|snapshot| snapshot.is_empty()));
}

#[test]
fn spawn_with_builder_inherits() {
    mdc::clear();
    mdc::put("traceId", "abc123");

    let worker = spawn_with(thread::Builder::new().name("mdc-worker".into()), || {
        (thread::current().name().map(str::to_owned), mdc::get("traceId"))
    })
    .unwrap();

    let (name, trace_id) = worker.join().unwrap();
    assert_eq!(name.as_deref(), Some("mdc-worker"));
    assert_eq!(trace_id.as_deref(), Some("abc123"));
}

#[test]
fn pooled_thread_gets_its_own_context_back() {
    mdc::clear();
    mdc::put("traceId", "submitter");
    let task = inherit(|| mdc::get("traceId"));

    // simulate the task running later on a pool thread that has its own context
    let pool_thread = thread::spawn(move || {
        mdc::put("worker", "pool-1");

        let seen = task();

        (seen, mdc::get("traceId"), mdc::get("worker"))
    });

    let (seen, after, worker) = pool_thread.join().unwrap();
    assert_eq!(seen.as_deref(), Some("submitter"));
    assert_eq!(after, None);
    assert_eq!(worker.as_deref(), Some("pool-1"));
}

#[test]
fn context_is_reinstated_after_panic() {
    mdc::clear();
    mdc::put("traceId", "submitter");
    let task = inherit(|| panic!("task failed"));

    mdc::clear();
    mdc::put("worker", "pool-1");

    let result = panic::catch_unwind(task);

    assert!(result.is_err());
    assert_eq!(mdc::get("traceId"), None);
    assert_eq!(mdc::get("worker").as_deref(), Some("pool-1"));
}
