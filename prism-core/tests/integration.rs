//! Integration Tests for the Memoization Engine
//!
//! These tests exercise the full read path: store updates, view cache,
//! derivation nodes, and the tracking context working together.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use prism_core::{computed, untrack, watch, watch_with, Field, Store, Value};

fn counter() -> Arc<AtomicI32> {
    Arc::new(AtomicI32::new(0))
}

fn int(value: &Value) -> i64 {
    value.as_int().expect("expected an integer")
}

/// Two reads of the same view invoke the computation at most once.
#[test]
fn identity_fast_path() {
    let calls = counter();

    let calls_clone = calls.clone();
    let store = Store::new([
        ("a", Field::from(1)),
        (
            "squared",
            computed(move |s| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                let a = s.get("a")?.as_int().unwrap_or(0);
                Ok(Value::from(a * a))
            }),
        ),
    ]);

    let view = store.state();
    assert_eq!(int(&view.get("squared").unwrap()), 1);
    assert_eq!(int(&view.get("squared").unwrap()), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A second `state()` call yields the same view identity, so the fast
    // path still applies.
    assert_eq!(int(&store.state().get("squared").unwrap()), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A derivation reading only `a` never recomputes on updates to an
/// unrelated field, however many there are.
#[test]
fn dependency_minimality() {
    let calls = counter();

    let calls_clone = calls.clone();
    let store = Store::new([
        ("a", Field::from(10)),
        ("c", Field::from(0)),
        (
            "doubled",
            computed(move |s| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(s.get("a")?.as_int().unwrap_or(0) * 2))
            }),
        ),
    ]);

    assert_eq!(int(&store.state().get("doubled").unwrap()), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for i in 0..5 {
        store.set_state([("c", i)]);
        assert_eq!(int(&store.state().get("doubled").unwrap()), 20);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.set_state([("a", 7)]);
    assert_eq!(int(&store.state().get("doubled").unwrap()), 14);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// With `b = f(base)` and `c = g(b)`, updating `base` recomputes each of
/// them exactly once; updating an unrelated field recomputes neither.
#[test]
fn chained_derivations() {
    let f_calls = counter();
    let g_calls = counter();

    let f_clone = f_calls.clone();
    let g_clone = g_calls.clone();
    let store = Store::new([
        ("base", Field::from(5)),
        ("other", Field::from(0)),
        (
            "b",
            computed(move |s| {
                f_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(s.get("base")?.as_int().unwrap_or(0) * 2))
            }),
        ),
        (
            "c",
            computed(move |s| {
                g_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(s.get("b")?.as_int().unwrap_or(0) + 10))
            }),
        ),
    ]);

    assert_eq!(int(&store.state().get("c").unwrap()), 20);
    assert_eq!(f_calls.load(Ordering::SeqCst), 1);
    assert_eq!(g_calls.load(Ordering::SeqCst), 1);

    store.set_state([("base", 10)]);
    assert_eq!(int(&store.state().get("c").unwrap()), 30);
    assert_eq!(int(&store.state().get("b").unwrap()), 20);
    assert_eq!(f_calls.load(Ordering::SeqCst), 2);
    assert_eq!(g_calls.load(Ordering::SeqCst), 2);

    store.set_state([("other", 99)]);
    assert_eq!(int(&store.state().get("c").unwrap()), 30);
    assert_eq!(int(&store.state().get("b").unwrap()), 20);
    assert_eq!(f_calls.load(Ordering::SeqCst), 2);
    assert_eq!(g_calls.load(Ordering::SeqCst), 2);
}

/// A derivation branching on a flag tracks only the branch it actually
/// read, and switches its recorded set when the flag flips.
#[test]
fn conditional_dependencies() {
    let calls = counter();

    let calls_clone = calls.clone();
    let pick = computed(move |s| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        if s.get("flag")?.as_bool().unwrap_or(false) {
            s.get("x").map_err(Into::into)
        } else {
            s.get("y").map_err(Into::into)
        }
    });
    let node = match &pick {
        Field::Computed(node) => node.clone(),
        _ => unreachable!(),
    };

    let store = Store::new([
        ("flag", Field::from(true)),
        ("x", Field::from(1)),
        ("y", Field::from(2)),
        ("pick", pick),
    ]);

    assert_eq!(int(&store.state().get("pick").unwrap()), 1);
    let deps: Vec<String> = node
        .last_dependencies()
        .unwrap()
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(deps, vec!["flag", "x"]);

    // The unread branch is not a dependency.
    store.set_state([("y", 20)]);
    assert_eq!(int(&store.state().get("pick").unwrap()), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Flipping the flag recomputes and swaps the tracked branch.
    store.set_state([("flag", false)]);
    assert_eq!(int(&store.state().get("pick").unwrap()), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let deps: Vec<String> = node
        .last_dependencies()
        .unwrap()
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(deps, vec!["flag", "y"]);

    // The formerly tracked branch is now unread.
    store.set_state([("x", 100)]);
    assert_eq!(int(&store.state().get("pick").unwrap()), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    store.set_state([("y", 30)]);
    assert_eq!(int(&store.state().get("pick").unwrap()), 30);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// A field read via `untrack` is not a dependency: the derivation returns
/// its stale cached value when only that field changes.
#[test]
fn untrack_exclusion() {
    let calls = counter();

    let calls_clone = calls.clone();
    let store = Store::new([
        ("a", Field::from(1)),
        ("b", Field::from(10)),
        (
            "combo",
            computed(move |s| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                let a = s.get("a")?.as_int().unwrap_or(0);
                let b = untrack(|| s.get("b"))?.as_int().unwrap_or(0);
                Ok(Value::from(a + b))
            }),
        ),
    ]);

    assert_eq!(int(&store.state().get("combo").unwrap()), 11);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Only `b` changes: the cached value is stale but still returned.
    store.set_state([("b", 100)]);
    assert_eq!(int(&store.state().get("combo").unwrap()), 11);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A change to `a` recomputes, and the new `b` is picked up with it.
    store.set_state([("a", 2)]);
    assert_eq!(int(&store.state().get("combo").unwrap()), 102);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A derivation resolved inside an `untrack` scope still tracks its own
/// dependencies correctly; only the outer record is shielded.
#[test]
fn untrack_does_not_break_nested_derivations() {
    let inner_calls = counter();
    let outer_calls = counter();

    let inner_clone = inner_calls.clone();
    let outer_clone = outer_calls.clone();
    let store = Store::new([
        ("a", Field::from(1)),
        ("b", Field::from(10)),
        (
            "inner",
            computed(move |s| {
                inner_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(s.get("b")?.as_int().unwrap_or(0) * 2))
            }),
        ),
        (
            "outer",
            computed(move |s| {
                outer_clone.fetch_add(1, Ordering::SeqCst);
                let a = s.get("a")?.as_int().unwrap_or(0);
                let inner = untrack(|| s.get("inner"))?.as_int().unwrap_or(0);
                Ok(Value::from(a + inner))
            }),
        ),
    ]);

    assert_eq!(int(&store.state().get("outer").unwrap()), 21);
    assert_eq!(outer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(inner_calls.load(Ordering::SeqCst), 1);

    // `b` changes: the outer derivation does not care, but `inner` read
    // directly still recomputes with its own correct dependencies.
    store.set_state([("b", 20)]);
    assert_eq!(int(&store.state().get("outer").unwrap()), 21);
    assert_eq!(outer_calls.load(Ordering::SeqCst), 1);

    assert_eq!(int(&store.state().get("inner").unwrap()), 40);
    assert_eq!(inner_calls.load(Ordering::SeqCst), 2);
}

/// A watch field with a structural equality recomputes only when the
/// selected fields change, regardless of other state churn.
#[test]
fn watch_with_custom_equality() {
    let calls = counter();

    let calls_clone = calls.clone();
    let store = Store::new([
        ("a", Field::from(1)),
        ("b", Field::from(2)),
        ("c", Field::from(0)),
        (
            "sum",
            watch_with(
                |s| Ok(Value::from(vec![s.get("a")?, s.get("b")?])),
                move |selection| {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    let items = selection.as_list().expect("selection is a list");
                    let total: i64 = items.iter().filter_map(Value::as_int).sum();
                    Ok(Value::from(total))
                },
                // The selector allocates a fresh list each run, so identity
                // equality would never match; compare structurally.
                |prev, next| prev.deep_eq(next),
            ),
        ),
    ]);

    assert_eq!(int(&store.state().get("sum").unwrap()), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Unselected churn does not recompute.
    for i in 0..3 {
        store.set_state([("c", i)]);
        assert_eq!(int(&store.state().get("sum").unwrap()), 3);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.set_state([("b", 5)]);
    assert_eq!(int(&store.state().get("sum").unwrap()), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A computed field that reads a watch field depends on its resolved
/// output, so it invalidates when the watched selection changes and not
/// otherwise.
#[test]
fn watch_composes_with_computed() {
    let outer_calls = counter();

    let outer_clone = outer_calls.clone();
    let store = Store::new([
        ("a", Field::from(2)),
        ("noise", Field::from(0)),
        (
            "selected",
            // Default equality suffices: the selection is a scalar.
            watch(
                |s| s.get("a").map_err(Into::into),
                |selection| Ok(Value::from(selection.as_int().unwrap_or(0) * 10)),
            ),
        ),
        (
            "outer",
            computed(move |s| {
                outer_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(s.get("selected")?.as_int().unwrap_or(0) + 1))
            }),
        ),
    ]);

    assert_eq!(int(&store.state().get("outer").unwrap()), 21);
    assert_eq!(outer_calls.load(Ordering::SeqCst), 1);

    store.set_state([("noise", 1)]);
    assert_eq!(int(&store.state().get("outer").unwrap()), 21);
    assert_eq!(outer_calls.load(Ordering::SeqCst), 1);

    store.set_state([("a", 3)]);
    assert_eq!(int(&store.state().get("outer").unwrap()), 31);
    assert_eq!(outer_calls.load(Ordering::SeqCst), 2);
}

/// The concrete scenario: `{a: 1, squared: computed(a * a)}`.
#[test]
fn squared_scenario_with_listener() {
    let calls = counter();

    let calls_clone = calls.clone();
    let store = Store::new([
        ("a", Field::from(1)),
        (
            "squared",
            computed(move |s| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                let a = s.get("a")?.as_int().unwrap_or(0);
                Ok(Value::from(a * a))
            }),
        ),
    ]);

    let seen = Arc::new(RwLock::new(Vec::new()));
    let seen_clone = seen.clone();
    store.subscribe(move |next, prev| {
        seen_clone.write().unwrap().push((
            int(&next.get("a").unwrap()),
            int(&next.get("squared").unwrap()),
            int(&prev.get("a").unwrap()),
            int(&prev.get("squared").unwrap()),
        ));
    });

    // Two reads, one computation.
    assert_eq!(int(&store.state().get("squared").unwrap()), 1);
    assert_eq!(int(&store.state().get("squared").unwrap()), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.set_state([("a", 3)]);
    assert_eq!(int(&store.state().get("squared").unwrap()), 9);

    // The listener saw ({a: 3, squared: 9}, {a: 1, squared: 1}).
    assert_eq!(*seen.read().unwrap(), vec![(3, 9, 1, 1)]);
}

/// A failed computation caches nothing: the error propagates, and the next
/// read re-attempts from scratch.
#[test]
fn failed_compute_is_not_cached() {
    let calls = counter();

    let calls_clone = calls.clone();
    let root = computed(move |s| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        let a = s.get("a")?.as_int().unwrap_or(0);
        if a < 0 {
            return Err("negative input".into());
        }
        Ok(Value::from(a * a))
    });
    let node = match &root {
        Field::Computed(node) => node.clone(),
        _ => unreachable!(),
    };

    let store = Store::new([("a", Field::from(-1)), ("root", root)]);

    assert!(store.state().get("root").is_err());
    assert!(!node.has_cached());

    // Same snapshot, second read: re-attempted, not served from a cache.
    assert!(store.state().get("root").is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    store.set_state([("a", 4)]);
    assert_eq!(int(&store.state().get("root").unwrap()), 16);
    assert!(node.has_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Only resolved values cross the view boundary outward: serializing a
/// resolved snapshot shows plain values, no node wrappers.
#[test]
fn serialization_sees_only_resolved_values() {
    let store = Store::new([
        ("a", Field::from(3)),
        (
            "squared",
            computed(|s| {
                let a = s.get("a")?.as_int().unwrap_or(0);
                Ok(Value::from(a * a))
            }),
        ),
    ]);

    let resolved = store.state().to_value().unwrap();
    let json = serde_json::to_string(&resolved).unwrap();
    assert_eq!(json, r#"{"a":3,"squared":9}"#);
}

/// Replacing a derived field with a plain value is a plain merge; the old
/// derivation simply stops existing.
#[test]
fn plain_value_can_replace_a_derivation() {
    let store = Store::new([
        ("a", Field::from(1)),
        (
            "squared",
            computed(|s| {
                let a = s.get("a")?.as_int().unwrap_or(0);
                Ok(Value::from(a * a))
            }),
        ),
    ]);

    assert_eq!(int(&store.state().get("squared").unwrap()), 1);

    store.set_state([("squared", 42)]);
    assert_eq!(int(&store.state().get("squared").unwrap()), 42);

    store.set_state([("a", 5)]);
    assert_eq!(int(&store.state().get("squared").unwrap()), 42);
}
