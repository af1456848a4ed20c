//! Integration Tests for Reactive System
//!
//! These tests verify that reactive objects, computed cells, and effects work
//! together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;

use ripple_core::graph::Key;
use ripple_core::reactive::{ReactiveContext, Runtime};
use ripple_core::{
    derive_computed, reactive, subscribe, wrap_reactive, Computed, ComputedSource, Effect,
    EffectOptions, Target, Value,
};

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

fn bump(count: &Cell<usize>) {
    count.set(count.get() + 1);
}

/// Writing a key re-runs only the effects that read that key.
#[test]
fn effect_reruns_only_for_keys_it_read() {
    let state = reactive(&Target::from(json!({ "name": "a", "age": 1 })));
    let runs = counter();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let reader = state.clone();
    let (runs_clone, seen_clone) = (runs.clone(), seen.clone());
    let _effect = Effect::new(move || {
        bump(&runs_clone);
        seen_clone.borrow_mut().push(reader.get("name").to_string());
    });

    // Effect runs on creation
    assert_eq!(runs.get(), 1);

    state.set("name", "b").unwrap();
    assert_eq!(runs.get(), 2);

    // "age" was never read by the effect
    state.set("age", 2).unwrap();
    assert_eq!(runs.get(), 2);

    assert_eq!(*seen.borrow(), vec!["a", "b"]);
}

/// Wrapping the same object twice yields the same handle.
#[test]
fn wrapping_twice_returns_same_handle() {
    let target = Target::from(json!({ "x": 1 }));
    let first = reactive(&target);
    let second = reactive(&target);

    assert!(first.ptr_eq(&second));

    // Primitives pass through untouched
    assert_eq!(wrap_reactive(Value::from(7)), Value::from(7));
    assert_eq!(wrap_reactive(Value::from(target)), Value::Reactive(first));
}

/// An effect that writes a key it reads does not recurse.
#[test]
fn self_writing_effect_does_not_loop() {
    let state = reactive(&Target::from(json!({ "count": 0 })));
    let runs = counter();

    let inner = state.clone();
    let runs_clone = runs.clone();
    let _effect = Effect::new(move || {
        bump(&runs_clone);
        let count = inner.get("count").as_f64().unwrap_or(0.0);
        inner.set("count", count + 1.0).unwrap();
    });

    assert_eq!(runs.get(), 1);
    assert_eq!(state.raw().get("count"), Value::from(1));

    // An outside write re-runs it exactly once more
    state.set("count", 10).unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(state.raw().get("count"), Value::from(11));
    assert!(!ReactiveContext::is_active());
}

/// A computed getter runs lazily and at most once between reads.
#[test]
fn computed_is_lazy_and_cached() {
    let state = reactive(&Target::from(json!({ "name": "a" })));
    let calls = counter();

    let reader = state.clone();
    let calls_clone = calls.clone();
    let shout = derive_computed(move || {
        bump(&calls_clone);
        format!("{}!", reader.get("name"))
    });

    // Not computed yet
    assert_eq!(calls.get(), 0);

    assert_eq!(shout.value(), "a!");
    assert_eq!(shout.value(), "a!");
    assert_eq!(calls.get(), 1);

    state.set("name", "b").unwrap();
    assert_eq!(calls.get(), 1);

    assert_eq!(shout.value(), "b!");
    assert_eq!(calls.get(), 2);
}

/// Two upstream writes before a read cost one recompute.
#[test]
fn computed_coalesces_invalidations() {
    let state = reactive(&Target::from(json!({ "first": "a", "last": "b" })));
    let calls = counter();

    let reader = state.clone();
    let calls_clone = calls.clone();
    let full = Computed::new(move || {
        bump(&calls_clone);
        format!("{} {}", reader.get("first"), reader.get("last"))
    });
    assert_eq!(full.value(), "a b");

    state.set("first", "x").unwrap();
    state.set("last", "y").unwrap();

    assert_eq!(full.value(), "x y");
    assert_eq!(calls.get(), 2);
}

/// An effect reading a computed re-runs when the computed's inputs change.
#[test]
fn effect_follows_computed() {
    let state = reactive(&Target::from(json!({ "n": 2 })));

    let reader = state.clone();
    let squared = Computed::new(move || {
        let n = reader.get("n").as_f64().unwrap_or(0.0);
        n * n
    });

    let observed = Rc::new(Cell::new(0.0));
    let observed_clone = observed.clone();
    let cell = squared.clone();
    let effect = subscribe(move || observed_clone.set(cell.value()), EffectOptions::new());

    assert_eq!(observed.get(), 4.0);

    state.set("n", 3).unwrap();
    assert_eq!(observed.get(), 9.0);
    assert_eq!(effect.run_count(), 2);

    // A clean cell still re-notifies on the next change
    state.set("n", 4).unwrap();
    assert_eq!(observed.get(), 16.0);
    assert_eq!(effect.run_count(), 3);
}

/// Computed cells can depend on other computed cells.
#[test]
fn computed_depends_on_computed() {
    let state = reactive(&Target::from(json!({ "base": 5 })));

    let reader = state.clone();
    let doubled = Computed::new(move || reader.get("base").as_f64().unwrap_or(0.0) * 2.0);
    let doubled_clone = doubled.clone();
    let plus_ten = Computed::new(move || doubled_clone.value() + 10.0);

    assert_eq!(doubled.value(), 10.0);
    assert_eq!(plus_ten.value(), 20.0);

    state.set("base", 10).unwrap();

    // Both are invalidated without being read
    assert!(doubled.is_dirty());
    assert!(plus_ten.is_dirty());
    assert_eq!(plus_ten.value(), 30.0);
}

/// Writable computed cells route writes to their setter.
#[test]
fn computed_setter_updates_source() {
    let state = reactive(&Target::from(json!({ "celsius": 0 })));

    let reader = state.clone();
    let writer = state.clone();
    let fahrenheit = derive_computed(ComputedSource::get_set(
        move || reader.get("celsius").as_f64().unwrap_or(0.0) * 9.0 / 5.0 + 32.0,
        move |f: f64| writer.set("celsius", (f - 32.0) * 5.0 / 9.0).unwrap(),
    ));

    assert_eq!(fahrenheit.value(), 32.0);

    fahrenheit.set_value(212.0);
    assert_eq!(state.raw().get("celsius"), Value::from(100));
    assert_eq!(fahrenheit.value(), 212.0);
}

/// Deleting a key removes its dependency set everywhere.
#[test]
fn delete_cleans_up_dependencies() {
    let state = reactive(&Target::from(json!({ "k": 1 })));
    let runs = counter();

    let reader = state.clone();
    let runs_clone = runs.clone();
    let effect = Effect::new(move || {
        bump(&runs_clone);
        reader.get("k");
    });
    assert_eq!(effect.dependency_count(), 1);

    assert!(state.delete("k").unwrap());
    assert_eq!(effect.dependency_count(), 0);
    assert_eq!(Runtime::subscriber_count(state.raw(), &Key::from("k")), 0);

    // Re-adding the key is a write nobody is listening to
    state.set("k", 2).unwrap();
    assert_eq!(runs.get(), 1);
}

/// Nested objects are wrapped on read and track their own keys.
#[test]
fn nested_objects_are_tracked() {
    let state = reactive(&Target::from(json!({ "user": { "name": "a" }, "other": 1 })));
    let runs = counter();

    let reader = state.clone();
    let runs_clone = runs.clone();
    let _effect = Effect::new(move || {
        bump(&runs_clone);
        if let Some(user) = reader.get("user").as_reactive() {
            user.get("name");
        }
    });

    let user = state.get("user");
    let user = user.as_reactive().unwrap();
    user.set("name", "b").unwrap();
    assert_eq!(runs.get(), 2);

    state.set("other", 2).unwrap();
    assert_eq!(runs.get(), 2);

    // Replacing the nested object notifies readers of the outer key
    state.set("user", Target::from(json!({ "name": "c" }))).unwrap();
    assert_eq!(runs.get(), 3);
}

/// Pushing onto an array notifies readers of its length.
#[test]
fn array_push_notifies_length_readers() {
    let list = reactive(&Target::from(json!([1, 2])));
    let lengths = Rc::new(RefCell::new(Vec::new()));

    let reader = list.clone();
    let lengths_clone = lengths.clone();
    let _effect = Effect::new(move || lengths_clone.borrow_mut().push(reader.len()));

    list.push(3).unwrap();
    list.set(5usize, 6).unwrap();
    list.pop().unwrap();

    assert_eq!(*lengths.borrow(), vec![2, 3, 6, 5]);
}

/// Adding a field to an object notifies readers of its keys.
#[test]
fn added_field_notifies_key_readers() {
    let state = reactive(&Target::object());
    let snapshots = Rc::new(RefCell::new(Vec::new()));

    let reader = state.clone();
    let snapshots_clone = snapshots.clone();
    let _effect = Effect::new(move || snapshots_clone.borrow_mut().push(reader.snapshot()));

    state.set("a", 1).unwrap();
    state.set("a", 2).unwrap();

    assert_eq!(
        *snapshots.borrow(),
        vec![json!({}), json!({ "a": 1 }), json!({ "a": 2 })]
    );
}

/// A scheduler replaces direct re-runs.
#[test]
fn scheduler_defers_rerun() {
    let state = reactive(&Target::from(json!({ "n": 0 })));
    let runs = counter();
    let scheduled = counter();

    let reader = state.clone();
    let runs_clone = runs.clone();
    let scheduled_clone = scheduled.clone();
    let effect = subscribe(
        move || {
            bump(&runs_clone);
            reader.get("n");
        },
        EffectOptions::new().scheduler(move || bump(&scheduled_clone)),
    );

    state.set("n", 1).unwrap();
    state.set("n", 2).unwrap();
    assert_eq!(runs.get(), 1);
    assert_eq!(scheduled.get(), 2);

    effect.run();
    assert_eq!(runs.get(), 2);
}

/// A lazy effect does nothing until run.
#[test]
fn lazy_effect_waits_for_run() {
    let state = reactive(&Target::from(json!({ "n": 0 })));
    let runs = counter();

    let reader = state.clone();
    let runs_clone = runs.clone();
    let effect = Effect::new_lazy(move || {
        bump(&runs_clone);
        reader.get("n").as_f64()
    });

    state.set("n", 1).unwrap();
    assert_eq!(runs.get(), 0);

    assert_eq!(effect.run(), Some(Some(1.0)));

    state.set("n", 2).unwrap();
    assert_eq!(runs.get(), 2);
}

/// Test effect disposal stops execution.
#[test]
fn disposed_effect_does_not_run() {
    let state = reactive(&Target::from(json!({ "n": 0 })));
    let runs = counter();

    let reader = state.clone();
    let runs_clone = runs.clone();
    let effect = Effect::new(move || {
        bump(&runs_clone);
        reader.get("n");
    });

    effect.dispose();
    state.set("n", 1).unwrap();
    effect.run();

    assert_eq!(runs.get(), 1);
    assert_eq!(Runtime::subscriber_count(state.raw(), &Key::from("n")), 0);
}

/// A panicking effect leaves the subscriber stack clean.
#[test]
fn panicking_effect_releases_stack() {
    let state = reactive(&Target::from(json!({ "n": 0 })));

    let reader = state.clone();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        Effect::new(move || {
            reader.get("n");
            panic!("effect failed");
        })
    }));

    assert!(result.is_err());
    assert!(!ReactiveContext::is_active());
    assert_eq!(Runtime::current_subscriber(), None);
}

/// Reads outside any effect record nothing.
#[test]
fn untracked_reads_record_nothing() {
    let state = reactive(&Target::from(json!({ "n": 0 })));
    state.get("n");
    state.keys();

    assert!(!Runtime::has_entry(state.raw()));

    // Writing a key nobody read is harmless
    state.set("n", 1).unwrap();
}

/// A write to a fresh object of the same shape does not reach subscribers of
/// a key deleted elsewhere.
#[test]
fn delete_does_not_leak_into_fresh_object() {
    let first = reactive(&Target::from(json!({ "k": 1 })));
    let runs = counter();

    let reader = first.clone();
    let runs_clone = runs.clone();
    let _effect = Effect::new(move || {
        bump(&runs_clone);
        reader.get("k");
    });

    first.delete("k").unwrap();

    let second = reactive(&Target::from(json!({ "k": 1 })));
    second.set("k", 2).unwrap();
    second.delete("k").unwrap();
    second.set("k", 3).unwrap();

    assert_eq!(runs.get(), 1);
}

/// Dropping an effect and the state it captured leaves nothing in the registry.
#[test]
fn dropped_effect_releases_captured_target() {
    let baseline = Runtime::target_count();

    let state = reactive(&Target::from(json!({ "n": 1 })));
    let reader = state.clone();
    let effect = Effect::new(move || {
        reader.get("n");
    });
    assert_eq!(Runtime::target_count(), baseline + 1);

    drop(effect);
    drop(state);

    // Forgotten on drop, not by pruning
    assert_eq!(Runtime::target_count(), baseline);
    assert_eq!(Runtime::prune(), 0);
}

/// An effect stops running once its last handle is gone.
#[test]
fn dropped_effect_stops_running() {
    let state = reactive(&Target::from(json!({ "n": 0 })));
    let runs = counter();

    let reader = state.clone();
    let runs_clone = runs.clone();
    let effect = Effect::new(move || {
        bump(&runs_clone);
        reader.get("n");
    });
    let copy = effect.clone();

    drop(effect);
    state.set("n", 1).unwrap();
    assert_eq!(runs.get(), 2);

    drop(copy);
    state.set("n", 2).unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(Runtime::subscriber_count(state.raw(), &Key::from("n")), 0);
}

/// An effect disposed while a write is notifying does not reach its scheduler.
#[test]
fn effect_disposed_mid_notification_is_skipped() {
    let state = reactive(&Target::from(json!({ "n": 0 })));
    let scheduled = counter();
    let victim: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));

    // Subscribed first, so it is notified first.
    let reader = state.clone();
    let victim_slot = victim.clone();
    let _disposer = Effect::new(move || {
        reader.get("n");
        if let Some(victim) = victim_slot.borrow().as_ref() {
            victim.dispose();
        }
    });

    let reader = state.clone();
    let scheduled_clone = scheduled.clone();
    let scheduled_effect = subscribe(
        move || {
            reader.get("n");
        },
        EffectOptions::new().scheduler(move || bump(&scheduled_clone)),
    );
    *victim.borrow_mut() = Some(scheduled_effect);

    state.set("n", 1).unwrap();
    assert_eq!(scheduled.get(), 0);
}

/// Dependencies on objects that are gone are not counted.
#[test]
fn replaced_nested_object_drops_out_of_dependency_count() {
    let state = reactive(&Target::from(json!({ "user": { "name": "a" } })));

    let reader = state.clone();
    let effect = Effect::new(move || {
        if let Some(user) = reader.get("user").as_reactive() {
            user.get("name");
        }
    });
    assert_eq!(effect.dependency_count(), 2);

    for name in ["b", "c", "d"] {
        state.set("user", Target::from(json!({ "name": name }))).unwrap();
    }

    assert_eq!(effect.run_count(), 4);
    assert_eq!(effect.dependency_count(), 2);
}
