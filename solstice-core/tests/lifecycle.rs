mod common;

use std::sync::Arc;
use std::thread;

use solstice_audio::{SampleSet, TestOp};
use solstice_core::prerender::{prerenderable_buffers, PrerenderSpec};
use solstice_core::{pieces, PieceInstance};
use solstice_types::{Note, PieceId};

#[test]
fn test_stopped_session_leaves_no_stale_triggers() {
    let (backend, env) = common::test_env(21);
    let mut instance =
        PieceInstance::create(&PieceId::new("stratus"), &env, &env.engine.destination()).unwrap();

    env.transport.advance(120.0);
    assert!(backend.count(|op| matches!(op, TestOp::TriggerAttack { .. })) > 0);

    instance.stop();
    let fired = backend.count(|op| matches!(op, TestOp::TriggerAttack { .. }));
    env.transport.advance(600.0);
    // Cancellation is immediate and total: nothing from the old session
    // fires after stop, however far the clock moves.
    assert_eq!(
        backend.count(|op| matches!(op, TestOp::TriggerAttack { .. })),
        fired
    );

    // A fresh session schedules and fires independently.
    instance.reschedule().unwrap();
    env.transport.advance(120.0);
    assert!(backend.count(|op| matches!(op, TestOp::TriggerAttack { .. })) > fired);
}

#[test]
fn test_deactivate_without_schedule_is_safe() {
    for def in pieces::all() {
        let (_, env) = common::test_env(22);
        let mut piece = (def.activate)(&env).unwrap();
        piece.deactivate().unwrap();
        piece.deactivate().unwrap();
        assert_eq!(env.engine.live_nodes(), 0, "piece `{}`", def.id);
    }
}

#[test]
fn test_deactivate_after_stopped_session() {
    for def in pieces::all() {
        let (_, env) = common::test_env(23);
        let mut instance =
            PieceInstance::create(&PieceId::new(def.id), &env, &env.engine.destination()).unwrap();
        env.transport.advance(90.0);
        instance.stop();
        instance.deactivate().unwrap();
        instance.deactivate().unwrap();
        assert_eq!(env.engine.live_nodes(), 0, "piece `{}`", def.id);
        assert_eq!(env.transport.pending(), 0, "piece `{}`", def.id);
    }
}

#[test]
fn test_concurrent_activation_shares_one_render() {
    let (backend, env) = common::test_env(24);
    let samples = Arc::new(env.library.request(&["grand-piano"]).unwrap());
    let notes: Vec<Note> = vec!["C3".parse().unwrap(), "E4".parse().unwrap()];
    let notes = Arc::new(notes);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let env = env.clone();
        let samples = samples.clone();
        let notes = notes.clone();
        handles.push(thread::spawn(move || {
            let spec = PrerenderSpec::new(&notes, "grand-piano", "shared__grand-piano");
            prerenderable_buffers(&env, &samples, &spec, &|_| {}).unwrap()
        }));
    }
    let sets: Vec<Arc<SampleSet>> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    // One compute: one render per note, every thread sharing the result.
    assert_eq!(backend.renders(), notes.len());
    for set in &sets {
        assert!(Arc::ptr_eq(set, &sets[0]));
    }
    // Persisted for the next run.
    assert!(env
        .library
        .request(&["shared__grand-piano"])
        .unwrap()
        .contains_key("shared__grand-piano"));
}
