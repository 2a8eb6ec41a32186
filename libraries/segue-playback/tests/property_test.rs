//! Property-based tests for queue and fader invariants
//!
//! Uses proptest to verify invariants across many random inputs.

mod common;

use common::{item, locator, EngineSpy};
use proptest::prelude::*;
use segue_playback::{
    Locator, PlaybackQueue, PlaybackState, PlaybackStateMachine, PlayerConfig, RetentionPolicy,
    VolumeFader,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};

// ===== Helpers =====

/// Small name pool so duplicates are common
fn names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-f]", 0..30)
}

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(String),
    Remove(String),
    Advance,
    Retreat,
    Rewind,
    DropConsumed,
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        "[a-f]".prop_map(QueueOp::Enqueue),
        "[a-f]".prop_map(QueueOp::Remove),
        Just(QueueOp::Advance),
        Just(QueueOp::Retreat),
        Just(QueueOp::Rewind),
        Just(QueueOp::DropConsumed),
    ]
}

#[derive(Debug, Clone)]
enum MachineOp {
    Enqueue(String),
    Remove(String),
    Play,
    Pause,
    Stop,
    End,
    Fail,
    Next,
    Previous,
    Resume(String),
}

fn machine_op() -> impl Strategy<Value = MachineOp> {
    prop_oneof![
        "[a-d]".prop_map(MachineOp::Enqueue),
        "[a-d]".prop_map(MachineOp::Remove),
        Just(MachineOp::Play),
        Just(MachineOp::Pause),
        Just(MachineOp::Stop),
        Just(MachineOp::End),
        Just(MachineOp::Fail),
        Just(MachineOp::Next),
        Just(MachineOp::Previous),
        "[a-d]".prop_map(MachineOp::Resume),
    ]
}

fn machine_config() -> impl Strategy<Value = PlayerConfig> {
    (
        prop_oneof![Just(RetentionPolicy::Retain), Just(RetentionPolicy::Remove)],
        any::<bool>(),
    )
        .prop_map(|(retention, clear_on_stop)| PlayerConfig {
            retention,
            remove_all_urls_on_playback_stop: clear_on_stop,
            ..PlayerConfig::default()
        })
}

// ===== Property Tests =====

proptest! {
    /// Property: accepted enqueues keep insertion order and never duplicate
    #[test]
    fn enqueue_preserves_order_without_duplicates(names in names()) {
        let mut queue = PlaybackQueue::new();
        let mut expected: Vec<Locator> = Vec::new();

        for name in &names {
            let accepted = queue.enqueue(item(name)).is_ok();
            let fresh = !expected.contains(&locator(name));
            prop_assert_eq!(accepted, fresh);
            if fresh {
                expected.push(locator(name));
            }
        }

        prop_assert_eq!(queue.locators(), expected);
    }

    /// Property: the current index always points at a valid entry
    #[test]
    fn current_index_always_valid(ops in prop::collection::vec(queue_op(), 1..60)) {
        let mut queue = PlaybackQueue::new();

        for op in ops {
            match op {
                QueueOp::Enqueue(name) => { let _ = queue.enqueue(item(&name)); }
                QueueOp::Remove(name) => { queue.remove(&locator(&name)); }
                QueueOp::Advance => { queue.advance(); }
                QueueOp::Retreat => { queue.retreat(); }
                QueueOp::Rewind => queue.rewind(),
                QueueOp::DropConsumed => { queue.drop_consumed(); }
            }

            if let Some(index) = queue.current_index() {
                prop_assert!(index < queue.len());
            }
            let unique: HashSet<_> = queue.locators().into_iter().collect();
            prop_assert_eq!(unique.len(), queue.len());
        }
    }

    /// Property: a fade never leaves [0, 1] and ends exactly on target
    #[test]
    fn fade_stays_in_bounds(
        from in -0.5f32..1.5,
        to in -0.5f32..1.5,
        duration_ms in 0u64..2000,
        ticks in prop::collection::vec(0u64..2500, 1..40),
    ) {
        let mut fader = VolumeFader::new();
        let start = Instant::now();
        let duration = Duration::from_millis(duration_ms);

        let initial = fader.start(from, to, duration, start);
        prop_assert!((0.0..=1.0).contains(&initial));

        let mut ticks = ticks;
        ticks.sort_unstable();
        for offset in ticks {
            if let Some(volume) = fader.tick(start + Duration::from_millis(offset)) {
                prop_assert!((0.0..=1.0).contains(&volume));
            }
        }

        if let Some(volume) = fader.tick(start + duration) {
            prop_assert_eq!(volume, to.clamp(0.0, 1.0));
        }
        prop_assert!(!fader.is_active());
    }

    /// Property: superseding a fade continues from the reached volume
    #[test]
    fn superseded_fade_never_jumps_back(
        first_ms in 100u64..1000,
        cut_ms in 1u64..100,
        target in 0.0f32..=1.0,
    ) {
        let mut fader = VolumeFader::new();
        let t0 = Instant::now();
        fader.start(1.0, 0.0, Duration::from_millis(first_ms), t0);

        let cut = t0 + Duration::from_millis(cut_ms);
        let reached = fader.tick(cut).unwrap();
        fader.cancel();

        let restart = fader.start(reached, target, Duration::from_millis(500), cut);
        prop_assert_eq!(restart, reached);
        let next = fader.tick(cut + Duration::from_millis(1)).unwrap();
        prop_assert!((next - reached).abs() <= (target - reached).abs() + f32::EPSILON);
    }

    /// Property: random command sequences keep the target consistent with the queue
    #[test]
    fn machine_target_tracks_queue(
        config in machine_config(),
        ops in prop::collection::vec(machine_op(), 1..60),
    ) {
        let spy = EngineSpy::default();
        let mut machine = PlaybackStateMachine::new(config, spy.engine());

        for op in ops {
            match op {
                MachineOp::Enqueue(name) => { let _ = machine.enqueue(item(&name)); }
                MachineOp::Remove(name) => { let _ = machine.remove(&locator(&name)); }
                MachineOp::Play => { let _ = machine.play(); }
                MachineOp::Pause => machine.pause(),
                MachineOp::Stop => machine.stop(),
                MachineOp::End => {
                    if spy.target().is_some() {
                        machine.handle_engine_event(spy.ended());
                    }
                }
                MachineOp::Fail => {
                    if spy.target().is_some() {
                        machine.handle_engine_event(spy.failed("boom"));
                    }
                }
                MachineOp::Next => { let _ = machine.advance_to_next(); }
                MachineOp::Previous => machine.previous(),
                MachineOp::Resume(name) => { let _ = machine.resume(&locator(&name)); }
            }

            let engine_target = spy.target();
            match machine.current_locator() {
                Some(target) => {
                    prop_assert_ne!(machine.state(), PlaybackState::Stopped);
                    prop_assert_eq!(machine.queue().current().map(|i| i.locator()), Some(target));
                    prop_assert_eq!(engine_target.as_ref(), Some(target));
                }
                None => prop_assert_eq!(machine.state(), PlaybackState::Stopped),
            }
        }
    }
}
