// Maccel End-to-End Test Scenarios
//
// Drive the full engine through the simulated tap backend: events go in the
// way the OS would deliver them, and the test checks what applications get.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use maccel_core::modifier::{self, event_flags};
use maccel_core::sim::{RecordingSynthesizer, SimulatedBackend, StaticInputSources};
use maccel_core::tap::{DisableReason, EventTap, TapOptions, TapPort};
use maccel_core::{
    EngineConfig, EngineContext, EngineNotice, InputSourceSelector, KeyCode, RawKeyEvent,
    RemappingPair, RemappingTable, SharedTable, SyntheticKey, TapConfig, TapState,
    TransformResult, SYNTHETIC_EVENT_MARKER,
};
use maccel_core::transform;

// =========================================================================
// Test Helpers
// =========================================================================

struct Harness {
    engine: EngineContext,
    backend: SimulatedBackend,
    synth: RecordingSynthesizer,
    sources: StaticInputSources,
}

fn test_config() -> EngineConfig {
    EngineConfig {
        tap: TapConfig {
            watchdog_interval: None,
            create_retry_delay: Duration::from_millis(1),
            reenable_limit: 2,
            ..TapConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn start_with(table: RemappingTable) -> Harness {
    let mut engine = EngineContext::new(test_config());
    engine.publish(table);
    let mut backend = SimulatedBackend::new();
    let synth = RecordingSynthesizer::new();
    let sources = StaticInputSources::new(3);
    engine
        .start(&mut backend, Box::new(synth.clone()), Box::new(sources.clone()))
        .unwrap();
    Harness {
        engine,
        backend,
        synth,
        sources,
    }
}

fn pairs(list: &[(KeyCode, KeyCode)]) -> RemappingTable {
    RemappingTable::build(list.iter().map(|(s, d)| RemappingPair::new(*s, *d)))
}

/// Press and release `key`, returning what the application received
fn tap_key(h: &Harness, key: KeyCode) -> Vec<Option<RawKeyEvent>> {
    vec![
        h.backend.forward(RawKeyEvent::key_down(key)),
        h.backend.forward(RawKeyEvent::key_up(key)),
    ]
}

// =========================================================================
// Remapping
// =========================================================================

#[test]
fn test_remap_a_to_s() {
    let h = start_with(pairs(&[(KeyCode::new(0x00), KeyCode::new(0x01))]));
    assert!(h.engine.is_active());

    assert_eq!(
        tap_key(&h, KeyCode::new(0x00)),
        vec![
            Some(RawKeyEvent::key_down(0x01u64)),
            Some(RawKeyEvent::key_up(0x01u64)),
        ]
    );
    // unmapped keys are untouched
    let b = RawKeyEvent::key_down(0x0Bu64).with_flags(event_flags::SHIFT);
    assert_eq!(h.backend.forward(b), Some(b));
}

#[test]
fn test_empty_table_passes_everything() {
    let h = start_with(RemappingTable::empty());
    assert_eq!(h.engine.state(), TapState::Active);
    assert!(h.engine.is_active());

    for code in [0x00u64, 0x35, 0x7E] {
        let event = RawKeyEvent::key_down(code);
        assert_eq!(h.backend.forward(event), Some(event));
    }
    let flags = RawKeyEvent::flags_changed(KeyCode::LEFT_SHIFT, event_flags::SHIFT);
    assert_eq!(h.backend.forward(flags), Some(flags));
}

#[test]
fn test_modifier_to_modifier_rewrites_flags() {
    let h = start_with(pairs(&[(KeyCode::LEFT_COMMAND, KeyCode::LEFT_OPTION)]));

    let down = RawKeyEvent::flags_changed(KeyCode::LEFT_COMMAND, event_flags::COMMAND);
    assert_eq!(
        h.backend.forward(down),
        Some(RawKeyEvent::flags_changed(
            KeyCode::LEFT_OPTION,
            modifier::key_flags(KeyCode::LEFT_OPTION)
        ))
    );
    let up = RawKeyEvent::flags_changed(KeyCode::LEFT_COMMAND, 0);
    assert_eq!(
        h.backend.forward(up),
        Some(RawKeyEvent::flags_changed(KeyCode::LEFT_OPTION, 0))
    );
}

#[test]
fn test_chorded_modifier_remap_keeps_other_side() {
    let h = start_with(pairs(&[(KeyCode::LEFT_CONTROL, KeyCode::LEFT_COMMAND)]));
    let right_ctrl = modifier::key_flags(KeyCode::RIGHT_CONTROL);
    let left_ctrl = modifier::key_flags(KeyCode::LEFT_CONTROL);
    let left_cmd = modifier::key_flags(KeyCode::LEFT_COMMAND);

    let rctrl_down = RawKeyEvent::flags_changed(KeyCode::RIGHT_CONTROL, right_ctrl);
    assert_eq!(h.backend.forward(rctrl_down), Some(rctrl_down));
    assert_eq!(
        h.backend.forward(RawKeyEvent::flags_changed(
            KeyCode::LEFT_CONTROL,
            right_ctrl | left_ctrl
        )),
        Some(RawKeyEvent::flags_changed(KeyCode::LEFT_COMMAND, right_ctrl | left_cmd))
    );
    // left control up while right control stays down: command is released
    assert_eq!(
        h.backend
            .forward(RawKeyEvent::flags_changed(KeyCode::LEFT_CONTROL, right_ctrl)),
        Some(RawKeyEvent::flags_changed(KeyCode::LEFT_COMMAND, right_ctrl))
    );
    let rctrl_up = RawKeyEvent::flags_changed(KeyCode::RIGHT_CONTROL, 0);
    assert_eq!(h.backend.forward(rctrl_up), Some(rctrl_up));
}

#[test]
fn test_modifier_to_regular_with_other_side_held() {
    let mut h = start_with(pairs(&[(KeyCode::RIGHT_COMMAND, KeyCode::F19)]));
    let left_cmd = modifier::key_flags(KeyCode::LEFT_COMMAND);
    let right_cmd = modifier::key_flags(KeyCode::RIGHT_COMMAND);

    h.backend
        .forward(RawKeyEvent::flags_changed(KeyCode::LEFT_COMMAND, left_cmd));
    assert_eq!(
        h.backend.forward(RawKeyEvent::flags_changed(
            KeyCode::RIGHT_COMMAND,
            left_cmd | right_cmd
        )),
        None
    );
    assert_eq!(
        h.backend
            .forward(RawKeyEvent::flags_changed(KeyCode::RIGHT_COMMAND, left_cmd)),
        None
    );
    h.engine.shutdown();

    assert_eq!(
        h.synth.posted(),
        vec![SyntheticKey::down(KeyCode::F19), SyntheticKey::up(KeyCode::F19)]
    );
}

#[test]
fn test_caps_lock_toggle_posts_full_tap() {
    let mut h = start_with(pairs(&[(KeyCode::CAPS_LOCK, KeyCode::ESCAPE)]));

    let on = RawKeyEvent::flags_changed(KeyCode::CAPS_LOCK, event_flags::ALPHA_SHIFT);
    let off = RawKeyEvent::flags_changed(KeyCode::CAPS_LOCK, 0);
    assert_eq!(h.backend.forward(on), None);
    assert_eq!(h.backend.forward(off), None);
    h.engine.shutdown();

    let tap = [SyntheticKey::down(KeyCode::ESCAPE), SyntheticKey::up(KeyCode::ESCAPE)];
    assert_eq!(h.synth.posted(), [tap, tap].concat());
}

#[test]
fn test_regular_to_modifier_is_reinjected() {
    let mut h = start_with(pairs(&[(KeyCode::ESCAPE, KeyCode::LEFT_CONTROL)]));

    assert_eq!(h.backend.forward(RawKeyEvent::key_down(KeyCode::ESCAPE)), None);
    assert_eq!(
        h.backend
            .forward(RawKeyEvent::key_down(KeyCode::ESCAPE).with_autorepeat(true)),
        None
    );
    assert_eq!(h.backend.forward(RawKeyEvent::key_up(KeyCode::ESCAPE)), None);
    h.engine.shutdown();

    assert_eq!(
        h.synth.posted(),
        vec![
            SyntheticKey::down(KeyCode::LEFT_CONTROL),
            SyntheticKey::up(KeyCode::LEFT_CONTROL),
        ]
    );
}

#[test]
fn test_synthetic_events_are_not_remapped() {
    let h = start_with(pairs(&[(KeyCode::new(0x00), KeyCode::new(0x01))]));
    let ours = RawKeyEvent::key_down(0x00u64).with_user_data(SYNTHETIC_EVENT_MARKER);
    assert_eq!(h.backend.forward(ours), Some(ours));
}

#[test]
fn test_suppressed_key_never_reaches_apps() {
    let table = RemappingTable::empty().with_suppressed([KeyCode::CAPS_LOCK]);
    let h = start_with(table);
    let caps = RawKeyEvent::flags_changed(KeyCode::CAPS_LOCK, event_flags::ALPHA_SHIFT);
    assert_eq!(h.backend.forward(caps), None);
}

// =========================================================================
// Table publication
// =========================================================================

#[test]
fn test_publish_takes_effect_on_next_event() {
    let h = start_with(RemappingTable::empty());
    let a = RawKeyEvent::key_down(0x00u64);
    assert_eq!(h.backend.forward(a), Some(a));
    h.backend.forward(RawKeyEvent::key_up(0x00u64));

    h.engine.apply_remappings([RemappingPair::new(0x00u64, 0x01u64)]);
    assert_eq!(h.backend.forward(a), Some(RawKeyEvent::key_down(0x01u64)));
}

#[test]
fn test_held_key_keeps_press_time_mapping() {
    let h = start_with(pairs(&[(KeyCode::new(0x00), KeyCode::new(0x01))]));
    assert_eq!(
        h.backend.forward(RawKeyEvent::key_down(0x00u64)),
        Some(RawKeyEvent::key_down(0x01u64))
    );

    h.engine.publish(RemappingTable::empty());
    assert_eq!(
        h.backend
            .forward(RawKeyEvent::key_down(0x00u64).with_autorepeat(true)),
        Some(RawKeyEvent::key_down(0x01u64).with_autorepeat(true))
    );
    assert_eq!(
        h.backend.forward(RawKeyEvent::key_up(0x00u64)),
        Some(RawKeyEvent::key_up(0x01u64))
    );
    // next press sees the new table
    assert_eq!(
        h.backend.forward(RawKeyEvent::key_down(0x00u64)),
        Some(RawKeyEvent::key_down(0x00u64))
    );
}

/// Sources sharing one destination per table generation
const GENERATION_SOURCES: [u64; 4] = [0x00, 0x02, 0x03, 0x05];

fn generation(g: u64) -> RemappingTable {
    RemappingTable::build(
        GENERATION_SOURCES
            .iter()
            .map(|source| RemappingPair::new(*source, 0x10 + g)),
    )
}

#[test]
fn test_concurrent_publish_never_tears() {
    let h = start_with(generation(0));
    let stop = Arc::new(AtomicBool::new(false));

    let table = h.engine.tap().unwrap().table().clone();
    let publisher = {
        let stop = stop.clone();
        std::thread::spawn(move || {
            let mut g = 0;
            while !stop.load(Ordering::Relaxed) {
                g = (g + 1) % 4;
                table.store(generation(g));
            }
        })
    };

    for i in 0..2_000u64 {
        let source = GENERATION_SOURCES[(i % 4) as usize];
        let down = RawKeyEvent::key_down(source).with_timestamp(i);
        let delivered = h.backend.forward(down).unwrap();
        assert!(
            (0x10..=0x13).contains(&delivered.key_code.code()),
            "unexpected {:?}",
            delivered
        );
        let up = h.backend.forward(RawKeyEvent::key_up(source)).unwrap();
        // release follows the press even if the table flipped in between
        assert_eq!(up.key_code, delivered.key_code);
    }

    stop.store(true, Ordering::Relaxed);
    publisher.join().unwrap();
}

#[test]
fn test_listener_sees_one_table_generation() {
    let shared = SharedTable::new(generation(0));
    let mixed = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(AtomicUsize::new(0));

    let listener = {
        let shared = shared.clone();
        let mixed = mixed.clone();
        let seen = seen.clone();
        Box::new(move |event: &RawKeyEvent| -> TransformResult {
            let table = shared.load();
            let first = table.lookup(KeyCode::new(GENERATION_SOURCES[0]));
            let agree = first.is_some()
                && GENERATION_SOURCES
                    .iter()
                    .all(|source| table.lookup(KeyCode::new(*source)) == first);
            if !agree {
                mixed.fetch_add(1, Ordering::Relaxed);
            }
            seen.fetch_add(1, Ordering::Relaxed);
            transform(event, &table)
        })
    };

    let mut backend = SimulatedBackend::new();
    let options = TapOptions {
        config: test_config().tap,
        table: shared.clone(),
        ..TapOptions::default()
    };
    let tap = EventTap::create(&mut backend, listener, options).unwrap();

    let stop = AtomicBool::new(false);
    std::thread::scope(|s| {
        s.spawn(|| {
            let mut g = 0;
            while !stop.load(Ordering::Relaxed) {
                g = (g + 1) % 4;
                shared.store(generation(g));
            }
        });
        for i in 0..2_000u64 {
            backend.forward(RawKeyEvent::key_down(0x00u64).with_timestamp(i));
        }
        stop.store(true, Ordering::Relaxed);
    });

    assert!(tap.is_active());
    assert_eq!(seen.load(Ordering::Relaxed), 2_000);
    assert_eq!(mixed.load(Ordering::Relaxed), 0);
}

// =========================================================================
// Input sources
// =========================================================================

#[test]
fn test_select_out_of_range_is_rejected() {
    let sources = StaticInputSources::new(3);
    assert!(!sources.select(99));
    assert_eq!(sources.current(), Some(0));
    assert!(sources.select(2));
    assert_eq!(sources.current(), Some(2));
}

#[test]
fn test_short_press_switches_input_source() {
    let table = RemappingTable::empty().with_input_source_taps([
        (KeyCode::LEFT_COMMAND, 0),
        (KeyCode::RIGHT_COMMAND, 1),
    ]);
    let mut h = start_with(table);

    let down = RawKeyEvent::flags_changed(KeyCode::RIGHT_COMMAND, event_flags::COMMAND);
    let up = RawKeyEvent::flags_changed(KeyCode::RIGHT_COMMAND, 0).with_timestamp(80_000_000);
    assert_eq!(h.backend.forward(down), Some(down));
    assert_eq!(h.backend.forward(up), Some(up));
    h.engine.shutdown();

    assert_eq!(h.sources.current(), Some(1));
}

#[test]
fn test_command_chord_does_not_switch() {
    let table = RemappingTable::empty().with_input_source_taps([(KeyCode::RIGHT_COMMAND, 1)]);
    let mut h = start_with(table);

    h.backend.forward(RawKeyEvent::flags_changed(
        KeyCode::RIGHT_COMMAND,
        event_flags::COMMAND,
    ));
    h.backend
        .forward(RawKeyEvent::key_down(KeyCode::A).with_flags(event_flags::COMMAND));
    h.backend
        .forward(RawKeyEvent::key_up(KeyCode::A).with_flags(event_flags::COMMAND));
    h.backend
        .forward(RawKeyEvent::flags_changed(KeyCode::RIGHT_COMMAND, 0).with_timestamp(1_000));
    h.engine.shutdown();

    assert_eq!(h.sources.current(), Some(0));
}

// =========================================================================
// Self-healing
// =========================================================================

#[test]
fn test_disabled_by_timeout_recovers() {
    let h = start_with(pairs(&[(KeyCode::new(0x00), KeyCode::new(0x01))]));
    let notices = h.engine.notices();

    h.backend.disable(DisableReason::Timeout);
    assert_eq!(h.engine.state(), TapState::Active);
    assert!(h.backend.port().unwrap().is_enabled());

    // remapping continues after recovery
    assert_eq!(
        h.backend.forward(RawKeyEvent::key_down(0x00u64)),
        Some(RawKeyEvent::key_down(0x01u64))
    );
    assert_eq!(
        notices.try_iter().collect::<Vec<_>>(),
        vec![
            EngineNotice::TapDisabled(DisableReason::Timeout),
            EngineNotice::TapReenabled,
        ]
    );
}

#[test]
fn test_reenable_exhaustion_is_reported_once() {
    let h = start_with(RemappingTable::empty());
    let notices = h.engine.notices();
    let port = h.backend.port().unwrap();
    port.refuse_next(10);

    h.backend.disable(DisableReason::UserInput);
    assert_eq!(h.engine.state(), TapState::Disabled);

    let tap = h.engine.tap().unwrap();
    assert!(!tap.reenable());
    assert!(!tap.reenable());
    assert_eq!(tap.reenable_failures(), 3);

    // events are not intercepted while disabled
    let a = RawKeyEvent::key_down(0x00u64);
    assert_eq!(h.backend.deliver(a), None);

    port.refuse_next(0);
    assert!(tap.reenable());
    assert!(tap.is_active());
    assert_eq!(tap.reenable_failures(), 0);

    assert_eq!(
        notices.try_iter().collect::<Vec<_>>(),
        vec![
            EngineNotice::TapDisabled(DisableReason::UserInput),
            EngineNotice::ReenableExhausted { attempts: 2 },
            EngineNotice::TapReenabled,
        ]
    );
}

#[test]
fn test_panicking_listener_keeps_tap_alive() {
    let mut backend = SimulatedBackend::new();
    let listener = Box::new(|event: &RawKeyEvent| -> TransformResult {
        if event.key_code == KeyCode::ESCAPE {
            panic!("listener bug");
        }
        TransformResult::Suppressed
    });
    let options = TapOptions {
        config: test_config().tap,
        ..TapOptions::default()
    };
    let tap = EventTap::create(&mut backend, listener, options).unwrap();

    let esc = RawKeyEvent::key_down(KeyCode::ESCAPE);
    assert_eq!(backend.forward(esc), Some(esc));
    assert!(tap.is_active());
    assert_eq!(backend.forward(RawKeyEvent::key_down(KeyCode::A)), None);
}

// =========================================================================
// Teardown
// =========================================================================

#[test]
fn test_shutdown_releases_the_keyboard() {
    let mut h = start_with(pairs(&[(KeyCode::new(0x00), KeyCode::new(0x01))]));
    h.engine.shutdown();
    h.engine.shutdown();

    assert_eq!(h.engine.state(), TapState::Destroyed);
    let a = RawKeyEvent::key_down(0x00u64);
    assert_eq!(h.backend.forward(a), Some(a));
    assert!(h.backend.port().unwrap().is_removed());
}

#[test]
fn test_destroy_from_another_thread() {
    let h = start_with(RemappingTable::empty());
    let engine = &h.engine;
    std::thread::scope(|s| {
        s.spawn(move || engine.tap().unwrap().destroy());
    });
    assert_eq!(h.engine.state(), TapState::Destroyed);
    assert!(!h.engine.tap().unwrap().reenable());
}
