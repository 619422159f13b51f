//! Readers racing a writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use warden_engine::{DecisionSource, Engine, EngineConfig};
use warden_geom::{Point, Shape};
use warden_region::{CAN_PLACE, FlagKey, FlagRegistry, FlagState, Region, RegionId, Verdict};

fn engine() -> Engine {
    let engine = Engine::new(EngineConfig::default(), FlagRegistry::standard()).unwrap();
    engine
        .create_region(Region::new(
            "arena",
            "w",
            Shape::cuboid([0.0, 0.0, 0.0], [31.0, 31.0, 31.0]).unwrap(),
        ))
        .unwrap();
    engine
}

#[test]
fn test_answers_settle_after_writes() {
    let engine = engine();
    let arena = RegionId::new("arena");
    let flag = FlagKey::new(CAN_PLACE);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for t in 0..4 {
            let engine = &engine;
            let flag = &flag;
            let done = &done;
            s.spawn(move || {
                let mut i = 0u32;
                while !done.load(Ordering::Acquire) {
                    let x = f64::from((i + t) % 32);
                    let decision = engine.resolve(&Point::new("w", x, 3.0, 7.0), flag);
                    // Every answer comes from one snapshot or another, never
                    // from nowhere.
                    assert!(matches!(
                        decision.source,
                        DecisionSource::Region(_) | DecisionSource::GlobalDefault
                    ));
                    i = i.wrapping_add(1);
                }
            });
        }

        for round in 0..200 {
            let state = if round % 2 == 0 {
                FlagState::Deny
            } else {
                FlagState::Allow
            };
            engine.set_flag(&arena, CAN_PLACE, state).unwrap();
        }
        engine.set_flag(&arena, CAN_PLACE, FlagState::Deny).unwrap();
        done.store(true, Ordering::Release);
    });

    // Once the writer is done, cached or not, everybody sees the last write.
    for x in 0..32 {
        let decision = engine.resolve(&Point::new("w", f64::from(x), 3.0, 7.0), &flag);
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.region(), Some(&arena));
    }
    assert_eq!(engine.generation(), 202);
    engine.verify_integrity().unwrap();
}

#[test]
fn test_readers_during_structural_changes() {
    let engine = engine();
    let flag = FlagKey::new(CAN_PLACE);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..4 {
            let engine = &engine;
            let flag = &flag;
            let done = &done;
            s.spawn(move || {
                while !done.load(Ordering::Acquire) {
                    for x in [5.0, 50.0, 95.0] {
                        engine.resolve(&Point::new("w", x, 5.0, 5.0), flag);
                        engine.regions_at("w", x, 5.0, 5.0);
                    }
                }
            });
        }

        for i in 0..50_i32 {
            let id = format!("tmp{i}");
            let x = f64::from(i % 10) * 10.0;
            engine
                .create_region(
                    Region::new(
                        id.as_str(),
                        "w",
                        Shape::cuboid([x, 0.0, 0.0], [x + 9.0, 9.0, 9.0]).unwrap(),
                    )
                    .with_priority(i)
                    .with_flag(CAN_PLACE, FlagState::Deny),
                )
                .unwrap();
            if i % 3 == 0 {
                engine.delete_region(&RegionId::new(id)).unwrap();
            }
        }
        done.store(true, Ordering::Release);
    });

    engine.verify_integrity().unwrap();
    // tmp49 (x = 90..99) survives and outranks the arena's empty flags.
    let decision = engine.resolve(&Point::new("w", 95.0, 5.0, 5.0), &flag);
    assert_eq!(decision.verdict, Verdict::Deny);
    assert_eq!(decision.region(), Some(&RegionId::new("tmp49")));
}
