use spriteplay_core::{
    parse_project_json, AnimationEvaluator, Bounds, EvalConfig, EvalEvent, ProjectData, UserData,
};
use spriteplay_test_fixtures::projects;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn load(name: &str) -> ProjectData {
    let json = projects::json(name).expect("fixture json");
    parse_project_json(&json).expect("fixture parses")
}

#[test]
fn every_fixture_parses_and_validates() {
    for name in projects::keys() {
        let json = projects::json(&name).unwrap();
        let validated = parse_project_json(&json).unwrap_or_else(|e| panic!("{name}: {e}"));
        let raw: ProjectData = projects::load(&name).unwrap();
        assert_eq!(raw, validated, "{name}");
    }
}

#[test]
fn walk_fires_frame_events_in_one_long_tick() {
    let project = load("character");
    let mut ev = AnimationEvaluator::new(&project);
    ev.play("chara/walk", 1, 0).unwrap();

    // 1s at 30fps covers the whole 20 frame animation.
    let events = ev.advance(1.0).unwrap();
    let main: Vec<&EvalEvent> = events
        .iter()
        .filter(|e| !matches!(e, EvalEvent::InstanceLoopCompleted { .. }))
        .collect();
    assert_eq!(main.len(), 5, "{main:?}");
    assert_eq!(
        main[0],
        &EvalEvent::UserData {
            part: Some("body".into()),
            frame: 5,
            data: UserData {
                integer: Some(7),
                ..UserData::default()
            },
        }
    );
    assert_eq!(
        main[1],
        &EvalEvent::LabelReached {
            label: "step".into(),
            frame: 10,
        }
    );
    match main[2] {
        EvalEvent::UserData { part, frame, data } => {
            assert!(part.is_none());
            assert_eq!(*frame, 15);
            assert_eq!(data.string.as_deref(), Some("land"));
            assert_eq!(data.point, Some([3, 4]));
        }
        other => panic!("expected root user data, got {other:?}"),
    }
    assert!(matches!(main[3], EvalEvent::LoopCompleted { loops: 1, .. }));
    assert_eq!(
        main[4],
        &EvalEvent::PlaybackEnded {
            animation: "chara/walk".into(),
            frame: 19,
        }
    );

    // The sparkle instance loops forever: 19 owner frames over a 6 frame window.
    let sparkle_loops = events.len() - main.len();
    assert_eq!(sparkle_loops, 3);

    assert_eq!(ev.frame_no(), 19);
    approx(ev.states()[1].position[0], 95.0, 1e-4);
    assert_eq!(ev.states()[2].opacity, 128);
}

#[test]
fn cells_resolve_by_bare_and_qualified_name() {
    let project = load("character");
    let mut ev = AnimationEvaluator::new(&project);
    ev.play("chara/walk", 0, 0).unwrap();
    assert!(ev.last_warnings().is_empty());

    let states = ev.states();
    assert_eq!(states[0].cell_index, None);
    assert_eq!(states[1].cell_index, Some(0));
    assert_eq!(states[2].cell_index, Some(1));
    assert_eq!(states[3].cell_index, Some(2));
    assert_eq!(states[1].uv_rect, [0.0, 0.0, 0.25, 0.375]);
    assert!(states[1].is_drawable());
    assert!(!states[0].is_drawable());

    let spark = &states[4].instance.as_ref().unwrap().parts[1];
    assert_eq!(spark.cell_index, Some(3));
    assert_eq!(spark.uv_rect, [0.0, 0.0, 0.125, 0.125]);
}

#[test]
fn bounds_follow_each_part_shape() {
    let project = load("character");
    let mut ev = AnimationEvaluator::new(&project);
    ev.play("chara/walk", 0, 0).unwrap();
    let states = ev.states();

    match states[1].bounds {
        Bounds::Quad { corners } => {
            for c in corners {
                approx(c[0].abs(), 16.0, 1e-4);
                approx(c[1].abs(), 24.0, 1e-4);
            }
        }
        ref other => panic!("body: expected quad, got {other:?}"),
    }
    assert_eq!(
        states[2].bounds,
        Bounds::Circle {
            center: [0.0, 40.0],
            radius: 16.0,
        }
    );
    approx(states[2].bounding_radius, 16.0, 1e-6);
    // Arm pivot sits half a cell down, so the box hangs below (16, 10).
    match states[3].bounds {
        Bounds::Aabb { min, max } => {
            approx(min[0], 8.0, 1e-4);
            approx(min[1], -22.0, 1e-4);
            approx(max[0], 24.0, 1e-4);
            approx(max[1], 10.0, 1e-4);
        }
        ref other => panic!("arm: expected aabb, got {other:?}"),
    }
    assert!(states[3].bounds.contains([16.0, 0.0]));
    assert_eq!(states[3].anchor, [0.0, 0.5]);
}

#[test]
fn curves_and_queries_on_the_walk_cycle() {
    let project = load("character");
    let mut ev = AnimationEvaluator::new(&project);
    ev.play("chara/walk", 0, 0).unwrap();

    // Acceleration: halfway through 0 -> 40 is a quarter of the way.
    let arm = ev.part_state("arm", Some(5)).unwrap();
    approx(arm.rotation[2], 10.0, 1e-3);
    let arm = ev.part_state("arm", Some(10)).unwrap();
    approx(arm.rotation[2], 40.0, 1e-4);

    assert_eq!(ev.label_to_frame("step"), Some(10));
    assert_eq!(ev.label_to_frame("_end"), Some(19));
    assert_eq!(ev.max_frame(), 20);
    assert_eq!(ev.part_count(), 5);
    assert_eq!(ev.index_of_part("fx"), Some(4));
    assert_eq!(ev.user_data_at(5).len(), 1);
    assert_eq!(ev.frame_no(), 0);
}

#[test]
fn instance_part_runs_the_sparkle_effect() {
    let project = load("character");
    let mut ev = AnimationEvaluator::new(&project);
    ev.play("chara/walk", 0, 0).unwrap();

    let fx = ev.part_state("fx", Some(5)).unwrap();
    let nested = fx.instance.expect("instance state");
    assert_eq!(nested.animation, "effect/sparkle");
    assert_eq!(nested.frame, 5);
    let spark = &nested.parts[1];
    assert_eq!(spark.opacity, 0);
    approx(spark.scaled_size[0], 16.0, 1e-4);
    approx(spark.scaled_size[1], 8.0, 1e-4);
    // The live state stays on frame 0.
    let live = ev.states()[4].instance.as_ref().unwrap();
    assert_eq!(live.frame, 0);
    assert_eq!(live.parts[1].opacity, 255);
}

#[test]
fn second_animation_of_a_pack_shares_its_parts() {
    let project = load("character");
    let mut ev = AnimationEvaluator::new(&project);
    ev.play("chara/idle", 0, 0).unwrap();
    assert_eq!(ev.fps(), 12);
    assert_eq!(ev.max_frame(), 4);
    assert_eq!(ev.animation_name(), Some("idle"));
    assert_eq!(ev.pack_name(), Some("chara"));
    approx(ev.part_state("body", Some(2)).unwrap().scale[1], 0.9, 1e-6);
}

#[test]
fn nested_burst_plays_twice_then_holds() {
    let project = load("nested-effects");
    let mut ev = AnimationEvaluator::with_config(
        &project,
        EvalConfig {
            frame_skip: false,
            ..EvalConfig::default()
        },
    );
    ev.play("stage/main", 0, 0).unwrap();

    let mut events = Vec::new();
    for _ in 0..11 {
        events.extend(ev.advance(1.0 / 30.0).unwrap());
    }
    let loops: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            EvalEvent::InstanceLoopCompleted { part, loops, .. } => {
                assert_eq!(part, "emitter");
                Some(*loops)
            }
            _ => None,
        })
        .collect();
    assert_eq!(loops, vec![1, 2]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, EvalEvent::InstanceEnded { .. }))
            .count(),
        1
    );

    let burst = ev.states()[1].instance.as_ref().unwrap();
    assert!(burst.finished);
    assert_eq!(burst.frame, 4);
    approx(burst.parts[1].position[1], 8.0, 1e-5);
}
