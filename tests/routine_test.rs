// Autonomous routines: fixed, deterministic command sequences

mod common;

use common::{Command, RecordingMotion};
use crazyflie_pilot::motion::{Direction, Turn, DEFAULT_VELOCITY};
use crazyflie_pilot::routine::{run_routine, Routine, RoutineKind, Step};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn linear_routine_sends_the_square() {
    let mut motion = RecordingMotion::default();

    run_routine(&mut motion, &Routine::linear()).await.unwrap();

    let v = DEFAULT_VELOCITY;
    assert_eq!(
        motion.commands,
        vec![
            Command::TakeOff(0.5, v),
            Command::Move(Direction::Forward, 0.5, v),
            Command::Move(Direction::Back, 0.5, v),
            Command::Move(Direction::Left, 0.5, v),
            Command::Move(Direction::Right, 0.5, v),
            Command::Land(v),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn hula_hoop_routine_follows_the_course() {
    let mut motion = RecordingMotion::default();

    run_routine(&mut motion, &Routine::hula_hoop()).await.unwrap();

    assert_eq!(
        motion.commands,
        vec![
            Command::TakeOff(0.6, DEFAULT_VELOCITY),
            Command::Move(Direction::Forward, 0.95, 0.5),
            Command::Move(Direction::Down, 0.275, 0.5),
            Command::Turn(Turn::Right, 85.0, 90.0),
            Command::Move(Direction::Forward, 1.5, 0.5),
            Command::Move(Direction::Up, 0.75, 0.5),
            Command::Move(Direction::Forward, 0.5, 0.5),
            Command::Land(0.5),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn take_off_routine_hovers_before_landing() {
    let mut motion = RecordingMotion::default();

    run_routine(&mut motion, &Routine::take_off()).await.unwrap();

    assert_eq!(
        motion.commands,
        vec![
            Command::TakeOff(0.5, DEFAULT_VELOCITY),
            Command::Stop,
            Command::Land(DEFAULT_VELOCITY),
        ]
    );
    // 2.5 s climb then 3 s hover
    let hover = motion.times[1] - motion.times[0];
    assert!(hover >= Duration::from_millis(5500), "{:?}", hover);
}

#[tokio::test(start_paused = true)]
async fn repeated_runs_send_the_same_commands() {
    for kind in [RoutineKind::TakeOff, RoutineKind::Linear, RoutineKind::HulaHoop] {
        let mut first = RecordingMotion::default();
        let mut second = RecordingMotion::default();

        run_routine(&mut first, &Routine::of_kind(kind)).await.unwrap();
        run_routine(&mut second, &Routine::of_kind(kind)).await.unwrap();

        assert_eq!(first.commands, second.commands, "routine {:?}", kind);
        assert_eq!(Routine::of_kind(kind), Routine::of_kind(kind));
    }
}

#[tokio::test(start_paused = true)]
async fn routine_lasts_its_nominal_duration() {
    let routine = Routine::linear();
    let mut motion = RecordingMotion::default();

    let start = Instant::now();
    run_routine(&mut motion, &routine).await.unwrap();

    // The recording double does not sleep for landing
    let landing = Duration::from_secs_f32(0.5 / DEFAULT_VELOCITY);
    let elapsed = start.elapsed();
    let expected = routine.nominal_duration() - landing;
    assert!(elapsed >= expected && elapsed < expected + Duration::from_millis(50), "{:?}", elapsed);
}

#[test]
fn nominal_duration_sums_the_steps() {
    let routine = Routine {
        name: "test",
        steps: vec![
            Step::TakeOff { height: 1.0, velocity: 0.5 },
            Step::Wait(Duration::from_secs(1)),
            Step::Move { direction: Direction::Up, distance: 0.5, velocity: 0.25 },
            Step::Turn { turn: Turn::Left, angle: 90.0, rate: 45.0 },
            Step::Stop,
            Step::Land { velocity: 0.5 },
        ],
    };

    // 2 + 1 + 2 + 2 + 0 + 3
    let duration = routine.nominal_duration();
    assert!((duration.as_secs_f32() - 10.0).abs() < 1e-3, "{:?}", duration);
}

#[test]
fn linear_is_the_default_routine() {
    assert_eq!(RoutineKind::default(), RoutineKind::Linear);
    assert_eq!(Routine::of_kind(RoutineKind::default()).name, "linear");
}

#[test]
fn nominal_duration_saturates() {
    let routine = Routine {
        name: "endless",
        steps: vec![
            Step::TakeOff { height: 0.5, velocity: 0.5 },
            Step::Move { direction: Direction::Forward, distance: 1e30, velocity: 1e-10 },
            Step::Wait(Duration::from_secs(1)),
            Step::Land { velocity: 0.5 },
        ],
    };

    assert_eq!(routine.nominal_duration(), Duration::MAX);
}
