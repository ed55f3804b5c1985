//! # Autonomous routines
//!
//! A [Routine] is a fixed, open-loop list of [Step]s. It does not look at the telemetry and has no branch: running
//! the same routine always sends the same commands in the same order, and its duration is the sum of its steps.
//!
//! Three routines are available:
//!
//! | Routine | Flight |
//! |---------|--------|
//! | [take-off](RoutineKind::TakeOff) | take off to 0.5 m, hover 3 s, land |
//! | [linear](RoutineKind::Linear) | take off to 0.5 m, then 0.5 m forward, back, left and right with 1 s pauses |
//! | [hula-hoop](RoutineKind::HulaHoop) | fly through a hoop course at 0.6 m |

use crate::motion::{Direction, Motion, Turn, DEFAULT_VELOCITY};
use crate::Result;
use std::time::Duration;

/// One step of a routine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Take off to `height` (m) at `velocity` (m/s)
    TakeOff {
        /// Target height (m)
        height: f32,
        /// Climb velocity (m/s)
        velocity: f32,
    },
    /// Keep the current motion for a while
    Wait(Duration),
    /// Move a distance
    Move {
        /// Direction of the move
        direction: Direction,
        /// Distance (m)
        distance: f32,
        /// Velocity (m/s)
        velocity: f32,
    },
    /// Turn an angle
    Turn {
        /// Direction of the turn
        turn: Turn,
        /// Angle (deg)
        angle: f32,
        /// Rate (deg/s)
        rate: f32,
    },
    /// Stop moving and hover
    Stop,
    /// Land at `velocity` (m/s)
    Land {
        /// Descent velocity (m/s)
        velocity: f32,
    },
}

/// Routines known by the autonomous flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RoutineKind {
    /// Take off, hover and land
    TakeOff,
    /// Square pattern in the four horizontal directions
    #[default]
    Linear,
    /// Hoop course
    HulaHoop,
}

/// Named list of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    /// Name used in logs
    pub name: &'static str,
    /// Steps, run in order
    pub steps: Vec<Step>,
}

impl Routine {
    /// Build the routine of a given kind
    pub fn of_kind(kind: RoutineKind) -> Self {
        match kind {
            RoutineKind::TakeOff => Self::take_off(),
            RoutineKind::Linear => Self::linear(),
            RoutineKind::HulaHoop => Self::hula_hoop(),
        }
    }

    /// Take off to 0.5 m, hover for 3 s and land
    pub fn take_off() -> Self {
        Self {
            name: "take-off",
            steps: vec![
                Step::TakeOff { height: 0.5, velocity: DEFAULT_VELOCITY },
                Step::Wait(Duration::from_secs(3)),
                Step::Stop,
                Step::Land { velocity: DEFAULT_VELOCITY },
            ],
        }
    }

    /// Move 0.5 m along each horizontal direction at 0.5 m height, pausing 1 s around each move
    pub fn linear() -> Self {
        let pause = Step::Wait(Duration::from_secs(1));
        let mut steps = vec![Step::TakeOff { height: 0.5, velocity: DEFAULT_VELOCITY }, pause];
        for direction in [Direction::Forward, Direction::Back, Direction::Left, Direction::Right] {
            steps.push(Step::Move {
                direction,
                distance: 0.5,
                velocity: DEFAULT_VELOCITY,
            });
            steps.push(pause);
        }
        steps.push(Step::Land { velocity: DEFAULT_VELOCITY });

        Self { name: "linear", steps }
    }

    /// Fly through a hoop: forward, dive under, turn, cross, climb and land beyond
    pub fn hula_hoop() -> Self {
        let speed = 0.5;
        let turn_rate = 90.0;
        let pause = Step::Wait(Duration::from_millis(500));
        let moves = [
            Step::Move { direction: Direction::Forward, distance: 0.95, velocity: speed },
            Step::Move { direction: Direction::Down, distance: 0.275, velocity: speed },
            Step::Turn { turn: Turn::Right, angle: 85.0, rate: turn_rate },
            Step::Move { direction: Direction::Forward, distance: 1.5, velocity: speed },
            Step::Move { direction: Direction::Up, distance: 0.75, velocity: speed },
            Step::Move { direction: Direction::Forward, distance: 0.5, velocity: speed },
            Step::Land { velocity: speed },
        ];

        let mut steps = vec![Step::TakeOff { height: 0.6, velocity: DEFAULT_VELOCITY }];
        for step in moves {
            steps.push(pause);
            steps.push(step);
        }
        steps.push(pause);

        Self { name: "hula-hoop", steps }
    }

    /// Time the routine takes when every motion goes as commanded
    ///
    /// Landing is counted from the height reached by the previous vertical moves. A step too long to be represented
    /// saturates the total at [Duration::MAX].
    pub fn nominal_duration(&self) -> Duration {
        let mut height = 0.0;
        self.steps.iter().fold(Duration::ZERO, |total, step| {
            let time = match *step {
                Step::TakeOff { height: h, velocity } => {
                    height = h;
                    step_time(h, velocity)
                }
                Step::Wait(duration) => duration,
                Step::Move { direction, distance, velocity } => {
                    height += direction.velocity(distance).2;
                    step_time(distance, velocity)
                }
                Step::Turn { angle, rate, .. } => step_time(angle, rate),
                Step::Stop => Duration::ZERO,
                Step::Land { velocity } => step_time(height, velocity),
            };
            total.saturating_add(time)
        })
    }
}

fn step_time(amount: f32, speed: f32) -> Duration {
    Duration::try_from_secs_f32(amount / speed).unwrap_or(Duration::MAX)
}

/// Run one step on `motion`, returns once the step is done
pub async fn run_step<M: Motion + ?Sized>(motion: &mut M, step: &Step) -> Result<()> {
    match *step {
        Step::TakeOff { height, velocity } => motion.take_off(height, velocity).await,
        Step::Wait(duration) => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
        Step::Move { direction, distance, velocity } => motion.move_distance(direction, distance, velocity).await,
        Step::Turn { turn, angle, rate } => motion.turn(turn, angle, rate).await,
        Step::Stop => motion.stop().await,
        Step::Land { velocity } => motion.land(velocity).await,
    }
}

/// Run all the steps of `routine` in order
///
/// Stops at the first failing step and returns its error, the caller is responsible for landing.
pub async fn run_routine<M: Motion + ?Sized>(motion: &mut M, routine: &Routine) -> Result<()> {
    log::info!("Starting routine {} ({} steps)", routine.name, routine.steps.len());
    for (index, step) in routine.steps.iter().enumerate() {
        log::debug!("Step {}: {:?}", index, step);
        run_step(motion, step).await?;
    }
    log::info!("Routine {} done", routine.name);
    Ok(())
}
