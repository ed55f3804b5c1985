//! # Motion commander
//!
//! The flows describe flight in terms of simple motions: take off, move forward 0.5 m, turn right 90°, land...
//! The [Motion] trait is that vocabulary. It exists in two flavours:
//!  - **Blocking** motions ([Motion::move_distance()], [Motion::turn()], [Motion::take_off()], [Motion::land()])
//!    return once the motion is done.
//!  - **Continuous** motions ([Motion::start_move()], [Motion::start_turn()]) set a velocity and return
//!    immediately; the Crazyflie keeps going until another motion or [Motion::stop()].
//!
//! [MotionCommander] implements it on top of the hover setpoint of the Crazyflie commander: a background task
//! sends the current target velocity and height every 100 ms, the height being integrated from the vertical
//! velocity since the last velocity change. The Crazyflie needs a position estimate for this to work, hence the
//! Flow deck requirement.
//!
//! If a setpoint cannot be sent the stream ends, and the next motion command returns the error.
//!
//! The commander does not close any loop itself, a blocking move of `d` meters at `v` m/s is a velocity of `v` held
//! for `d / v` seconds.

use crate::{Error, Result};
use async_trait::async_trait;
use futures::lock::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Velocity used when none is given (m/s)
pub const DEFAULT_VELOCITY: f32 = 0.2;

/// Yaw rate used when none is given (deg/s)
pub const DEFAULT_RATE: f32 = 360.0 / 5.0;

/// Height of a take-off when none is given (m)
pub const DEFAULT_HEIGHT: f32 = 0.3;

/// Period of the hover setpoints sent while flying
pub const SETPOINT_PERIOD: Duration = Duration::from_millis(100);

/// Direction of a translation, in the body frame of the Crazyflie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Positive x
    Forward,
    /// Negative x
    Back,
    /// Positive y
    Left,
    /// Negative y
    Right,
    /// Positive z
    Up,
    /// Negative z
    Down,
}

impl Direction {
    /// Velocity vector `(vx, vy, vz)` of a motion at `speed` in this direction
    pub fn velocity(self, speed: f32) -> (f32, f32, f32) {
        match self {
            Direction::Forward => (speed, 0.0, 0.0),
            Direction::Back => (-speed, 0.0, 0.0),
            Direction::Left => (0.0, speed, 0.0),
            Direction::Right => (0.0, -speed, 0.0),
            Direction::Up => (0.0, 0.0, speed),
            Direction::Down => (0.0, 0.0, -speed),
        }
    }
}

/// Direction of a rotation around the z axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Turn {
    /// Counter-clockwise seen from above
    Left,
    /// Clockwise seen from above
    Right,
}

impl Turn {
    /// Yaw rate sent in the hover setpoint for a turn at `rate` deg/s
    ///
    /// The hover setpoint yaw rate is positive clockwise.
    pub fn yaw_rate(self, rate: f32) -> f32 {
        match self {
            Turn::Left => -rate,
            Turn::Right => rate,
        }
    }
}

/// Motion commands understood by the flows
#[async_trait]
pub trait Motion: Send {
    /// Take off to `height` (m), climbing at `velocity` (m/s)
    async fn take_off(&mut self, height: f32, velocity: f32) -> Result<()>;

    /// Move `distance` (m) in `direction` at `velocity` (m/s), returns when done
    async fn move_distance(&mut self, direction: Direction, distance: f32, velocity: f32) -> Result<()>;

    /// Turn `angle` (deg) at `rate` (deg/s), returns when done
    async fn turn(&mut self, turn: Turn, angle: f32, rate: f32) -> Result<()>;

    /// Start moving in `direction` at `velocity` (m/s) and return immediately
    async fn start_move(&mut self, direction: Direction, velocity: f32) -> Result<()>;

    /// Start turning at `rate` (deg/s) and return immediately
    async fn start_turn(&mut self, turn: Turn, rate: f32) -> Result<()>;

    /// Stop any motion and hover in place
    async fn stop(&mut self) -> Result<()>;

    /// Descend at `velocity` (m/s) to the ground and stop the motors
    async fn land(&mut self, velocity: f32) -> Result<()>;
}

/// Hover setpoint: body-frame velocity, yaw rate and absolute height
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HoverSetpoint {
    /// Forward velocity (m/s)
    pub vx: f32,
    /// Left velocity (m/s)
    pub vy: f32,
    /// Yaw rate (deg/s)
    pub yaw_rate: f32,
    /// Height above the ground (m)
    pub z: f32,
}

/// Where [MotionCommander] sends its setpoints
///
/// Implemented by the [session](crate::session::Session) over the Crazyflie commander.
#[async_trait]
pub trait SetpointSink: Send + Sync + 'static {
    /// Unlock the thrust, required once before the first setpoint
    async fn unlock_thrust(&self) -> Result<()>;

    /// Send one hover setpoint
    async fn hover(&self, setpoint: HoverSetpoint) -> Result<()>;

    /// Stop the motors and hand the control back to the firmware
    async fn stop_setpoints(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct Target {
    vx: f32,
    vy: f32,
    vz: f32,
    yaw_rate: f32,
    // Height at `since`, integrated with vz from there
    height: f32,
    since: Instant,
}

impl Target {
    fn grounded() -> Self {
        Self {
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            yaw_rate: 0.0,
            height: 0.0,
            since: Instant::now(),
        }
    }

    fn height_at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.since).as_secs_f32();
        (self.height + self.vz * elapsed).max(0.0)
    }
}

struct Streamer {
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
    _cancel_on_drop: DropGuard,
}

/// # Hover-setpoint motion commander
///
/// See the [module documentation](crate::motion) for context.
///
/// The commander must be landed with [Motion::land()] or [MotionCommander::finish()]. If it is dropped while
/// flying the setpoint stream just ends and the Crazyflie firmware cuts the motors after its setpoint timeout.
pub struct MotionCommander<S: SetpointSink> {
    sink: Arc<S>,
    target: Arc<Mutex<Target>>,
    streamer: Option<Streamer>,
    period: Duration,
}

impl<S: SetpointSink> MotionCommander<S> {
    /// Create a landed commander sending setpoints to `sink`
    pub fn new(sink: Arc<S>) -> Self {
        Self::with_period(sink, SETPOINT_PERIOD)
    }

    /// Create a commander with a custom setpoint period
    pub fn with_period(sink: Arc<S>, period: Duration) -> Self {
        Self {
            sink,
            target: Arc::new(Mutex::new(Target::grounded())),
            streamer: None,
            period,
        }
    }

    /// True between take-off and landing
    ///
    /// Stays true after the setpoint stream failed, until the next command reports the failure.
    pub fn is_flying(&self) -> bool {
        self.streamer.is_some()
    }

    /// Height the commander is currently holding (m)
    pub async fn height(&self) -> f32 {
        self.target.lock().await.height_at(Instant::now())
    }

    /// Land at [DEFAULT_VELOCITY] if still flying
    pub async fn finish(&mut self) -> Result<()> {
        if self.is_flying() {
            log::info!("Landing before releasing the motion commander");
            self.land(DEFAULT_VELOCITY).await?;
        }
        Ok(())
    }

    async fn ensure_flying(&mut self) -> Result<()> {
        let stream_ended = match &self.streamer {
            None => return Err(Error::NotFlying),
            Some(streamer) => streamer.task.is_finished(),
        };
        if stream_ended {
            // The stream only ends by itself on a setpoint error, reported here
            self.stop_streaming().await?;
            return Err(Error::NotFlying);
        }
        Ok(())
    }

    async fn set_velocity(&self, vx: f32, vy: f32, vz: f32, yaw_rate: f32) {
        let mut target = self.target.lock().await;
        let now = Instant::now();
        target.height = target.height_at(now);
        target.since = now;
        target.vx = vx;
        target.vy = vy;
        target.vz = vz;
        target.yaw_rate = yaw_rate;
    }

    fn start_streaming(&mut self) {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let sink = self.sink.clone();
        let target = self.target.clone();
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => return Ok(()),
                    _ = ticker.tick() => (),
                }

                let setpoint = {
                    let target = target.lock().await;
                    HoverSetpoint {
                        vx: target.vx,
                        vy: target.vy,
                        yaw_rate: target.yaw_rate,
                        z: target.height_at(Instant::now()),
                    }
                };

                if let Err(e) = sink.hover(setpoint).await {
                    log::error!("Cannot send hover setpoint: {}", e);
                    return Err(e);
                }
            }
        });

        self.streamer = Some(Streamer {
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        });
    }

    async fn stop_streaming(&mut self) -> Result<()> {
        if let Some(streamer) = self.streamer.take() {
            streamer.cancel.cancel();
            streamer
                .task
                .await
                .map_err(|e| Error::Sdk(format!("setpoint task failed: {}", e)))??;
        }
        Ok(())
    }
}

fn check_speed(what: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidMotion(format!("{} must be positive, got {}", what, value)))
    }
}

fn check_amount(what: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidMotion(format!("{} must not be negative, got {}", what, value)))
    }
}

fn travel_time(amount: f32, speed: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(amount / speed)
        .map_err(|_| Error::InvalidMotion(format!("{} at {} does not fit a duration", amount, speed)))
}

#[async_trait]
impl<S: SetpointSink> Motion for MotionCommander<S> {
    async fn take_off(&mut self, height: f32, velocity: f32) -> Result<()> {
        if self.is_flying() {
            return Err(Error::InvalidMotion("already flying".into()));
        }
        check_amount("height", height)?;
        check_speed("velocity", velocity)?;
        travel_time(height, velocity)?;

        log::info!("Taking off to {} m", height);
        *self.target.lock().await = Target::grounded();
        self.sink.unlock_thrust().await?;
        self.start_streaming();

        self.move_distance(Direction::Up, height, velocity).await
    }

    async fn move_distance(&mut self, direction: Direction, distance: f32, velocity: f32) -> Result<()> {
        check_amount("distance", distance)?;
        check_speed("velocity", velocity)?;
        let duration = travel_time(distance, velocity)?;
        self.start_move(direction, velocity).await?;
        tokio::time::sleep(duration).await;
        self.stop().await
    }

    async fn turn(&mut self, turn: Turn, angle: f32, rate: f32) -> Result<()> {
        check_amount("angle", angle)?;
        check_speed("rate", rate)?;
        let duration = travel_time(angle, rate)?;
        self.start_turn(turn, rate).await?;
        tokio::time::sleep(duration).await;
        self.stop().await
    }

    async fn start_move(&mut self, direction: Direction, velocity: f32) -> Result<()> {
        self.ensure_flying().await?;
        check_speed("velocity", velocity)?;
        let (vx, vy, vz) = direction.velocity(velocity);
        log::debug!("Moving {:?} at {} m/s", direction, velocity);
        self.set_velocity(vx, vy, vz, 0.0).await;
        Ok(())
    }

    async fn start_turn(&mut self, turn: Turn, rate: f32) -> Result<()> {
        self.ensure_flying().await?;
        check_speed("rate", rate)?;
        log::debug!("Turning {:?} at {} deg/s", turn, rate);
        self.set_velocity(0.0, 0.0, 0.0, turn.yaw_rate(rate)).await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.ensure_flying().await?;
        self.set_velocity(0.0, 0.0, 0.0, 0.0).await;
        Ok(())
    }

    async fn land(&mut self, velocity: f32) -> Result<()> {
        self.ensure_flying().await?;
        check_speed("velocity", velocity)?;

        let height = self.height().await;
        log::info!("Landing from {:.2} m", height);
        self.move_distance(Direction::Down, height, velocity).await?;

        self.stop_streaming().await?;
        self.sink.stop_setpoints().await
    }
}
