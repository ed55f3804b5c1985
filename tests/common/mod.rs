// Test doubles standing in for the Crazyflie and the keyboard

#![allow(dead_code)]

use async_trait::async_trait;
use crazyflie_pilot::manual::{KeySource, KeyState};
use crazyflie_pilot::motion::{Direction, HoverSetpoint, Motion, SetpointSink, Turn};
use crazyflie_pilot::telemetry::{Pose, PoseSource};
use crazyflie_pilot::flight::Vehicle;
use crazyflie_pilot::readiness::{self, ReadinessFlag};
use crazyflie_pilot::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Motion call as seen by [RecordingMotion]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TakeOff(f32, f32),
    Move(Direction, f32, f32),
    Turn(Turn, f32, f32),
    StartMove(Direction, f32),
    StartTurn(Turn, f32),
    Stop,
    Land(f32),
}

/// Records every motion call and the time it was issued, blocking calls sleep like the real commander
#[derive(Debug, Default)]
pub struct RecordingMotion {
    pub commands: Vec<Command>,
    pub times: Vec<Instant>,
}

impl RecordingMotion {
    fn record(&mut self, command: Command) {
        self.commands.push(command);
        self.times.push(Instant::now());
    }
}

#[async_trait]
impl Motion for RecordingMotion {
    async fn take_off(&mut self, height: f32, velocity: f32) -> Result<()> {
        self.record(Command::TakeOff(height, velocity));
        tokio::time::sleep(Duration::from_secs_f32(height / velocity)).await;
        Ok(())
    }

    async fn move_distance(&mut self, direction: Direction, distance: f32, velocity: f32) -> Result<()> {
        self.record(Command::Move(direction, distance, velocity));
        tokio::time::sleep(Duration::from_secs_f32(distance / velocity)).await;
        Ok(())
    }

    async fn turn(&mut self, turn: Turn, angle: f32, rate: f32) -> Result<()> {
        self.record(Command::Turn(turn, angle, rate));
        tokio::time::sleep(Duration::from_secs_f32(angle / rate)).await;
        Ok(())
    }

    async fn start_move(&mut self, direction: Direction, velocity: f32) -> Result<()> {
        self.record(Command::StartMove(direction, velocity));
        Ok(())
    }

    async fn start_turn(&mut self, turn: Turn, rate: f32) -> Result<()> {
        self.record(Command::StartTurn(turn, rate));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.record(Command::Stop);
        Ok(())
    }

    async fn land(&mut self, velocity: f32) -> Result<()> {
        self.record(Command::Land(velocity));
        Ok(())
    }
}

/// Key source replaying a fixed list of states, then closing
pub struct ScriptedKeys {
    pub states: VecDeque<KeyState>,
}

impl ScriptedKeys {
    pub fn new(states: impl IntoIterator<Item = KeyState>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }
}

#[async_trait]
impl KeySource for ScriptedKeys {
    async fn next_state(&mut self) -> Result<Option<KeyState>> {
        Ok(self.states.pop_front())
    }
}

/// Pose source fed from a channel, never ends on its own
pub struct ChannelPoseSource {
    samples: flume::Receiver<Pose>,
    pub stopped: Arc<AtomicBool>,
}

impl ChannelPoseSource {
    pub fn new() -> (flume::Sender<Pose>, Self) {
        let (tx, samples) = flume::unbounded();
        let source = Self {
            samples,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        (tx, source)
    }
}

#[async_trait]
impl PoseSource for ChannelPoseSource {
    async fn next_pose(&mut self) -> Result<Pose> {
        match self.samples.recv_async().await {
            Ok(pose) => Ok(pose),
            Err(_) => futures::future::pending().await,
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Setpoint call as seen by [RecordingSink]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkCall {
    Unlock,
    Hover(HoverSetpoint),
    Stop,
}

/// Records every setpoint sent by a motion commander
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<(Instant, SinkCall)>>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    /// Sink accepting `hovers` hover setpoints, then failing every one
    pub fn failing_after(hovers: usize) -> Self {
        Self {
            fail_after: Some(hovers),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().iter().map(|(_, call)| *call).collect()
    }

    pub fn hovers(&self) -> Vec<(Instant, HoverSetpoint)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(time, call)| match call {
                SinkCall::Hover(setpoint) => Some((*time, *setpoint)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

#[async_trait]
impl SetpointSink for RecordingSink {
    async fn unlock_thrust(&self) -> Result<()> {
        self.record(SinkCall::Unlock);
        Ok(())
    }

    async fn hover(&self, setpoint: HoverSetpoint) -> Result<()> {
        if self.fail_after.is_some_and(|limit| self.hovers().len() >= limit) {
            return Err(Error::Sdk("link lost".into()));
        }
        self.record(SinkCall::Hover(setpoint));
        Ok(())
    }

    async fn stop_setpoints(&self) -> Result<()> {
        self.record(SinkCall::Stop);
        Ok(())
    }
}

pub fn pose(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Pose {
    Pose { x, y, z, roll, pitch, yaw }
}

/// Vehicle double: reports the deck after a delay, records setpoints, tracks stop and close
#[derive(Debug, Default)]
pub struct FakeVehicle {
    pub sink: RecordingSink,
    /// Delay before the deck is reported attached, never if `None`
    pub deck_delay: Option<Duration>,
    pub samples: Mutex<Option<flume::Sender<Pose>>>,
    pub source_stopped: Arc<AtomicBool>,
    pub closed: AtomicBool,
}

impl FakeVehicle {
    pub fn with_deck_after(delay: Duration) -> Self {
        Self {
            deck_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn without_deck() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn source_stopped(&self) -> bool {
        self.source_stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SetpointSink for FakeVehicle {
    async fn unlock_thrust(&self) -> Result<()> {
        self.sink.unlock_thrust().await
    }

    async fn hover(&self, setpoint: HoverSetpoint) -> Result<()> {
        self.sink.hover(setpoint).await
    }

    async fn stop_setpoints(&self) -> Result<()> {
        self.sink.stop_setpoints().await
    }
}

#[async_trait]
impl Vehicle for FakeVehicle {
    type Poses = ChannelPoseSource;

    async fn watch_deck(&self, name: &str, flag: ReadinessFlag) {
        if let Some(delay) = self.deck_delay {
            let name = name.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                readiness::on_deck_value(&name, 1.0, &flag);
            });
        }
    }

    async fn pose_source(&self, _period: Duration) -> Result<ChannelPoseSource> {
        let (samples, mut source) = ChannelPoseSource::new();
        source.stopped = self.source_stopped.clone();
        *self.samples.lock().unwrap() = Some(samples);
        Ok(source)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
