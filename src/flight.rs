//! # Flight flow
//!
//! Both programs run the same flow once connected:
//!  1. watch the deck parameter and wait for the Flow deck ([readiness]),
//!  2. start the pose telemetry ([telemetry]),
//!  3. run a [Mission] on a [MotionCommander]: a [Routine] or a [KeyboardMission].
//!
//! [fly()] races the whole flow against an interrupt (Ctrl-C in the programs). However the flow ends (completed,
//! failed or interrupted) the cleanup is the same, in this order: land if flying, stop the telemetry, close the
//! vehicle connection.
//!
//! The vehicle is reached through the [Vehicle] trait, implemented by the [Session](crate::session::Session).

use crate::manual::{KeySource, ManualDriver};
use crate::motion::{Motion, MotionCommander, SetpointSink, DEFAULT_HEIGHT, DEFAULT_VELOCITY};
use crate::readiness::{self, ReadinessFlag};
use crate::routine::{self, Routine};
use crate::telemetry::{PoseSource, PoseTable, Telemetry, TelemetrySummary};
use crate::{Config, Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Connected vehicle, as seen by the flight flow
#[async_trait]
pub trait Vehicle: SetpointSink {
    /// Pose source returned by [Vehicle::pose_source()]
    type Poses: PoseSource + 'static;

    /// Follow the deck parameter `name`, setting `flag` once the deck is reported attached
    async fn watch_deck(&self, name: &str, flag: ReadinessFlag);

    /// Start sampling the pose every `period`
    async fn pose_source(&self, period: Duration) -> Result<Self::Poses>;

    /// Release the connection
    async fn close(&self);
}

/// What the vehicle does once the deck is ready and the telemetry is running
#[async_trait]
pub trait Mission: Send {
    /// Fly the mission. The flow lands afterwards if the Crazyflie is still flying.
    async fn run(&mut self, motion: &mut dyn Motion) -> Result<()>;
}

#[async_trait]
impl Mission for Routine {
    async fn run(&mut self, motion: &mut dyn Motion) -> Result<()> {
        routine::run_routine(motion, self).await
    }
}

/// Keyboard flight: open the key source, take off, then follow the keys
///
/// The key source is opened only when the mission starts, the terminal stays in its normal mode during the deck
/// gate.
pub struct KeyboardMission<F> {
    driver: ManualDriver,
    open: Option<F>,
}

impl<F> KeyboardMission<F> {
    /// Mission driven by `driver`, reading the keys from the source returned by `open`
    pub fn new(driver: ManualDriver, open: F) -> Self {
        Self {
            driver,
            open: Some(open),
        }
    }
}

#[async_trait]
impl<F, K> Mission for KeyboardMission<F>
where
    F: FnOnce() -> Result<K> + Send,
    K: KeySource + 'static,
{
    async fn run(&mut self, motion: &mut dyn Motion) -> Result<()> {
        let open = self
            .open
            .take()
            .ok_or_else(|| Error::Input("keyboard mission already flown".into()))?;
        let mut keys = open()?;

        motion.take_off(DEFAULT_HEIGHT, DEFAULT_VELOCITY).await?;
        self.driver.run(motion, &mut keys).await
    }
}

/// How the flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The mission ran to its end
    Completed,
    /// The interrupt fired first
    Interrupted,
}

/// Result of a flight that did not fail
#[derive(Debug, Clone, PartialEq)]
pub struct FlightReport {
    /// How the flow ended
    pub outcome: Outcome,
    /// What the telemetry recorded, `None` if it was never started
    pub telemetry: Option<TelemetrySummary>,
}

/// Run the flight flow on `vehicle`, then clean up and close it
///
/// `interrupt` is raced against the flow; when it completes first the flow is abandoned and the Crazyflie lands.
/// The first error of the flow or of the cleanup is returned, after the whole cleanup ran.
pub async fn fly<V, M, I>(vehicle: Arc<V>, config: &Config, mission: &mut M, interrupt: I) -> Result<FlightReport>
where
    V: Vehicle,
    M: Mission + ?Sized,
    I: Future<Output = ()> + Send,
{
    let mut commander = MotionCommander::new(vehicle.clone());
    let mut telemetry = None;

    let flown = tokio::select! {
        result = run(&*vehicle, config, mission, &mut commander, &mut telemetry) => result.map(|()| Outcome::Completed),
        () = interrupt => {
            log::warn!("Interrupted");
            Ok(Outcome::Interrupted)
        }
    };
    if let Err(e) = &flown {
        log::error!("Flight failed: {}", e);
    }

    let landed = commander.finish().await;
    let recorded = match telemetry {
        Some(telemetry) => Some(telemetry.stop().await),
        None => None,
    };
    vehicle.close().await;

    let outcome = flown?;
    landed?;
    let telemetry = recorded.transpose()?;
    Ok(FlightReport { outcome, telemetry })
}

async fn run<V, M>(
    vehicle: &V,
    config: &Config,
    mission: &mut M,
    commander: &mut MotionCommander<V>,
    telemetry: &mut Option<Telemetry>,
) -> Result<()>
where
    V: Vehicle,
    M: Mission + ?Sized,
{
    let deck = ReadinessFlag::new();
    vehicle.watch_deck(&config.deck_param, deck.clone()).await;
    readiness::wait_for_deck(&deck, &config.deck_param, config.deck_timeout).await?;

    let table = PoseTable::create(&config.output)?;
    let source = vehicle.pose_source(config.log_period).await?;
    *telemetry = Some(Telemetry::start(source, table));

    mission.run(commander).await
}

/// Completes on Ctrl-C
///
/// Never completes if the signal cannot be listened to.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
