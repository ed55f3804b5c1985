//! # Crazyflie session
//!
//! [Session] is the only place of the crate talking to the [crazyflie_lib] SDK. It owns the connection for the whole
//! flow and adapts the SDK subsystems to the traits used by the rest of the crate:
//!  - param subsystem: [Session::watch_deck()] feeds a [ReadinessFlag],
//!  - log subsystem: [Session::pose_source()] returns a [PoseSource] over a started log block,
//!  - commander subsystem: [Session] implements [SetpointSink] for the [MotionCommander](crate::motion::MotionCommander).
//!
//! Together these make the session the [Vehicle] the [flight flow](crate::flight) runs on.
//!
//! The session is meant to be shared in an [Arc] between the flow and the motion commander. It must be closed with
//! [Session::close()]; dropping it also disconnects the Crazyflie, without waiting for the link to be closed.

use crate::flight::Vehicle;
use crate::motion::{HoverSetpoint, SetpointSink};
use crate::readiness::{self, ReadinessFlag};
use crate::telemetry::{Pose, PoseSource, POSE_VARIABLES};
use crate::toc_cache::FileTocCache;
use crate::{Config, Error, Result};
use async_trait::async_trait;
use crazyflie_lib::subsystems::log::{LogPeriod, LogStream};
use crazyflie_lib::Crazyflie;
use crazyflie_link::LinkContext;
use futures::lock::Mutex;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// # Connection to one Crazyflie
///
/// See the [module documentation](crate::session) for context.
pub struct Session {
    crazyflie: Arc<Crazyflie>,
    uri: String,
    closed: AtomicBool,
    watchers: Mutex<Vec<JoinHandle<()>>>,
    _link_context: LinkContext,
}

impl Session {
    /// Connect to the Crazyflie at `config.uri`
    ///
    /// The TOCs are cached in `config.cache_dir`. An unreachable Crazyflie is reported as [Error::Connection],
    /// there is no retry.
    pub async fn connect(config: &Config) -> Result<Self> {
        let link_context = LinkContext::new();

        log::info!("Connecting to {} ...", config.uri);
        let crazyflie = Crazyflie::connect_from_uri(
            &link_context,
            &config.uri,
            FileTocCache::new(&config.cache_dir),
        )
        .await
        .map_err(|e| Error::Connection {
            uri: config.uri.clone(),
            reason: format!("{:?}", e),
        })?;
        log::info!("Connected to {}", config.uri);

        Ok(Self {
            crazyflie: Arc::new(crazyflie),
            uri: config.uri.clone(),
            closed: AtomicBool::new(false),
            watchers: Mutex::new(Vec::new()),
            _link_context: link_context,
        })
    }

    /// URI of the connected Crazyflie
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Follow the deck parameter `name` and set `flag` once it reports the deck as attached
    ///
    /// The current value is read first, then every change notified by the Crazyflie is handled. Watching stops when
    /// the session is closed.
    pub async fn watch_deck(&self, name: &str, flag: ReadinessFlag) {
        // Subscribe before reading so that no change is missed in between
        let mut changes = self.crazyflie.param.watch_change().await;
        let crazyflie = self.crazyflie.clone();
        let name = name.to_string();

        let watcher = tokio::spawn(async move {
            match crazyflie.param.get_lossy(&name).await {
                Ok(value) => readiness::on_deck_value(&name, value, &flag),
                Err(e) => log::warn!("Cannot read parameter {}: {:?}", name, e),
            }

            while let Some((changed, value)) = changes.next().await {
                if changed == name {
                    readiness::on_deck_value(&name, value.to_f64_lossy(), &flag);
                }
            }
        });

        self.watchers.lock().await.push(watcher);
    }

    /// Create and start the pose log block
    ///
    /// The block contains the six [POSE_VARIABLES] and is sampled every `period`.
    pub async fn pose_source(&self, period: Duration) -> Result<SessionPoseSource> {
        let mut block = self.crazyflie.log.create_block().await?;
        for name in POSE_VARIABLES {
            block.add_variable(name).await?;
        }

        let period = LogPeriod::from_millis(period.as_millis() as u64)?;
        let stream = block.start(period).await?;
        log::debug!("Pose log block started");

        Ok(SessionPoseSource {
            stream: Some(stream),
        })
    }

    /// Disconnect the Crazyflie
    ///
    /// Only the first call disconnects, later calls return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for watcher in self.watchers.lock().await.drain(..) {
            watcher.abort();
        }

        self.crazyflie.disconnect().await;
        log::info!("Disconnected from {}", self.uri);
    }
}

#[async_trait]
impl Vehicle for Session {
    type Poses = SessionPoseSource;

    async fn watch_deck(&self, name: &str, flag: ReadinessFlag) {
        Session::watch_deck(self, name, flag).await
    }

    async fn pose_source(&self, period: Duration) -> Result<SessionPoseSource> {
        Session::pose_source(self, period).await
    }

    async fn close(&self) {
        Session::close(self).await
    }
}

#[async_trait]
impl SetpointSink for Session {
    async fn unlock_thrust(&self) -> Result<()> {
        self.crazyflie.commander.setpoint_rpyt(0.0, 0.0, 0.0, 0).await?;
        Ok(())
    }

    async fn hover(&self, setpoint: HoverSetpoint) -> Result<()> {
        self.crazyflie
            .commander
            .setpoint_hover(setpoint.vx, setpoint.vy, setpoint.yaw_rate, setpoint.z)
            .await?;
        Ok(())
    }

    async fn stop_setpoints(&self) -> Result<()> {
        self.crazyflie.commander.setpoint_stop().await?;
        self.crazyflie.commander.notify_setpoint_stop(0).await?;
        Ok(())
    }
}

/// [PoseSource] reading a started log block
pub struct SessionPoseSource {
    stream: Option<LogStream>,
}

#[async_trait]
impl PoseSource for SessionPoseSource {
    async fn next_pose(&mut self) -> Result<Pose> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| Error::Telemetry("pose log block already stopped".into()))?;

        let sample = stream.next().await?;
        Pose::from_variables(|name| sample.data.get(name).map(|value| value.to_f64_lossy() as f32))
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.stop().await?;
            log::debug!("Pose log block stopped");
        }
        Ok(())
    }
}
