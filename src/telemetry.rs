//! # Pose telemetry
//!
//! While flying, the Crazyflie pushes its state estimate through a log block. Every sample is:
//!  - published as the latest [Pose], readable through [Telemetry::latest()] or [Telemetry::subscribe()],
//!  - appended to the pose table, a CSV file with the columns `x,y,z,roll,pitch,yaw`.
//!
//! Samples are read by a producer task and handed over a queue to a single consumer task. The consumer is the only
//! writer of both the latest pose and the table, and a slow disk never delays the reading of the log stream.
//!
//! The table file is flushed after every row, it is a complete CSV table at any time during the flight. Stopping
//! records every sample the source already delivered before the log block is stopped.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Log variables making a pose, in column order
pub const POSE_VARIABLES: [&str; 6] = [
    "stateEstimate.x",
    "stateEstimate.y",
    "stateEstimate.z",
    "stateEstimate.roll",
    "stateEstimate.pitch",
    "stateEstimate.yaw",
];

/// Column names of the pose table
pub const POSE_COLUMNS: [&str; 6] = ["x", "y", "z", "roll", "pitch", "yaw"];

/// Position (m) and attitude (deg) estimate of the Crazyflie
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    /// X position (m)
    pub x: f32,
    /// Y position (m)
    pub y: f32,
    /// Z position (m)
    pub z: f32,
    /// Roll (deg)
    pub roll: f32,
    /// Pitch (deg)
    pub pitch: f32,
    /// Yaw (deg)
    pub yaw: f32,
}

impl Pose {
    /// Build a pose by looking up each of the [POSE_VARIABLES]
    ///
    /// Returns [Error::Telemetry] naming the first variable missing from the sample.
    pub fn from_variables(mut lookup: impl FnMut(&str) -> Option<f32>) -> Result<Self> {
        let mut values = [0.0; 6];
        for (value, name) in values.iter_mut().zip(POSE_VARIABLES) {
            *value = lookup(name)
                .ok_or_else(|| Error::Telemetry(format!("log variable {} missing from sample", name)))?;
        }
        let [x, y, z, roll, pitch, yaw] = values;
        Ok(Self { x, y, z, roll, pitch, yaw })
    }
}

/// Source of pose samples
///
/// The Crazyflie implementation is [SessionPoseSource](crate::session::SessionPoseSource), which reads a started
/// log block.
#[async_trait]
pub trait PoseSource: Send {
    /// Wait for the next sample
    async fn next_pose(&mut self) -> Result<Pose>;

    /// Stop producing samples
    async fn stop(&mut self) -> Result<()>;
}

/// Append-only pose table persisted as CSV
pub struct PoseTable {
    writer: csv::Writer<Box<dyn Write + Send>>,
    path: PathBuf,
    rows: usize,
}

impl PoseTable {
    /// Create, or truncate, the table file and write the header
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::create(&path)?;
        Self::with_writer(file, path)
    }

    /// Write the table to `writer`, `path` only names it in logs and in the [TelemetrySummary]
    pub fn with_writer(writer: impl Write + Send + 'static, path: impl Into<PathBuf>) -> Result<Self> {
        let writer: Box<dyn Write + Send> = Box::new(writer);
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        writer.write_record(POSE_COLUMNS)?;
        writer.flush()?;

        Ok(Self {
            writer,
            path: path.into(),
            rows: 0,
        })
    }

    /// Append one row and flush it to disk
    pub fn append(&mut self, pose: &Pose) -> Result<()> {
        self.writer.serialize(pose)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Number of rows written
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Path of the table file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What the telemetry recorded, returned by [Telemetry::stop()]
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySummary {
    /// Number of samples written to the table
    pub samples: usize,
    /// Path of the table file
    pub path: PathBuf,
    /// Last pose received
    pub last_pose: Pose,
}

/// # Running pose subscription
///
/// Created by [Telemetry::start()], must be ended with [Telemetry::stop()] to stop the log block on the Crazyflie.
/// Dropping it cancels the tasks but cannot wait for the log block to be stopped.
pub struct Telemetry {
    pose: watch::Receiver<Pose>,
    cancel: CancellationToken,
    producer: JoinHandle<Result<()>>,
    consumer: JoinHandle<Result<PoseTable>>,
    _cancel_on_drop: DropGuard,
}

impl Telemetry {
    /// Start reading `source` and recording into `table`
    pub fn start<S: PoseSource + 'static>(mut source: S, mut table: PoseTable) -> Self {
        let cancel = CancellationToken::new();
        let (queue, samples) = flume::unbounded::<Pose>();
        let (latest, pose) = watch::channel(Pose::default());

        let producer_cancel = cancel.clone();
        let producer = tokio::spawn(async move {
            let mut result = Ok(());
            loop {
                // Samples already delivered win over cancellation
                tokio::select! {
                    biased;
                    sample = source.next_pose() => match sample {
                        Ok(pose) => {
                            if queue.send_async(pose).await.is_err() {
                                // Consumer gone, it reports its own error
                                break;
                            }
                        }
                        Err(e) => {
                            log::error!("Pose stream failed: {}", e);
                            result = Err(e);
                            break;
                        }
                    },
                    _ = producer_cancel.cancelled() => break,
                }
            }
            drop(queue);

            let stopped = source.stop().await;
            result.and(stopped)
        });

        let consumer = tokio::spawn(async move {
            while let Ok(pose) = samples.recv_async().await {
                table.append(&pose)?;
                latest.send_replace(pose);
            }
            Ok(table)
        });

        log::debug!("Pose telemetry started");

        Self {
            pose,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            producer,
            consumer,
        }
    }

    /// Latest pose received, all zeros before the first sample
    pub fn latest(&self) -> Pose {
        *self.pose.borrow()
    }

    /// Receiver notified of every new pose
    ///
    /// When the receiver is notified, the pose has already been written to the table.
    pub fn subscribe(&self) -> watch::Receiver<Pose> {
        self.pose.clone()
    }

    /// Stop the subscription
    ///
    /// Records the samples already delivered by the source, stops it and returns what was recorded.
    pub async fn stop(self) -> Result<TelemetrySummary> {
        self.cancel.cancel();

        let produced = self.producer.await.map_err(join_error)?;
        let table = self.consumer.await.map_err(join_error)??;
        produced?;

        let summary = TelemetrySummary {
            samples: table.rows(),
            path: table.path().to_path_buf(),
            last_pose: *self.pose.borrow(),
        };
        log::info!("{} pose samples written to {}", summary.samples, summary.path.display());

        Ok(summary)
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Telemetry(format!("telemetry task failed: {}", e))
}
