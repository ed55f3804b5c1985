//! # Crazyflie pilot
//!
//! This crate contains the orchestration shared by two flight programs for the Crazyflie:
//!  - `cf-autonomous` flies a preset, open-loop sequence of moves.
//!  - `cf-manual` translates held keyboard keys into live motion commands.
//!
//! Everything that talks to the vehicle goes through the [crazyflie-lib] SDK. This crate only glues the SDK
//! subsystems together in the same four stages for both programs:
//!
//! | Stage | Module |
//! |-------|--------|
//! | Connection | [session] |
//! | Flow deck readiness gate | [readiness] |
//! | Pose telemetry to CSV | [telemetry] |
//! | Motion | [motion], [routine], [manual] |
//!
//! [flight] chains the stages after the connection and owns the cleanup. The stages communicate through small traits
//! ([flight::Vehicle], [telemetry::PoseSource], [motion::Motion], [motion::SetpointSink], [manual::KeySource]) so
//! that the flows can be exercised without a radio.
//!
//! A typical flow looks like this:
//! ``` no_run
//! # use crazyflie_pilot::{Config, session::Session, readiness::{self, ReadinessFlag}};
//! # use crazyflie_pilot::telemetry::{PoseTable, Telemetry};
//! # async fn fly() -> crazyflie_pilot::Result<()> {
//! let config = Config::default();
//! let session = Session::connect(&config).await?;
//!
//! let deck = ReadinessFlag::new();
//! session.watch_deck(&config.deck_param, deck.clone()).await;
//! readiness::wait_for_deck(&deck, &config.deck_param, config.deck_timeout).await?;
//!
//! let source = session.pose_source(config.log_period).await?;
//! let telemetry = Telemetry::start(source, PoseTable::create(&config.output)?);
//!
//! // ... fly ...
//!
//! telemetry.stop().await?;
//! session.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! [crazyflie-lib]: https://crates.io/crates/crazyflie-lib

#![warn(missing_docs)]

mod config;
mod error;

pub mod flight;
pub mod manual;
pub mod motion;
pub mod readiness;
pub mod routine;
pub mod session;
pub mod telemetry;
pub mod toc_cache;

pub use crate::config::{Config, FlightArgs, DEFAULT_URI, URI_ENV};
pub use crate::error::{Error, Result};
