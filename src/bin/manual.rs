//! Fly the Crazyflie from the keyboard while recording the pose to a CSV file.
//!
//! W,A,S,D move horizontally, Space and Shift vertically, Q and E turn, Esc (or Ctrl-C) lands and exits.

use clap::Parser;
use crazyflie_pilot::flight::{self, KeyboardMission};
use crazyflie_pilot::manual::{ManualDriver, TerminalKeys, HELP};
use crazyflie_pilot::session::Session;
use crazyflie_pilot::{Config, Error, FlightArgs};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "cf-manual", version, about = "Fly the Crazyflie from the keyboard")]
struct Args {
    #[command(flatten)]
    flight: FlightArgs,
    /// Speed of the moves (m/s) [default: 0.1]
    #[arg(long)]
    speed: Option<f32>,
    /// Rate of the turns (deg/s) [default: 36]
    #[arg(long)]
    turn_rate: Option<f32>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        log::error!("{:#}", e);
        let code = e.downcast_ref::<Error>().map_or(2, Error::exit_code);
        std::process::exit(code);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = args.flight.apply(Config::from_env());
    if let Some(speed) = args.speed {
        config.manual_speed = speed;
    }
    if let Some(turn_rate) = args.turn_rate {
        config.manual_turn_rate = turn_rate;
    }

    let session = Arc::new(Session::connect(&config).await?);
    log::info!("Flying the Crazyflie at {} from the keyboard", session.uri());

    let driver = ManualDriver::new(config.manual_speed, config.manual_turn_rate);
    let mut mission = KeyboardMission::new(driver, || {
        println!("{}", HELP);
        TerminalKeys::open()
    });
    // Ctrl-C reaches the key source as esc once the terminal is in raw mode
    let report = flight::fly(session, &config, &mut mission, flight::ctrl_c()).await?;
    if let Some(summary) = report.telemetry {
        log::info!("Flight {:?}, last pose {:?}", report.outcome, summary.last_pose);
    }

    Ok(())
}
