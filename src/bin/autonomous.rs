//! Fly one of the preset routines while recording the pose to a CSV file.
//!
//! The Crazyflie URI is taken from `--uri`, then from the `CFURI` environment variable. Exits with code 1 when no
//! Flow deck is detected. Ctrl-C once connected lands the Crazyflie, if flying, before exiting.

use clap::Parser;
use crazyflie_pilot::flight;
use crazyflie_pilot::routine::{Routine, RoutineKind};
use crazyflie_pilot::session::Session;
use crazyflie_pilot::{Config, Error, FlightArgs};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "cf-autonomous", version, about = "Fly a preset routine with the Crazyflie")]
struct Args {
    #[command(flatten)]
    flight: FlightArgs,
    /// Routine to fly
    #[arg(long, value_enum, default_value_t = RoutineKind::default())]
    routine: RoutineKind,
    /// Print the steps of the routine and exit without connecting
    #[arg(long)]
    dry_run: bool,
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
    let config = args.flight.apply(Config::from_env());
    let mut routine = Routine::of_kind(args.routine);
    log::info!(
        "Routine {}: {} steps, {:.1} s nominal",
        routine.name,
        routine.steps.len(),
        routine.nominal_duration().as_secs_f32()
    );

    if args.dry_run {
        for step in &routine.steps {
            println!("{:?}", step);
        }
        return Ok(());
    }

    let session = Arc::new(Session::connect(&config).await?);
    log::info!("Flying {} with the Crazyflie at {}", routine.name, session.uri());

    let report = flight::fly(session, &config, &mut routine, flight::ctrl_c()).await?;
    if let Some(summary) = report.telemetry {
        log::info!("Flight {:?}, last pose {:?}", report.outcome, summary.last_pose);
    }

    Ok(())
}
