use std::path::PathBuf;
use std::time::Duration;

/// Default radio URI of the Crazyflie, used when `CFURI` is not set
pub const DEFAULT_URI: &str = "radio://0/100/2M/E7E7E7E7E7";

/// Environment variable overriding the Crazyflie URI
pub const URI_ENV: &str = "CFURI";

/// # Flight configuration
///
/// Settings shared by both flight programs. [Config::default()] carries the values the programs fly with when
/// nothing is overridden; the binaries build on it from their command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Link URI of the Crazyflie
    pub uri: String,
    /// Directory holding the cached parameter and log TOCs
    pub cache_dir: PathBuf,
    /// Parameter that reports whether the positioning deck is attached
    pub deck_param: String,
    /// How long to wait for the deck to be reported before giving up
    pub deck_timeout: Duration,
    /// Period of the pose log block
    pub log_period: Duration,
    /// CSV file receiving one row per pose sample
    pub output: PathBuf,
    /// Horizontal and vertical speed of keyboard moves (m/s)
    pub manual_speed: f32,
    /// Yaw rate of keyboard turns (deg/s)
    pub manual_turn_rate: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            cache_dir: PathBuf::from("./cache"),
            deck_param: "deck.bcFlow2".to_string(),
            deck_timeout: Duration::from_secs(5),
            log_period: Duration::from_millis(10),
            output: PathBuf::from("meas.csv"),
            manual_speed: 0.1,
            manual_turn_rate: 36.0,
        }
    }
}

impl Config {
    /// Default configuration with the URI taken from the `CFURI` environment variable, if set
    pub fn from_env() -> Self {
        Self::with_uri_override(std::env::var(URI_ENV).ok())
    }

    fn with_uri_override(uri: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(uri) = uri.filter(|uri| !uri.trim().is_empty()) {
            config.uri = uri;
        }
        config
    }
}

/// Command line options shared by the flight programs
///
/// Every option left out keeps the value of the [Config] it is applied to.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FlightArgs {
    /// Crazyflie URI [default: $CFURI or radio://0/100/2M/E7E7E7E7E7]
    #[arg(long)]
    pub uri: Option<String>,
    /// CSV file receiving the pose samples [default: meas.csv]
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// TOC cache directory [default: ./cache]
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
    /// Seconds to wait for the Flow deck [default: 5]
    #[arg(long, value_parser = parse_seconds)]
    pub deck_timeout: Option<Duration>,
}

/// Parse a number of seconds, rejecting what does not fit a [Duration]
fn parse_seconds(arg: &str) -> std::result::Result<Duration, String> {
    let seconds: f32 = arg.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f32(seconds).map_err(|_| format!("{} is not a valid number of seconds", arg))
}

impl FlightArgs {
    /// Apply the options given on the command line to `config`
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(uri) = &self.uri {
            config.uri = uri.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if let Some(timeout) = self.deck_timeout {
            config.deck_timeout = timeout;
        }
        config
    }
}
