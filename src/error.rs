use std::time::Duration;

/// [Result] alias for return types of the crate API
pub type Result<T> = std::result::Result<T, Error>;

/// Error enum type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The Crazyflie could not be reached at the configured URI.
    #[error("cannot connect to {uri}: {reason}")]
    Connection {
        /// URI that was used for the connection attempt
        uri: String,
        /// Error reported by the SDK
        reason: String,
    },
    /// Error returned by the Crazyflie SDK once connected. The String contains the reason.
    #[error("crazyflie error: {0}")]
    Sdk(String),
    /// Error from the Crazyflie link layer. The String contains the reason.
    #[error("link error: {0}")]
    Link(String),
    /// The deck parameter never reported the deck as attached in time.
    #[error("no {deck} deck detected within {timeout:?}")]
    DeckNotDetected {
        /// Name of the deck parameter that was watched
        deck: String,
        /// How long the gate waited
        timeout: Duration,
    },
    /// A telemetry sample did not contain the expected variable.
    #[error("telemetry error: {0}")]
    Telemetry(String),
    /// Motion parameters are out of range. The String contains the reason.
    #[error("invalid motion: {0}")]
    InvalidMotion(String),
    /// A motion command was issued while the Crazyflie is not flying.
    #[error("the Crazyflie is not flying")]
    NotFlying,
    /// Keyboard input error. The String contains the reason.
    #[error("input error: {0}")]
    Input(String),
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Pose table serialization error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<crazyflie_lib::Error> for Error {
    fn from(error: crazyflie_lib::Error) -> Self {
        Self::Sdk(format!("{:?}", error))
    }
}

impl From<crazyflie_link::Error> for Error {
    fn from(error: crazyflie_link::Error) -> Self {
        Self::Link(format!("{:?}", error))
    }
}

impl Error {
    /// Process exit code the flight programs use for this error.
    ///
    /// A missing deck exits with `1`, everything else with `2`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::DeckNotDetected { .. } => 1,
            _ => 2,
        }
    }
}
