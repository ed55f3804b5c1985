//! # Readiness gate
//!
//! Flying without the Flow deck is unsafe: the Crazyflie cannot hold a position without it. Before any motion the
//! flows therefore wait, for a bounded time, until the deck parameter reports the deck as attached.
//!
//! The notification side is a [ReadinessFlag] set by the deck watcher task (see
//! [Session::watch_deck()](crate::session::Session::watch_deck)), the waiting side is [wait_for_deck()].
//!
//! ``` no_run
//! # use std::time::Duration;
//! # use crazyflie_pilot::readiness::{self, ReadinessFlag};
//! # async fn gate() -> crazyflie_pilot::Result<()> {
//! let flag = ReadinessFlag::new();
//! let notifier = flag.clone();
//! tokio::spawn(async move { notifier.set(); });
//!
//! readiness::wait_for_deck(&flag, "deck.bcFlow2", Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// One-shot readiness flag
///
/// Cloning the flag gives another handle to the same flag. Once set it stays set.
#[derive(Debug, Clone)]
pub struct ReadinessFlag {
    state: Arc<watch::Sender<bool>>,
}

impl Default for ReadinessFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Set the flag
    ///
    /// Returns `true` if this call set the flag, `false` if it was already set.
    pub fn set(&self) -> bool {
        self.state.send_if_modified(|set| {
            if *set {
                false
            } else {
                *set = true;
                true
            }
        })
    }

    /// Current state of the flag
    pub fn is_set(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait for the flag to be set, at most `timeout`
    ///
    /// Returns `true` if the flag was set in time, `false` if the timeout elapsed first.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut state = self.state.subscribe();
        // The sender lives in self, wait_for() can only end with the flag set
        let waited = tokio::time::timeout(timeout, state.wait_for(|set| *set)).await;
        matches!(waited, Ok(Ok(_)))
    }
}

/// Handle one value reported for the deck parameter
///
/// Any non-zero value means the deck is attached and sets the flag.
pub fn on_deck_value(name: &str, value: f64, flag: &ReadinessFlag) {
    log::info!("{} = {}", name, value);
    if value != 0.0 {
        if flag.set() {
            log::info!("Deck is attached!");
        }
    } else {
        log::warn!("Deck is NOT attached!");
    }
}

/// Block the flow until the deck is reported attached
///
/// Returns [Error::DeckNotDetected] if `timeout` elapses first, the flows exit with code `1` in that case.
pub async fn wait_for_deck(flag: &ReadinessFlag, deck: &str, timeout: Duration) -> Result<()> {
    if flag.wait(timeout).await {
        Ok(())
    } else {
        log::error!("No flow deck detected!");
        Err(Error::DeckNotDetected {
            deck: deck.to_string(),
            timeout,
        })
    }
}
