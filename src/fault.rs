use crate::error::{FtError, Result};
use crate::types::Round;
use std::time::Duration;

/// Crashes the participant at a configured round to exercise recovery.
///
/// The crash is surfaced as [`FtError::InjectedFault`]; the binary turns it
/// into an immediate non-zero exit, tests assert on it directly.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    fail_at: Option<Round>,
    delay: Duration,
}

impl FaultInjector {
    /// `fail_at` of `None` or `Some(0)` disables injection.
    pub fn new(fail_at: Option<Round>, delay: Duration) -> Self {
        Self {
            fail_at: fail_at.filter(|&r| r > 0),
            delay,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Fail if `round` is the configured crash round.
    ///
    /// Sleeps for the configured delay first, modelling the time the
    /// surrounding cluster needs to notice the failure.
    pub async fn maybe_fail(&self, round: Round) -> Result<()> {
        if self.fail_at != Some(round) {
            return Ok(());
        }
        tracing::warn!(round, delay_ms = self.delay.as_millis() as u64, "injecting fault");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Err(FtError::InjectedFault { round })
    }
}
