//! Bounded, cancellable waiting over a page probe

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    errors::ProbeError,
    probe::PageProbe,
    types::{ReadinessCondition, WaitOptions, WaitOutcome},
};

/// Poll `condition` until it holds, `opts.timeout` elapses or `cancel` fires
///
/// A timeout is an ordinary outcome, not an error. Transient probe errors
/// count as "not ready yet"; any other probe error is returned as-is.
pub async fn await_condition(
    probe: &dyn PageProbe,
    condition: &ReadinessCondition,
    opts: &WaitOptions,
    cancel: &CancellationToken,
) -> Result<WaitOutcome, ProbeError> {
    if matches!(condition, ReadinessCondition::Immediate) {
        return Ok(WaitOutcome::Ready);
    }

    let started = Instant::now();
    let deadline = started + opts.timeout;
    let mut polls = 0u32;
    let mut last_error: Option<ProbeError> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(ProbeError::Interrupted(format!(
                "cancelled while waiting for {}",
                condition
            )));
        }

        polls += 1;
        match probe.check(condition).await {
            Ok(true) => {
                debug!(
                    condition = %condition,
                    polls = polls,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Readiness condition met"
                );
                return Ok(WaitOutcome::Ready);
            }
            Ok(false) => {}
            Err(err) if err.is_transient() => {
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }

        let now = Instant::now();
        if now >= deadline {
            let waited_ms = now.duration_since(started).as_millis() as u64;
            match last_error {
                Some(err) => warn!(
                    condition = %condition,
                    waited_ms = waited_ms,
                    "Readiness wait timed out, last probe error: {}",
                    err
                ),
                None => debug!(
                    condition = %condition,
                    waited_ms = waited_ms,
                    "Readiness wait timed out"
                ),
            }
            return Ok(WaitOutcome::TimedOut { waited_ms });
        }

        let nap = opts.poll_interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ProbeError::Interrupted(format!(
                    "cancelled while waiting for {}",
                    condition
                )));
            }
            _ = sleep(nap) => {}
        }
    }
}

/// Cancellable settle delay for actions whose completion has no UI signal
pub async fn settle(duration: Duration, cancel: &CancellationToken) -> Result<(), ProbeError> {
    if duration.is_zero() {
        return Ok(());
    }
    debug!("Settling for {}ms", duration.as_millis());
    tokio::select! {
        _ = cancel.cancelled() => Err(ProbeError::Interrupted("cancelled while settling".to_string())),
        _ = sleep(duration) => Ok(()),
    }
}
