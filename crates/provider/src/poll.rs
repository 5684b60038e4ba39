//! Bounded status polling

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use contabo_common::{Error, Phase, Result};

/// How often and how long to poll a resource for a terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            // Half an hour at the default interval
            max_attempts: 1800,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Fetch a resource until `phase` reports a terminal status.
///
/// Returns the first terminal observation. A `Failed` phase becomes
/// [`Error::ProvisioningFailed`]; exhausting the attempts becomes
/// [`Error::Timeout`]. Fetch errors are returned as-is without retrying.
pub async fn wait_until_terminal<T, F, Fut, P>(
    policy: PollPolicy,
    cancel: &CancellationToken,
    kind: &str,
    id: &str,
    mut fetch: F,
    phase: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> Phase,
{
    let cancelled = || Error::Cancelled {
        kind: kind.to_string(),
        id: id.to_string(),
    };
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let current = fetch().await?;
        match phase(&current) {
            Phase::Ready => return Ok(current),
            Phase::Failed(message) => {
                return Err(Error::ProvisioningFailed {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    message,
                })
            }
            Phase::Pending => {
                debug!("{} {} not ready (attempt {}/{})", kind, id, attempt, max_attempts);
            }
        }

        if attempt < max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    Err(Error::Timeout {
        kind: kind.to_string(),
        id: id.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contabo_common::InstanceStatus;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn sequence(statuses: &[InstanceStatus]) -> Mutex<VecDeque<InstanceStatus>> {
        Mutex::new(statuses.iter().copied().collect())
    }

    fn fast() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), 10)
    }

    async fn poll(seq: &Mutex<VecDeque<InstanceStatus>>, policy: PollPolicy) -> Result<InstanceStatus> {
        let cancel = CancellationToken::new();
        wait_until_terminal(
            policy,
            &cancel,
            "instance",
            "1",
            || async {
                let next = seq.lock().unwrap().pop_front();
                Ok(next.unwrap_or(InstanceStatus::Installing))
            },
            |s| s.phase(Some("boom")),
        )
        .await
    }

    #[tokio::test]
    async fn test_polls_until_running() {
        use InstanceStatus::*;
        let seq = sequence(&[Installing, Installing, Running]);
        assert_eq!(poll(&seq, fast()).await.unwrap(), Running);
        assert!(seq.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_provisioning_failure() {
        use InstanceStatus::*;
        let seq = sequence(&[Installing, Installing, Error]);
        let err = poll(&seq, fast()).await.unwrap_err();
        assert!(matches!(err, contabo_common::Error::ProvisioningFailed { ref message, .. } if message == "boom"));
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts() {
        let seq = sequence(&[]);
        let err = poll(&seq, PollPolicy::new(Duration::from_millis(1), 3)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = wait_until_terminal(
            fast(),
            &cancel,
            "image",
            "img",
            || async { Ok(InstanceStatus::Running) },
            |s| s.phase(None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let err = wait_until_terminal(
            PollPolicy::new(Duration::from_secs(60), 5),
            &cancel,
            "instance",
            "1",
            || async { Ok(InstanceStatus::Installing) },
            |s| s.phase(None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }
}
