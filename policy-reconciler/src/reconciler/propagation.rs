//! Wait for an accepted write to become consistently readable.

use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clients::{PolicyDefinition, PolicyDefinitionsApi};
use crate::config::PropagationConfig;
use crate::error::{ReconcileError, Result};

/// Observation from a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Record not visible yet.
    Pending,
    /// Record present.
    Target,
}

/// Poll `get(name)` until the record has been seen `stable_polls` times in a
/// row. A not-found read is pending and resets the streak; any other read
/// error aborts the wait. Returns the record from the final poll.
pub async fn wait_for_propagation(
    api: &dyn PolicyDefinitionsApi,
    name: &str,
    config: &PropagationConfig,
    cancel: &CancellationToken,
) -> Result<PolicyDefinition> {
    info!(
        "Waiting for policy definition {} to become available (timeout {:?})",
        name, config.timeout
    );
    let started = Instant::now();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::OperationCancelled { name: name.to_string() }),
        result = timeout(config.timeout, poll(api, name, config, cancel)) => match result {
            Ok(outcome) => {
                if outcome.is_ok() {
                    info!(
                        "Policy definition {} available after {:?}",
                        name,
                        started.elapsed()
                    );
                }
                outcome
            }
            Err(_) => Err(ReconcileError::PropagationTimeout {
                name: name.to_string(),
                timeout: config.timeout,
            }),
        },
    }
}

async fn poll(
    api: &dyn PolicyDefinitionsApi,
    name: &str,
    config: &PropagationConfig,
    cancel: &CancellationToken,
) -> Result<PolicyDefinition> {
    let required = config.stable_polls.max(1);
    let mut streak = 0u32;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(ReconcileError::OperationCancelled {
                name: name.to_string(),
            });
        }

        attempt += 1;
        let status = match api.get(name).await {
            Ok(definition) => {
                streak += 1;
                if streak >= required {
                    return Ok(definition);
                }
                PollStatus::Target
            }
            Err(e) if e.is_not_found() => {
                streak = 0;
                PollStatus::Pending
            }
            Err(source) => {
                return Err(ReconcileError::RemoteReadFailed {
                    name: name.to_string(),
                    source,
                });
            }
        };

        debug!(
            name = %name,
            attempt = attempt,
            streak = streak,
            status = ?status,
            "Propagation poll"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ReconcileError::OperationCancelled { name: name.to_string() });
            }
            _ = sleep(config.poll_interval) => {}
        }
    }
}
