//! Reconcilers for remote resource types.
//!
//! A reconciler drives a desired local record into the remote API and maps
//! what the API reports back onto that record.

pub mod policy_definition;
pub mod propagation;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use policy_definition::{ConvergeOutcome, PolicyDefinitionReconciler};

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The record type, desired and observed.
    type State: Send + Sync;

    /// Create or update the resource and wait until it is consistently visible.
    async fn reconcile(&self, desired: &Self::State, cancel: &CancellationToken)
        -> Result<Self::State>;

    /// Read the resource behind a locator. `None` means it no longer exists.
    async fn observe(&self, locator: &str) -> Result<Option<Self::State>>;

    /// Handle resource deletion (finalization). Deleting a missing resource succeeds.
    async fn finalize(&self, locator: &str) -> Result<()>;
}
