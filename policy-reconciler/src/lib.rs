//! policy-reconciler: drives policy definitions into a remote management API.
//!
//! - `descriptor`: field schema, validation and diffing of the local record
//! - `identity`: locator encoding/decoding
//! - `clients`: adapter contract for the remote API and its HTTP implementation
//! - `reconciler`: create/update with propagation wait, read, delete

pub mod clients;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod json_field;
pub mod reconciler;

pub use clients::{ClientError, HttpPolicyClient, PolicyDefinition, PolicyDefinitionsApi};
pub use config::PropagationConfig;
pub use descriptor::{PlanDiff, PolicyDefinitionState, PolicyMode, PolicyType};
pub use error::{ReconcileError, Result};
pub use json_field::JsonField;
pub use reconciler::{ConvergeOutcome, PolicyDefinitionReconciler, Reconciler};
