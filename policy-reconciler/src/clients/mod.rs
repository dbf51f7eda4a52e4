//! Clients for the remote management API.
//!
//! - `policy`: adapter contract and wire model for policy definitions
//! - `http`: REST implementation of the adapter

pub mod http;
pub mod policy;

pub use http::HttpPolicyClient;
pub use policy::{ClientError, DefinitionProperties, PolicyDefinition, PolicyDefinitionsApi};
