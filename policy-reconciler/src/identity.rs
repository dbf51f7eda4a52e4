//! Policy definition identifiers.
//!
//! The remote API identifies a definition by a path of the form
//! `/subscriptions/{subscription}/providers/Microsoft.Authorization/policyDefinitions/{name}`.
//! Only the final segment is interpreted locally; the rest is persisted as-is.

use thiserror::Error;

const PROVIDER_NAMESPACE: &str = "Microsoft.Authorization";
const RESOURCE_TYPE: &str = "policyDefinitions";

/// Number of `/`-separated segments, counting the empty one before the leading slash.
const SEGMENT_COUNT: usize = 7;
const NAME_SEGMENT: usize = 6;

/// Locator decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("policy definition id is empty or not formatted correctly: {0:?}")]
    Empty(String),

    #[error("policy definition id should have {expected} segments, got {actual}: {id:?}")]
    SegmentCount {
        id: String,
        expected: usize,
        actual: usize,
    },
}

/// Build the canonical locator for a definition in a subscription.
pub fn encode(subscription_id: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/providers/{}/{}/{}",
        subscription_id, PROVIDER_NAMESPACE, RESOURCE_TYPE, name
    )
}

/// Extract the definition name from a locator.
pub fn decode(locator: &str) -> Result<&str, IdentifierError> {
    if locator.is_empty() {
        return Err(IdentifierError::Empty(locator.to_string()));
    }

    let segments: Vec<&str> = locator.split('/').collect();
    if segments.len() != SEGMENT_COUNT {
        return Err(IdentifierError::SegmentCount {
            id: locator.to_string(),
            expected: SEGMENT_COUNT - 1,
            actual: segments.len().saturating_sub(1),
        });
    }

    Ok(segments[NAME_SEGMENT])
}
