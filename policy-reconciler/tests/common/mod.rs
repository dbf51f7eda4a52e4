//! Shared test utilities for policy-reconciler integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use policy_reconciler::clients::{ClientError, PolicyDefinition, PolicyDefinitionsApi};
use policy_reconciler::{identity, JsonField, PolicyDefinitionState, PropagationConfig};

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

/// Scripted answer for one `get` call.
#[derive(Debug, Clone)]
pub enum Read {
    /// Pretend the record is not visible yet.
    Missing,
    /// Return the stored record (or not found if nothing is stored).
    Stored,
    Fail(ClientError),
}

#[derive(Default)]
struct Inner {
    stored: Option<PolicyDefinition>,
    script: VecDeque<Read>,
    /// Answer for `get` once the script is exhausted; `None` means `Stored`.
    fallback: Option<Read>,
    put_error: Option<ClientError>,
    delete_error: Option<ClientError>,
    get_calls: usize,
    put_calls: usize,
    delete_calls: usize,
}

/// In-memory stand-in for the remote API with scripted read visibility.
#[derive(Clone, Default)]
pub struct FakePolicyApi {
    inner: Arc<Mutex<Inner>>,
}

impl FakePolicyApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for the next `get` calls.
    pub fn script(&self, reads: impl IntoIterator<Item = Read>) {
        self.inner.lock().unwrap().script.extend(reads);
    }

    /// Answer used once the script runs out.
    pub fn fallback(&self, read: Read) {
        self.inner.lock().unwrap().fallback = Some(read);
    }

    pub fn fail_puts(&self, error: ClientError) {
        self.inner.lock().unwrap().put_error = Some(error);
    }

    pub fn fail_deletes(&self, error: ClientError) {
        self.inner.lock().unwrap().delete_error = Some(error);
    }

    /// Store a record as if it had been created earlier.
    pub fn insert(&self, name: &str, mut definition: PolicyDefinition) {
        definition.id = Some(identity::encode(SUBSCRIPTION, name));
        definition.name = Some(name.to_string());
        self.inner.lock().unwrap().stored = Some(definition);
    }

    /// Modify the stored record in place.
    pub fn edit(&self, f: impl FnOnce(&mut PolicyDefinition)) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.stored.as_mut() {
            f(stored);
        }
    }

    pub fn stored(&self) -> Option<PolicyDefinition> {
        self.inner.lock().unwrap().stored.clone()
    }

    pub fn get_calls(&self) -> usize {
        self.inner.lock().unwrap().get_calls
    }

    pub fn put_calls(&self) -> usize {
        self.inner.lock().unwrap().put_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.lock().unwrap().delete_calls
    }
}

#[async_trait]
impl PolicyDefinitionsApi for FakePolicyApi {
    async fn get(&self, _name: &str) -> Result<PolicyDefinition, ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.get_calls += 1;

        let read = match inner.script.pop_front() {
            Some(read) => read,
            None => inner.fallback.clone().unwrap_or(Read::Stored),
        };

        match read {
            Read::Missing => Err(ClientError::NotFound),
            Read::Stored => inner.stored.clone().ok_or(ClientError::NotFound),
            Read::Fail(e) => Err(e),
        }
    }

    async fn create_or_update(
        &self,
        name: &str,
        definition: &PolicyDefinition,
    ) -> Result<PolicyDefinition, ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.put_calls += 1;
        if let Some(e) = inner.put_error.clone() {
            return Err(e);
        }

        let mut stored = definition.clone();
        stored.id = Some(identity::encode(SUBSCRIPTION, name));
        stored.name = Some(name.to_string());
        stored.resource_type = Some("Microsoft.Authorization/policyDefinitions".to_string());
        inner.stored = Some(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, _name: &str) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls += 1;
        if let Some(e) = inner.delete_error.clone() {
            return Err(e);
        }
        inner.stored.take().map(|_| ()).ok_or(ClientError::NotFound)
    }
}

pub fn propagation() -> PropagationConfig {
    PropagationConfig {
        poll_interval: Duration::from_secs(10),
        stable_polls: 10,
        timeout: Duration::from_secs(5 * 60),
    }
}

pub fn desired(name: &str) -> PolicyDefinitionState {
    PolicyDefinitionState {
        id: None,
        name: name.to_string(),
        policy_type: "Custom".to_string(),
        mode: "All".to_string(),
        display_name: "Allowed locations".to_string(),
        description: "Restrict resource locations".to_string(),
        policy_rule: Some(JsonField::from(
            r#"{
                "if": {"not": {"field": "location", "in": "[parameters('allowed')]"}},
                "then": {"effect": "deny"}
            }"#,
        )),
        metadata: Some(JsonField::from(r#"{"category": "General"}"#)),
        parameters: Some(JsonField::from(
            r#"{"allowed": {"type": "Array", "metadata": {"displayName": "Allowed"}}}"#,
        )),
    }
}
