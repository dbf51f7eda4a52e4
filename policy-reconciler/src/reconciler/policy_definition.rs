//! Policy definition reconciler - reconciles policy definitions with the management API.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::propagation::wait_for_propagation;
use super::Reconciler;
use crate::clients::PolicyDefinitionsApi;
use crate::config::PropagationConfig;
use crate::descriptor::{diff, PolicyDefinitionState};
use crate::error::{ReconcileError, Result};
use crate::identity;

/// What [`PolicyDefinitionReconciler::converge`] did to reach the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeOutcome {
    Created,
    Updated,
    Replaced,
    Unchanged,
}

/// Policy definition reconciler that interacts with the management API.
pub struct PolicyDefinitionReconciler {
    api: Arc<dyn PolicyDefinitionsApi>,
    propagation: PropagationConfig,
}

impl PolicyDefinitionReconciler {
    pub fn new(api: Arc<dyn PolicyDefinitionsApi>, propagation: PropagationConfig) -> Self {
        Self { api, propagation }
    }

    /// Submit the desired definition, wait for it to propagate, and return
    /// the record as the API reports it.
    pub async fn create_or_update(
        &self,
        desired: &PolicyDefinitionState,
        cancel: &CancellationToken,
    ) -> Result<PolicyDefinitionState> {
        let validated = desired.validate()?;
        let name = validated.name;
        info!(
            "Reconciling policy definition {} ({}, {})",
            name, validated.policy_type, validated.mode
        );

        if cancel.is_cancelled() {
            return Err(ReconcileError::OperationCancelled { name });
        }

        let accepted = self
            .api
            .create_or_update(&name, &validated.payload)
            .await
            .map_err(|source| ReconcileError::RemoteRejected {
                name: name.clone(),
                source,
            })?;

        wait_for_propagation(self.api.as_ref(), &name, &self.propagation, cancel).await?;

        let observed = self
            .api
            .get(&name)
            .await
            .map_err(|source| ReconcileError::RemoteReadFailed {
                name: name.clone(),
                source,
            })?;

        let id = observed
            .id
            .clone()
            .or(accepted.id)
            .ok_or_else(|| ReconcileError::MissingRemoteId { name: name.clone() })?;

        let mut state = desired.clone();
        state.apply_observed(&observed)?;
        state.id = Some(id);
        Ok(state)
    }

    /// Update an existing definition in place.
    ///
    /// Changes to immutable fields are refused; the caller has to delete and
    /// recreate. Without changes nothing is sent.
    pub async fn update(
        &self,
        prior: &PolicyDefinitionState,
        desired: &PolicyDefinitionState,
        cancel: &CancellationToken,
    ) -> Result<PolicyDefinitionState> {
        let plan = diff(prior, desired);
        if plan.requires_replacement() {
            return Err(ReconcileError::ImmutableFieldChanged {
                name: prior.name.clone(),
                fields: plan.replace,
            });
        }
        if plan.is_empty() {
            info!("Policy definition {} is up to date", prior.name);
            return Ok(prior.clone());
        }

        info!(
            "Updating policy definition {} (changed: {:?})",
            prior.name, plan.update
        );
        self.create_or_update(desired, cancel).await
    }

    /// Read the definition behind a locator into a fresh record.
    pub async fn read(&self, locator: &str) -> Result<Option<PolicyDefinitionState>> {
        let prior = PolicyDefinitionState {
            id: Some(locator.to_string()),
            ..Default::default()
        };
        self.read_into(locator, prior).await
    }

    /// Re-read a persisted record. JSON documents the API reports as null
    /// keep their prior text.
    pub async fn refresh(
        &self,
        prior: &PolicyDefinitionState,
    ) -> Result<Option<PolicyDefinitionState>> {
        let locator = prior.id.clone().unwrap_or_default();
        self.read_into(&locator, prior.clone()).await
    }

    /// Adopt an existing remote definition. Unlike [`read`](Self::read), a
    /// missing definition is an error.
    pub async fn import(&self, locator: &str) -> Result<PolicyDefinitionState> {
        self.read(locator)
            .await?
            .ok_or_else(|| ReconcileError::NotFound {
                locator: locator.to_string(),
            })
    }

    async fn read_into(
        &self,
        locator: &str,
        mut state: PolicyDefinitionState,
    ) -> Result<Option<PolicyDefinitionState>> {
        let name = identity::decode(locator)?;

        let observed = match self.api.get(name).await {
            Ok(definition) => definition,
            Err(e) if e.is_not_found() => {
                info!(
                    "Policy definition {} no longer exists - removing from state",
                    locator
                );
                return Ok(None);
            }
            Err(source) => {
                return Err(ReconcileError::RemoteReadFailed {
                    name: name.to_string(),
                    source,
                });
            }
        };

        state.apply_observed(&observed)?;
        if let Some(id) = &observed.id {
            state.id = Some(id.clone());
        }
        Ok(Some(state))
    }

    /// Delete the definition behind a locator. A missing definition counts
    /// as deleted.
    pub async fn delete(&self, locator: &str) -> Result<()> {
        let name = identity::decode(locator)?;
        info!("Deleting policy definition {}", name);

        match self.api.delete(name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                info!("Policy definition {} already absent", name);
                Ok(())
            }
            Err(source) => Err(ReconcileError::RemoteDeleteFailed {
                name: name.to_string(),
                source,
            }),
        }
    }

    /// Bring the remote definition from `prior` (if any) to `desired`.
    pub async fn converge(
        &self,
        prior: Option<&PolicyDefinitionState>,
        desired: &PolicyDefinitionState,
        cancel: &CancellationToken,
    ) -> Result<(ConvergeOutcome, PolicyDefinitionState)> {
        // Never delete for a replacement that is going to be rejected anyway.
        desired.validate()?;

        let current = match prior {
            Some(prior) if prior.id.is_some() => self.refresh(prior).await?,
            _ => None,
        };

        let Some(current) = current else {
            let created = self.create_or_update(desired, cancel).await?;
            return Ok((ConvergeOutcome::Created, created));
        };

        let plan = diff(&current, desired);
        if plan.requires_replacement() {
            warn!(
                "Policy definition {} must be replaced (changed: {:?})",
                current.name, plan.replace
            );
            if let Some(locator) = &current.id {
                self.delete(locator).await?;
            }
            let created = self.create_or_update(desired, cancel).await?;
            return Ok((ConvergeOutcome::Replaced, created));
        }

        if plan.is_empty() {
            return Ok((ConvergeOutcome::Unchanged, current));
        }

        let updated = self.update(&current, desired, cancel).await?;
        Ok((ConvergeOutcome::Updated, updated))
    }
}

#[async_trait]
impl Reconciler for PolicyDefinitionReconciler {
    type State = PolicyDefinitionState;

    async fn reconcile(
        &self,
        desired: &Self::State,
        cancel: &CancellationToken,
    ) -> Result<Self::State> {
        self.create_or_update(desired, cancel).await
    }

    async fn observe(&self, locator: &str) -> Result<Option<Self::State>> {
        self.read(locator).await
    }

    async fn finalize(&self, locator: &str) -> Result<()> {
        self.delete(locator).await
    }
}
