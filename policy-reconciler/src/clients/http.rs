//! REST client for the policy definitions endpoint of the management API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::policy::{ClientError, PolicyDefinition, PolicyDefinitionsApi};
use crate::identity;

/// Policy definitions client scoped to one subscription.
#[derive(Clone)]
pub struct HttpPolicyClient {
    client: Client,
    endpoint: String,
    subscription_id: String,
    api_version: String,
    token: Option<String>,
}

impl HttpPolicyClient {
    pub fn new(endpoint: String, subscription_id: String, api_version: String) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_id,
            api_version,
            token: None,
        }
    }

    /// Attach a pre-acquired bearer token to every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn url(&self, name: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.endpoint,
            identity::encode(&self.subscription_id, name),
            self.api_version
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn decode(response: Response) -> Result<PolicyDefinition, ClientError> {
        response
            .json()
            .await
            .map_err(|e| ClientError::Transport(format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl PolicyDefinitionsApi for HttpPolicyClient {
    async fn get(&self, name: &str) -> Result<PolicyDefinition, ClientError> {
        debug!("GET policy definition {}", name);
        let response = self.send(self.client.get(self.url(name))).await?;
        Self::decode(response).await
    }

    async fn create_or_update(
        &self,
        name: &str,
        definition: &PolicyDefinition,
    ) -> Result<PolicyDefinition, ClientError> {
        debug!("PUT policy definition {}", name);
        let response = self
            .send(self.client.put(self.url(name)).json(definition))
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        debug!("DELETE policy definition {}", name);
        self.send(self.client.delete(self.url(name))).await?;
        Ok(())
    }
}
