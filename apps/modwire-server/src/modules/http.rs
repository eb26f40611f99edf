use std::time::Duration;

use anyhow::Context;
use modwire::{ContainerError, Injectable, MetadataRegistry, ModuleDescriptor, Resolver};
use serde_json::Value;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: reqwest::Client,
}

impl Injectable for HttpService {
    fn construct(_: &mut Resolver<'_>) -> Result<Self, ContainerError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ContainerError::construction::<HttpService>)?;
        Ok(Self { client })
    }
}

impl HttpService {
    pub async fn get_json(&self, url: &str) -> anyhow::Result<Value> {
        tracing::debug!(%url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<Value> {
        tracing::debug!(%url, "POST");
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

pub struct HttpModule;

pub fn declare(reg: &mut MetadataRegistry) {
    reg.module::<HttpModule>(
        ModuleDescriptor::new()
            .provider::<HttpService>()
            .export::<HttpService>(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use modwire::DependencyContainer;
    use serde_json::json;

    fn service() -> std::sync::Arc<HttpService> {
        let c = DependencyContainer::new();
        c.register_provider(&modwire::ProviderDef::of::<HttpService>())
            .unwrap();
        c.get::<HttpService>().unwrap()
    }

    #[tokio::test]
    async fn get_json_returns_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/users/1");
                then.status(200).json_body(json!({"id": 1, "name": "Ada"}));
            })
            .await;

        let body = service().get_json(&server.url("/users/1")).await.unwrap();
        assert_eq!(body["name"], "Ada");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn post_json_sends_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/echo").json_body(json!({"ping": true}));
                then.status(201).json_body(json!({"pong": true}));
            })
            .await;

        let body = service()
            .post_json(&server.url("/echo"), &json!({"ping": true}))
            .await
            .unwrap();
        assert_eq!(body, json!({"pong": true}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        assert!(service().get_json(&server.url("/missing")).await.is_err());
    }
}
