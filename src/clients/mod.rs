pub mod fleet;
pub mod metrics;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::Config;
use crate::helpers::ParseError;
use crate::models::k8s::{
    Deployment, DeploymentList, NamespaceList, Pod, PodList, PodMetrics, PodMetricsList,
};

/// The only error kinds the discovery core distinguishes.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authorization denied: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cluster request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// The orchestrator capability the fleet engine runs against. The real
/// cluster client implements this; tests substitute a stub.
pub trait WorkloadApi: Send + Sync {
    fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Deployment>, ClientError>> + Send;

    /// Cheap limit-1 listing used to probe namespace access.
    fn probe_deployments(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Deployment, ClientError>> + Send;

    fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn list_pods(
        &self,
        namespace: &str,
        selector: &str,
    ) -> impl Future<Output = Result<Vec<Pod>, ClientError>> + Send;

    fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Pod, ClientError>> + Send;

    fn get_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;

    fn list_namespaces(&self) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;

    fn list_pod_metrics(
        &self,
        namespace: &str,
        selector: &str,
    ) -> impl Future<Output = Result<Vec<PodMetrics>, ClientError>> + Send;
}

/// reqwest-backed client for one orchestrator API endpoint.
pub struct ClusterClient {
    base_url: String,
    http: Client,
    token: Option<String>,
}

impl ClusterClient {
    pub fn new(cfg: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .danger_accept_invalid_certs(cfg.insecure_skip_tls_verify)
            .build()?;

        let token = cfg.bearer_token()?;

        Ok(Self {
            base_url: cfg.api_server.trim_end_matches('/').to_string(),
            http,
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn check(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, ClientError> {
        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Authorization(
                format!("{} returned {}", what, resp.status()),
            )),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(what.to_string())),
            s if s.is_success() => Ok(resp),
            s => {
                let body = resp.text().await.unwrap_or_default();
                Err(ClientError::Transport(format!(
                    "{} returned {}: {}",
                    what, s, body
                )))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let resp = self
            .request(reqwest::Method::GET, path)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await?;
        let resp = Self::check(resp, &format!("GET {}", path)).await?;
        Ok(resp.json().await?)
    }
}

impl WorkloadApi for ClusterClient {
    async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Deployment>, ClientError> {
        let path = match namespace {
            Some(ns) => format!("/apis/apps/v1/namespaces/{}/deployments", ns),
            None => "/apis/apps/v1/deployments".to_string(),
        };
        let list: DeploymentList = self.get_json(&path, &[]).await?;
        Ok(list.items)
    }

    async fn probe_deployments(&self, namespace: &str) -> Result<(), ClientError> {
        let path = format!("/apis/apps/v1/namespaces/{}/deployments", namespace);
        let _: DeploymentList = self.get_json(&path, &[("limit", "1")]).await?;
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Deployment, ClientError> {
        let path = format!("/apis/apps/v1/namespaces/{}/deployments/{}", namespace, name);
        self.get_json(&path, &[]).await
    }

    async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ClientError> {
        let path = format!("/apis/apps/v1/namespaces/{}/deployments/{}", namespace, name);
        let resp = self
            .request(reqwest::Method::PATCH, &path)
            .header("Content-Type", "application/strategic-merge-patch+json")
            .header("Accept", "application/json")
            .body(patch.to_string())
            .send()
            .await?;
        Self::check(resp, &format!("PATCH {}", path)).await?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClientError> {
        let path = format!("/api/v1/namespaces/{}/pods", namespace);
        let list: PodList = self.get_json(&path, &[("labelSelector", selector)]).await?;
        Ok(list.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClientError> {
        let path = format!("/api/v1/namespaces/{}/pods/{}", namespace, name);
        self.get_json(&path, &[]).await
    }

    async fn get_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<String, ClientError> {
        let path = format!("/api/v1/namespaces/{}/pods/{}/log", namespace, pod);
        let tail = tail_lines.to_string();
        let mut query = vec![("tailLines", tail.as_str())];
        if let Some(c) = container {
            query.push(("container", c));
        }
        let resp = self
            .request(reqwest::Method::GET, &path)
            .query(&query)
            .send()
            .await?;
        let resp = Self::check(resp, &format!("GET {}", path)).await?;
        Ok(resp.text().await?)
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClientError> {
        let list: NamespaceList = self.get_json("/api/v1/namespaces", &[]).await?;
        Ok(list.items.into_iter().map(|n| n.metadata.name).collect())
    }

    async fn list_pod_metrics(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodMetrics>, ClientError> {
        let path = format!("/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods", namespace);
        let list: PodMetricsList = self.get_json(&path, &[("labelSelector", selector)]).await?;
        Ok(list.items)
    }
}
