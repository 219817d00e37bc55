// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow Plane HTTP Client
//!
//! REST client for the external workflow plane that runs monitor evaluation
//! jobs and owns the agent/environment registry.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** HTTP adapter for the workload-facing domain ports
//! - **Integration:** WorkloadExecutor, AgentDirectory, RunLogProvider → workflow plane API
//!
//! # Endpoints
//!
//! | Operation | Method | Path |
//! |-----------|--------|------|
//! | submit | POST | `/api/v1/namespaces/{ns}/workflowruns` |
//! | delete | DELETE | `/api/v1/namespaces/{ns}/workflowruns/{name}` |
//! | get_resource | GET | `/api/v1/namespaces/{ns}/{kind}s/{name}` |
//! | run logs | GET | `/api/v1/namespaces/{ns}/workflowruns/{name}/logs` |
//! | agent id | GET | `/api/v1/orgs/{org}/projects/{project}/agents/{agent}` |
//! | environment id | GET | `/api/v1/orgs/{org}/environments/{env}` |
//!
//! Every request carries the bearer token when one is configured.

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::service_config::WorkflowPlaneConfig;
use crate::domain::workload::{
    AgentDirectory, LogLine, RunLogProvider, WorkflowRunSpec, WorkloadError, WorkloadExecutor,
    WorkloadRef, WORKFLOW_RUN_KIND,
};

#[derive(Clone)]
pub struct WorkflowPlaneClient {
    http_client: HttpClient,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct LogsResponse {
    #[serde(default)]
    logs: Vec<LogLine>,
}

impl WorkflowPlaneClient {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    pub fn from_config(config: &WorkflowPlaneConfig, api_token: Option<String>) -> anyhow::Result<Self> {
        Self::new(
            &config.base_url,
            api_token,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, WorkloadError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(WorkloadError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkloadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn resolve_id(&self, path: &str, what: &str) -> Result<String, WorkloadError> {
        let response = self.send(self.request(Method::GET, path), what).await?;
        let body: IdResponse = response.json().await?;
        Ok(body.id)
    }
}

/// `WorkflowRun` → `workflowruns`
fn resource_collection(kind: &str) -> String {
    format!("{}s", kind.to_ascii_lowercase())
}

#[async_trait]
impl WorkloadExecutor for WorkflowPlaneClient {
    async fn submit(&self, spec: &WorkflowRunSpec) -> Result<WorkloadRef, WorkloadError> {
        let path = format!(
            "/api/v1/namespaces/{}/{}",
            spec.namespace,
            resource_collection(WORKFLOW_RUN_KIND)
        );
        self.send(
            self.request(Method::POST, &path).json(spec),
            &format!("namespace {}", spec.namespace),
        )
        .await?;

        Ok(WorkloadRef::workflow_run(&spec.namespace, &spec.name))
    }

    async fn delete(&self, workload: &WorkloadRef) -> Result<(), WorkloadError> {
        let path = format!(
            "/api/v1/namespaces/{}/{}/{}",
            workload.namespace,
            resource_collection(&workload.kind),
            workload.name
        );
        self.send(
            self.request(Method::DELETE, &path),
            &format!("{} {}/{}", workload.kind, workload.namespace, workload.name),
        )
        .await?;
        Ok(())
    }

    async fn get_resource(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<serde_json::Value, WorkloadError> {
        let path = format!(
            "/api/v1/namespaces/{}/{}/{}",
            namespace,
            resource_collection(kind),
            name
        );
        let response = self
            .send(
                self.request(Method::GET, &path),
                &format!("{} {}/{}", kind, namespace, name),
            )
            .await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AgentDirectory for WorkflowPlaneClient {
    async fn resolve_agent_id(
        &self,
        org_name: &str,
        project_name: &str,
        agent_name: &str,
    ) -> Result<String, WorkloadError> {
        self.resolve_id(
            &format!(
                "/api/v1/orgs/{}/projects/{}/agents/{}",
                org_name, project_name, agent_name
            ),
            &format!("agent {}/{}/{}", org_name, project_name, agent_name),
        )
        .await
    }

    async fn resolve_environment_id(
        &self,
        org_name: &str,
        environment_name: &str,
    ) -> Result<String, WorkloadError> {
        self.resolve_id(
            &format!("/api/v1/orgs/{}/environments/{}", org_name, environment_name),
            &format!("environment {}/{}", org_name, environment_name),
        )
        .await
    }
}

#[async_trait]
impl RunLogProvider for WorkflowPlaneClient {
    async fn get_run_logs(&self, namespace: &str, job_name: &str) -> Result<Vec<LogLine>, WorkloadError> {
        let path = format!(
            "/api/v1/namespaces/{}/{}/{}/logs",
            namespace,
            resource_collection(WORKFLOW_RUN_KIND),
            job_name
        );
        let response = self
            .send(
                self.request(Method::GET, &path),
                &format!("logs of {}/{}", namespace, job_name),
            )
            .await?;
        let body: LogsResponse = response.json().await?;
        Ok(body.logs)
    }
}
