use crate::config::{ConfigError, GitHubConfig, TOKEN_ENV};
use crate::errors::CiStatusError;
use crate::provider::{CiProvider, StatusQuery};
use crate::schema::{GITHUB_ACTIONS_LOGO, ShieldSchema};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("ci-shield/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct WorkflowRuns {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    workflow_id: u64,
    // null while the run is still in progress
    conclusion: Option<String>,
}

#[derive(Deserialize)]
struct Workflow {
    name: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Reads workflow run state from the GitHub Actions REST API.
pub struct GitHubActions {
    client: reqwest::Client,
    api_url: Url,
}

impl GitHubActions {
    /// Builds the authenticated API client. Runs once at startup; every
    /// request afterwards shares the client.
    pub fn connect(config: &GitHubConfig, token: &str) -> Result<Self, ConfigError> {
        let api_url = config.parsed_api_url()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ConfigError::InvalidCredential(TOKEN_ENV))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(GitHubActions { client, api_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CiStatusError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| CiStatusError::Upstream(format!("{} is not a base URL", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, CiStatusError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            // GitHub explains most failures in a JSON `message` field.
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|body| body.message)
                .unwrap_or_default();
            let detail = format!("GET {url}: {status} {message}");
            return Err(CiStatusError::Upstream(detail.trim_end().to_string()));
        }

        Ok(response.json::<T>().await?)
    }

    /// The newest run on the branch, in GitHub's own ordering.
    async fn latest_run(&self, query: &StatusQuery) -> Result<WorkflowRun, CiStatusError> {
        let mut url = self.endpoint(&["repos", &query.owner, &query.repo, "actions", "runs"])?;
        url.query_pairs_mut()
            .append_pair("branch", &query.branch)
            .append_pair("per_page", "1");

        let runs: WorkflowRuns = self.get(url).await?;
        runs.workflow_runs
            .into_iter()
            .next()
            .ok_or(CiStatusError::WorkflowNotFound)
    }

    async fn workflow(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
    ) -> Result<Workflow, CiStatusError> {
        let id = workflow_id.to_string();
        let url = self.endpoint(&["repos", owner, repo, "actions", "workflows", &id])?;
        self.get(url).await
    }
}

#[async_trait]
impl CiProvider for GitHubActions {
    fn name(&self) -> &'static str {
        "github_actions"
    }

    async fn status(&self, query: &StatusQuery) -> Result<ShieldSchema, CiStatusError> {
        let run = self.latest_run(query).await?;
        let workflow = self
            .workflow(&query.owner, &query.repo, run.workflow_id)
            .await?;
        let conclusion = run.conclusion.unwrap_or_default();

        tracing::debug!(
            run_id = run.id,
            workflow = %workflow.name,
            conclusion = %conclusion,
            "latest workflow run"
        );

        Ok(ShieldSchema::for_brand(GITHUB_ACTIONS_LOGO).with_run(
            &query.owner,
            &query.repo,
            &workflow.name,
            &conclusion,
        ))
    }
}
