//! Serves shields.io endpoint badges describing the latest GitHub Actions
//! run on a branch.

pub mod allow_list;
pub mod api;
pub mod config;
pub mod errors;
pub mod github;
pub mod metrics_defs;
pub mod provider;
pub mod schema;

#[cfg(test)]
mod testutils;

use api::CiStatusService;
use config::{Config, ConfigError, Credentials};
use errors::ServerError;
use github::GitHubActions;
use provider::CiProvider;
use shared::http::run_http_service;
use std::sync::Arc;

/// Connects to GitHub and serves badges until the listener fails.
///
/// Configuration and credential problems are reported before the listener
/// is bound.
pub async fn run(config: Config, credentials: Credentials) -> Result<(), ServerError> {
    config.validate().map_err(ConfigError::from)?;

    let provider = GitHubActions::connect(&config.github, &credentials.token)?;
    tracing::info!(
        provider = provider.name(),
        api_url = %config.github.api_url,
        allowed_owners = credentials.allow_list.owners().len(),
        "ci status provider ready"
    );

    let service = CiStatusService::new(Arc::new(provider), credentials.allow_list);
    run_http_service(
        &config.listener.host,
        config.listener.port,
        service,
        config.timeouts(),
    )
    .await
}
