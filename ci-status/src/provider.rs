use crate::errors::CiStatusError;
use crate::schema::ShieldSchema;
use async_trait::async_trait;

/// The repository and branch a badge is requested for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusQuery {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl StatusQuery {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        StatusQuery {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

/// A CI system that can report the state of the latest run on a branch.
///
/// Implementations are shared between concurrent requests and must not
/// cache results: every call reflects the provider's current state.
#[async_trait]
pub trait CiProvider: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn status(&self, query: &StatusQuery) -> Result<ShieldSchema, CiStatusError>;
}
