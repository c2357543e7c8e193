//! The shields.io endpoint badge payload.
//!
//! See <https://shields.io/badges/endpoint-badge> for the consumer side.

use serde::Serialize;

/// The only schema version shields.io understands.
pub const SCHEMA_VERSION: u8 = 1;

/// Logo shown for badges produced from GitHub Actions runs.
pub const GITHUB_ACTIONS_LOGO: &str = "GitHub Actions";

/// The conclusion GitHub reports for a passing run.
pub const SUCCESS_CONCLUSION: &str = "success";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    BrightGreen,
    Red,
}

impl BadgeColor {
    /// Case-sensitive: only the exact conclusion `success` is green.
    pub fn for_conclusion(conclusion: &str) -> Self {
        if conclusion == SUCCESS_CONCLUSION {
            BadgeColor::BrightGreen
        } else {
            BadgeColor::Red
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldSchema {
    pub schema_version: u8,
    pub label: String,
    pub message: String,
    pub color: BadgeColor,
    pub named_logo: String,
}

impl ShieldSchema {
    /// An unlabelled badge for `logo` with the defaults shields.io requires.
    pub fn for_brand(logo: impl Into<String>) -> Self {
        ShieldSchema {
            schema_version: SCHEMA_VERSION,
            label: String::new(),
            message: String::new(),
            color: BadgeColor::BrightGreen,
            named_logo: logo.into(),
        }
    }

    /// Fills in the run specific fields. Inputs are used verbatim.
    pub fn with_run(mut self, owner: &str, repo: &str, workflow: &str, conclusion: &str) -> Self {
        self.label = format!("{owner}/{repo}");
        self.message = format!("{workflow} - {conclusion}");
        self.color = BadgeColor::for_conclusion(conclusion);
        self
    }
}
