/// Owners whose repositories may be queried. An empty list allows everyone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowList {
    owners: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowList {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a comma separated list such as `alice,bob`. Surrounding
    /// whitespace is ignored and empty entries are dropped.
    pub fn parse(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|owner| !owner.is_empty()),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn owners(&self) -> &[String] {
        &self.owners
    }

    /// Exact, case-sensitive membership.
    pub fn is_allowed(&self, owner: &str) -> bool {
        self.is_empty() || self.owners.iter().any(|allowed| allowed == owner)
    }
}
