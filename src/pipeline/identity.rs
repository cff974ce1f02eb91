use serde::Serialize;

/// Case-insensitive patient identity used to group order requests.
///
/// Only constructed when both names are non-empty; a record without one can
/// never join a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdentityKey {
    first: String,
    last: String,
}

impl IdentityKey {
    #[must_use]
    pub fn from_names(first: &str, last: &str) -> Option<Self> {
        if first.is_empty() || last.is_empty() {
            return None;
        }
        Some(Self {
            first: first.to_lowercase(),
            last: last.to_lowercase(),
        })
    }

    #[must_use]
    pub fn first(&self) -> &str {
        &self.first
    }

    #[must_use]
    pub fn last(&self) -> &str {
        &self.last
    }
}
