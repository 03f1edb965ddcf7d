use serde::{Deserialize, Deserializer, Serialize};

use crate::RepoKey;

pub const REPOSITORY_COLUMNS: [&str; 3] = ["name", "owner", "pr_collected"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnerNode {
    pub login: String,
}

/// A search hit of the ranked discovery query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryNode {
    pub name: String,
    pub owner: OwnerNode,
}

/// One row of the repository list. `pr_collected` is the per-repository checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub owner: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub pr_collected: bool,
}

impl RepositoryRecord {
    pub fn key(&self) -> RepoKey {
        RepoKey::new(self.owner.clone(), self.name.clone())
    }
}

impl From<RepositoryNode> for RepositoryRecord {
    fn from(node: RepositoryNode) -> Self {
        Self {
            name: node.name,
            owner: node.owner.login,
            pr_collected: false,
        }
    }
}

/// Reads a `pr_collected` cell. Accepts `true`/`false` in any case (lists
/// written by pandas use `True`) and `1`/`0`; an empty cell is not collected.
pub fn parse_collected_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" | "" => Some(false),
        _ => None,
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_collected_flag(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid pr_collected flag {raw:?}"))
    })
}
