use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Input that cannot be turned into a work item key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("repository {0:?} is not in owner/name form")]
    InvalidRepository(String),
    #[error("pull request number {0:?} is not a non-negative integer")]
    InvalidNumber(String),
}

/// A repository identified as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoKey {
    pub owner: String,
    pub name: String,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Splits `owner/name`. Exactly one slash and two non-empty halves are accepted.
    pub fn parse(full_name: &str) -> Result<Self, KeyError> {
        let trimmed = full_name.trim();
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(owner, name))
            }
            _ => Err(KeyError::InvalidRepository(full_name.to_string())),
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One pull request of one repository: the row identity of the state dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PullKey {
    pub repository: RepoKey,
    pub number: u64,
}

impl PullKey {
    pub fn new(repository: RepoKey, number: u64) -> Self {
        Self { repository, number }
    }

    /// Builds a key from the two dataset columns.
    pub fn parse(repository: &str, number: &str) -> Result<Self, KeyError> {
        let repository = RepoKey::parse(repository)?;
        let number = number
            .trim()
            .parse::<u64>()
            .map_err(|_| KeyError::InvalidNumber(number.to_string()))?;
        Ok(Self { repository, number })
    }
}

impl fmt::Display for PullKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}
