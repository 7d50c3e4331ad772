//! Container naming for translation runs.
//!
//! Every run derives its three container names from one random token plus a
//! fixed role suffix. The suffixes double as the marker the abandoned
//! container sweep looks for.

use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage naming rule: lowercase alphanumerics and single inner hyphens.
static CONTAINER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9]|-[a-z0-9])*$").unwrap());

/// Whether `name` is acceptable as a container name (3-63 chars).
pub fn is_valid_container_name(name: &str) -> bool {
    (3..=63).contains(&name.len()) && CONTAINER_NAME.is_match(name)
}

/// The role a container plays within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerRole {
    Source,
    Target,
    Glossary,
}

impl ContainerRole {
    pub const ALL: [ContainerRole; 3] = [
        ContainerRole::Source,
        ContainerRole::Target,
        ContainerRole::Glossary,
    ];

    /// Suffix appended to the run token.
    pub fn suffix(&self) -> &'static str {
        match self {
            ContainerRole::Source => "src",
            ContainerRole::Target => "tgt",
            ContainerRole::Glossary => "gls",
        }
    }

    /// Returns the role whose suffix `name` ends with, if any.
    pub fn from_container_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| name.ends_with(role.suffix()))
    }
}

impl fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerRole::Source => "source",
            ContainerRole::Target => "target",
            ContainerRole::Glossary => "glossary",
        };
        f.write_str(s)
    }
}

/// The three container names of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContainers {
    pub token: String,
    pub source: String,
    pub target: String,
    pub glossary: String,
}

impl RunContainers {
    /// Generate names from a fresh random token.
    pub fn generate() -> Self {
        // Simple form has no hyphens, so role suffixes concatenate cleanly.
        Self::from_token(&Uuid::new_v4().simple().to_string())
    }

    /// Derive names from an existing token.
    pub fn from_token(token: &str) -> Self {
        let token = token.to_ascii_lowercase();
        Self {
            source: format!("{}{}", token, ContainerRole::Source.suffix()),
            target: format!("{}{}", token, ContainerRole::Target.suffix()),
            glossary: format!("{}{}", token, ContainerRole::Glossary.suffix()),
            token,
        }
    }

    pub fn name(&self, role: ContainerRole) -> &str {
        match role {
            ContainerRole::Source => &self.source,
            ContainerRole::Target => &self.target,
            ContainerRole::Glossary => &self.glossary,
        }
    }

    /// All names paired with their role.
    pub fn iter(&self) -> impl Iterator<Item = (ContainerRole, &str)> {
        ContainerRole::ALL
            .into_iter()
            .map(move |role| (role, self.name(role)))
    }
}
