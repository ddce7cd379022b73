//! Module descriptor - the static metadata a module declares about itself

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static MODULE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s:]+$").expect("module id pattern is valid")
});

/// Immutable metadata extracted once per artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleDescriptor {
    pub id: String,
    pub display_name: String,
    pub version: u32,
    pub authors: Vec<String>,
    pub description: String,
    pub website: String,
    /// Declared dependencies, ordered by id, at most one entry per id
    pub dependencies: Vec<Dependency>,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            version,
            authors: Vec::new(),
            description: String::new(),
            website: String::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a required dependency on any version of `id`
    pub fn depends_on(self, id: impl Into<String>) -> Self {
        self.with_dependency(Dependency::required(id, VersionRequirement::any()))
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.retain(|d| d.id != dependency.id);
        self.dependencies.push(dependency);
        self.dependencies.sort_by(|a, b| a.id.cmp(&b.id));
        self
    }

    /// Ids of the declared dependencies
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.id.as_str())
    }

    /// Check the descriptor invariants, returning a description of the first violation
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("module id is empty".to_string());
        }
        if !MODULE_ID.is_match(&self.id) {
            return Err(format!("module id '{}' must not contain whitespace or ':'", self.id));
        }

        let mut seen = std::collections::HashSet::new();
        for dep in &self.dependencies {
            if dep.id == self.id {
                return Err(format!("module '{}' depends on itself", self.id));
            }
            if dep.id.is_empty() {
                return Err(format!("module '{}' declares a dependency with an empty id", self.id));
            }
            if !MODULE_ID.is_match(&dep.id) {
                return Err(format!("module '{}' depends on '{}', which is not a valid module id", self.id, dep.id));
            }
            if !seen.insert(dep.id.as_str()) {
                return Err(format!("module '{}' declares '{}' more than once", self.id, dep.id));
            }
        }

        Ok(())
    }
}

/// One declared dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    #[serde(default)]
    pub version: VersionRequirement,
    #[serde(default)]
    pub optional: bool,
}

impl Dependency {
    pub fn required(id: impl Into<String>, version: VersionRequirement) -> Self {
        Self {
            id: id.into(),
            version,
            optional: false,
        }
    }

    pub fn optional(id: impl Into<String>, version: VersionRequirement) -> Self {
        Self {
            id: id.into(),
            version,
            optional: true,
        }
    }
}

/// A constraint over a module's integer version.
///
/// A bare number means "at least that version"; anything else is a comma
/// separated comparator list (`>=2, <5`, `=3`, `*`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RawRequirement", into = "String")]
pub struct VersionRequirement {
    raw: String,
    req: semver::VersionReq,
}

impl VersionRequirement {
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            req: semver::VersionReq::STAR,
        }
    }

    pub fn at_least(version: u32) -> Self {
        // ">=N" always parses
        Self::parse(&format!(">={}", version)).unwrap_or_else(|_| Self::any())
    }

    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }
        if let Ok(min) = trimmed.parse::<u32>() {
            return Ok(Self::at_least(min));
        }

        let req = semver::VersionReq::parse(trimmed)
            .map_err(|e| format!("invalid version requirement '{}': {}", trimmed, e))?;

        Ok(Self {
            raw: trimmed.to_string(),
            req,
        })
    }

    pub fn matches(&self, version: u32) -> bool {
        self.req.matches(&semver::Version::new(u64::from(version), 0, 0))
    }

    pub fn is_any(&self) -> bool {
        self.raw == "*"
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for VersionRequirement {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for VersionRequirement {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRequirement {}

impl fmt::Debug for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionRequirement({})", self.raw)
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<VersionRequirement> for String {
    fn from(req: VersionRequirement) -> Self {
        req.raw
    }
}

/// Manifests may write a requirement as a plain integer or as a string
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRequirement {
    Number(u32),
    Text(String),
}

impl TryFrom<RawRequirement> for VersionRequirement {
    type Error = String;

    fn try_from(raw: RawRequirement) -> Result<Self, Self::Error> {
        match raw {
            RawRequirement::Number(min) => Ok(Self::at_least(min)),
            RawRequirement::Text(text) => Self::parse(&text),
        }
    }
}
