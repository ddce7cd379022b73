//! Module manifest - reads the metadata a module artifact declares.
//!
//! Extraction only ever reads manifest files. Libraries are not opened and no
//! module code runs here.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::application::errors::ExtractionError;
use crate::domain::entities::{Artifact, Dependency, ModuleDescriptor, VersionRequirement};

/// Manifest file names looked up inside a bundle directory
pub const MANIFEST_NAMES: [&str; 2] = ["plugin.yml", "plugin.yaml"];

/// Module metadata as written in a manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleManifest {
    /// Module id (required)
    pub id: String,

    /// Human readable name, defaults to the id
    #[serde(default)]
    pub display_name: Option<String>,

    /// Module version (required)
    pub version: u32,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub website: String,

    /// Path to the shared library, relative to the bundle
    #[serde(default)]
    pub library: Option<PathBuf>,

    /// Module dependencies
    #[serde(default)]
    pub depends: Vec<ManifestDependency>,
}

/// A dependency entry before its version requirement is parsed.
///
/// The requirement stays raw so that a well-formed YAML value with a bad
/// requirement is told apart from YAML that cannot be read at all.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestDependency {
    pub id: String,

    #[serde(default)]
    pub version: Option<serde_yaml::Value>,

    #[serde(default)]
    pub optional: bool,
}

impl ManifestDependency {
    fn into_dependency(self) -> Result<Dependency, String> {
        let version = match self.version {
            None | Some(serde_yaml::Value::Null) => VersionRequirement::any(),
            Some(serde_yaml::Value::String(text)) => VersionRequirement::parse(&text)?,
            Some(serde_yaml::Value::Number(n)) => VersionRequirement::parse(&n.to_string())?,
            Some(other) => {
                return Err(format!(
                    "version requirement of '{}' must be a number or a string, got {:?}",
                    self.id, other
                ))
            }
        };

        Ok(Dependency {
            id: self.id,
            version,
            optional: self.optional,
        })
    }
}

impl ModuleManifest {
    /// Build the descriptor, parsing every dependency's version requirement
    pub fn into_descriptor(self) -> Result<ModuleDescriptor, String> {
        let mut dependencies = self
            .depends
            .into_iter()
            .map(ManifestDependency::into_dependency)
            .collect::<Result<Vec<_>, _>>()?;
        dependencies.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(ModuleDescriptor {
            display_name: self.display_name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            version: self.version,
            authors: self.authors,
            description: self.description,
            website: self.website,
            dependencies,
        })
    }
}

/// Descriptor plus the artifact it came from
#[derive(Debug, Clone)]
pub struct Extracted {
    pub descriptor: ModuleDescriptor,
    pub artifact: Artifact,
}

/// Whether a plugin directory entry looks like a module artifact
pub fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }

    if path.is_dir() {
        return true;
    }

    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Extract the descriptor of the artifact at `path`.
///
/// A bundle directory contributes the documents of its manifest file(s); a
/// manifest file contributes its own documents. Exactly one non-empty document
/// must be found across them.
pub fn extract(path: impl AsRef<Path>) -> Result<Extracted, ExtractionError> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)
        .map_err(|e| ExtractionError::unreadable(path, format!("Failed to open artifact: {}", e)))?;

    let (sources, base_dir) = if metadata.is_dir() {
        let files: Vec<PathBuf> = MANIFEST_NAMES
            .iter()
            .map(|name| path.join(name))
            .filter(|p| p.is_file())
            .collect();
        (files, path.to_path_buf())
    } else {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        (vec![path.to_path_buf()], parent)
    };

    let mut declarations = Vec::new();
    for file in &sources {
        let content = fs::read_to_string(file)
            .map_err(|e| ExtractionError::unreadable(path, format!("Failed to read {}: {}", file.display(), e)))?;

        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = serde_yaml::Value::deserialize(document)
                .map_err(|e| ExtractionError::unreadable(path, format!("Failed to parse {}: {}", file.display(), e)))?;
            if !value.is_null() {
                declarations.push(value);
            }
        }
    }

    if declarations.len() != 1 {
        let reason = match declarations.len() {
            0 => "no module declaration found".to_string(),
            n => format!("found {} module declarations, expected exactly one", n),
        };
        return Err(ExtractionError::malformed(path, reason));
    }

    let manifest: ModuleManifest = declarations
        .pop()
        .map(serde_yaml::from_value)
        .transpose()
        .map_err(|e| ExtractionError::unreadable(path, format!("Invalid module declaration: {}", e)))?
        .ok_or_else(|| ExtractionError::malformed(path, "no module declaration found"))?;

    let library = manifest.library.as_ref().map(|lib| {
        if lib.is_absolute() {
            lib.clone()
        } else {
            base_dir.join(lib)
        }
    });

    let descriptor = manifest
        .into_descriptor()
        .map_err(|reason| ExtractionError::malformed(path, reason))?;
    descriptor
        .validate()
        .map_err(|reason| ExtractionError::malformed(path, reason))?;

    let mut artifact = Artifact::new(path);
    artifact.library = library;

    Ok(Extracted { descriptor, artifact })
}
