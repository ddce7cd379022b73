use std::path::{Path, PathBuf};

/// Filesystem identity of a module artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Entry in the plugin directory (bundle directory or manifest file)
    pub path: PathBuf,
    /// Shared library declared by the manifest, resolved against the bundle
    pub library: Option<PathBuf>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            library: None,
        }
    }

    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = Some(library.into());
        self
    }

    /// File name of the artifact, used for ordering and diagnostics
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
