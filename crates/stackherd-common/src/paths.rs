//! Standard filesystem paths for stackherd.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// Root directory override from the environment, if set.
pub static STACKHERD_ROOT: Lazy<Option<PathBuf>> =
    Lazy::new(|| std::env::var("STACKHERD_ROOT").ok().map(PathBuf::from));

/// Standard paths used by stackherd.
///
/// The root is the directory all stack identifiers are resolved against:
/// a stack id like `stacks/persistence/compose.yml` names a compose file
/// relative to it.
#[derive(Debug, Clone)]
pub struct HerdPaths {
    /// Root directory containing the stack tree.
    pub root: PathBuf,
}

impl HerdPaths {
    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a root directory: an explicit setting wins, then the
    /// `STACKHERD_ROOT` environment variable, then the given fallback.
    #[must_use]
    pub fn resolve(explicit: Option<PathBuf>, fallback: &Path) -> Self {
        let root = explicit
            .or_else(|| STACKHERD_ROOT.clone())
            .unwrap_or_else(|| fallback.to_path_buf());
        Self { root }
    }

    /// Absolute path of a stack's compose file.
    #[must_use]
    pub fn compose_file(&self, stack_id: &str) -> PathBuf {
        self.root.join(stack_id)
    }

    /// Absolute path of a directory given relative to the root.
    #[must_use]
    pub fn under_root(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }
}
