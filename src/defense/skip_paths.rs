//! Path-prefix exemption list, used to exempt paths such as health checks
//! from the entire defense chain.

/// A normalized set of path prefixes to skip. Trailing slashes are
/// insignificant: `/health` and `/health/` match the same requests.
#[derive(Debug, Clone, Default)]
pub struct SkipPaths {
    prefixes: Vec<String>,
}

impl SkipPaths {
    /// Build from configured path prefixes.
    #[must_use]
    pub fn new(paths: &[String]) -> Self {
        Self {
            prefixes: paths.iter().map(|p| normalize(p)).collect(),
        }
    }

    /// `true` if `path` should bypass the defense pipeline entirely.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let normalized = normalize(path);
        self.prefixes
            .iter()
            .any(|prefix| normalized == *prefix || normalized.starts_with(&format!("{prefix}/")))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
