//! Build identification.
//!
//! Git metadata is embedded by `build.rs`; builds outside a checkout report
//! `unknown` for branch and commit.

use std::fmt;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where and from what this binary was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub sha: &'static str,
    pub dirty: bool,
}

impl BuildInfo {
    /// Metadata of the running build.
    pub fn current() -> Self {
        Self {
            version: PKG_VERSION,
            branch: option_env!("VERGEN_GIT_BRANCH").unwrap_or("unknown"),
            sha: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            dirty: option_env!("VERGEN_GIT_DIRTY") == Some("true"),
        }
    }

    /// Commit SHA shortened to at most seven characters.
    pub fn short_sha(&self) -> &'static str {
        self.sha.get(..7).unwrap_or(self.sha)
    }
}

/// `{version}+{branch}.{sha}`, with `.dirty` appended for modified trees.
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}.{}", self.version, self.branch, self.short_sha())?;
        if self.dirty {
            f.write_str(".dirty")?;
        }
        Ok(())
    }
}

/// Full version string of the running build, e.g. `0.3.0+main.abc1234`.
pub fn version_string() -> String {
    BuildInfo::current().to_string()
}

/// `User-Agent` sent by network-backed stores.
pub fn user_agent() -> String {
    format!("cachine/{PKG_VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(sha: &'static str, dirty: bool) -> BuildInfo {
        BuildInfo {
            version: "0.3.0",
            branch: "main",
            sha,
            dirty,
        }
    }

    #[test]
    fn version_string_starts_with_pkg_version() {
        assert!(version_string().starts_with(PKG_VERSION));
    }

    #[test]
    fn sha_is_abbreviated() {
        assert_eq!(build("abc1234def5678", false).to_string(), "0.3.0+main.abc1234");
        assert_eq!(build("unknown", false).short_sha(), "unknown");
    }

    #[test]
    fn dirty_trees_are_marked() {
        assert_eq!(build("abc1234", true).to_string(), "0.3.0+main.abc1234.dirty");
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert_eq!(user_agent(), format!("cachine/{PKG_VERSION}"));
    }
}
