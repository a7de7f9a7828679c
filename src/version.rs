//! Build identity of the huginn library and CLI.
//!
//! Git metadata is captured by `build.rs`; builds outside a checkout report
//! `unknown` for branch and commit.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git branch at build time, or "unknown" if unavailable.
pub const GIT_BRANCH: &str = match option_env!("VERGEN_GIT_BRANCH") {
    Some(branch) => branch,
    None => "unknown",
};

/// Git commit SHA at build time, or "unknown" if unavailable.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Whether the working tree was dirty at build time.
pub fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

/// Commit SHA abbreviated to seven characters.
pub fn short_sha() -> &'static str {
    GIT_SHA.get(..7).unwrap_or(GIT_SHA)
}

/// Version reported by `huginn version`, e.g. `0.1.0+main.1a2b3c4`.
///
/// A build from a modified tree carries a `.dirty` suffix
/// (`0.1.0+main.1a2b3c4.dirty`); one without git metadata reads
/// `0.1.0+unknown.unknown`.
pub fn version_string() -> String {
    let dirty_suffix = if git_dirty() { ".dirty" } else { "" };
    format!("{PKG_VERSION}+{GIT_BRANCH}.{}{dirty_suffix}", short_sha())
}

/// `User-Agent` sent by [`HttpTransport`](crate::HttpTransport), e.g.
/// `huginn/0.1.0+main.1a2b3c4`.
pub fn user_agent() -> String {
    format!("huginn/{}", version_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_pkg_version() {
        assert!(version_string().starts_with(&format!("{PKG_VERSION}+{GIT_BRANCH}.")));
    }

    #[test]
    fn short_sha_is_at_most_seven_chars() {
        assert!(short_sha().len() <= 7);
        assert!(GIT_SHA.starts_with(short_sha()));
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert_eq!(user_agent(), format!("huginn/{}", version_string()));
    }
}
