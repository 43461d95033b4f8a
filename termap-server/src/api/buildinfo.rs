//! Build identification, shared by the startup log and `/api/buildinfo`

use axum::response::Json;
use serde::Serialize;
use std::fmt;

/// Values captured by build.rs at compile time
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub build_profile: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("GIT_HASH"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            build_profile: env!("BUILD_PROFILE"),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} [{}] built {} ({})",
            self.version, self.git_hash, self.build_timestamp, self.build_profile
        )
    }
}

/// GET /api/buildinfo
pub async fn get_build_info() -> Json<BuildInfo> {
    Json(BuildInfo::current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_leads_with_version() {
        let info = BuildInfo::current();
        let line = info.to_string();
        assert!(line.starts_with(&format!("v{} [", env!("CARGO_PKG_VERSION"))));
        assert!(line.contains(info.build_profile));
    }
}
