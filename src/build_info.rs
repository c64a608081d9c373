//! Build provenance
//!
//! Identifies the running build: version, commit, source tree state and
//! build time. The stamped index document embeds these values.

use chrono::{DateTime, Utc};

/// Source of the four provenance values
pub trait BuildInfo: Send + Sync {
    fn version(&self) -> String;
    fn git_commit(&self) -> String;
    /// `clean` or `dirty`
    fn git_tree_state(&self) -> String;
    fn build_date(&self) -> DateTime<Utc>;
}

/// Values captured by the build script
#[derive(Debug, Clone, Copy, Default)]
pub struct CompiledBuildInfo;

impl BuildInfo for CompiledBuildInfo {
    fn version(&self) -> String {
        env!("SPA_GIT_VERSION").to_string()
    }

    fn git_commit(&self) -> String {
        env!("SPA_GIT_COMMIT").to_string()
    }

    fn git_tree_state(&self) -> String {
        env!("SPA_GIT_TREE_STATE").to_string()
    }

    fn build_date(&self) -> DateTime<Utc> {
        parse_timestamp(env!("SPA_BUILD_TIMESTAMP"))
    }
}

/// Accepts Unix seconds or an RFC 3339 string; anything else maps to the epoch
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(secs) = raw.trim().parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |d| d.with_timezone(&Utc))
}

/// Fixed provenance values
#[derive(Debug, Clone)]
pub struct StaticBuildInfo {
    pub version: String,
    pub git_commit: String,
    pub git_tree_state: String,
    pub build_date: DateTime<Utc>,
}

impl BuildInfo for StaticBuildInfo {
    fn version(&self) -> String {
        self.version.clone()
    }

    fn git_commit(&self) -> String {
        self.git_commit.clone()
    }

    fn git_tree_state(&self) -> String {
        self.git_tree_state.clone()
    }

    fn build_date(&self) -> DateTime<Utc> {
        self.build_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_unix_seconds() {
        assert_eq!(
            parse_timestamp("1704067200"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(
            parse_timestamp("2024-01-01T02:00:00+02:00"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_garbage_is_epoch() {
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::UNIX_EPOCH);
    }
}
