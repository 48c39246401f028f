//! Service Metadata
//!
//! Identity of the running service instance, read once at startup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::env::{env_or, process_env};

/// Value used for any metadata field that is not provided
pub const UNKNOWN_VALUE: &str = "unknown-dev";

/// Metadata about the service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name (`SERVICE_NAME`)
    #[serde(rename = "service_name")]
    pub name: String,
    /// Service version (`SERVICE_VERSION`)
    pub version: String,
    /// Instance identifier (`INSTANCE_ID`)
    pub instance_id: String,
    /// Source commit (`COMMIT_SHA`)
    pub commit_sha: String,
    /// Build timestamp (`BUILD_TIME`)
    pub build_time: String,
}

impl ServiceInfo {
    /// Create from explicit values
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        instance_id: impl Into<String>,
        commit_sha: impl Into<String>,
        build_time: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            instance_id: instance_id.into(),
            commit_sha: commit_sha.into(),
            build_time: build_time.into(),
        }
    }

    /// Create from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Create from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            name: env_or(&lookup, "SERVICE_NAME", UNKNOWN_VALUE),
            version: env_or(&lookup, "SERVICE_VERSION", UNKNOWN_VALUE),
            instance_id: env_or(&lookup, "INSTANCE_ID", UNKNOWN_VALUE),
            commit_sha: env_or(&lookup, "COMMIT_SHA", UNKNOWN_VALUE),
            build_time: env_or(&lookup, "BUILD_TIME", UNKNOWN_VALUE),
        }
    }

    /// Metadata as an ordered map, keyed the way `/info` exposes it
    pub fn as_map(&self) -> BTreeMap<&'static str, &str> {
        BTreeMap::from([
            ("service_name", self.name.as_str()),
            ("version", self.version.as_str()),
            ("instance_id", self.instance_id.as_str()),
            ("commit_sha", self.commit_sha.as_str()),
            ("build_time", self.build_time.as_str()),
        ])
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self::new(
            UNKNOWN_VALUE,
            UNKNOWN_VALUE,
            UNKNOWN_VALUE,
            UNKNOWN_VALUE,
            UNKNOWN_VALUE,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
