//! The container property table.
//!
//! [`container_property_table`] declares every container property the
//! reconciler knows about: its value shape, default comparison, whether a
//! mismatch can be fixed in place or forces a recreate, and which API level
//! first supports it. The table is plain data; callers layer
//! [`ComparisonOverrides`](crate::property::ComparisonOverrides) on top of it
//! to tune comparisons per run.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::compare::{CompareStrategy, ValueShape};
use crate::error::{Error, Result};
use crate::property::{PropertySpec, PropertyTable};

static BASELINE_TABLE: Lazy<PropertyTable> = Lazy::new(|| {
    container_property_table(&ApiCapabilities::default())
        .expect("baseline container table is valid")
});

/// A `major.minor` API version of the container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    major: u32,
    minor: u32,
}

impl ApiVersion {
    /// The oldest API version this integration talks to at all.
    pub const MIN_SUPPORTED: ApiVersion = ApiVersion::new(1, 20);

    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
        let major = major
            .parse()
            .map_err(|_| Error::InvalidVersion(s.to_string()))?;
        let minor = minor
            .parse()
            .map_err(|_| Error::InvalidVersion(s.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}

const API_1_21: ApiVersion = ApiVersion::new(1, 21);
const API_1_22: ApiVersion = ApiVersion::new(1, 22);
const API_1_23: ApiVersion = ApiVersion::new(1, 23);
const API_1_24: ApiVersion = ApiVersion::new(1, 24);
const API_1_25: ApiVersion = ApiVersion::new(1, 25);

/// What the connected runtime can do, derived from its API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiCapabilities {
    version: ApiVersion,
}

impl ApiCapabilities {
    /// Derives capabilities from a negotiated API version.
    pub fn new(version: ApiVersion) -> Self {
        Self { version }
    }

    /// The negotiated version.
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Whether the runtime speaks at least the given version.
    pub fn at_least(&self, version: ApiVersion) -> bool {
        self.version >= version
    }

    /// Whether resource limits can be changed on a live container. Older
    /// runtimes only accept limits at create time, so a limit mismatch has
    /// to recreate the container there.
    pub fn in_place_updates(&self) -> bool {
        self.at_least(API_1_22)
    }
}

impl Default for ApiCapabilities {
    fn default() -> Self {
        Self::new(ApiVersion::MIN_SUPPORTED)
    }
}

/// Builds the property table for containers on a runtime with the given
/// capabilities.
///
/// Properties the runtime is too old for stay in the table but are marked
/// unsupported, so a desired value for them is silently skipped instead of
/// producing a comparison against a field the runtime never reports.
pub fn container_property_table(caps: &ApiCapabilities) -> Result<PropertyTable> {
    use CompareStrategy::Ignore;
    use ValueShape::{Dict, OrderedList, Scalar, Set, SetOfDict};

    // Resource limits share one mutability: in place on runtimes that take
    // live updates, recreate on older ones.
    let limit = |name: &str| {
        let spec = PropertySpec::new(name, Scalar);
        if caps.in_place_updates() {
            spec.updatable()
        } else {
            spec
        }
    };

    PropertyTable::builder()
        .property(PropertySpec::new("image", Scalar))
        .property(PropertySpec::new("command", OrderedList))
        .property(PropertySpec::new("entrypoint", OrderedList))
        .property(PropertySpec::new("hostname", Scalar))
        .property(PropertySpec::new("domainname", Scalar))
        .property(PropertySpec::new("user", Scalar))
        .property(PropertySpec::new("working_dir", Scalar))
        .property(PropertySpec::new("env", Set))
        .property(PropertySpec::new("labels", Dict))
        .property(PropertySpec::new("volumes", Set))
        .property(
            PropertySpec::new("exposed_ports", Set)
                .with_alias("exposed")
                .with_alias("expose"),
        )
        .property(PropertySpec::new("published_ports", Dict).with_alias("ports"))
        .property(PropertySpec::new("dns_servers", OrderedList))
        .property(PropertySpec::new("dns_search_domains", OrderedList))
        .property(PropertySpec::new("etc_hosts", Set))
        .property(PropertySpec::new("capabilities", Set))
        .property(PropertySpec::new("cap_drop", Set))
        .property(PropertySpec::new("groups", Set))
        .property(PropertySpec::new("security_opts", Set))
        .property(PropertySpec::new("devices", SetOfDict))
        .property(PropertySpec::new("ulimits", SetOfDict))
        .property(
            PropertySpec::new("sysctls", Dict).with_supported(caps.at_least(API_1_24)),
        )
        .property(PropertySpec::new("networks", SetOfDict))
        .property(PropertySpec::new("network_mode", Scalar))
        .property(PropertySpec::new("privileged", Scalar))
        .property(PropertySpec::new("read_only", Scalar))
        .property(PropertySpec::new("init", Scalar).with_supported(caps.at_least(API_1_25)))
        .property(
            PropertySpec::new("auto_remove", Scalar).with_supported(caps.at_least(API_1_25)),
        )
        .property(PropertySpec::new("tty", Scalar))
        .property(PropertySpec::new("interactive", Scalar))
        .property(PropertySpec::new("restart_policy", Scalar))
        .property(PropertySpec::new("restart_retries", Scalar).requires("restart_policy"))
        .property(PropertySpec::new("log_driver", Scalar))
        .property(
            PropertySpec::new("log_options", Dict)
                .with_alias("log_opt")
                .requires("log_driver"),
        )
        .property(limit("memory"))
        .property(limit("memory_reservation").with_supported(caps.at_least(API_1_21)))
        .property(limit("memory_swap"))
        .property(limit("kernel_memory").with_supported(caps.at_least(API_1_21)))
        .property(limit("cpu_shares"))
        .property(limit("cpu_period"))
        .property(limit("cpu_quota"))
        .property(limit("cpuset_cpus"))
        .property(limit("cpuset_mems"))
        .property(limit("blkio_weight"))
        .property(PropertySpec::new("shm_size", Scalar).with_supported(caps.at_least(API_1_22)))
        .property(
            PropertySpec::new("stop_signal", Scalar).with_supported(caps.at_least(API_1_21)),
        )
        // Many runtimes only honor the stop timeout at stop time, so a
        // recorded value that differs is not acted on unless asked for.
        .property(
            PropertySpec::new("stop_timeout", Scalar)
                .with_strategy(Ignore)
                .with_supported(caps.at_least(API_1_25)),
        )
        .property(
            PropertySpec::new("pids_limit", Scalar).with_supported(caps.at_least(API_1_23)),
        )
        .property(
            PropertySpec::new("oom_score_adj", Scalar).with_supported(caps.at_least(API_1_22)),
        )
        .build()
}

/// The table for [`ApiVersion::MIN_SUPPORTED`], built once and shared.
///
/// This is the conservative baseline: no version-gated property is supported
/// and every difference forces a recreate. Callers that negotiate a version
/// should build their own table with [`container_property_table`].
pub fn baseline_property_table() -> &'static PropertyTable {
    &BASELINE_TABLE
}
