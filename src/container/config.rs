//! Typed desired-state configuration for containers.
//!
//! [`ContainerSpec`] enumerates every container property this integration can
//! enforce as an explicit struct field; nothing is introspected at runtime.
//! Unset fields (`None`) are simply not enforced. [`ContainerSpec::desired_state`]
//! projects the struct onto the canonical property keys of the
//! [table](super::container_property_table), applying the handful of
//! normalizations the comparison relies on: environment and extra-host maps
//! become `KEY=VALUE` / `host:ip` entry sets, port keys get their protocol
//! suffix, and the typed sub-structs become canonical dicts.
//!
//! Values that other tooling passes as one-off format strings (port ranges,
//! bind specifications, size suffixes) are taken as structured values here.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::normalize_port_key;
use crate::error::{ErrorContext, Result};
use crate::reconciler::DesiredState;

/// Container restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart automatically.
    No,
    /// Restart on non-zero exit, up to the configured retry count.
    OnFailure,
    /// Always restart.
    Always,
    /// Always restart unless explicitly stopped.
    UnlessStopped,
}

impl RestartPolicy {
    /// Returns the policy name as the external system spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_device_permissions() -> String {
    "rwm".to_string()
}

/// A host device made available inside the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMapping {
    /// Device path on the host.
    pub path_on_host: String,
    /// Device path inside the container.
    pub path_in_container: String,
    /// Cgroup permissions, e.g. `rwm`.
    #[serde(default = "default_device_permissions")]
    pub cgroup_permissions: String,
}

impl DeviceMapping {
    fn as_value(&self) -> Value {
        json!({
            "path_on_host": self.path_on_host,
            "path_in_container": self.path_in_container,
            "cgroup_permissions": self.cgroup_permissions,
        })
    }
}

/// A ulimit applied to the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ulimit {
    /// Limit name, e.g. `nofile`.
    pub name: String,
    /// Soft limit.
    pub soft: i64,
    /// Hard limit.
    pub hard: i64,
}

impl Ulimit {
    fn as_value(&self) -> Value {
        json!({
            "name": self.name,
            "soft": self.soft,
            "hard": self.hard,
        })
    }
}

/// A network the container is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    /// Network name.
    pub name: String,
    /// Additional names the container answers to on this network.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Legacy links established on this network.
    #[serde(default)]
    pub links: Vec<String>,
    /// Static IPv4 address.
    #[serde(default)]
    pub ipv4_address: Option<String>,
    /// Static IPv6 address.
    #[serde(default)]
    pub ipv6_address: Option<String>,
}

impl NetworkAttachment {
    /// Canonical dict form. Only requested aspects are included, so the
    /// superset comparison does not demand aspects the caller never asked
    /// about.
    fn as_value(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("name".to_string(), Value::String(self.name.clone()));
        if !self.aliases.is_empty() {
            entry.insert("aliases".to_string(), self.aliases.clone().into());
        }
        if !self.links.is_empty() {
            entry.insert("links".to_string(), self.links.clone().into());
        }
        if let Some(ip) = &self.ipv4_address {
            entry.insert("ipv4_address".to_string(), Value::String(ip.clone()));
        }
        if let Some(ip) = &self.ipv6_address {
            entry.insert("ipv6_address".to_string(), Value::String(ip.clone()));
        }
        Value::Object(entry)
    }
}

/// Desired configuration of one container.
///
/// Every field is optional; `None` means "do not enforce". The field names
/// double as the canonical property keys used in diff reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerSpec {
    /// Image the container runs.
    pub image: Option<String>,
    /// Command, as an argument vector.
    pub command: Option<Vec<String>>,
    /// Entrypoint, as an argument vector.
    pub entrypoint: Option<Vec<String>>,
    /// Container hostname.
    pub hostname: Option<String>,
    /// Container domain name.
    pub domainname: Option<String>,
    /// User (or UID) the main process runs as.
    pub user: Option<String>,
    /// Working directory of the main process.
    pub working_dir: Option<String>,
    /// Environment variables.
    pub env: Option<IndexMap<String, String>>,
    /// Labels. Compared tolerantly by default: labels inherited from the
    /// image do not count as differences.
    pub labels: Option<IndexMap<String, String>>,
    /// Container paths that are mount points.
    pub volumes: Option<Vec<String>>,
    /// Ports the container exposes, as `port` or `port/protocol`.
    pub exposed_ports: Option<Vec<String>>,
    /// Published ports: container `port/protocol` to host port.
    pub published_ports: Option<IndexMap<String, String>>,
    /// DNS servers.
    pub dns_servers: Option<Vec<String>>,
    /// DNS search domains.
    pub dns_search_domains: Option<Vec<String>>,
    /// Extra `/etc/hosts` entries: host name to address.
    pub etc_hosts: Option<IndexMap<String, String>>,
    /// Added Linux capabilities.
    pub capabilities: Option<Vec<String>>,
    /// Dropped Linux capabilities.
    pub cap_drop: Option<Vec<String>>,
    /// Additional groups of the main process.
    pub groups: Option<Vec<String>>,
    /// Security options.
    pub security_opts: Option<Vec<String>>,
    /// Host devices mapped into the container.
    pub devices: Option<Vec<DeviceMapping>>,
    /// Ulimits.
    pub ulimits: Option<Vec<Ulimit>>,
    /// Kernel parameters set inside the container.
    pub sysctls: Option<IndexMap<String, String>>,
    /// Networks the container is attached to.
    pub networks: Option<Vec<NetworkAttachment>>,
    /// Network mode, e.g. `bridge` or `host`.
    pub network_mode: Option<String>,
    /// Run privileged.
    pub privileged: Option<bool>,
    /// Mount the root filesystem read-only.
    pub read_only: Option<bool>,
    /// Run an init process as PID 1.
    pub init: Option<bool>,
    /// Remove the container when it exits.
    pub auto_remove: Option<bool>,
    /// Allocate a TTY.
    pub tty: Option<bool>,
    /// Keep stdin open.
    pub interactive: Option<bool>,
    /// Restart policy.
    pub restart_policy: Option<RestartPolicy>,
    /// Retry count for the `on-failure` restart policy. Only enforced when
    /// `restart_policy` is set.
    pub restart_retries: Option<u32>,
    /// Logging driver.
    pub log_driver: Option<String>,
    /// Logging driver options. Only enforced when `log_driver` is set.
    pub log_options: Option<IndexMap<String, String>>,
    /// Memory limit in bytes.
    pub memory: Option<i64>,
    /// Memory soft limit in bytes.
    pub memory_reservation: Option<i64>,
    /// Total memory plus swap limit in bytes.
    pub memory_swap: Option<i64>,
    /// Kernel memory limit in bytes.
    pub kernel_memory: Option<i64>,
    /// CPU shares (relative weight).
    pub cpu_shares: Option<i64>,
    /// CPU CFS period in microseconds.
    pub cpu_period: Option<i64>,
    /// CPU CFS quota in microseconds.
    pub cpu_quota: Option<i64>,
    /// CPUs the container may run on, e.g. `0-3`.
    pub cpuset_cpus: Option<String>,
    /// Memory nodes the container may use.
    pub cpuset_mems: Option<String>,
    /// Block IO weight, 10 to 1000.
    pub blkio_weight: Option<u16>,
    /// Size of `/dev/shm` in bytes.
    pub shm_size: Option<i64>,
    /// Signal used to stop the container.
    pub stop_signal: Option<String>,
    /// Seconds to wait before killing on stop. Ignored in comparisons by
    /// default because many systems only apply it at stop time.
    pub stop_timeout: Option<u32>,
    /// Process count limit.
    pub pids_limit: Option<i64>,
    /// OOM score adjustment.
    pub oom_score_adj: Option<i64>,
}

impl ContainerSpec {
    /// Parses a spec from a YAML document. Unknown keys are rejected.
    pub fn from_yaml_str(document: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(document)?)
    }

    /// Reads and parses a spec from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading container spec from '{}'", path.display()))?;
        Self::from_yaml_str(&raw)
    }

    /// Projects the spec onto the canonical property keys.
    ///
    /// Only set fields appear in the result; the reconciler treats missing
    /// keys as "not specified".
    pub fn desired_state(&self) -> DesiredState {
        let mut state = DesiredState::new();

        if let Some(v) = &self.image {
            state.set("image", v.as_str());
        }
        if let Some(v) = &self.command {
            state.set("command", v.clone());
        }
        if let Some(v) = &self.entrypoint {
            state.set("entrypoint", v.clone());
        }
        if let Some(v) = &self.hostname {
            state.set("hostname", v.as_str());
        }
        if let Some(v) = &self.domainname {
            state.set("domainname", v.as_str());
        }
        if let Some(v) = &self.user {
            state.set("user", v.as_str());
        }
        if let Some(v) = &self.working_dir {
            state.set("working_dir", v.as_str());
        }
        if let Some(map) = &self.env {
            state.set("env", sorted_entries(map, '='));
        }
        if let Some(map) = &self.labels {
            state.set("labels", string_map_value(map));
        }
        if let Some(v) = &self.volumes {
            state.set("volumes", v.clone());
        }
        if let Some(ports) = &self.exposed_ports {
            let normalized: Vec<String> =
                ports.iter().map(|p| normalize_port_key(p)).collect();
            state.set("exposed_ports", normalized);
        }
        if let Some(ports) = &self.published_ports {
            let mut normalized = Map::new();
            for (container_port, host_port) in ports {
                normalized.insert(
                    normalize_port_key(container_port),
                    Value::String(host_port.clone()),
                );
            }
            state.set("published_ports", Value::Object(normalized));
        }
        if let Some(v) = &self.dns_servers {
            state.set("dns_servers", v.clone());
        }
        if let Some(v) = &self.dns_search_domains {
            state.set("dns_search_domains", v.clone());
        }
        if let Some(map) = &self.etc_hosts {
            state.set("etc_hosts", sorted_entries(map, ':'));
        }
        if let Some(v) = &self.capabilities {
            state.set("capabilities", v.clone());
        }
        if let Some(v) = &self.cap_drop {
            state.set("cap_drop", v.clone());
        }
        if let Some(v) = &self.groups {
            state.set("groups", v.clone());
        }
        if let Some(v) = &self.security_opts {
            state.set("security_opts", v.clone());
        }
        if let Some(devices) = &self.devices {
            let entries: Vec<Value> = devices.iter().map(DeviceMapping::as_value).collect();
            state.set("devices", entries);
        }
        if let Some(ulimits) = &self.ulimits {
            let entries: Vec<Value> = ulimits.iter().map(Ulimit::as_value).collect();
            state.set("ulimits", entries);
        }
        if let Some(map) = &self.sysctls {
            state.set("sysctls", string_map_value(map));
        }
        if let Some(networks) = &self.networks {
            let entries: Vec<Value> = networks.iter().map(NetworkAttachment::as_value).collect();
            state.set("networks", entries);
        }
        if let Some(v) = &self.network_mode {
            state.set("network_mode", v.as_str());
        }
        if let Some(v) = self.privileged {
            state.set("privileged", v);
        }
        if let Some(v) = self.read_only {
            state.set("read_only", v);
        }
        if let Some(v) = self.init {
            state.set("init", v);
        }
        if let Some(v) = self.auto_remove {
            state.set("auto_remove", v);
        }
        if let Some(v) = self.tty {
            state.set("tty", v);
        }
        if let Some(v) = self.interactive {
            state.set("interactive", v);
        }
        if let Some(v) = self.restart_policy {
            state.set("restart_policy", v.as_str());
        }
        if let Some(v) = self.restart_retries {
            state.set("restart_retries", v);
        }
        if let Some(v) = &self.log_driver {
            state.set("log_driver", v.as_str());
        }
        if let Some(map) = &self.log_options {
            state.set("log_options", string_map_value(map));
        }
        if let Some(v) = self.memory {
            state.set("memory", v);
        }
        if let Some(v) = self.memory_reservation {
            state.set("memory_reservation", v);
        }
        if let Some(v) = self.memory_swap {
            state.set("memory_swap", v);
        }
        if let Some(v) = self.kernel_memory {
            state.set("kernel_memory", v);
        }
        if let Some(v) = self.cpu_shares {
            state.set("cpu_shares", v);
        }
        if let Some(v) = self.cpu_period {
            state.set("cpu_period", v);
        }
        if let Some(v) = self.cpu_quota {
            state.set("cpu_quota", v);
        }
        if let Some(v) = &self.cpuset_cpus {
            state.set("cpuset_cpus", v.as_str());
        }
        if let Some(v) = &self.cpuset_mems {
            state.set("cpuset_mems", v.as_str());
        }
        if let Some(v) = self.blkio_weight {
            state.set("blkio_weight", v);
        }
        if let Some(v) = self.shm_size {
            state.set("shm_size", v);
        }
        if let Some(v) = &self.stop_signal {
            state.set("stop_signal", v.as_str());
        }
        if let Some(v) = self.stop_timeout {
            state.set("stop_timeout", v);
        }
        if let Some(v) = self.pids_limit {
            state.set("pids_limit", v);
        }
        if let Some(v) = self.oom_score_adj {
            state.set("oom_score_adj", v);
        }

        state
    }
}

/// Flattens a string map into sorted `key<sep>value` entries, the canonical
/// set form for environment variables and extra hosts.
fn sorted_entries(map: &IndexMap<String, String>, separator: char) -> Vec<String> {
    let mut entries: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{}{}{}", k, separator, v))
        .collect();
    entries.sort();
    entries
}

fn string_map_value(map: &IndexMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}
