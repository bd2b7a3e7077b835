//! Normalization of container inspect documents.
//!
//! [`observe_container`] takes the raw JSON document a container runtime
//! returns for one container and flattens it into an
//! [`ObservedResource`](crate::convergence::ObservedResource) keyed by the
//! same canonical property names the [table](super::container_property_table)
//! declares. All knowledge of the runtime's document layout (`Config`,
//! `HostConfig`, `NetworkSettings`, CamelCase field names) lives here; the
//! reconciler only ever sees canonical keys.

use serde_json::{json, Map, Value};

use super::normalize_port_key;
use crate::convergence::ObservedResource;
use crate::error::{Error, Result};
use crate::reconciler::ObservedState;

/// Flattens a container inspect document into an observed resource.
///
/// The document must carry `Id` plus the `Config`, `HostConfig` and
/// `NetworkSettings` sections; anything else missing is treated as "not
/// reported" and simply left out of the result, where the shape-aware
/// normalization at comparison time fills in the empty value.
pub fn observe_container(inspect: &Value) -> Result<ObservedResource> {
    let id = inspect
        .get("Id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidObservation("Id missing".to_string()))?
        .to_string();

    let config = section(inspect, "Config")?;
    let host_config = section(inspect, "HostConfig")?;
    let network_settings = section(inspect, "NetworkSettings")?;

    let state = inspect.get("State").and_then(Value::as_object);
    // A ghost container is one the runtime lost track of; it reports
    // Running but cannot be addressed, so it does not count as running.
    let running = state.is_some_and(|s| {
        truthy(s.get("Running")) && !truthy(s.get("Ghost"))
    });
    let paused = state.is_some_and(|s| truthy(s.get("Paused")));

    let log_config = host_config
        .get("LogConfig")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let restart_policy = host_config
        .get("RestartPolicy")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut props = ObservedState::new();

    put(&mut props, "image", config.get("Image"));
    put(&mut props, "command", config.get("Cmd"));
    put(&mut props, "entrypoint", config.get("Entrypoint"));
    put(&mut props, "hostname", config.get("Hostname"));
    put(&mut props, "domainname", config.get("Domainname"));
    put(&mut props, "user", config.get("User"));
    put(&mut props, "working_dir", config.get("WorkingDir"));
    put(&mut props, "env", config.get("Env"));
    put(&mut props, "labels", config.get("Labels"));
    props.set("volumes", object_keys(config.get("Volumes")));
    props.set("exposed_ports", exposed_ports(config.get("ExposedPorts")));
    put(&mut props, "tty", config.get("Tty"));
    put(&mut props, "interactive", config.get("OpenStdin"));
    put(&mut props, "stop_signal", config.get("StopSignal"));
    put(&mut props, "stop_timeout", config.get("StopTimeout"));

    put(&mut props, "capabilities", host_config.get("CapAdd"));
    put(&mut props, "cap_drop", host_config.get("CapDrop"));
    put(&mut props, "groups", host_config.get("GroupAdd"));
    put(&mut props, "security_opts", host_config.get("SecurityOpt"));
    put(&mut props, "dns_servers", host_config.get("Dns"));
    put(&mut props, "dns_search_domains", host_config.get("DnsSearch"));
    put(&mut props, "etc_hosts", host_config.get("ExtraHosts"));
    put(&mut props, "network_mode", host_config.get("NetworkMode"));
    put(&mut props, "privileged", host_config.get("Privileged"));
    put(&mut props, "read_only", host_config.get("ReadonlyRootfs"));
    put(&mut props, "init", host_config.get("Init"));
    put(&mut props, "auto_remove", host_config.get("AutoRemove"));
    put(&mut props, "sysctls", host_config.get("Sysctls"));
    props.set("devices", device_entries(host_config.get("Devices")));
    props.set("ulimits", ulimit_entries(host_config.get("Ulimits")));
    props.set(
        "published_ports",
        published_ports(host_config.get("PortBindings")),
    );

    put(&mut props, "restart_policy", restart_policy.get("Name"));
    put(
        &mut props,
        "restart_retries",
        restart_policy.get("MaximumRetryCount"),
    );
    put(&mut props, "log_driver", log_config.get("Type"));
    put(&mut props, "log_options", log_config.get("Config"));

    put(&mut props, "memory", host_config.get("Memory"));
    put(
        &mut props,
        "memory_reservation",
        host_config.get("MemoryReservation"),
    );
    put(&mut props, "memory_swap", host_config.get("MemorySwap"));
    put(&mut props, "kernel_memory", host_config.get("KernelMemory"));
    put(&mut props, "cpu_shares", host_config.get("CpuShares"));
    put(&mut props, "cpu_period", host_config.get("CpuPeriod"));
    put(&mut props, "cpu_quota", host_config.get("CpuQuota"));
    put(&mut props, "cpuset_cpus", host_config.get("CpusetCpus"));
    put(&mut props, "cpuset_mems", host_config.get("CpusetMems"));
    put(&mut props, "blkio_weight", host_config.get("BlkioWeight"));
    put(&mut props, "shm_size", host_config.get("ShmSize"));
    put(&mut props, "pids_limit", host_config.get("PidsLimit"));
    put(&mut props, "oom_score_adj", host_config.get("OomScoreAdj"));

    props.set(
        "networks",
        network_entries(network_settings.get("Networks")),
    );

    Ok(ObservedResource {
        id,
        properties: props,
        running,
        paused,
    })
}

fn section<'a>(doc: &'a Value, name: &str) -> Result<&'a Map<String, Value>> {
    doc.get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::InvalidObservation(format!("{name} missing")))
}

fn truthy(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

/// Copies a reported value through under its canonical key. Null and absent
/// both mean "not reported" and are left out.
fn put(props: &mut ObservedState, key: &str, value: Option<&Value>) {
    if let Some(v) = value {
        if !v.is_null() {
            props.set(key, v.clone());
        }
    }
}

/// Runtimes report mount points and exposures as objects with empty values;
/// only the keys carry information.
fn object_keys(value: Option<&Value>) -> Value {
    match value.and_then(Value::as_object) {
        Some(map) => map.keys().cloned().collect::<Vec<_>>().into(),
        None => json!([]),
    }
}

/// `ExposedPorts` is reported as null rather than an empty object when the
/// container exposes nothing.
fn exposed_ports(value: Option<&Value>) -> Value {
    match value.and_then(Value::as_object) {
        Some(map) => map
            .keys()
            .map(|port| normalize_port_key(port))
            .collect::<Vec<_>>()
            .into(),
        None => json!([]),
    }
}

/// Flattens `PortBindings` to a map of port key to first bound host port.
fn published_ports(value: Option<&Value>) -> Value {
    let mut flattened = Map::new();
    if let Some(bindings) = value.and_then(Value::as_object) {
        for (port, binding_list) in bindings {
            let host_port = binding_list
                .as_array()
                .and_then(|list| list.first())
                .and_then(|binding| binding.get("HostPort"))
                .cloned()
                .unwrap_or(Value::Null);
            flattened.insert(normalize_port_key(port), host_port);
        }
    }
    Value::Object(flattened)
}

fn device_entries(value: Option<&Value>) -> Value {
    let entries: Vec<Value> = value
        .and_then(Value::as_array)
        .map(|devices| {
            devices
                .iter()
                .map(|device| {
                    json!({
                        "path_on_host": device.get("PathOnHost").cloned().unwrap_or(Value::Null),
                        "path_in_container": device
                            .get("PathInContainer")
                            .cloned()
                            .unwrap_or(Value::Null),
                        "cgroup_permissions": device
                            .get("CgroupPermissions")
                            .and_then(Value::as_str)
                            .unwrap_or("rwm"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    entries.into()
}

fn ulimit_entries(value: Option<&Value>) -> Value {
    let entries: Vec<Value> = value
        .and_then(Value::as_array)
        .map(|ulimits| {
            ulimits
                .iter()
                .map(|ulimit| {
                    json!({
                        "name": ulimit.get("Name").cloned().unwrap_or(Value::Null),
                        "soft": ulimit.get("Soft").cloned().unwrap_or(Value::Null),
                        "hard": ulimit.get("Hard").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    entries.into()
}

/// Flattens `NetworkSettings.Networks` into canonical attachment dicts.
/// Aspects the runtime leaves null or empty are omitted, so a desired
/// attachment that does not mention them still matches under subsumption.
fn network_entries(value: Option<&Value>) -> Value {
    let mut entries = Vec::new();
    if let Some(networks) = value.and_then(Value::as_object) {
        for (name, attachment) in networks {
            let mut entry = Map::new();
            entry.insert("name".to_string(), Value::String(name.clone()));
            if let Some(aliases) = attachment.get("Aliases").filter(|v| !v.is_null()) {
                entry.insert("aliases".to_string(), aliases.clone());
            }
            if let Some(links) = attachment.get("Links").filter(|v| !v.is_null()) {
                entry.insert("links".to_string(), links.clone());
            }
            if let Some(ip) = nonempty_str(attachment.get("IPAddress")) {
                entry.insert("ipv4_address".to_string(), Value::String(ip.to_string()));
            }
            if let Some(ip) = nonempty_str(attachment.get("GlobalIPv6Address")) {
                entry.insert("ipv6_address".to_string(), Value::String(ip.to_string()));
            }
            entries.push(Value::Object(entry));
        }
    }
    entries.into()
}

fn nonempty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
