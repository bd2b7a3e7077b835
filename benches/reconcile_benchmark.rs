//! Reconciliation Performance Benchmarks for Converge
//!
//! This benchmark suite provides performance testing for:
//!
//! 1. VALUE COMPARISON:
//!    - Scalar, set and dict comparisons at different sizes
//!    - Strict vs allow_more_present set semantics
//!    - Set-of-dict subsumption
//!
//! 2. RECONCILIATION:
//!    - Full table walk with no drift (the steady-state hot path)
//!    - Table walk with drift and canonicalization
//!    - Scaling with table width
//!
//! 3. TABLE CONSTRUCTION:
//!    - Container table build and validation
//!    - Comparison override application
//!
//! 4. OBSERVATION:
//!    - Inspect document flattening
//!
//! 5. DIFF REPORTING:
//!    - Tracker projections and unified diff rendering
//!
//! Run with: cargo bench --bench reconcile_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use converge::compare::{compare_values, CompareStrategy, ValueShape};
use converge::container::{container_property_table, observe_container, ApiCapabilities};
use converge::property::{ComparisonOverrides, PropertySpec, PropertyTable};
use converge::reconciler::{DesiredState, ObservedState, Reconciler};

// ============================================================================
// TEST DATA GENERATORS
// ============================================================================

/// Generate an entry set of the given size, as environment-style strings.
fn entry_set(size: usize) -> Value {
    let entries: Vec<String> = (0..size).map(|i| format!("KEY_{i}=value_{i}")).collect();
    json!(entries)
}

/// Generate a label dict of the given size.
fn label_dict(size: usize) -> Value {
    let map: serde_json::Map<String, Value> = (0..size)
        .map(|i| (format!("label-{i}"), json!(format!("value-{i}"))))
        .collect();
    Value::Object(map)
}

/// Generate a table of `width` scalar properties.
fn generic_table(width: usize) -> PropertyTable {
    let mut builder = PropertyTable::builder();
    for i in 0..width {
        builder = builder.property(PropertySpec::new(
            format!("property_{i}"),
            ValueShape::Scalar,
        ));
    }
    builder.build().unwrap()
}

/// Generate matching desired and observed states for [`generic_table`].
fn matching_states(width: usize) -> (DesiredState, ObservedState) {
    let mut desired = DesiredState::new();
    let mut observed = ObservedState::new();
    for i in 0..width {
        desired.set(format!("property_{i}"), i as i64);
        observed.set(format!("property_{i}"), i as i64);
    }
    (desired, observed)
}

/// An inspect document of realistic size.
fn inspect_fixture() -> Value {
    json!({
        "Id": "2bf5ed0c5c1a",
        "State": {"Running": true, "Paused": false},
        "Config": {
            "Image": "nginx:1.25",
            "Cmd": ["nginx", "-g", "daemon off;"],
            "Hostname": "web-1",
            "Env": ["PATH=/usr/sbin:/usr/bin", "APP_ENV=prod", "LANG=C.UTF-8"],
            "Labels": {"env": "prod", "owner": "team-x", "tier": "frontend"},
            "Volumes": {"/var/cache": {}},
            "ExposedPorts": {"80/tcp": {}, "443/tcp": {}},
            "Tty": false,
            "OpenStdin": false
        },
        "HostConfig": {
            "NetworkMode": "bridge",
            "PortBindings": {"80/tcp": [{"HostIp": "", "HostPort": "8080"}]},
            "RestartPolicy": {"Name": "on-failure", "MaximumRetryCount": 5},
            "LogConfig": {"Type": "json-file", "Config": {"max-size": "10m"}},
            "Ulimits": [{"Name": "nofile", "Soft": 1024, "Hard": 2048}],
            "Memory": 268435456,
            "CpuShares": 512
        },
        "NetworkSettings": {
            "Networks": {
                "bridge": {"IPAddress": "172.17.0.2", "GlobalIPv6Address": ""}
            }
        }
    })
}

// ============================================================================
// VALUE COMPARISON BENCHMARKS
// ============================================================================

fn bench_value_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_comparison");

    for size in [10, 100] {
        let desired = entry_set(size);
        let observed = entry_set(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("set_strict", size),
            &size,
            |b, _| {
                b.iter(|| {
                    compare_values(
                        black_box(&desired),
                        black_box(&observed),
                        ValueShape::Set,
                        CompareStrategy::Strict,
                    )
                })
            },
        );
        group.bench_with_input(
            BenchmarkId::new("set_allow_more_present", size),
            &size,
            |b, _| {
                b.iter(|| {
                    compare_values(
                        black_box(&desired),
                        black_box(&observed),
                        ValueShape::Set,
                        CompareStrategy::AllowMorePresent,
                    )
                })
            },
        );

        let desired_labels = label_dict(size / 2);
        let observed_labels = label_dict(size);
        group.bench_with_input(
            BenchmarkId::new("dict_allow_more_present", size),
            &size,
            |b, _| {
                b.iter(|| {
                    compare_values(
                        black_box(&desired_labels),
                        black_box(&observed_labels),
                        ValueShape::Dict,
                        CompareStrategy::AllowMorePresent,
                    )
                })
            },
        );
    }

    let desired_mounts = json!([
        {"source": "/data", "target": "/var/data"},
        {"source": "/logs", "target": "/var/log/app"}
    ]);
    let observed_mounts = json!([
        {"source": "/logs", "target": "/var/log/app", "mode": "rw"},
        {"source": "/data", "target": "/var/data", "mode": "rw"},
        {"source": "/tmp", "target": "/scratch", "mode": "rw"}
    ]);
    group.bench_function("set_of_dict_subsumption", |b| {
        b.iter(|| {
            compare_values(
                black_box(&desired_mounts),
                black_box(&observed_mounts),
                ValueShape::SetOfDict,
                CompareStrategy::AllowMorePresent,
            )
        })
    });

    group.finish();
}

// ============================================================================
// RECONCILIATION BENCHMARKS
// ============================================================================

fn bench_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for width in [10, 50, 200] {
        let reconciler = Reconciler::new(generic_table(width));
        let (desired, observed) = matching_states(width);
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(
            BenchmarkId::new("no_drift", width),
            &width,
            |b, _| b.iter(|| reconciler.reconcile(black_box(&desired), black_box(&observed))),
        );

        let (mut drifted, _) = matching_states(width);
        // A tenth of the properties differ.
        for i in (0..width).step_by(10) {
            drifted.set(format!("property_{i}"), -1);
        }
        group.bench_with_input(
            BenchmarkId::new("ten_percent_drift", width),
            &width,
            |b, _| b.iter(|| reconciler.reconcile(black_box(&drifted), black_box(&observed))),
        );
    }

    // The realistic case: container table against a flattened inspect doc.
    let caps = ApiCapabilities::new("1.41".parse().unwrap());
    let reconciler = Reconciler::new(container_property_table(&caps).unwrap());
    let observed = observe_container(&inspect_fixture()).unwrap().properties;
    let desired = DesiredState::new()
        .with("image", "nginx:1.25")
        .with("env", json!(["APP_ENV=prod"]))
        .with("labels", json!({"env": "prod"}))
        .with("memory", 268435456i64);
    group.bench_function("container_steady_state", |b| {
        b.iter(|| reconciler.reconcile(black_box(&desired), black_box(&observed)))
    });

    group.finish();
}

// ============================================================================
// TABLE CONSTRUCTION BENCHMARKS
// ============================================================================

fn bench_table_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_construction");
    let caps = ApiCapabilities::new("1.41".parse().unwrap());

    group.bench_function("container_table_build", |b| {
        b.iter(|| container_property_table(black_box(&caps)).unwrap())
    });

    let table = container_property_table(&caps).unwrap();
    let overrides = ComparisonOverrides::from_pairs([
        ("*", "strict"),
        ("env", "allow_more_present"),
        ("labels", "allow_more_present"),
        ("ports", "ignore"),
    ])
    .unwrap();
    group.bench_function("override_application", |b| {
        b.iter(|| overrides.apply(black_box(&table)).unwrap())
    });

    group.finish();
}

// ============================================================================
// OBSERVATION BENCHMARKS
// ============================================================================

fn bench_observation(c: &mut Criterion) {
    let mut group = c.benchmark_group("observation");
    let inspect = inspect_fixture();

    group.bench_function("observe_container", |b| {
        b.iter(|| observe_container(black_box(&inspect)).unwrap())
    });

    group.finish();
}

// ============================================================================
// DIFF REPORTING BENCHMARKS
// ============================================================================

fn bench_diff_reporting(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_reporting");

    let width = 50;
    let reconciler = Reconciler::new(generic_table(width));
    let (mut desired, observed) = matching_states(width);
    for i in 0..width {
        desired.set(format!("property_{i}"), -(i as i64));
    }
    let tracker = reconciler.reconcile(&desired, &observed).into_differences();

    group.bench_function("report", |b| b.iter(|| black_box(&tracker).report()));
    group.bench_function("before_after", |b| b.iter(|| black_box(&tracker).before_after()));
    group.bench_function("render_unified", |b| {
        b.iter(|| black_box(&tracker).render_unified())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_value_comparison,
    bench_reconciliation,
    bench_table_construction,
    bench_observation,
    bench_diff_reporting
);
criterion_main!(benches);
