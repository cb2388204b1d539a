//! Prometheus text exposition of the aggregated fleet view.
//!
//! Renders a `FleetSnapshot` for scraping, so the aggregated fleet can be
//! fed back into a Prometheus server without querying each instance.

use std::fmt::Write;

use fleetwatch_state::{FleetSnapshot, InstanceRecord, InstanceStatus};

/// Render a fleet snapshot into Prometheus text format.
///
/// Per-instance gauges carry `instance` and `variant` labels; fleet and
/// scheduler aggregates are unlabelled.
pub fn render_prometheus(snapshot: &FleetSnapshot) -> String {
    let mut out = String::new();

    let per_instance: [(&str, &str, fn(&InstanceRecord) -> String); 7] = [
        ("fleetwatch_instance_up", "Whether the last health probe succeeded.", |i| {
            u8::from(i.status == InstanceStatus::Healthy).to_string()
        }),
        ("fleetwatch_instance_gpu_memory_used_gb", "GPU memory in use (GiB).", |i| {
            format!("{:.3}", i.gpu_memory_used_gb)
        }),
        ("fleetwatch_instance_gpu_memory_total_gb", "GPU memory capacity (GiB).", |i| {
            format!("{:.3}", i.gpu_memory_total_gb)
        }),
        ("fleetwatch_instance_queue_length", "Requests waiting in the queue.", |i| {
            i.queue_length.to_string()
        }),
        ("fleetwatch_instance_active_requests", "Requests currently running.", |i| {
            i.active_requests.to_string()
        }),
        ("fleetwatch_instance_cache_hit_rate", "Prefix cache hit rate (0.0-1.0).", |i| {
            format!("{:.4}", i.cache_hit_rate)
        }),
        ("fleetwatch_instance_tokens_per_second", "Average generated tokens per second.", |i| {
            format!("{:.2}", i.tokens_per_second)
        }),
    ];

    for (name, help, value) in per_instance {
        header(&mut out, name, help);
        for inst in &snapshot.instances {
            let _ = writeln!(
                out,
                "{name}{{instance=\"{}\",variant=\"{}\"}} {}",
                escape(&inst.name),
                inst.variant.as_str(),
                value(inst)
            );
        }
    }

    let s = &snapshot.summary;
    gauge(&mut out, "fleetwatch_instances", "Known instances.", s.total_instances);
    gauge(
        &mut out,
        "fleetwatch_healthy_instances",
        "Instances passing health probes.",
        s.healthy_instances,
    );
    gauge(
        &mut out,
        "fleetwatch_active_requests",
        "Running requests across the fleet.",
        s.total_active_requests,
    );
    gauge(
        &mut out,
        "fleetwatch_avg_cache_hit_rate",
        "Mean prefix cache hit rate across the fleet.",
        format!("{:.4}", s.avg_cache_hit_rate),
    );
    gauge(
        &mut out,
        "fleetwatch_tokens_per_second",
        "Generated tokens per second across the fleet.",
        format!("{:.2}", s.total_tokens_per_second),
    );

    let sched = &snapshot.scheduler_metrics;
    gauge(
        &mut out,
        "fleetwatch_scheduler_routing_decisions",
        "Routing decisions reported by the scheduler.",
        sched.routing_decisions,
    );
    gauge(
        &mut out,
        "fleetwatch_scheduler_cache_aware_routes",
        "Cache-aware routes reported by the scheduler.",
        sched.cache_aware_routes,
    );
    gauge(
        &mut out,
        "fleetwatch_scheduler_load_balanced_routes",
        "Load-balanced routes reported by the scheduler.",
        sched.load_balanced_routes,
    );
    gauge(
        &mut out,
        "fleetwatch_scheduler_failed_routes",
        "Failed routes reported by the scheduler.",
        sched.failed_routes,
    );
    gauge(
        &mut out,
        "fleetwatch_scheduler_avg_routing_time_ms",
        "Average routing time in milliseconds.",
        format!("{:.3}", sched.avg_routing_time_ms),
    );

    out
}

fn header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    header(out, name, help);
    let _ = writeln!(out, "{name} {value}");
}

/// Escape a label value per the exposition format.
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
