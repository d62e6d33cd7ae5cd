//! Duelist Example
//!
//! Builds a small energy/heat duelist from embedded RON definitions, runs
//! the priority-driven rotation and prints the log and a summary report.

use cadence_journal::{ExportFormat, Exporter, RotationReport};
use cadence_script::Loader;

const DUELIST: &str = r#"(
    name: "duelist",
    resources: [
        (id: "energy", upper_limit: 100.0, current: 100.0),
        (id: "heat", upper_limit: 100.0),
    ],
    states: [
        (
            id: "frenzy",
            max_stacks: 1,
            expiry: KeepAfterLastTouch(window: 4.0),
            accelerates: [(operation: "strike", ratio: 0.4)],
            meta_priority: [(meta: "vent_meta", delta: 15)],
        ),
    ],
    operations: [
        (
            id: "strike",
            base_time: 1.0,
            costs: [(resource: "energy", amount: 8.0)],
            produces: [(resource: "heat", amount: 20.0)],
            resource_state_rules: [
                (resource: "heat", threshold: 60.0, state: "frenzy"),
            ],
        ),
        (
            id: "vent",
            base_time: 2.0,
            costs: [(resource: "heat", amount: 50.0)],
            produces: [(resource: "energy", amount: 10.0)],
        ),
    ],
    metas: [
        (id: "strike_meta", base_priority: 10, operations: ["strike"]),
        (
            id: "vent_meta",
            kind: Simulated,
            base_priority: 0,
            operations: ["vent", "strike"],
        ),
    ],
    regen_rules: [
        (resource: "energy", rate_per_sec: 1.5, state_forbids: ["frenzy"]),
    ],
)"#;

fn main() {
    println!("=== Cadence Duelist Example ===\n");

    let mut loader = Loader::new();
    loader.load_str(DUELIST).expect("definitions parse");
    let mut duelist = loader.build().expect("definitions build");

    println!(
        "Built '{}' with {} resources and a 2-meta rotation.\n",
        duelist.name,
        duelist.resources.len(),
    );

    let log = duelist
        .build_rotation_from_meta(40)
        .expect("rotation runs");

    let exporter = Exporter::new(&log);
    println!("{}", exporter.export(ExportFormat::Text).expect("text export"));

    println!("{}", RotationReport::from_log(&log));

    println!("Final resources:");
    for resource in duelist.resources.iter() {
        println!(
            "  {}: {:.1}/{:.1} (consumed {:.1} total)",
            resource.id, resource.current, resource.upper_limit, resource.consume_total
        );
    }
}
