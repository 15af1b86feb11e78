//! Marl Quickstart — a complete, minimal value runtime from scratch.
//!
//! Demonstrates:
//!   1. Registering valuers (constants, lambdas, a stateful quantity)
//!   2. Region dispatch through an Umbrella mapper
//!   3. Declaring the dependency graph with the family builder
//!   4. Solving the loop schedule and printing it
//!   5. Driving the store through the schedule across time steps
//!
//! Run with:
//!   cargo run --example quickstart

use marl::graph::builder::GraphBuilder;
use marl::graph::{compute_loops, compute_partitions, dot};
use marl::prelude::*;

use std::collections::BTreeSet;

// ─── Mesh parameters ────────────────────────────────────────────

const ELEMENTS: u32 = 8;
const QPS: u32 = 2;
const STEPS: u32 = 3;

// ─── A stateful quantity: explicit forward update ───────────────
//
// Each step's temperature derives from the previous step's value at
// the same location; the store's history machinery carries the state
// across shifts.

struct Temperature;

impl Valuer<f64> for Temperature {
    fn value(&self, store: &ValueStore, loc: &Location) -> Result<f64, StoreError> {
        let id = store.id("temperature")?;
        let old = store.get_old::<f64>(id, loc)?;
        Ok(old + 0.25)
    }

    fn initial_old(&self, loc: &Location) -> f64 {
        300.0 + f64::from(loc.element())
    }
}

fn locations() -> Vec<Location> {
    let mut locs = Vec::new();
    for element in 0..ELEMENTS {
        let region = if element < ELEMENTS / 2 { 1 } else { 2 };
        for qp in 0..QPS {
            locs.push(Location::new(element, qp, QPS).with_region(region));
        }
    }
    locs
}

fn main() {
    // 1. The store: conductivity differs per region, flux combines it
    //    with the stateful temperature.
    let mut store = ValueStore::with_config(StoreConfig { errcheck: true });
    store.add("temperature", Temperature).unwrap();
    store.add("k_steel", ConstValuer::new(45.0)).unwrap();
    store.add("k_copper", ConstValuer::new(400.0)).unwrap();
    Umbrella::register(
        &mut store,
        "conductivity",
        vec![
            ("k_steel".into(), BTreeSet::from([1])),
            ("k_copper".into(), BTreeSet::from([2])),
        ],
    )
    .unwrap();
    store
        .add(
            "flux",
            LambdaValuer::new(|store: &ValueStore, loc: &Location| {
                let k = store.get_named::<f64>("conductivity", loc)?;
                let t = store.get_named::<f64>("temperature", loc)?;
                Ok(k * (t - 300.0))
            }),
        )
        .unwrap();

    // 2. The dependency graph, declared family-wise over both regions.
    let mut b = GraphBuilder::new();
    let elemental = [LoopCategory::ElementalOnElement];
    let regions = [1u32, 2];
    b.family("temperature", false, false, &regions, &elemental)
        .unwrap();
    b.family("conductivity", false, false, &regions, &elemental)
        .unwrap();
    b.family("flux", false, false, &regions, &elemental).unwrap();
    b.family("total_flux", true, true, &regions, &elemental)
        .unwrap();
    b.bind("flux", "conductivity").unwrap();
    b.bind("flux", "temperature").unwrap();
    b.bind("total_flux", "flux").unwrap();
    let graph = b.finish();

    // 3. Solve and show the schedule.
    let partitions = compute_partitions(&graph, true);
    let loops = compute_loops(&graph, &partitions);
    println!("schedule ({} loops):", loops.len());
    print!("{}", dot::format_loops(&graph, &loops));

    // 4. Drive it: per loop, visit each location and pull the scheduled
    //    quantities through the store.
    for step in 1..=STEPS {
        let mut total_flux = 0.0;
        for groups in &loops {
            for loc in &locations() {
                for group in groups {
                    for &node in group {
                        match graph.name(node) {
                            "total_flux" => {
                                total_flux +=
                                    store.get_named::<f64>("flux", loc).unwrap();
                            }
                            name => {
                                store.get_named::<f64>(name, loc).unwrap();
                            }
                        }
                    }
                }
            }
        }
        println!("step {step}: total flux = {total_flux:.2}");
        store.shift();
    }

    // 5. The dot text of the merged partitions, for graphviz.
    println!("\n{}", dot::dot_graph_merged(&graph, &partitions));
}
