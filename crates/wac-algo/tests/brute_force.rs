//! Compares solver optima with exhaustive enumeration on small arrays.
//!
//! Every turbine picks one destination; assignments with a cycle or a
//! crossing are discarded. Flows follow from the tree shape, and each link
//! then takes the cheapest cable in an allowed subset of cable types that
//! can carry its flow.
#![cfg(feature = "solver-microlp")]

use wac_algo::{CandidateGraph, GoodLpSolver, LayoutFormulator, ModelParameters, SolverConfig};
use wac_core::{CableType, Link, Unit};

const TOLERANCE: f64 = 1e-6;

/// Minimum layout cost by enumeration, or `None` when nothing is feasible.
fn brute_force(units: &[Unit], cables: &[CableType], parameters: &ModelParameters) -> Option<f64> {
    let turbines: Vec<usize> = (0..units.len()).filter(|&i| units[i].is_turbine()).collect();
    let choices: Vec<Vec<usize>> = turbines
        .iter()
        .map(|&t| (0..units.len()).filter(|&d| d != t).collect())
        .collect();

    let subsets: Vec<Vec<&CableType>> = (1u32..(1 << cables.len()))
        .filter(|mask| mask.count_ones() as usize <= parameters.max_number_of_cable_types)
        .map(|mask| {
            cables
                .iter()
                .enumerate()
                .filter(|(k, _)| mask & (1 << k) != 0)
                .map(|(_, c)| c)
                .collect()
        })
        .collect();

    let mut best: Option<f64> = None;
    let mut pick = vec![0usize; turbines.len()];
    loop {
        let next: Vec<Option<usize>> = {
            let mut next = vec![None; units.len()];
            for (i, &t) in turbines.iter().enumerate() {
                next[t] = Some(choices[i][pick[i]]);
            }
            next
        };
        if let Some(cost) = evaluate(units, &turbines, &next, &subsets, parameters) {
            best = Some(best.map_or(cost, |b: f64| b.min(cost)));
        }

        // odometer over the destination choices
        let mut i = 0;
        while i < pick.len() {
            pick[i] += 1;
            if pick[i] < choices[i].len() {
                break;
            }
            pick[i] = 0;
            i += 1;
        }
        if i == pick.len() {
            break;
        }
    }
    best
}

fn evaluate(
    units: &[Unit],
    turbines: &[usize],
    next: &[Option<usize>],
    subsets: &[Vec<&CableType>],
    parameters: &ModelParameters,
) -> Option<f64> {
    // walk each turbine downstream, accumulating its output on every hop
    let mut flow = vec![0.0; units.len()];
    for &t in turbines {
        let mut at = t;
        let mut hops = 0;
        while let Some(to) = next[at] {
            flow[at] += parameters.production_per_turbine_mw;
            at = to;
            hops += 1;
            if hops > units.len() {
                return None;
            }
        }
    }

    let links: Vec<(Link, f64)> = turbines
        .iter()
        .map(|&t| {
            let to = next[t].unwrap();
            (Link::new(units[t].clone(), units[to].clone()).unwrap(), flow[t])
        })
        .collect();
    for (i, (a, _)) in links.iter().enumerate() {
        if links[i + 1..].iter().any(|(b, _)| a.crosses(b)) {
            return None;
        }
    }

    subsets
        .iter()
        .filter_map(|subset| {
            links.iter().try_fold(0.0, |total, (link, carried)| {
                subset
                    .iter()
                    .filter(|c| c.max_mw_on_cable() + TOLERANCE >= *carried)
                    .map(|c| c.cost_per_km())
                    .min_by(|a, b| a.total_cmp(b))
                    .map(|price| total + price * link.distance_km())
            })
        })
        .min_by(|a, b| a.total_cmp(b))
}

fn assert_matches_brute_force(units: Vec<Unit>, cables: Vec<CableType>, parameters: ModelParameters) {
    let expected = brute_force(&units, &cables, &parameters);

    let graph = CandidateGraph::build(&units, &cables).unwrap();
    let mut formulator = LayoutFormulator::new(
        &graph,
        parameters.clone(),
        GoodLpSolver::new(SolverConfig::default()),
    )
    .unwrap();
    let outcome = formulator.solve().unwrap();

    match (expected, outcome.layout()) {
        (Some(cost), Some(layout)) => {
            assert!(
                (layout.total_cost() - cost).abs() < TOLERANCE * cost.max(1.0),
                "solver {} vs enumeration {}",
                layout.total_cost(),
                cost
            );
            let diag = layout.verify(
                &units,
                parameters.production_per_turbine_mw,
                parameters.max_number_of_cable_types,
            );
            assert!(!diag.has_errors(), "{diag}");
        }
        (None, None) => {}
        (expected, _) => panic!("enumeration found {expected:?}, solver returned {outcome}"),
    }
}

#[test]
fn string_of_turbines() {
    assert_matches_brute_force(
        vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 1000.0, 0.0),
            Unit::new("WTG_3", 2000.0, 500.0),
            Unit::new("OSS_1", 3000.0, 0.0),
        ],
        vec![
            CableType::new("small", 8.0, 100.0).unwrap(),
            CableType::new("large", 24.0, 250.0).unwrap(),
        ],
        ModelParameters::new(8.0, 2),
    );
}

#[test]
fn single_cable_type_budget() {
    assert_matches_brute_force(
        vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 1000.0, 0.0),
            Unit::new("WTG_3", 2000.0, 500.0),
            Unit::new("OSS_1", 3000.0, 0.0),
        ],
        vec![
            CableType::new("small", 8.0, 100.0).unwrap(),
            CableType::new("medium", 16.0, 160.0).unwrap(),
            CableType::new("large", 24.0, 250.0).unwrap(),
        ],
        ModelParameters::new(8.0, 1),
    );
}

#[test]
fn star_around_substation() {
    assert_matches_brute_force(
        vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 800.0, 600.0),
            Unit::new("WTG_3", 1600.0, 0.0),
            Unit::new("WTG_4", 800.0, -700.0),
            Unit::new("OSS_1", 800.0, 0.0),
        ],
        vec![
            CableType::new("a", 8.0, 100.0).unwrap(),
            CableType::new("b", 16.0, 150.0).unwrap(),
        ],
        ModelParameters::new(8.0, 1),
    );
}

#[test]
fn two_substations_with_crossing_shortcuts() {
    assert_matches_brute_force(
        vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 0.0, 1000.0),
            Unit::new("WTG_3", 500.0, 1500.0),
            Unit::new("OSS_1", 1000.0, 1000.0),
            Unit::new("OSS_2", 1000.0, 0.0),
        ],
        vec![
            CableType::new("a", 8.0, 120.0).unwrap(),
            CableType::new("b", 16.0, 180.0).unwrap(),
            CableType::new("c", 24.0, 260.0).unwrap(),
        ],
        ModelParameters::new(8.0, 2),
    );
}

#[test]
fn capacity_makes_it_infeasible() {
    assert_matches_brute_force(
        vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 1000.0, 0.0),
            Unit::new("OSS_1", 2000.0, 0.0),
        ],
        vec![CableType::new("thin", 6.0, 100.0).unwrap()],
        ModelParameters::new(8.0, 1),
    );
}
