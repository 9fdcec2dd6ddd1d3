//! The solved cable layout and its structural checks.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::diagnostics::Diagnostics;
use crate::{CableType, Connection, Unit, WacResult};

/// Slack allowed when comparing accumulated flow against a cable rating.
const CAPACITY_TOLERANCE_MW: f64 = 1e-6;

/// The set of connections chosen to be built.
///
/// A layout is produced whole by a successful solve and never edited
/// afterwards; an infeasible or timed-out run yields no layout at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    connections: Vec<Connection>,
}

/// One exported line of a layout: what to build, where, with which cable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRow {
    pub origin: String,
    pub destination: String,
    pub cable_type: String,
    pub origin_x: f64,
    pub origin_y: f64,
    pub destination_x: f64,
    pub destination_y: f64,
    pub cost: f64,
}

impl Layout {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Connection> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Sum of per-connection installation costs.
    pub fn total_cost(&self) -> f64 {
        self.connections.iter().map(Connection::cost).sum()
    }

    pub fn total_length_km(&self) -> f64 {
        self.connections.iter().map(|c| c.link().distance_km()).sum()
    }

    /// Distinct cable types in use, in first-use order.
    pub fn cable_types_used(&self) -> Vec<&CableType> {
        let mut seen = HashSet::new();
        self.connections
            .iter()
            .map(Connection::cable_type)
            .filter(|k| seen.insert(*k))
            .collect()
    }

    /// Connections leaving `unit`.
    pub fn outgoing_from<'a>(&'a self, unit: &'a Unit) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| c.link().origin() == unit)
    }

    pub fn rows(&self) -> Vec<LayoutRow> {
        self.connections
            .iter()
            .map(|c| {
                let origin = c.link().origin();
                let destination = c.link().destination();
                LayoutRow {
                    origin: origin.name().to_string(),
                    destination: destination.name().to_string(),
                    cable_type: c.cable_type().name().to_string(),
                    origin_x: origin.x(),
                    origin_y: origin.y(),
                    destination_x: destination.x(),
                    destination_y: destination.y(),
                    cost: c.cost(),
                }
            })
            .collect()
    }

    pub fn to_json(&self) -> WacResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Re-check a layout against the physical rules of the array.
    ///
    /// Reports, without stopping at the first failure:
    /// - `role`: a cable leaving a collector, or touching an unknown unit
    /// - `radial`: a turbine without exactly one outgoing cable, or a cycle
    /// - `crossing`: two cables that cross
    /// - `budget`: more distinct cable types than `max_cable_types`
    /// - `capacity`: accumulated turbine output above a cable's rating
    ///
    /// Flows are only accumulated when the topology is radial and acyclic.
    pub fn verify(
        &self,
        units: &[Unit],
        production_per_turbine: f64,
        max_cable_types: usize,
    ) -> Diagnostics {
        let mut diag = Diagnostics::new();
        let by_name: HashMap<&str, &Unit> = units.iter().map(|u| (u.name(), u)).collect();

        for connection in &self.connections {
            let link = connection.link();
            for end in [link.origin(), link.destination()] {
                if !by_name.contains_key(end.name()) {
                    diag.add_error_with_entity("role", "Cable touches an unknown unit", end.name());
                }
            }
            if !link.origin().is_turbine() {
                diag.add_error_with_entity(
                    "role",
                    "Collector units cannot originate a cable",
                    link.to_string(),
                );
            }
        }

        let mut seen_links = HashSet::new();
        for connection in &self.connections {
            if !seen_links.insert(connection.link()) {
                diag.add_error_with_entity(
                    "radial",
                    "Link is built with more than one cable type",
                    connection.link().to_string(),
                );
            }
        }

        let mut radial = true;
        for unit in units.iter().filter(|u| u.is_turbine()) {
            let outgoing = self.outgoing_from(unit).count();
            if outgoing != 1 {
                radial = false;
                diag.add_error_with_entity(
                    "radial",
                    format!("Turbine has {} outgoing cables, expected exactly 1", outgoing),
                    unit.name(),
                );
            }
        }

        for (i, a) in self.connections.iter().enumerate() {
            for b in &self.connections[i + 1..] {
                if a.link().crosses(b.link()) {
                    diag.add_error_with_entity(
                        "crossing",
                        format!("Cable crosses {}", b.link()),
                        a.link().to_string(),
                    );
                }
            }
        }

        let used = self.cable_types_used();
        if used.len() > max_cable_types {
            diag.add_error(
                "budget",
                format!(
                    "{} cable types in use, at most {} allowed",
                    used.len(),
                    max_cable_types
                ),
            );
        }

        if radial && !diag.has_errors() {
            self.check_capacity(production_per_turbine, &mut diag);
        }

        diag
    }

    fn check_capacity(&self, production_per_turbine: f64, diag: &mut Diagnostics) {
        let mut graph: DiGraphMap<&str, usize> = DiGraphMap::new();
        for (index, connection) in self.connections.iter().enumerate() {
            let link = connection.link();
            graph.add_edge(link.origin().name(), link.destination().name(), index);
        }

        let order = match toposort(&graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                diag.add_error_with_entity(
                    "radial",
                    "Cables form a cycle and never reach a collector",
                    cycle.node_id(),
                );
                return;
            }
        };

        let mut inflow: HashMap<&str, f64> = HashMap::new();
        for node in order {
            let exported = production_per_turbine + inflow.get(node).copied().unwrap_or(0.0);
            let outgoing: Vec<(&str, usize)> = graph.edges(node).map(|(_, to, &i)| (to, i)).collect();
            for (to, index) in outgoing {
                let connection = &self.connections[index];
                let rating = connection.cable_type().max_mw_on_cable();
                if exported > rating + CAPACITY_TOLERANCE_MW {
                    diag.add_error_with_entity(
                        "capacity",
                        format!(
                            "Carries {:.3} MW on a {:.3} MW cable ({})",
                            exported,
                            rating,
                            connection.cable_type()
                        ),
                        connection.link().to_string(),
                    );
                }
                *inflow.entry(to).or_insert(0.0) += exported;
            }
        }
    }
}

impl<'a> IntoIterator for &'a Layout {
    type Item = &'a Connection;
    type IntoIter = std::slice::Iter<'a, Connection>;

    fn into_iter(self) -> Self::IntoIter {
        self.connections.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CableType, Link};

    fn units() -> Vec<Unit> {
        vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 1000.0, 0.0),
            Unit::new("OSS_1", 2000.0, 0.0),
            Unit::new("WTG_3", 1000.0, 1000.0),
        ]
    }

    fn connect(units: &[Unit], from: usize, to: usize, cable: &CableType) -> Connection {
        Connection::new(
            Link::new(units[from].clone(), units[to].clone()).unwrap(),
            cable.clone(),
        )
    }

    #[test]
    fn test_rows_and_costs() {
        let u = units();
        let small = CableType::new("small", 10.0, 100.0).unwrap();
        let layout = Layout::new(vec![connect(&u, 0, 1, &small), connect(&u, 1, 2, &small)]);

        assert_eq!(layout.len(), 2);
        assert!((layout.total_cost() - 200.0).abs() < 1e-9);
        assert!((layout.total_length_km() - 2.0).abs() < 1e-9);

        let rows = layout.rows();
        assert_eq!(rows[0].origin, "WTG_1");
        assert_eq!(rows[0].destination, "WTG_2");
        assert_eq!(rows[1].cable_type, "small");
        assert_eq!(rows[1].destination_x, 2000.0);
        assert!(Layout::default().rows().is_empty());
    }

    #[test]
    fn test_verify_accepts_radial_layout() {
        let u = units();
        let small = CableType::new("small", 8.0, 100.0).unwrap();
        let big = CableType::new("big", 24.0, 300.0).unwrap();
        let layout = Layout::new(vec![
            connect(&u, 0, 1, &small),
            connect(&u, 3, 1, &small),
            connect(&u, 1, 2, &big),
        ]);

        let diag = layout.verify(&u, 8.0, 2);
        assert!(!diag.has_errors(), "{}", diag);
    }

    #[test]
    fn test_verify_flags_overload_and_budget() {
        let u = units();
        let small = CableType::new("small", 8.0, 100.0).unwrap();
        let layout = Layout::new(vec![
            connect(&u, 0, 1, &small),
            connect(&u, 3, 1, &small),
            connect(&u, 1, 2, &small),
        ]);

        let diag = layout.verify(&u, 8.0, 1);
        assert_eq!(diag.in_category("capacity").count(), 1);

        let big = CableType::new("big", 24.0, 300.0).unwrap();
        let mixed = Layout::new(vec![
            connect(&u, 0, 1, &small),
            connect(&u, 3, 1, &small),
            connect(&u, 1, 2, &big),
        ]);
        assert_eq!(mixed.verify(&u, 8.0, 1).in_category("budget").count(), 1);
    }

    #[test]
    fn test_budget_counts_types_by_value() {
        let u = units();
        let light = CableType::new("export", 8.0, 100.0).unwrap();
        let heavy = CableType::new("export", 24.0, 300.0).unwrap();
        let layout = Layout::new(vec![
            connect(&u, 0, 1, &light),
            connect(&u, 3, 1, &light),
            connect(&u, 1, 2, &heavy),
        ]);

        assert_eq!(layout.cable_types_used(), vec![&light, &heavy]);
        let diag = layout.verify(&u, 8.0, 1);
        assert_eq!(diag.in_category("budget").count(), 1);
        assert!(!layout.verify(&u, 8.0, 2).has_errors());
    }

    #[test]
    fn test_verify_flags_missing_and_cyclic_cables() {
        let u = units();
        let cable = CableType::new("c", 100.0, 1.0).unwrap();

        let missing = Layout::new(vec![connect(&u, 0, 2, &cable)]);
        assert_eq!(missing.verify(&u, 8.0, 3).in_category("radial").count(), 2);

        let cyclic = Layout::new(vec![
            connect(&u, 0, 1, &cable),
            connect(&u, 1, 0, &cable),
            connect(&u, 3, 2, &cable),
        ]);
        let diag = cyclic.verify(&u, 8.0, 3);
        assert_eq!(diag.in_category("radial").count(), 1);
    }

    #[test]
    fn test_verify_flags_crossing() {
        let u = vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("OSS_1", 1.0, 1.0),
            Unit::new("WTG_2", 0.0, 1.0),
            Unit::new("OSS_2", 1.0, 0.0),
        ];
        let cable = CableType::new("c", 100.0, 1.0).unwrap();
        let layout = Layout::new(vec![connect(&u, 0, 1, &cable), connect(&u, 2, 3, &cable)]);
        assert_eq!(layout.verify(&u, 8.0, 3).in_category("crossing").count(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let u = units();
        let cable = CableType::new("c", 100.0, 1.0).unwrap();
        let layout = Layout::new(vec![connect(&u, 0, 2, &cable)]);
        let text = layout.to_json().unwrap();
        let parsed: Layout = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, layout);
    }
}
