//! Candidate graph: every link a cable could follow and every
//! link × cable-type combination that could be built.
//!
//! The topology is a petgraph `DiGraph` whose node `i` is unit `i` and whose
//! edge `i` is link `i`. Connections are laid out link-major, so the
//! connections of link `l` occupy the contiguous id range
//! `l·K .. (l+1)·K` for `K` cable types. All indices, including the crossing
//! pairs, are computed once in [`CandidateGraph::build`]; queries afterwards
//! are pure lookups.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Range;
use tracing::debug;
use wac_core::{CableType, Connection, Link, Unit};

use crate::crossing::CrossingOracle;
use crate::error::{LayoutError, LayoutResult};

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }

            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }
    };
}

index_id!(
    /// Position of a unit in [`CandidateGraph::units`].
    UnitId
);
index_id!(
    /// Position of a link in [`CandidateGraph::links`].
    LinkId
);
index_id!(CableTypeId);
index_id!(ConnectionId);

/// Size summary of a candidate graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub units: usize,
    pub turbines: usize,
    pub collectors: usize,
    pub cable_types: usize,
    pub links: usize,
    pub connections: usize,
    pub crossing_pairs: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} units ({} turbines, {} collectors), {} cable types, {} links, {} connections, {} crossing pairs",
            self.units,
            self.turbines,
            self.collectors,
            self.cable_types,
            self.links,
            self.connections,
            self.crossing_pairs
        )
    }
}

/// Directed candidate graph over a set of units and cable types.
#[derive(Debug, Clone)]
pub struct CandidateGraph {
    units: Vec<Unit>,
    cable_types: Vec<CableType>,
    links: Vec<Link>,
    connections: Vec<Connection>,
    topology: DiGraph<UnitId, LinkId>,
    unit_index: HashMap<String, UnitId>,
    link_index: HashMap<(UnitId, UnitId), LinkId>,
    link_ends: Vec<(UnitId, UnitId)>,
    crossing_pairs: Vec<(LinkId, LinkId)>,
    crossing_neighbours: Vec<Vec<LinkId>>,
}

impl CandidateGraph {
    /// Enumerate links and connections for the given units and cable types.
    ///
    /// Links run from every turbine to every other unit. Repeated cable
    /// types are kept once, in first-seen order.
    ///
    /// # Errors
    ///
    /// `NoUnits`, `NoTurbines` or `NoCableTypes` for empty inputs,
    /// `DuplicateUnit` when two units share a name, and `Entity` when a unit
    /// or cable type fails validation.
    pub fn build(units: &[Unit], cable_types: &[CableType]) -> LayoutResult<Self> {
        if units.is_empty() {
            return Err(LayoutError::NoUnits);
        }
        let mut unit_index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            unit.validate()?;
            if unit_index.insert(unit.name().to_string(), UnitId(i)).is_some() {
                return Err(LayoutError::DuplicateUnit(unit.name().to_string()));
            }
        }
        if !units.iter().any(Unit::is_turbine) {
            return Err(LayoutError::NoTurbines);
        }

        if cable_types.is_empty() {
            return Err(LayoutError::NoCableTypes);
        }
        let mut seen = HashSet::new();
        let mut distinct_types = Vec::with_capacity(cable_types.len());
        for cable in cable_types {
            cable.validate()?;
            if seen.insert(cable) {
                distinct_types.push(cable.clone());
            }
        }

        let mut topology = DiGraph::with_capacity(units.len(), units.len() * units.len());
        for i in 0..units.len() {
            topology.add_node(UnitId(i));
        }

        let mut links = Vec::new();
        let mut link_ends = Vec::new();
        let mut link_index = HashMap::new();
        for (o, origin) in units.iter().enumerate().filter(|(_, u)| u.is_turbine()) {
            for (d, destination) in units.iter().enumerate() {
                if o == d {
                    continue;
                }
                let id = LinkId(links.len());
                links.push(Link::new(origin.clone(), destination.clone())?);
                link_ends.push((UnitId(o), UnitId(d)));
                link_index.insert((UnitId(o), UnitId(d)), id);
                topology.add_edge(NodeIndex::new(o), NodeIndex::new(d), id);
            }
        }

        let connections: Vec<Connection> = links
            .iter()
            .flat_map(|link| {
                distinct_types
                    .iter()
                    .map(move |cable| Connection::new(link.clone(), cable.clone()))
            })
            .collect();

        let crossing_pairs: Vec<(LinkId, LinkId)> = CrossingOracle::crossing_pairs(&links)
            .into_iter()
            .map(|(i, j)| (LinkId(i), LinkId(j)))
            .collect();
        let mut crossing_neighbours = vec![Vec::new(); links.len()];
        for &(a, b) in &crossing_pairs {
            crossing_neighbours[a.0].push(b);
            crossing_neighbours[b.0].push(a);
        }
        for neighbours in &mut crossing_neighbours {
            neighbours.sort_unstable();
        }

        let graph = Self {
            units: units.to_vec(),
            cable_types: distinct_types,
            links,
            connections,
            topology,
            unit_index,
            link_index,
            link_ends,
            crossing_pairs,
            crossing_neighbours,
        };
        debug!(stats = %graph.stats(), "built candidate graph");
        Ok(graph)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn turbines(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| u.is_turbine())
    }

    pub fn turbine_ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_turbine())
            .map(|(i, _)| UnitId(i))
    }

    pub fn cable_types(&self) -> &[CableType] {
        &self.cable_types
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn cable_type(&self, id: CableTypeId) -> &CableType {
        &self.cable_types[id.0]
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.0]
    }

    pub fn unit_id(&self, unit: &Unit) -> Option<UnitId> {
        self.unit_index.get(unit.name()).copied()
    }

    pub fn link_id(&self, link: &Link) -> Option<LinkId> {
        self.link_between(link.origin(), link.destination())
    }

    /// The link `origin → destination`, if it is a candidate.
    pub fn link_between(&self, origin: &Unit, destination: &Unit) -> Option<LinkId> {
        let o = self.unit_id(origin)?;
        let d = self.unit_id(destination)?;
        self.link_index.get(&(o, d)).copied()
    }

    pub fn cable_type_id(&self, cable_type: &CableType) -> Option<CableTypeId> {
        self.cable_types
            .iter()
            .position(|c| c == cable_type)
            .map(CableTypeId)
    }

    /// Origin and destination of a link.
    pub fn link_ends(&self, id: LinkId) -> (UnitId, UnitId) {
        self.link_ends[id.0]
    }

    /// Id of the connection building `link` with `cable_type`.
    pub fn connection_id(&self, link: LinkId, cable_type: CableTypeId) -> ConnectionId {
        ConnectionId(link.0 * self.cable_types.len() + cable_type.0)
    }

    pub fn connection_link(&self, id: ConnectionId) -> LinkId {
        LinkId(id.0 / self.cable_types.len())
    }

    pub fn connection_cable_type(&self, id: ConnectionId) -> CableTypeId {
        CableTypeId(id.0 % self.cable_types.len())
    }

    pub fn connection_ids_for_link(&self, link: LinkId) -> impl Iterator<Item = ConnectionId> {
        self.connection_range(link).map(ConnectionId)
    }

    pub fn connection_ids_with_cable_type(
        &self,
        cable_type: CableTypeId,
    ) -> impl Iterator<Item = ConnectionId> + '_ {
        (0..self.links.len()).map(move |l| self.connection_id(LinkId(l), cable_type))
    }

    /// Links leaving a unit, in id order. Empty for collectors.
    pub fn outgoing_link_ids(&self, unit: UnitId) -> Vec<LinkId> {
        self.adjacent_links(unit, Direction::Outgoing)
    }

    /// Links arriving at a unit, in id order.
    pub fn incoming_link_ids(&self, unit: UnitId) -> Vec<LinkId> {
        self.adjacent_links(unit, Direction::Incoming)
    }

    /// Every unordered crossing pair `(a, b)` with `a < b`.
    pub fn crossing_pairs(&self) -> &[(LinkId, LinkId)] {
        &self.crossing_pairs
    }

    /// Links crossing the given link, in id order.
    pub fn crossing_link_ids(&self, link: LinkId) -> &[LinkId] {
        &self.crossing_neighbours[link.0]
    }

    /// Connections that build `link`, one per cable type. Empty when the
    /// link is not a candidate.
    pub fn connections_for_link(&self, link: &Link) -> Vec<&Connection> {
        match self.link_id(link) {
            Some(id) => self.connections[self.connection_range(id)].iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn incoming_links(&self, unit: &Unit) -> Vec<&Link> {
        self.unit_id(unit)
            .map(|id| self.resolve_links(self.incoming_link_ids(id)))
            .unwrap_or_default()
    }

    pub fn outgoing_links(&self, unit: &Unit) -> Vec<&Link> {
        self.unit_id(unit)
            .map(|id| self.resolve_links(self.outgoing_link_ids(id)))
            .unwrap_or_default()
    }

    pub fn connections_with_cable_type(&self, cable_type: &CableType) -> Vec<&Connection> {
        match self.cable_type_id(cable_type) {
            Some(id) => self
                .connection_ids_with_cable_type(id)
                .map(|c| self.connection(c))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The link(s) directly joining `origin` and `destination`, in either
    /// direction, together with every candidate link crossing them.
    ///
    /// Returns an empty set when no candidate link joins the two units,
    /// e.g. between two collectors.
    pub fn crossing_links(&self, origin: &Unit, destination: &Unit) -> Vec<&Link> {
        let direct: Vec<LinkId> = [
            self.link_between(origin, destination),
            self.link_between(destination, origin),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut result: BTreeSet<LinkId> = direct.iter().copied().collect();
        for &id in &direct {
            result.extend(self.crossing_link_ids(id).iter().copied());
        }
        self.resolve_links(result)
    }

    pub fn stats(&self) -> GraphStats {
        let turbines = self.turbines().count();
        GraphStats {
            units: self.units.len(),
            turbines,
            collectors: self.units.len() - turbines,
            cable_types: self.cable_types.len(),
            links: self.links.len(),
            connections: self.connections.len(),
            crossing_pairs: self.crossing_pairs.len(),
        }
    }

    fn connection_range(&self, link: LinkId) -> Range<usize> {
        let k = self.cable_types.len();
        link.0 * k..(link.0 + 1) * k
    }

    fn adjacent_links(&self, unit: UnitId, direction: Direction) -> Vec<LinkId> {
        let mut ids: Vec<LinkId> = self
            .topology
            .edges_directed(NodeIndex::new(unit.0), direction)
            .map(|edge| *edge.weight())
            .collect();
        ids.sort_unstable();
        ids
    }

    fn resolve_links(&self, ids: impl IntoIterator<Item = LinkId>) -> Vec<&Link> {
        ids.into_iter().map(|id| self.link(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Vec<Unit>, Vec<CableType>) {
        let units = vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 1.0, 1.0),
            Unit::new("OSS_1", 2.0, 0.0),
        ];
        let cables = vec![
            CableType::new("A", 5.0, 10.0).unwrap(),
            CableType::new("B", 8.0, 20.0).unwrap(),
        ];
        (units, cables)
    }

    fn square() -> CandidateGraph {
        let units = vec![
            Unit::new("WTG_1", 0.0, 0.0),
            Unit::new("WTG_2", 0.0, 1.0),
            Unit::new("OSS_1", 1.0, 1.0),
            Unit::new("OSS_2", 1.0, 0.0),
        ];
        CandidateGraph::build(&units, &[CableType::new("A", 8.0, 1.0).unwrap()]).unwrap()
    }

    #[test]
    fn test_triangle_counts() {
        let (units, cables) = triangle();
        let graph = CandidateGraph::build(&units, &cables).unwrap();

        assert_eq!(graph.links().len(), 4);
        assert_eq!(graph.connections().len(), graph.links().len() * cables.len());
        assert!(graph.links().iter().all(|l| l.origin() != l.destination()));
        assert!(graph.links().iter().all(|l| l.origin().is_turbine()));
        assert!(graph.crossing_pairs().is_empty());

        let stats = graph.stats();
        assert_eq!(stats.turbines, 2);
        assert_eq!(stats.collectors, 1);
    }

    #[test]
    fn test_triangle_queries() {
        let (units, cables) = triangle();
        let graph = CandidateGraph::build(&units, &cables).unwrap();
        let w1_w2 = Link::new(units[0].clone(), units[1].clone()).unwrap();

        let for_link = graph.connections_for_link(&w1_w2);
        assert_eq!(for_link.len(), 2);
        assert!(for_link.iter().all(|c| c.link() == &w1_w2));

        assert_eq!(graph.incoming_links(&units[2]).len(), 2);
        assert_eq!(graph.incoming_links(&units[0]).len(), 1);
        assert_eq!(graph.outgoing_links(&units[0]).len(), 2);
        assert!(graph.outgoing_links(&units[2]).is_empty());

        let with_b = graph.connections_with_cable_type(&cables[1]);
        assert_eq!(with_b.len(), 4);
        assert!(with_b.iter().all(|c| c.cable_type() == &cables[1]));

        let unknown = CableType::new("C", 1.0, 1.0).unwrap();
        assert!(graph.connections_with_cable_type(&unknown).is_empty());
    }

    #[test]
    fn test_connection_ids_are_link_major() {
        let (units, cables) = triangle();
        let graph = CandidateGraph::build(&units, &cables).unwrap();

        for (i, connection) in graph.connections().iter().enumerate() {
            let id = ConnectionId::new(i);
            let link = graph.connection_link(id);
            let cable = graph.connection_cable_type(id);
            assert_eq!(graph.link(link), connection.link());
            assert_eq!(graph.cable_type(cable), connection.cable_type());
            assert_eq!(graph.connection_id(link, cable), id);
        }
    }

    #[test]
    fn test_crossing_links() {
        let graph = square();
        let units = graph.units().to_vec();
        let diagonal = Link::new(units[0].clone(), units[2].clone()).unwrap();
        let other = Link::new(units[1].clone(), units[3].clone()).unwrap();

        let found = graph.crossing_links(&units[0], &units[2]);
        assert_eq!(found, vec![&diagonal, &other]);

        // reverse direction resolves to the same direct link
        assert_eq!(graph.crossing_links(&units[2], &units[0]), found);

        // both directions of a turbine-turbine link, nothing crossing them
        let between_turbines = graph.crossing_links(&units[0], &units[1]);
        assert_eq!(between_turbines.len(), 2);

        // no link joins two collectors
        assert!(graph.crossing_links(&units[2], &units[3]).is_empty());
        assert_eq!(graph.crossing_pairs().len(), 1);
    }

    #[test]
    fn test_build_errors() {
        let (units, cables) = triangle();
        assert_eq!(CandidateGraph::build(&[], &cables).unwrap_err(), LayoutError::NoUnits);
        assert_eq!(
            CandidateGraph::build(&units, &[]).unwrap_err(),
            LayoutError::NoCableTypes
        );
        assert_eq!(
            CandidateGraph::build(&[Unit::new("OSS_1", 0.0, 0.0)], &cables).unwrap_err(),
            LayoutError::NoTurbines
        );

        let duplicated = vec![units[0].clone(), Unit::new("WTG_1", 5.0, 5.0)];
        assert_eq!(
            CandidateGraph::build(&duplicated, &cables).unwrap_err(),
            LayoutError::DuplicateUnit("WTG_1".into())
        );

        let bad = vec![Unit::new("WTG_1", f64::NAN, 0.0)];
        assert!(matches!(
            CandidateGraph::build(&bad, &cables),
            Err(LayoutError::Entity(_))
        ));
    }

    #[test]
    fn test_single_turbine_has_no_links() {
        let graph =
            CandidateGraph::build(&[Unit::new("WTG_1", 0.0, 0.0)], &[CableType::new("A", 1.0, 1.0).unwrap()])
                .unwrap();
        assert!(graph.links().is_empty());
        assert!(graph.connections().is_empty());
    }

    #[test]
    fn test_repeated_cable_types_collapse() {
        let (units, cables) = triangle();
        let repeated = vec![cables[0].clone(), cables[1].clone(), cables[0].clone()];
        let graph = CandidateGraph::build(&units, &repeated).unwrap();
        assert_eq!(graph.cable_types(), &cables[..]);
        assert_eq!(graph.connections().len(), 8);
    }
}
