//! # wac-core: Offshore Array Cable Entities
//!
//! Value types for designing the inter-array cable network of an offshore
//! wind farm, plus the geometric and cost primitives the optimization model
//! is built from.
//!
//! ## Entities
//!
//! | Type | Identity | Meaning |
//! |------|----------|---------|
//! | [`Unit`] | name | A turbine or a collector (substation) at a planar position |
//! | [`CableType`] | full value | A cable gauge with MW capacity and price per km |
//! | [`Link`] | origin + destination | A directed candidate cable route |
//! | [`Connection`] | link + cable type | "Build this link with this cable" |
//! | [`Layout`] | - | The chosen set of connections |
//!
//! Units, cable types, links and connections are immutable once constructed.
//! Links and connections are derived from units and cable types by the
//! candidate-graph builder in `wac-algo`; a [`Layout`] only ever comes out of
//! a successful solve.
//!
//! ## Quick Start
//!
//! ```
//! use wac_core::{CableType, Connection, Link, Unit};
//!
//! let wtg = Unit::new("WTG_01", 0.0, 0.0);
//! let oss = Unit::new("OSS_1", 1000.0, 1000.0);
//! assert!(wtg.is_turbine());
//! assert!(!oss.is_turbine());
//!
//! let link = Link::new(wtg, oss)?;
//! let cable = CableType::new("240mm", 40.0, 1000.0)?;
//! let connection = Connection::new(link, cable);
//! assert!((connection.cost() - 1414.213).abs() < 1e-3);
//! # Ok::<(), wac_core::WacError>(())
//! ```

pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{WacError, WacResult};
pub use geometry::{Point, Segment};
pub use layout::{Layout, LayoutRow};

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use units::{Amperes, Kilometers, Kilovolts, Megawatts};

/// Name prefix that marks a unit as a wind turbine generator.
pub const TURBINE_PREFIX: &str = "WTG";

/// Role of a unit in the collection network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    /// Produces power and must export it through exactly one outgoing cable.
    Turbine,
    /// Substation or collector platform; a sink that never originates a cable.
    Collector,
}

impl UnitRole {
    /// Classify a unit by the naming convention (case-sensitive `WTG` prefix).
    pub fn from_name(name: &str) -> Self {
        if name.starts_with(TURBINE_PREFIX) {
            UnitRole::Turbine
        } else {
            UnitRole::Collector
        }
    }
}

/// A geolocated turbine or collector.
///
/// Identity is the name alone: two units with the same name compare equal
/// and hash identically whatever their coordinates. Callers building a
/// candidate graph must therefore supply unique names (the builder rejects
/// duplicates).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "UnitRecord", into = "UnitRecord")]
pub struct Unit {
    name: String,
    position: Point,
    role: UnitRole,
}

/// Wire form of a unit; the role is always re-derived from the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnitRecord {
    name: String,
    x: f64,
    y: f64,
}

impl From<UnitRecord> for Unit {
    fn from(record: UnitRecord) -> Self {
        Unit::new(record.name, record.x, record.y)
    }
}

impl From<Unit> for UnitRecord {
    fn from(unit: Unit) -> Self {
        UnitRecord {
            x: unit.position.x,
            y: unit.position.y,
            name: unit.name,
        }
    }
}

impl Unit {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        let name = name.into();
        let role = UnitRole::from_name(&name);
        Self {
            name,
            position: Point::new(x, y),
            role,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn role(&self) -> UnitRole {
        self.role
    }

    pub fn is_turbine(&self) -> bool {
        self.role == UnitRole::Turbine
    }

    /// Reject NaN or infinite coordinates.
    pub fn validate(&self) -> WacResult<()> {
        if !self.position.is_finite() {
            return Err(WacError::NonFiniteCoordinates {
                name: self.name.clone(),
                x: self.position.x,
                y: self.position.y,
            });
        }
        Ok(())
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Unit {}

impl Hash for Unit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A cable gauge available for the array.
///
/// Equality and hashing use the full `(name, capacity, cost)` tuple; floats
/// are compared by bit pattern so that `Eq` and `Hash` stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CableType {
    name: String,
    max_mw_on_cable: f64,
    cost_per_km: f64,
}

impl CableType {
    /// Create a cable type, rejecting non-finite values, a non-positive
    /// capacity or a negative price.
    pub fn new(name: impl Into<String>, max_mw_on_cable: f64, cost_per_km: f64) -> WacResult<Self> {
        let cable = Self {
            name: name.into(),
            max_mw_on_cable,
            cost_per_km,
        };
        cable.validate()?;
        Ok(cable)
    }

    /// Derive a cable type from its datasheet current rating.
    ///
    /// The three-phase capacity `√3 · I · V` is floored to a whole number of
    /// turbines, since a string of turbines loads the cable in steps of one
    /// turbine's output.
    pub fn from_current_rating(
        name: impl Into<String>,
        rating: Amperes,
        voltage: Kilovolts,
        cost_per_km: f64,
        turbine_output: Megawatts,
    ) -> WacResult<Self> {
        let capacity = Megawatts::three_phase(rating, voltage).floor_to_multiple(turbine_output);
        Self::new(name, capacity.value(), cost_per_km)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_mw_on_cable(&self) -> f64 {
        self.max_mw_on_cable
    }

    pub fn cost_per_km(&self) -> f64 {
        self.cost_per_km
    }

    pub fn validate(&self) -> WacResult<()> {
        let invalid = |reason: &str| WacError::InvalidCableType {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !self.max_mw_on_cable.is_finite() || self.max_mw_on_cable <= 0.0 {
            return Err(invalid("capacity must be a positive, finite MW value"));
        }
        if !self.cost_per_km.is_finite() || self.cost_per_km < 0.0 {
            return Err(invalid("cost per km must be finite and non-negative"));
        }
        Ok(())
    }
}

impl PartialEq for CableType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.max_mw_on_cable.to_bits() == other.max_mw_on_cable.to_bits()
            && self.cost_per_km.to_bits() == other.cost_per_km.to_bits()
    }
}

impl Eq for CableType {}

impl Hash for CableType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.max_mw_on_cable.to_bits().hash(state);
        self.cost_per_km.to_bits().hash(state);
    }
}

impl std::fmt::Display for CableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A directed candidate cable route from `origin` to `destination`.
///
/// Direction matters for equality: `A→B` and `B→A` are different links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    origin: Unit,
    destination: Unit,
}

impl Link {
    pub fn new(origin: Unit, destination: Unit) -> WacResult<Self> {
        if origin == destination {
            return Err(WacError::SelfLink(origin.name));
        }
        Ok(Self {
            origin,
            destination,
        })
    }

    pub fn origin(&self) -> &Unit {
        &self.origin
    }

    pub fn destination(&self) -> &Unit {
        &self.destination
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.origin.position, self.destination.position)
    }

    pub fn length(&self) -> Kilometers {
        self.segment().length().to_kilometers()
    }

    /// Straight-line length in kilometers.
    pub fn distance_km(&self) -> f64 {
        self.length().value()
    }

    /// Whether the two links have any unit in common (either end).
    pub fn shares_endpoint(&self, other: &Link) -> bool {
        self.origin == other.origin
            || self.origin == other.destination
            || self.destination == other.origin
            || self.destination == other.destination
    }

    /// Whether two cables routed along these links would physically cross.
    ///
    /// Links meeting at a common unit are a hub, never a crossing, even if
    /// their segments overlap. Otherwise this is a proper segment
    /// intersection test; touching and collinear cases do not count.
    pub fn crosses(&self, other: &Link) -> bool {
        if self.shares_endpoint(other) {
            return false;
        }
        self.segment().crosses(&other.segment())
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.origin, self.destination)
    }
}

/// A link paired with the cable type it would be built with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    link: Link,
    cable_type: CableType,
}

impl Connection {
    pub fn new(link: Link, cable_type: CableType) -> Self {
        Self { link, cable_type }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn cable_type(&self) -> &CableType {
        &self.cable_type
    }

    /// Installation cost: length in km times the cable's price per km.
    pub fn cost(&self) -> f64 {
        self.link.distance_km() * self.cable_type.cost_per_km
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.link, self.cable_type)
    }
}
