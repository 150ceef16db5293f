//! Architecture model: components, connectivity, and versioned snapshots.

use std::collections::BTreeMap;

use chipforge_state::ContentDigest;
use serde::{Deserialize, Serialize};

use super::error::DesignError;

/// Functional class of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Processor,
    Memory,
    Interconnect,
    Accelerator,
    Io,
}

impl ComponentKind {
    /// Components that contribute to throughput.
    pub fn is_compute(self) -> bool {
        matches!(self, Self::Processor | Self::Accelerator)
    }

    /// Components whose duplication earns a redundancy bonus.
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Processor | Self::Memory)
    }

    /// Reference cost model used when a component does not declare its own.
    pub fn default_cost(self) -> ResourceCost {
        match self {
            Self::Processor => ResourceCost::new(0.2, 0.5, 5.0, 8.0),
            Self::Memory => ResourceCost::new(0.1, 0.2, 4.0, 6.0),
            Self::Interconnect => ResourceCost::new(0.05, 0.1, 1.0, 0.5),
            Self::Accelerator => ResourceCost::new(0.3, 0.8, 6.0, 10.0),
            Self::Io => ResourceCost::new(0.05, 0.05, 2.0, 1.0),
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Processor => 0,
            Self::Memory => 1,
            Self::Interconnect => 2,
            Self::Accelerator => 3,
            Self::Io => 4,
        }
    }
}

/// Implementation variant of a component, trading dynamic power for headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerVariant {
    Performance,
    Balanced,
    LowPower,
}

impl PowerVariant {
    /// Multiplier applied to dynamic power.
    pub fn power_factor(self) -> f64 {
        match self {
            Self::Performance => 1.0,
            Self::Balanced => 0.85,
            Self::LowPower => 0.7,
        }
    }

    /// Next variant down the power ladder, if any.
    pub fn lower(self) -> Option<Self> {
        match self {
            Self::Performance => Some(Self::Balanced),
            Self::Balanced => Some(Self::LowPower),
            Self::LowPower => None,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Performance => 0,
            Self::Balanced => 1,
            Self::LowPower => 2,
        }
    }
}

/// Power and area cost model of one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    /// Leakage power in W, paid regardless of activity.
    pub static_power_w: f64,
    /// Dynamic power in W per core per GHz at full utilization.
    pub dynamic_power_w: f64,
    /// Fixed area in mm².
    pub base_area_mm2: f64,
    /// Area per core in mm².
    pub core_area_mm2: f64,
}

impl ResourceCost {
    pub const fn new(
        static_power_w: f64,
        dynamic_power_w: f64,
        base_area_mm2: f64,
        core_area_mm2: f64,
    ) -> Self {
        Self {
            static_power_w,
            dynamic_power_w,
            base_area_mm2,
            core_area_mm2,
        }
    }
}

/// One component of a candidate architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Unique name within a snapshot.
    pub name: String,
    pub kind: ComponentKind,
    pub cores: u32,
    pub frequency_ghz: f64,
    /// Declared utilization in [0, 1].
    pub utilization: f64,
    pub variant: PowerVariant,
    pub cost: ResourceCost,
    /// Additional named parameters carried with the component.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl Component {
    /// Create a component with the kind's reference cost, balanced variant
    /// and 0.6 utilization.
    pub fn new(name: impl Into<String>, kind: ComponentKind, cores: u32, frequency_ghz: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            cores,
            frequency_ghz,
            utilization: 0.6,
            variant: PowerVariant::Balanced,
            cost: kind.default_cost(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_utilization(mut self, utilization: f64) -> Self {
        self.utilization = utilization;
        self
    }

    pub fn with_variant(mut self, variant: PowerVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_cost(mut self, cost: ResourceCost) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Power at declared utilization.
    pub fn estimated_power_w(&self) -> f64 {
        self.cost.static_power_w
            + f64::from(self.cores)
                * self.frequency_ghz
                * self.cost.dynamic_power_w
                * self.utilization
                * self.variant.power_factor()
    }

    pub fn estimated_area_mm2(&self) -> f64 {
        self.cost.base_area_mm2 + f64::from(self.cores) * self.cost.core_area_mm2
    }

    /// Sustained throughput in GOPS; zero for non-compute components.
    pub fn throughput_gops(&self) -> f64 {
        if self.kind.is_compute() {
            f64::from(self.cores) * self.frequency_ghz * self.utilization
        } else {
            0.0
        }
    }
}

/// Weighted edge between two components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    /// Bandwidth/latency cost drawn from the fabric capacity.
    pub cost: f64,
}

/// Connectivity graph of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityGraph {
    pub links: Vec<Link>,
    /// Theoretical capacity of the fabric, in link-cost units.
    pub capacity: f64,
}

impl ConnectivityGraph {
    pub fn new(capacity: f64) -> Self {
        Self {
            links: Vec::new(),
            capacity,
        }
    }

    pub fn with_link(mut self, source: impl Into<String>, target: impl Into<String>, cost: f64) -> Self {
        self.links.push(Link {
            source: source.into(),
            target: target.into(),
            cost,
        });
        self
    }

    pub fn total_cost(&self) -> f64 {
        self.links.iter().map(|l| l.cost).sum()
    }
}

/// Content identity of a snapshot (SHA-256 over its canonical encoding).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(ContentDigest);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn short(&self) -> &str {
        self.0.short()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable, versioned candidate architecture.
///
/// Fields are private: a snapshot can only be built through
/// [`ArchitectureSnapshot::new`] or [`ArchitectureSnapshot::derive`], which
/// compute its identity, so the id always matches the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRepr", into = "SnapshotRepr")]
pub struct ArchitectureSnapshot {
    id: SnapshotId,
    revision: u32,
    components: Vec<Component>,
    graph: ConnectivityGraph,
}

impl ArchitectureSnapshot {
    pub fn new(revision: u32, components: Vec<Component>, graph: ConnectivityGraph) -> Self {
        let id = SnapshotId(identity_digest(revision, &components, &graph));
        Self {
            id,
            revision,
            components,
            graph,
        }
    }

    /// Build the next revision from new contents. `self` is left untouched.
    pub fn derive(&self, components: Vec<Component>, graph: ConnectivityGraph) -> Self {
        Self::new(self.revision + 1, components, graph)
    }

    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Sum of per-component power models at declared utilization.
    pub fn estimated_power_w(&self) -> f64 {
        self.components.iter().map(Component::estimated_power_w).sum()
    }

    pub fn estimated_area_mm2(&self) -> f64 {
        self.components.iter().map(Component::estimated_area_mm2).sum()
    }

    /// Raw sustained throughput of all compute components.
    pub fn throughput_gops(&self) -> f64 {
        self.components.iter().map(Component::throughput_gops).sum()
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotRepr {
    #[serde(default)]
    id: Option<SnapshotId>,
    revision: u32,
    components: Vec<Component>,
    graph: ConnectivityGraph,
}

impl TryFrom<SnapshotRepr> for ArchitectureSnapshot {
    type Error = DesignError;

    fn try_from(repr: SnapshotRepr) -> Result<Self, Self::Error> {
        let snapshot = Self::new(repr.revision, repr.components, repr.graph);
        match repr.id {
            Some(claimed) if claimed != snapshot.id => Err(DesignError::DigestMismatch {
                expected: claimed.to_string(),
                actual: snapshot.id.to_string(),
            }),
            _ => Ok(snapshot),
        }
    }
}

impl From<ArchitectureSnapshot> for SnapshotRepr {
    fn from(s: ArchitectureSnapshot) -> Self {
        Self {
            id: Some(s.id),
            revision: s.revision,
            components: s.components,
            graph: s.graph,
        }
    }
}

/// Length-prefixed, bit-exact encoding of the snapshot contents.
fn identity_digest(revision: u32, components: &[Component], graph: &ConnectivityGraph) -> ContentDigest {
    fn put_str(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
    }
    fn put_f64(buf: &mut Vec<u8>, v: f64) {
        buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    let mut buf = Vec::with_capacity(128 * (components.len() + 1));
    buf.extend_from_slice(&revision.to_le_bytes());

    buf.extend_from_slice(&(components.len() as u64).to_le_bytes());
    for c in components {
        put_str(&mut buf, &c.name);
        buf.push(c.kind.tag());
        buf.extend_from_slice(&c.cores.to_le_bytes());
        put_f64(&mut buf, c.frequency_ghz);
        put_f64(&mut buf, c.utilization);
        buf.push(c.variant.tag());
        put_f64(&mut buf, c.cost.static_power_w);
        put_f64(&mut buf, c.cost.dynamic_power_w);
        put_f64(&mut buf, c.cost.base_area_mm2);
        put_f64(&mut buf, c.cost.core_area_mm2);
        buf.extend_from_slice(&(c.params.len() as u64).to_le_bytes());
        for (k, v) in &c.params {
            put_str(&mut buf, k);
            put_f64(&mut buf, *v);
        }
    }

    buf.extend_from_slice(&(graph.links.len() as u64).to_le_bytes());
    for l in &graph.links {
        put_str(&mut buf, &l.source);
        put_str(&mut buf, &l.target);
        put_f64(&mut buf, l.cost);
    }
    put_f64(&mut buf, graph.capacity);

    ContentDigest::from_bytes(&buf)
}
