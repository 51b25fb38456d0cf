/// Flow bookkeeping for a cell's component pipeline.
///
/// Every component declares a fixed set of named flows up front; reads and
/// writes of undeclared names are contract errors, not silent no-ops.
/// Amounts are stored in cubic metres and converted on access, like
/// [`crate::storage::Storage`].
///
/// Two flow shapes exist:
/// - a plain [`Flow`] with one amount, optionally linked to a partner flow in
///   another component of the same cell (one write updates both sides)
/// - a [`MultiSourceFlow`] whose amount is the live sum over per-upstream-cell
///   source slots; it can only be written through those slots
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{ModelError, Result};
use crate::topology::CellId;
use crate::units::Unit;

/// The nine components of a cell, in intra-cell solve order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentId {
    Roof,
    Raintank,
    Pavement,
    Pervious,
    Vadose,
    Groundwater,
    Stormwater,
    Reuse,
    Wastewater,
}

impl ComponentId {
    pub const ALL: [ComponentId; 9] = [
        ComponentId::Roof,
        ComponentId::Raintank,
        ComponentId::Pavement,
        ComponentId::Pervious,
        ComponentId::Vadose,
        ComponentId::Groundwater,
        ComponentId::Stormwater,
        ComponentId::Reuse,
        ComponentId::Wastewater,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ComponentId::Roof => "roof",
            ComponentId::Raintank => "raintank",
            ComponentId::Pavement => "pavement",
            ComponentId::Pervious => "pervious",
            ComponentId::Vadose => "vadose",
            ComponentId::Groundwater => "groundwater",
            ComponentId::Stormwater => "stormwater",
            ComponentId::Reuse => "reuse",
            ComponentId::Wastewater => "wastewater",
        }
    }
}

/// Direction of a flow relative to its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDir {
    In,
    Out,
    /// Bookkeeping volume excluded from inflow/outflow totals.
    Internal,
}

/// Address of a flow within a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowAddr {
    pub component: ComponentId,
    pub flow: &'static str,
}

impl FlowAddr {
    pub const fn new(component: ComponentId, flow: &'static str) -> Self {
        Self { component, flow }
    }
}

/// A single named flow holding one amount [m3].
#[derive(Debug, Clone)]
pub struct Flow {
    name: &'static str,
    dir: FlowDir,
    amount: f64,
}

/// A flow whose amount is the sum over per-upstream-cell sources [m3].
#[derive(Debug, Clone)]
pub struct MultiSourceFlow {
    name: &'static str,
    dir: FlowDir,
    sources: SmallVec<[(CellId, f64); 8]>,
}

impl MultiSourceFlow {
    pub fn amount(&self) -> f64 {
        self.sources.iter().map(|&(_, v)| v).sum()
    }

    /// Register a source slot for `cell`, starting at zero.
    /// Adding an already-registered cell keeps its slot.
    pub fn add_source(&mut self, cell: CellId) {
        if !self.sources.iter().any(|&(c, _)| c == cell) {
            self.sources.push((cell, 0.0));
        }
    }

    /// Drop the slot for `cell`. Unknown cells are a no-op.
    pub fn remove_source(&mut self, cell: CellId) {
        self.sources.retain(|&mut (c, _)| c != cell);
    }

    pub fn set_source(&mut self, cell: CellId, amount: f64) -> Result<()> {
        match self.sources.iter_mut().find(|(c, _)| *c == cell) {
            Some(slot) => {
                slot.1 = amount;
                Ok(())
            }
            None => Err(ModelError::UnknownFlow {
                component: "upstream source",
                flow: self.name,
            }),
        }
    }

    pub fn sources(&self) -> &[(CellId, f64)] {
        &self.sources
    }

    fn reset(&mut self) {
        for slot in self.sources.iter_mut() {
            slot.1 = 0.0;
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Simple(Flow),
    Multi(MultiSourceFlow),
}

impl Slot {
    fn name(&self) -> &'static str {
        match self {
            Slot::Simple(f) => f.name,
            Slot::Multi(f) => f.name,
        }
    }

    fn dir(&self) -> FlowDir {
        match self {
            Slot::Simple(f) => f.dir,
            Slot::Multi(f) => f.dir,
        }
    }

    fn amount(&self) -> f64 {
        match self {
            Slot::Simple(f) => f.amount,
            Slot::Multi(f) => f.amount(),
        }
    }
}

/// The declared flows of one component.
#[derive(Debug, Clone)]
pub struct FlowSet {
    component: ComponentId,
    /// Reference area [m2] for depth-unit access.
    area: f64,
    slots: Vec<Slot>,
}

impl FlowSet {
    pub fn new(component: ComponentId, area: f64) -> Self {
        Self {
            component,
            area,
            slots: Vec::new(),
        }
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn declare(&mut self, name: &'static str, dir: FlowDir) -> &mut Self {
        debug_assert!(self.find(name).is_err(), "duplicate flow '{name}'");
        self.slots.push(Slot::Simple(Flow {
            name,
            dir,
            amount: 0.0,
        }));
        self
    }

    pub fn declare_multi(&mut self, name: &'static str, dir: FlowDir) -> &mut Self {
        debug_assert!(self.find(name).is_err(), "duplicate flow '{name}'");
        self.slots.push(Slot::Multi(MultiSourceFlow {
            name,
            dir,
            sources: SmallVec::new(),
        }));
        self
    }

    fn find(&self, name: &'static str) -> Result<usize> {
        self.slots
            .iter()
            .position(|s| s.name() == name)
            .ok_or(ModelError::UnknownFlow {
                component: self.component.name(),
                flow: name,
            })
    }

    pub fn contains(&self, name: &'static str) -> bool {
        self.find(name).is_ok()
    }

    /// Amount of `name` in `unit`. Multi-source flows yield their source sum.
    pub fn get(&self, name: &'static str, unit: Unit) -> Result<f64> {
        let idx = self.find(name)?;
        unit.from_m3(self.slots[idx].amount(), self.area)
    }

    /// Set `name` to `value` [unit]. Rejects multi-source flows.
    pub fn set(&mut self, name: &'static str, value: f64, unit: Unit) -> Result<()> {
        let idx = self.find(name)?;
        match &mut self.slots[idx] {
            Slot::Simple(f) => {
                f.amount = unit.to_m3(value, self.area)?;
                Ok(())
            }
            Slot::Multi(_) => Err(ModelError::MultiSourceWrite { flow: name }),
        }
    }

    /// Add `value` [unit] onto `name`. Rejects multi-source flows.
    pub fn add(&mut self, name: &'static str, value: f64, unit: Unit) -> Result<()> {
        let idx = self.find(name)?;
        match &mut self.slots[idx] {
            Slot::Simple(f) => {
                f.amount += unit.to_m3(value, self.area)?;
                Ok(())
            }
            Slot::Multi(_) => Err(ModelError::MultiSourceWrite { flow: name }),
        }
    }

    /// Mutable access to a multi-source flow (source registration and writes).
    pub fn multi_mut(&mut self, name: &'static str) -> Result<&mut MultiSourceFlow> {
        let idx = self.find(name)?;
        match &mut self.slots[idx] {
            Slot::Multi(f) => Ok(f),
            Slot::Simple(_) => Err(ModelError::UnknownFlow {
                component: self.component.name(),
                flow: name,
            }),
        }
    }

    pub fn multi(&self, name: &'static str) -> Result<&MultiSourceFlow> {
        let idx = self.find(name)?;
        match &self.slots[idx] {
            Slot::Multi(f) => Ok(f),
            Slot::Simple(_) => Err(ModelError::UnknownFlow {
                component: self.component.name(),
                flow: name,
            }),
        }
    }

    /// Zero every amount, including multi-source slots. Registered sources
    /// and declared names survive the reset.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            match slot {
                Slot::Simple(f) => f.amount = 0.0,
                Slot::Multi(f) => f.reset(),
            }
        }
    }

    pub fn total_inflow(&self, unit: Unit) -> Result<f64> {
        self.total(FlowDir::In, unit)
    }

    pub fn total_outflow(&self, unit: Unit) -> Result<f64> {
        self.total(FlowDir::Out, unit)
    }

    fn total(&self, dir: FlowDir, unit: Unit) -> Result<f64> {
        let sum: f64 = self
            .slots
            .iter()
            .filter(|s| s.dir() == dir)
            .map(|s| s.amount())
            .sum();
        unit.from_m3(sum, self.area)
    }

    fn set_m3_raw(&mut self, name: &'static str, value: f64) -> Result<()> {
        let idx = self.find(name)?;
        match &mut self.slots[idx] {
            Slot::Simple(f) => {
                f.amount = value;
                Ok(())
            }
            Slot::Multi(_) => Err(ModelError::MultiSourceWrite { flow: name }),
        }
    }
}

/// All flow sets of one cell plus the intra-cell link registry.
///
/// Links pair a flow in one component with its mirror in another (for
/// example the roof's rain-tank discharge and the rain-tank's roof inflow).
/// Writes through [`CellFlows::set`] and [`CellFlows::add`] keep both sides
/// equal; direct `FlowSet` writes do not, so components route their shared
/// flows through the cell-level API.
#[derive(Debug, Clone)]
pub struct CellFlows {
    sets: Vec<FlowSet>,
    links: Vec<(FlowAddr, FlowAddr)>,
}

impl CellFlows {
    pub fn new(sets: Vec<FlowSet>) -> Self {
        debug_assert_eq!(sets.len(), ComponentId::ALL.len());
        Self {
            sets,
            links: Vec::new(),
        }
    }

    pub fn set_of(&self, component: ComponentId) -> &FlowSet {
        &self.sets[component as usize]
    }

    pub fn set_of_mut(&mut self, component: ComponentId) -> &mut FlowSet {
        &mut self.sets[component as usize]
    }

    /// Register a link between two declared flows of different components.
    pub fn link(&mut self, a: FlowAddr, b: FlowAddr) -> Result<()> {
        // Both endpoints must exist and be plain flows.
        for addr in [a, b] {
            let set = self.set_of(addr.component);
            if !set.contains(addr.flow) {
                return Err(ModelError::UnknownFlow {
                    component: addr.component.name(),
                    flow: addr.flow,
                });
            }
            if set.multi(addr.flow).is_ok() {
                return Err(ModelError::MultiSourceWrite { flow: addr.flow });
            }
        }
        self.links.push((a, b));
        Ok(())
    }

    fn partner(&self, addr: FlowAddr) -> Option<FlowAddr> {
        self.links.iter().find_map(|&(a, b)| {
            if a == addr {
                Some(b)
            } else if b == addr {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Set a flow and mirror the amount onto its linked partner, if any.
    pub fn set(&mut self, addr: FlowAddr, value: f64, unit: Unit) -> Result<()> {
        self.set_of_mut(addr.component).set(addr.flow, value, unit)?;
        self.sync_partner(addr)
    }

    /// Add to a flow and mirror the resulting amount onto its partner.
    pub fn add(&mut self, addr: FlowAddr, value: f64, unit: Unit) -> Result<()> {
        self.set_of_mut(addr.component).add(addr.flow, value, unit)?;
        self.sync_partner(addr)
    }

    pub fn get(&self, addr: FlowAddr, unit: Unit) -> Result<f64> {
        self.set_of(addr.component).get(addr.flow, unit)
    }

    /// The registered link pairs, for consistency diagnostics.
    pub fn links(&self) -> &[(FlowAddr, FlowAddr)] {
        &self.links
    }

    fn sync_partner(&mut self, addr: FlowAddr) -> Result<()> {
        if let Some(partner) = self.partner(addr) {
            let m3 = self.set_of(addr.component).get(addr.flow, Unit::M3)?;
            self.set_of_mut(partner.component)
                .set_m3_raw(partner.flow, m3)?;
        }
        Ok(())
    }

    /// Zero every flow of every component. Links and sources survive.
    pub fn reset(&mut self) {
        for set in &mut self.sets {
            set.reset();
        }
    }
}
