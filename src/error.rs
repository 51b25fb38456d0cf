/// Error taxonomy for model construction and simulation.
///
/// Three families of failure:
/// - configuration errors: raised once, at model construction
/// - contract errors: misuse of the storage/flow primitives, always fatal
/// - balance violations are *not* errors — they are collected as data in
///   `check::ValidationReport` so a run can finish and be inspected
use thiserror::Error;

use crate::units::Unit;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    // -- Configuration --
    /// A flow path references a cell id that is not part of the grid.
    #[error("unknown cell id {0} in flow path table")]
    UnknownCell(u32),

    /// The flow path table contains a cycle (or an unreachable knot),
    /// so no computation order exists.
    #[error("cyclic flow topology: no computation order for cells {0:?}")]
    CyclicTopology(Vec<u32>),

    /// A cell lists more upstream neighbours than the grid scheme allows.
    #[error("cell {cell}: {got} upstream neighbours, scheme allows {max}")]
    TooManyUpstream { cell: u32, got: usize, max: usize },

    /// A parameter failed its range or consistency check.
    #[error("cell {cell}: invalid parameter {name}: {reason}")]
    InvalidParameter {
        cell: u32,
        name: &'static str,
        reason: String,
    },

    /// Forcing series are inconsistent (length mismatch, negative depths, ...).
    #[error("invalid forcing data: {0}")]
    InvalidForcing(String),

    /// No soil or evapotranspiration table row matches the requested type.
    #[error("no {table} table entry for type {type_id}")]
    UnknownSoilType { table: &'static str, type_id: u32 },

    // -- Contract --
    /// Depth units (mm, m) cannot be converted without a reference area.
    #[error("cannot convert {unit} without a positive area (got {area} m2)")]
    InvalidConversion { unit: Unit, area: f64 },

    /// A flow name was requested that the component does not declare.
    #[error("{component} has no flow named '{flow}'")]
    UnknownFlow {
        component: &'static str,
        flow: &'static str,
    },

    /// A multi-source flow was written directly instead of through its sources.
    #[error("flow '{flow}' aggregates upstream sources and cannot be set directly")]
    MultiSourceWrite { flow: &'static str },

    /// Storage was driven outside [0, capacity] by more than the tolerance.
    #[error("storage '{storage}' out of bounds: amount {amount} m3, capacity {capacity} m3")]
    StorageBounds {
        storage: &'static str,
        amount: f64,
        capacity: f64,
    },
}

impl ModelError {
    /// Shorthand for parameter validation failures.
    pub fn invalid_param(cell: u32, name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            cell,
            name,
            reason: reason.into(),
        }
    }
}
