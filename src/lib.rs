/// urbanwb — distributed urban water balance simulation engine.
///
/// A grid of cells, each running a nine-component pipeline (roof, rain
/// tank, pavement, pervious area, vadose zone, groundwater, stormwater,
/// reuse, wastewater) over a daily climate forcing. Cells drain into each
/// other along a validated flow topology; sewer discharges route
/// downstream with a one-timestep lag, and cluster stores redistribute
/// water to cells with unmet demand. Every timestep closes a per-cell
/// water balance that the validation pass checks against a tolerance.
pub mod check;
pub mod components;
pub mod error;
pub mod flows;
pub mod forcing;
pub mod model;
pub mod outputs;
pub mod params;
pub mod run;
pub mod soil;
pub mod spinup;
pub mod state;
pub mod storage;
pub mod topology;
pub mod units;

#[cfg(test)]
pub(crate) mod testutil;

pub use check::{check, check_results, ClosureReport, ValidationReport};
pub use error::{ModelError, Result};
pub use forcing::{ForcingData, ForcingStep};
pub use model::{Cell, UrbanWaterModel};
pub use outputs::SimulationResults;
pub use params::{CellParams, Scenario};
pub use run::{run, RunOptions};
pub use soil::SoilLibrary;
pub use spinup::{spin_up, SpinupOptions};
pub use topology::{CellId, FlowPath, NeighbourScheme, Topology};
pub use units::Unit;
