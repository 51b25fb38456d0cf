/// Simulation output containers.
///
/// Per-cell results are stored as one vector per variable, appended to once
/// per timestep; everything is in cubic metres except the groundwater
/// levels, which stay in metres.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::check::ValidationReport;
use crate::topology::CellId;

/// One cell's fluxes and end-of-step states for a single timestep [m3].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CellRecord {
    pub precipitation: f64,
    pub imported_water: f64,
    pub reuse_supply: f64,
    pub reuse_use: f64,
    pub evaporation: f64,
    pub transpiration: f64,
    pub seepage: f64,
    pub baseflow: f64,
    pub storm_sewer: f64,
    pub waste_sewer: f64,
    /// Routed sewer inflow from upstream cells, both sewers combined.
    pub upstream_inflow: f64,
    /// Water handed to other cells by the distribution passes.
    pub distributed: f64,
    /// Total storage change of the step, groundwater head included.
    pub storage_change: f64,
    pub roof_storage: f64,
    pub raintank_storage: f64,
    pub pavement_storage: f64,
    pub pervious_storage: f64,
    pub vadose_moisture: f64,
    pub stormwater_storage: f64,
    pub reuse_storage: f64,
    pub wastewater_storage: f64,
    /// Water table depth [m below surface].
    pub groundwater_level: f64,
    /// Ponded water level [m], zero or negative.
    pub surface_water_level: f64,
}

/// Per-cell timeseries, one vector per variable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CellTimeseries {
    pub precipitation: Vec<f64>,
    pub imported_water: Vec<f64>,
    pub reuse_supply: Vec<f64>,
    pub reuse_use: Vec<f64>,
    pub evaporation: Vec<f64>,
    pub transpiration: Vec<f64>,
    pub seepage: Vec<f64>,
    pub baseflow: Vec<f64>,
    pub storm_sewer: Vec<f64>,
    pub waste_sewer: Vec<f64>,
    pub upstream_inflow: Vec<f64>,
    pub distributed: Vec<f64>,
    pub storage_change: Vec<f64>,
    pub roof_storage: Vec<f64>,
    pub raintank_storage: Vec<f64>,
    pub pavement_storage: Vec<f64>,
    pub pervious_storage: Vec<f64>,
    pub vadose_moisture: Vec<f64>,
    pub stormwater_storage: Vec<f64>,
    pub reuse_storage: Vec<f64>,
    pub wastewater_storage: Vec<f64>,
    pub groundwater_level: Vec<f64>,
    pub surface_water_level: Vec<f64>,
}

impl CellTimeseries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            precipitation: Vec::with_capacity(capacity),
            imported_water: Vec::with_capacity(capacity),
            reuse_supply: Vec::with_capacity(capacity),
            reuse_use: Vec::with_capacity(capacity),
            evaporation: Vec::with_capacity(capacity),
            transpiration: Vec::with_capacity(capacity),
            seepage: Vec::with_capacity(capacity),
            baseflow: Vec::with_capacity(capacity),
            storm_sewer: Vec::with_capacity(capacity),
            waste_sewer: Vec::with_capacity(capacity),
            upstream_inflow: Vec::with_capacity(capacity),
            distributed: Vec::with_capacity(capacity),
            storage_change: Vec::with_capacity(capacity),
            roof_storage: Vec::with_capacity(capacity),
            raintank_storage: Vec::with_capacity(capacity),
            pavement_storage: Vec::with_capacity(capacity),
            pervious_storage: Vec::with_capacity(capacity),
            vadose_moisture: Vec::with_capacity(capacity),
            stormwater_storage: Vec::with_capacity(capacity),
            reuse_storage: Vec::with_capacity(capacity),
            wastewater_storage: Vec::with_capacity(capacity),
            groundwater_level: Vec::with_capacity(capacity),
            surface_water_level: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: CellRecord) {
        self.precipitation.push(record.precipitation);
        self.imported_water.push(record.imported_water);
        self.reuse_supply.push(record.reuse_supply);
        self.reuse_use.push(record.reuse_use);
        self.evaporation.push(record.evaporation);
        self.transpiration.push(record.transpiration);
        self.seepage.push(record.seepage);
        self.baseflow.push(record.baseflow);
        self.storm_sewer.push(record.storm_sewer);
        self.waste_sewer.push(record.waste_sewer);
        self.upstream_inflow.push(record.upstream_inflow);
        self.distributed.push(record.distributed);
        self.storage_change.push(record.storage_change);
        self.roof_storage.push(record.roof_storage);
        self.raintank_storage.push(record.raintank_storage);
        self.pavement_storage.push(record.pavement_storage);
        self.pervious_storage.push(record.pervious_storage);
        self.vadose_moisture.push(record.vadose_moisture);
        self.stormwater_storage.push(record.stormwater_storage);
        self.reuse_storage.push(record.reuse_storage);
        self.wastewater_storage.push(record.wastewater_storage);
        self.groundwater_level.push(record.groundwater_level);
        self.surface_water_level.push(record.surface_water_level);
    }

    pub fn len(&self) -> usize {
        self.precipitation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precipitation.is_empty()
    }
}

/// One timestep of the system-wide aggregates [m3].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AggregateRecord {
    /// Storm sewer discharge of the outlet cells.
    pub runoff: f64,
    /// Wastewater sewer discharge of the outlet cells.
    pub wastewater: f64,
    pub baseflow: f64,
    pub seepage: f64,
    /// Net import after the cluster distribution passes.
    pub imported_water: f64,
    pub evapotranspiration: f64,
    /// All evaporation including transpiration.
    pub evaporation: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedTimeseries {
    pub runoff: Vec<f64>,
    pub wastewater: Vec<f64>,
    pub baseflow: Vec<f64>,
    pub seepage: Vec<f64>,
    pub imported_water: Vec<f64>,
    pub evapotranspiration: Vec<f64>,
    pub evaporation: Vec<f64>,
}

impl AggregatedTimeseries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            runoff: Vec::with_capacity(capacity),
            wastewater: Vec::with_capacity(capacity),
            baseflow: Vec::with_capacity(capacity),
            seepage: Vec::with_capacity(capacity),
            imported_water: Vec::with_capacity(capacity),
            evapotranspiration: Vec::with_capacity(capacity),
            evaporation: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: AggregateRecord) {
        self.runoff.push(record.runoff);
        self.wastewater.push(record.wastewater);
        self.baseflow.push(record.baseflow);
        self.seepage.push(record.seepage);
        self.imported_water.push(record.imported_water);
        self.evapotranspiration.push(record.evapotranspiration);
        self.evaporation.push(record.evaporation);
    }

    pub fn len(&self) -> usize {
        self.runoff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runoff.is_empty()
    }
}

/// Full simulation output: aggregates, per-cell series and the balance
/// validation report.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResults {
    pub aggregated: AggregatedTimeseries,
    pub cells: BTreeMap<CellId, CellTimeseries>,
    pub report: ValidationReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_columns_in_step() {
        let mut series = CellTimeseries::with_capacity(4);
        assert!(series.is_empty());
        series.push(CellRecord {
            precipitation: 1.0,
            groundwater_level: 1.5,
            ..Default::default()
        });
        series.push(CellRecord::default());
        assert_eq!(series.len(), 2);
        assert_eq!(series.groundwater_level.len(), 2);
        assert_eq!(series.groundwater_level[0], 1.5);
    }

    #[test]
    fn aggregated_series_grows_per_step() {
        let mut agg = AggregatedTimeseries::with_capacity(2);
        agg.push(AggregateRecord {
            runoff: 3.0,
            ..Default::default()
        });
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.runoff[0], 3.0);
    }
}
