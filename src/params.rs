/// Per-cell parameter bundles.
///
/// Grouped by component, mirroring the input tables: ratios arrive as
/// percentages and are converted to fractions where they are consumed.
/// `CellParams::validate` runs the cross-field checks once, at model
/// construction.
use serde::Deserialize;

use crate::error::{ModelError, Result};
use crate::topology::CellId;

fn default_one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralParams {
    /// Timestep length [d].
    #[serde(default = "default_one")]
    pub time_step: f64,
    /// Households in the cell.
    pub number_houses: f64,
    /// Indoor water use [L per timestep, whole cell].
    pub indoor_water_use: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoofParams {
    /// Roof area [m2].
    pub area: f64,
    /// Interception capacity [mm].
    pub max_storage: f64,
    /// Share of the roof draining to the gutter [%].
    pub effective_area: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaintankParams {
    /// Open tanks receive precipitation and lose evaporation.
    pub is_open: bool,
    /// Tank surface area per installed tank [m2].
    pub area: f64,
    /// Capacity per installed tank [L].
    pub capacity: f64,
    /// First flush diverted past the tank, per installed tank [L].
    pub first_flush: f64,
    /// Share of tank overflow routed to the stormwater system [%].
    pub effective_area: f64,
    /// Houses with a tank installed [%].
    pub install_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PavementParams {
    pub area: f64,
    /// Interception capacity [mm].
    pub max_storage: f64,
    /// Share of runoff routed to the stormwater system [%].
    pub effective_area: f64,
    /// Infiltration capacity towards groundwater [mm/d].
    pub infiltration_capacity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerviousParams {
    pub area: f64,
    /// Interception capacity [mm].
    pub max_storage: f64,
    /// Surface infiltration capacity [mm/d].
    pub infiltration_capacity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VadoseParams {
    pub area: f64,
}

/// Seepage formulation between shallow and deep groundwater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeepageModel {
    /// Fixed downward flux.
    Constant,
    /// Flux driven by the head difference to the deep aquifer.
    Dynamic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundwaterParams {
    pub area: f64,
    /// Groundwater level at t=0 [m below surface].
    pub initial_level: f64,
    /// Share of delivered water lost to the subsurface [%].
    pub leakage_rate: f64,
    pub seepage_model: SeepageModel,
    /// Drainage resistance towards open water [d].
    pub drainage_resistance: f64,
    /// Vertical resistance towards deep groundwater [d].
    pub seepage_resistance: f64,
    /// Recession constant of the sewer-pipe infiltration store [1/d].
    pub infiltration_recession: f64,
    /// Head of the deep aquifer [m below surface].
    pub hydraulic_head: f64,
    /// Constant downward seepage [mm/d], used by `SeepageModel::Constant`.
    pub downward_seepage: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StormwaterParams {
    pub is_open: bool,
    /// Storage surface area [m2].
    pub area: f64,
    /// Detention capacity [L].
    pub capacity: f64,
    /// First flush diverted straight to the sewer [L].
    pub first_flush: f64,
    /// Share of runoff diverted into the wastewater system [%].
    pub wastewater_runoff: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WastewaterParams {
    /// Cluster storage surface area [m2].
    pub area: f64,
    /// Cluster storage capacity [L].
    pub capacity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReuseParams {
    /// On-site treatment storage area per house [m2].
    pub area: f64,
    /// On-site treatment storage capacity per house [L].
    pub capacity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoilChoice {
    pub soil_type: u32,
    pub crop_type: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IrrigationParams {
    /// Yearly irrigation block for the pervious area [m3].
    pub block_water_demand: f64,
}

/// Indoor demand split [% of indoor water use].
#[derive(Debug, Clone, Deserialize)]
pub struct DemandSplit {
    pub kitchen: f64,
    pub bathroom: f64,
    pub laundry: f64,
    pub toilet: f64,
}

/// Reuse routing switches and factors (0 disables a route, 1 enables it;
/// fractional values scale the served share).
#[derive(Debug, Clone, Deserialize)]
pub struct ReuseSettings {
    /// Kitchen / bathroom / laundry graywater diverted to subsurface
    /// irrigation.
    pub kitchen_to_ssg: f64,
    pub bathroom_to_ssg: f64,
    pub laundry_to_ssg: f64,
    /// Rain tank serving kitchen / bathroom / laundry demand.
    pub raintank_for_kitchen: f64,
    pub raintank_for_bathroom: f64,
    pub raintank_for_laundry: f64,
    /// On-site treated wastewater serving toilet / irrigation demand.
    pub wws_for_toilet: f64,
    pub wws_for_irrigation: f64,
    /// Rain tank serving toilet / irrigation demand.
    pub raintank_for_toilet: f64,
    pub raintank_for_irrigation: f64,
    /// Cluster wastewater storage serving toilet / irrigation demand.
    pub cluster_for_toilet: f64,
    pub cluster_for_irrigation: f64,
    /// Stormwater storage serving toilet / irrigation demand.
    pub stormwater_for_toilet: f64,
    pub stormwater_for_irrigation: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellParams {
    pub general: GeneralParams,
    pub roof: RoofParams,
    pub raintank: RaintankParams,
    pub pavement: PavementParams,
    pub pervious: PerviousParams,
    pub vadose: VadoseParams,
    pub groundwater: GroundwaterParams,
    pub stormwater: StormwaterParams,
    pub wastewater: WastewaterParams,
    pub reuse: ReuseParams,
    pub soil: SoilChoice,
    pub irrigation: IrrigationParams,
    pub demand: DemandSplit,
    pub reuse_settings: ReuseSettings,
}

impl CellParams {
    pub fn validate(&self, cell: CellId) -> Result<()> {
        let err = |name, reason: String| Err(ModelError::invalid_param(cell, name, reason));

        for (name, area) in [
            ("roof.area", self.roof.area),
            ("raintank.area", self.raintank.area),
            ("pavement.area", self.pavement.area),
            ("pervious.area", self.pervious.area),
            ("vadose.area", self.vadose.area),
            ("groundwater.area", self.groundwater.area),
            ("stormwater.area", self.stormwater.area),
            ("wastewater.area", self.wastewater.area),
            ("reuse.area", self.reuse.area),
        ] {
            if !area.is_finite() || area < 0.0 {
                return err(name, format!("area must be non-negative, got {area}"));
            }
        }

        for (name, pct) in [
            ("roof.effective_area", self.roof.effective_area),
            ("raintank.effective_area", self.raintank.effective_area),
            ("raintank.install_ratio", self.raintank.install_ratio),
            ("pavement.effective_area", self.pavement.effective_area),
            ("groundwater.leakage_rate", self.groundwater.leakage_rate),
            ("stormwater.wastewater_runoff", self.stormwater.wastewater_runoff),
            ("demand.kitchen", self.demand.kitchen),
            ("demand.bathroom", self.demand.bathroom),
            ("demand.laundry", self.demand.laundry),
            ("demand.toilet", self.demand.toilet),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                return err(name, format!("percentage out of [0, 100], got {pct}"));
            }
        }
        // A full leakage rate would divide the delivery factor by zero.
        if self.groundwater.leakage_rate >= 100.0 {
            return err(
                "groundwater.leakage_rate",
                "leakage rate of 100% leaves no delivered water".into(),
            );
        }

        if self.general.time_step <= 0.0 {
            return err(
                "general.time_step",
                format!("must be positive, got {}", self.general.time_step),
            );
        }
        if self.general.number_houses < 0.0 || self.general.indoor_water_use < 0.0 {
            return err("general", "houses and indoor use must be non-negative".into());
        }

        for (name, value) in [
            ("groundwater.drainage_resistance", self.groundwater.drainage_resistance),
            ("groundwater.seepage_resistance", self.groundwater.seepage_resistance),
        ] {
            if value <= 0.0 {
                return err(name, format!("resistance must be positive, got {value}"));
            }
        }
        if self.groundwater.infiltration_recession < 0.0 {
            return err(
                "groundwater.infiltration_recession",
                "recession constant must be non-negative".into(),
            );
        }

        for (name, value) in [
            ("roof.max_storage", self.roof.max_storage),
            ("raintank.capacity", self.raintank.capacity),
            ("raintank.first_flush", self.raintank.first_flush),
            ("pavement.max_storage", self.pavement.max_storage),
            ("pervious.max_storage", self.pervious.max_storage),
            ("stormwater.capacity", self.stormwater.capacity),
            ("stormwater.first_flush", self.stormwater.first_flush),
            ("wastewater.capacity", self.wastewater.capacity),
            ("reuse.capacity", self.reuse.capacity),
            ("irrigation.block_water_demand", self.irrigation.block_water_demand),
        ] {
            if !value.is_finite() || value < 0.0 {
                return err(name, format!("must be non-negative, got {value}"));
            }
        }

        Ok(())
    }
}

/// Run-level perturbations applied before a simulation.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Multiplier on every precipitation value.
    #[serde(default = "default_one")]
    pub precipitation_factor: f64,
    /// Multiplier on indoor water use.
    #[serde(default = "default_one")]
    pub indoor_use_factor: f64,
}

impl Scenario {
    pub fn apply(
        &self,
        forcing: &mut crate::forcing::ForcingData,
        params: &mut std::collections::BTreeMap<CellId, CellParams>,
    ) {
        forcing.scale_precipitation(self.precipitation_factor);
        for cell in params.values_mut() {
            cell.general.indoor_water_use *= self.indoor_use_factor;
        }
    }
}
