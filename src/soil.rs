/// Soil and evapotranspiration parameter tables.
///
/// Soil behaviour is tabulated against the groundwater depth: 30 rows per
/// soil/crop combination, one for each depth in [`TABLE_DEPTHS`]. Lookups
/// bracket the current groundwater level between two rows and interpolate
/// linearly.
use serde::Deserialize;

use crate::error::{ModelError, Result};

// -- Depth table --

/// Groundwater depths [m] the soil rows are tabulated at:
/// 0.0 to 2.5 in 0.1 m steps, then 3, 4, 5 and 10 m.
pub const TABLE_DEPTHS: [f64; 30] = [
    0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.7,
    1.8, 1.9, 2.0, 2.1, 2.2, 2.3, 2.4, 2.5, 3.0, 4.0, 5.0, 10.0,
];

/// Deepest tabulated groundwater level [m].
pub const MAX_SOIL_DEPTH: f64 = 10.0;

/// Index of the deepest row.
pub const MAX_SOIL_INDEX: usize = 29;

/// Bracketing of a groundwater level between two table rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GwBracket {
    pub upper_level: f64,
    pub lower_level: f64,
    pub upper_index: usize,
    pub lower_index: usize,
}

impl GwBracket {
    /// Linear weight of the lower row for `level` (0 at the upper row,
    /// 1 at the lower row). Zero when the bracket has collapsed.
    pub fn factor(&self, level: f64) -> f64 {
        let span = self.lower_level - self.upper_level;
        if span <= 0.0 {
            0.0
        } else {
            (level - self.upper_level) / span
        }
    }
}

/// Bracket `groundwater_level` [m below surface] between two table rows.
///
/// Levels above the surface clamp to the first row; levels beyond 10 m
/// collapse onto the last row.
pub fn gw_bracket(groundwater_level: f64) -> GwBracket {
    let level = groundwater_level.max(0.0);

    let (upper_level, upper_index) = if level <= 2.5 {
        let snapped = (level * 10.0).floor() / 10.0;
        (snapped, (snapped * 10.0).round() as usize)
    } else if level < 3.0 {
        (2.5, 25)
    } else if level < 5.0 {
        let whole = level.floor();
        (whole, 23 + whole as usize)
    } else if level < 10.0 {
        (5.0, 28)
    } else {
        (10.0, 29)
    };

    let (lower_level, lower_index) = if upper_level < 2.5 {
        (upper_level + 0.1, upper_index + 1)
    } else if upper_level < 3.0 {
        (3.0, upper_index + 1)
    } else if upper_level < 4.0 {
        (4.0, upper_index + 1)
    } else if upper_level < 5.0 {
        (5.0, upper_index + 1)
    } else {
        (10.0, 29)
    };

    GwBracket {
        upper_level,
        lower_level,
        upper_index,
        lower_index,
    }
}

// -- Tables --

/// One depth row of a soil profile.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SoilLevel {
    /// Equilibrium moisture content of the root zone [mm].
    pub eq_moisture: f64,
    /// Maximum capillary rise rate [mm/d].
    pub max_capillary_rise: f64,
    /// Storage coefficient [-].
    pub storage_coefficient: f64,
}

/// Soil profile for one soil/crop combination: 30 depth rows plus the
/// saturated conductivity.
#[derive(Debug, Clone, Deserialize)]
pub struct SoilProfile {
    pub soil_type: u32,
    pub crop_type: u32,
    /// Saturated conductivity [cm/d]; components scale it to mm/d.
    pub k_sat: f64,
    pub levels: Vec<SoilLevel>,
}

impl SoilProfile {
    pub fn level(&self, index: usize) -> &SoilLevel {
        &self.levels[index.min(MAX_SOIL_INDEX)]
    }

    /// Equilibrium moisture [mm] and maximum capillary rise [mm/d]
    /// interpolated for `groundwater_level` [m].
    pub fn moisture_properties(&self, groundwater_level: f64) -> (f64, f64) {
        if groundwater_level >= MAX_SOIL_DEPTH {
            let deep = self.level(MAX_SOIL_INDEX);
            return (deep.eq_moisture, deep.max_capillary_rise);
        }
        let bracket = gw_bracket(groundwater_level);
        let f = bracket.factor(groundwater_level.max(0.0));
        let up = self.level(bracket.upper_index);
        let low = self.level(bracket.lower_index);
        (
            up.eq_moisture + f * (low.eq_moisture - up.eq_moisture),
            up.max_capillary_rise + f * (low.max_capillary_rise - up.max_capillary_rise),
        )
    }

    /// Storage coefficient [-] interpolated for `groundwater_level` [m].
    pub fn storage_coefficient(&self, groundwater_level: f64) -> f64 {
        if groundwater_level >= MAX_SOIL_DEPTH {
            return self.level(MAX_SOIL_INDEX).storage_coefficient;
        }
        let bracket = gw_bracket(groundwater_level);
        let f = bracket.factor(groundwater_level.max(0.0));
        let up = self.level(bracket.upper_index);
        let low = self.level(bracket.lower_index);
        up.storage_coefficient + f * (low.storage_coefficient - up.storage_coefficient)
    }
}

/// Moisture thresholds of the transpiration reduction curve, one row per
/// soil/crop combination. All moisture values in mm over the root zone.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EtRow {
    pub soil_type: u32,
    pub crop_type: u32,
    /// Root zone thickness [m].
    pub rootzone_thickness: f64,
    /// Saturation (groundwater at the surface).
    pub theta_h1: f64,
    /// Field capacity (groundwater at the root zone bottom).
    pub theta_h2: f64,
    /// Moisture where reduction starts at low (≤ 1 mm/d) potential ET.
    pub theta_h3l: f64,
    /// Moisture where reduction starts at high (≥ 5 mm/d) potential ET.
    pub theta_h3h: f64,
    /// Permanent wilting point.
    pub theta_h4: f64,
}

/// Lookup container for soil profiles and transpiration threshold rows.
#[derive(Debug, Clone, Deserialize)]
pub struct SoilLibrary {
    pub profiles: Vec<SoilProfile>,
    pub et_rows: Vec<EtRow>,
}

impl SoilLibrary {
    pub fn profile(&self, soil_type: u32, crop_type: u32) -> Result<&SoilProfile> {
        self.profiles
            .iter()
            .find(|p| p.soil_type == soil_type && p.crop_type == crop_type)
            .ok_or(ModelError::UnknownSoilType {
                table: "soil",
                type_id: soil_type,
            })
    }

    pub fn et_row(&self, soil_type: u32, crop_type: u32) -> Result<&EtRow> {
        self.et_rows
            .iter()
            .find(|r| r.soil_type == soil_type && r.crop_type == crop_type)
            .ok_or(ModelError::UnknownSoilType {
                table: "evapotranspiration",
                type_id: soil_type,
            })
    }

    /// Builtin loam-under-grass library (soil type 1, crop type 1).
    ///
    /// Depth rows are generated from the retention thresholds: equilibrium
    /// moisture relaxes from saturation at the surface towards the wilting
    /// point, capillary rise decays with depth, and the storage coefficient
    /// grows from near zero towards its deep-soil value.
    pub fn loam_grass() -> Self {
        let et = EtRow {
            soil_type: 1,
            crop_type: 1,
            rootzone_thickness: 0.5,
            theta_h1: 225.0,
            theta_h2: 160.0,
            theta_h3l: 110.0,
            theta_h3h: 140.0,
            theta_h4: 60.0,
        };

        let levels = TABLE_DEPTHS
            .iter()
            .map(|&d| SoilLevel {
                eq_moisture: et.theta_h4 + (et.theta_h1 - et.theta_h4) * (-d / 0.8).exp(),
                max_capillary_rise: 6.0 * (-d / 1.2).exp(),
                storage_coefficient: 0.02 + 0.13 * (1.0 - (-d / 1.5).exp()),
            })
            .collect();

        Self {
            profiles: vec![SoilProfile {
                soil_type: 1,
                crop_type: 1,
                k_sat: 5.0,
                levels,
            }],
            et_rows: vec![et],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    // -- gw_bracket --

    #[test]
    fn shallow_levels_snap_to_tenths() {
        let b = gw_bracket(0.73);
        assert_approx(b.upper_level, 0.7, 1e-12);
        assert_approx(b.lower_level, 0.8, 1e-12);
        assert_eq!(b.upper_index, 7);
        assert_eq!(b.lower_index, 8);
    }

    #[test]
    fn level_on_a_row_brackets_downwards() {
        let b = gw_bracket(1.2);
        assert_eq!(b.upper_index, 12);
        assert_eq!(b.lower_index, 13);
        assert_approx(b.factor(1.2), 0.0, 1e-12);
    }

    #[test]
    fn intermediate_depth_rows() {
        // Between 2.5 and 3.0
        let b = gw_bracket(2.7);
        assert_eq!((b.upper_index, b.lower_index), (25, 26));
        assert_approx(b.upper_level, 2.5, 1e-12);
        assert_approx(b.lower_level, 3.0, 1e-12);

        // Between 3 and 4
        let b = gw_bracket(3.4);
        assert_eq!((b.upper_index, b.lower_index), (26, 27));

        // Between 5 and 10
        let b = gw_bracket(7.0);
        assert_eq!((b.upper_index, b.lower_index), (28, 29));
    }

    #[test]
    fn deep_levels_collapse_to_last_row() {
        let b = gw_bracket(12.0);
        assert_eq!((b.upper_index, b.lower_index), (29, 29));
        assert_approx(b.factor(12.0), 0.0, 1e-12);
    }

    #[test]
    fn ponded_levels_clamp_to_surface() {
        let b = gw_bracket(-0.4);
        assert_eq!(b.upper_index, 0);
        assert_eq!(b.lower_index, 1);
        assert_approx(b.factor(0.0), 0.0, 1e-12);
    }

    #[test]
    fn bracket_indices_match_depth_table() {
        for (i, &d) in TABLE_DEPTHS.iter().enumerate().take(MAX_SOIL_INDEX) {
            let b = gw_bracket(d);
            assert_eq!(b.upper_index, i, "depth {d}");
            assert_approx(TABLE_DEPTHS[b.upper_index], d, 1e-12);
        }
    }

    // -- Profiles --

    #[test]
    fn interpolation_is_exact_on_rows() {
        let lib = SoilLibrary::loam_grass();
        let p = lib.profile(1, 1).unwrap();
        for (i, &d) in TABLE_DEPTHS.iter().enumerate() {
            let (eq, _) = p.moisture_properties(d);
            assert_approx(eq, p.level(i).eq_moisture, 1e-9);
            assert_approx(p.storage_coefficient(d), p.level(i).storage_coefficient, 1e-9);
        }
    }

    #[test]
    fn interpolation_between_rows_is_bounded() {
        let lib = SoilLibrary::loam_grass();
        let p = lib.profile(1, 1).unwrap();
        let (eq, cap) = p.moisture_properties(0.35);
        let hi = p.level(3);
        let lo = p.level(4);
        assert!(eq <= hi.eq_moisture && eq >= lo.eq_moisture);
        assert!(cap <= hi.max_capillary_rise && cap >= lo.max_capillary_rise);
    }

    #[test]
    fn eq_moisture_decreases_with_depth() {
        let lib = SoilLibrary::loam_grass();
        let p = lib.profile(1, 1).unwrap();
        for w in p.levels.windows(2) {
            assert!(w[0].eq_moisture > w[1].eq_moisture);
            assert!(w[0].storage_coefficient < w[1].storage_coefficient);
        }
    }

    #[test]
    fn surface_row_is_saturated() {
        let lib = SoilLibrary::loam_grass();
        let p = lib.profile(1, 1).unwrap();
        let et = lib.et_row(1, 1).unwrap();
        assert_approx(p.level(0).eq_moisture, et.theta_h1, 1e-9);
    }

    #[test]
    fn unknown_types_are_errors() {
        let lib = SoilLibrary::loam_grass();
        assert!(lib.profile(9, 1).is_err());
        assert!(lib.et_row(1, 9).is_err());
    }
}
