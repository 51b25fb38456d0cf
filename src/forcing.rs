/// Validated climate forcing series.
///
/// All series share one daily index. Precipitation and potential evaporation
/// are mandatory; open water level and surface irrigation default to zero.
/// The irrigation index is the potential evaporation normalised over the
/// period and is used to spread yearly irrigation blocks over the season.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcingData {
    pub dates: Vec<NaiveDate>,
    /// Precipitation [mm per timestep].
    pub precipitation: Vec<f64>,
    /// Potential evaporation [mm per timestep].
    pub potential_evaporation: Vec<f64>,
    /// Open water level [m], same datum as the groundwater level.
    pub open_water_level: Vec<f64>,
    /// Irrigation applied to roofs [mm per timestep].
    pub roof_irrigation: Vec<f64>,
    /// Irrigation applied to pavements [mm per timestep].
    pub pavement_irrigation: Vec<f64>,
    /// Normalised irrigation index (sums to 1 unless all-zero PET).
    pub irrigation_index: Vec<f64>,
}

/// One timestep's forcing, with the per-cell pervious irrigation resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcingStep {
    pub precipitation: f64,
    pub potential_evaporation: f64,
    pub open_water_level: f64,
    pub roof_irrigation: f64,
    pub pavement_irrigation: f64,
    pub pervious_irrigation: f64,
}

impl ForcingData {
    /// Create forcing data from the mandatory series.
    ///
    /// Validates matching lengths and non-negative depths.
    pub fn new(
        dates: Vec<NaiveDate>,
        precipitation: Vec<f64>,
        potential_evaporation: Vec<f64>,
    ) -> Result<Self> {
        let n = dates.len();
        if n == 0 {
            return Err(ModelError::InvalidForcing("empty forcing period".into()));
        }
        if precipitation.len() != n || potential_evaporation.len() != n {
            return Err(ModelError::InvalidForcing(format!(
                "series lengths differ: {} dates, {} precipitation, {} potential evaporation",
                n,
                precipitation.len(),
                potential_evaporation.len()
            )));
        }
        for (t, (&p, &pet)) in precipitation
            .iter()
            .zip(potential_evaporation.iter())
            .enumerate()
        {
            if !p.is_finite() || p < 0.0 {
                return Err(ModelError::InvalidForcing(format!(
                    "precipitation at step {t} is {p}"
                )));
            }
            if !pet.is_finite() || pet < 0.0 {
                return Err(ModelError::InvalidForcing(format!(
                    "potential evaporation at step {t} is {pet}"
                )));
            }
        }

        let pet_sum: f64 = potential_evaporation.iter().sum();
        let irrigation_index = if pet_sum > 0.0 {
            potential_evaporation.iter().map(|&e| e / pet_sum).collect()
        } else {
            vec![0.0; n]
        };

        Ok(Self {
            dates,
            precipitation,
            potential_evaporation,
            open_water_level: vec![0.0; n],
            roof_irrigation: vec![0.0; n],
            pavement_irrigation: vec![0.0; n],
            irrigation_index,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn with_open_water_level(mut self, levels: Vec<f64>) -> Result<Self> {
        if levels.len() != self.len() {
            return Err(ModelError::InvalidForcing(format!(
                "open water level series has {} steps, expected {}",
                levels.len(),
                self.len()
            )));
        }
        self.open_water_level = levels;
        Ok(self)
    }

    pub fn with_surface_irrigation(mut self, roof: Vec<f64>, pavement: Vec<f64>) -> Result<Self> {
        if roof.len() != self.len() || pavement.len() != self.len() {
            return Err(ModelError::InvalidForcing(format!(
                "irrigation series have {} and {} steps, expected {}",
                roof.len(),
                pavement.len(),
                self.len()
            )));
        }
        self.roof_irrigation = roof;
        self.pavement_irrigation = pavement;
        Ok(self)
    }

    /// Scale precipitation in place (scenario perturbation).
    pub fn scale_precipitation(&mut self, factor: f64) {
        for p in &mut self.precipitation {
            *p *= factor;
        }
    }

    /// The forcing of timestep `t`, without pervious irrigation (that part
    /// is per-cell and filled in by the caller).
    pub fn step(&self, t: usize) -> ForcingStep {
        ForcingStep {
            precipitation: self.precipitation[t],
            potential_evaporation: self.potential_evaporation[t],
            open_water_level: self.open_water_level[t],
            roof_irrigation: self.roof_irrigation[t],
            pavement_irrigation: self.pavement_irrigation[t],
            pervious_irrigation: 0.0,
        }
    }

    /// Uniform synthetic period starting at `start`, mostly for tests and
    /// benchmarks.
    pub fn constant(start: NaiveDate, days: usize, precipitation: f64, pet: f64) -> Result<Self> {
        let dates = (0..days)
            .map(|d| start + chrono::Duration::days(d as i64))
            .collect();
        Self::new(dates, vec![precipitation; days], vec![pet; days])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, n).unwrap()
    }

    #[test]
    fn valid_series_accepted() {
        let f = ForcingData::new(
            vec![day(1), day(2), day(3)],
            vec![10.0, 0.0, 5.0],
            vec![2.0, 3.0, 1.0],
        )
        .unwrap();
        assert_eq!(f.len(), 3);
        assert_eq!(f.open_water_level, vec![0.0; 3]);
    }

    #[test]
    fn length_mismatch_rejected() {
        let result = ForcingData::new(vec![day(1), day(2)], vec![10.0], vec![2.0, 3.0]);
        assert!(result.is_err());
    }

    #[test]
    fn negative_depths_rejected() {
        assert!(ForcingData::new(vec![day(1)], vec![-1.0], vec![2.0]).is_err());
        assert!(ForcingData::new(vec![day(1)], vec![1.0], vec![f64::NAN]).is_err());
    }

    #[test]
    fn empty_period_rejected() {
        assert!(ForcingData::new(vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn irrigation_index_normalised() {
        let f = ForcingData::new(
            vec![day(1), day(2)],
            vec![0.0, 0.0],
            vec![1.0, 3.0],
        )
        .unwrap();
        assert!((f.irrigation_index.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((f.irrigation_index[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn zero_pet_gives_zero_index() {
        let f = ForcingData::new(vec![day(1)], vec![5.0], vec![0.0]).unwrap();
        assert_eq!(f.irrigation_index, vec![0.0]);
    }

    #[test]
    fn scale_precipitation_in_place() {
        let mut f = ForcingData::constant(day(1), 2, 10.0, 2.0).unwrap();
        f.scale_precipitation(1.5);
        assert_eq!(f.precipitation, vec![15.0, 15.0]);
    }

    #[test]
    fn optional_series_validate_length() {
        let f = ForcingData::constant(day(1), 2, 10.0, 2.0).unwrap();
        assert!(f.clone().with_open_water_level(vec![1.0]).is_err());
        assert!(f.with_open_water_level(vec![1.0, 1.2]).is_ok());
    }
}
