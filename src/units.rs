/// Water volume units and conversions.
///
/// All storages and flows keep their amounts in cubic metres internally.
/// Depth units (mm, m) are interpreted over a reference area and therefore
/// require that area to be positive.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

// -- Conversion factors --

/// Litres per cubic metre.
const L_PER_M3: f64 = 1000.0;

/// Millimetres per metre.
const MM_PER_M: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Cubic metres (base unit).
    M3,
    /// Litres.
    L,
    /// Millimetres of water depth over the reference area.
    Mm,
    /// Metres of water depth over the reference area.
    M,
}

impl Unit {
    /// Whether this unit is a depth over an area rather than a volume.
    pub fn is_depth(self) -> bool {
        matches!(self, Unit::Mm | Unit::M)
    }

    /// Convert `value` in this unit to cubic metres.
    ///
    /// `area` is the reference area in m2; required positive for depth units.
    pub fn to_m3(self, value: f64, area: f64) -> Result<f64> {
        match self {
            Unit::M3 => Ok(value),
            Unit::L => Ok(value / L_PER_M3),
            Unit::Mm => {
                Self::check_area(self, area)?;
                Ok(value / MM_PER_M * area)
            }
            Unit::M => {
                Self::check_area(self, area)?;
                Ok(value * area)
            }
        }
    }

    /// Convert `value` in cubic metres to this unit.
    pub fn from_m3(self, value: f64, area: f64) -> Result<f64> {
        match self {
            Unit::M3 => Ok(value),
            Unit::L => Ok(value * L_PER_M3),
            Unit::Mm => {
                Self::check_area(self, area)?;
                Ok(value / area * MM_PER_M)
            }
            Unit::M => {
                Self::check_area(self, area)?;
                Ok(value / area)
            }
        }
    }

    fn check_area(unit: Unit, area: f64) -> Result<()> {
        if area > 0.0 {
            Ok(())
        } else {
            Err(ModelError::InvalidConversion { unit, area })
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::M3 => "m3",
            Unit::L => "L",
            Unit::Mm => "mm",
            Unit::M => "m",
        };
        f.write_str(s)
    }
}
