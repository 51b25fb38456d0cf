/// Unit-aware water reservoir.
///
/// A `Storage` tracks a previous-timestep and a current amount, both held
/// internally in cubic metres. Callers read and write in any supported unit;
/// depth units are resolved against the storage's reference area.
///
/// The primitive never clamps: components are responsible for keeping their
/// stores inside [0, capacity], and the validation pass reports amounts that
/// escape those bounds.
use crate::error::{ModelError, Result};
use crate::units::Unit;

#[derive(Debug, Clone)]
pub struct Storage {
    name: &'static str,
    /// Reference area [m2] for depth-unit conversions.
    area: f64,
    /// Maximum content [m3]; `f64::INFINITY` when unbounded.
    capacity: f64,
    /// Content at the end of the previous timestep [m3].
    previous: f64,
    /// Content being computed for the current timestep [m3].
    current: f64,
}

impl Storage {
    /// Create a storage with the given capacity expressed in `unit`.
    ///
    /// Both amounts start at zero.
    pub fn new(name: &'static str, area: f64, capacity: f64, unit: Unit) -> Result<Self> {
        Ok(Self {
            name,
            area,
            capacity: unit.to_m3(capacity, area)?,
            previous: 0.0,
            current: 0.0,
        })
    }

    /// Create an unbounded storage (soil moisture, groundwater).
    pub fn unbounded(name: &'static str, area: f64) -> Self {
        Self {
            name,
            area,
            capacity: f64::INFINITY,
            previous: 0.0,
            current: 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Current amount in `unit`.
    pub fn amount(&self, unit: Unit) -> Result<f64> {
        unit.from_m3(self.current, self.area)
    }

    /// Previous-timestep amount in `unit`.
    pub fn previous(&self, unit: Unit) -> Result<f64> {
        unit.from_m3(self.previous, self.area)
    }

    /// Capacity in `unit`. Infinite for unbounded storages.
    pub fn capacity(&self, unit: Unit) -> Result<f64> {
        if self.capacity.is_infinite() {
            return Ok(f64::INFINITY);
        }
        unit.from_m3(self.capacity, self.area)
    }

    /// Remaining headroom in `unit` (capacity − current, never negative).
    pub fn headroom(&self, unit: Unit) -> Result<f64> {
        if self.capacity.is_infinite() {
            return Ok(f64::INFINITY);
        }
        unit.from_m3((self.capacity - self.current).max(0.0), self.area)
    }

    pub fn set_amount(&mut self, value: f64, unit: Unit) -> Result<()> {
        self.current = unit.to_m3(value, self.area)?;
        Ok(())
    }

    pub fn set_previous(&mut self, value: f64, unit: Unit) -> Result<()> {
        self.previous = unit.to_m3(value, self.area)?;
        Ok(())
    }

    pub fn add(&mut self, value: f64, unit: Unit) -> Result<()> {
        self.current += unit.to_m3(value, self.area)?;
        Ok(())
    }

    pub fn remove(&mut self, value: f64, unit: Unit) -> Result<()> {
        self.current -= unit.to_m3(value, self.area)?;
        Ok(())
    }

    /// Change over the timestep (current − previous) in `unit`.
    pub fn change(&self, unit: Unit) -> Result<f64> {
        unit.from_m3(self.current - self.previous, self.area)
    }

    /// Commit the current amount as the new previous amount.
    pub fn advance(&mut self) {
        self.previous = self.current;
    }

    /// Check `0 − tol ≤ current ≤ capacity + tol` (tolerance in m3).
    pub fn validate_bounds(&self, tol: f64) -> Result<()> {
        if self.current < -tol || self.current > self.capacity + tol {
            return Err(ModelError::StorageBounds {
                storage: self.name,
                amount: self.current,
                capacity: self.capacity,
            });
        }
        Ok(())
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

    #[test]
    fn set_and_read_across_units() {
        let mut s = Storage::new("interception", 100.0, 5.0, Unit::Mm).unwrap();
        s.set_amount(3.0, Unit::Mm).unwrap();
        assert_approx(s.amount(Unit::Mm).unwrap(), 3.0, 1e-12);
        assert_approx(s.amount(Unit::M3).unwrap(), 0.3, 1e-12);
        assert_approx(s.amount(Unit::L).unwrap(), 300.0, 1e-12);
    }

    #[test]
    fn add_remove_change() {
        let mut s = Storage::new("tank", 0.0, 2.0, Unit::M3).unwrap();
        s.set_previous(0.5, Unit::M3).unwrap();
        s.set_amount(0.5, Unit::M3).unwrap();
        s.add(400.0, Unit::L).unwrap();
        s.remove(0.1, Unit::M3).unwrap();
        assert_approx(s.amount(Unit::M3).unwrap(), 0.8, 1e-12);
        assert_approx(s.change(Unit::M3).unwrap(), 0.3, 1e-12);
    }

    #[test]
    fn advance_commits_current() {
        let mut s = Storage::new("tank", 0.0, 2.0, Unit::M3).unwrap();
        s.set_amount(1.2, Unit::M3).unwrap();
        s.advance();
        assert_approx(s.previous(Unit::M3).unwrap(), 1.2, 1e-12);
        assert_approx(s.change(Unit::M3).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn depth_capacity_needs_area() {
        assert!(Storage::new("interception", 0.0, 5.0, Unit::Mm).is_err());
    }

    #[test]
    fn headroom_never_negative() {
        let mut s = Storage::new("tank", 0.0, 1.0, Unit::M3).unwrap();
        s.set_amount(1.5, Unit::M3).unwrap();
        assert_approx(s.headroom(Unit::M3).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn bounds_validation() {
        let mut s = Storage::new("tank", 0.0, 1.0, Unit::M3).unwrap();
        s.set_amount(1.0 + 1e-12, Unit::M3).unwrap();
        assert!(s.validate_bounds(1e-10).is_ok());
        s.set_amount(1.1, Unit::M3).unwrap();
        assert!(s.validate_bounds(1e-10).is_err());
    }

    #[test]
    fn unbounded_storage_has_infinite_capacity() {
        let s = Storage::unbounded("groundwater", 250.0);
        assert!(s.capacity(Unit::M3).unwrap().is_infinite());
        assert!(s.headroom(Unit::Mm).unwrap().is_infinite());
    }
}
