/// Model spin-up: cyclic warm runs until the slow states settle.
///
/// The groundwater level and the soil moisture carry the memory of their
/// initial values for a long time. Spinning up repeats (at most a year of)
/// the forcing until the relative change of those states between cycles
/// drops below the convergence threshold, leaving the model in a state
/// consistent with its climate instead of its initial guess.
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::error::Result;
use crate::forcing::ForcingData;
use crate::model::UrbanWaterModel;
use crate::run::{advance_timestep, commit, empty_routing};
use crate::units::Unit;

#[derive(Debug, Clone)]
pub struct SpinupOptions {
    /// Upper bound on warm-up cycles.
    pub max_cycles: usize,
    /// Convergence threshold on the relative state change per cycle.
    pub threshold: f64,
    /// Seed of the distribution draws during warm-up.
    pub seed: u64,
}

impl Default for SpinupOptions {
    fn default() -> Self {
        Self {
            max_cycles: 20,
            threshold: 0.01,
            seed: 0,
        }
    }
}

/// Slow states of one cell, compared across cycles.
#[derive(Debug, Clone, Copy)]
struct SlowState {
    water_level: f64,
    surface_water_level: f64,
    moisture: f64,
}

fn snapshot(model: &UrbanWaterModel) -> Result<Vec<SlowState>> {
    let mut states = Vec::new();
    for (_, cell) in model.cells() {
        states.push(SlowState {
            water_level: cell.state.groundwater.water_level,
            surface_water_level: cell.state.groundwater.surface_water_level,
            moisture: cell.state.vadose.amount(Unit::M3)?,
        });
    }
    Ok(states)
}

fn relative_change(before: f64, after: f64) -> f64 {
    (after - before).abs() / before.abs().max(1e-6)
}

/// Run warm-up cycles until convergence; returns the number of cycles run.
///
/// At most the first year of the forcing is repeated each cycle.
pub fn spin_up(
    model: &mut UrbanWaterModel,
    forcing: &ForcingData,
    options: &SpinupOptions,
) -> Result<usize> {
    let steps = forcing.len().min(365);
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut routed = empty_routing(model);

    for cycle in 1..=options.max_cycles {
        let before = snapshot(model)?;

        for t in 0..steps {
            advance_timestep(model, forcing, t, &mut routed, &mut rng)?;
            commit(model)?;
        }

        let after = snapshot(model)?;
        let change = before
            .iter()
            .zip(after.iter())
            .map(|(b, a)| {
                relative_change(b.water_level, a.water_level)
                    .max(relative_change(
                        b.surface_water_level,
                        a.surface_water_level,
                    ))
                    .max(relative_change(b.moisture, a.moisture))
            })
            .fold(0.0, f64::max);

        info!(cycle, change, "spin-up cycle finished");
        if change < options.threshold {
            return Ok(cycle);
        }
    }

    warn!(
        cycles = options.max_cycles,
        "spin-up stopped before convergence"
    );
    Ok(options.max_cycles)
}
