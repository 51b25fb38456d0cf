/// The per-cell component pipeline.
///
/// Components solve in a fixed order within a timestep (roof through
/// wastewater, see [`crate::flows::ComponentId::ALL`]): each one reads the
/// inflows earlier components wrote into the cell's flow network, updates its
/// own storage, and writes its outflows for the components downstream of it.
pub mod groundwater;
pub mod pavement;
pub mod pervious;
pub mod raintank;
pub mod reuse;
pub mod roof;
pub mod stormwater;
pub mod vadose;
pub mod wastewater;

pub use groundwater::Groundwater;
pub use pavement::Pavement;
pub use pervious::Pervious;
pub use raintank::Raintank;
pub use reuse::Reuse;
pub use roof::Roof;
pub use stormwater::Stormwater;
pub use vadose::Vadose;
pub use wastewater::Wastewater;
