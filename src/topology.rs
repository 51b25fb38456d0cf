/// Grid topology: flow paths between cells and the computation order.
///
/// Each cell drains to at most one downstream cell and receives from a fixed
/// number of upstream slots set by the neighbour scheme (4, 6 or 8). The
/// resolver produces a deterministic order in which every cell appears after
/// all of its upstream neighbours.
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Deserialize;
use smallvec::SmallVec;

use crate::error::{ModelError, Result};

pub type CellId = u32;

/// Neighbour scheme of the grid: how many upstream slots a cell may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NeighbourScheme {
    /// Von Neumann neighbourhood (rook).
    D4,
    /// Hexagonal grid.
    D6,
    /// Moore neighbourhood (queen).
    D8,
}

impl NeighbourScheme {
    pub fn max_upstream(self) -> usize {
        match self {
            NeighbourScheme::D4 => 4,
            NeighbourScheme::D6 => 6,
            NeighbourScheme::D8 => 8,
        }
    }
}

/// One cell's routing row: where it drains and which cells drain into it.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowPath {
    pub id: CellId,
    /// Downstream cell; `None` marks a terminal (outlet) cell.
    pub down: Option<CellId>,
    /// Upstream neighbours, at most `scheme.max_upstream()` entries.
    #[serde(default)]
    pub up: SmallVec<[CellId; 8]>,
}

/// Validated flow path table.
#[derive(Debug, Clone)]
pub struct Topology {
    paths: BTreeMap<CellId, FlowPath>,
    scheme: NeighbourScheme,
}

impl Topology {
    /// Validate and index a flow path table.
    ///
    /// Checks slot counts against the scheme, that every referenced cell
    /// exists, and that `down` and `up` agree (a drains to b exactly when
    /// b lists a upstream).
    pub fn new(paths: Vec<FlowPath>, scheme: NeighbourScheme) -> Result<Self> {
        let mut index = BTreeMap::new();
        for path in paths {
            if path.up.len() > scheme.max_upstream() {
                return Err(ModelError::TooManyUpstream {
                    cell: path.id,
                    got: path.up.len(),
                    max: scheme.max_upstream(),
                });
            }
            index.insert(path.id, path);
        }

        for path in index.values() {
            for &up in &path.up {
                let up_path = index.get(&up).ok_or(ModelError::UnknownCell(up))?;
                if up_path.down != Some(path.id) {
                    return Err(ModelError::invalid_param(
                        path.id,
                        "up",
                        format!("cell {up} is listed upstream but does not drain here"),
                    ));
                }
            }
            if let Some(down) = path.down {
                let down_path = index.get(&down).ok_or(ModelError::UnknownCell(down))?;
                if !down_path.up.contains(&path.id) {
                    return Err(ModelError::invalid_param(
                        path.id,
                        "down",
                        format!("drains to cell {down}, which does not list it upstream"),
                    ));
                }
            }
        }

        Ok(Self {
            paths: index,
            scheme,
        })
    }

    pub fn scheme(&self) -> NeighbourScheme {
        self.scheme
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.paths.contains_key(&cell)
    }

    pub fn path(&self, cell: CellId) -> Result<&FlowPath> {
        self.paths.get(&cell).ok_or(ModelError::UnknownCell(cell))
    }

    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.paths.keys().copied()
    }

    pub fn downstream(&self, cell: CellId) -> Option<CellId> {
        self.paths.get(&cell).and_then(|p| p.down)
    }

    pub fn upstream(&self, cell: CellId) -> &[CellId] {
        self.paths.get(&cell).map(|p| p.up.as_slice()).unwrap_or(&[])
    }

    /// Terminal cells (no downstream), in id order.
    pub fn outlets(&self) -> Vec<CellId> {
        self.paths
            .values()
            .filter(|p| p.down.is_none())
            .map(|p| p.id)
            .collect()
    }

    /// Resolve the computation order.
    ///
    /// Headwater cells (no upstream neighbours) seed a ready queue in id
    /// order. After a cell is placed, its downstream cell is placed eagerly
    /// when the placed cell was the last missing parent; otherwise the
    /// downstream cell waits in a pending set that is re-scanned whenever
    /// the ready queue drains. Any cells left unplaced sit on a cycle, which
    /// is fatal.
    pub fn resolve_order(&self) -> Result<Vec<CellId>> {
        let mut order = Vec::with_capacity(self.paths.len());
        let mut placed: BTreeSet<CellId> = BTreeSet::new();
        let mut pending: BTreeSet<CellId> = BTreeSet::new();

        let mut ready: VecDeque<CellId> = self
            .paths
            .values()
            .filter(|p| p.up.is_empty())
            .map(|p| p.id)
            .collect();

        loop {
            while let Some(cell) = ready.pop_front() {
                if !placed.insert(cell) {
                    continue;
                }
                order.push(cell);
                pending.remove(&cell);

                if let Some(down) = self.downstream(cell) {
                    if placed.contains(&down) {
                        continue;
                    }
                    if self.upstream(down).iter().all(|u| placed.contains(u)) {
                        // Last parent placed: continue the chain eagerly.
                        ready.push_front(down);
                    } else {
                        pending.insert(down);
                    }
                }
            }

            // Confluences whose parents completed while they waited.
            let unblocked: Vec<CellId> = pending
                .iter()
                .copied()
                .filter(|&c| self.upstream(c).iter().all(|u| placed.contains(u)))
                .collect();
            if unblocked.is_empty() {
                break;
            }
            ready.extend(unblocked);
        }

        if order.len() != self.paths.len() {
            let stuck: Vec<CellId> = self
                .paths
                .keys()
                .copied()
                .filter(|c| !placed.contains(c))
                .collect();
            return Err(ModelError::CyclicTopology(stuck));
        }
        Ok(order)
    }
}
