//! The world-model collaborator seam.
//!
//! The excavation core consumes the world through [`WorldView`]: block
//! lookups, raycasts for face resolution, and the opaque completion-time
//! oracle. Chunk storage, block metadata, and the dig-time formula itself
//! all live behind this trait.

use std::time::Duration;

use glam::Vec3;

use crate::agent::DigContext;
use crate::block::{Block, BlockFace, BlockPos};

/// Result of a successful world raycast.
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastHit {
    /// The cell of the block that was hit.
    pub position: BlockPos,
    /// The face of that block the ray entered through.
    pub face: BlockFace,
    /// Exact intersection point on that face.
    pub intersect: Vec3,
}

/// Completion-time estimate for one block under current conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DigDuration {
    /// The block completes after this much continuous digging.
    Finite(Duration),
    /// The block cannot be excavated under current conditions (wrong tool,
    /// unbreakable block). Treated as a transient condition by the caller.
    Infeasible,
}

/// Read access to the world model.
pub trait WorldView {
    /// Returns the block at `pos`, or `None` if the position is unloaded.
    fn block_at(&self, pos: BlockPos) -> Option<Block>;

    /// Casts a ray and returns the first solid intersection within
    /// `max_distance`, or `None`. `direction` must be normalized.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit>;

    /// Evaluates the completion-time formula for `block` under the given
    /// conditions. Re-queried every tick because the context changes mid-dig.
    fn dig_duration(&self, block: &Block, ctx: &DigContext) -> DigDuration;
}
