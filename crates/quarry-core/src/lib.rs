//! Shared domain types for the excavation core: block grid primitives, agent
//! state snapshots, and the collaborator trait seams (world model, viewpoint).

pub mod agent;
pub mod block;
pub mod view;
pub mod world;

pub use agent::{AgentSnapshot, DigContext, Enchantment, Item, ItemId, StatusEffect};
pub use block::{Block, BlockFace, BlockId, BlockPos};
pub use view::{Presentation, PresentationError};
pub use world::{DigDuration, RaycastHit, WorldView};
