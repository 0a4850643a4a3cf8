//! Agent state snapshots and the dig-time input bundle.
//!
//! The excavation core never reads live entity state; each tick it receives
//! an [`AgentSnapshot`] and derives the opaque [`DigContext`] the world
//! model's completion-time formula consumes.

use glam::Vec3;

/// Item type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u16);

/// An enchantment on a held or worn item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enchantment {
    /// Enchantment type.
    pub id: u16,
    /// Enchantment level.
    pub level: u8,
}

/// An active status effect on the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEffect {
    /// Effect type.
    pub id: u16,
    /// Effect amplifier.
    pub amplifier: u8,
}

/// A held or equipped item with its enchantments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Item type.
    pub id: ItemId,
    /// Enchantments on this item.
    pub enchantments: Vec<Enchantment>,
}

/// Point-in-time snapshot of the agent's state relevant to excavation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    /// Feet position in continuous space.
    pub position: Vec3,
    /// Eye height above the feet.
    pub eye_height: f32,
    /// Whether the agent is submerged in liquid.
    pub submerged: bool,
    /// Whether the agent has ground contact.
    pub on_ground: bool,
    /// Item in the active hand, if any.
    pub held_item: Option<Item>,
    /// Equipped headgear, if any. Its enchantments affect dig speed.
    pub headgear: Option<Item>,
    /// Active status effects.
    pub effects: Vec<StatusEffect>,
    /// Whether the agent is in creative mode.
    pub creative: bool,
}

impl AgentSnapshot {
    /// The agent's eye position in continuous space.
    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::new(0.0, self.eye_height, 0.0)
    }

    /// Assembles the inputs for the completion-time formula.
    ///
    /// Headgear enchantments are appended to the held item's because some
    /// (underwater mining speed) change the dig rate.
    pub fn dig_context(&self) -> DigContext {
        let tool = self.held_item.as_ref().map(|item| item.id);
        let mut enchantments = self
            .held_item
            .as_ref()
            .map(|item| item.enchantments.clone())
            .unwrap_or_default();
        if let Some(headgear) = &self.headgear {
            enchantments.extend_from_slice(&headgear.enchantments);
        }
        DigContext {
            tool,
            enchantments,
            creative: self.creative,
            submerged: self.submerged,
            airborne: !self.on_ground,
            effects: self.effects.clone(),
        }
    }
}

/// Opaque input bundle for the per-block completion-time formula.
///
/// The formula itself lives behind [`WorldView::dig_duration`]
/// (enchantment and tool-material math is out of scope here).
///
/// [`WorldView::dig_duration`]: crate::world::WorldView::dig_duration
#[derive(Debug, Clone, PartialEq)]
pub struct DigContext {
    /// Held tool type, if any.
    pub tool: Option<ItemId>,
    /// Held-item enchantments followed by headgear enchantments.
    pub enchantments: Vec<Enchantment>,
    /// Creative-mode flag.
    pub creative: bool,
    /// Submersion flag.
    pub submerged: bool,
    /// Whether the agent lacks ground contact.
    pub airborne: bool,
    /// Active status effects.
    pub effects: Vec<StatusEffect>,
}
