//! Item definitions.

use serde::{Deserialize, Serialize};

use crate::StatModifiers;

/// Item definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub description: String,
    /// Stat bundle granted while equipped
    #[serde(default, alias = "mod")]
    pub modifiers: StatModifiers,
    /// Nominal worth in obols
    #[serde(default)]
    pub value: u32,
}

/// Item types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Weapon,
    ArmorSet,
    Shield,
    #[default]
    Misc,
}

impl ItemType {
    /// Equipment slot this item occupies, if it can be equipped at all
    pub fn slot(&self) -> Option<EquipSlot> {
        match self {
            Self::Weapon => Some(EquipSlot::Weapon),
            Self::ArmorSet => Some(EquipSlot::Set),
            Self::Shield => Some(EquipSlot::Shield),
            Self::Misc => None,
        }
    }
}

/// Equipment slots on a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipSlot {
    Weapon,
    Set,
    Shield,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 3] = [Self::Weapon, Self::Set, Self::Shield];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Set => "set",
            Self::Shield => "shield",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.name() == value)
    }
}

/// Built-in item definitions for the starter world
pub fn get_item_definitions() -> Vec<ItemDef> {
    vec![
        ItemDef {
            name: "Rusty Sword".into(),
            item_type: ItemType::Weapon,
            description: "A worn blade. Better than nothing.".into(),
            modifiers: StatModifiers::power(3),
            value: 12,
        },
        ItemDef {
            name: "Wolf Pelt".into(),
            item_type: ItemType::Misc,
            description: "Thick grey fur, still smelling of the woods.".into(),
            modifiers: StatModifiers::default(),
            value: 4,
        },
        ItemDef {
            name: "Leather Set".into(),
            item_type: ItemType::ArmorSet,
            description: "Stitched jerkin, bracers and boots.".into(),
            modifiers: StatModifiers { defense: 2, max_health: 10, ..StatModifiers::default() },
            value: 20,
        },
        ItemDef {
            name: "Buckler".into(),
            item_type: ItemType::Shield,
            description: "A small round shield.".into(),
            modifiers: StatModifiers::defense(2),
            value: 10,
        },
        ItemDef {
            name: "Cult Robe".into(),
            item_type: ItemType::ArmorSet,
            description: "Black cloth embroidered with a lidless eye.".into(),
            modifiers: StatModifiers { power: 2, max_health: 5, ..StatModifiers::default() },
            value: 18,
        },
    ]
}
