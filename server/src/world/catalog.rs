//! Read-only world catalog: rooms, monster templates, items and abilities.
//!
//! Loaded once at startup from `data/catalog.json` (or the configured path).
//! When no catalog file exists the built-in starter world is used instead.
//! After loading the catalog is shared behind an `Arc` and never mutated.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::{info, warn};
use mud_shared::{
    default_abilities, get_item_definitions, ActionDef, ActionKind, Archetype, ItemDef, LootEntry,
    MonsterTemplate, TargetType,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Static description of one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDef {
    pub name: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    /// Direction -> room id
    #[serde(default)]
    pub exits: BTreeMap<String, String>,
    /// Monster template ids spawned here at world init
    #[serde(default)]
    pub spawns: Vec<String>,
}

/// On-disk catalog layout
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    rooms: BTreeMap<String, RoomDef>,
    monsters: HashMap<String, MonsterTemplate>,
    items: Vec<ItemDef>,
    /// Archetype name -> ability kit
    abilities: HashMap<String, Vec<ActionDef>>,
}

/// Lookup tables for everything static in the world
#[derive(Debug, Clone)]
pub struct Catalog {
    rooms: BTreeMap<String, RoomDef>,
    templates: HashMap<String, MonsterTemplate>,
    /// Keyed by lowercase name
    items: HashMap<String, ItemDef>,
    abilities: HashMap<Archetype, Vec<ActionDef>>,
}

impl Catalog {
    /// Load the catalog file, falling back to the starter world if it is missing.
    ///
    /// A catalog that exists but cannot be parsed is a fatal error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let catalog = Self::from_json(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(
                    "Loaded catalog from {:?}: {} rooms, {} monster templates, {} items",
                    path,
                    catalog.rooms.len(),
                    catalog.templates.len(),
                    catalog.items.len()
                );
                Ok(catalog)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No catalog at {:?}, using the built-in world", path);
                Ok(Self::with_defaults())
            }
            Err(source) => Err(ConfigError::Io { path: path.to_path_buf(), source }),
        }
    }

    /// Parse a catalog from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let file: CatalogFile = serde_json::from_str(text)?;

        let mut abilities = HashMap::new();
        for (key, kit) in file.abilities {
            match Archetype::from_name(&key) {
                Some(archetype) => {
                    abilities.insert(archetype, kit);
                }
                None => warn!("Catalog lists abilities for unknown archetype {}", key),
            }
        }
        for archetype in Archetype::ALL {
            abilities.entry(archetype).or_insert_with(|| default_abilities(archetype));
        }

        let items = if file.items.is_empty() {
            get_item_definitions()
        } else {
            file.items
        };

        Ok(Self {
            rooms: file.rooms,
            templates: file.monsters,
            items: items.into_iter().map(|i| (i.name.to_lowercase(), i)).collect(),
            abilities,
        })
    }

    /// Built-in starter world
    pub fn with_defaults() -> Self {
        let mut rooms = BTreeMap::new();
        rooms.insert(
            "trade_district".to_string(),
            room(
                "Trade District",
                "Stalls crowd the cobbles and merchants call out prices. The city gate lies north.",
                &[("north", "city_gate")],
                &[],
            ),
        );
        rooms.insert(
            "city_gate".to_string(),
            room(
                "City Gate",
                "Weathered stone walls rise on either side of an iron-bound gate. A path leads east into the trees.",
                &[("south", "trade_district"), ("east", "whispering_woods")],
                &[],
            ),
        );
        rooms.insert(
            "whispering_woods".to_string(),
            room(
                "Whispering Woods",
                "Pale trunks lean together overhead. Something howls in the distance.",
                &[("west", "city_gate"), ("north", "forgotten_acacia")],
                &["moonwolf", "moonwolf"],
            ),
        );
        rooms.insert(
            "forgotten_acacia".to_string(),
            room(
                "Forgotten Acacia",
                "A lone acacia stands in a clearing ringed with burnt-out candles.",
                &[("south", "whispering_woods")],
                &["cultist"],
            ),
        );

        let mut templates = HashMap::new();
        templates.insert(
            "moonwolf".to_string(),
            MonsterTemplate {
                aggressive: true,
                loot: vec![LootEntry { item: "Wolf Pelt".into(), chance: 40 }],
                respawn_secs: 45,
                skills: vec![ActionDef::new("bite", "Bite", ActionKind::Damage)
                    .amount(6)
                    .cooldown(6)],
                ..MonsterTemplate::new("Moonwolf", 45, 7, 1)
            },
        );
        templates.insert(
            "cultist".to_string(),
            MonsterTemplate {
                aggressive: false,
                loot: vec![
                    LootEntry { item: "Cult Robe".into(), chance: 15 },
                    LootEntry { item: "Rusty Sword".into(), chance: 20 },
                ],
                respawn_secs: 60,
                skills: vec![
                    ActionDef::new("curse", "Curse", ActionKind::Dot)
                        .amount(4)
                        .timing(6, 1)
                        .cooldown(10),
                    ActionDef::new("dark_mending", "Dark Mending", ActionKind::Hot)
                        .amount(5)
                        .timing(5, 1)
                        .targets(TargetType::SelfOnly)
                        .cooldown(15),
                ],
                ..MonsterTemplate::new("Cultist", 70, 9, 2)
            },
        );

        let abilities = Archetype::ALL
            .into_iter()
            .map(|a| (a, default_abilities(a)))
            .collect();

        let catalog = Self {
            rooms,
            templates,
            items: get_item_definitions()
                .into_iter()
                .map(|i| (i.name.to_lowercase(), i))
                .collect(),
            abilities,
        };
        info!(
            "Catalog initialized with {} rooms (hardcoded defaults)",
            catalog.rooms.len()
        );
        catalog
    }

    pub fn room(&self, id: &str) -> Option<&RoomDef> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = (&String, &RoomDef)> {
        self.rooms.iter()
    }

    pub fn template(&self, id: &str) -> Option<&MonsterTemplate> {
        self.templates.get(id)
    }

    /// Item lookup by case-insensitive exact name
    pub fn item(&self, name: &str) -> Option<&ItemDef> {
        self.items.get(&name.to_lowercase())
    }

    pub fn abilities_for(&self, archetype: Archetype) -> &[ActionDef] {
        self.abilities.get(&archetype).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ability by id or name, case-insensitive
    pub fn find_ability(&self, archetype: Archetype, query: &str) -> Option<&ActionDef> {
        self.abilities_for(archetype).iter().find(|a| a.matches(query))
    }
}

fn room(name: &str, description: &str, exits: &[(&str, &str)], spawns: &[&str]) -> RoomDef {
    RoomDef {
        name: name.to_string(),
        description: description.to_string(),
        exits: exits
            .iter()
            .map(|(dir, to)| (dir.to_string(), to.to_string()))
            .collect(),
        spawns: spawns.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_world_is_consistent() {
        let catalog = Catalog::with_defaults();
        for (id, room) in catalog.rooms() {
            for target in room.exits.values() {
                assert!(catalog.room(target).is_some(), "{} exits to missing {}", id, target);
            }
            for spawn in &room.spawns {
                assert!(catalog.template(spawn).is_some(), "{} spawns missing {}", id, spawn);
            }
        }
        assert!(catalog.room("trade_district").is_some());
    }

    #[test]
    fn test_item_lookup_ignores_case() {
        let catalog = Catalog::with_defaults();
        assert_eq!(catalog.item("rusty sword").map(|i| i.value), Some(12));
        assert!(catalog.item("Excalibur").is_none());
    }

    #[test]
    fn test_json_catalog_fills_missing_kits() {
        let json = r#"{
            "rooms": {
                "den": {"name": "Den", "desc": "Dark.", "spawns": ["rat"]}
            },
            "monsters": {
                "rat": {"name": "Rat", "health": 10, "aggressive": true, "respawn_secs": 5}
            },
            "abilities": {
                "mage": [{"id": "zap", "name": "Zap", "type": "damage", "amount": 3}]
            }
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.room("den").map(|r| r.description.as_str()), Some("Dark."));
        assert_eq!(catalog.template("rat").map(|t| t.health), Some(10));
        assert_eq!(catalog.abilities_for(Archetype::Mage).len(), 1);
        assert!(catalog.find_ability(Archetype::Warrior, "cleave").is_some());
        assert!(catalog.item("Buckler").is_some());
    }

    #[test]
    fn test_malformed_catalog_is_fatal() {
        assert!(Catalog::from_json("{\"rooms\": 3}").is_err());
    }
}
