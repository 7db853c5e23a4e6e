use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::config::RoomsConfig;

/// One row of the room/rate mapping table: a PMS room category tied to the
/// channel manager's room-type and rate-plan ids, with the display metadata
/// pushed to the OTA side.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMapping {
    pub category: String,
    pub room_type_id: String,
    pub rate_plan_id: String,
    pub title: String,
    pub base_price: Decimal,
    pub max_occupancy: u32,
    /// Fallback inventory count pushed when live availability is unknown.
    pub availability: u32,
}

/// Immutable lookup table built from configuration at startup. Config
/// validation guarantees categories and external ids are unique and that
/// the default category exists.
#[derive(Debug, Clone)]
pub struct RoomMappingTable {
    mappings: Vec<RoomMapping>,
    by_category: HashMap<String, usize>,
    by_room_type_id: HashMap<String, usize>,
    default_index: usize,
    pub currency: String,
}

impl RoomMappingTable {
    pub fn from_config(config: &RoomsConfig) -> Self {
        let mappings: Vec<RoomMapping> = config
            .mappings
            .iter()
            .map(|entry| RoomMapping {
                category: entry.category.clone(),
                room_type_id: entry.room_type_id.clone(),
                rate_plan_id: entry.rate_plan_id.clone(),
                title: entry.title.clone(),
                base_price: entry.base_price,
                max_occupancy: entry.max_occupancy,
                availability: entry.availability,
            })
            .collect();

        let mut by_category = HashMap::new();
        let mut by_room_type_id = HashMap::new();
        for (index, mapping) in mappings.iter().enumerate() {
            by_category.insert(mapping.category.clone(), index);
            by_room_type_id.insert(mapping.room_type_id.clone(), index);
        }

        let default_index = by_category
            .get(config.default_category.as_str())
            .copied()
            .unwrap_or(0);

        Self {
            mappings,
            by_category,
            by_room_type_id,
            default_index,
            currency: config.currency.clone(),
        }
    }

    pub fn lookup_by_category(&self, category: &str) -> Option<&RoomMapping> {
        self.by_category
            .get(category)
            .map(|&index| &self.mappings[index])
    }

    pub fn lookup_by_room_type_id(&self, room_type_id: &str) -> Option<&RoomMapping> {
        self.by_room_type_id
            .get(room_type_id)
            .map(|&index| &self.mappings[index])
    }

    /// The category inbound conversion falls back to when a payload carries
    /// an unmapped room-type id. Inbound payloads are never dropped over an
    /// unknown room.
    pub fn default_mapping(&self) -> &RoomMapping {
        &self.mappings[self.default_index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoomMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomMappingEntry;

    fn sample_config() -> RoomsConfig {
        RoomsConfig {
            currency: "USD".to_string(),
            default_category: "standard".to_string(),
            mappings: vec![
                RoomMappingEntry {
                    category: "standard".to_string(),
                    room_type_id: "rt-std".to_string(),
                    rate_plan_id: "rp-std".to_string(),
                    title: "Standard Room".to_string(),
                    base_price: Decimal::new(10000, 2),
                    max_occupancy: 2,
                    availability: 5,
                },
                RoomMappingEntry {
                    category: "suite".to_string(),
                    room_type_id: "rt-ste".to_string(),
                    rate_plan_id: "rp-ste".to_string(),
                    title: "Suite".to_string(),
                    base_price: Decimal::new(25000, 2),
                    max_occupancy: 4,
                    availability: 2,
                },
            ],
        }
    }

    #[test]
    fn lookups_resolve_both_directions() {
        let table = RoomMappingTable::from_config(&sample_config());

        let by_category = table.lookup_by_category("suite").expect("suite exists");
        assert_eq!(by_category.room_type_id, "rt-ste");

        let by_room_type = table
            .lookup_by_room_type_id("rt-std")
            .expect("rt-std exists");
        assert_eq!(by_room_type.category, "standard");

        assert!(table.lookup_by_category("penthouse").is_none());
        assert!(table.lookup_by_room_type_id("rt-xyz").is_none());
    }

    #[test]
    fn default_mapping_is_the_configured_category() {
        let table = RoomMappingTable::from_config(&sample_config());
        assert_eq!(table.default_mapping().category, "standard");
    }
}
