//! First-run dataset so a fresh journal is never empty.

use crate::entry::LogEntry;

const SEED_JSON: &str = include_str!("../assets/seed.json");

pub fn bundled_seed() -> Vec<LogEntry> {
    serde_json::from_str(SEED_JSON).expect("bundled seed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn seed_has_ten_schema_valid_entries() {
        let seed = bundled_seed();
        assert_eq!(seed.len(), 10);
        let catalog = Catalog::builtin();
        for entry in &seed {
            let condition = catalog.get(&entry.condition_id).expect("known condition");
            condition
                .validate(&entry.data)
                .unwrap_or_else(|err| panic!("{} invalid: {}", entry.id, err));
        }
    }

    #[test]
    fn seed_ids_are_unique() {
        let seed = bundled_seed();
        let ids: std::collections::HashSet<&str> = seed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), seed.len());
    }
}
