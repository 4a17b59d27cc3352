//! Story progress flags.
//!
//! Stages write flags as a record of what happened; nothing gates on them yet.
use std::collections::HashMap;

use bevy::prelude::*;

#[derive(Resource, Debug, Clone, Default)]
pub struct Flags {
    flags: HashMap<String, bool>,
}

impl Flags {
    /// Seeds the store from a copy of `initial`.
    pub fn new(initial: &HashMap<String, bool>) -> Self {
        Self {
            flags: initial.clone(),
        }
    }

    /// Unknown flags read as unset.
    pub fn get(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    pub fn set(&mut self, key: &str) {
        self.set_to(key, true);
    }

    pub fn set_to(&mut self, key: &str, value: bool) {
        debug!("flag {key} = {value}");
        self.flags.insert(key.to_string(), value);
    }

    pub fn all(&self) -> HashMap<String, bool> {
        self.flags.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Flags {
        Flags::new(&HashMap::from([("a".to_string(), true)]))
    }

    #[test]
    fn unknown_flag_reads_false() {
        let flags = seeded();
        assert!(flags.get("a"));
        assert!(!flags.get("b"));
    }

    #[test]
    fn set_defaults_to_true() {
        let mut flags = seeded();
        flags.set("b");
        assert!(flags.get("b"));
        flags.set_to("b", false);
        assert!(!flags.get("b"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let flags = seeded();
        let mut snapshot = flags.all();
        snapshot.insert("a".to_string(), false);
        snapshot.insert("c".to_string(), true);
        assert!(flags.get("a"));
        assert!(!flags.get("c"));
    }

    #[test]
    fn seed_is_copied() {
        let mut seed = HashMap::from([("a".to_string(), true)]);
        let flags = Flags::new(&seed);
        seed.insert("a".to_string(), false);
        assert!(flags.get("a"));
    }
}
