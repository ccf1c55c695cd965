/// Address Matcher
///
/// Built once from a watch-list map and never mutated afterward, so it is
/// safe to share across tasks behind an `Arc` with no locking (spec §5).
use std::collections::HashMap;

use crate::errors::AppError;
use crate::types::parse_hex_bytes;

/// Immutable `20-byte address -> user id` lookup.
pub struct Matcher {
    users: HashMap<[u8; 20], String>,
}

impl Matcher {
    /// Build from a `hex-address -> user-id` map, e.g. loaded from a CSV
    /// watch-list file. Keys are normalized (case-insensitive) before storage.
    pub fn new(addresses: &HashMap<String, String>) -> Result<Self, AppError> {
        let mut users = HashMap::with_capacity(addresses.len());
        for (addr, uid) in addresses {
            let bytes = parse_hex_bytes(addr)?;
            if bytes.len() != 20 {
                return Err(AppError::Decode(format!(
                    "watch-list address '{addr}' is not 20 bytes"
                )));
            }
            let mut key = [0u8; 20];
            key.copy_from_slice(&bytes);
            users.insert(key, uid.clone());
        }
        Ok(Matcher { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// A malformed address is treated as "not watched", not an error — a bad
    /// byte on one transaction must not stop the block it lives in from
    /// being processed.
    fn lookup(&self, addr: &str) -> String {
        let bytes = match parse_hex_bytes(addr) {
            Ok(b) => b,
            Err(_) => return String::new(),
        };
        if bytes.len() != 20 {
            return String::new();
        }
        let mut key = [0u8; 20];
        key.copy_from_slice(&bytes);
        self.users.get(&key).cloned().unwrap_or_default()
    }

    /// Returns `(from_uid, to_uid, any_hit)`. Either uid is empty when that
    /// side isn't watched. `any_hit` is true iff at least one side matched.
    pub fn match_tx(&self, from: &str, to: Option<&str>) -> (String, String, bool) {
        let from_uid = self.lookup(from);
        let to_uid = match to {
            Some(addr) => self.lookup(addr),
            None => String::new(),
        };
        let any_hit = !from_uid.is_empty() || !to_uid.is_empty();
        (from_uid, to_uid, any_hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> String {
        format!("0x{:040x}", n)
    }

    #[test]
    fn matches_case_insensitively() {
        let mut map = HashMap::new();
        map.insert(addr(0xA).to_uppercase(), "u1".to_string());
        let m = Matcher::new(&map).unwrap();

        let (from_uid, to_uid, hit) = m.match_tx(&addr(0xA), Some(&addr(0xB)));
        assert_eq!(from_uid, "u1");
        assert_eq!(to_uid, "");
        assert!(hit);
    }

    #[test]
    fn no_match_on_untracked_addresses() {
        let map = HashMap::new();
        let m = Matcher::new(&map).unwrap();
        let (from_uid, to_uid, hit) = m.match_tx(&addr(1), Some(&addr(2)));
        assert_eq!(from_uid, "");
        assert_eq!(to_uid, "");
        assert!(!hit);
    }

    #[test]
    fn both_sides_can_match() {
        let mut map = HashMap::new();
        map.insert(addr(1), "u1".to_string());
        map.insert(addr(2), "u2".to_string());
        let m = Matcher::new(&map).unwrap();
        let (from_uid, to_uid, hit) = m.match_tx(&addr(1), Some(&addr(2)));
        assert_eq!(from_uid, "u1");
        assert_eq!(to_uid, "u2");
        assert!(hit);
    }

    #[test]
    fn no_recipient_means_empty_to_uid() {
        let mut map = HashMap::new();
        map.insert(addr(1), "u1".to_string());
        let m = Matcher::new(&map).unwrap();
        let (from_uid, to_uid, hit) = m.match_tx(&addr(1), None);
        assert_eq!(from_uid, "u1");
        assert_eq!(to_uid, "");
        assert!(hit);
    }

    #[test]
    fn malformed_address_is_treated_as_not_watched() {
        let mut map = HashMap::new();
        map.insert(addr(1), "u1".to_string());
        let m = Matcher::new(&map).unwrap();
        let (from_uid, to_uid, hit) = m.match_tx("not-hex", Some(&addr(1)));
        assert_eq!(from_uid, "");
        assert_eq!(to_uid, "u1");
        assert!(hit);
    }
}
