/// Watch-List Loader
///
/// Reads the `<address>,<user_id>` CSV file (spec §6) into the plain map the
/// Matcher is constructed from. File loading itself is an external
/// collaborator per spec §1; this module only owns the parsing.
use std::collections::HashMap;
use std::path::Path;

use crate::errors::AppError;

pub fn load_addresses(path: &Path) -> Result<HashMap<String, String>, AppError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Startup(format!("reading address file {path:?}: {e}")))?;
    parse_csv(&contents)
}

fn parse_csv(contents: &str) -> Result<HashMap<String, String>, AppError> {
    let mut out = HashMap::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if idx == 0 && line.to_lowercase().starts_with("address") {
            continue;
        }
        let mut parts = line.splitn(2, ',');
        let address = parts
            .next()
            .ok_or_else(|| AppError::Decode(format!("malformed address row: {line}")))?
            .trim();
        let user_id = parts
            .next()
            .ok_or_else(|| AppError::Decode(format!("malformed address row: {line}")))?
            .trim();
        if address.is_empty() || user_id.is_empty() {
            return Err(AppError::Decode(format!("malformed address row: {line}")));
        }
        out.insert(address.to_string(), user_id.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let csv = "address,user_id\n0xAAA,u1\n0xBBB,u2\n";
        let map = parse_csv(csv).unwrap();
        assert_eq!(map.get("0xAAA"), Some(&"u1".to_string()));
        assert_eq!(map.get("0xBBB"), Some(&"u2".to_string()));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn skips_blank_lines() {
        let csv = "address,user_id\n0xAAA,u1\n\n0xBBB,u2\n";
        let map = parse_csv(csv).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn rejects_malformed_row() {
        let csv = "address,user_id\n0xAAA\n";
        assert!(parse_csv(csv).is_err());
    }

    #[test]
    fn load_addresses_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.csv");
        std::fs::write(&path, "address,user_id\n0xAAA,u1\n").unwrap();
        let map = load_addresses(&path).unwrap();
        assert_eq!(map.get("0xAAA"), Some(&"u1".to_string()));
    }
}
