/// Matched Transaction Event
///
/// The stable wire shape published to the downstream event bus. Field names
/// match spec §6 exactly since they form the cross-language contract with
/// consumers.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventHeader {
    pub id: String,
    pub event_name: String,
    pub correlation_id: String,
    pub published_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchedTxEvent {
    pub header: EventHeader,
    pub user_id: String,
    pub address: String,
    pub direction: Direction,
    pub tx_hash: String,
    pub block_number: u64,
    pub block_time: i64,
    pub from: String,
    pub to: Option<String>,
    pub amount_wei: String,
    pub amount_eth: String,
    pub fee_wei: String,
    pub fee_eth: String,
    pub status: String,
    pub chain_id: u64,
    pub reorged: bool,
}

impl MatchedTxEvent {
    /// Builds a fresh envelope (new id, new `published_at`) each call, per
    /// spec §4.6 step 6.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        address: String,
        direction: Direction,
        tx_hash: String,
        block_number: u64,
        block_time: i64,
        from: String,
        to: Option<String>,
        amount_wei: String,
        amount_eth: String,
        fee_wei: String,
        fee_eth: String,
        status: String,
        chain_id: u64,
        reorged: bool,
    ) -> Self {
        MatchedTxEvent {
            header: EventHeader {
                id: Uuid::new_v4().to_string(),
                event_name: "MatchedTxEvent".to_string(),
                correlation_id: String::new(),
                published_at: chrono::Utc::now().to_rfc3339(),
            },
            user_id,
            address,
            direction,
            tx_hash,
            block_number,
            block_time,
            from,
            to,
            amount_wei,
            amount_eth,
            fee_wei,
            fee_eth,
            status,
            chain_id,
            reorged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_direction_lowercase() {
        let json = serde_json::to_value(Direction::In).unwrap();
        assert_eq!(json, serde_json::json!("in"));
    }

    #[test]
    fn each_event_gets_a_fresh_id() {
        let a = MatchedTxEvent::new(
            "u1".into(),
            "0xa".into(),
            Direction::In,
            "0xtx".into(),
            1,
            0,
            "0xa".into(),
            Some("0xb".into()),
            "0".into(),
            "0.000000000000000000".into(),
            "0".into(),
            "0.000000000000000000".into(),
            "success".into(),
            1,
            false,
        );
        let b = MatchedTxEvent::new(
            "u1".into(),
            "0xa".into(),
            Direction::In,
            "0xtx".into(),
            1,
            0,
            "0xa".into(),
            Some("0xb".into()),
            "0".into(),
            "0.000000000000000000".into(),
            "0".into(),
            "0.000000000000000000".into(),
            "success".into(),
            1,
            false,
        );
        assert_ne!(a.header.id, b.header.id);
    }
}
