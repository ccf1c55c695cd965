/// Client Capability
///
/// Abstract JSON-RPC access to an Ethereum-compatible node. Modeled as a
/// trait (capability interface) rather than a struct hierarchy so the
/// processing pipeline can run against a fake in tests (spec §9).
use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::types::{Block, Header, Receipt};

pub mod geth;

#[async_trait]
pub trait Client: Send + Sync {
    async fn get_block_by_hash(&self, hash: &str, full_tx: bool) -> Result<Header, AppError>;
    async fn get_block_by_number(&self, number: u64, full_tx: bool) -> Result<Block, AppError>;
    async fn get_tx_receipt(&self, hash: &str) -> Result<Receipt, AppError>;
    async fn batch_get_receipts(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, Receipt>, AppError>;
    async fn get_chain_id(&self) -> Result<u64, AppError>;
    async fn get_block_number(&self) -> Result<u64, AppError>;

    /// Opens the push subscription and returns a channel of decoded headers.
    /// The Head Source treats subscription end or error as a signal to fall
    /// back to polling (spec §4.5).
    async fn subscribe_new_heads(
        &self,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<Header, AppError>>, AppError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory stand-in for a node, used by every module's tests that need
    /// a `Client` without talking to the network.
    #[derive(Default)]
    pub struct FakeClient {
        blocks_by_hash: HashMap<String, Header>,
        blocks_by_number: HashMap<u64, Block>,
        receipts: HashMap<String, Receipt>,
        chain_id: u64,
        head_number: Mutex<u64>,
        subscribed_heads: Vec<Header>,
    }

    impl FakeClient {
        pub fn new() -> Self {
            FakeClient::default()
        }

        pub fn with_block_by_hash(mut self, hash: &str, header: Header) -> Self {
            self.blocks_by_hash.insert(hash.to_string(), header);
            self
        }

        pub fn with_block_by_number(mut self, number: u64, block: Block) -> Self {
            self.blocks_by_number.insert(number, block);
            self
        }

        pub fn with_receipt(mut self, hash: &str, receipt: Receipt) -> Self {
            self.receipts.insert(hash.to_string(), receipt);
            self
        }

        pub fn with_head_number(self, n: u64) -> Self {
            *self.head_number.lock().unwrap() = n;
            self
        }

        /// Simulates the chain tip advancing by one on each poll, matching
        /// the concrete scenario used to exercise the head source's fallback.
        pub fn advance_head(&self) -> u64 {
            let mut n = self.head_number.lock().unwrap();
            *n += 1;
            *n
        }

        pub fn with_subscribed_head(mut self, header: Header) -> Self {
            self.subscribed_heads.push(header);
            self
        }
    }

    #[async_trait]
    impl Client for FakeClient {
        async fn get_block_by_hash(&self, hash: &str, _full_tx: bool) -> Result<Header, AppError> {
            self.blocks_by_hash
                .get(hash)
                .cloned()
                .ok_or_else(|| AppError::Transport(format!("no such block hash {hash}")))
        }

        async fn get_block_by_number(&self, number: u64, _full_tx: bool) -> Result<Block, AppError> {
            self.blocks_by_number
                .get(&number)
                .cloned()
                .ok_or_else(|| AppError::Transport(format!("no such block number {number}")))
        }

        async fn get_tx_receipt(&self, hash: &str) -> Result<Receipt, AppError> {
            self.receipts
                .get(hash)
                .cloned()
                .ok_or_else(|| AppError::Transport(format!("no such receipt {hash}")))
        }

        async fn batch_get_receipts(
            &self,
            hashes: &[String],
        ) -> Result<HashMap<String, Receipt>, AppError> {
            let mut out = HashMap::new();
            for h in hashes {
                if let Some(r) = self.receipts.get(h) {
                    out.insert(h.clone(), r.clone());
                }
            }
            Ok(out)
        }

        async fn get_chain_id(&self) -> Result<u64, AppError> {
            Ok(self.chain_id)
        }

        async fn get_block_number(&self) -> Result<u64, AppError> {
            Ok(self.advance_head())
        }

        /// Sends every pre-loaded header then closes the channel, simulating
        /// either a working subscription (non-empty) or one that "returns
        /// nothing" (empty) per the concrete head-source scenario.
        async fn subscribe_new_heads(
            &self,
        ) -> Result<tokio::sync::mpsc::Receiver<Result<Header, AppError>>, AppError> {
            let (tx, rx) = tokio::sync::mpsc::channel(self.subscribed_heads.len().max(1));
            for header in &self.subscribed_heads {
                let _ = tx.send(Ok(header.clone())).await;
            }
            Ok(rx)
        }
    }
}
