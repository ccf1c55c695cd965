/// Block Processor
///
/// Matches a block's transactions against the watch set, fetches receipts
/// (batched, with a bounded-concurrency fallback), computes fees/amounts in
/// wei and ETH, and publishes one event per matched side.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::errors::AppError;
use crate::events::{Direction, MatchedTxEvent};
use crate::matcher::Matcher;
use crate::metrics;
use crate::publisher::Publisher;
use crate::rpc::Client;
use crate::telemetry::truncate_hex;
use crate::types::{parse_integer, wei_to_eth, Block, Receipt, ReceiptStatus, Transaction};

/// Receipt batch fetch timeout (spec §4.6 step 4).
const BATCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-call timeout in the fallback path.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);
/// Concurrent fallback fetches in flight at once.
const FALLBACK_CONCURRENCY: usize = 8;
/// Retries per hash in the fallback path, matching the original's
/// `getReceiptWithRetry`.
const FALLBACK_RETRIES: u32 = 3;

pub struct Processor<C, P> {
    client: Arc<C>,
    matcher: Arc<Matcher>,
    publisher: Arc<P>,
    topic: String,
    chain_id: u64,
}

impl<C: Client, P: Publisher> Processor<C, P> {
    pub fn new(client: Arc<C>, matcher: Arc<Matcher>, publisher: Arc<P>, topic: String, chain_id: u64) -> Self {
        Processor {
            client,
            matcher,
            publisher,
            topic,
            chain_id,
        }
    }

    /// Processes a single finalized (or reorg-replayed) block. Returns the
    /// number of matched transactions.
    pub async fn process_block(&self, block: &Block, reorged: bool) -> Result<usize, AppError> {
        let mut matches: Vec<(Transaction, String, String)> = Vec::new();
        for tx in &block.txs {
            let (from_uid, to_uid, hit) = self.matcher.match_tx(&tx.from, tx.to.as_deref());
            if hit {
                matches.push((tx.clone(), from_uid, to_uid));
            }
        }
        if matches.is_empty() {
            return Ok(0);
        }

        let mut seen = std::collections::HashSet::new();
        let mut hashes = Vec::new();
        for (tx, _, _) in &matches {
            if seen.insert(tx.hash.clone()) {
                hashes.push(tx.hash.clone());
            }
        }

        let receipts = self.fetch_receipts(&hashes).await;
        metrics::observe_receipt_batch_size(hashes.len());

        for (tx, from_uid, to_uid) in &matches {
            let Some(receipt) = receipts.get(&tx.hash) else {
                tracing::warn!(tx_hash = %truncate_hex(&tx.hash, 10), "no receipt found, skipping match");
                continue;
            };
            self.emit_events(block, tx, from_uid, to_uid, receipt, reorged)
                .await;
        }

        metrics::record_blocks_processed();
        if reorged {
            metrics::record_block_reprocessed();
        }
        metrics::record_txs_matched(matches.len());

        Ok(matches.len())
    }

    async fn fetch_receipts(&self, hashes: &[String]) -> HashMap<String, Receipt> {
        let batch = tokio::time::timeout(BATCH_TIMEOUT, self.client.batch_get_receipts(hashes)).await;
        match batch {
            Ok(Ok(map)) if map.len() == hashes.len() => {
                metrics::record_rpc_call("batch_get_receipts", "ok");
                return map;
            }
            Ok(Ok(_)) | Ok(Err(_)) | Err(_) => {
                metrics::record_rpc_call("batch_get_receipts", "err");
            }
        }
        self.fetch_receipts_fallback(hashes).await
    }

    /// Bounded-concurrency per-hash fallback, each call retried with
    /// doubling backoff before being skipped as best-effort.
    async fn fetch_receipts_fallback(&self, hashes: &[String]) -> HashMap<String, Receipt> {
        let semaphore = Arc::new(Semaphore::new(FALLBACK_CONCURRENCY));
        let tasks = hashes.iter().cloned().map(|hash| {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                fetch_one_with_retry(client.as_ref(), &hash).await.map(|r| (hash, r))
            }
        });
        futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn emit_events(
        &self,
        block: &Block,
        tx: &Transaction,
        from_uid: &str,
        to_uid: &str,
        receipt: &Receipt,
        reorged: bool,
    ) {
        let amount_wei = match parse_integer(&tx.value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tx_hash = %truncate_hex(&tx.hash, 10), error = %e, "skipping tx with unparseable value");
                return;
            }
        };
        let gas_used = num_bigint::BigUint::from(receipt.gas_used);
        let gas_price = parse_integer(&receipt.effective_gas_price).unwrap_or_default();
        let fee_wei = &gas_used * &gas_price;

        let amount_eth = wei_to_eth(&amount_wei);
        let fee_eth = wei_to_eth(&fee_wei);
        let status = match receipt.status {
            ReceiptStatus::Success => "success",
            ReceiptStatus::Reverted => "reverted",
        };

        if !to_uid.is_empty() {
            let event = MatchedTxEvent::new(
                to_uid.to_string(),
                tx.to.clone().unwrap_or_default(),
                Direction::In,
                tx.hash.clone(),
                block.number,
                block.timestamp as i64,
                tx.from.clone(),
                tx.to.clone(),
                amount_wei.to_str_radix(10),
                amount_eth.clone(),
                fee_wei.to_str_radix(10),
                fee_eth.clone(),
                status.to_string(),
                self.chain_id,
                reorged,
            );
            self.publish(event).await;
        }
        if !from_uid.is_empty() {
            let event = MatchedTxEvent::new(
                from_uid.to_string(),
                tx.from.clone(),
                Direction::Out,
                tx.hash.clone(),
                block.number,
                block.timestamp as i64,
                tx.from.clone(),
                tx.to.clone(),
                amount_wei.to_str_radix(10),
                amount_eth,
                fee_wei.to_str_radix(10),
                fee_eth,
                status.to_string(),
                self.chain_id,
                reorged,
            );
            self.publish(event).await;
        }
    }

    async fn publish(&self, event: MatchedTxEvent) {
        match self.publisher.publish(&self.topic, &event).await {
            Ok(()) => metrics::record_events_published(),
            Err(e) => tracing::warn!(tx_hash = %truncate_hex(&event.tx_hash, 10), error = %e, "publish failed, skipping"),
        }
    }
}

async fn fetch_one_with_retry<C: Client>(client: &C, hash: &str) -> Option<Receipt> {
    let mut backoff = Duration::from_millis(200);
    for attempt in 0..=FALLBACK_RETRIES {
        match tokio::time::timeout(FALLBACK_TIMEOUT, client.get_tx_receipt(hash)).await {
            Ok(Ok(receipt)) => {
                metrics::record_rpc_call("get_tx_receipt", "ok");
                return Some(receipt);
            }
            _ => {
                metrics::record_rpc_call("get_tx_receipt", "err");
                if attempt < FALLBACK_RETRIES {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
    tracing::warn!(tx_hash = %truncate_hex(hash, 10), "receipt fallback exhausted retries, skipping");
    None
}
