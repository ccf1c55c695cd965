/// Metrics Module - Prometheus Instrumentation
///
/// A Prometheus registry plus the gauges/counters/histogram the pipeline
/// reports on, in the same catalog-of-statics-plus-helpers shape as the
/// teacher's metrics module, scoped down to this service's concerns.
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::atomic::{AtomicI64, Ordering};

/// Bucket boundaries for receipt batch sizes (spec's ≤50-per-request chunking).
const BATCH_SIZE_BUCKETS: &[f64] = &[1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0];

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HEAD_BLOCK: IntGauge =
        IntGauge::new("chainwatch_head_block", "Highest block number observed from the chain").unwrap();

    pub static ref FINALIZED_BLOCK: IntGauge = IntGauge::new(
        "chainwatch_finalized_block",
        "Highest block number fully processed and published"
    )
    .unwrap();

    pub static ref FINALIZED_LAG_BLOCKS: IntGauge = IntGauge::new(
        "chainwatch_finalized_lag_blocks",
        "head_block minus finalized_block"
    )
    .unwrap();

    pub static ref WS_CONNECTED: IntGauge =
        IntGauge::new("chainwatch_ws_connected", "1 if the push subscription is currently active").unwrap();

    pub static ref REORG_DEPTH_BLOCKS: IntGauge = IntGauge::new(
        "chainwatch_reorg_depth_blocks",
        "Depth of the most recently resolved reorg"
    )
    .unwrap();

    pub static ref PENDING_CHECKPOINT: IntGauge = IntGauge::new(
        "chainwatch_pending_checkpoint",
        "1 if an unsaved checkpoint advance is pending"
    )
    .unwrap();

    pub static ref BLOCKS_PROCESSED: IntCounter =
        IntCounter::new("chainwatch_blocks_processed_total", "Total blocks processed").unwrap();

    pub static ref BLOCK_REPROCESSED: IntCounter = IntCounter::new(
        "chainwatch_block_reprocessed_total",
        "Total blocks reprocessed due to a reorg replay"
    )
    .unwrap();

    pub static ref TXS_MATCHED: IntCounter =
        IntCounter::new("chainwatch_txs_matched_total", "Total transactions matched against the watch set").unwrap();

    pub static ref EVENTS_PUBLISHED: IntCounter =
        IntCounter::new("chainwatch_events_published_total", "Total matched-tx events published").unwrap();

    pub static ref REORGS: IntCounter =
        IntCounter::new("chainwatch_reorgs_total", "Total reorgs detected and resolved").unwrap();

    pub static ref RPC_CALLS: IntCounterVec = IntCounterVec::new(
        Opts::new("chainwatch_rpc_calls_total", "Total RPC calls by method and result"),
        &["method", "result"]
    )
    .unwrap();

    pub static ref FINALIZER_GAPS_SKIPPED: IntCounter = IntCounter::new(
        "chainwatch_finalizer_gaps_skipped_total",
        "Heights reaching the finalization threshold with no observed head, dropped silently"
    )
    .unwrap();

    pub static ref RECEIPT_BATCH_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "chainwatch_receipt_batch_size",
            "Number of receipts fetched per processed block"
        )
        .buckets(BATCH_SIZE_BUCKETS.to_vec())
    )
    .unwrap();
}

/// Freshness timestamps (unix seconds) backing `/healthz`, touched only via
/// atomics so readers never block a writer (spec §5's "metrics state uses
/// atomic counters/timestamps").
pub struct Freshness {
    pub last_head_at: AtomicI64,
    pub last_finalized_advance_at: AtomicI64,
    pub last_rpc_error_at: AtomicI64,
}

lazy_static! {
    pub static ref FRESHNESS: Freshness = Freshness {
        last_head_at: AtomicI64::new(0),
        last_finalized_advance_at: AtomicI64::new(0),
        last_rpc_error_at: AtomicI64::new(0),
    };
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(HEAD_BLOCK.clone()));
    let _ = REGISTRY.register(Box::new(FINALIZED_BLOCK.clone()));
    let _ = REGISTRY.register(Box::new(FINALIZED_LAG_BLOCKS.clone()));
    let _ = REGISTRY.register(Box::new(WS_CONNECTED.clone()));
    let _ = REGISTRY.register(Box::new(REORG_DEPTH_BLOCKS.clone()));
    let _ = REGISTRY.register(Box::new(PENDING_CHECKPOINT.clone()));
    let _ = REGISTRY.register(Box::new(BLOCKS_PROCESSED.clone()));
    let _ = REGISTRY.register(Box::new(BLOCK_REPROCESSED.clone()));
    let _ = REGISTRY.register(Box::new(TXS_MATCHED.clone()));
    let _ = REGISTRY.register(Box::new(EVENTS_PUBLISHED.clone()));
    let _ = REGISTRY.register(Box::new(REORGS.clone()));
    let _ = REGISTRY.register(Box::new(FINALIZER_GAPS_SKIPPED.clone()));
    let _ = REGISTRY.register(Box::new(RPC_CALLS.clone()));
    let _ = REGISTRY.register(Box::new(RECEIPT_BATCH_SIZE.clone()));
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn set_head(number: u64) {
    HEAD_BLOCK.set(number as i64);
    FRESHNESS.last_head_at.store(now_unix(), Ordering::Relaxed);
    let lag = (number as i64 - FINALIZED_BLOCK.get()).max(0);
    FINALIZED_LAG_BLOCKS.set(lag);
}

pub fn set_finalized(number: u64) {
    FINALIZED_BLOCK.set(number as i64);
    FRESHNESS
        .last_finalized_advance_at
        .store(now_unix(), Ordering::Relaxed);
    let lag = (HEAD_BLOCK.get() - number as i64).max(0);
    FINALIZED_LAG_BLOCKS.set(lag);
}

pub fn set_ws_connected(connected: bool) {
    WS_CONNECTED.set(if connected { 1 } else { 0 });
}

pub fn set_reorg_depth(depth: u64) {
    REORG_DEPTH_BLOCKS.set(depth as i64);
    REORGS.inc();
}

pub fn set_pending_checkpoint(pending: bool) {
    PENDING_CHECKPOINT.set(if pending { 1 } else { 0 });
}

pub fn record_blocks_processed() {
    BLOCKS_PROCESSED.inc();
}

pub fn record_block_reprocessed() {
    BLOCK_REPROCESSED.inc();
}

pub fn record_txs_matched(count: usize) {
    TXS_MATCHED.inc_by(count as u64);
}

pub fn record_events_published() {
    EVENTS_PUBLISHED.inc();
}

pub fn record_rpc_call(method: &str, result: &str) {
    RPC_CALLS.with_label_values(&[method, result]).inc();
    if result != "ok" {
        FRESHNESS.last_rpc_error_at.store(now_unix(), Ordering::Relaxed);
    }
}

pub fn record_finalizer_gap_skipped() {
    FINALIZER_GAPS_SKIPPED.inc();
}

pub fn observe_receipt_batch_size(n: usize) {
    RECEIPT_BATCH_SIZE.observe(n as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_metrics_produces_text_exposition() {
        init_metrics();
        record_blocks_processed();
        let text = gather_metrics();
        assert!(text.contains("chainwatch_blocks_processed_total"));
    }

    #[test]
    fn rpc_call_error_updates_freshness() {
        let before = FRESHNESS.last_rpc_error_at.load(Ordering::Relaxed);
        record_rpc_call("get_block_number", "err");
        let after = FRESHNESS.last_rpc_error_at.load(Ordering::Relaxed);
        assert!(after >= before);
    }

    #[test]
    fn set_finalized_updates_lag() {
        set_head(110);
        set_finalized(100);
        assert_eq!(FINALIZED_LAG_BLOCKS.get(), 10);
    }
}
