/// Orchestrator
///
/// Single-threaded driver over concurrent sources: owns the Finalizer, Reorg
/// Manager, and Checkpoint Store exclusively (spec §3 ownership), consumes
/// head numbers from the Head Source, and drives the reorg-resolution branch.
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::checkpoint::CheckpointStore;
use crate::errors::AppError;
use crate::finalizer::Finalizer;
use crate::metrics;
use crate::processor::Processor;
use crate::publisher::Publisher;
use crate::reorg::ReorgManager;
use crate::rpc::Client;
use crate::types::CheckpointState;

pub struct Orchestrator<C, P> {
    client: Arc<C>,
    processor: Processor<C, P>,
    finalizer: Finalizer,
    reorg_mgr: ReorgManager,
    checkpoint: CheckpointStore,
    confirmations: u64,
    bootstrap_blocks: u64,
    /// Last finalized height committed in memory, independent of whether the
    /// checkpoint file has actually been written (writes may be throttled).
    last_finalized: u64,
}

impl<C: Client, P: Publisher> Orchestrator<C, P> {
    pub fn new(
        client: Arc<C>,
        processor: Processor<C, P>,
        reorg_depth: u64,
        confirmations: u64,
        bootstrap_blocks: u64,
        checkpoint: CheckpointStore,
    ) -> Self {
        Orchestrator {
            client,
            processor,
            finalizer: Finalizer::new(confirmations),
            reorg_mgr: ReorgManager::new(reorg_depth),
            checkpoint,
            confirmations,
            bootstrap_blocks,
            last_finalized: 0,
        }
    }

    /// Loads the checkpoint, computes the bootstrap start, and replays any
    /// backlog up to the current confirmed tip before live processing begins.
    pub async fn bootstrap(&mut self) -> Result<(), AppError> {
        let state = self.checkpoint.load()?;
        let tip = self.client.get_block_number().await?;
        let target = tip.saturating_sub(self.confirmations);

        let start = if state.last_finalized == 0 && self.bootstrap_blocks > 0 {
            target.saturating_sub(self.bootstrap_blocks.saturating_sub(1))
        } else {
            state.last_finalized + 1
        };

        if start <= target {
            let checkpoint = &self.checkpoint;
            crate::backfill::run(
                self.client.as_ref(),
                &self.processor,
                &mut self.reorg_mgr,
                start,
                target,
                |n| {
                    checkpoint.save_throttled(&CheckpointState {
                        last_finalized: n,
                        updated_at: chrono::Utc::now(),
                    })
                },
            )
            .await?;
            self.last_finalized = target;
            self.checkpoint.save_now(&CheckpointState {
                last_finalized: target,
                updated_at: chrono::Utc::now(),
            })?;
            metrics::set_finalized(target);
        } else {
            self.last_finalized = state.last_finalized;
        }
        Ok(())
    }

    /// Feeds one observed head number into the Finalizer and processes every
    /// number it releases.
    pub async fn on_head(&mut self, head_number: u64) -> Result<(), AppError> {
        metrics::set_head(head_number);
        for finalized in self.finalizer.add(head_number) {
            self.process_finalized(finalized).await?;
        }
        Ok(())
    }

    async fn process_finalized(&mut self, number: u64) -> Result<(), AppError> {
        let block = self.client.get_block_by_number(number, true).await?;

        if self.reorg_mgr.parent_ok(&block) {
            self.processor.process_block(&block, false).await?;
            self.reorg_mgr.record(&block);
            self.save_checkpoint(number, false)?;
            metrics::set_finalized(number);
            return Ok(());
        }

        tracing::warn!(target: "chainwatch", block_number = number, "[REORG] parent hash mismatch detected");
        match self
            .reorg_mgr
            .common_ancestor(self.client.as_ref(), &block.hash, block.number)
            .await
        {
            None => {
                tracing::warn!(target: "chainwatch", block_number = number, "[REORG] ancestor not found within window, deferring");
                Ok(())
            }
            Some((ancestor, _)) => {
                let depth = self.reorg_mgr.highest().saturating_sub(ancestor);
                self.reorg_mgr.reset_above(ancestor);
                metrics::set_reorg_depth(depth);

                let (start, end) = (ancestor + 1, number);
                let mut n = start;
                while n <= end {
                    let replay_block = self.client.get_block_by_number(n, true).await?;
                    self.processor.process_block(&replay_block, true).await?;
                    self.reorg_mgr.record(&replay_block);
                    self.save_checkpoint(n, true)?;
                    metrics::set_finalized(n);
                    n += 1;
                }
                Ok(())
            }
        }
    }

    fn save_checkpoint(&mut self, number: u64, final_write: bool) -> Result<(), AppError> {
        self.last_finalized = number;
        let state = CheckpointState {
            last_finalized: number,
            updated_at: chrono::Utc::now(),
        };
        if final_write {
            self.checkpoint.save_now(&state)
        } else {
            self.checkpoint.save_throttled(&state)
        }
    }

    /// Consumes head numbers from the Head Source until the channel closes,
    /// then performs a final unthrottled write of the orchestrator's own
    /// in-memory progress, not whatever was last persisted to disk — a
    /// throttled write earlier in the run may have dropped it.
    pub async fn drive(&mut self, mut heads: mpsc::Receiver<u64>) -> Result<(), AppError> {
        while let Some(n) = heads.recv().await {
            if let Err(e) = self.on_head(n).await {
                tracing::warn!(error = %e, head_number = n, "error processing head, continuing");
            }
        }
        let state = CheckpointState {
            last_finalized: self.last_finalized,
            updated_at: chrono::Utc::now(),
        };
        self.checkpoint.save_now(&state)?;
        Ok(())
    }
}
