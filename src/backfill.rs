/// Backfill
///
/// Sequential range replay through the same reorg-safe path live processing
/// uses. No shortcuts: every block is fetched, gated through `parent_ok`, and
/// processed exactly like a finalized live block.
use crate::errors::AppError;
use crate::processor::Processor;
use crate::reorg::ReorgManager;
use crate::rpc::Client;
use crate::publisher::Publisher;

pub async fn run<C: Client, P: Publisher>(
    client: &C,
    processor: &Processor<C, P>,
    reorg_mgr: &mut ReorgManager,
    from: u64,
    to: u64,
    mut save_fn: impl FnMut(u64) -> Result<(), AppError>,
) -> Result<(), AppError> {
    let mut n = from;
    while n <= to {
        let block = client.get_block_by_number(n, true).await?;
        if reorg_mgr.parent_ok(&block) {
            processor.process_block(&block, false).await?;
            reorg_mgr.record(&block);
            save_fn(n)?;
            n += 1;
            continue;
        }

        match reorg_mgr.common_ancestor(client, &block.hash, block.number).await {
            Some((ancestor, _)) => {
                reorg_mgr.reset_above(ancestor);
                let mut replay = ancestor + 1;
                while replay <= n {
                    let replay_block = client.get_block_by_number(replay, true).await?;
                    processor.process_block(&replay_block, true).await?;
                    reorg_mgr.record(&replay_block);
                    save_fn(replay)?;
                    replay += 1;
                }
                n += 1;
            }
            None => {
                return Err(AppError::ReorgTooDeep {
                    head_number: block.number,
                });
            }
        }
    }
    Ok(())
}
