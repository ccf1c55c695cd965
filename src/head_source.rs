/// Head Source
///
/// Merges a push subscription with an HTTP polling fallback into one
/// monotonically increasing stream of observed block numbers. Modeled as a
/// task producing into a bounded queue (spec §9), not as thread-shared
/// mutable state.
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};

use crate::health::mark_ws_connected;
use crate::metrics::record_rpc_call;
use crate::rpc::Client;

pub struct HeadSourceConfig {
    pub poll_interval: Duration,
    pub backoff_floor: Duration,
    pub backoff_ceil: Duration,
}

/// `d * (0.5 + U[0,1))` — 50-150% of `d`, taken verbatim from the original's
/// reconnect jitter.
fn jitter(d: Duration) -> Duration {
    let factor = 0.5 + rand::thread_rng().gen::<f64>();
    Duration::from_secs_f64(d.as_secs_f64() * factor)
}

fn next_backoff(current: Duration, ceil: Duration) -> Duration {
    let scaled = Duration::from_secs_f64(current.as_secs_f64() * 1.6);
    scaled.min(ceil)
}

/// One polling tick: fetch the current tip and emit every number in
/// `(last, tip]`. Returns the emitted numbers and the new cursor.
async fn poll_tick<C: Client>(client: &C, last: u64) -> Result<(Vec<u64>, u64), crate::errors::AppError> {
    let tip = client.get_block_number().await?;
    if tip <= last {
        return Ok((Vec::new(), last));
    }
    let emitted: Vec<u64> = ((last + 1)..=tip).collect();
    Ok((emitted, tip))
}

/// Drives the WS_ACTIVE / POLL / WS_RETRY state machine until `shutdown`
/// fires. Emitted numbers on `tx` are strictly increasing.
pub async fn run<C: Client + 'static>(
    client: Arc<C>,
    config: HeadSourceConfig,
    tx: mpsc::Sender<u64>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last: u64 = 0;
    let mut backoff = config.backoff_floor;

    loop {
        if *shutdown.borrow() {
            return;
        }

        match client.subscribe_new_heads().await {
            Ok(mut rx) => {
                mark_ws_connected(true);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                mark_ws_connected(false);
                                return;
                            }
                        }
                        msg = rx.recv() => {
                            match msg {
                                Some(Ok(header)) => {
                                    backoff = config.backoff_floor;
                                    if header.number > last {
                                        last = header.number;
                                        if tx.send(header.number).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                Some(Err(_)) | None => break,
                            }
                        }
                    }
                }
            }
            Err(_) => {}
        }

        mark_ws_connected(false);

        // POLL state: keep polling until a WS_RETRY attempt is scheduled.
        loop {
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                    continue;
                }
            }

            match poll_tick(client.as_ref(), last).await {
                Ok((emitted, new_last)) => {
                    record_rpc_call("get_block_number", "ok");
                    last = new_last;
                    for n in emitted {
                        if tx.send(n).await.is_err() {
                            return;
                        }
                    }
                    // Success: schedule a WS_RETRY attempt next.
                    break;
                }
                Err(_) => {
                    record_rpc_call("get_block_number", "err");
                    let sleep_for = jitter(backoff);
                    backoff = next_backoff(backoff, config.backoff_ceil);
                    tokio::select! {
                        _ = tokio::time::sleep(sleep_for) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                }
            }
        }

        // WS_RETRY: brief jittered pause before re-entering WS_ACTIVE.
        tokio::select! {
            _ = tokio::time::sleep(jitter(config.backoff_floor)) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::tests::FakeClient;

    #[test]
    fn jitter_is_within_50_to_150_percent() {
        let d = Duration::from_millis(1000);
        for _ in 0..200 {
            let j = jitter(d);
            assert!(j.as_millis() >= 500 && j.as_millis() <= 1500);
        }
    }

    #[test]
    fn backoff_grows_by_1_6_up_to_ceiling() {
        let ceil = Duration::from_secs(30);
        let mut d = Duration::from_secs(1);
        d = next_backoff(d, ceil);
        assert_eq!(d.as_millis(), 1600);
        for _ in 0..20 {
            d = next_backoff(d, ceil);
        }
        assert_eq!(d, ceil);
    }

    #[tokio::test]
    async fn poll_tick_emits_strictly_increasing_range() {
        let client = FakeClient::new().with_head_number(10);
        let (emitted, last) = poll_tick(&client, 10).await.unwrap();
        assert_eq!(emitted, vec![11]);
        assert_eq!(last, 11);

        let (emitted, last) = poll_tick(&client, last).await.unwrap();
        assert_eq!(emitted, vec![12]);
        assert_eq!(last, 12);
    }

    #[tokio::test]
    async fn fallback_polling_emits_at_least_two_ascending_numbers() {
        let client = Arc::new(FakeClient::new());
        let config = HeadSourceConfig {
            poll_interval: Duration::from_millis(1),
            backoff_floor: Duration::from_millis(1),
            backoff_ceil: Duration::from_millis(5),
        };
        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            run(client, config, tx, shutdown_rx).await;
        });

        let mut got = Vec::new();
        while got.len() < 2 {
            if let Some(n) = rx.recv().await {
                got.push(n);
            } else {
                break;
            }
        }
        let _ = shutdown_tx.send(true);
        let _ = handle.await;

        assert!(got.len() >= 2);
        assert!(got.windows(2).all(|w| w[0] < w[1]));
    }
}
