/// Health Derivation
///
/// Readiness is derived from freshness timestamps rather than a boolean
/// flag, the exact rule set from the original's `IsHealthy`: age-based, not
/// count-based, so a single past RPC error doesn't wedge the service
/// unhealthy forever.
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::metrics::{set_ws_connected, FRESHNESS, WS_CONNECTED};

const HEAD_STALE_AFTER: Duration = Duration::from_secs(2 * 60);
const FINALIZED_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
const RPC_ERROR_WINDOW: Duration = Duration::from_secs(30);

pub enum HealthStatus {
    Ok,
    Unhealthy(String),
}

pub fn check(now_unix: i64) -> HealthStatus {
    let head_age = age(now_unix, FRESHNESS.last_head_at.load(Ordering::Relaxed));
    let finalized_age = age(
        now_unix,
        FRESHNESS.last_finalized_advance_at.load(Ordering::Relaxed),
    );
    let rpc_error_age = age(now_unix, FRESHNESS.last_rpc_error_at.load(Ordering::Relaxed));
    let ws_up = WS_CONNECTED.get() == 1;

    if head_age > HEAD_STALE_AFTER.as_secs() as i64 && !ws_up {
        return HealthStatus::Unhealthy(format!(
            "no head observed for {head_age}s and push subscription is down"
        ));
    }
    if finalized_age > FINALIZED_STALE_AFTER.as_secs() as i64 {
        return HealthStatus::Unhealthy(format!("no finalized progress for {finalized_age}s"));
    }
    if rpc_error_age < RPC_ERROR_WINDOW.as_secs() as i64 {
        return HealthStatus::Unhealthy(format!("rpc error {rpc_error_age}s ago"));
    }
    HealthStatus::Ok
}

/// Treats a never-set (zero) timestamp as infinitely old/far, matching the
/// original's zero-value-time semantics.
fn age(now: i64, observed_at: i64) -> i64 {
    if observed_at == 0 {
        return i64::MAX / 2;
    }
    (now - observed_at).max(0)
}

pub fn mark_ws_connected(connected: bool) {
    set_ws_connected(connected);
}
