use super::message::*;
use crate::driver::timer::Waiter;
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use flume::Sender;
use tracing::{instrument, trace};

/// Sends a control-plane heartbeat at the server-assigned interval until
/// the pacing timer is cancelled.
///
/// The nonce is the wall clock in milliseconds, so successive heartbeats
/// carry non-decreasing nonces.
#[instrument(skip(waiter, ws))]
pub(crate) async fn runner(interval: Duration, waiter: Arc<Waiter>, ws: Sender<WsMessage>) {
    trace!("Heartbeat handle started.");

    while waiter.wait_for(interval).await {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since| since.as_millis() as u64);

        if ws.send(WsMessage::Heartbeat(nonce)).is_err() {
            break;
        }

        trace!("Sent heartbeat, nonce {}.", nonce);
    }

    trace!("Heartbeat handle stopped.");
}
