use crate::constants::*;
use crate::driver::timer::Waiter;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::net::UdpSocket;
use tracing::{error, instrument, trace};

/// Refreshes the NAT binding for the voice data path.
///
/// Fires every [`UDP_KEEPALIVE_GAP`] until the pacing timer is cancelled;
/// paths which expire idle flows would otherwise drop inbound audio.
#[instrument(skip(udp_tx, waiter, connected))]
pub(crate) async fn runner(udp_tx: Arc<UdpSocket>, waiter: Arc<Waiter>, connected: Arc<AtomicBool>) {
    trace!("UDP keepalive handle started.");

    while waiter.wait_for(UDP_KEEPALIVE_GAP).await {
        if !connected.load(Ordering::Acquire) {
            continue;
        }

        if let Err(e) = udp_tx.send(&UDP_KEEPALIVE_PAYLOAD).await {
            error!("Fatal UDP keepalive send error: {:?}.", e);
            break;
        }

        trace!("Sent UDP keepalive.");
    }

    trace!("UDP keepalive handle stopped.");
}
