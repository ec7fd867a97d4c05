use super::message::*;
use crate::{
    model::{
        payload::{Heartbeat, Speaking},
        Event as GatewayEvent,
        SpeakingState,
    },
    ws::{Error as WsError, WsStream},
};
use flume::{Receiver, RecvError, Sender};
use tokio::select;
use tracing::{debug, info, instrument, trace, warn};

pub(crate) struct WsPoll {
    rx: Receiver<WsMessage>,
    ws_client: WsStream,
    core: Sender<CoreMessage>,

    ssrc: u32,
    speaking: SpeakingState,
}

impl WsPoll {
    pub(crate) fn new(
        rx: Receiver<WsMessage>,
        ws_client: WsStream,
        ssrc: u32,
        core: Sender<CoreMessage>,
    ) -> Self {
        Self {
            rx,
            ws_client,
            core,
            ssrc,
            speaking: SpeakingState::MICROPHONE,
        }
    }

    async fn run(&mut self) {
        loop {
            select! {
                ws_msg = self.ws_client.recv_json_no_timeout() => match ws_msg {
                    Ok(Some(msg)) => {
                        if self.core.send(CoreMessage::WsEvent(msg)).is_err() {
                            break;
                        }
                    },
                    Ok(None) => {},
                    Err(WsError::WsClosed(frame)) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        info!("Voice gateway closed: {:?}.", frame);
                        drop(self.core.send(CoreMessage::WsClosed(code)));
                        break;
                    },
                    Err(e) => {
                        warn!("Error reading voice gateway: {:?}.", e);
                        drop(self.core.send(CoreMessage::WsClosed(None)));
                        break;
                    },
                },
                inner_msg = self.rx.recv_async() => match inner_msg {
                    Ok(WsMessage::Heartbeat(nonce)) => {
                        let status = self
                            .ws_client
                            .send_json(&GatewayEvent::from(Heartbeat { nonce }))
                            .await;

                        if let Err(e) = status {
                            warn!("Error sending heartbeat: {:?}.", e);
                            drop(self.core.send(CoreMessage::WsClosed(None)));
                            break;
                        }
                    },
                    Ok(WsMessage::Speaking(is_speaking)) => {
                        if self.speaking.contains(SpeakingState::MICROPHONE) == is_speaking {
                            continue;
                        }

                        self.speaking.set(SpeakingState::MICROPHONE, is_speaking);
                        debug!("Changing to {:?}.", self.speaking);

                        let status = self
                            .ws_client
                            .send_json(&GatewayEvent::from(Speaking {
                                delay: Some(0),
                                speaking: self.speaking,
                                ssrc: self.ssrc,
                                user_id: None,
                            }))
                            .await;

                        if let Err(e) = status {
                            warn!("Error updating speaking state: {:?}.", e);
                            drop(self.core.send(CoreMessage::WsClosed(None)));
                            break;
                        }
                    },
                    Ok(WsMessage::Poison) | Err(RecvError::Disconnected) => break,
                },
            }
        }
    }
}

#[instrument(skip(poll))]
pub(crate) async fn runner(mut poll: WsPoll) {
    trace!("WS handle started.");
    poll.run().await;
    trace!("WS handle stopped.");
}
