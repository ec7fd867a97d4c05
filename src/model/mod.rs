//! Mappings of objects received from Discord's voice gateway, with
//! implementations for (de)serialisation.

pub mod id;
mod opcode;
pub mod payload;
mod speaking_state;
mod util;

pub use self::opcode::Opcode;
pub use self::speaking_state::SpeakingState;

use serde::de::value::U8Deserializer;
use serde::de::{Deserializer, Error as DeError, IntoDeserializer, MapAccess, Unexpected, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use payload::*;

/// A representation of data received for voice gateway events.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Event {
    /// Used to begin a voice websocket connection.
    Identify(Identify),
    /// Used to select the voice protocol and encryption mechanism.
    SelectProtocol(SelectProtocol),
    /// Server's response to the client's Identify operation. Contains session-specific
    /// information, e.g. SSRC, and supported encryption modes.
    Ready(Ready),
    /// Periodic messages used to keep the websocket connection alive.
    Heartbeat(Heartbeat),
    /// Server's confirmation of a negotiated encryption scheme.
    SessionDescription(SessionDescription),
    /// A voice event denoting that someone is speaking.
    Speaking(Speaking),
    /// Acknowledgement from the server for a prior voice heartbeat.
    HeartbeatAck(HeartbeatAck),
    /// Sent by the client after a disconnect to attempt to resume a session.
    Resume(Resume),
    /// Used to determine how often the client must send a heartbeat.
    Hello(Hello),
    /// Message received if a Resume request was successful.
    Resumed,
    /// Status update in the current channel, indicating that a user has disconnected.
    ClientDisconnect(ClientDisconnect),
}

impl Event {
    /// Returns the opcode this event is carried under.
    pub fn kind(&self) -> Opcode {
        use Event::*;
        match self {
            Identify(_) => Opcode::Identify,
            SelectProtocol(_) => Opcode::SelectProtocol,
            Ready(_) => Opcode::Ready,
            Heartbeat(_) => Opcode::Heartbeat,
            SessionDescription(_) => Opcode::SessionDescription,
            Speaking(_) => Opcode::Speaking,
            HeartbeatAck(_) => Opcode::HeartbeatAck,
            Resume(_) => Opcode::Resume,
            Hello(_) => Opcode::Hello,
            Resumed => Opcode::Resumed,
            ClientDisconnect(_) => Opcode::ClientDisconnect,
        }
    }
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Event", 2)?;

        s.serialize_field("op", &self.kind())?;

        use Event::*;
        match self {
            Identify(e) => s.serialize_field("d", e)?,
            SelectProtocol(e) => s.serialize_field("d", e)?,
            Ready(e) => s.serialize_field("d", e)?,
            Heartbeat(e) => s.serialize_field("d", e)?,
            SessionDescription(e) => s.serialize_field("d", e)?,
            Speaking(e) => s.serialize_field("d", e)?,
            HeartbeatAck(e) => s.serialize_field("d", e)?,
            Resume(e) => s.serialize_field("d", e)?,
            Hello(e) => s.serialize_field("d", e)?,
            Resumed => s.serialize_field("d", &None::<()>)?,
            ClientDisconnect(e) => s.serialize_field("d", e)?,
        }

        s.end()
    }
}

struct EventVisitor;

impl<'de> Visitor<'de> for EventVisitor {
    type Value = Event;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map with at least two keys ('d', 'op')")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut d = None;
        let mut op = None;

        loop {
            match map.next_key::<&str>()? {
                Some("op") => {
                    let raw = map.next_value::<u8>()?;
                    let des: U8Deserializer<A::Error> = raw.into_deserializer();
                    let valid_op = Opcode::deserialize(des).map_err(|_| {
                        DeError::invalid_value(
                            Unexpected::Unsigned(raw.into()),
                            &"opcode in [0--9] + [13]",
                        )
                    })?;
                    op = Some(valid_op);
                },
                // Op comes first in practice, but missing it is not failure.
                // If the order is correct then we don't need to pass the RawValue back out.
                Some("d") => match op {
                    Some(Opcode::Identify) => return Ok(map.next_value::<Identify>()?.into()),
                    Some(Opcode::SelectProtocol) =>
                        return Ok(map.next_value::<SelectProtocol>()?.into()),
                    Some(Opcode::Ready) => return Ok(map.next_value::<Ready>()?.into()),
                    Some(Opcode::Heartbeat) => return Ok(map.next_value::<Heartbeat>()?.into()),
                    Some(Opcode::SessionDescription) =>
                        return Ok(map.next_value::<SessionDescription>()?.into()),
                    Some(Opcode::Speaking) => return Ok(map.next_value::<Speaking>()?.into()),
                    Some(Opcode::HeartbeatAck) =>
                        return Ok(map.next_value::<HeartbeatAck>()?.into()),
                    Some(Opcode::Resume) => return Ok(map.next_value::<Resume>()?.into()),
                    Some(Opcode::Hello) => return Ok(map.next_value::<Hello>()?.into()),
                    Some(Opcode::Resumed) => {
                        let _ = map.next_value::<Option<()>>()?;
                        return Ok(Event::Resumed);
                    },
                    Some(Opcode::ClientDisconnect) =>
                        return Ok(map.next_value::<ClientDisconnect>()?.into()),
                    None => {
                        d = Some(map.next_value::<&RawValue>()?);
                    },
                },
                Some(_) => {},
                None =>
                    if d.is_none() {
                        return Err(DeError::missing_field("d"));
                    } else if op.is_none() {
                        return Err(DeError::missing_field("op"));
                    },
            }

            if d.is_some() && op.is_some() {
                break;
            }
        }

        let d = d.expect("Struct body known to exist if loop has been escaped.").get();
        let op = op.expect("Struct variant known to exist if loop has been escaped.");

        (match op {
            Opcode::Identify => serde_json::from_str::<Identify>(d).map(Into::into),
            Opcode::SelectProtocol => serde_json::from_str::<SelectProtocol>(d).map(Into::into),
            Opcode::Ready => serde_json::from_str::<Ready>(d).map(Into::into),
            Opcode::Heartbeat => serde_json::from_str::<Heartbeat>(d).map(Into::into),
            Opcode::SessionDescription =>
                serde_json::from_str::<SessionDescription>(d).map(Into::into),
            Opcode::Speaking => serde_json::from_str::<Speaking>(d).map(Into::into),
            Opcode::HeartbeatAck => serde_json::from_str::<HeartbeatAck>(d).map(Into::into),
            Opcode::Resume => serde_json::from_str::<Resume>(d).map(Into::into),
            Opcode::Hello => serde_json::from_str::<Hello>(d).map(Into::into),
            Opcode::Resumed => Ok(Event::Resumed),
            Opcode::ClientDisconnect => serde_json::from_str::<ClientDisconnect>(d).map(Into::into),
        })
        .map_err(DeError::custom)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(EventVisitor)
    }
}

impl From<Identify> for Event {
    fn from(e: Identify) -> Self {
        Event::Identify(e)
    }
}

impl From<SelectProtocol> for Event {
    fn from(e: SelectProtocol) -> Self {
        Event::SelectProtocol(e)
    }
}

impl From<Ready> for Event {
    fn from(e: Ready) -> Self {
        Event::Ready(e)
    }
}

impl From<Heartbeat> for Event {
    fn from(e: Heartbeat) -> Self {
        Event::Heartbeat(e)
    }
}

impl From<SessionDescription> for Event {
    fn from(e: SessionDescription) -> Self {
        Event::SessionDescription(e)
    }
}

impl From<Speaking> for Event {
    fn from(e: Speaking) -> Self {
        Event::Speaking(e)
    }
}

impl From<HeartbeatAck> for Event {
    fn from(e: HeartbeatAck) -> Self {
        Event::HeartbeatAck(e)
    }
}

impl From<Resume> for Event {
    fn from(e: Resume) -> Self {
        Event::Resume(e)
    }
}

impl From<Hello> for Event {
    fn from(e: Hello) -> Self {
        Event::Hello(e)
    }
}

impl From<ClientDisconnect> for Event {
    fn from(e: ClientDisconnect) -> Self {
        Event::ClientDisconnect(e)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use serde_json::json;

    use super::id::*;
    use super::payload::*;
    use super::{Event, SpeakingState};

    #[test]
    fn deserialize_hello_json() {
        let json_data = r#"{
          "op": 8,
          "d": {
            "heartbeat_interval": 41250
          }
        }"#;

        let event = serde_json::from_str(json_data);

        assert!(match event {
            Ok(Event::Hello(i)) => (i.heartbeat_interval - 41250.0).abs() < f64::EPSILON,
            _ => false,
        });
    }

    #[test]
    fn deserialize_ready_json() {
        let json_data = r#"{
            "op": 2,
            "d": {
                "ssrc": 42,
                "ip": "127.0.0.1",
                "port": 9999,
                "modes": ["xsalsa20_poly1305", "xsalsa20_poly1305_suffix"],
                "experiments": ["fixed_keyframe_interval"],
                "streams": [{
                    "active": false,
                    "quality": 100,
                    "rid": "100",
                    "rtx_ssrc": 43,
                    "ssrc": 44,
                    "type": "video"
                }]
            }
        }"#;

        let event = serde_json::from_str(json_data);

        let ready = Ready {
            ip: Ipv4Addr::new(127, 0, 0, 1).into(),
            port: 9999,
            ssrc: 42,
            modes: vec![
                "xsalsa20_poly1305".into(),
                "xsalsa20_poly1305_suffix".into(),
            ],
            experiments: Some(vec!["fixed_keyframe_interval".into()]),
            streams: Some(vec![StreamInfo {
                active: false,
                quality: 100,
                rid: "100".into(),
                rtx_ssrc: 43,
                ssrc: 44,
                kind: "video".into(),
            }]),
        };

        assert!(matches!(event, Ok(Event::Ready(i)) if i == ready));
    }

    #[test]
    fn deserialize_ready_without_optional_fields() {
        let json_data = r#"{
            "op": 2,
            "d": {
                "ssrc": 1,
                "ip": "203.0.113.4",
                "port": 50004,
                "modes": ["xsalsa20_poly1305"]
            }
        }"#;

        let event: Event = serde_json::from_str(json_data).unwrap();

        assert!(
            matches!(event, Event::Ready(r) if r.experiments.is_none() && r.streams.is_none())
        );
    }

    #[test]
    fn deserialize_session_description_json() {
        let json_data = r#"{
            "op": 4,
            "d": {
                "mode": "xsalsa20_poly1305",
                "secret_key": [251, 100, 11]
            }
        }"#;

        let event = serde_json::from_str(json_data);

        let sd = SessionDescription {
            mode: "xsalsa20_poly1305".into(),
            secret_key: vec![251, 100, 11],
        };

        assert!(matches!(event, Ok(Event::SessionDescription(i)) if i == sd));
    }

    #[test]
    fn deserialize_speaking_json() {
        let json_data = r#"{
            "op": 5,
            "d": {
                "user_id": "111",
                "ssrc": 7,
                "speaking": 1
            }
        }"#;

        let event = serde_json::from_str(json_data);

        let speak = Speaking {
            delay: None,
            speaking: SpeakingState::MICROPHONE,
            ssrc: 7,
            user_id: Some(UserId(111)),
        };

        assert!(matches!(event, Ok(Event::Speaking(i)) if i == speak));
    }

    #[test]
    fn deserialize_heartbeat_ack_json() {
        let json_data = r#"{
          "op": 6,
          "d": 1501184119561
        }"#;

        let event = serde_json::from_str(json_data);

        assert!(matches!(event, Ok(Event::HeartbeatAck(i)) if i.nonce == 1501184119561));
    }

    #[test]
    fn deserialize_resumed_json() {
        let json_data = r#"{
          "op": 9,
          "d": null
        }"#;

        let event = serde_json::from_str(json_data);

        assert!(matches!(event, Ok(Event::Resumed)));
    }

    #[test]
    fn deserialize_client_disconnect_json() {
        let json_data = r#"{
          "op": 13,
          "d": {
            "user_id": "1234"
          }
        }"#;

        let event = serde_json::from_str(json_data);

        assert!(matches!(event, Ok(Event::ClientDisconnect(i)) if i.user_id == UserId(1234)));
    }

    #[test]
    fn deserialize_body_before_opcode() {
        let json_data = r#"{
          "d": {
            "heartbeat_interval": 41250
          },
          "op": 8
        }"#;

        let event = serde_json::from_str::<Event>(json_data);

        assert!(matches!(event, Ok(Event::Hello(_))));
    }

    #[test]
    fn unknown_opcode_is_a_parse_failure() {
        assert!(serde_json::from_str::<Event>(r#"{"op":11,"d":{}}"#).is_err());
        assert!(serde_json::from_str::<Event>(r#"{"op":200,"d":null}"#).is_err());
    }

    #[test]
    fn missing_required_field_is_a_parse_failure() {
        // Ready with no ssrc.
        let json_data = r#"{
            "op": 2,
            "d": {"ip": "127.0.0.1", "port": 4000, "modes": []}
        }"#;

        assert!(serde_json::from_str::<Event>(json_data).is_err());
    }

    #[test]
    fn serialize_identify() {
        let value: Event = Identify {
            server_id: GuildId(1),
            session_id: "56f88a86dce65c65b9".into(),
            token: "56f88a86dce65c65b8".into(),
            user_id: UserId(2),
            video: true,
            streams: vec![StreamRequest::default()],
        }
        .into();

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({
                "op": 0,
                "d": {
                    "server_id": "1",
                    "session_id": "56f88a86dce65c65b9",
                    "token": "56f88a86dce65c65b8",
                    "user_id": "2",
                    "video": true,
                    "streams": [{"type": "video", "rid": "100", "quality": 100}]
                }
            })
        );
    }

    #[test]
    fn serialize_select_protocol() {
        let value: Event = SelectProtocol {
            protocol: "udp".into(),
            address: Ipv4Addr::new(192, 0, 2, 5).into(),
            port: 50000,
            mode: "xsalsa20_poly1305".into(),
            data: ProtocolData {
                address: Ipv4Addr::new(192, 0, 2, 5).into(),
                port: 50000,
                mode: "xsalsa20_poly1305".into(),
            },
        }
        .into();

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({
                "op": 1,
                "d": {
                    "protocol": "udp",
                    "address": "192.0.2.5",
                    "port": 50000,
                    "mode": "xsalsa20_poly1305",
                    "data": {
                        "address": "192.0.2.5",
                        "port": 50000,
                        "mode": "xsalsa20_poly1305"
                    }
                }
            })
        );
    }

    #[test]
    fn serialize_heartbeat_as_bare_nonce() {
        let value: Event = Heartbeat {
            nonce: 1501184119561,
        }
        .into();

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"op": 3, "d": 1501184119561u64})
        );
    }

    #[test]
    fn serialize_speaking_omits_absent_user() {
        let value: Event = Speaking {
            delay: Some(0),
            speaking: SpeakingState::MICROPHONE,
            ssrc: 12345678,
            user_id: None,
        }
        .into();

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({
                "op": 5,
                "d": {"delay": 0, "speaking": 1, "ssrc": 12345678}
            })
        );
    }

    #[test]
    fn client_messages_survive_round_trips() {
        let messages: Vec<Event> = vec![
            Identify {
                server_id: GuildId(41771983423143937),
                session_id: "my_session_id".into(),
                token: "my_token".into(),
                user_id: UserId(104694319306248192),
                video: true,
                streams: vec![StreamRequest::default()],
            }
            .into(),
            SelectProtocol {
                protocol: "udp".into(),
                address: Ipv4Addr::new(203, 0, 113, 1).into(),
                port: 40404,
                mode: "xsalsa20_poly1305".into(),
                data: ProtocolData {
                    address: Ipv4Addr::new(203, 0, 113, 1).into(),
                    port: 40404,
                    mode: "xsalsa20_poly1305".into(),
                },
            }
            .into(),
            Heartbeat {
                nonce: 1501184119561,
            }
            .into(),
            Speaking {
                delay: Some(0),
                speaking: SpeakingState::MICROPHONE | SpeakingState::PRIORITY,
                ssrc: 42,
                user_id: None,
            }
            .into(),
        ];

        for message in messages {
            let encoded = serde_json::to_string(&message).unwrap();
            let decoded: Event = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, message);
        }
    }
}
