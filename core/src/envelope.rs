// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire envelope for the relay's datagram channels.
//!
//! Both channels speak the same JSON framing:
//! `{"lobby": <id>, "role": "host"|"client", "type": "register"?, "payload": ...?}`.
//! Each channel interprets the envelope through its own command enum, and
//! anything that does not match a recognized shape is rejected outright so
//! the relay loops can drop it without touching any registration.

use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::session::LobbyId;

/// Which side of a session a datagram claims to come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Client,
}

/// Reasons an incoming datagram is not a valid relay message
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("unparseable envelope: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("empty lobby id")]
    EmptyLobby,
    #[error("payload required but missing")]
    MissingPayload,
    #[error("unrecognized message shape for this channel")]
    UnknownShape,
}

/// Raw envelope as it appears on the wire.
///
/// `payload` is kept as [`RawValue`] so a forwarded payload is the exact
/// bytes the sender produced, not a re-serialization.
#[derive(Debug, Deserialize)]
struct RelayEnvelope {
    lobby: LobbyId,
    role: Role,
    #[serde(rename = "type")]
    kind: Option<String>,
    payload: Option<Box<RawValue>>,
}

impl RelayEnvelope {
    fn from_bytes(buf: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: RelayEnvelope = serde_json::from_slice(buf)?;
        if envelope.lobby.is_empty() {
            return Err(EnvelopeError::EmptyLobby);
        }
        Ok(envelope)
    }

    fn is_register(&self) -> Result<bool, EnvelopeError> {
        match self.kind.as_deref() {
            None => Ok(false),
            Some("register") => Ok(true),
            Some(_) => Err(EnvelopeError::UnknownShape),
        }
    }
}

/// A datagram understood by the control channel
#[derive(Debug)]
pub enum ControlCommand {
    /// The host announcing (or refreshing) where control traffic should go
    RegisterHost,
    /// A client payload to be forwarded to the registered host
    ForwardToHost { payload: Box<RawValue> },
}

impl ControlCommand {
    /// Parse a control-channel datagram, returning the lobby it targets.
    pub fn parse(buf: &[u8]) -> Result<(LobbyId, Self), EnvelopeError> {
        let envelope = RelayEnvelope::from_bytes(buf)?;
        let register = envelope.is_register()?;
        let cmd = match envelope.role {
            Role::Host => ControlCommand::RegisterHost,
            Role::Client if register => return Err(EnvelopeError::UnknownShape),
            Role::Client => ControlCommand::ForwardToHost {
                payload: envelope.payload.ok_or(EnvelopeError::MissingPayload)?,
            },
        };
        Ok((envelope.lobby, cmd))
    }
}

/// A datagram understood by the state channel
#[derive(Debug)]
pub enum StateCommand {
    /// A client subscribing (or re-subscribing) to state broadcasts
    RegisterClient,
    /// A host snapshot to fan out to every registered client
    Broadcast { payload: Box<RawValue> },
}

impl StateCommand {
    /// Parse a state-channel datagram, returning the lobby it targets.
    pub fn parse(buf: &[u8]) -> Result<(LobbyId, Self), EnvelopeError> {
        let envelope = RelayEnvelope::from_bytes(buf)?;
        let register = envelope.is_register()?;
        let cmd = match envelope.role {
            Role::Client if register => StateCommand::RegisterClient,
            Role::Client => return Err(EnvelopeError::UnknownShape),
            Role::Host if register => return Err(EnvelopeError::UnknownShape),
            Role::Host => StateCommand::Broadcast {
                payload: envelope.payload.ok_or(EnvelopeError::MissingPayload)?,
            },
        };
        Ok((envelope.lobby, cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_host_registers() {
        let (lobby, cmd) = ControlCommand::parse(br#"{"lobby":"abc","role":"host"}"#).unwrap();
        assert_eq!(lobby, "abc");
        assert!(matches!(cmd, ControlCommand::RegisterHost));
    }

    #[test]
    fn control_client_payload_is_verbatim() {
        let raw = br#"{"lobby":"abc","role":"client","payload":{"attack":true,"dash":false}}"#;
        let (lobby, cmd) = ControlCommand::parse(raw).unwrap();
        assert_eq!(lobby, "abc");
        match cmd {
            ControlCommand::ForwardToHost { payload } => {
                assert_eq!(payload.get(), r#"{"attack":true,"dash":false}"#);
            }
            other => panic!("expected forward, got {:?}", other),
        }
    }

    #[test]
    fn control_client_without_payload_rejected() {
        let err = ControlCommand::parse(br#"{"lobby":"abc","role":"client"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingPayload));
    }

    #[test]
    fn control_client_register_rejected() {
        let err =
            ControlCommand::parse(br#"{"lobby":"abc","role":"client","type":"register"}"#)
                .unwrap_err();
        assert!(matches!(err, EnvelopeError::UnknownShape));
    }

    #[test]
    fn state_client_registers() {
        let (lobby, cmd) =
            StateCommand::parse(br#"{"lobby":"g1","role":"client","type":"register"}"#).unwrap();
        assert_eq!(lobby, "g1");
        assert!(matches!(cmd, StateCommand::RegisterClient));
    }

    #[test]
    fn state_host_broadcast_payload_is_verbatim() {
        let raw = br#"{"lobby":"g1","role":"host","payload":[1,2,3]}"#;
        let (_, cmd) = StateCommand::parse(raw).unwrap();
        match cmd {
            StateCommand::Broadcast { payload } => assert_eq!(payload.get(), "[1,2,3]"),
            other => panic!("expected broadcast, got {:?}", other),
        }
    }

    #[test]
    fn state_client_without_register_rejected() {
        let err = StateCommand::parse(br#"{"lobby":"g1","role":"client"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnknownShape));
    }

    #[test]
    fn state_host_register_rejected() {
        let err =
            StateCommand::parse(br#"{"lobby":"g1","role":"host","type":"register"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnknownShape));
    }

    #[test]
    fn unknown_role_rejected() {
        let err = ControlCommand::parse(br#"{"lobby":"abc","role":"spectator"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::Invalid(_)));
    }

    #[test]
    fn unknown_type_rejected() {
        let err =
            StateCommand::parse(br#"{"lobby":"g1","role":"client","type":"subscribe"}"#)
                .unwrap_err();
        assert!(matches!(err, EnvelopeError::UnknownShape));
    }

    #[test]
    fn garbage_rejected() {
        assert!(ControlCommand::parse(b"not json at all").is_err());
        assert!(StateCommand::parse(&[0xff, 0xfe, 0x00]).is_err());
        assert!(ControlCommand::parse(br#"{"lobby":"abc"#).is_err());
        assert!(StateCommand::parse(br#"{"role":"host","payload":1}"#).is_err());
    }

    #[test]
    fn empty_lobby_rejected() {
        let err = ControlCommand::parse(br#"{"lobby":"","role":"host"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::EmptyLobby));
    }
}
