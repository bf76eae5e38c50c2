//! Unsolicited manager events

use crate::{envelope::Envelope, headers::AmiHeader};
use serde::{Deserialize, Serialize};

/// Error returned when parsing an unrecognized event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventTypeError(pub String);

impl std::fmt::Display for ParseEventTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for ParseEventTypeError {}

define_wire_enum! {
    error_type: ParseEventTypeError,
    /// Well-known event names. Events outside this list are still delivered;
    /// [`AmiEvent::event_type`] just returns `None` for them.
    pub enum AmiEventType {
        FullyBooted => "FullyBooted",
        Shutdown => "Shutdown",
        Reload => "Reload",
        Newchannel => "Newchannel",
        Newstate => "Newstate",
        Newexten => "Newexten",
        NewCallerid => "NewCallerid",
        NewConnectedLine => "NewConnectedLine",
        NewAccountCode => "NewAccountCode",
        VarSet => "VarSet",
        DialBegin => "DialBegin" | "Dial",
        DialState => "DialState",
        DialEnd => "DialEnd",
        OriginateResponse => "OriginateResponse" | "OriginateSuccess" | "OriginateFailure",
        BridgeCreate => "BridgeCreate",
        BridgeEnter => "BridgeEnter",
        BridgeLeave => "BridgeLeave",
        BridgeDestroy => "BridgeDestroy",
        Hold => "Hold",
        Unhold => "Unhold",
        DtmfBegin => "DTMFBegin",
        DtmfEnd => "DTMFEnd",
        HangupRequest => "HangupRequest",
        SoftHangupRequest => "SoftHangupRequest",
        Hangup => "Hangup",
        Cdr => "Cdr",
        Cel => "CEL",
        PeerStatus => "PeerStatus",
        ContactStatus => "ContactStatus",
        Registry => "Registry",
        UserEvent => "UserEvent",
    }
}

/// Inbound event: the `Event` name plus its headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiEvent {
    fields: Envelope,
}

impl AmiEvent {
    /// Wrap a classified envelope.
    pub fn from_envelope(fields: Envelope) -> Self {
        Self { fields }
    }

    /// `Event` header value.
    pub fn name(&self) -> &str {
        self.fields
            .get(AmiHeader::Event)
            .unwrap_or_default()
    }

    /// Parsed event name, if it is a well-known one.
    pub fn event_type(&self) -> Option<AmiEventType> {
        self.name()
            .parse()
            .ok()
    }

    /// Whether the event name matches (case-sensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.name() == name
    }

    /// Session routing key (`Uniqueid`).
    ///
    /// `None` when absent or empty; such events only reach the global stream.
    pub fn session_key(&self) -> Option<&str> {
        self.fields
            .get(AmiHeader::Uniqueid)
            .filter(|v| !v.is_empty())
    }

    /// `Channel` header.
    pub fn channel(&self) -> Option<&str> {
        self.fields
            .get(AmiHeader::Channel)
    }

    /// `Linkedid` header, shared by all channels of one call.
    pub fn linked_id(&self) -> Option<&str> {
        self.fields
            .get(AmiHeader::Linkedid)
    }

    /// `ActionID` echoed on events emitted in reply to an action
    /// (e.g. list actions, async `OriginateResponse`).
    pub fn action_id(&self) -> Option<&str> {
        self.fields
            .get(AmiHeader::ActionId)
    }

    /// Look up any event header.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.fields
            .get(key)
    }

    /// All event headers.
    pub fn fields(&self) -> &Envelope {
        &self.fields
    }
}
