//! Typed header names for manager actions, responses and events.

/// Error returned when parsing an unrecognized header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAmiHeaderError(pub String);

impl std::fmt::Display for ParseAmiHeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown manager header: {}", self.0)
    }
}

impl std::error::Error for ParseAmiHeaderError {}

define_wire_enum! {
    error_type: ParseAmiHeaderError,
    /// Header names used by the envelope protocol and the common actions/events.
    ///
    /// Envelope lookups are case-sensitive, so the wire spelling here is the
    /// one Asterisk emits (`ActionID`, `Uniqueid`, `CallerID`). Use with
    /// [`Envelope::get()`](crate::Envelope::get) and the typed accessors on
    /// responses and events.
    pub enum AmiHeader {
        Action => "Action",
        ActionId => "ActionID",
        Response => "Response",
        Message => "Message",
        Event => "Event",
        Privilege => "Privilege",
        Uniqueid => "Uniqueid",
        Linkedid => "Linkedid",
        Channel => "Channel",
        ChannelId => "ChannelID",
        OtherChannelId => "OtherChannelID",
        ChannelState => "ChannelState",
        ChannelStateDesc => "ChannelStateDesc",
        Variable => "Variable",
        Username => "Username",
        Secret => "Secret",
        Events => "Events",
        Context => "Context",
        Exten => "Exten",
        Priority => "Priority",
        CallerId => "CallerID",
        CallerIdNum => "CallerIDNum",
        CallerIdName => "CallerIDName",
        Timeout => "Timeout",
        Async => "Async",
        Account => "Account",
        Application => "Application",
        Data => "Data",
        Reason => "Reason",
        Cause => "Cause",
        CauseTxt => "Cause-txt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_wire_spelling() {
        assert_eq!(AmiHeader::ActionId.to_string(), "ActionID");
        assert_eq!(AmiHeader::Uniqueid.to_string(), "Uniqueid");
        assert_eq!(AmiHeader::CallerId.to_string(), "CallerID");
        assert_eq!(AmiHeader::CauseTxt.to_string(), "Cause-txt");
    }

    #[test]
    fn as_ref_str() {
        let h: &str = AmiHeader::ActionId.as_ref();
        assert_eq!(h, "ActionID");
    }

    #[test]
    fn from_str_case_insensitive() {
        assert_eq!("actionid".parse::<AmiHeader>(), Ok(AmiHeader::ActionId));
        assert_eq!("ACTIONID".parse::<AmiHeader>(), Ok(AmiHeader::ActionId));
        assert_eq!("UniqueID".parse::<AmiHeader>(), Ok(AmiHeader::Uniqueid));
    }

    #[test]
    fn from_str_unknown() {
        let err = "X-Not-A-Header"
            .parse::<AmiHeader>()
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown manager header: X-Not-A-Header");
    }

    #[test]
    fn every_variant_parses_back() {
        for v in AmiHeader::ALL {
            let parsed: AmiHeader = v
                .as_str()
                .parse()
                .unwrap();
            assert_eq!(parsed, *v, "round-trip failed for {v}");
        }
    }
}
