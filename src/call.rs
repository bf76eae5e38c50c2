//! Call outcome codes carried on originate and hangup events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of an originate, from the `Reason` header of `OriginateResponse`.
///
/// The numbers are the control frame codes Asterisk reports for the dialed
/// leg's last state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[repr(u8)]
pub enum OriginateReason {
    /// Dial failed outright (no such extension, channel unavailable).
    Failure = 0,
    /// Remote end hung up before answering.
    Hangup = 1,
    /// Rang until the dial timeout without an answer.
    NoAnswer = 3,
    /// Answered.
    Answered = 4,
    /// Busy.
    Busy = 5,
    /// Network congestion.
    Congestion = 8,
}

impl OriginateReason {
    /// Parse from the numeric `Reason` value.
    pub fn from_code(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Failure),
            1 => Some(Self::Hangup),
            3 => Some(Self::NoAnswer),
            4 => Some(Self::Answered),
            5 => Some(Self::Busy),
            8 => Some(Self::Congestion),
            _ => None,
        }
    }

    /// Numeric code as sent on the wire.
    pub fn as_code(&self) -> u8 {
        *self as u8
    }

    /// `true` for [`Answered`](Self::Answered).
    pub fn is_answered(&self) -> bool {
        *self == Self::Answered
    }
}

impl fmt::Display for OriginateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Failure => "failure",
            Self::Hangup => "hangup",
            Self::NoAnswer => "no answer",
            Self::Answered => "answered",
            Self::Busy => "busy",
            Self::Congestion => "congestion",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing an invalid numeric code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCodeError(pub String);

impl fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown code: {}", self.0)
    }
}

impl std::error::Error for ParseCodeError {}

impl FromStr for OriginateReason {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| ParseCodeError(s.to_string()))
    }
}

/// Q.850 hangup cause from the `Cause` header of `Hangup`.
///
/// Only the causes a dialer commonly branches on get a variant; everything
/// else is kept as [`Other`](Self::Other) with its raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum HangupCause {
    NotDefined,
    UnallocatedNumber,
    NormalClearing,
    UserBusy,
    NoUserResponse,
    NoAnswer,
    CallRejected,
    NumberChanged,
    DestinationOutOfOrder,
    InvalidNumberFormat,
    NormalUnspecified,
    NoCircuitAvailable,
    NetworkOutOfOrder,
    TemporaryFailure,
    SwitchCongestion,
    Other(u16),
}

impl HangupCause {
    /// Map a Q.850 cause number.
    pub fn from_code(n: u16) -> Self {
        match n {
            0 => Self::NotDefined,
            1 => Self::UnallocatedNumber,
            16 => Self::NormalClearing,
            17 => Self::UserBusy,
            18 => Self::NoUserResponse,
            19 => Self::NoAnswer,
            21 => Self::CallRejected,
            22 => Self::NumberChanged,
            27 => Self::DestinationOutOfOrder,
            28 => Self::InvalidNumberFormat,
            31 => Self::NormalUnspecified,
            34 => Self::NoCircuitAvailable,
            38 => Self::NetworkOutOfOrder,
            41 => Self::TemporaryFailure,
            42 => Self::SwitchCongestion,
            other => Self::Other(other),
        }
    }

    /// Q.850 cause number.
    pub fn as_code(&self) -> u16 {
        match self {
            Self::NotDefined => 0,
            Self::UnallocatedNumber => 1,
            Self::NormalClearing => 16,
            Self::UserBusy => 17,
            Self::NoUserResponse => 18,
            Self::NoAnswer => 19,
            Self::CallRejected => 21,
            Self::NumberChanged => 22,
            Self::DestinationOutOfOrder => 27,
            Self::InvalidNumberFormat => 28,
            Self::NormalUnspecified => 31,
            Self::NoCircuitAvailable => 34,
            Self::NetworkOutOfOrder => 38,
            Self::TemporaryFailure => 41,
            Self::SwitchCongestion => 42,
            Self::Other(n) => *n,
        }
    }
}

impl fmt::Display for HangupCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotDefined => "NOT_DEFINED",
            Self::UnallocatedNumber => "UNALLOCATED_NUMBER",
            Self::NormalClearing => "NORMAL_CLEARING",
            Self::UserBusy => "USER_BUSY",
            Self::NoUserResponse => "NO_USER_RESPONSE",
            Self::NoAnswer => "NO_ANSWER",
            Self::CallRejected => "CALL_REJECTED",
            Self::NumberChanged => "NUMBER_CHANGED",
            Self::DestinationOutOfOrder => "DESTINATION_OUT_OF_ORDER",
            Self::InvalidNumberFormat => "INVALID_NUMBER_FORMAT",
            Self::NormalUnspecified => "NORMAL_UNSPECIFIED",
            Self::NoCircuitAvailable => "NO_CIRCUIT_AVAILABLE",
            Self::NetworkOutOfOrder => "NETWORK_OUT_OF_ORDER",
            Self::TemporaryFailure => "TEMPORARY_FAILURE",
            Self::SwitchCongestion => "SWITCH_CONGESTION",
            Self::Other(n) => return write!(f, "CAUSE_{}", n),
        };
        f.write_str(name)
    }
}

impl FromStr for HangupCause {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u16>()
            .map(Self::from_code)
            .map_err(|_| ParseCodeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn originate_reason_codes() {
        assert_eq!(OriginateReason::from_code(4), Some(OriginateReason::Answered));
        assert_eq!(OriginateReason::from_code(8), Some(OriginateReason::Congestion));
        assert_eq!(OriginateReason::from_code(2), None);
        assert_eq!(OriginateReason::Busy.as_code(), 5);
        assert!(OriginateReason::Answered.is_answered());
        assert!(!OriginateReason::NoAnswer.is_answered());
    }

    #[test]
    fn originate_reason_from_str() {
        assert_eq!("4".parse::<OriginateReason>(), Ok(OriginateReason::Answered));
        assert_eq!(" 0 ".parse::<OriginateReason>(), Ok(OriginateReason::Failure));
        assert!("answered"
            .parse::<OriginateReason>()
            .is_err());
        assert!("7"
            .parse::<OriginateReason>()
            .is_err());
    }

    #[test]
    fn originate_reason_display() {
        assert_eq!(OriginateReason::NoAnswer.to_string(), "no answer");
    }

    #[test]
    fn hangup_cause_round_trip() {
        for n in [0u16, 1, 16, 17, 18, 19, 21, 22, 27, 28, 31, 34, 38, 41, 42, 102] {
            assert_eq!(HangupCause::from_code(n).as_code(), n);
        }
    }

    #[test]
    fn hangup_cause_display_and_parse() {
        assert_eq!(HangupCause::NormalClearing.to_string(), "NORMAL_CLEARING");
        assert_eq!(HangupCause::Other(102).to_string(), "CAUSE_102");
        assert_eq!("17".parse::<HangupCause>(), Ok(HangupCause::UserBusy));
        assert!("busy"
            .parse::<HangupCause>()
            .is_err());
    }
}
