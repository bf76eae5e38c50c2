//! Outbound action envelopes

use crate::{
    constants::{FRAME_TERMINATOR, LINE_TERMINATOR},
    envelope::Envelope,
    error::{AmiError, AmiResult},
    headers::AmiHeader,
    variables::Variables,
};
use std::fmt;

/// Reject values that would split into extra wire lines.
fn validate_no_newlines(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::ProtocolError {
            message: format!("{} must not contain newlines", context),
        });
    }
    Ok(())
}

fn validate_key(key: &str) -> AmiResult<()> {
    if key.is_empty() {
        return Err(AmiError::protocol_error("header name must not be empty"));
    }
    if key.contains(':') {
        return Err(AmiError::protocol_error(format!(
            "header name '{}' must not contain ':'",
            key
        )));
    }
    validate_no_newlines(key, "header name")
}

/// An outbound manager command.
///
/// Always carries an `Action` key. The client assigns `ActionID` on submit,
/// overwriting any value set here. Variables are emitted as one synthesized
/// `Variable` line after the other keys.
///
/// ```
/// use asterisk_ami_tokio::AmiAction;
///
/// let action = AmiAction::new("Setvar")
///     .param("Channel", "PJSIP/100-00000001")
///     .param("Variable", "FOO")
///     .param("Value", "bar");
/// let wire = action.to_wire_format(',').unwrap();
/// assert!(wire.starts_with("Action: Setvar\r\n"));
/// assert!(wire.ends_with("Value: bar\r\n\r\n"));
/// ```
#[derive(Clone, PartialEq)]
pub struct AmiAction {
    fields: Envelope,
    variables: Variables,
}

impl AmiAction {
    /// Start an action with the given `Action` name.
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Envelope::new();
        fields.set(AmiHeader::Action.as_str(), name);
        Self {
            fields,
            variables: Variables::new(),
        }
    }

    /// `Login` action used by the handshake.
    pub fn login(username: &str, secret: &str) -> Self {
        Self::new("Login")
            .param(AmiHeader::Username, username)
            .param(AmiHeader::Secret, secret)
    }

    /// `Ping` keepalive.
    pub fn ping() -> Self {
        Self::new("Ping")
    }

    /// `Logoff`, ending the manager session server-side.
    pub fn logoff() -> Self {
        Self::new("Logoff")
    }

    /// Add a parameter. Empty values are skipped, the manager treats an
    /// absent optional parameter and an empty one the same way.
    pub fn param(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_param(key, value);
        self
    }

    /// Add a parameter in place. Empty values are skipped.
    pub fn set_param(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.fields
            .set(key.as_ref(), value);
    }

    /// Add a channel variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables
            .set(name, value);
        self
    }

    /// Add several channel variables.
    pub fn variables<N, V>(mut self, vars: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        for (n, v) in vars {
            self.variables
                .set(n, v);
        }
        self
    }

    /// The `Action` name.
    pub fn name(&self) -> &str {
        self.fields
            .get(AmiHeader::Action)
            .unwrap_or_default()
    }

    /// Parameter value by key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.fields
            .get(key)
    }

    /// The correlation key, once assigned.
    pub fn action_id(&self) -> Option<&str> {
        self.fields
            .get(AmiHeader::ActionId)
    }

    pub(crate) fn set_action_id(&mut self, id: &str) {
        self.fields
            .set(AmiHeader::ActionId.as_str(), id);
    }

    /// All explicit parameters (the `Variable` line is not included).
    pub fn fields(&self) -> &Envelope {
        &self.fields
    }

    /// Channel variables.
    pub fn vars(&self) -> &Variables {
        &self.variables
    }

    /// Serialize to wire format, joining variables with `separator`.
    ///
    /// A synthesized `Variable` line replaces any explicit `Variable`
    /// parameter when variables are set.
    pub fn to_wire_format(&self, separator: char) -> AmiResult<String> {
        let mut out = String::new();
        let synthesize = !self
            .variables
            .is_empty();

        for (key, value) in self
            .fields
            .iter()
        {
            if synthesize && key == AmiHeader::Variable.as_str() {
                continue;
            }
            validate_key(key)?;
            validate_no_newlines(value, key)?;
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(LINE_TERMINATOR);
        }

        if synthesize {
            let joined = self
                .variables
                .to_wire(separator);
            validate_no_newlines(&joined, "variables")?;
            out.push_str(AmiHeader::Variable.as_str());
            out.push_str(": ");
            out.push_str(&joined);
            out.push_str(LINE_TERMINATOR);
        }

        if out.is_empty() {
            out.push_str(LINE_TERMINATOR);
        }
        out.push_str(LINE_TERMINATOR);
        debug_assert!(out.ends_with(FRAME_TERMINATOR));
        Ok(out)
    }

    /// Single-line rendering for logs, with the secret redacted.
    pub(crate) fn log_line(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| {
                if k == AmiHeader::Secret.as_str() {
                    format!("{}: [REDACTED]", k)
                } else {
                    format!("{}: {}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiAction")
            .field("fields", &self.log_line())
            .field("variables", &self.variables)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::extract_frames;
    use proptest::prelude::*;

    #[test]
    fn wire_format_orders_keys_and_terminates() {
        let mut action = AmiAction::new("Ping");
        action.set_action_id("17");
        assert_eq!(
            action
                .to_wire_format(',')
                .unwrap(),
            "Action: Ping\r\nActionID: 17\r\n\r\n"
        );
    }

    #[test]
    fn variables_become_one_line() {
        let action = AmiAction::new("Originate")
            .param("Channel", "PJSIP/100")
            .variable("one", "1")
            .variable("two", "2");
        let wire = action
            .to_wire_format(',')
            .unwrap();
        assert_eq!(
            wire,
            "Action: Originate\r\nChannel: PJSIP/100\r\nVariable: one=1,two=2\r\n\r\n"
        );
        let legacy = action
            .to_wire_format('|')
            .unwrap();
        assert!(legacy.contains("Variable: one=1|two=2\r\n"));
    }

    #[test]
    fn synthesized_variable_replaces_explicit_param() {
        let action = AmiAction::new("Originate")
            .param("Variable", "stale=1")
            .variable("fresh", "2");
        let wire = action
            .to_wire_format(',')
            .unwrap();
        assert!(!wire.contains("stale"));
        assert_eq!(wire.matches("Variable:").count(), 1);
    }

    #[test]
    fn empty_params_are_skipped() {
        let action = AmiAction::new("Originate")
            .param("Account", "")
            .param("Context", "default");
        assert_eq!(action.get("Account"), None);
        assert_eq!(action.get("Context"), Some("default"));
    }

    #[test]
    fn newline_injection_rejected() {
        let action = AmiAction::new("Command").param("Command", "core show channels\r\nAction: Logoff");
        assert!(matches!(
            action.to_wire_format(','),
            Err(AmiError::ProtocolError { .. })
        ));

        let action = AmiAction::new("Ping").variable("x", "1\r\n");
        assert!(action
            .to_wire_format(',')
            .is_err());
    }

    #[test]
    fn colon_in_key_rejected() {
        let action = AmiAction::new("Ping").param("Bad:Key", "v");
        assert!(action
            .to_wire_format(',')
            .is_err());
    }

    #[test]
    fn round_trip_through_codec() {
        let mut action = AmiAction::new("Originate")
            .param("Channel", "PJSIP/100")
            .param("Context", "from-internal")
            .param("Exten", "200")
            .param("Priority", "1");
        action.set_action_id("abc.1");
        let wire = action
            .to_wire_format(',')
            .unwrap();

        let (frames, rest) = extract_frames(wire.as_bytes());
        assert!(rest.is_empty());
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0], action.fields());
    }

    proptest! {
        #[test]
        fn any_action_round_trips(
            name in "[A-Za-z][A-Za-z0-9]{0,15}",
            params in prop::collection::vec(("X[A-Za-z0-9-]{0,10}", "[!-~]([ -~]{0,20}[!-~])?"), 0..8),
            vars in prop::collection::vec(("[A-Za-z_][A-Za-z0-9_]{0,8}", "[A-Za-z0-9_./@-]{0,10}"), 0..5),
            separator in prop::sample::select(vec![',', '|']),
        ) {
            let mut action = AmiAction::new(name)
                .variables(vars.iter().map(|(n, v)| (n.as_str(), v.as_str())));
            for (key, value) in &params {
                action.set_param(key, value.as_str());
            }
            action.set_action_id("1700000000.42");

            let wire = action.to_wire_format(separator).unwrap();
            let (mut frames, rest) = extract_frames(wire.as_bytes());
            prop_assert!(rest.is_empty());
            prop_assert_eq!(frames.len(), 1);

            let mut frame = frames.remove(0);
            let line = frame.remove("Variable");
            prop_assert_eq!(&frame, action.fields());
            match line {
                Some(line) => prop_assert_eq!(&Variables::parse(&line, separator), action.vars()),
                None => prop_assert!(action.vars().is_empty()),
            }
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let action = AmiAction::login("admin", "hunter2");
        let dbg = format!("{:?}", action);
        assert!(dbg.contains("Username: admin"));
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("hunter2"));
        // The wire still carries it.
        assert!(action
            .to_wire_format(',')
            .unwrap()
            .contains("Secret: hunter2\r\n"));
    }
}
