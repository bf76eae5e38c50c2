//! Responses correlated to earlier actions

use crate::{
    constants::RESPONSE_ERROR,
    envelope::Envelope,
    error::{AmiError, AmiResult},
    headers::AmiHeader,
};

/// Classification of the `Response` header.
///
/// Only `Error` marks a failed action; everything else, including an absent
/// header, counts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResponseStatus {
    /// `Response: Success`
    Success,
    /// `Response: Error`
    Error,
    /// `Response: Follows` (command output follows in the payload)
    Follows,
    /// `Response: Goodbye` (reply to `Logoff`)
    Goodbye,
    /// Any other value, or no `Response` header.
    Other,
}

impl ResponseStatus {
    fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("Success") => ResponseStatus::Success,
            Some(RESPONSE_ERROR) => ResponseStatus::Error,
            Some("Follows") => ResponseStatus::Follows,
            Some("Goodbye") => ResponseStatus::Goodbye,
            _ => ResponseStatus::Other,
        }
    }
}

/// Inbound reply to an action.
#[derive(Debug, Clone, PartialEq)]
pub struct AmiResponse {
    fields: Envelope,
    status: ResponseStatus,
}

impl AmiResponse {
    /// Wrap a classified envelope.
    pub fn from_envelope(fields: Envelope) -> Self {
        let status = ResponseStatus::from_header(fields.get(AmiHeader::Response));
        Self { fields, status }
    }

    /// `true` unless the server answered `Response: Error`.
    pub fn is_success(&self) -> bool {
        self.status != ResponseStatus::Error
    }

    /// `true` if the server answered `Response: Error`.
    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Classification of the `Response` header.
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Echoed correlation key.
    pub fn action_id(&self) -> Option<&str> {
        self.fields
            .get(AmiHeader::ActionId)
    }

    /// `Message` header, usually set on errors and informational replies.
    pub fn message(&self) -> Option<&str> {
        self.fields
            .get(AmiHeader::Message)
    }

    /// Look up any response header.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.fields
            .get(key)
    }

    /// All response headers.
    pub fn fields(&self) -> &Envelope {
        &self.fields
    }

    /// Convert to a result based on the status.
    ///
    /// ```
    /// # use asterisk_ami_tokio::{AmiResponse, Envelope};
    /// let env: Envelope = [("Response", "Error"), ("Message", "Permission denied")]
    ///     .into_iter()
    ///     .collect();
    /// let err = AmiResponse::from_envelope(env).into_result().unwrap_err();
    /// assert_eq!(err.to_string(), "action failed: Permission denied");
    /// ```
    pub fn into_result(self) -> AmiResult<Self> {
        if self.is_error() {
            let message = self
                .message()
                .unwrap_or(RESPONSE_ERROR)
                .to_string();
            return Err(AmiError::ActionFailed { message });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(pairs: &[(&str, &str)]) -> AmiResponse {
        AmiResponse::from_envelope(
            pairs
                .iter()
                .copied()
                .collect(),
        )
    }

    #[test]
    fn success_and_error() {
        let ok = response(&[("Response", "Success"), ("ActionID", "7"), ("Ping", "Pong")]);
        assert!(ok.is_success());
        assert_eq!(ok.status(), ResponseStatus::Success);
        assert_eq!(ok.action_id(), Some("7"));
        assert_eq!(ok.get("Ping"), Some("Pong"));

        let err = response(&[("Response", "Error"), ("Message", "Authentication failed")]);
        assert!(err.is_error());
        assert_eq!(err.message(), Some("Authentication failed"));
    }

    #[test]
    fn non_error_statuses_are_success() {
        assert_eq!(
            response(&[("Response", "Follows")]).status(),
            ResponseStatus::Follows
        );
        assert!(response(&[("Response", "Goodbye")]).is_success());
        assert!(response(&[("ActionID", "1")]).is_success());
        assert_eq!(
            response(&[("Response", "Unknown")]).status(),
            ResponseStatus::Other
        );
    }

    #[test]
    fn only_response_header_discriminates() {
        // An `Action: Error` key on its own is not an error reply.
        let resp = response(&[("Action", "Error"), ("Response", "Success")]);
        assert!(resp.is_success());
    }

    #[test]
    fn into_result_without_message() {
        let err = response(&[("Response", "Error")])
            .into_result()
            .unwrap_err();
        assert!(matches!(err, AmiError::ActionFailed { ref message } if message == "Error"));
    }
}
