//! Call origination on top of submit and the listener registry

use crate::{
    action::AmiAction,
    call::{HangupCause, OriginateReason},
    connection::AmiClient,
    constants::ORIGINATE_TIMEOUT_SLACK_MS,
    correlation::next_key,
    error::{AmiError, AmiResult},
    event::{AmiEvent, AmiEventType},
    headers::AmiHeader,
    registry::EventListener,
    response::AmiResponse,
    variables::Variables,
};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, info};

/// Parameters of an `Originate` action.
///
/// Empty strings are left off the wire. Either `exten` (with `context` and
/// `priority`) or `application` (with optional `data`) selects what the
/// answered channel runs.
///
/// ```
/// use asterisk_ami_tokio::OriginateRequest;
/// use std::time::Duration;
///
/// let mut request = OriginateRequest {
///     channel: "PJSIP/100".into(),
///     context: "from-internal".into(),
///     exten: "200".into(),
///     priority: "1".into(),
///     caller_id: "\"Dialer\" <5551000>".into(),
///     timeout: Some(Duration::from_secs(30)),
///     ..Default::default()
/// };
/// request.variables.set("CAMPAIGN", "spring");
///
/// let action = request.to_action("1700000000.1");
/// assert_eq!(action.get("Timeout"), Some("30000"));
/// assert_eq!(action.get("ChannelID"), Some("1700000000.1"));
/// assert_eq!(action.get("Async"), Some("true"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OriginateRequest {
    /// Channel to dial, e.g. `PJSIP/100` or `Local/200@from-internal`.
    pub channel: String,
    /// Dialplan context to enter on answer.
    pub context: String,
    /// Extension to enter on answer.
    pub exten: String,
    /// Priority (number or label) to enter on answer.
    pub priority: String,
    /// Ring timeout; sent in milliseconds.
    pub timeout: Option<Duration>,
    /// Caller ID presented to the dialed party.
    pub caller_id: String,
    /// Account code.
    pub account: String,
    /// Application to run on answer instead of the dialplan.
    pub application: String,
    /// Argument for `application`.
    pub data: String,
    /// Channel variables set on the new channel.
    pub variables: Variables,
    /// Reply as soon as the call is queued and report the outcome with an
    /// `OriginateResponse` event. Default: `true`.
    pub run_async: bool,
}

impl Default for OriginateRequest {
    fn default() -> Self {
        Self {
            channel: String::new(),
            context: String::new(),
            exten: String::new(),
            priority: String::new(),
            timeout: None,
            caller_id: String::new(),
            account: String::new(),
            application: String::new(),
            data: String::new(),
            variables: Variables::new(),
            run_async: true,
        }
    }
}

impl OriginateRequest {
    /// Build the action. `session_key` becomes the new channel's `Uniqueid`
    /// (via `ChannelID`), so its events route to the listener for that key.
    pub fn to_action(&self, session_key: &str) -> AmiAction {
        let timeout = self
            .timeout
            .map(|t| {
                t.as_millis()
                    .to_string()
            })
            .unwrap_or_default();

        let mut action = AmiAction::new("Originate")
            .param(AmiHeader::Channel, self.channel.as_str())
            .param(AmiHeader::Context, self.context.as_str())
            .param(AmiHeader::Exten, self.exten.as_str())
            .param(AmiHeader::Priority, self.priority.as_str())
            .param(AmiHeader::Timeout, timeout)
            .param(AmiHeader::CallerId, self.caller_id.as_str())
            .param(AmiHeader::Account, self.account.as_str())
            .param(AmiHeader::Application, self.application.as_str())
            .param(AmiHeader::Data, self.data.as_str())
            .param(AmiHeader::ChannelId, session_key)
            .variables(
                self.variables
                    .iter(),
            );
        if self.run_async {
            action.set_param(AmiHeader::Async, "true");
        }
        action
    }

    /// Response wait used when the caller passes no timeout: the ring
    /// timeout plus slack, but never less than `request_timeout`.
    pub fn derived_wait(&self, request_timeout: Duration) -> Duration {
        let dial = self
            .timeout
            .unwrap_or_default()
            + Duration::from_millis(ORIGINATE_TIMEOUT_SLACK_MS);
        request_timeout.max(dial)
    }
}

/// A call placed with [`AmiClient::originate`].
///
/// Yields the events of the new channel until its terminal event, tracking
/// the `OriginateResponse` reason and the `Hangup` cause as they pass.
#[derive(Debug)]
pub struct OriginateCall {
    listener: EventListener,
    response: AmiResponse,
    reason: Option<OriginateReason>,
    cause: Option<HangupCause>,
}

impl OriginateCall {
    fn new(listener: EventListener, response: AmiResponse) -> Self {
        Self {
            listener,
            response,
            reason: None,
            cause: None,
        }
    }

    fn observe(&mut self, event: &AmiEvent) {
        match event.event_type() {
            Some(AmiEventType::OriginateResponse) => {
                self.reason = event
                    .get(AmiHeader::Reason)
                    .and_then(|r| {
                        r.parse()
                            .ok()
                    });
            }
            Some(AmiEventType::Hangup) => {
                self.cause = event
                    .get(AmiHeader::Cause)
                    .and_then(|c| {
                        c.parse()
                            .ok()
                    });
            }
            _ => {}
        }
    }

    /// Session key (`Uniqueid`) of the originated channel.
    pub fn session_key(&self) -> &str {
        self.listener
            .session_key()
    }

    /// Response to the `Originate` action itself.
    pub fn response(&self) -> &AmiResponse {
        &self.response
    }

    /// Next event for this call, or `None` once the call has ended.
    pub async fn next_event(&mut self) -> Option<AmiEvent> {
        let event = self
            .listener
            .recv()
            .await?;
        self.observe(&event);
        Some(event)
    }

    /// The call's event sequence. Same as polling `self` as a `Stream`.
    pub fn events(&mut self) -> &mut Self {
        self
    }

    /// Whether the underlying listener has closed. Events queued before the
    /// close can still be read.
    pub fn is_finished(&self) -> bool {
        self.listener
            .is_closed()
    }

    /// Reason from the last `OriginateResponse` event seen.
    pub fn response_reason(&self) -> Option<OriginateReason> {
        self.reason
    }

    /// Cause from the `Hangup` event, once seen.
    pub fn hangup_cause(&self) -> Option<HangupCause> {
        self.cause
    }

    /// Stop following the call.
    pub fn close(&mut self) {
        self.listener
            .close();
    }

    /// Give up the tracking and keep the raw listener.
    pub fn into_listener(self) -> EventListener {
        self.listener
    }
}

impl futures_util::Stream for OriginateCall {
    type Item = AmiEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self
            .listener
            .poll_recv(cx);
        if let Poll::Ready(Some(event)) = &polled {
            self.observe(event);
        }
        polled
    }
}

impl AmiClient {
    /// Place a call and follow its events.
    ///
    /// The listener is registered before the action is written, so no event
    /// of the new channel can be missed. A zero `timeout` waits
    /// `max(request_timeout, request.timeout + 500ms)`.
    ///
    /// ```rust,no_run
    /// # async fn example(client: &asterisk_ami_tokio::AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
    /// use asterisk_ami_tokio::OriginateRequest;
    /// use std::time::Duration;
    ///
    /// let request = OriginateRequest {
    ///     channel: "PJSIP/100".into(),
    ///     application: "Playback".into(),
    ///     data: "hello-world".into(),
    ///     timeout: Some(Duration::from_secs(20)),
    ///     ..Default::default()
    /// };
    /// let mut call = client.originate(request, Duration::ZERO).await?;
    /// while let Some(event) = call.next_event().await {
    ///     println!("{} {}", call.session_key(), event.name());
    /// }
    /// println!("reason={:?} cause={:?}", call.response_reason(), call.hangup_cause());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn originate(
        &self,
        request: OriginateRequest,
        timeout: Duration,
    ) -> AmiResult<OriginateCall> {
        let wait = if timeout.is_zero() {
            request.derived_wait(
                self.config()
                    .request_timeout,
            )
        } else {
            timeout
        };

        let session_key = next_key();
        let mut listener = self.register(&session_key)?;
        let action = request.to_action(&session_key);
        info!("Originating {} as session {}", request.channel, session_key);

        match self
            .submit(action, wait)
            .await
        {
            Ok(response) if response.is_error() => {
                listener.close();
                let message = response
                    .message()
                    .unwrap_or("Originate rejected")
                    .to_string();
                debug!("Originate {} rejected: {}", session_key, message);
                Err(AmiError::OriginateFailed { message })
            }
            Ok(response) => Ok(OriginateCall::new(listener, response)),
            Err(AmiError::Timeout { timeout_ms }) => {
                listener.close();
                Err(AmiError::OriginateTimeout { timeout_ms })
            }
            Err(e) => {
                listener.close();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_skips_empty_fields() {
        let request = OriginateRequest {
            channel: "Local/100@test".into(),
            application: "Echo".into(),
            run_async: false,
            ..Default::default()
        };
        let action = request.to_action("key.1");
        assert_eq!(action.name(), "Originate");
        assert_eq!(action.get("Channel"), Some("Local/100@test"));
        assert_eq!(action.get("Application"), Some("Echo"));
        assert_eq!(action.get("Context"), None);
        assert_eq!(action.get("Timeout"), None);
        assert_eq!(action.get("Async"), None);
        assert_eq!(action.get("ChannelID"), Some("key.1"));
    }

    #[test]
    fn variables_on_one_line() {
        let mut request = OriginateRequest {
            channel: "PJSIP/100".into(),
            ..Default::default()
        };
        request
            .variables
            .set("A", "1");
        request
            .variables
            .set("B", "2");
        let wire = request
            .to_action("k")
            .to_wire_format('|')
            .unwrap();
        assert!(wire.contains("\r\nVariable: A=1|B=2\r\n"));
        assert!(wire.contains("\r\nAsync: true\r\n"));
    }

    #[test]
    fn derived_wait() {
        let mut request = OriginateRequest::default();
        assert_eq!(
            request.derived_wait(Duration::from_secs(5)),
            Duration::from_secs(5)
        );
        request.timeout = Some(Duration::from_secs(30));
        assert_eq!(
            request.derived_wait(Duration::from_secs(5)),
            Duration::from_millis(30_500)
        );
    }
}
