//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async client for the Asterisk manager protocol:
//! submit actions and await their correlated responses, receive events, follow
//! the events of a single call, and originate calls.
//!
//! # Architecture
//!
//! A single control task owns the socket and all connection state:
//! - [`AmiClient`] (Clone + Send) submits actions, registers listeners and
//!   drives the connection from any task
//! - [`AmiEventStream`] receives every event
//! - [`EventListener`] receives the events of one session (`Uniqueid`)
//!
//! Actions submitted before the connection is ready are queued and written in
//! order once it is. Reconnection is left to the application: watch for
//! [`ConnectionState::Stopped`] and call [`AmiClient::start`] again.
//!
//! # Examples
//!
//! ## Actions
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiAction, AmiClient, AmiConfig, AmiError};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let config = AmiConfig::new("127.0.0.1", 5038, "admin", "secret");
//!     let (client, _events) = AmiClient::new(config);
//!     client.start().await?;
//!
//!     let resp = client
//!         .submit(AmiAction::new("CoreStatus"), Duration::from_secs(5))
//!         .await?
//!         .into_result()?;
//!     println!("calls: {}", resp.get("CoreCurrentCalls").unwrap_or("?"));
//!
//!     client.close().await
//! }
//! ```
//!
//! ## Events
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiConfig, AmiEventType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AmiConfig::from_split_file("/etc/ami-auth.config", "::")?;
//!     let (client, mut events) = AmiClient::new(config);
//!     client.start().await?;
//!
//!     while let Some(Ok(event)) = events.recv().await {
//!         if event.event_type() == Some(AmiEventType::Hangup) {
//!             println!("{} hung up", event.channel().unwrap_or("?"));
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Originate
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiConfig, OriginateRequest};
//! use std::time::Duration;
//!
//! # async fn example(client: AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
//! let request = OriginateRequest {
//!     channel: "PJSIP/100".into(),
//!     context: "from-internal".into(),
//!     exten: "200".into(),
//!     priority: "1".into(),
//!     timeout: Some(Duration::from_secs(30)),
//!     ..Default::default()
//! };
//!
//! let mut call = client.originate(request, Duration::ZERO).await?;
//! while let Some(event) = call.next_event().await {
//!     println!("{}: {}", call.session_key(), event.name());
//! }
//! if let Some(cause) = call.hangup_cause() {
//!     println!("hangup cause {} ({})", cause, cause.as_code());
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

pub mod action;
pub mod call;
pub mod config;
pub mod connection;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod event;
pub mod headers;
pub mod originate;
pub mod protocol;
pub mod registry;
pub mod response;
pub mod variables;

pub(crate) mod correlation;

pub use action::AmiAction;
pub use call::{HangupCause, OriginateReason, ParseCodeError};
pub use config::AmiConfig;
pub use connection::{AmiClient, AmiEventStream, ConnectionState, StateObserver};
pub use constants::DEFAULT_AMI_PORT;
pub use correlation::next_key;
pub use envelope::Envelope;
pub use error::{AmiError, AmiResult};
pub use event::{AmiEvent, AmiEventType, ParseEventTypeError};
pub use headers::{AmiHeader, ParseAmiHeaderError};
pub use originate::{OriginateCall, OriginateRequest};
pub use protocol::{extract_frames, AmiMessage, FrameCodec};
pub use registry::EventListener;
pub use response::{AmiResponse, ResponseStatus};
pub use variables::Variables;
