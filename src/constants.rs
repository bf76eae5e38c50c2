//! Protocol constants and configuration defaults

/// Default Asterisk manager port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket buffer size for reading from the TCP stream
pub const SOCKET_BUF_SIZE: usize = 16 * 1024;

/// Maximum bytes buffered without a frame terminator (16MB).
/// No legitimate manager frame comes close; exceeding it means the peer is
/// not speaking the protocol.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Protocol frame terminators
pub const FRAME_TERMINATOR: &str = "\r\n\r\n";
pub const LINE_TERMINATOR: &str = "\r\n";

/// `Response` header value that marks a failed action.
pub const RESPONSE_ERROR: &str = "Error";

/// Default separator between `name=value` pairs on the `Variable` line.
/// Servers older than 1.6 expect `|`.
pub const DEFAULT_VARIABLE_SEPARATOR: char = ',';

/// Event name that ends a call-scoped listener by default.
pub const DEFAULT_TERMINAL_EVENT: &str = "Hangup";

/// TCP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Greeting and login reply timeout in milliseconds
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;

/// Default wait for an action response, used by originate when no explicit timeout is given
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Idle lifetime of a session listener (30 minutes)
pub const DEFAULT_LISTENER_IDLE_MS: u64 = 30 * 60 * 1000;

/// Period of the idle listener sweep (30 minutes)
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 30 * 60 * 1000;

/// Slack added to an originate's dial timeout when deriving the response wait
pub const ORIGINATE_TIMEOUT_SLACK_MS: u64 = 500;

/// Maximum number of queued events on the global stream before dropping
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;
