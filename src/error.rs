use thiserror::Error;

/// Errors that can occur during client operations
#[derive(Error, Debug)]
pub enum Error {
    /// Operation attempted before `init()` or after `destroy()`
    #[error("client handle missing (not initialized or already destroyed)")]
    HandleMissing,

    /// `init()` called while a handle is still live
    #[error("client already initialized")]
    AlreadyInitialized,

    /// Server URI could not be parsed or uses an unsupported scheme
    #[error("invalid server URI: {0}")]
    InvalidUri(String),

    /// Topic rejected before reaching the engine
    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    /// QoS level outside 0..=2
    #[error("invalid QoS level: {0}")]
    InvalidQos(u8),

    /// Protocol version selector unknown or not spoken by the engine
    #[error("unsupported protocol version selector: {0}")]
    UnsupportedProtocol(u8),

    /// Network operation attempted without an established session
    #[error("not connected")]
    NotConnected,

    /// Broker refused or the engine failed the connect attempt
    #[error("connect failed")]
    ConnectFailed,

    /// Operation did not complete within its bound
    #[error("operation timed out")]
    Timeout,

    /// Operation not valid in the engine's current state
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Engine-level failure (channel closed, client request rejected, etc.)
    #[error("engine error: {0}")]
    Engine(String),

    /// Requested engine was compiled out
    #[error("{0} feature is not enabled")]
    FeatureDisabled(&'static str),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;
