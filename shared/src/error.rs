// Error Module
// Failure taxonomy for credential handling, connection setup and the heartbeat
// Every variant is surfaced through logs and an alert pattern, never silently

use thiserror::Error;

/// Failures while decoding or decrypting a stored password blob
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Padding did not verify after decryption, usually a wrong key
    #[error("invalid padding")]
    InvalidPadding,
    #[error("malformed encrypted blob: {0}")]
    MalformedBlob(String),
    #[error("decrypted password is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// No stored profile, the expected first-boot state
    #[error("no stored WiFi configuration")]
    ConfigMissing,
    #[error("malformed WiFi configuration: {0}")]
    ConfigMalformed(String),
    #[error("password decryption failed: {0}")]
    Cipher(#[from] CipherError),
    #[error("static IP configuration incomplete")]
    StaticIpIncomplete,
    #[error("invalid static IP field '{0}'")]
    StaticIpInvalid(&'static str),
    #[error("WiFi connection failed: {0}")]
    NetworkConnectFailed(String),
    #[error("heartbeat request failed: {0}")]
    HeartbeatFailed(String),
    #[error("profile storage error: {0}")]
    Storage(String),
}
