//! Error types for encoding, decoding, storage and invocation

use crate::core::{Fingerprint, TargetId};
use std::fmt;
use std::io;

/// Failure to turn a buffer back into a call envelope or return value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before the expected data was complete
    Truncated { available: usize },
    /// The buffer is not a valid encoding for the expected types
    Malformed(String),
    /// The buffer was encoded for a different argument list
    SignatureMismatch { expected: Fingerprint, found: Fingerprint },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { available } => {
                write!(f, "Buffer truncated after {} bytes", available)
            }
            Self::Malformed(reason) => write!(f, "Malformed buffer: {}", reason),
            Self::SignatureMismatch { expected, found } => {
                write!(
                    f,
                    "Signature mismatch: expected fingerprint {}, found {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failure to serialize a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The encoded arguments exceed the configured buffer limit
    TooLarge { limit: u64 },
    /// The value cannot be represented by the codec
    Unsupported(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { limit } => {
                write!(f, "Encoded call exceeds the {} byte limit", limit)
            }
            Self::Unsupported(reason) => write!(f, "Cannot encode value: {}", reason),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Store collaborator failures
#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    InvalidKey(String),
    Io(io::Error),
    Compression(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "No stored call under key '{}'", key),
            Self::InvalidKey(key) => write!(f, "Invalid store key '{}'", key),
            Self::Io(err) => write!(f, "Store I/O error: {}", err),
            Self::Compression(err) => write!(f, "Store compression error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) | Self::Compression(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Function registry failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is already bound to a function with another signature, or its
    /// id collides with a different name
    Conflict { name: String, existing: String },
    NotFound { name: String },
    SignatureMismatch { name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { name, existing } => {
                write!(f, "Cannot register '{}': conflicts with registered '{}'", name, existing)
            }
            Self::NotFound { name } => write!(f, "No function registered as '{}'", name),
            Self::SignatureMismatch { name } => {
                write!(f, "Function '{}' is registered with a different signature", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Anything that can go wrong between `prepare` and the end of an invocation
#[derive(Debug)]
pub enum CallError {
    Decode(DecodeError),
    Encode(EncodeError),
    Store(StoreError),
    Registry(RegistryError),
    UnknownTarget(TargetId),
    TargetMismatch { expected: TargetId, found: TargetId },
    QueueClosed,
    /// The target panicked while running on a queue worker
    Panicked(String),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "{}", err),
            Self::Encode(err) => write!(f, "{}", err),
            Self::Store(err) => write!(f, "{}", err),
            Self::Registry(err) => write!(f, "{}", err),
            Self::UnknownTarget(id) => write!(f, "No function registered for target {}", id),
            Self::TargetMismatch { expected, found } => {
                write!(f, "Buffer targets {}, trampoline is bound to {}", found, expected)
            }
            Self::QueueClosed => write!(f, "Deferred queue has no running workers"),
            Self::Panicked(msg) => write!(f, "Deferred call panicked: {}", msg),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for CallError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err)
    }
}

impl From<EncodeError> for CallError {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}

impl From<StoreError> for CallError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<RegistryError> for CallError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

/// Configuration file failures
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Failed to access config: {}", err),
            Self::Parse(err) => write!(f, "Failed to parse config: {}", err),
            Self::Serialize(err) => write!(f, "Failed to serialize config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Serialize(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let err = DecodeError::Truncated { available: 12 };
        assert_eq!(err.to_string(), "Buffer truncated after 12 bytes");

        let err = CallError::UnknownTarget(TargetId::from_u64(0xff));
        assert_eq!(err.to_string(), "No function registered for target 00000000000000ff");
    }

    #[test]
    fn test_source_chain() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = CallError::from(StoreError::from(io));
        let store = err.source().expect("store error");
        assert!(store.source().is_some());
    }
}
