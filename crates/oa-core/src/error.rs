//! Error types for the oxidized-artic loader

use thiserror::Error;

/// Main error type for the emulator side of the loader
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Net error: {0}")]
    Net(#[from] NetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

/// Loader errors
///
/// `Artic` is the uniform failure path for every remote call: protocol
/// errors, short buffers and non-zero method results all collapse into it.
/// `Disconnected` is reserved for connection loss and version-handshake
/// mismatches and carries the operator-visible message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("Artic error")]
    Artic,

    #[error("Artic server disconnected: {0}")]
    Disconnected(String),

    #[error("Program not loaded")]
    NotLoaded,

    #[error("Program already loaded")]
    AlreadyLoaded,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Not used")]
    NotUsed,

    #[error("Not implemented")]
    NotImplemented,

    #[error("IO error: {0}")]
    Io(String),
}

/// Kernel errors
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Invalid ID: {0}")]
    InvalidId(u32),

    #[error("Resource limit exceeded")]
    ResourceLimit,

    #[error("Invalid capability descriptor: 0x{0:08x}")]
    InvalidCapability(u32),
}

/// Transport/protocol errors
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Request too large: {size} bytes (server maximum {max})")]
    RequestTooLarge { size: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoaderError::Disconnected("server went away".to_string());
        assert_eq!(
            format!("{}", err),
            "Artic server disconnected: server went away"
        );

        let err = NetError::RequestTooLarge { size: 0x8000, max: 0x4000 };
        assert_eq!(
            format!("{}", err),
            "Request too large: 32768 bytes (server maximum 16384)"
        );
    }

    #[test]
    fn test_error_conversion() {
        let loader_err = LoaderError::Artic;
        let emu_err: EmulatorError = loader_err.into();
        assert!(matches!(emu_err, EmulatorError::Loader(_)));
    }
}
