//! Application loading for oxidized-artic
//!
//! The only loader here is the ArticBase one: it treats a paired console as
//! the application medium and fetches everything over the RPC client.

pub mod artic;
pub mod exheader;
pub mod provisioning;
pub mod smdh;
pub mod system_titles;

pub use artic::{ArticInitMode, ArticLoader, SystemHandles, SETUP_TOOL_VERSION};
pub use exheader::{ExHeader, EXHEADER_FULL_SIZE, EXHEADER_WIRE_SIZE};

use oa_core::LoaderError;
use oa_kernel::Process;
use std::sync::Arc;

/// Default server port when the boot URI omits one
pub const DEFAULT_ARTIC_PORT: u16 = 5543;

/// Common surface of application loaders
pub trait AppLoader {
    /// Load the application and start its main process
    fn load(&mut self) -> Result<Arc<Process>, LoaderError>;

    fn read_code(&mut self) -> Result<Vec<u8>, LoaderError>;
    fn read_icon(&mut self) -> Result<Vec<u8>, LoaderError>;
    fn read_banner(&mut self) -> Result<Vec<u8>, LoaderError>;
    fn read_logo(&mut self) -> Result<Vec<u8>, LoaderError>;
    fn read_program_id(&mut self) -> Result<u64, LoaderError>;
    fn read_extdata_id(&mut self) -> Result<u64, LoaderError>;
    fn read_title(&mut self) -> Result<String, LoaderError>;
    fn is_executable(&mut self) -> Result<bool, LoaderError>;
}

impl AppLoader for ArticLoader {
    fn load(&mut self) -> Result<Arc<Process>, LoaderError> {
        ArticLoader::load(self)
    }

    fn read_code(&mut self) -> Result<Vec<u8>, LoaderError> {
        ArticLoader::read_code(self)
    }

    fn read_icon(&mut self) -> Result<Vec<u8>, LoaderError> {
        ArticLoader::read_icon(self)
    }

    fn read_banner(&mut self) -> Result<Vec<u8>, LoaderError> {
        ArticLoader::read_banner(self)
    }

    fn read_logo(&mut self) -> Result<Vec<u8>, LoaderError> {
        ArticLoader::read_logo(self)
    }

    fn read_program_id(&mut self) -> Result<u64, LoaderError> {
        ArticLoader::read_program_id(self)
    }

    fn read_extdata_id(&mut self) -> Result<u64, LoaderError> {
        ArticLoader::read_extdata_id(self)
    }

    fn read_title(&mut self) -> Result<String, LoaderError> {
        ArticLoader::read_title(self)
    }

    fn is_executable(&mut self) -> Result<bool, LoaderError> {
        ArticLoader::is_executable(self)
    }
}

/// Parsed boot URI: server endpoint plus the provisioning mode the scheme
/// selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootTarget {
    pub address: String,
    pub port: u16,
    pub init_mode: ArticInitMode,
}

/// Parse an Artic boot URI.
///
/// `articbase://host[:port]` plays the inserted title; `articinio://` and
/// `articinin://` additionally run the provisioning flow for an Old-3DS or
/// New-3DS console.
pub fn parse_boot_uri(uri: &str) -> Option<BootTarget> {
    let (scheme, rest) = uri.split_once("://")?;
    let init_mode = match scheme {
        "articbase" => ArticInitMode::None,
        "articinio" => ArticInitMode::Old3ds,
        "articinin" => ArticInitMode::New3ds,
        _ => return None,
    };

    let (address, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (rest, DEFAULT_ARTIC_PORT),
    };
    if address.is_empty() {
        return None;
    }
    Some(BootTarget {
        address: address.to_string(),
        port,
        init_mode,
    })
}
