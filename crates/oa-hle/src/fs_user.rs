//! fs:USER registration sink
//!
//! On real hardware program/product registration goes through FS:Reg; the
//! loader calls these directly.

use oa_core::LoaderError;
use oa_vfs::SecureValueBackend;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Product info wire record size
pub const PRODUCT_INFO_SIZE: usize = 0x14;

/// Product info registered for a running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub product_code: [u8; 0x10],
    pub maker_code: u16,
    pub remaster_version: u16,
}

impl ProductInfo {
    /// Parse the 0x14-byte wire record
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoaderError> {
        if bytes.len() != PRODUCT_INFO_SIZE {
            return Err(LoaderError::InvalidFormat(format!(
                "product info is {} bytes, expected {}",
                bytes.len(),
                PRODUCT_INFO_SIZE
            )));
        }
        let mut product_code = [0u8; 0x10];
        product_code.copy_from_slice(&bytes[0..0x10]);
        Ok(Self {
            product_code,
            maker_code: u16::from_le_bytes([bytes[0x10], bytes[0x11]]),
            remaster_version: u16::from_le_bytes([bytes[0x12], bytes[0x13]]),
        })
    }

    /// Product code as a trimmed string ("CTR-P-XXXX")
    pub fn product_code_str(&self) -> String {
        let end = self
            .product_code
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.product_code.len());
        String::from_utf8_lossy(&self.product_code[..end]).to_string()
    }
}

/// Program info registered at process creation
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub process_id: u32,
    pub program_id: u64,
    pub filepath: String,
}

/// fs:USER service
pub struct FsUser {
    programs: Mutex<HashMap<u32, ProgramInfo>>,
    products: Mutex<HashMap<u32, ProductInfo>>,
    secure_value_backend: Mutex<Option<Arc<dyn SecureValueBackend>>>,
}

impl FsUser {
    pub fn new() -> Self {
        Self {
            programs: Mutex::new(HashMap::new()),
            products: Mutex::new(HashMap::new()),
            secure_value_backend: Mutex::new(None),
        }
    }

    pub fn register_program_info(&self, process_id: u32, program_id: u64, filepath: &str) {
        info!(
            "Registered program {:016X} for process {} ({})",
            program_id, process_id, filepath
        );
        self.programs.lock().insert(
            process_id,
            ProgramInfo {
                process_id,
                program_id,
                filepath: filepath.to_string(),
            },
        );
    }

    pub fn register_product_info(&self, process_id: u32, info: ProductInfo) {
        self.products.lock().insert(process_id, info);
    }

    pub fn register_secure_value_backend(&self, backend: Arc<dyn SecureValueBackend>) {
        *self.secure_value_backend.lock() = Some(backend);
    }

    pub fn program_info(&self, process_id: u32) -> Option<ProgramInfo> {
        self.programs.lock().get(&process_id).cloned()
    }

    pub fn product_info(&self, process_id: u32) -> Option<ProductInfo> {
        self.products.lock().get(&process_id).cloned()
    }

    pub fn has_secure_value_backend(&self) -> bool {
        self.secure_value_backend.lock().is_some()
    }
}

impl Default for FsUser {
    fn default() -> Self {
        Self::new()
    }
}
