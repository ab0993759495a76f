//! Secure-value backend
//!
//! Anti-savegame-restore counters normally stored in NAND. When a title
//! runs from an Artic server the counters live on the real console, so the
//! backend forwards get/set over the shared client.

use oa_core::LoaderError;
use oa_net::Client;
use std::sync::Arc;

/// Backend for per-title secure values
pub trait SecureValueBackend: Send + Sync {
    fn get_secure_value(&self, unique_id: u32) -> Result<u64, LoaderError>;
    fn set_secure_value(&self, unique_id: u32, value: u64) -> Result<(), LoaderError>;
}

/// Secure values forwarded to the Artic server
pub struct ArticSecureValueBackend {
    client: Arc<Client>,
}

impl ArticSecureValueBackend {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

impl SecureValueBackend for ArticSecureValueBackend {
    fn get_secure_value(&self, unique_id: u32) -> Result<u64, LoaderError> {
        let mut req = self.client.new_request("System_GetSecureValue");
        req.add_param_u32(unique_id);
        let resp = self.client.send(&req).ok_or(LoaderError::Artic)?;
        if !resp.succeeded() || resp.method_result() != 0 {
            return Err(LoaderError::Artic);
        }

        let buf = resp.get_buffer(0).ok_or(LoaderError::Artic)?;
        if buf.len() != 8 {
            return Err(LoaderError::Artic);
        }
        Ok(u64::from_le_bytes([
            buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
        ]))
    }

    fn set_secure_value(&self, unique_id: u32, value: u64) -> Result<(), LoaderError> {
        let mut req = self.client.new_request("System_SetSecureValue");
        req.add_param_u32(unique_id);
        req.set_payload(value.to_le_bytes().to_vec());
        let resp = self.client.send(&req).ok_or(LoaderError::Artic)?;
        if !resp.succeeded() || resp.method_result() != 0 {
            return Err(LoaderError::Artic);
        }
        Ok(())
    }
}
