//! RomFS reader adapter backed by the Artic client
//!
//! Streams romfs contents on demand over the shared connection, caching
//! fetched blocks. The loader owns two of these (main + update) and must
//! release them before stopping the shared client.

use oa_core::LoaderError;
use oa_net::Client;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Block granularity for remote reads and the cache
const CACHE_BLOCK_SIZE: u64 = 0x10000;

/// Read-only packaged asset filesystem
pub trait RomFsReader: Send + Sync {
    fn data_size(&self) -> u64;
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<usize, LoaderError>;
}

/// RomFS reader that fetches content from the Artic server
pub struct ArticRomFsReader {
    client: Arc<Client>,
    update: bool,
    size: u64,
    cache: Mutex<HashMap<u64, Vec<u8>>>,
}

impl ArticRomFsReader {
    /// Open the (main or update) romfs on the server and learn its size
    pub fn open(client: Arc<Client>, update: bool) -> Result<Self, LoaderError> {
        let mut req = client.new_request("Process_OpenRomFS");
        req.add_param_u8(update as u8);
        let resp = client.send(&req).ok_or(LoaderError::Artic)?;
        if !resp.succeeded() || resp.method_result() != 0 {
            return Err(LoaderError::Artic);
        }

        let size_buf = resp.get_buffer(0).ok_or(LoaderError::Artic)?;
        if size_buf.len() != 8 {
            return Err(LoaderError::Artic);
        }
        let size = u64::from_le_bytes([
            size_buf[0], size_buf[1], size_buf[2], size_buf[3], size_buf[4], size_buf[5],
            size_buf[6], size_buf[7],
        ]);

        debug!("Opened {} romfs, 0x{:x} bytes", if update { "update" } else { "main" }, size);
        Ok(Self {
            client,
            update,
            size,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn fetch_block(&self, block_offset: u64) -> Result<Vec<u8>, LoaderError> {
        let len = CACHE_BLOCK_SIZE.min(self.size - block_offset) as u32;

        let mut req = self.client.new_request("Process_ReadRomFS");
        req.add_param_u8(self.update as u8);
        req.add_param_u32(block_offset as u32);
        req.add_param_u32(len);
        let resp = self.client.send(&req).ok_or(LoaderError::Artic)?;
        if !resp.succeeded() || resp.method_result() != 0 {
            return Err(LoaderError::Artic);
        }

        let data = resp.get_buffer(0).ok_or(LoaderError::Artic)?;
        if data.len() != len as usize {
            return Err(LoaderError::Artic);
        }
        Ok(data.to_vec())
    }

    /// Drop all cached blocks
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Release the server-side handle. The shared client stays usable.
    pub fn close(&self) {
        let mut req = self.client.new_request("Process_CloseRomFS");
        req.add_param_u8(self.update as u8);
        let _ = self.client.send(&req);
    }
}

impl RomFsReader for ArticRomFsReader {
    fn data_size(&self) -> u64 {
        self.size
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<usize, LoaderError> {
        if offset >= self.size {
            return Ok(0);
        }
        let total = (out.len() as u64).min(self.size - offset) as usize;

        let mut written = 0;
        while written < total {
            let pos = offset + written as u64;
            let block_offset = pos - (pos % CACHE_BLOCK_SIZE);

            let mut cache = self.cache.lock();
            if !cache.contains_key(&block_offset) {
                let block = self.fetch_block(block_offset)?;
                cache.insert(block_offset, block);
            }
            let block = &cache[&block_offset];

            let in_block = (pos - block_offset) as usize;
            let n = (block.len() - in_block).min(total - written);
            out[written..written + n].copy_from_slice(&block[in_block..in_block + n]);
            written += n;
        }
        Ok(written)
    }
}
