//! Archive manager registration sinks
//!
//! When the remote loader is active, filesystem-like archives are redirected
//! to the Artic server instead of local storage. Only the registration
//! surface is modeled; the archive backends themselves are collaborators.

use oa_net::Client;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
struct ArticSources {
    save_data: Option<Arc<Client>>,
    ext_data: Option<Arc<Client>>,
    ncch: Option<Arc<Client>>,
    system_save_data: Option<Arc<Client>>,
}

/// Archive registration surface
pub struct ArchiveManager {
    self_ncch_program_id: Mutex<Option<u64>>,
    sources: Mutex<ArticSources>,
}

impl ArchiveManager {
    pub fn new() -> Self {
        Self {
            self_ncch_program_id: Mutex::new(None),
            sources: Mutex::new(ArticSources::default()),
        }
    }

    /// Register the running title as the SelfNCCH archive source
    pub fn register_self_ncch(&self, program_id: u64) {
        info!("Registered SelfNCCH for {:016X}", program_id);
        *self.self_ncch_program_id.lock() = Some(program_id);
    }

    pub fn register_artic_save_data(&self, client: Arc<Client>) {
        self.sources.lock().save_data = Some(client);
    }

    pub fn register_artic_ext_data(&self, client: Arc<Client>) {
        self.sources.lock().ext_data = Some(client);
    }

    pub fn register_artic_ncch(&self, client: Arc<Client>) {
        self.sources.lock().ncch = Some(client);
    }

    pub fn register_artic_system_save_data(&self, client: Arc<Client>) {
        self.sources.lock().system_save_data = Some(client);
    }

    pub fn self_ncch_program_id(&self) -> Option<u64> {
        *self.self_ncch_program_id.lock()
    }

    /// How many archive sources are redirected to the Artic server
    pub fn artic_source_count(&self) -> usize {
        let sources = self.sources.lock();
        [
            sources.save_data.is_some(),
            sources.ext_data.is_some(),
            sources.ncch.is_some(),
            sources.system_save_data.is_some(),
        ]
        .iter()
        .filter(|&&registered| registered)
        .count()
    }
}

impl Default for ArchiveManager {
    fn default() -> Self {
        Self::new()
    }
}
