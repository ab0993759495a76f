//! am service: title management

use oa_kernel::HwRevision;
use oa_net::Client;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Title-management service (shared by am:net and am:app ports)
pub struct Am {
    forced_revision: Mutex<Option<HwRevision>>,
    artic_client: Mutex<Option<Arc<Client>>>,
}

impl Am {
    pub fn new() -> Self {
        Self {
            forced_revision: Mutex::new(None),
            artic_client: Mutex::new(None),
        }
    }

    /// Present an Old-3DS device ID so NIM fetches the Old-3DS title set
    pub fn force_o3ds_device_id(&self) {
        info!("Forcing Old-3DS device ID presentation");
        *self.forced_revision.lock() = Some(HwRevision::Old3ds);
    }

    /// Present a New-3DS device ID so NIM fetches the New-3DS title set
    pub fn force_n3ds_device_id(&self) {
        info!("Forcing New-3DS device ID presentation");
        *self.forced_revision.lock() = Some(HwRevision::New3ds);
    }

    pub fn forced_revision(&self) -> Option<HwRevision> {
        *self.forced_revision.lock()
    }

    /// Redirect title queries to the Artic server
    pub fn use_artic_client(&self, client: Arc<Client>) {
        *self.artic_client.lock() = Some(client);
    }

    pub fn has_artic_client(&self) -> bool {
        self.artic_client.lock().is_some()
    }
}

impl Default for Am {
    fn default() -> Self {
        Self::new()
    }
}
