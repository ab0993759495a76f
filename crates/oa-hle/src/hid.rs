//! hid service: input redirection hook

use oa_net::Client;
use parking_lot::Mutex;
use std::sync::Arc;

/// Input service; only the Artic redirection hook is modeled here
pub struct Hid {
    artic_client: Mutex<Option<Arc<Client>>>,
}

impl Hid {
    pub fn new() -> Self {
        Self {
            artic_client: Mutex::new(None),
        }
    }

    /// Read pad state from the Artic server instead of local input
    pub fn use_artic_client(&self, client: Arc<Client>) {
        *self.artic_client.lock() = Some(client);
    }

    pub fn has_artic_client(&self) -> bool {
        self.artic_client.lock().is_some()
    }
}

impl Default for Hid {
    fn default() -> Self {
        Self::new()
    }
}
