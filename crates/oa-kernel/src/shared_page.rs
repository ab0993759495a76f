//! Shared memory page mirror
//!
//! Only the fields the loader touches are modeled; the MAC address is
//! updated during provisioning so the running title sees the linked
//! console's address.

use parking_lot::Mutex;
use tracing::debug;

/// Live mirror of the kernel shared page
pub struct SharedPage {
    mac_address: Mutex<[u8; 6]>,
}

impl SharedPage {
    pub fn new() -> Self {
        Self {
            mac_address: Mutex::new([0; 6]),
        }
    }

    pub fn set_mac_address(&self, mac: [u8; 6]) {
        debug!(
            "Shared page MAC address set to {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        );
        *self.mac_address.lock() = mac;
    }

    pub fn mac_address(&self) -> [u8; 6] {
        *self.mac_address.lock()
    }
}

impl Default for SharedPage {
    fn default() -> Self {
        Self::new()
    }
}
