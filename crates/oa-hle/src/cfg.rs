//! cfg service: console configuration updated during provisioning

use oa_net::Client;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// cfg service state touched by the loader
pub struct Cfg {
    savegame_path: PathBuf,
    inner: Mutex<CfgState>,
    artic_client: Mutex<Option<Arc<Client>>>,
}

#[derive(Debug, Clone)]
struct CfgState {
    console_id: u64,
    random_id: u32,
    mac_address: String,
    region: i32,
    country_code: u16,
    system_setup_needed: bool,
}

impl Cfg {
    pub fn new(savegame_path: PathBuf, region: i32, country_code: u16) -> Self {
        Self {
            savegame_path,
            inner: Mutex::new(CfgState {
                console_id: 0,
                random_id: 0,
                mac_address: String::new(),
                region,
                country_code,
                system_setup_needed: true,
            }),
            artic_client: Mutex::new(None),
        }
    }

    pub fn set_console_unique_id(&self, random_id: u32, console_id: u64) {
        let mut state = self.inner.lock();
        state.random_id = random_id;
        state.console_id = console_id;
        info!("Console unique ID updated: {:016X}", console_id);
    }

    pub fn console_unique_id(&self) -> (u32, u64) {
        let state = self.inner.lock();
        (state.random_id, state.console_id)
    }

    pub fn set_mac_address(&self, mac: [u8; 6]) {
        self.inner.lock().mac_address = mac_to_string(mac);
    }

    pub fn mac_address(&self) -> String {
        self.inner.lock().mac_address.clone()
    }

    /// Persist the MAC address alongside the rest of the config savegame
    pub fn save_mac_address(&self) {
        self.update_config_nand_savegame();
    }

    pub fn region_value(&self) -> i32 {
        self.inner.lock().region
    }

    pub fn country_code(&self) -> u16 {
        self.inner.lock().country_code
    }

    pub fn set_system_setup_needed(&self, needed: bool) {
        self.inner.lock().system_setup_needed = needed;
    }

    pub fn system_setup_needed(&self) -> bool {
        self.inner.lock().system_setup_needed
    }

    /// Redirect config block reads to the Artic server
    pub fn use_artic_client(&self, client: Arc<Client>) {
        *self.artic_client.lock() = Some(client);
    }

    pub fn has_artic_client(&self) -> bool {
        self.artic_client.lock().is_some()
    }

    /// Write the mutable config state back to the NAND savegame
    pub fn update_config_nand_savegame(&self) {
        let state = self.inner.lock().clone();
        let mut out = Vec::with_capacity(0x20);
        out.extend_from_slice(&state.console_id.to_le_bytes());
        out.extend_from_slice(&state.random_id.to_le_bytes());
        out.extend_from_slice(&state.country_code.to_le_bytes());
        out.extend_from_slice(&(state.region as u32).to_le_bytes());
        out.push(state.system_setup_needed as u8);
        out.extend_from_slice(state.mac_address.as_bytes());

        if let Some(parent) = self.savegame_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create config savegame directory: {}", e);
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.savegame_path, out) {
            warn!("Failed to write config savegame: {}", e);
        }
    }
}

/// Format a MAC address the way the config savegame stores it
pub fn mac_to_string(mac: [u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Region a config country code belongs to, if recognized.
///
/// Country code ranges follow the console's country list: Japan, the
/// Americas block, the Europe/Oceania block, then the standalone Asian
/// entries.
pub fn region_for_country(country_code: u16) -> Option<u32> {
    match country_code {
        1 => Some(0),          // Japan
        8..=52 => Some(1),     // Americas
        64..=127 => Some(2),   // Europe + Oceania
        160 => Some(4),        // China
        136 => Some(5),        // South Korea
        128 | 144 => Some(6),  // Taiwan, Hong Kong
        _ => None,
    }
}

/// Default country code for a console region, used until a config
/// savegame exists
pub fn default_country_for_region(region: i32) -> u16 {
    match region {
        0 => 1,   // Japan
        2 => 110, // United Kingdom
        3 => 65,  // Australia
        4 => 160, // China
        5 => 136, // South Korea
        6 => 128, // Taiwan
        _ => 49,  // United States
    }
}

/// Whether a region/country pair is an acceptable combination.
///
/// The Europe block also covers the AUS region variant some titles use.
pub fn is_valid_region_country(region: i32, country_code: u16) -> bool {
    match region_for_country(country_code) {
        Some(country_region) => {
            country_region == region as u32 || (country_region == 2 && region == 3)
        }
        None => false,
    }
}
