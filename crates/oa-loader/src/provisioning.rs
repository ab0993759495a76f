//! Console provisioning (first-run setup)
//!
//! Pulls the console-unique data off the paired device, seeds the config
//! savegame, then boots the network installation module so the console
//! link can complete on first run.

use crate::artic::{ArticInitMode, ArticLoader};
use crate::exheader::{ExHeader, EXHEADER_FULL_SIZE};
use oa_core::LoaderError;
use oa_hle::{Am, Apt, Cfg, DeliverArg};
use oa_net::ServerLogLevel;
use oa_vfs::{
    FRIEND_CODE_SEED_B_SIZE, MOVABLE_SED_FULL_SIZE, MOVABLE_SED_LEGACY_SIZE, OTP_SIZE,
    SECURE_INFO_A_SIZE,
};
use std::path::Path;
use tracing::info;

/// Program ID of the network installation module
const NIM_PROGRAM_ID: u64 = 0x0004_0130_0000_2C02;

/// Deliver-arg byte that sends the settings applet into the link flow
const DELIVER_ARG_SETUP: u8 = 0x7a;

const CONSOLE_ID_BLOB_SIZE: usize = 12;
const MAC_ADDRESS_SIZE: usize = 6;

/// Where a transferred system file lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupDestination {
    SecureInfo,
    FriendCodeSeed,
    Movable,
    Otp,
    ConsoleId,
    MacAddress,
}

struct SetupFileSpec {
    index: u8,
    accepted_sizes: &'static [usize],
    dest: SetupDestination,
}

/// System files fetched during provisioning, in transfer order. A size
/// outside the accepted set aborts the whole flow.
const SETUP_FILES: [SetupFileSpec; 6] = [
    SetupFileSpec {
        index: 0,
        accepted_sizes: &[SECURE_INFO_A_SIZE],
        dest: SetupDestination::SecureInfo,
    },
    SetupFileSpec {
        index: 1,
        accepted_sizes: &[FRIEND_CODE_SEED_B_SIZE],
        dest: SetupDestination::FriendCodeSeed,
    },
    SetupFileSpec {
        index: 2,
        accepted_sizes: &[MOVABLE_SED_FULL_SIZE, MOVABLE_SED_LEGACY_SIZE],
        dest: SetupDestination::Movable,
    },
    SetupFileSpec {
        index: 3,
        accepted_sizes: &[OTP_SIZE],
        dest: SetupDestination::Otp,
    },
    SetupFileSpec {
        index: 4,
        accepted_sizes: &[CONSOLE_ID_BLOB_SIZE],
        dest: SetupDestination::ConsoleId,
    },
    SetupFileSpec {
        index: 5,
        accepted_sizes: &[MAC_ADDRESS_SIZE],
        dest: SetupDestination::MacAddress,
    },
];

impl ArticLoader {
    /// The whole first-run setup sequence. Any failure aborts the boot.
    pub(crate) fn run_initial_setup(&mut self) -> Result<(), LoaderError> {
        self.ensure_connected()?;
        info!("Running console provisioning");

        self.check_linked_device()?;

        let cfg = self.services.get::<Cfg>("cfg:u");
        for spec in &SETUP_FILES {
            let mut req = self.client.new_request("System_GetSystemFile");
            req.add_param_u8(spec.index);
            let resp = self.client.send(&req).ok_or(LoaderError::Artic)?;
            if !resp.succeeded() || resp.method_result() != 0 {
                return Err(LoaderError::Artic);
            }

            let data = resp.get_buffer(0).ok_or(LoaderError::Artic)?;
            if !spec.accepted_sizes.contains(&data.len()) {
                return Err(LoaderError::Artic);
            }

            match spec.dest {
                SetupDestination::SecureInfo => {
                    write_system_file(&self.unique_data.secure_info_path(), data)?;
                }
                SetupDestination::FriendCodeSeed => {
                    write_system_file(&self.unique_data.friend_code_seed_path(), data)?;
                }
                SetupDestination::Movable => {
                    write_system_file(&self.unique_data.movable_path(), data)?;
                }
                SetupDestination::Otp => {
                    write_system_file(&self.unique_data.otp_path(), data)?;
                }
                SetupDestination::ConsoleId => {
                    let console_id = u64::from_le_bytes([
                        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
                    ]);
                    let random_id = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
                    if let Some(cfg) = &cfg {
                        cfg.set_console_unique_id(random_id, console_id);
                        cfg.update_config_nand_savegame();
                    }
                }
                SetupDestination::MacAddress => {
                    let mut mac = [0u8; MAC_ADDRESS_SIZE];
                    mac.copy_from_slice(data);
                    if let Some(cfg) = &cfg {
                        cfg.set_mac_address(mac);
                        cfg.save_mac_address();
                    }
                    self.kernel.shared_page().set_mac_address(mac);
                }
            }
        }

        // The blobs just landed on disk; re-read and structurally validate
        // them before trusting the link.
        self.unique_data.invalidate();
        if !self.unique_data.is_full_console_linked() {
            self.client.log_on_server(
                ServerLogLevel::Error,
                "The transferred console data is invalid.\n    Aborting setup.",
            );
            return Err(LoaderError::Artic);
        }

        if let Some(cfg) = &cfg {
            if !oa_hle::is_valid_region_country(cfg.region_value(), cfg.country_code()) {
                self.client.log_on_server(
                    ServerLogLevel::Error,
                    "The configured country does not match the\n    \
                     console region. Select a valid country in\n    \
                     the emulation settings.",
                );
                return Err(LoaderError::Artic);
            }
            cfg.set_system_setup_needed(false);
        }

        if let Some(apt) = self.services.get::<Apt>("apt") {
            apt.set_deliver_arg(DeliverArg {
                param: vec![DELIVER_ARG_SETUP],
            });
        }

        self.boot_nim()?;

        if let Some(am) = self.services.get::<Am>("am:net") {
            match self.init_mode {
                ArticInitMode::Old3ds => am.force_o3ds_device_id(),
                ArticInitMode::New3ds => am.force_n3ds_device_id(),
                ArticInitMode::None => {}
            }
        }
        Ok(())
    }

    /// When console-unique data already exists locally, the server must be
    /// the same console it came from.
    fn check_linked_device(&mut self) -> Result<(), LoaderError> {
        if !self.unique_data.is_full_console_linked() {
            return Ok(());
        }
        let device_id = self
            .unique_data
            .otp()
            .ok_or(LoaderError::Artic)?
            .device_id();

        let mut req = self.client.new_request("System_ReportDeviceID");
        req.add_param_u32(device_id);
        let resp = self.client.send(&req).ok_or(LoaderError::Artic)?;
        if !resp.succeeded() || resp.method_result() != 0 {
            return Err(LoaderError::Artic);
        }
        Ok(())
    }

    /// Fetch and start the network installation module. The server sends
    /// a full header (access descriptor included) plus the code image.
    fn boot_nim(&mut self) -> Result<(), LoaderError> {
        let req = self.client.new_request("System_GetNIM");
        let mut resp = self.client.send(&req).ok_or(LoaderError::Artic)?;
        if !resp.succeeded() || resp.method_result() != 0 {
            return Err(LoaderError::Artic);
        }

        let header_bytes = resp.get_buffer(0).ok_or(LoaderError::Artic)?;
        if header_bytes.len() != EXHEADER_FULL_SIZE {
            return Err(LoaderError::Artic);
        }
        let header = ExHeader::parse(header_bytes).map_err(|_| LoaderError::Artic)?;
        let code = resp.take_buffer(1).ok_or(LoaderError::Artic)?;

        info!("Booting NIM for console link");
        self.load_exec_impl(NIM_PROGRAM_ID, &header, code)?;
        Ok(())
    }
}

fn write_system_file(path: &Path, data: &[u8]) -> Result<(), LoaderError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LoaderError::Io(e.to_string()))?;
    }
    std::fs::write(path, data).map_err(|e| LoaderError::Io(e.to_string()))
}
