//! Console-unique security data
//!
//! The four blobs copied from a real device during provisioning, their
//! accepted sizes, structural validity checks and fixed on-disk locations
//! below the emulated NAND root.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SECURE_INFO_A_SIZE: usize = 0x111;
pub const FRIEND_CODE_SEED_B_SIZE: usize = 0x110;
pub const MOVABLE_SED_FULL_SIZE: usize = 0x140;
pub const MOVABLE_SED_LEGACY_SIZE: usize = 0x120;
pub const OTP_SIZE: usize = 0x100;

const MOVABLE_MAGIC: &[u8; 4] = b"SEED";
const OTP_MAGIC: u32 = 0x0FB0_ADDE;

/// Which movable.sed variant was received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovableVariant {
    Full,
    /// Shorter image written by consoles that never initialized the seed
    Legacy,
}

/// SecureInfo_A: signature + region + serial
#[derive(Debug, Clone)]
pub struct SecureInfoA(Vec<u8>);

impl SecureInfoA {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn is_valid(&self) -> bool {
        // Signature must not be blank and the region byte must be a real
        // region index.
        self.0.len() == SECURE_INFO_A_SIZE
            && self.0[..0x100].iter().any(|&b| b != 0)
            && self.0[0x100] < 7
    }

    pub fn region(&self) -> Option<u8> {
        self.0.get(0x100).copied()
    }
}

/// LocalFriendCodeSeed_B: signature + seed
#[derive(Debug, Clone)]
pub struct LocalFriendCodeSeedB(Vec<u8>);

impl LocalFriendCodeSeedB {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn is_valid(&self) -> bool {
        self.0.len() == FRIEND_CODE_SEED_B_SIZE && self.0[0x108..0x110].iter().any(|&b| b != 0)
    }
}

/// movable.sed: console keyseed, full or legacy-uninitialized
#[derive(Debug, Clone)]
pub struct MovableSed {
    bytes: Vec<u8>,
    variant: MovableVariant,
}

impl MovableSed {
    /// Accepts either size variant; anything else is rejected.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let variant = match bytes.len() {
            MOVABLE_SED_FULL_SIZE => MovableVariant::Full,
            MOVABLE_SED_LEGACY_SIZE => MovableVariant::Legacy,
            _ => return None,
        };
        Some(Self { bytes, variant })
    }

    pub fn variant(&self) -> MovableVariant {
        self.variant
    }

    pub fn is_valid(&self) -> bool {
        self.bytes.len() >= 4 && &self.bytes[..4] == MOVABLE_MAGIC
    }
}

/// One-time-programmable block of the linked console
#[derive(Debug, Clone)]
pub struct Otp(Vec<u8>);

impl Otp {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn is_valid(&self) -> bool {
        self.0.len() == OTP_SIZE
            && u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]) == OTP_MAGIC
    }

    pub fn device_id(&self) -> u32 {
        u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }
}

#[derive(Default)]
struct Cache {
    secure_info: Option<SecureInfoA>,
    friend_code_seed: Option<LocalFriendCodeSeedB>,
    movable: Option<MovableSed>,
    otp: Option<Otp>,
}

/// On-disk store for the console-unique blobs
pub struct UniqueDataStore {
    nand_root: PathBuf,
    cache: Mutex<Cache>,
}

impl UniqueDataStore {
    pub fn new(nand_root: &Path) -> Self {
        Self {
            nand_root: nand_root.to_path_buf(),
            cache: Mutex::new(Cache::default()),
        }
    }

    pub fn secure_info_path(&self) -> PathBuf {
        self.nand_root.join("rw/sys/SecureInfo_A")
    }

    pub fn friend_code_seed_path(&self) -> PathBuf {
        self.nand_root.join("rw/sys/LocalFriendCodeSeed_B")
    }

    pub fn movable_path(&self) -> PathBuf {
        self.nand_root.join("private/movable.sed")
    }

    pub fn otp_path(&self) -> PathBuf {
        self.nand_root.join("sys/otp.bin")
    }

    /// Drop cached blobs so the next access re-reads from disk
    pub fn invalidate(&self) {
        *self.cache.lock() = Cache::default();
    }

    pub fn secure_info(&self) -> Option<SecureInfoA> {
        let mut cache = self.cache.lock();
        if cache.secure_info.is_none() {
            cache.secure_info = read_blob(&self.secure_info_path()).map(SecureInfoA::from_bytes);
        }
        cache.secure_info.clone()
    }

    pub fn friend_code_seed(&self) -> Option<LocalFriendCodeSeedB> {
        let mut cache = self.cache.lock();
        if cache.friend_code_seed.is_none() {
            cache.friend_code_seed =
                read_blob(&self.friend_code_seed_path()).map(LocalFriendCodeSeedB::from_bytes);
        }
        cache.friend_code_seed.clone()
    }

    pub fn movable(&self) -> Option<MovableSed> {
        let mut cache = self.cache.lock();
        if cache.movable.is_none() {
            cache.movable = read_blob(&self.movable_path()).and_then(MovableSed::from_bytes);
        }
        cache.movable.clone()
    }

    pub fn otp(&self) -> Option<Otp> {
        let mut cache = self.cache.lock();
        if cache.otp.is_none() {
            cache.otp = read_blob(&self.otp_path()).map(Otp::from_bytes);
        }
        cache.otp.clone()
    }

    /// Whether a complete console link already exists locally
    pub fn is_full_console_linked(&self) -> bool {
        self.otp().map(|o| o.is_valid()).unwrap_or(false)
            && self.secure_info().map(|s| s.is_valid()).unwrap_or(false)
            && self.movable().map(|m| m.is_valid()).unwrap_or(false)
            && self
                .friend_code_seed()
                .map(|f| f.is_valid())
                .unwrap_or(false)
    }
}

fn read_blob(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_otp_bytes() -> Vec<u8> {
        let mut otp = vec![0u8; OTP_SIZE];
        otp[..4].copy_from_slice(&OTP_MAGIC.to_le_bytes());
        otp[4..8].copy_from_slice(&0x12345678u32.to_le_bytes());
        otp
    }

    #[test]
    fn test_otp_device_id() {
        let otp = Otp::from_bytes(valid_otp_bytes());
        assert!(otp.is_valid());
        assert_eq!(otp.device_id(), 0x12345678);
    }

    #[test]
    fn test_movable_accepts_both_sizes() {
        let mut full = vec![0u8; MOVABLE_SED_FULL_SIZE];
        full[..4].copy_from_slice(MOVABLE_MAGIC);
        let sed = MovableSed::from_bytes(full).unwrap();
        assert_eq!(sed.variant(), MovableVariant::Full);
        assert!(sed.is_valid());

        let mut legacy = vec![0u8; MOVABLE_SED_LEGACY_SIZE];
        legacy[..4].copy_from_slice(MOVABLE_MAGIC);
        let sed = MovableSed::from_bytes(legacy).unwrap();
        assert_eq!(sed.variant(), MovableVariant::Legacy);

        assert!(MovableSed::from_bytes(vec![0u8; 0x100]).is_none());
    }

    #[test]
    fn test_secure_info_region_check() {
        let mut bytes = vec![0u8; SECURE_INFO_A_SIZE];
        bytes[0] = 0xAA; // non-blank signature
        bytes[0x100] = 1; // USA
        assert!(SecureInfoA::from_bytes(bytes.clone()).is_valid());

        bytes[0x100] = 9; // out of range
        assert!(!SecureInfoA::from_bytes(bytes).is_valid());
    }

    #[test]
    fn test_store_roundtrip_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let store = UniqueDataStore::new(dir.path());
        assert!(store.otp().is_none());
        assert!(!store.is_full_console_linked());

        let path = store.otp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, valid_otp_bytes()).unwrap();

        // Cached miss until invalidated
        assert!(store.otp().is_none());
        store.invalidate();
        assert!(store.otp().unwrap().is_valid());
    }
}
