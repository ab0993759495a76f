//! Filesystem adapters for oxidized-artic

pub mod romfs;
pub mod secure_value;
pub mod unique_data;

pub use romfs::{ArticRomFsReader, RomFsReader};
pub use secure_value::{ArticSecureValueBackend, SecureValueBackend};
pub use unique_data::{
    LocalFriendCodeSeedB, MovableSed, MovableVariant, Otp, SecureInfoA, UniqueDataStore,
    FRIEND_CODE_SEED_B_SIZE, MOVABLE_SED_FULL_SIZE, MOVABLE_SED_LEGACY_SIZE, OTP_SIZE,
    SECURE_INFO_A_SIZE,
};
