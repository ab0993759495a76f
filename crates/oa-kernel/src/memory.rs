//! Memory constants and mode enums

/// Page size of the emulated MMU
pub const PAGE_SIZE: u32 = 0x1000;

/// Base (Old-3DS) memory mode declared by a title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Prod = 0,
    Dev1 = 2,
    Dev2 = 3,
    Dev3 = 4,
    Dev4 = 5,
}

impl MemoryMode {
    pub fn from_exheader(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Prod),
            2 => Some(Self::Dev1),
            3 => Some(Self::Dev2),
            4 => Some(Self::Dev3),
            5 => Some(Self::Dev4),
            _ => None,
        }
    }
}

/// New-3DS memory mode declared by a title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum New3dsMemoryMode {
    /// Title is unaware of New-3DS hardware
    Legacy = 0,
    NewProd = 1,
    NewDev1 = 2,
    NewDev2 = 3,
}

impl New3dsMemoryMode {
    pub fn from_exheader(value: u8) -> Self {
        match value & 0xF {
            1 => Self::NewProd,
            2 => Self::NewDev1,
            3 => Self::NewDev2,
            _ => Self::Legacy,
        }
    }
}

/// New-3DS hardware capabilities declared by a title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct New3dsHwCapabilities {
    pub enable_l2_cache: bool,
    pub enable_804mhz_cpu: bool,
    pub memory_mode: New3dsMemoryMode,
}

/// Hardware revision the emulated device presents to system titles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwRevision {
    Old3ds,
    New3ds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_mode_from_exheader() {
        assert_eq!(MemoryMode::from_exheader(0), Some(MemoryMode::Prod));
        assert_eq!(MemoryMode::from_exheader(3), Some(MemoryMode::Dev2));
        assert_eq!(MemoryMode::from_exheader(1), None);
    }

    #[test]
    fn test_n3ds_mode_legacy_default() {
        assert_eq!(New3dsMemoryMode::from_exheader(0), New3dsMemoryMode::Legacy);
        assert_eq!(New3dsMemoryMode::from_exheader(7), New3dsMemoryMode::Legacy);
        assert_eq!(New3dsMemoryMode::from_exheader(1), New3dsMemoryMode::NewProd);
    }
}
