//! Region inference for system titles
//!
//! System titles carry no SMDH region lockout; their title IDs encode the
//! region variant instead, in bits 12-15 of the low title-ID word.

/// Title-ID high words that follow the region-variant encoding
const SYSTEM_APPLICATION_HIGH: u32 = 0x0004_0010;
const SYSTEM_APPLET_HIGH: u32 = 0x0004_0030;

const NUM_REGIONS: u32 = 7;

/// Region index for a system title, if the program ID encodes one
pub fn system_title_region(program_id: u64) -> Option<u32> {
    let high = (program_id >> 32) as u32;
    if high != SYSTEM_APPLICATION_HIGH && high != SYSTEM_APPLET_HIGH {
        return None;
    }
    let region = ((program_id >> 12) & 0xF) as u32;
    if region < NUM_REGIONS {
        Some(region)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_settings_variants() {
        // System Settings: JPN, USA, EUR variants
        assert_eq!(system_title_region(0x0004_0010_0002_0000), Some(0));
        assert_eq!(system_title_region(0x0004_0010_0002_1000), Some(1));
        assert_eq!(system_title_region(0x0004_0010_0002_2000), Some(2));
    }

    #[test]
    fn test_non_system_titles_have_no_region() {
        assert_eq!(system_title_region(0x0004_0000_0003_1900), None);
        // Region digit out of range
        assert_eq!(system_title_region(0x0004_0010_0002_9000), None);
    }
}
