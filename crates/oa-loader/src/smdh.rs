//! SMDH icon metadata
//!
//! Only the fields the loader consumes: the magic, the short title table
//! and the region lockout word.

/// Total size of an SMDH record
pub const SMDH_SIZE: usize = 0x36C0;

const MAGIC: &[u8; 4] = b"SMDH";
const TITLE_TABLE_OFFSET: usize = 0x8;
const TITLE_ENTRY_SIZE: usize = 0x200;
const SHORT_TITLE_BYTES: usize = 0x80;
const NUM_TITLE_ENTRIES: usize = 16;
const REGION_LOCKOUT_OFFSET: usize = 0x2018;

/// Languages indexing the title table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleLanguage {
    Japanese = 0,
    English = 1,
    French = 2,
    German = 3,
    Italian = 4,
    Spanish = 5,
    SimplifiedChinese = 6,
    Korean = 7,
    Dutch = 8,
    Portuguese = 9,
    Russian = 10,
    TraditionalChinese = 11,
}

/// Whether a buffer holds a structurally valid SMDH
pub fn is_valid_smdh(data: &[u8]) -> bool {
    data.len() >= SMDH_SIZE && &data[..4] == MAGIC
}

/// Short title for a language, decoded from UTF-16LE up to the first nul
pub fn short_title(data: &[u8], language: TitleLanguage) -> Option<String> {
    if !is_valid_smdh(data) {
        return None;
    }
    let index = language as usize;
    if index >= NUM_TITLE_ENTRIES {
        return None;
    }
    let start = TITLE_TABLE_OFFSET + index * TITLE_ENTRY_SIZE;
    let raw = &data[start..start + SHORT_TITLE_BYTES];

    let mut units = Vec::with_capacity(SHORT_TITLE_BYTES / 2);
    for pair in raw.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Some(String::from_utf16_lossy(&units))
}

/// Region lockout bitmask; bit N set means region N is playable
pub fn region_lockout(data: &[u8]) -> Option<u32> {
    if data.len() < REGION_LOCKOUT_OFFSET + 4 {
        return None;
    }
    Some(u32::from_le_bytes([
        data[REGION_LOCKOUT_OFFSET],
        data[REGION_LOCKOUT_OFFSET + 1],
        data[REGION_LOCKOUT_OFFSET + 2],
        data[REGION_LOCKOUT_OFFSET + 3],
    ]))
}
