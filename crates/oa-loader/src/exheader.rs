//! Executable header (exheader) wire parser
//!
//! The server sends the 0x400-byte header prefix: codeset geometry, system
//! local capabilities and the kernel capability descriptor array. Access
//! descriptors past 0x400 are never consumed here. All fields are read with
//! explicit little-endian offset readers.

use oa_core::LoaderError;

/// Size of the header prefix transferred over the wire
pub const EXHEADER_WIRE_SIZE: usize = 0x400;

/// Size of a full header including the access descriptor
pub const EXHEADER_FULL_SIZE: usize = 0x800;

/// Number of 32-bit kernel capability descriptors
pub const NUM_KERNEL_CAP_DESCRIPTORS: usize = 28;

const NAME_OFFSET: usize = 0x000;
const TEXT_SEGMENT_OFFSET: usize = 0x010;
const STACK_SIZE_OFFSET: usize = 0x01C;
const RO_SEGMENT_OFFSET: usize = 0x020;
const DATA_SEGMENT_OFFSET: usize = 0x030;
const BSS_SIZE_OFFSET: usize = 0x03C;
const PROGRAM_ID_OFFSET: usize = 0x200;
const CORE_VERSION_OFFSET: usize = 0x208;
const FLAG1_OFFSET: usize = 0x20C;
const FLAG2_OFFSET: usize = 0x20D;
const FLAG0_OFFSET: usize = 0x20E;
const PRIORITY_OFFSET: usize = 0x20F;
const STORAGE_INFO_OFFSET: usize = 0x230;
const RESOURCE_LIMIT_CATEGORY_OFFSET: usize = 0x37F;
const KERNEL_CAPS_OFFSET: usize = 0x380;

/// One code segment described by the header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentInfo {
    pub address: u32,
    pub num_pages: u32,
    pub size: u32,
}

/// Codeset geometry: the three segments plus stack and bss sizes
#[derive(Debug, Clone, Default)]
pub struct CodeSetInfo {
    pub name: [u8; 8],
    pub text: SegmentInfo,
    pub stack_size: u32,
    pub ro: SegmentInfo,
    pub data: SegmentInfo,
    pub bss_size: u32,
}

impl CodeSetInfo {
    /// Application name, zero-terminated within its fixed field
    pub fn name_str(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).to_string()
    }
}

/// Filesystem access block of the system local capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageInfo {
    pub ext_save_data_id: u64,
    pub system_save_data_ids: u64,
    pub accessible_unique_ids: u64,
    pub access_info: [u8; 7],
    pub other_attributes: u8,
}

impl StorageInfo {
    /// Whether the title uses extended save-data access (the id fields then
    /// hold packed 20-bit id slots instead of one plain id)
    pub fn uses_extended_savedata_access(&self) -> bool {
        self.other_attributes & 0x02 != 0
    }

    /// Packed 20-bit extdata id slot. Slots 0-2 live in `ext_save_data_id`,
    /// slots 3-5 in `accessible_unique_ids`.
    pub fn extdata_id_slot(&self, slot: usize) -> u64 {
        let word = if slot < 3 {
            self.ext_save_data_id
        } else {
            self.accessible_unique_ids
        };
        (word >> (20 * (slot % 3))) & 0xFFFFF
    }
}

/// System local capabilities of the header
#[derive(Debug, Clone, Default)]
pub struct SystemLocalCaps {
    pub program_id: u64,
    pub core_version: u32,
    pub enable_l2_cache: bool,
    pub enable_804mhz_cpu: bool,
    pub n3ds_mode: u8,
    pub ideal_processor: u8,
    pub affinity_mask: u8,
    pub system_mode: u8,
    pub priority: u8,
    pub storage_info: StorageInfo,
    pub resource_limit_category: u8,
}

/// Parsed executable header prefix
#[derive(Debug, Clone, Default)]
pub struct ExHeader {
    pub codeset_info: CodeSetInfo,
    pub system_local_caps: SystemLocalCaps,
    pub kernel_caps: [u32; NUM_KERNEL_CAP_DESCRIPTORS],
}

impl ExHeader {
    /// Parse the header prefix. Accepts a buffer of at least
    /// `EXHEADER_WIRE_SIZE` bytes; callers validate the exact transfer size
    /// they expect before calling.
    pub fn parse(bytes: &[u8]) -> Result<Self, LoaderError> {
        if bytes.len() < EXHEADER_WIRE_SIZE {
            return Err(LoaderError::InvalidFormat(format!(
                "exheader is {} bytes, need at least {:#x}",
                bytes.len(),
                EXHEADER_WIRE_SIZE
            )));
        }

        let mut name = [0u8; 8];
        name.copy_from_slice(&bytes[NAME_OFFSET..NAME_OFFSET + 8]);

        let codeset_info = CodeSetInfo {
            name,
            text: read_segment(bytes, TEXT_SEGMENT_OFFSET),
            stack_size: read_u32(bytes, STACK_SIZE_OFFSET),
            ro: read_segment(bytes, RO_SEGMENT_OFFSET),
            data: read_segment(bytes, DATA_SEGMENT_OFFSET),
            bss_size: read_u32(bytes, BSS_SIZE_OFFSET),
        };

        let flag0 = bytes[FLAG0_OFFSET];
        let flag1 = bytes[FLAG1_OFFSET];
        let flag2 = bytes[FLAG2_OFFSET];

        let mut access_info = [0u8; 7];
        access_info.copy_from_slice(&bytes[STORAGE_INFO_OFFSET + 0x18..STORAGE_INFO_OFFSET + 0x1F]);

        let system_local_caps = SystemLocalCaps {
            program_id: read_u64(bytes, PROGRAM_ID_OFFSET),
            core_version: read_u32(bytes, CORE_VERSION_OFFSET),
            enable_l2_cache: flag1 & 0x01 != 0,
            enable_804mhz_cpu: flag1 & 0x02 != 0,
            n3ds_mode: flag2 & 0x0F,
            ideal_processor: flag0 & 0x03,
            affinity_mask: (flag0 >> 2) & 0x03,
            system_mode: flag0 >> 4,
            priority: bytes[PRIORITY_OFFSET],
            storage_info: StorageInfo {
                ext_save_data_id: read_u64(bytes, STORAGE_INFO_OFFSET),
                system_save_data_ids: read_u64(bytes, STORAGE_INFO_OFFSET + 0x08),
                accessible_unique_ids: read_u64(bytes, STORAGE_INFO_OFFSET + 0x10),
                access_info,
                other_attributes: bytes[STORAGE_INFO_OFFSET + 0x1F],
            },
            resource_limit_category: bytes[RESOURCE_LIMIT_CATEGORY_OFFSET],
        };

        let mut kernel_caps = [0u32; NUM_KERNEL_CAP_DESCRIPTORS];
        for (i, cap) in kernel_caps.iter_mut().enumerate() {
            *cap = read_u32(bytes, KERNEL_CAPS_OFFSET + i * 4);
        }

        Ok(Self {
            codeset_info,
            system_local_caps,
            kernel_caps,
        })
    }

    /// Total byte size of the code image the server will transfer: the sum
    /// of the page-rounded text, ro and data segments (bss excluded).
    pub fn code_image_size(&self) -> usize {
        let pages = self.codeset_info.text.num_pages
            + self.codeset_info.ro.num_pages
            + self.codeset_info.data.num_pages;
        pages as usize * oa_kernel::PAGE_SIZE as usize
    }
}

fn read_segment(bytes: &[u8], offset: usize) -> SegmentInfo {
    SegmentInfo {
        address: read_u32(bytes, offset),
        num_pages: read_u32(bytes, offset + 4),
        size: read_u32(bytes, offset + 8),
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
        bytes[offset + 4],
        bytes[offset + 5],
        bytes[offset + 6],
        bytes[offset + 7],
    ])
}
