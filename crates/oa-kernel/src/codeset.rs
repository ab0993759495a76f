//! Codeset: segment layout of a process image prior to creation

/// One contiguous segment within a codeset image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset into the backing image
    pub offset: u32,
    /// Virtual address the segment maps to
    pub addr: u32,
    /// Size in bytes (always page-rounded)
    pub size: u32,
}

/// In-memory description of a process's code/rodata/data segments
#[derive(Debug, Clone, Default)]
pub struct CodeSet {
    pub name: String,
    pub program_id: u64,
    pub code: Segment,
    pub rodata: Segment,
    pub data: Segment,
    pub entrypoint: u32,
    /// Backing image: text + rodata + data (+ zeroed bss)
    pub memory: Vec<u8>,
}

impl CodeSet {
    pub fn new(name: String, program_id: u64) -> Self {
        Self {
            name,
            program_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codeset_default_segments() {
        let cs = CodeSet::new("launcher".to_string(), 0x0004000000031900);
        assert_eq!(cs.code, Segment::default());
        assert_eq!(cs.program_id, 0x0004000000031900);
        assert!(cs.memory.is_empty());
    }
}
