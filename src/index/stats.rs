use std::ops::AddAssign;

/// Blocks and compressed bytes touched while answering queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
    pub last_blocks: u64,
    pub last_bytes: u64,
    pub alpha_blocks: u64,
    pub alpha_bytes: u64,
    pub pcdata_blocks: u64,
    pub pcdata_bytes: u64,
}

impl AccessStats {
    pub fn total_blocks(&self) -> u64 {
        self.last_blocks + self.alpha_blocks + self.pcdata_blocks
    }

    pub fn total_bytes(&self) -> u64 {
        self.last_bytes + self.alpha_bytes + self.pcdata_bytes
    }

    pub(crate) fn touch_last(&mut self, bytes: usize) {
        self.last_blocks += 1;
        self.last_bytes += bytes as u64;
    }

    pub(crate) fn touch_alpha(&mut self, bytes: usize) {
        self.alpha_blocks += 1;
        self.alpha_bytes += bytes as u64;
    }

    pub(crate) fn touch_pcdata(&mut self, bytes: usize) {
        self.pcdata_blocks += 1;
        self.pcdata_bytes += bytes as u64;
    }
}

impl AddAssign for AccessStats {
    fn add_assign(&mut self, other: Self) {
        self.last_blocks += other.last_blocks;
        self.last_bytes += other.last_bytes;
        self.alpha_blocks += other.alpha_blocks;
        self.alpha_bytes += other.alpha_bytes;
        self.pcdata_blocks += other.pcdata_blocks;
        self.pcdata_bytes += other.pcdata_bytes;
    }
}
