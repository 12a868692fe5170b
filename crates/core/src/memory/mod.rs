#[derive(Debug, Clone)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ProgramImage {
    pub entry_point: u64,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u64) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }
}

/// A simple flat memory storage
#[derive(Debug)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u64,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u64) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base_addr && addr < self.base_addr + self.data.len() as u64
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if self.contains(addr) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        if self.contains(addr) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        // Simple overlap check
        let end_addr = segment.start_addr + segment.data.len() as u64;
        let mem_end = self.base_addr + self.data.len() as u64;

        if segment.start_addr >= self.base_addr && end_addr <= mem_end {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut mem = LinearMemory::new(16, 0x100);
        assert!(mem.read_u8(0xFF).is_none());
        assert!(mem.read_u8(0x110).is_none());
        assert!(mem.write_u8(0x100, 0xAB));
        assert_eq!(mem.read_u8(0x100), Some(0xAB));
        assert!(!mem.write_u8(0x110, 0));
    }

    #[test]
    fn test_segment_load() {
        let mut mem = LinearMemory::new(16, 0);
        let mut image = ProgramImage::new(4);
        image.add_segment(4, vec![1, 2, 3, 4]);
        assert!(mem.load_from_segment(&image.segments[0]));
        assert_eq!(mem.read_u8(5), Some(2));

        // Segment spilling past the end must be rejected untouched.
        image.add_segment(14, vec![9, 9, 9]);
        assert!(!mem.load_from_segment(&image.segments[1]));
        assert_eq!(mem.read_u8(14), Some(0));
    }
}
