//! DRAM: a flat little-endian byte array living at `DRAM_BASE`.

use crate::exception::Exception;
use crate::param::{DRAM_BASE, DRAM_SIZE};
use Exception::*;

pub struct Dram {
    dram: Vec<u8>,
}

impl Dram {
    /// Build the memory with `code` copied to offset 0 (that is, `DRAM_BASE`),
    /// truncated if the image is larger than the memory.
    pub fn new(code: Vec<u8>) -> Dram {
        let mut dram = vec![0; DRAM_SIZE as usize];
        let len = code.len().min(DRAM_SIZE as usize);
        dram[..len].copy_from_slice(&code[..len]);
        Self { dram }
    }

    // addr is in range, checked by the bus; the width and the tail of the
    // region are checked here. No alignment policing at this layer.
    pub fn load(&self, addr: u64, size: u64) -> Result<u64, Exception> {
        if ![8, 16, 32, 64].contains(&size) {
            return Err(LoadAccessFault(addr));
        }
        let nbytes = (size / 8) as usize;
        let index = (addr - DRAM_BASE) as usize;
        if index + nbytes > DRAM_SIZE as usize {
            return Err(LoadAccessFault(addr));
        }
        let mut value = 0;
        for i in 0..nbytes {
            value |= (self.dram[index + i] as u64) << (i * 8);
        }
        Ok(value)
    }

    pub fn store(&mut self, addr: u64, size: u64, value: u64) -> Result<(), Exception> {
        if ![8, 16, 32, 64].contains(&size) {
            return Err(StoreAMOAccessFault(addr));
        }
        let nbytes = (size / 8) as usize;
        let index = (addr - DRAM_BASE) as usize;
        if index + nbytes > DRAM_SIZE as usize {
            return Err(StoreAMOAccessFault(addr));
        }
        for i in 0..nbytes {
            self.dram[index + i] = (value >> (i * 8)) as u8;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_all_sizes() {
        let mut dram = Dram::new(vec![]);
        for size in [8, 16, 32, 64] {
            let value = 0x1122_3344_5566_7788u64;
            let mask = if size == 64 { u64::MAX } else { (1 << size) - 1 };
            dram.store(DRAM_BASE + 0x100, size, value).unwrap();
            assert_eq!(dram.load(DRAM_BASE + 0x100, size).unwrap(), value & mask);
        }
    }

    #[test]
    fn little_endian_views() {
        let mut dram = Dram::new(vec![]);
        dram.store(DRAM_BASE + 0x1000, 32, 0xdead_beef).unwrap();
        assert_eq!(dram.load(DRAM_BASE + 0x1000, 32).unwrap(), 0xdead_beef);
        assert_eq!(dram.load(DRAM_BASE + 0x1000, 8).unwrap(), 0xef);
        assert_eq!(dram.load(DRAM_BASE + 0x1000, 16).unwrap(), 0xbeef);
        assert_eq!(dram.load(DRAM_BASE + 0x1003, 8).unwrap(), 0xde);
    }

    #[test]
    fn code_lands_at_base() {
        let dram = Dram::new(vec![0x13, 0x05, 0xa0, 0x02]);
        assert_eq!(dram.load(DRAM_BASE, 32).unwrap(), 0x02a0_0513);
    }

    #[test]
    fn tail_overrun_faults() {
        let mut dram = Dram::new(vec![]);
        let last = DRAM_BASE + DRAM_SIZE - 1;
        assert_eq!(dram.load(last, 8).unwrap(), 0);
        assert_eq!(dram.load(last, 64), Err(LoadAccessFault(last)));
        assert_eq!(dram.store(last, 32, 0), Err(StoreAMOAccessFault(last)));
    }

    #[test]
    fn bad_width_faults() {
        let mut dram = Dram::new(vec![]);
        assert_eq!(dram.load(DRAM_BASE, 24), Err(LoadAccessFault(DRAM_BASE)));
        assert_eq!(
            dram.store(DRAM_BASE, 48, 0),
            Err(StoreAMOAccessFault(DRAM_BASE))
        );
    }
}
