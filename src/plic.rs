//! The plic module contains the platform-level interrupt controller (PLIC).
//! The plic connects all external interrupts in the system to all hart
//! contexts in the system, via the external interrupt source in each hart.
//! It's the global interrupt controller in a RISC-V system.

use crate::exception::Exception;
use crate::param::{PLIC_PENDING, PLIC_SCLAIM, PLIC_SENABLE, PLIC_SPRIORITY};
use Exception::*;

pub struct Plic {
    pending: u32,
    senable: u32,
    spriority: u32,
    sclaim: u32,
}

impl Plic {
    pub fn new() -> Self {
        Self {
            pending: 0,
            senable: 0,
            spriority: 0,
            sclaim: 0,
        }
    }

    pub fn load(&self, addr: u64, size: u64) -> Result<u64, Exception> {
        if size != 32 {
            return Err(LoadAccessFault(addr));
        }
        match addr {
            PLIC_PENDING => Ok(self.pending as u64),
            PLIC_SENABLE => Ok(self.senable as u64),
            PLIC_SPRIORITY => Ok(self.spriority as u64),
            PLIC_SCLAIM => Ok(self.sclaim as u64),
            _ => Ok(0),
        }
    }

    pub fn store(&mut self, addr: u64, size: u64, value: u64) -> Result<(), Exception> {
        if size != 32 {
            return Err(StoreAMOAccessFault(addr));
        }
        let value = value as u32;
        match addr {
            PLIC_PENDING => self.pending = value,
            PLIC_SENABLE => self.senable = value,
            PLIC_SPRIORITY => self.spriority = value,
            PLIC_SCLAIM => self.sclaim = value,
            _ => {}
        }
        Ok(())
    }
}

impl Default for Plic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn registers_round_trip() {
        let mut plic = Plic::new();
        plic.store(PLIC_SENABLE, 32, 1 << 10).unwrap();
        plic.store(PLIC_SCLAIM, 32, 10).unwrap();
        assert_eq!(plic.load(PLIC_SENABLE, 32).unwrap(), 1 << 10);
        assert_eq!(plic.load(PLIC_SCLAIM, 32).unwrap(), 10);
        assert_eq!(plic.load(PLIC_PENDING, 32).unwrap(), 0);
    }

    #[test]
    fn only_32_bit_access() {
        let mut plic = Plic::new();
        assert_eq!(
            plic.load(PLIC_SCLAIM, 64),
            Err(LoadAccessFault(PLIC_SCLAIM))
        );
        assert_eq!(
            plic.store(PLIC_SPRIORITY, 8, 1),
            Err(StoreAMOAccessFault(PLIC_SPRIORITY))
        );
    }
}
