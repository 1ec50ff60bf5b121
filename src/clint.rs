//! The clint module contains the core-local interruptor (CLINT). The CLINT
//! block holds the memory-mapped `mtime` and `mtimecmp` registers associated
//! with the machine timer.

use crate::exception::Exception;
use crate::param::{CLINT_MTIME, CLINT_MTIMECMP};
use Exception::*;

pub struct Clint {
    mtime: u64,
    mtimecmp: u64,
}

impl Clint {
    pub fn new() -> Self {
        Self {
            mtime: 0,
            mtimecmp: 0,
        }
    }

    /// Advance `mtime` by one tick. Returns true when the counter reaches the
    /// comparator, i.e. exactly once per armed deadline; the step loop turns
    /// that edge into `mip.MTIP`.
    pub fn tick(&mut self) -> bool {
        self.mtime = self.mtime.wrapping_add(1);
        self.mtimecmp != 0 && self.mtime == self.mtimecmp
    }

    pub fn load(&self, addr: u64, size: u64) -> Result<u64, Exception> {
        if size != 64 {
            return Err(LoadAccessFault(addr));
        }
        match addr {
            CLINT_MTIMECMP => Ok(self.mtimecmp),
            CLINT_MTIME => Ok(self.mtime),
            _ => Ok(0),
        }
    }

    pub fn store(&mut self, addr: u64, size: u64, value: u64) -> Result<(), Exception> {
        if size != 64 {
            return Err(StoreAMOAccessFault(addr));
        }
        match addr {
            CLINT_MTIMECMP => self.mtimecmp = value,
            CLINT_MTIME => self.mtime = value,
            _ => {}
        }
        Ok(())
    }
}

impl Default for Clint {
    fn default() -> Self {
        Self::new()
    }
}
