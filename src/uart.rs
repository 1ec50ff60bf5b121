//! A 16550A-compatible UART register file.
//! See the spec: http://byterunner.com/16550.html
//!
//! The core side is a plain register array; the terminal collaborator lives in
//! the host front-end and talks to it between steps through two hooks:
//! `recv_byte` pushes one input byte into RHR and latches the interrupt line,
//! `take_output` drains everything the guest wrote to THR.

use crate::exception::Exception;
use crate::param::{
    MASK_UART_LSR_RX, MASK_UART_LSR_TX, UART_BASE, UART_LSR, UART_RHR, UART_SIZE, UART_THR,
};
use Exception::*;

pub struct Uart {
    regs: [u8; UART_SIZE as usize],
    /// The interrupt line, latched by the host on input and sampled
    /// (single-shot) by the interrupt poll.
    interrupt: bool,
    /// Bytes the guest wrote to THR, waiting for the host to drain them.
    output: Vec<u8>,
}

impl Uart {
    pub fn new() -> Self {
        let mut regs = [0; UART_SIZE as usize];
        regs[UART_LSR as usize] |= MASK_UART_LSR_TX;
        Self {
            regs,
            interrupt: false,
            output: Vec::new(),
        }
    }

    pub fn load(&mut self, addr: u64, size: u64) -> Result<u64, Exception> {
        if size != 8 {
            return Err(LoadAccessFault(addr));
        }
        let index = addr - UART_BASE;
        match index {
            UART_RHR => {
                // the byte has been consumed, drop RX-ready
                self.regs[UART_LSR as usize] &= !MASK_UART_LSR_RX;
                Ok(self.regs[UART_RHR as usize] as u64)
            }
            // The transmitter is always drained by the host, so TX-empty never
            // goes away no matter what the guest scribbled over LSR.
            UART_LSR => Ok((self.regs[UART_LSR as usize] | MASK_UART_LSR_TX) as u64),
            _ => Ok(self.regs[index as usize] as u64),
        }
    }

    pub fn store(&mut self, addr: u64, size: u64, value: u64) -> Result<(), Exception> {
        if size != 8 {
            return Err(StoreAMOAccessFault(addr));
        }
        let index = addr - UART_BASE;
        match index {
            UART_THR => {
                self.output.push(value as u8);
                Ok(())
            }
            _ => {
                self.regs[index as usize] = value as u8;
                Ok(())
            }
        }
    }

    /// Host hook: is the receive register free for another byte?
    pub fn can_recv(&self) -> bool {
        self.regs[UART_LSR as usize] & MASK_UART_LSR_RX == 0
    }

    /// Host hook: deliver one byte of terminal input.
    pub fn recv_byte(&mut self, byte: u8) {
        self.regs[UART_RHR as usize] = byte;
        self.regs[UART_LSR as usize] |= MASK_UART_LSR_RX;
        self.interrupt = true;
    }

    /// Host hook: drain the bytes the guest transmitted.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Report the interrupt line and clear it (single-shot).
    pub fn is_interrupting(&mut self) -> bool {
        let pending = self.interrupt;
        self.interrupt = false;
        pending
    }
}

impl Default for Uart {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::param::{UART_FCR, UART_IER, UART_LCR, UART_MCR, UART_MSR};

    #[test]
    fn tx_empty_always_reported() {
        let mut uart = Uart::new();
        assert_ne!(
            uart.load(UART_BASE + UART_LSR, 8).unwrap() as u8 & MASK_UART_LSR_TX,
            0
        );
        // even after the guest clears LSR outright
        uart.store(UART_BASE + UART_LSR, 8, 0).unwrap();
        assert_ne!(
            uart.load(UART_BASE + UART_LSR, 8).unwrap() as u8 & MASK_UART_LSR_TX,
            0
        );
    }

    #[test]
    fn receive_lifecycle() {
        let mut uart = Uart::new();
        assert!(uart.can_recv());
        uart.recv_byte(b'x');
        assert!(!uart.can_recv());
        assert_ne!(
            uart.load(UART_BASE + UART_LSR, 8).unwrap() as u8 & MASK_UART_LSR_RX,
            0
        );
        assert_eq!(uart.load(UART_BASE + UART_RHR, 8).unwrap(), b'x' as u64);
        // reading RHR released the holding register
        assert!(uart.can_recv());
    }

    #[test]
    fn interrupt_line_is_single_shot() {
        let mut uart = Uart::new();
        uart.recv_byte(b'a');
        assert!(uart.is_interrupting());
        assert!(!uart.is_interrupting());
    }

    #[test]
    fn transmit_collects_output() {
        let mut uart = Uart::new();
        for b in b"hi" {
            uart.store(UART_BASE + UART_THR, 8, *b as u64).unwrap();
        }
        assert_eq!(uart.take_output(), b"hi");
        assert!(uart.take_output().is_empty());
    }

    #[test]
    fn plain_registers_round_trip() {
        let mut uart = Uart::new();
        for (reg, value) in [
            (UART_IER, 0x0b),
            (UART_FCR, 0x07),
            (UART_LCR, 0x03),
            (UART_MCR, 0x08),
            (UART_MSR, 0xb0),
        ] {
            uart.store(UART_BASE + reg, 8, value).unwrap();
            assert_eq!(uart.load(UART_BASE + reg, 8).unwrap(), value);
        }
    }

    #[test]
    fn only_8_bit_access() {
        let mut uart = Uart::new();
        assert_eq!(uart.load(UART_BASE, 16), Err(LoadAccessFault(UART_BASE)));
        assert_eq!(
            uart.store(UART_BASE, 32, 0),
            Err(StoreAMOAccessFault(UART_BASE))
        );
    }
}
