//! The cpu module contains `Cpu` and implementation for it: the fetch/decode/
//! execute loop, the trap unit, the page-table walker and the per-step
//! interrupt poll.

use log::{debug, trace};

use crate::bus::Bus;
use crate::csr::*;
use crate::exception::Exception;
use crate::interrupt::{Interrupt, MASK_INTERRUPT_BIT};
use crate::param::*;
use crate::virtqueue::{VirtqDesc, VIRTQ_DESC_F_WRITE, VIRTQ_DESC_SIZE};

// RISC-V privilege mode
pub type Mode = u32;
pub const USER: Mode = 0b00;
pub const SUPERVISOR: Mode = 0b01;
pub const MACHINE: Mode = 0b11;

#[derive(Debug, Copy, Clone)]
pub enum AccessType {
    Instruction,
    Load,
    Store,
}

impl AccessType {
    fn page_fault(self, addr: u64) -> Exception {
        match self {
            AccessType::Instruction => Exception::InstructionPageFault(addr),
            AccessType::Load => Exception::LoadPageFault(addr),
            AccessType::Store => Exception::StoreAMOPageFault(addr),
        }
    }

    fn access_fault(self, addr: u64) -> Exception {
        match self {
            AccessType::Instruction => Exception::InstructionAccessFault(addr),
            AccessType::Load => Exception::LoadAccessFault(addr),
            AccessType::Store => Exception::StoreAMOAccessFault(addr),
        }
    }
}

const RVABI: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// The `Cpu` struct contains registers, a program counter, the system bus that
/// connects peripheral devices, and control and status registers.
pub struct Cpu {
    /// 32 32-bit integer registers.
    pub regs: [u32; 32],
    /// Program counter holding the address of the next instruction.
    pub pc: u32,
    /// The current privilege mode.
    pub mode: Mode,
    /// System bus that transfers data between the CPU and peripheral devices.
    pub bus: Bus,
    /// Control and status registers, a 12-bit encoding space of 4096 slots.
    pub csr: Csr,
    /// Paging flag, derived from satp on every write to it.
    pub enable_paging: bool,
    /// Root page-table address: satp ppn × PAGE_SIZE. Wider than the XLEN
    /// because a 22-bit ppn shifted by 12 does not fit in 32 bits.
    pub page_table: u64,
    /// Reservation set for lr.w/sc.w.
    reservation: Option<u32>,
}

impl Cpu {
    /// Create a new `Cpu` with the kernel image in DRAM and the disk image
    /// behind the virtio block device.
    pub fn new(code: Vec<u8>, disk_image: Vec<u8>) -> Self {
        let mut regs = [0; 32];
        regs[2] = (DRAM_BASE + DRAM_SIZE) as u32;
        Self {
            regs,
            pc: DRAM_BASE as u32,
            mode: MACHINE,
            bus: Bus::new(code, disk_image),
            csr: Csr::new(),
            enable_paging: false,
            page_table: 0,
            reservation: None,
        }
    }

    /// Look a register up by its ABI name; handy for the front-end and tests.
    pub fn reg(&self, r: &str) -> u32 {
        if let Some(i) = RVABI.iter().position(|&name| name == r) {
            return self.regs[i];
        }
        match r {
            "pc" => self.pc,
            "fp" => self.reg("s0"),
            "mstatus" => self.csr.load(MSTATUS),
            "mtvec" => self.csr.load(MTVEC),
            "mepc" => self.csr.load(MEPC),
            "mcause" => self.csr.load(MCAUSE),
            "sstatus" => self.csr.load(SSTATUS),
            "stvec" => self.csr.load(STVEC),
            "sepc" => self.csr.load(SEPC),
            "scause" => self.csr.load(SCAUSE),
            "satp" => self.csr.load(SATP),
            r if r.starts_with('x') => match r[1..].parse::<usize>() {
                Ok(i) if i <= 31 => self.regs[i],
                _ => panic!("invalid register {}", r),
            },
            _ => panic!("invalid register {}", r),
        }
    }

    pub fn dump_pc(&self) {
        println!("{:-^80}", "PC register");
        println!("PC = {:#x}\n", self.pc);
    }

    pub fn dump_registers(&mut self) {
        println!("{:-^80}", "registers");
        self.regs[0] = 0;
        for i in (0..32).step_by(4) {
            println!(
                "x{:<2}({:^4}) = {:<#10x} x{:<2}({:^4}) = {:<#10x} x{:<2}({:^4}) = {:<#10x} x{:<2}({:^4}) = {:<#10x}",
                i, RVABI[i], self.regs[i],
                i + 1, RVABI[i + 1], self.regs[i + 1],
                i + 2, RVABI[i + 2], self.regs[i + 2],
                i + 3, RVABI[i + 3], self.regs[i + 3],
            );
        }
    }

    pub fn dump_csrs(&self) {
        self.csr.dump_csrs();
    }

    /// Run one instruction: fetch, execute, trap bookkeeping and the
    /// interrupt poll. `Err` is returned only for fatal traps; everything
    /// else is absorbed by the trap unit and stepping may continue.
    pub fn step(&mut self) -> Result<(), Exception> {
        if self.bus.clint.tick() {
            self.csr.store(MIP, self.csr.load(MIP) | MASK_MTIP);
        }

        match self.fetch() {
            Ok(inst) => {
                self.pc = self.pc.wrapping_add(4);
                if let Err(e) = self.execute(inst) {
                    self.handle_exception(e);
                    if e.is_fatal() {
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                self.pc = self.pc.wrapping_add(4);
                self.handle_exception(e);
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }

        if let Some(interrupt) = self.check_pending_interrupt() {
            self.handle_interrupt(interrupt);
        }
        Ok(())
    }

    pub fn handle_exception(&mut self, e: Exception) {
        trace!("exception: {} (pc = {:#x})", e, self.pc.wrapping_sub(4));
        self.take_trap(e.code(), false);
    }

    pub fn handle_interrupt(&mut self, interrupt: Interrupt) {
        trace!("interrupt: {:?} (pc = {:#x})", interrupt, self.pc);
        self.take_trap(interrupt.code(), true);
    }

    // Trap entry. The step loop has already advanced pc past the instruction
    // being blamed, so epc is pc - 4. The trap lands in S-mode when the
    // previous mode may be delegated to and the matching delegation bit is
    // set, otherwise in M-mode.
    fn take_trap(&mut self, cause: u32, is_interrupt: bool) {
        let epc = self.pc.wrapping_sub(4);
        let prev_mode = self.mode;
        let cause_code = cause & !MASK_INTERRUPT_BIT;

        let delegated = prev_mode <= SUPERVISOR
            && if is_interrupt {
                self.csr.is_midelegated(cause_code)
            } else {
                self.csr.is_medelegated(cause_code)
            };

        let (status_reg, tvec_reg, cause_reg, tval_reg, epc_reg, mask_pie, pie_i, mask_ie, ie_i) =
            if delegated {
                self.mode = SUPERVISOR;
                (SSTATUS, STVEC, SCAUSE, STVAL, SEPC, MASK_SPIE, 5, MASK_SIE, 1)
            } else {
                self.mode = MACHINE;
                (MSTATUS, MTVEC, MCAUSE, MTVAL, MEPC, MASK_MPIE, 7, MASK_MIE, 3)
            };

        // tvec bit 0 selects vectored mode, which applies to interrupts only.
        let tvec = self.csr.load(tvec_reg);
        self.pc = tvec & !1;
        if is_interrupt && tvec & 1 == 1 {
            self.pc = self.pc.wrapping_add(4 * cause_code);
        }

        self.csr.store(epc_reg, epc & !1);
        self.csr.store(cause_reg, cause);
        self.csr.store(tval_reg, 0);

        // xPIE <- xIE, xIE <- 0, xPP <- previous mode
        let mut status = self.csr.load(status_reg);
        let ie = (status & mask_ie) >> ie_i;
        status = (status & !mask_pie) | (ie << pie_i);
        status &= !mask_ie;
        if delegated {
            let spp = if prev_mode == USER { 0 } else { 1 };
            status = (status & !MASK_SPP) | (spp << 8);
        } else {
            // simplified: MPP always drops to U-mode
            status &= !MASK_MPP;
        }
        self.csr.store(status_reg, status);
    }

    /// Evaluate the interrupt sources and return at most one interrupt to
    /// take, highest priority first. External devices are scanned here and
    /// claimed into the PLIC before the mie/mip resolution.
    pub fn check_pending_interrupt(&mut self) -> Option<Interrupt> {
        use Interrupt::*;

        // Interrupts are globally gated by the IE bit of the current mode;
        // anything running in U-mode can always be interrupted.
        if self.mode == MACHINE && self.csr.load(MSTATUS) & MASK_MIE == 0 {
            return None;
        }
        if self.mode == SUPERVISOR && self.csr.load(SSTATUS) & MASK_SIE == 0 {
            return None;
        }

        let irq;
        if self.bus.uart.is_interrupting() {
            irq = UART_IRQ;
        } else if self.bus.virtio.is_interrupting() {
            // a queue notification is serviced right here, then claimed
            self.disk_access();
            irq = VIRTIO_IRQ;
        } else {
            irq = 0;
        }

        if irq != 0 {
            self.bus.store(PLIC_SCLAIM, 32, irq).unwrap();
            self.csr.store(MIP, self.csr.load(MIP) | MASK_SEIP);
        }

        // Multiple simultaneous interrupts are handled in the decreasing
        // priority order MEI, MSI, MTI, SEI, SSI, STI.
        let pending = self.csr.load(MIE) & self.csr.load(MIP);

        if pending & MASK_MEIP != 0 {
            self.csr.store(MIP, self.csr.load(MIP) & !MASK_MEIP);
            return Some(MachineExternalInterrupt);
        }
        if pending & MASK_MSIP != 0 {
            self.csr.store(MIP, self.csr.load(MIP) & !MASK_MSIP);
            return Some(MachineSoftwareInterrupt);
        }
        if pending & MASK_MTIP != 0 {
            self.csr.store(MIP, self.csr.load(MIP) & !MASK_MTIP);
            return Some(MachineTimerInterrupt);
        }
        if pending & MASK_SEIP != 0 {
            self.csr.store(MIP, self.csr.load(MIP) & !MASK_SEIP);
            return Some(SupervisorExternalInterrupt);
        }
        if pending & MASK_SSIP != 0 {
            self.csr.store(MIP, self.csr.load(MIP) & !MASK_SSIP);
            return Some(SupervisorSoftwareInterrupt);
        }
        if pending & MASK_STIP != 0 {
            self.csr.store(MIP, self.csr.load(MIP) & !MASK_STIP);
            return Some(SupervisorTimerInterrupt);
        }
        None
    }

    /// Service one virtio-blk queue notification: walk the two-descriptor
    /// chain and copy between guest memory and the disk image. All ring and
    /// descriptor fields are read through the bus, byte order and bounds
    /// included.
    pub fn disk_access(&mut self) {
        let desc_addr = self.bus.virtio.desc_addr();
        let avail_addr = desc_addr + DESC_NUM as u64 * VIRTQ_DESC_SIZE;
        let used_addr = desc_addr + PAGE_SIZE;

        // The idx field of the available ring tells us where the driver put
        // the head of the next request.
        let idx = self.bus.load(avail_addr + 2, 16).unwrap();
        let head = self
            .bus
            .load(avail_addr + 4 + (idx % DESC_NUM as u64) * 2, 16)
            .unwrap();

        // The first descriptor points at the request header; we only need the
        // sector number at offset 8 and the link to the data descriptor.
        let desc0 = VirtqDesc::fetch(&mut self.bus, desc_addr + VIRTQ_DESC_SIZE * head).unwrap();
        let sector = self.bus.load(desc0.addr + 8, 64).unwrap();

        // The second descriptor carries the data buffer. Its write flag gives
        // the direction: device-writable means the guest wants to read.
        let desc1 = VirtqDesc::fetch(&mut self.bus, desc_addr + VIRTQ_DESC_SIZE * desc0.next as u64)
            .unwrap();

        debug!(
            "virtio-blk: sector {} len {} {}",
            sector,
            desc1.len,
            if desc1.flags & VIRTQ_DESC_F_WRITE == 0 { "write" } else { "read" },
        );

        if desc1.flags & VIRTQ_DESC_F_WRITE == 0 {
            // guest memory to disk
            for i in 0..desc1.len as u64 {
                let data = self.bus.load(desc1.addr + i, 8).unwrap();
                self.bus.virtio.write_disk(sector * SECTOR_SIZE + i, data as u8);
            }
        } else {
            // disk to guest memory
            for i in 0..desc1.len as u64 {
                let data = self.bus.virtio.read_disk(sector * SECTOR_SIZE + i);
                self.bus.store(desc1.addr + i, 8, data as u64).unwrap();
            }
        }

        let new_id = self.bus.virtio.get_new_id();
        self.bus
            .store(used_addr + 2, 16, (new_id % DESC_NUM as u32) as u64)
            .unwrap();
    }

    fn update_paging(&mut self, csr_addr: usize) {
        if csr_addr != SATP {
            return;
        }
        let satp = self.csr.load(SATP);
        // Root page number in the low bits; the multiply needs more than 32
        // bits of room.
        self.page_table = (satp & 0x3f_ffff) as u64 * PAGE_SIZE;
        // The mode nibble sits in the top bits: 8 turns translation on. An
        // xv6-style `1 << 31` MODE write with a zero ASID reads back as 8.
        self.enable_paging = satp >> 28 == 8;
    }

    /// Translate a virtual address to a physical address by walking the page
    /// table. With paging off the address maps to itself.
    pub fn translate(&mut self, addr: u32, access_type: AccessType) -> Result<u64, Exception> {
        if !self.enable_paging {
            return Ok(addr as u64);
        }

        let va = addr as u64;
        let levels: i64 = 3;
        let vpn = [(va >> 12) & 0x1ff, (va >> 21) & 0x1ff, (va >> 30) & 0x1ff];

        // 4.3.2 Virtual Address Translation Process: start at satp.ppn ×
        // PAGESIZE with i = LEVELS - 1 and follow non-leaf PTEs down.
        let mut a = self.page_table;
        let mut i = levels - 1;
        let mut pte;
        loop {
            // A PTE the bus cannot reach raises the access fault matching
            // the original access type, not the bus's own load fault.
            pte = self
                .bus
                .load(a + vpn[i as usize] * 8, 64)
                .map_err(|_| access_type.access_fault(va))?;

            let v = pte & 1;
            let r = (pte >> 1) & 1;
            let w = (pte >> 2) & 1;
            let x = (pte >> 3) & 1;
            if v == 0 || (r == 0 && w == 1) {
                return Err(access_type.page_fault(va));
            }
            if r == 1 || x == 1 {
                break;
            }

            // a pointer to the next level
            i -= 1;
            if i < 0 {
                return Err(access_type.page_fault(va));
            }
            let ppn = (pte >> 10) & 0x0fff_ffff_ffff;
            a = ppn * PAGE_SIZE;
        }

        // A leaf PTE has been found. Permission bits, A/D updates and the
        // misaligned-superpage check are intentionally not modeled.
        let ppn = [
            (pte >> 10) & 0x1ff,
            (pte >> 19) & 0x1ff,
            (pte >> 28) & 0x03ff_ffff,
        ];

        let offset = va & 0xfff;
        match i {
            0 => {
                let ppn = (pte >> 10) & 0x0fff_ffff_ffff;
                Ok((ppn << 12) | offset)
            }
            // superpage translations keep the low vpn fields of the virtual
            // address
            1 => Ok((ppn[2] << 30) | (ppn[1] << 21) | (vpn[0] << 12) | offset),
            2 => Ok((ppn[2] << 30) | (vpn[1] << 21) | (vpn[0] << 12) | offset),
            _ => Err(access_type.page_fault(va)),
        }
    }

    /// Load a value from memory through address translation.
    pub fn load(&mut self, addr: u32, size: u64) -> Result<u32, Exception> {
        let p_addr = self.translate(addr, AccessType::Load)?;
        Ok(self.bus.load(p_addr, size)? as u32)
    }

    /// Store a value to memory through address translation.
    pub fn store(&mut self, addr: u32, size: u64, value: u32) -> Result<(), Exception> {
        let p_addr = self.translate(addr, AccessType::Store)?;
        self.bus.store(p_addr, size, value as u64)
    }

    /// Fetch the instruction at the current pc. Bus misses on fetch surface
    /// as instruction access faults; page faults keep their own identity.
    pub fn fetch(&mut self) -> Result<u32, Exception> {
        let p_pc = self.translate(self.pc, AccessType::Instruction)?;
        match self.bus.load(p_pc, 32) {
            Ok(inst) => Ok(inst as u32),
            Err(_) => Err(Exception::InstructionAccessFault(self.pc as u64)),
        }
    }

    // Control transfers land here so every taken target is checked once.
    fn jump_to(&mut self, target: u32) -> Result<(), Exception> {
        if target & 0x3 != 0 {
            return Err(Exception::InstructionAddrMisaligned(target as u64));
        }
        self.pc = target;
        Ok(())
    }

    /// Execute one decoded instruction. The step loop has already advanced pc
    /// to the next instruction, so pc-relative math works off `pc - 4` and
    /// control transfers simply overwrite pc.
    pub fn execute(&mut self, inst: u32) -> Result<(), Exception> {
        let opcode = inst & 0x7f;
        let rd = ((inst >> 7) & 0x1f) as usize;
        let rs1 = ((inst >> 15) & 0x1f) as usize;
        let rs2 = ((inst >> 20) & 0x1f) as usize;
        let funct3 = (inst >> 12) & 0x7;
        let funct7 = (inst >> 25) & 0x7f;

        // x0 is hardwired with all bits equal to 0.
        self.regs[0] = 0;

        match opcode {
            0x03 => {
                // imm[11:0] = inst[31:20]
                let imm = (inst as i32 >> 20) as u32;
                let addr = self.regs[rs1].wrapping_add(imm);
                match funct3 {
                    0x0 => {
                        // lb
                        let val = self.load(addr, 8)?;
                        self.regs[rd] = val as i8 as i32 as u32;
                    }
                    0x1 => {
                        // lh
                        let val = self.load(addr, 16)?;
                        self.regs[rd] = val as i16 as i32 as u32;
                    }
                    0x2 => {
                        // lw
                        self.regs[rd] = self.load(addr, 32)?;
                    }
                    0x4 => {
                        // lbu
                        self.regs[rd] = self.load(addr, 8)?;
                    }
                    0x5 => {
                        // lhu
                        self.regs[rd] = self.load(addr, 16)?;
                    }
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                }
            }
            0x0f => {
                match funct3 {
                    // fence and fence.i do nothing: this interpreter executes
                    // one instruction at a time, in order.
                    0x0 => {} // fence
                    0x1 => {} // fence.i
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                }
            }
            0x13 => {
                // imm[11:0] = inst[31:20]
                let imm = (inst as i32 >> 20) as u32;
                // the shift amount is the low 5 bits of the immediate
                let shamt = (inst >> 20) & 0x1f;
                match funct3 {
                    0x0 => {
                        // addi
                        self.regs[rd] = self.regs[rs1].wrapping_add(imm);
                    }
                    0x1 => {
                        // slli
                        if funct7 != 0x00 {
                            return Err(Exception::IllegalInstruction(inst as u64));
                        }
                        self.regs[rd] = self.regs[rs1] << shamt;
                    }
                    0x2 => {
                        // slti
                        self.regs[rd] = ((self.regs[rs1] as i32) < (imm as i32)) as u32;
                    }
                    0x3 => {
                        // sltiu
                        self.regs[rd] = (self.regs[rs1] < imm) as u32;
                    }
                    0x4 => {
                        // xori
                        self.regs[rd] = self.regs[rs1] ^ imm;
                    }
                    0x5 => match funct7 {
                        0x00 => {
                            // srli
                            self.regs[rd] = self.regs[rs1] >> shamt;
                        }
                        0x20 => {
                            // srai
                            self.regs[rd] = ((self.regs[rs1] as i32) >> shamt) as u32;
                        }
                        _ => return Err(Exception::IllegalInstruction(inst as u64)),
                    },
                    0x6 => {
                        // ori
                        self.regs[rd] = self.regs[rs1] | imm;
                    }
                    0x7 => {
                        // andi
                        self.regs[rd] = self.regs[rs1] & imm;
                    }
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                }
            }
            0x17 => {
                // auipc
                let imm = inst & 0xfffff000;
                self.regs[rd] = self.pc.wrapping_sub(4).wrapping_add(imm);
            }
            0x23 => {
                // imm[11:5|4:0] = inst[31:25|11:7]
                let imm = (((inst & 0xfe00_0000) as i32 >> 20) as u32) | ((inst >> 7) & 0x1f);
                let addr = self.regs[rs1].wrapping_add(imm);
                match funct3 {
                    0x0 => self.store(addr, 8, self.regs[rs2])?,  // sb
                    0x1 => self.store(addr, 16, self.regs[rs2])?, // sh
                    0x2 => self.store(addr, 32, self.regs[rs2])?, // sw
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                }
            }
            0x2f => {
                // RV32A: "A" standard extension for atomic instructions. This
                // hart is alone on the bus, so every AMO is sequentially
                // consistent by construction; aq/rl are accepted and ignored.
                let funct5 = funct7 >> 2;
                let addr = self.regs[rs1];
                if funct3 != 0x2 {
                    return Err(Exception::IllegalInstruction(inst as u64));
                }
                match funct5 {
                    0x02 => {
                        // lr.w
                        if addr & 0x3 != 0 {
                            return Err(Exception::LoadAddrMisaligned(addr as u64));
                        }
                        self.regs[rd] = self.load(addr, 32)?;
                        self.reservation = Some(addr);
                    }
                    0x03 => {
                        // sc.w
                        if addr & 0x3 != 0 {
                            return Err(Exception::StoreAMOAddrMisaligned(addr as u64));
                        }
                        if self.reservation == Some(addr) {
                            self.store(addr, 32, self.regs[rs2])?;
                            self.regs[rd] = 0;
                        } else {
                            self.regs[rd] = 1;
                        }
                        self.reservation = None;
                    }
                    0x00 | 0x01 | 0x04 | 0x08 | 0x0c | 0x10 | 0x14 | 0x18 | 0x1c => {
                        if addr & 0x3 != 0 {
                            return Err(Exception::StoreAMOAddrMisaligned(addr as u64));
                        }
                        let t = self.load(addr, 32)?;
                        let src = self.regs[rs2];
                        let result = match funct5 {
                            0x00 => t.wrapping_add(src),                     // amoadd.w
                            0x01 => src,                                     // amoswap.w
                            0x04 => t ^ src,                                 // amoxor.w
                            0x08 => t | src,                                 // amoor.w
                            0x0c => t & src,                                 // amoand.w
                            0x10 => (t as i32).min(src as i32) as u32,       // amomin.w
                            0x14 => (t as i32).max(src as i32) as u32,       // amomax.w
                            0x18 => t.min(src),                              // amominu.w
                            0x1c => t.max(src),                              // amomaxu.w
                            _ => unreachable!(),
                        };
                        self.store(addr, 32, result)?;
                        self.regs[rd] = t;
                    }
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                }
            }
            0x33 => {
                // the shift amount is the low 5 bits of rs2
                let shamt = self.regs[rs2] & 0x1f;
                match (funct3, funct7) {
                    (0x0, 0x00) => {
                        // add
                        self.regs[rd] = self.regs[rs1].wrapping_add(self.regs[rs2]);
                    }
                    (0x0, 0x01) => {
                        // mul
                        self.regs[rd] = self.regs[rs1].wrapping_mul(self.regs[rs2]);
                    }
                    (0x0, 0x20) => {
                        // sub
                        self.regs[rd] = self.regs[rs1].wrapping_sub(self.regs[rs2]);
                    }
                    (0x1, 0x00) => {
                        // sll
                        self.regs[rd] = self.regs[rs1] << shamt;
                    }
                    (0x1, 0x01) => {
                        // mulh
                        let product =
                            self.regs[rs1] as i32 as i64 * (self.regs[rs2] as i32 as i64);
                        self.regs[rd] = (product >> 32) as u32;
                    }
                    (0x2, 0x00) => {
                        // slt
                        self.regs[rd] = ((self.regs[rs1] as i32) < (self.regs[rs2] as i32)) as u32;
                    }
                    (0x2, 0x01) => {
                        // mulhsu
                        let product = self.regs[rs1] as i32 as i64 * (self.regs[rs2] as i64);
                        self.regs[rd] = (product >> 32) as u32;
                    }
                    (0x3, 0x00) => {
                        // sltu
                        self.regs[rd] = (self.regs[rs1] < self.regs[rs2]) as u32;
                    }
                    (0x3, 0x01) => {
                        // mulhu
                        let product = self.regs[rs1] as u64 * self.regs[rs2] as u64;
                        self.regs[rd] = (product >> 32) as u32;
                    }
                    (0x4, 0x00) => {
                        // xor
                        self.regs[rd] = self.regs[rs1] ^ self.regs[rs2];
                    }
                    (0x4, 0x01) => {
                        // div
                        let dividend = self.regs[rs1] as i32;
                        let divisor = self.regs[rs2] as i32;
                        self.regs[rd] = if divisor == 0 {
                            u32::MAX
                        } else {
                            // wrapping_div folds MIN / -1 back to MIN
                            dividend.wrapping_div(divisor) as u32
                        };
                    }
                    (0x5, 0x00) => {
                        // srl
                        self.regs[rd] = self.regs[rs1] >> shamt;
                    }
                    (0x5, 0x01) => {
                        // divu
                        self.regs[rd] = if self.regs[rs2] == 0 {
                            u32::MAX
                        } else {
                            self.regs[rs1] / self.regs[rs2]
                        };
                    }
                    (0x5, 0x20) => {
                        // sra
                        self.regs[rd] = ((self.regs[rs1] as i32) >> shamt) as u32;
                    }
                    (0x6, 0x00) => {
                        // or
                        self.regs[rd] = self.regs[rs1] | self.regs[rs2];
                    }
                    (0x6, 0x01) => {
                        // rem
                        let dividend = self.regs[rs1] as i32;
                        let divisor = self.regs[rs2] as i32;
                        self.regs[rd] = if divisor == 0 {
                            dividend as u32
                        } else {
                            dividend.wrapping_rem(divisor) as u32
                        };
                    }
                    (0x7, 0x00) => {
                        // and
                        self.regs[rd] = self.regs[rs1] & self.regs[rs2];
                    }
                    (0x7, 0x01) => {
                        // remu
                        self.regs[rd] = if self.regs[rs2] == 0 {
                            self.regs[rs1]
                        } else {
                            self.regs[rs1] % self.regs[rs2]
                        };
                    }
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                }
            }
            0x37 => {
                // lui
                self.regs[rd] = inst & 0xfffff000;
            }
            0x63 => {
                // imm[12|10:5|4:1|11] = inst[31|30:25|11:8|7]
                let imm = (((inst & 0x8000_0000) as i32 >> 19) as u32)
                    | ((inst & 0x80) << 4)
                    | ((inst >> 20) & 0x7e0)
                    | ((inst >> 7) & 0x1e);
                let target = self.pc.wrapping_sub(4).wrapping_add(imm);

                let taken = match funct3 {
                    0x0 => self.regs[rs1] == self.regs[rs2],                     // beq
                    0x1 => self.regs[rs1] != self.regs[rs2],                     // bne
                    0x4 => (self.regs[rs1] as i32) < (self.regs[rs2] as i32),    // blt
                    0x5 => (self.regs[rs1] as i32) >= (self.regs[rs2] as i32),   // bge
                    0x6 => self.regs[rs1] < self.regs[rs2],                      // bltu
                    0x7 => self.regs[rs1] >= self.regs[rs2],                     // bgeu
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                };
                if taken {
                    self.jump_to(target)?;
                }
            }
            0x67 => {
                // jalr
                let t = self.pc;
                let imm = (inst as i32 >> 20) as u32;
                let target = self.regs[rs1].wrapping_add(imm) & !1;
                self.jump_to(target)?;
                self.regs[rd] = t;
            }
            0x6f => {
                // jal
                let link = self.pc;
                // imm[20|10:1|11|19:12] = inst[31|30:21|20|19:12]
                let imm = (((inst & 0x8000_0000) as i32 >> 11) as u32)
                    | (inst & 0xff000)
                    | ((inst >> 9) & 0x800)
                    | ((inst >> 20) & 0x7fe);
                let target = self.pc.wrapping_sub(4).wrapping_add(imm);
                self.jump_to(target)?;
                self.regs[rd] = link;
            }
            0x73 => {
                let csr_addr = ((inst >> 20) & 0xfff) as usize;
                match funct3 {
                    0x0 => {
                        match (rs2, funct7) {
                            (0x0, 0x0) => {
                                // ecall: epc points at the ecall itself
                                let pc = self.pc.wrapping_sub(4) as u64;
                                return match self.mode {
                                    USER => Err(Exception::EnvironmentCallFromUMode(pc)),
                                    SUPERVISOR => Err(Exception::EnvironmentCallFromSMode(pc)),
                                    MACHINE => Err(Exception::EnvironmentCallFromMMode(pc)),
                                    _ => unreachable!(),
                                };
                            }
                            (0x1, 0x0) => {
                                // ebreak
                                return Err(Exception::Breakpoint(self.pc.wrapping_sub(4) as u64));
                            }
                            (0x2, 0x8) => {
                                // sret: SIE <- SPIE, SPIE <- 1, pop the mode
                                // from SPP and clear it, return to sepc.
                                let mut sstatus = self.csr.load(SSTATUS);
                                self.mode = (sstatus & MASK_SPP) >> 8;
                                let spie = (sstatus & MASK_SPIE) >> 5;
                                sstatus = (sstatus & !MASK_SIE) | (spie << 1);
                                sstatus |= MASK_SPIE;
                                sstatus &= !MASK_SPP;
                                self.csr.store(SSTATUS, sstatus);
                                self.pc = self.csr.load(SEPC) & !0b11;
                            }
                            (0x2, 0x18) => {
                                // mret
                                let mut mstatus = self.csr.load(MSTATUS);
                                self.mode = (mstatus & MASK_MPP) >> 11;
                                let mpie = (mstatus & MASK_MPIE) >> 7;
                                mstatus = (mstatus & !MASK_MIE) | (mpie << 3);
                                mstatus |= MASK_MPIE;
                                mstatus &= !MASK_MPP;
                                // leaving M-mode clears MPRV
                                mstatus &= !MASK_MPRV;
                                self.csr.store(MSTATUS, mstatus);
                                self.pc = self.csr.load(MEPC) & !0b11;
                            }
                            (0x5, 0x8) => {
                                // wfi: the interrupt poll runs every step
                                // anyway, so waiting is free.
                            }
                            (_, 0x9) => {
                                // sfence.vma: no TLB to flush
                            }
                            _ => return Err(Exception::IllegalInstruction(inst as u64)),
                        }
                    }
                    0x1 => {
                        // csrrw
                        let t = self.csr.load(csr_addr);
                        self.csr.store(csr_addr, self.regs[rs1]);
                        self.regs[rd] = t;
                        self.update_paging(csr_addr);
                    }
                    0x2 => {
                        // csrrs
                        let t = self.csr.load(csr_addr);
                        self.csr.store(csr_addr, t | self.regs[rs1]);
                        self.regs[rd] = t;
                        self.update_paging(csr_addr);
                    }
                    0x3 => {
                        // csrrc
                        let t = self.csr.load(csr_addr);
                        self.csr.store(csr_addr, t & !self.regs[rs1]);
                        self.regs[rd] = t;
                        self.update_paging(csr_addr);
                    }
                    0x5 => {
                        // csrrwi
                        let zimm = rs1 as u32;
                        self.regs[rd] = self.csr.load(csr_addr);
                        self.csr.store(csr_addr, zimm);
                        self.update_paging(csr_addr);
                    }
                    0x6 => {
                        // csrrsi
                        let zimm = rs1 as u32;
                        let t = self.csr.load(csr_addr);
                        self.csr.store(csr_addr, t | zimm);
                        self.regs[rd] = t;
                        self.update_paging(csr_addr);
                    }
                    0x7 => {
                        // csrrci
                        let zimm = rs1 as u32;
                        let t = self.csr.load(csr_addr);
                        self.csr.store(csr_addr, t & !zimm);
                        self.regs[rd] = t;
                        self.update_paging(csr_addr);
                    }
                    _ => return Err(Exception::IllegalInstruction(inst as u64)),
                }
            }
            _ => return Err(Exception::IllegalInstruction(inst as u64)),
        }

        self.regs[0] = 0;
        Ok(())
    }
}
