/*++

Licensed under the Apache-2.0 license.

File Name:

    flash_ctrl.rs

Abstract:

    File contains the embedded flash controller peripheral emulation.

    Firmware starts an operation through CONTROL; the operation is expanded
    into work items which are executed one per register read, moving words
    between the FIFOs and the data / info partitions.

--*/

use crate::flash_fifo::WordFifo;
use crate::flash_mp::{FlashAccess, MpRegions};
use crate::flash_op::{decode_operation, FlashPartition, FlashWork};
use crate::flash_regs::{
    CfgRegwen, Control, CtrlRegwen, FifoLvl, FifoRst, FlashReg, InfoPageCfg, InfoPageReg, Intr,
    MpBankCfg, OpStatus, PhyStatus, Status, CONTROL_MASK, FIFO_LVL_MASK, FIFO_LVL_RESET,
    FIFO_RST_MASK, INFO_PAGES_PER_BANK, INFO_PAGE_CFG_MASK, MP_BANK_CFG_MASK, OP_STATUS_MASK,
    PHY_STATUS_RESET,
};
use crate::flash_storage::{FlashStorage, StorageError};
use caliptra_emu_bus::{Bus, BusError, Ram, ReadOnlyRegister, ReadWriteRegister};
use caliptra_emu_cpu::Irq;
use caliptra_emu_types::{RvAddr, RvData, RvSize};
use emulator_consts::{
    FLASH_BYTES_PER_BANK, FLASH_BYTES_PER_PAGE, FLASH_CTRL_SIZE, FLASH_MEM_ORG,
    FLASH_NUM_BANKS, FLASH_SIZE,
};
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

/// Progress of the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOpState {
    Init,
    Waiting,
    Running,
    Done,
}

#[derive(Debug, Error)]
pub enum FlashCtrlError {
    #[error("{partition:?} partition storage holds {actual} bytes, flash needs {expected}")]
    StorageTooSmall {
        partition: FlashPartition,
        actual: usize,
        expected: usize,
    },
}

/// Reason a work item did not complete.
#[derive(Debug, Error)]
enum WorkFault {
    #[error("{0:?} not permitted at 0x{1:08x}")]
    Denied(FlashAccess, u32),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct FlashCtrlArgs {
    /// Bus address of the first byte of the data partition.
    pub flash_base: u32,
    pub data: Rc<RefCell<dyn FlashStorage>>,
    pub info: Rc<RefCell<dyn FlashStorage>>,
    /// Asserted while any enabled interrupt is pending.
    pub irq: Option<Irq>,
}

impl Default for FlashCtrlArgs {
    fn default() -> Self {
        Self {
            flash_base: FLASH_MEM_ORG,
            data: Rc::new(RefCell::new(Ram::new(vec![0xff; FLASH_SIZE]))),
            info: Rc::new(RefCell::new(Ram::new(vec![0xff; FLASH_SIZE]))),
            irq: None,
        }
    }
}

pub struct FlashCtrl {
    intr_state: ReadWriteRegister<u32, Intr::Register>,
    intr_enable: ReadWriteRegister<u32, Intr::Register>,
    ctrl_regwen: ReadOnlyRegister<u32, CtrlRegwen::Register>,
    control: ReadWriteRegister<u32, Control::Register>,
    addr: ReadWriteRegister<u32>,
    mp: MpRegions,
    info_regwen:
        [[ReadWriteRegister<u32, CfgRegwen::Register>; INFO_PAGES_PER_BANK]; FLASH_NUM_BANKS],
    info_page_cfg:
        [[ReadWriteRegister<u32, InfoPageCfg::Register>; INFO_PAGES_PER_BANK]; FLASH_NUM_BANKS],
    bank_cfg_regwen: ReadWriteRegister<u32, CfgRegwen::Register>,
    mp_bank_cfg: ReadWriteRegister<u32, MpBankCfg::Register>,
    op_status: ReadWriteRegister<u32, OpStatus::Register>,
    status: ReadOnlyRegister<u32, Status::Register>,
    phy_status: ReadOnlyRegister<u32, PhyStatus::Register>,
    scratch: ReadWriteRegister<u32>,
    fifo_lvl: ReadWriteRegister<u32, FifoLvl::Register>,
    fifo_rst: ReadWriteRegister<u32, FifoRst::Register>,
    prog_fifo: WordFifo,
    rd_fifo: WordFifo,
    work: VecDeque<FlashWork>,
    state: FlashOpState,
    flash_base: u32,
    data: Rc<RefCell<dyn FlashStorage>>,
    info: Rc<RefCell<dyn FlashStorage>>,
    irq: Option<Irq>,
    /// Level last driven on `irq`.
    irq_level: bool,
}

impl FlashCtrl {
    /// Interrupts that INTR_TEST can raise.
    const INTR_TEST_MASK: u32 = 0x1f;
    const INTR_MASK: u32 = 0x3f;

    pub fn new(args: FlashCtrlArgs) -> Result<Self, FlashCtrlError> {
        for (partition, storage) in [
            (FlashPartition::Data, &args.data),
            (FlashPartition::Info, &args.info),
        ] {
            let actual = storage.borrow().len();
            if actual < FLASH_SIZE {
                return Err(FlashCtrlError::StorageTooSmall {
                    partition,
                    actual,
                    expected: FLASH_SIZE,
                });
            }
        }

        let mut flash_ctrl = Self {
            intr_state: ReadWriteRegister::new(0),
            intr_enable: ReadWriteRegister::new(0),
            ctrl_regwen: ReadOnlyRegister::new(CtrlRegwen::EN::SET.value),
            control: ReadWriteRegister::new(0),
            addr: ReadWriteRegister::new(0),
            mp: MpRegions::new(args.flash_base),
            info_regwen: core::array::from_fn(|_| {
                core::array::from_fn(|_| ReadWriteRegister::new(CfgRegwen::EN::SET.value))
            }),
            info_page_cfg: core::array::from_fn(|_| {
                core::array::from_fn(|_| ReadWriteRegister::new(0))
            }),
            bank_cfg_regwen: ReadWriteRegister::new(CfgRegwen::EN::SET.value),
            mp_bank_cfg: ReadWriteRegister::new(0),
            op_status: ReadWriteRegister::new(0),
            status: ReadOnlyRegister::new(0),
            phy_status: ReadOnlyRegister::new(PHY_STATUS_RESET),
            scratch: ReadWriteRegister::new(0),
            fifo_lvl: ReadWriteRegister::new(FIFO_LVL_RESET),
            fifo_rst: ReadWriteRegister::new(0),
            prog_fifo: WordFifo::new("program"),
            rd_fifo: WordFifo::new("read"),
            work: VecDeque::new(),
            state: FlashOpState::Init,
            flash_base: args.flash_base,
            data: args.data,
            info: args.info,
            irq: args.irq,
            irq_level: false,
        };
        flash_ctrl.reset();
        Ok(flash_ctrl)
    }

    /// Memory map size.
    pub fn mmap_size(&self) -> RvAddr {
        FLASH_CTRL_SIZE
    }

    pub fn state(&self) -> FlashOpState {
        self.state
    }

    /// Number of work items still queued.
    pub fn pending_work(&self) -> usize {
        self.work.len()
    }

    /// Whether the interrupt output is currently asserted.
    pub fn irq_level(&self) -> bool {
        self.irq_level
    }

    /// Returns every register to its reset value and drops queued work.
    /// Partition contents are kept.
    pub fn reset(&mut self) {
        self.state = FlashOpState::Init;
        self.intr_state.reg.set(0);
        self.intr_enable.reg.set(0);
        self.control.reg.set(0);
        self.addr.reg.set(0);
        self.mp.reset();
        for (regwens, page_cfgs) in self.info_regwen.iter().zip(self.info_page_cfg.iter()) {
            for regwen in regwens.iter() {
                regwen.reg.write(CfgRegwen::EN::SET);
            }
            for page_cfg in page_cfgs.iter() {
                page_cfg.reg.set(0);
            }
        }
        self.bank_cfg_regwen.reg.write(CfgRegwen::EN::SET);
        self.mp_bank_cfg.reg.set(0);
        self.op_status.reg.set(0);
        self.scratch.reg.set(0);
        self.fifo_lvl.reg.set(FIFO_LVL_RESET);
        self.fifo_rst.reg.set(0);
        self.prog_fifo.reset();
        self.rd_fifo.reset();
        self.work.clear();
        self.state = FlashOpState::Waiting;
        self.update_irq();
    }

    fn update_irq(&mut self) {
        let pending = self.intr_state.reg.get() & self.intr_enable.reg.get() != 0;
        self.irq_level = pending;
        if let Some(irq) = self.irq.as_mut() {
            irq.set_level(pending);
        }
    }

    fn raise_error(&mut self) {
        self.op_status.reg.modify(OpStatus::ERR::SET);
        self.intr_state.reg.modify(Intr::OP_ERROR::SET);
    }

    fn raise_done(&mut self) {
        self.op_status.reg.modify(OpStatus::DONE::SET);
        self.intr_state.reg.modify(Intr::OP_DONE::SET);
    }

    /// Byte offset of `address` inside a partition. Addresses below the
    /// flash base wrap to offsets no storage holds.
    fn partition_offset(&self, address: u32) -> usize {
        address.wrapping_sub(self.flash_base) as usize
    }

    fn storage(&self, partition: FlashPartition) -> &Rc<RefCell<dyn FlashStorage>> {
        match partition {
            FlashPartition::Data => &self.data,
            FlashPartition::Info => &self.info,
        }
    }

    /// Data partition accesses go through the protection regions; the info
    /// partition and bank erases are not checked.
    fn check_access(
        &self,
        partition: FlashPartition,
        access: FlashAccess,
        address: u32,
    ) -> Result<(), WorkFault> {
        if partition == FlashPartition::Data && !self.mp.is_allowed(access, address) {
            return Err(WorkFault::Denied(access, address));
        }
        Ok(())
    }

    fn execute(&mut self, work: FlashWork) -> Result<(), WorkFault> {
        match work {
            FlashWork::Read { partition, address } => {
                self.check_access(partition, FlashAccess::Read, address)?;
                let offset = self.partition_offset(address);
                let word = self.storage(partition).borrow().read_word(offset)?;
                self.rd_fifo.push(word);
            }
            FlashWork::Program { partition, address } => {
                // The word leaves the FIFO even when the write is rejected.
                let word = self.prog_fifo.pop();
                self.check_access(partition, FlashAccess::Program, address)?;
                let offset = self.partition_offset(address);
                self.storage(partition)
                    .borrow_mut()
                    .write_word(offset, word)?;
            }
            FlashWork::PageErase { partition, address } => {
                self.check_access(partition, FlashAccess::Erase, address)?;
                let offset = self.partition_offset(address);
                let page_start = offset - offset % FLASH_BYTES_PER_PAGE;
                self.storage(partition)
                    .borrow_mut()
                    .fill(page_start, FLASH_BYTES_PER_PAGE, 0xff)?;
            }
            FlashWork::BankErase { bank } => {
                self.data.borrow_mut().fill(
                    bank * FLASH_BYTES_PER_BANK,
                    FLASH_BYTES_PER_BANK,
                    0xff,
                )?;
            }
        }
        Ok(())
    }

    /// Advances the current operation by one step: executes the oldest work
    /// item, or moves an operation with no work left towards completion.
    pub fn tick(&mut self) {
        if let Some(work) = self.work.pop_front() {
            debug!("Flash executing {:?}", work);
            if let Err(fault) = self.execute(work) {
                warn!("Flash {:?} failed: {}", work, fault);
                self.raise_error();
            }
            return;
        }

        match self.state {
            FlashOpState::Running => {
                self.state = FlashOpState::Done;
                self.control.reg.modify(Control::START::CLEAR);
            }
            FlashOpState::Done => {
                self.raise_done();
                self.control.reg.modify(Control::START::CLEAR);
            }
            FlashOpState::Init | FlashOpState::Waiting => {}
        }
    }

    fn start_operation(&mut self) {
        let added = decode_operation(
            self.control.reg.get(),
            self.addr.reg.get(),
            self.mp_bank_cfg.reg.get(),
            &mut self.work,
        );
        if self.state == FlashOpState::Waiting {
            self.state = FlashOpState::Running;
        } else {
            debug!(
                "Flash operation started while {:?}, {} work items appended",
                self.state, added
            );
        }
    }

    fn read_status(&mut self) -> u32 {
        self.status.reg.write(
            Status::RD_FULL.val(self.rd_fifo.is_full().into())
                + Status::RD_EMPTY.val(self.rd_fifo.is_empty().into())
                + Status::PROG_FULL.val(self.prog_fifo.is_full().into())
                + Status::PROG_EMPTY.val(self.prog_fifo.is_empty().into())
                + Status::INIT_WIP::CLEAR
                + Status::ERROR_ADDR.val(0),
        );
        self.status.reg.get()
    }

    fn read_register(&mut self, reg: FlashReg) -> u32 {
        match reg {
            FlashReg::IntrState => self.intr_state.reg.get(),
            FlashReg::IntrEnable => self.intr_enable.reg.get(),
            FlashReg::IntrTest => 0,
            FlashReg::CtrlRegwen => self.ctrl_regwen.reg.get(),
            FlashReg::Control => self.control.reg.get(),
            FlashReg::Addr => self.addr.reg.get(),
            FlashReg::RegionCfgRegwen(index) => self.mp.read_regwen(index),
            FlashReg::MpRegionCfg(index) => self.mp.read_region(index),
            FlashReg::InfoPage(bank, index) => {
                let reg = InfoPageReg::from_index(index);
                match reg {
                    InfoPageReg::Regwen { .. } => self.info_regwen[bank][reg.slot()].reg.get(),
                    InfoPageReg::PageCfg { .. } => self.info_page_cfg[bank][reg.slot()].reg.get(),
                }
            }
            FlashReg::DefaultRegion => self.mp.read_default(),
            FlashReg::BankCfgRegwen => self.bank_cfg_regwen.reg.get(),
            FlashReg::MpBankCfg => self.mp_bank_cfg.reg.get(),
            FlashReg::OpStatus => self.op_status.reg.get(),
            FlashReg::Status => self.read_status(),
            FlashReg::PhyStatus => self.phy_status.reg.get(),
            FlashReg::Scratch => self.scratch.reg.get(),
            FlashReg::FifoLvl => self.fifo_lvl.reg.get(),
            FlashReg::FifoRst => self.fifo_rst.reg.get(),
            FlashReg::ProgFifo => 0,
            FlashReg::RdFifo => self.rd_fifo.pop(),
        }
    }

    fn write_info_page(&mut self, bank: usize, index: usize, val: u32) {
        let reg = InfoPageReg::from_index(index);
        let regwen = &self.info_regwen[bank][reg.slot()].reg;
        match reg {
            InfoPageReg::Regwen { .. } => {
                regwen.set(regwen.get() & val & CfgRegwen::EN::SET.value);
            }
            InfoPageReg::PageCfg { info_type, page } => {
                if !regwen.is_set(CfgRegwen::EN) {
                    warn!(
                        "BANK{}_INFO{}_PAGE_CFG_{} is locked, ignoring write 0x{:08x}",
                        bank, info_type, page, val
                    );
                    return;
                }
                self.info_page_cfg[bank][reg.slot()]
                    .reg
                    .set(val & INFO_PAGE_CFG_MASK);
            }
        }
    }

    fn write_register(&mut self, reg: FlashReg, val: u32) {
        match reg {
            FlashReg::IntrState => {
                let state = self.intr_state.reg.get();
                self.intr_state.reg.set(state & !(val & Self::INTR_MASK));
            }
            FlashReg::IntrEnable => self.intr_enable.reg.set(val & Self::INTR_MASK),
            FlashReg::IntrTest => {
                let state = self.intr_state.reg.get();
                self.intr_state
                    .reg
                    .set(state | (val & Self::INTR_TEST_MASK));
            }
            FlashReg::Control => {
                let was_started = self.control.reg.is_set(Control::START);
                self.control.reg.set(val & CONTROL_MASK);
                if !was_started && self.control.reg.is_set(Control::START) {
                    self.start_operation();
                }
            }
            FlashReg::Addr => self.addr.reg.set(val),
            FlashReg::RegionCfgRegwen(index) => self.mp.write_regwen(index, val),
            FlashReg::MpRegionCfg(index) => self.mp.write_region(index, val),
            FlashReg::InfoPage(bank, index) => self.write_info_page(bank, index, val),
            FlashReg::DefaultRegion => self.mp.write_default(val),
            FlashReg::BankCfgRegwen => {
                let regwen = self.bank_cfg_regwen.reg.get();
                self.bank_cfg_regwen
                    .reg
                    .set(regwen & val & CfgRegwen::EN::SET.value);
            }
            FlashReg::MpBankCfg => {
                if !self.bank_cfg_regwen.reg.is_set(CfgRegwen::EN) {
                    warn!("MP_BANK_CFG is locked, ignoring write 0x{:08x}", val);
                    return;
                }
                self.mp_bank_cfg.reg.set(val & MP_BANK_CFG_MASK);
            }
            FlashReg::OpStatus => {
                self.op_status.reg.set(val & OP_STATUS_MASK);
                if self.state == FlashOpState::Done && !self.op_status.reg.is_set(OpStatus::DONE)
                {
                    self.state = FlashOpState::Waiting;
                    // work started while Done still needs its completion report
                    if !self.work.is_empty() {
                        self.state = FlashOpState::Running;
                    }
                }
            }
            FlashReg::Scratch => self.scratch.reg.set(val),
            FlashReg::FifoLvl => self.fifo_lvl.reg.set(val & FIFO_LVL_MASK),
            FlashReg::FifoRst => {
                self.fifo_rst.reg.set(val & FIFO_RST_MASK);
                if self.fifo_rst.reg.is_set(FifoRst::EN) {
                    self.prog_fifo.clear();
                    self.rd_fifo.clear();
                }
            }
            FlashReg::ProgFifo => self.prog_fifo.push(val),
            FlashReg::CtrlRegwen | FlashReg::Status | FlashReg::PhyStatus | FlashReg::RdFifo => {
                debug!("Ignoring write 0x{:08x} to read-only {:?}", val, reg);
            }
        }
    }
}

impl Bus for FlashCtrl {
    /// Read data of specified size from given address
    ///
    /// Every read first advances the current operation by one step.
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` - access is not word sized or hits no register
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            Err(BusError::LoadAccessFault)?
        }
        let reg = FlashReg::decode(addr).ok_or(BusError::LoadAccessFault)?;
        self.tick();
        let val = self.read_register(reg);
        self.update_irq();
        Ok(val)
    }

    /// Write data of specified size to given address
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` - access is not word sized or hits no register
    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            Err(BusError::StoreAccessFault)?
        }
        let reg = FlashReg::decode(addr).ok_or(BusError::StoreAccessFault)?;
        self.write_register(reg, val);
        self.update_irq();
        Ok(())
    }

    fn warm_reset(&mut self) {
        self.reset();
    }

    fn update_reset(&mut self) {
        self.reset();
    }
}
