// Licensed under the Apache-2.0 license
#![allow(dead_code)]

use caliptra_emu_bus::{Bus, BusError};
use caliptra_emu_types::{RvAddr, RvSize};
use emulator_consts::FLASH_CTRL_ORG;
use emulator_periph::flash_regs::*;
use emulator_periph::{FlashCtrl, FlashCtrlArgs};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tock_registers::fields::FieldValue;

/// Upper bound on OP_STATUS polls before an operation is declared stuck.
const MAX_POLLS: usize = 8192;

#[derive(Debug, PartialEq, Eq)]
pub enum DriverError {
    Bus(BusError),
    OpError,
    Timeout,
}

impl From<BusError> for DriverError {
    fn from(err: BusError) -> Self {
        DriverError::Bus(err)
    }
}

/// Drives the controller the way firmware does: register accesses only.
pub struct FlashDriver {
    pub ctrl: FlashCtrl,
}

impl FlashDriver {
    pub fn new(args: FlashCtrlArgs) -> Self {
        let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
        Self {
            ctrl: FlashCtrl::new(args).unwrap(),
        }
    }

    /// Offset of `addr` inside the controller window at `FLASH_CTRL_ORG`.
    fn window_offset(&self, addr: RvAddr) -> Option<RvAddr> {
        addr.checked_sub(FLASH_CTRL_ORG)
            .filter(|offset| *offset < self.ctrl.mmap_size())
    }

    /// Word read of an absolute bus address.
    pub fn bus_read(&mut self, addr: RvAddr) -> Result<u32, DriverError> {
        let offset = self
            .window_offset(addr)
            .ok_or(BusError::LoadAccessFault)?;
        Ok(self.ctrl.read(RvSize::Word, offset)?)
    }

    /// Word write of an absolute bus address.
    pub fn bus_write(&mut self, addr: RvAddr, val: u32) -> Result<(), DriverError> {
        let offset = self
            .window_offset(addr)
            .ok_or(BusError::StoreAccessFault)?;
        Ok(self.ctrl.write(RvSize::Word, offset, val)?)
    }

    pub fn read_reg(&mut self, offset: RvAddr) -> Result<u32, DriverError> {
        self.bus_read(FLASH_CTRL_ORG + offset)
    }

    pub fn write_reg(&mut self, offset: RvAddr, val: u32) -> Result<(), DriverError> {
        self.bus_write(FLASH_CTRL_ORG + offset, val)
    }

    pub fn allow_all(&mut self) -> Result<(), DriverError> {
        self.write_reg(
            DEFAULT_REGION_OFFSET,
            (DefaultRegion::RD_EN::SET + DefaultRegion::PROG_EN::SET + DefaultRegion::ERASE_EN::SET)
                .value,
        )
    }

    pub fn set_region(
        &mut self,
        index: u32,
        base_page: u32,
        pages: u32,
        perms: FieldValue<u32, MpRegionCfg::Register>,
    ) -> Result<(), DriverError> {
        self.write_reg(
            MP_REGION_CFG_OFFSET + 4 * index,
            (MpRegionCfg::EN::SET
                + MpRegionCfg::BASE.val(base_page)
                + MpRegionCfg::SIZE.val(pages)
                + perms)
                .value,
        )
    }

    fn start(
        &mut self,
        addr: u32,
        op: FieldValue<u32, Control::Register>,
    ) -> Result<(), DriverError> {
        self.write_reg(ADDR_OFFSET, addr)?;
        self.write_reg(CONTROL_OFFSET, (Control::START::SET + op).value)
    }

    /// Polls OP_STATUS until the operation is done, then acknowledges it.
    pub fn wait_done(&mut self) -> Result<(), DriverError> {
        for _ in 0..MAX_POLLS {
            let status = self.read_reg(OP_STATUS_OFFSET)?;
            if status & OpStatus::DONE::SET.value == 0 {
                continue;
            }
            self.write_reg(OP_STATUS_OFFSET, 0)?;
            self.write_reg(
                INTR_STATE_OFFSET,
                (Intr::OP_DONE::SET + Intr::OP_ERROR::SET).value,
            )?;
            if status & OpStatus::ERR::SET.value != 0 {
                return Err(DriverError::OpError);
            }
            return Ok(());
        }
        Err(DriverError::Timeout)
    }

    pub fn program(
        &mut self,
        addr: u32,
        words: &[u32],
        partition: FieldValue<u32, Control::Register>,
    ) -> Result<(), DriverError> {
        for word in words {
            self.write_reg(PROG_FIFO_OFFSET, *word)?;
        }
        self.start(
            addr,
            Control::OP::PROG + partition + Control::NUM.val(words.len() as u32 - 1),
        )?;
        self.wait_done()
    }

    /// Reads `count` words, collecting them as the operation produces them.
    pub fn read(
        &mut self,
        addr: u32,
        count: usize,
        partition: FieldValue<u32, Control::Register>,
    ) -> Result<Vec<u32>, DriverError> {
        self.start(
            addr,
            Control::OP::READ + partition + Control::NUM.val(count as u32 - 1),
        )?;
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(self.read_reg(RD_FIFO_OFFSET)?);
        }
        self.wait_done()?;
        Ok(words)
    }

    pub fn erase_page(
        &mut self,
        addr: u32,
        partition: FieldValue<u32, Control::Register>,
    ) -> Result<(), DriverError> {
        self.start(
            addr,
            Control::OP::ERASE + Control::ERASE_SEL::PAGE + partition,
        )?;
        self.wait_done()
    }

    pub fn erase_banks(&mut self, bank_cfg: u32) -> Result<(), DriverError> {
        self.write_reg(MP_BANK_CFG_OFFSET, bank_cfg)?;
        self.start(0, Control::OP::ERASE + Control::ERASE_SEL::BANK)?;
        self.wait_done()
    }
}
