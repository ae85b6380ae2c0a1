/*++

Licensed under the Apache-2.0 license.

File Name:

    flash_regs.rs

Abstract:

    Register offsets and field layouts of the embedded flash controller.

--*/

use caliptra_emu_types::RvAddr;
use emulator_consts::{FLASH_NUM_INFO_PAGES, FLASH_NUM_INFO_TYPES, FLASH_NUM_REGIONS};
use tock_registers::register_bitfields;

pub const INTR_STATE_OFFSET: RvAddr = 0x00;
pub const INTR_ENABLE_OFFSET: RvAddr = 0x04;
pub const INTR_TEST_OFFSET: RvAddr = 0x08;
pub const CTRL_REGWEN_OFFSET: RvAddr = 0x0c;
pub const CONTROL_OFFSET: RvAddr = 0x10;
pub const ADDR_OFFSET: RvAddr = 0x14;
pub const REGION_CFG_REGWEN_OFFSET: RvAddr = 0x18;
pub const MP_REGION_CFG_OFFSET: RvAddr = 0x38;
/// Start of the per-bank info page configuration block.
pub const INFO_PAGE_CFG_OFFSET: RvAddr = 0x58;
pub const DEFAULT_REGION_OFFSET: RvAddr = 0xd8;
pub const BANK_CFG_REGWEN_OFFSET: RvAddr = 0xdc;
pub const MP_BANK_CFG_OFFSET: RvAddr = 0xe0;
pub const OP_STATUS_OFFSET: RvAddr = 0xe4;
pub const STATUS_OFFSET: RvAddr = 0xe8;
pub const PHY_STATUS_OFFSET: RvAddr = 0xec;
pub const SCRATCH_OFFSET: RvAddr = 0xf0;
pub const FIFO_LVL_OFFSET: RvAddr = 0xf4;
pub const FIFO_RST_OFFSET: RvAddr = 0xf8;
pub const PROG_FIFO_OFFSET: RvAddr = 0xfc;
pub const RD_FIFO_OFFSET: RvAddr = 0x100;

/// Number of info page registers per bank (REGWEN and PAGE_CFG for every
/// info type and page).
pub const INFO_PAGE_REGS_PER_BANK: usize = FLASH_NUM_INFO_TYPES * FLASH_NUM_INFO_PAGES * 2;

/// Number of info pages per bank with their own REGWEN and PAGE_CFG.
pub const INFO_PAGES_PER_BANK: usize = FLASH_NUM_INFO_TYPES * FLASH_NUM_INFO_PAGES;

pub const PHY_STATUS_RESET: u32 = 0x6;
pub const FIFO_LVL_RESET: u32 = 0x0f0f;

// Writable bits; reserved bits read as zero.
pub const CONTROL_MASK: u32 = 0x0fff_07f1;
pub const MP_REGION_CFG_MASK: u32 = 0x3ff1_ff1f;
pub const INFO_PAGE_CFG_MASK: u32 = 0x1f;
pub const DEFAULT_REGION_MASK: u32 = 0xf;
pub const MP_BANK_CFG_MASK: u32 = 0x3;
pub const OP_STATUS_MASK: u32 = 0x3;
pub const FIFO_LVL_MASK: u32 = 0x1f1f;
pub const FIFO_RST_MASK: u32 = 0x1;

register_bitfields! [
    u32,

    /// Interrupt State, Enable and Test share one layout
    Intr [
        PROG_EMPTY OFFSET(0) NUMBITS(1) [],
        PROG_LVL OFFSET(1) NUMBITS(1) [],
        RD_FULL OFFSET(2) NUMBITS(1) [],
        RD_LVL OFFSET(3) NUMBITS(1) [],
        OP_DONE OFFSET(4) NUMBITS(1) [],
        OP_ERROR OFFSET(5) NUMBITS(1) [],
    ],

    /// Control register write enable
    CtrlRegwen [
        EN OFFSET(0) NUMBITS(1) [],
    ],

    /// Operation control
    Control [
        START OFFSET(0) NUMBITS(1) [],
        OP OFFSET(4) NUMBITS(2) [
            READ = 0,
            PROG = 1,
            ERASE = 2,
        ],
        PROG_SEL OFFSET(6) NUMBITS(1) [
            NORMAL = 0,
            REPAIR = 1,
        ],
        ERASE_SEL OFFSET(7) NUMBITS(1) [
            PAGE = 0,
            BANK = 1,
        ],
        PARTITION_SEL OFFSET(8) NUMBITS(1) [
            DATA = 0,
            INFO = 1,
        ],
        INFO_SEL OFFSET(9) NUMBITS(2) [],
        NUM OFFSET(16) NUMBITS(12) [],
    ],

    /// Write enable shared by the region, bank and info page configurations
    CfgRegwen [
        EN OFFSET(0) NUMBITS(1) [],
    ],

    /// Memory protection region configuration
    MpRegionCfg [
        EN OFFSET(0) NUMBITS(1) [],
        RD_EN OFFSET(1) NUMBITS(1) [],
        PROG_EN OFFSET(2) NUMBITS(1) [],
        ERASE_EN OFFSET(3) NUMBITS(1) [],
        SCRAMBLE_EN OFFSET(4) NUMBITS(1) [],
        BASE OFFSET(8) NUMBITS(9) [],
        SIZE OFFSET(20) NUMBITS(10) [],
    ],

    /// Info partition page configuration
    InfoPageCfg [
        EN OFFSET(0) NUMBITS(1) [],
        RD_EN OFFSET(1) NUMBITS(1) [],
        PROG_EN OFFSET(2) NUMBITS(1) [],
        ERASE_EN OFFSET(3) NUMBITS(1) [],
        SCRAMBLE_EN OFFSET(4) NUMBITS(1) [],
    ],

    /// Default region properties
    DefaultRegion [
        RD_EN OFFSET(0) NUMBITS(1) [],
        PROG_EN OFFSET(1) NUMBITS(1) [],
        ERASE_EN OFFSET(2) NUMBITS(1) [],
        SCRAMBLE_EN OFFSET(3) NUMBITS(1) [],
    ],

    /// Bank erase enables
    MpBankCfg [
        ERASE_EN_0 OFFSET(0) NUMBITS(1) [],
        ERASE_EN_1 OFFSET(1) NUMBITS(1) [],
    ],

    /// Operation status
    OpStatus [
        DONE OFFSET(0) NUMBITS(1) [],
        ERR OFFSET(1) NUMBITS(1) [],
    ],

    /// Controller status
    Status [
        RD_FULL OFFSET(0) NUMBITS(1) [],
        RD_EMPTY OFFSET(1) NUMBITS(1) [],
        PROG_FULL OFFSET(2) NUMBITS(1) [],
        PROG_EMPTY OFFSET(3) NUMBITS(1) [],
        INIT_WIP OFFSET(4) NUMBITS(1) [],
        ERROR_ADDR OFFSET(8) NUMBITS(9) [],
    ],

    /// Flash phy status
    PhyStatus [
        INIT_WIP OFFSET(0) NUMBITS(1) [],
        PROG_NORMAL_AVAIL OFFSET(1) NUMBITS(1) [],
        PROG_REPAIR_AVAIL OFFSET(2) NUMBITS(1) [],
    ],

    /// FIFO levels
    FifoLvl [
        PROG OFFSET(0) NUMBITS(5) [],
        RD OFFSET(8) NUMBITS(5) [],
    ],

    /// FIFO reset
    FifoRst [
        EN OFFSET(0) NUMBITS(1) [],
    ],
];

/// Registers addressable through the controller window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashReg {
    IntrState,
    IntrEnable,
    IntrTest,
    CtrlRegwen,
    Control,
    Addr,
    RegionCfgRegwen(usize),
    MpRegionCfg(usize),
    /// Bank, flat index into that bank's info page registers.
    InfoPage(usize, usize),
    DefaultRegion,
    BankCfgRegwen,
    MpBankCfg,
    OpStatus,
    Status,
    PhyStatus,
    Scratch,
    FifoLvl,
    FifoRst,
    ProgFifo,
    RdFifo,
}

impl FlashReg {
    /// Maps a word aligned offset inside the window to its register.
    pub fn decode(offset: RvAddr) -> Option<Self> {
        if offset % 4 != 0 {
            return None;
        }
        let index = |base: RvAddr| ((offset - base) / 4) as usize;
        let regions_end = REGION_CFG_REGWEN_OFFSET + 4 * FLASH_NUM_REGIONS as RvAddr;
        let mp_end = MP_REGION_CFG_OFFSET + 4 * FLASH_NUM_REGIONS as RvAddr;
        let info_end = INFO_PAGE_CFG_OFFSET + 4 * (2 * INFO_PAGE_REGS_PER_BANK) as RvAddr;

        let reg = match offset {
            INTR_STATE_OFFSET => FlashReg::IntrState,
            INTR_ENABLE_OFFSET => FlashReg::IntrEnable,
            INTR_TEST_OFFSET => FlashReg::IntrTest,
            CTRL_REGWEN_OFFSET => FlashReg::CtrlRegwen,
            CONTROL_OFFSET => FlashReg::Control,
            ADDR_OFFSET => FlashReg::Addr,
            o if (REGION_CFG_REGWEN_OFFSET..regions_end).contains(&o) => {
                FlashReg::RegionCfgRegwen(index(REGION_CFG_REGWEN_OFFSET))
            }
            o if (MP_REGION_CFG_OFFSET..mp_end).contains(&o) => {
                FlashReg::MpRegionCfg(index(MP_REGION_CFG_OFFSET))
            }
            o if (INFO_PAGE_CFG_OFFSET..info_end).contains(&o) => {
                let i = index(INFO_PAGE_CFG_OFFSET);
                FlashReg::InfoPage(i / INFO_PAGE_REGS_PER_BANK, i % INFO_PAGE_REGS_PER_BANK)
            }
            DEFAULT_REGION_OFFSET => FlashReg::DefaultRegion,
            BANK_CFG_REGWEN_OFFSET => FlashReg::BankCfgRegwen,
            MP_BANK_CFG_OFFSET => FlashReg::MpBankCfg,
            OP_STATUS_OFFSET => FlashReg::OpStatus,
            STATUS_OFFSET => FlashReg::Status,
            PHY_STATUS_OFFSET => FlashReg::PhyStatus,
            SCRATCH_OFFSET => FlashReg::Scratch,
            FIFO_LVL_OFFSET => FlashReg::FifoLvl,
            FIFO_RST_OFFSET => FlashReg::FifoRst,
            PROG_FIFO_OFFSET => FlashReg::ProgFifo,
            RD_FIFO_OFFSET => FlashReg::RdFifo,
            _ => return None,
        };
        Some(reg)
    }
}

/// Position of an info page register inside a bank's block of registers.
///
/// Each info type owns `FLASH_NUM_INFO_PAGES` REGWEN registers followed by the
/// same number of PAGE_CFG registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoPageReg {
    Regwen { info_type: usize, page: usize },
    PageCfg { info_type: usize, page: usize },
}

impl InfoPageReg {
    /// Index of the page among the bank's `INFO_PAGES_PER_BANK` info pages.
    pub fn slot(&self) -> usize {
        match *self {
            InfoPageReg::Regwen { info_type, page } | InfoPageReg::PageCfg { info_type, page } => {
                info_type * FLASH_NUM_INFO_PAGES + page
            }
        }
    }

    pub fn from_index(index: usize) -> Self {
        let info_type = index / (2 * FLASH_NUM_INFO_PAGES);
        let slot = index % (2 * FLASH_NUM_INFO_PAGES);
        if slot < FLASH_NUM_INFO_PAGES {
            InfoPageReg::Regwen {
                info_type,
                page: slot,
            }
        } else {
            InfoPageReg::PageCfg {
                info_type,
                page: slot - FLASH_NUM_INFO_PAGES,
            }
        }
    }
}
