/*++

Licensed under the Apache-2.0 license.

File Name:

    flash_mp.rs

Abstract:

    Memory protection regions guarding data partition accesses.

--*/

use crate::flash_regs::{
    CfgRegwen, DefaultRegion, MpRegionCfg, DEFAULT_REGION_MASK, MP_REGION_CFG_MASK,
};
use caliptra_emu_bus::ReadWriteRegister;
use emulator_consts::{FLASH_BYTES_PER_PAGE, FLASH_NUM_REGIONS};
use log::warn;
use tock_registers::interfaces::{Readable, Writeable};

/// Kind of access checked against the protection regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashAccess {
    Read,
    Program,
    Erase,
}

/// The configurable regions plus the default region.
///
/// Regions are matched in page units against `[BASE, BASE + SIZE)`. When
/// several enabled regions contain the page, the one with the highest index
/// decides; with no match the default region decides.
pub struct MpRegions {
    flash_base: u32,
    regwen: [ReadWriteRegister<u32, CfgRegwen::Register>; FLASH_NUM_REGIONS],
    regions: [ReadWriteRegister<u32, MpRegionCfg::Register>; FLASH_NUM_REGIONS],
    default_region: ReadWriteRegister<u32, DefaultRegion::Register>,
}

impl MpRegions {
    pub fn new(flash_base: u32) -> Self {
        Self {
            flash_base,
            regwen: core::array::from_fn(|_| ReadWriteRegister::new(CfgRegwen::EN::SET.value)),
            regions: core::array::from_fn(|_| ReadWriteRegister::new(0)),
            default_region: ReadWriteRegister::new(0),
        }
    }

    pub fn reset(&mut self) {
        for regwen in self.regwen.iter() {
            regwen.reg.write(CfgRegwen::EN::SET);
        }
        for region in self.regions.iter() {
            region.reg.set(0);
        }
        self.default_region.reg.set(0);
    }

    pub fn read_regwen(&self, index: usize) -> u32 {
        self.regwen[index].reg.get()
    }

    /// REGWEN is write-0-to-clear: once a region is locked it stays locked
    /// until reset.
    pub fn write_regwen(&mut self, index: usize, val: u32) {
        let regwen = &self.regwen[index].reg;
        regwen.set(regwen.get() & val & CfgRegwen::EN::SET.value);
    }

    pub fn read_region(&self, index: usize) -> u32 {
        self.regions[index].reg.get()
    }

    pub fn write_region(&mut self, index: usize, val: u32) {
        if !self.regwen[index].reg.is_set(CfgRegwen::EN) {
            warn!("MP_REGION_CFG_{} is locked, ignoring write 0x{:08x}", index, val);
            return;
        }
        self.regions[index].reg.set(val & MP_REGION_CFG_MASK);
    }

    pub fn read_default(&self) -> u32 {
        self.default_region.reg.get()
    }

    pub fn write_default(&mut self, val: u32) {
        self.default_region.reg.set(val & DEFAULT_REGION_MASK);
    }

    fn region_contains(&self, index: usize, page: u32) -> bool {
        let region = &self.regions[index].reg;
        if !region.is_set(MpRegionCfg::EN) {
            return false;
        }
        let base = region.read(MpRegionCfg::BASE);
        let size = region.read(MpRegionCfg::SIZE);
        page >= base && page < base + size
    }

    fn region_allows(&self, index: usize, access: FlashAccess) -> bool {
        let region = &self.regions[index].reg;
        match access {
            FlashAccess::Read => region.is_set(MpRegionCfg::RD_EN),
            FlashAccess::Program => region.is_set(MpRegionCfg::PROG_EN),
            FlashAccess::Erase => region.is_set(MpRegionCfg::ERASE_EN),
        }
    }

    fn default_allows(&self, access: FlashAccess) -> bool {
        let default = &self.default_region.reg;
        match access {
            FlashAccess::Read => default.is_set(DefaultRegion::RD_EN),
            FlashAccess::Program => default.is_set(DefaultRegion::PROG_EN),
            FlashAccess::Erase => default.is_set(DefaultRegion::ERASE_EN),
        }
    }

    /// Decides whether `access` is permitted at the absolute `address`.
    pub fn is_allowed(&self, access: FlashAccess, address: u32) -> bool {
        let mut allowed = self.default_allows(access);
        let Some(offset) = address.checked_sub(self.flash_base) else {
            return allowed;
        };
        let page = offset / FLASH_BYTES_PER_PAGE as u32;
        for index in 0..FLASH_NUM_REGIONS {
            if self.region_contains(index, page) {
                allowed = self.region_allows(index, access);
            }
        }
        allowed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tock_registers::fields::FieldValue;

    const BASE: u32 = 0x2000_0000;
    const PAGE: u32 = FLASH_BYTES_PER_PAGE as u32;

    fn region(
        base: u32,
        size: u32,
        extra: FieldValue<u32, MpRegionCfg::Register>,
    ) -> u32 {
        (MpRegionCfg::EN::SET + MpRegionCfg::BASE.val(base) + MpRegionCfg::SIZE.val(size) + extra)
            .value
    }

    #[test]
    fn test_default_region_applies_without_match() {
        let mut mp = MpRegions::new(BASE);
        assert!(!mp.is_allowed(FlashAccess::Read, BASE));

        mp.write_default((DefaultRegion::RD_EN::SET + DefaultRegion::ERASE_EN::SET).value);
        assert!(mp.is_allowed(FlashAccess::Read, BASE));
        assert!(!mp.is_allowed(FlashAccess::Program, BASE));
        assert!(mp.is_allowed(FlashAccess::Erase, BASE + 100 * PAGE));
    }

    #[test]
    fn test_region_overrides_default() {
        let mut mp = MpRegions::new(BASE);
        mp.write_default(
            (DefaultRegion::RD_EN::SET + DefaultRegion::PROG_EN::SET + DefaultRegion::ERASE_EN::SET)
                .value,
        );
        // pages 4..8 readable only
        mp.write_region(0, region(4, 4, MpRegionCfg::RD_EN::SET));

        assert!(mp.is_allowed(FlashAccess::Program, BASE + 3 * PAGE + PAGE - 4));
        assert!(!mp.is_allowed(FlashAccess::Program, BASE + 4 * PAGE));
        assert!(mp.is_allowed(FlashAccess::Read, BASE + 4 * PAGE));
        assert!(!mp.is_allowed(FlashAccess::Erase, BASE + 7 * PAGE + 8));
        // end of the range is exclusive
        assert!(mp.is_allowed(FlashAccess::Program, BASE + 8 * PAGE));
    }

    #[test]
    fn test_highest_matching_region_wins() {
        let mut mp = MpRegions::new(BASE);
        // wide region 2 allows program, narrow region 5 forbids it
        mp.write_region(2, region(0, 64, MpRegionCfg::PROG_EN::SET));
        mp.write_region(5, region(10, 1, MpRegionCfg::RD_EN::SET));
        assert!(!mp.is_allowed(FlashAccess::Program, BASE + 10 * PAGE));
        assert!(mp.is_allowed(FlashAccess::Program, BASE + 11 * PAGE));

        // narrow region 2 allows program, wide region 5 forbids it
        mp.write_region(2, region(10, 1, MpRegionCfg::PROG_EN::SET));
        mp.write_region(5, region(0, 64, MpRegionCfg::RD_EN::SET));
        assert!(!mp.is_allowed(FlashAccess::Program, BASE + 10 * PAGE));
    }

    #[test]
    fn test_disabled_region_is_ignored() {
        let mut mp = MpRegions::new(BASE);
        mp.write_default(DefaultRegion::PROG_EN::SET.value);
        mp.write_region(
            3,
            (MpRegionCfg::BASE.val(0) + MpRegionCfg::SIZE.val(512)).value,
        );
        assert!(mp.is_allowed(FlashAccess::Program, BASE));
    }

    #[test]
    fn test_address_below_base_uses_default() {
        let mut mp = MpRegions::new(BASE);
        mp.write_default(DefaultRegion::RD_EN::SET.value);
        mp.write_region(0, region(0, 512, MpRegionCfg::PROG_EN::SET));
        assert!(mp.is_allowed(FlashAccess::Read, BASE - 4));
        assert!(!mp.is_allowed(FlashAccess::Read, BASE));
    }

    #[test]
    fn test_locked_region_ignores_writes() {
        let mut mp = MpRegions::new(BASE);
        assert_eq!(mp.read_regwen(1), 1);
        mp.write_regwen(1, 0);
        assert_eq!(mp.read_regwen(1), 0);
        // write-0-to-clear, writing 1 does not unlock
        mp.write_regwen(1, 1);
        assert_eq!(mp.read_regwen(1), 0);

        mp.write_region(1, region(0, 1, MpRegionCfg::RD_EN::SET));
        assert_eq!(mp.read_region(1), 0);
        mp.write_region(0, region(0, 1, MpRegionCfg::RD_EN::SET));
        assert_ne!(mp.read_region(0), 0);

        mp.reset();
        assert_eq!(mp.read_regwen(1), 1);
        assert_eq!(mp.read_region(0), 0);
    }

    #[test]
    fn test_reserved_bits_read_zero() {
        let mut mp = MpRegions::new(BASE);
        mp.write_region(6, 0xffff_ffff);
        assert_eq!(mp.read_region(6), 0x3ff1_ff1f);
        mp.write_default(0xffff_ffff);
        assert_eq!(mp.read_default(), 0xf);
    }
}
