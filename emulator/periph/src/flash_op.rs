/*++

Licensed under the Apache-2.0 license.

File Name:

    flash_op.rs

Abstract:

    Primitive flash work items and the decoder expanding a started operation
    into them.

--*/

use crate::flash_regs::{Control, MpBankCfg};
use caliptra_emu_bus::ReadOnlyRegister;
use emulator_consts::FLASH_NUM_BANKS;
use log::{debug, error};
use std::collections::VecDeque;
use tock_registers::interfaces::Readable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashPartition {
    Data,
    Info,
}

/// One unit of controller work. Addresses are absolute bus addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashWork {
    BankErase { bank: usize },
    PageErase { partition: FlashPartition, address: u32 },
    Read { partition: FlashPartition, address: u32 },
    Program { partition: FlashPartition, address: u32 },
}

/// Expands the operation described by `control`, `addr` and `bank_cfg` into
/// work items appended to `queue`. Returns the number of items added.
///
/// Unsupported operation codes add nothing, so the operation completes empty.
pub fn decode_operation(
    control: u32,
    addr: u32,
    bank_cfg: u32,
    queue: &mut VecDeque<FlashWork>,
) -> usize {
    let control: ReadOnlyRegister<u32, Control::Register> = ReadOnlyRegister::new(control);
    let partition = match control.reg.read_as_enum(Control::PARTITION_SEL) {
        Some(Control::PARTITION_SEL::Value::INFO) => FlashPartition::Info,
        _ => FlashPartition::Data,
    };
    let before = queue.len();

    match control.reg.read_as_enum(Control::OP) {
        Some(op @ (Control::OP::Value::READ | Control::OP::Value::PROG)) => {
            let words = control.reg.read(Control::NUM) + 1;
            for i in 0..words {
                let address = addr.wrapping_add(4 * i);
                queue.push_back(match op {
                    Control::OP::Value::READ => FlashWork::Read { partition, address },
                    _ => FlashWork::Program { partition, address },
                });
            }
        }
        Some(Control::OP::Value::ERASE) => {
            match control.reg.read_as_enum(Control::ERASE_SEL) {
                Some(Control::ERASE_SEL::Value::BANK) => {
                    let bank_cfg: ReadOnlyRegister<u32, MpBankCfg::Register> =
                        ReadOnlyRegister::new(bank_cfg);
                    let enables: [bool; FLASH_NUM_BANKS] = [
                        bank_cfg.reg.is_set(MpBankCfg::ERASE_EN_0),
                        bank_cfg.reg.is_set(MpBankCfg::ERASE_EN_1),
                    ];
                    for (bank, enabled) in enables.into_iter().enumerate() {
                        if enabled {
                            queue.push_back(FlashWork::BankErase { bank });
                        }
                    }
                }
                _ => queue.push_back(FlashWork::PageErase {
                    partition,
                    address: addr,
                }),
            }
        }
        _ => {
            error!(
                "Unsupported flash operation 0x{:x} in CONTROL 0x{:08x}",
                control.reg.read(Control::OP),
                control.reg.get()
            );
        }
    }

    let added = queue.len() - before;
    debug!(
        "Flash operation decoded into {} work items at 0x{:08x}",
        added, addr
    );
    added
}
