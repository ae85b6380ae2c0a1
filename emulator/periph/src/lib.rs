/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the flash controller peripheral library.

--*/

mod flash_ctrl;
mod flash_fifo;
mod flash_mp;
mod flash_op;
pub mod flash_regs;
mod flash_storage;

pub use flash_ctrl::{FlashCtrl, FlashCtrlArgs, FlashCtrlError, FlashOpState};
pub use flash_fifo::{WordFifo, FIFO_EMPTY_SENTINEL};
pub use flash_mp::{FlashAccess, MpRegions};
pub use flash_op::{decode_operation, FlashPartition, FlashWork};
pub use flash_storage::{FileFlashStorage, FlashStorage, StorageError};
