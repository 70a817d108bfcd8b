#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use eeprom_nvs::platform::crc8_maxim;
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

pub const PAGE_SIZE: usize = 256;
pub const MAX_PAYLOAD: usize = PAGE_SIZE - 1 - 4;

pub const STATUS_ERASED: u8 = 0xFF;
pub const STATUS_ACTIVE: u8 = 0xFE;
pub const STATUS_FULL: u8 = 0xFC;
pub const STATUS_UNAVAILABLE: u8 = 0x80;
pub const RING_START: u8 = 0x80;

/// In-memory EEPROM. `W` is the read and write granularity, writes can only clear bits.
#[derive(Default)]
pub struct Flash<const W: usize = 1> {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub fail_after_write: usize,
    pub fail_once: bool,
    pub writes: usize,
    pub operations: Vec<Operation>,
    /// `(operation, address, mask)` of a pending bit flip.
    pub decay: Option<(usize, usize, u8)>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl Flash {
    pub fn new(pages: usize) -> Self {
        Self::new_aligned(pages)
    }

    pub fn new_with_fault(pages: usize, fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new_aligned(pages)
        }
    }

    /// Flash with the given raw content, padded with `0xFF` to full pages.
    pub fn new_from_bytes(pages: usize, content: &[u8]) -> Self {
        let mut flash = Self::new(pages);
        flash.buf[..content.len()].copy_from_slice(content);
        flash
    }
}

impl<const W: usize> Flash<W> {
    pub fn new_aligned(pages: usize) -> Self {
        Self {
            buf: vec![0xffu8; PAGE_SIZE * pages],
            fail_after_operation: usize::MAX,
            fail_after_write: usize::MAX,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
        self.fail_after_write = usize::MAX;
        self.fail_once = false;
    }

    /// Lets the next `writes` writes pass and fails all of the following ones.
    pub fn fail_after_writes(&mut self, writes: usize) {
        self.fail_after_write = self.writes + writes;
    }

    /// Like `fail_after_writes` but only a single write fails, the flash works again afterward.
    pub fn fail_once_after_writes(&mut self, writes: usize) {
        self.fail_after_writes(writes);
        self.fail_once = true;
    }

    /// Flips the `mask` bits at `address` right before the operation `operations` from now runs.
    pub fn decay_after_operations(&mut self, operations: usize, address: usize, mask: u8) {
        self.decay = Some((self.operations.len() + operations, address, mask));
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn write_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn status(&self, page: usize) -> u8 {
        self.buf[page * PAGE_SIZE]
    }

    /// Overwrites raw bytes, bypassing the programming semantics.
    pub fn program(&mut self, page: usize, offset: usize, bytes: &[u8]) {
        let start = page * PAGE_SIZE + offset;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// All records with a live key as `(page, key, payload)`, parsed straight from the buffer.
    pub fn live_records(&self) -> Vec<(usize, u16, Vec<u8>)> {
        let mut records = Vec::new();

        for (page, content) in self.buf.chunks(PAGE_SIZE).enumerate() {
            let kind = content[0] & !RING_START;
            if kind != STATUS_ACTIVE & !RING_START && kind != STATUS_FULL & !RING_START {
                continue;
            }

            let mut offset = 1;
            while offset + 4 <= PAGE_SIZE {
                let len = content[offset] as usize;
                if len == 0xFF || offset + 4 + len > PAGE_SIZE {
                    break;
                }
                let key = u16::from_le_bytes([content[offset + 2], content[offset + 3]]);
                if key != 0 && len != 0 {
                    records.push((page, key, content[offset + 4..offset + 4 + len].to_vec()));
                }
                offset += 4 + len;
            }
        }

        records
    }

    pub fn copies(&self, key: u16) -> usize {
        self.live_records()
            .iter()
            .filter(|(_, it, _)| *it == key)
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn check_fault(&mut self, is_write: bool) -> Result<(), FlashError> {
        if let Some((operation, address, mask)) = self.decay
            && self.operations.len() >= operation
        {
            println!("    flash: DECAY 0x{address:04X}");
            self.buf[address] ^= mask;
            self.decay = None;
        }

        let faulted = self.operations.len() >= self.fail_after_operation
            || (is_write && self.writes >= self.fail_after_write);

        if faulted {
            println!("    flash: FAULT");
            if self.fail_once {
                self.disable_faults();
            }
            return Err(FlashError);
        }

        Ok(())
    }
}

/// Encodes a record the way the driver lays it out.
pub fn record(key: u16, payload: &[u8]) -> Vec<u8> {
    let mut raw = vec![payload.len() as u8, crc8_maxim(0, payload)];
    raw.extend_from_slice(&key.to_le_bytes());
    raw.extend_from_slice(payload);
    raw
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl<const W: usize> ErrorType for Flash<W> {
    type Error = FlashError;
}

impl<const W: usize> ReadNorFlash for Flash<W> {
    const READ_SIZE: usize = W;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        println!(
            "    flash: read:  0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        self.check_fault(false)?;
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const W: usize> NorFlash for Flash<W> {
    const WRITE_SIZE: usize = W;

    const ERASE_SIZE: usize = PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(from < to);

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );
        self.check_fault(false)?;
        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));
        assert!(!bytes.is_empty());

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        self.check_fault(true)?;
        self.writes += 1;
        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // programming only flips bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl<const W: usize> eeprom_nvs::platform::Crc for Flash<W> {}
