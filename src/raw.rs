//! On-flash layout of a page.
//!
//! ```text
//! byte 0        status (bit 7 cleared = ring-start, bits 0..7 = PageKind)
//! byte 1..      item records, packed back to back:
//!               len: u8 | crc: u8 | key: u16 le | payload: [u8; len]
//!               terminated by len == 0xFF (unprogrammed) or by the end of the page
//! ```

use crate::platform::{AlignedOps, FnCrc8, Platform};
use alloc::vec;
use core::fmt::{Debug, Formatter};
#[cfg(feature = "defmt")]
use defmt::trace;

pub(crate) const PAGE_HEADER_SIZE: usize = 1;
pub(crate) const ITEM_HEADER_SIZE: usize = 4;
/// Offset of the key inside an item header, overwritten with zeros to tombstone an item.
pub(crate) const ITEM_KEY_OFFSET: usize = 2;

/// An unprogrammed length byte ends the log of a page.
pub(crate) const END_OF_LOG: u8 = 0xFF;
pub(crate) const MAX_ITEM_LENGTH: usize = END_OF_LOG as usize - 1;
/// Smallest record that can be appended: a header plus a single payload byte.
pub(crate) const MIN_RECORD_SIZE: usize = ITEM_HEADER_SIZE + 1;
pub(crate) const MIN_PAGE_SIZE: usize = PAGE_HEADER_SIZE + MIN_RECORD_SIZE;
pub(crate) const MAX_PAGE_SIZE: usize = u16::MAX as usize;

pub(crate) const TOMBSTONE_KEY: u16 = 0;
pub(crate) const UNPROGRAMMED_KEY: u16 = u16::MAX;

const PSB_RING_START: u8 = 0x80;
const PSB_KIND: u8 = !PSB_RING_START;
const PSB_ACTIVE: u8 = 0x01;
const PSB_FULL: u8 = 0x02;

/// Life cycle stage of a page. Each transition only clears bits, so the status byte can be
/// rewritten in place without erasing the page.
#[derive(strum::FromRepr, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PageKind {
    // All bits set, default state after an erase.
    Erased = PSB_KIND,

    // The single page that accepts appends.
    Active = PageKind::Erased as u8 & !PSB_ACTIVE,

    // No more appends, items may still be tombstoned.
    Full = PageKind::Active as u8 & !PSB_FULL,

    // Every item of the page was tombstoned, waiting for the maintenance sweep.
    Unavailable = 0x00,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct PageStatus {
    pub(crate) kind: PageKind,
    pub(crate) ring_start: bool,
}

impl PageStatus {
    pub(crate) const ERASED: PageStatus = PageStatus {
        kind: PageKind::Erased,
        ring_start: false,
    };

    pub(crate) fn with_kind(self, kind: PageKind) -> Self {
        Self { kind, ..self }
    }

    pub(crate) fn with_ring_start(self) -> Self {
        Self {
            ring_start: true,
            ..self
        }
    }

    /// `None` for kinds that no version of the driver writes, e.g. after a torn erase.
    pub(crate) fn from_byte(raw: u8) -> Option<Self> {
        let kind = PageKind::from_repr(raw & PSB_KIND)?;
        Some(Self {
            kind,
            ring_start: raw & PSB_RING_START == 0,
        })
    }

    pub(crate) fn to_byte(self) -> u8 {
        let marker = if self.ring_start { 0 } else { PSB_RING_START };
        marker | self.kind as u8
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct ItemHeader {
    pub(crate) length: u8,
    pub(crate) crc: u8,
    pub(crate) key: u16,
}

impl ItemHeader {
    pub(crate) fn new(key: u16, payload: &[u8], crc8: FnCrc8) -> Self {
        Self {
            length: payload.len() as u8,
            crc: crc8(0, payload),
            key,
        }
    }

    pub(crate) fn from_bytes(raw: [u8; ITEM_HEADER_SIZE]) -> Self {
        let [length, crc, key_lo, key_hi] = raw;
        Self {
            length,
            crc,
            key: u16::from_le_bytes([key_lo, key_hi]),
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; ITEM_HEADER_SIZE] {
        let [key_lo, key_hi] = self.key.to_le_bytes();
        [self.length, self.crc, key_lo, key_hi]
    }

    pub(crate) fn is_end_of_log(&self) -> bool {
        self.length == END_OF_LOG
    }

    pub(crate) fn is_tombstone(&self) -> bool {
        self.key == TOMBSTONE_KEY
    }

    /// An all-zero header is what an interrupted write leaves behind on some parts, it never
    /// carries data since empty payloads are rejected.
    pub(crate) fn is_void(&self) -> bool {
        self.length == 0
    }

    pub(crate) fn record_size(&self) -> usize {
        ITEM_HEADER_SIZE + self.length as usize
    }

    pub(crate) fn verify(&self, payload: &[u8], crc8: FnCrc8) -> bool {
        payload.len() == self.length as usize && crc8(0, payload) == self.crc
    }
}

impl Debug for ItemHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let length = self.length;
        let crc = self.crc;
        let key = self.key;
        f.write_fmt(format_args!(
            "ItemHeader {{ len: {length:>3}, crc: 0x{crc:0>2x}, key: 0x{key:0>4x} }}"
        ))
    }
}

/// Pads the write with `0xFF` on both sides up to the write granularity of the flash. Programming
/// ones leaves the neighbouring cells untouched.
#[inline(always)]
pub(crate) fn write_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &[u8],
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("write_aligned @{:#08x}: [{}]", offset, bytes.len());

    let offset = offset as usize;
    let start = T::align_write_floor(offset);
    let end = T::align_write_ceil(offset + bytes.len());

    if start == offset && end == offset + bytes.len() {
        return hal.write(offset as u32, bytes);
    }

    let mut buf = vec![0xFFu8; end - start];
    buf[offset - start..offset - start + bytes.len()].copy_from_slice(bytes);
    hal.write(start as u32, &buf)
}

#[inline(always)]
pub(crate) fn read_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &mut [u8],
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("read_aligned @{:#08x}: [{}]", offset, bytes.len());

    let offset = offset as usize;
    let start = T::align_read_floor(offset);
    let end = T::align_read_ceil(offset + bytes.len());

    if start == offset && end == offset + bytes.len() {
        return hal.read(offset as u32, bytes);
    }

    let mut buf = vec![0u8; end - start];
    hal.read(start as u32, &mut buf)?;
    bytes.copy_from_slice(&buf[offset - start..offset - start + bytes.len()]);
    Ok(())
}
