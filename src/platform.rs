use embedded_storage::nor_flash::NorFlash;

/// See README.md for an example implementation.
pub trait Platform: Crc + NorFlash {}

impl<T: Crc + NorFlash> Platform for T {}

pub type FnCrc8 = fn(init: u8, data: &[u8]) -> u8;

/// Checksum used for item payloads. The default is a software CRC-8/MAXIM (Dallas 1-Wire),
/// targets with a CRC peripheral may override it as long as the result is bit-identical.
pub trait Crc {
    fn crc8(init: u8, data: &[u8]) -> u8 {
        crc8_maxim(init, data)
    }
}

impl<T: Crc> Crc for &mut T {
    fn crc8(init: u8, data: &[u8]) -> u8 {
        T::crc8(init, data)
    }
}

/// CRC-8/MAXIM: polynomial 0x31 (reflected 0x8C), reflected input and output, no final xor.
pub fn crc8_maxim(init: u8, data: &[u8]) -> u8 {
    let mut crc = init;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x8C;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

pub trait AlignedOps: Platform {
    fn align_read_floor(size: usize) -> usize {
        align_floor(size, Self::READ_SIZE)
    }

    fn align_read_ceil(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_write_ceil(size: usize) -> usize {
        align_ceil(size, Self::WRITE_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}
