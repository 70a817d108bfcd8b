#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod error;
mod get;
mod internal;
pub mod ota;
pub mod platform;
mod raw;
mod set;

pub use get::Get;
pub use ota::{ConfigKey, OtaInfo};
pub use raw::PageKind;
pub use set::Set;

extern crate alloc;

use crate::error::Error;
use crate::internal::ThinPage;
use crate::platform::Platform;
use crate::raw::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct NvsStatistics {
    pub pages: PageStatistics,
    pub per_page: Vec<PageUsage>,
    /// Index of the page the ring starts at
    pub ring_start: usize,
    /// Index of the page appends currently go to
    pub active: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageStatistics {
    pub erased: u16,
    pub active: u16,
    pub full: u16,
    pub unavailable: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageUsage {
    pub kind: PageKind,
    pub ring_start: bool,
    /// Bytes of the content region taken by records, tombstones included
    pub bytes_used: usize,
    /// Live records on the page
    pub item_count: usize,
}

/// The Nvs struct keeps a small descriptor for every page of the partition in memory, the item
/// records themselves are only ever read from the flash.
pub struct Nvs<T: Platform> {
    pub(crate) hal: T,
    pub(crate) base_address: usize,
    pub(crate) page_size: usize,
    pub(crate) page_count: u16,
    pub(crate) initialized: bool,
    pub(crate) faulted: bool,

    // set after calling self.load_pages
    pub(crate) pages: Vec<ThinPage>,
    pub(crate) ring_start: usize,
    pub(crate) head: usize,
}

impl<T: Platform> Nvs<T> {
    /// Creates a store spanning the given partition with one page per erase block of the flash.
    /// Nothing is read until `init()` is called.
    pub fn new(partition_offset: usize, partition_size: usize, hal: T) -> Result<Nvs<T>, Error> {
        Self::with_page_size(partition_offset, partition_size, T::ERASE_SIZE, hal)
    }

    /// Like `new()` but with an explicit page size, which has to be a multiple of the erase size
    /// of the flash.
    pub fn with_page_size(
        partition_offset: usize,
        partition_size: usize,
        page_size: usize,
        hal: T,
    ) -> Result<Nvs<T>, Error> {
        if T::ERASE_SIZE == 0
            || !page_size.is_multiple_of(T::ERASE_SIZE)
            || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size)
        {
            return Err(Error::InvalidPageSize);
        }

        if !partition_offset.is_multiple_of(page_size) {
            return Err(Error::InvalidPartitionOffset);
        }

        if partition_size == 0 || !partition_size.is_multiple_of(page_size) {
            return Err(Error::InvalidPartitionSize);
        }

        let pages = partition_size / page_size;
        if pages > u16::MAX as usize {
            return Err(Error::InvalidPartitionSize);
        }

        match partition_offset.checked_add(partition_size) {
            Some(end) if end <= hal.capacity() => {}
            _ => return Err(Error::InvalidPartitionSize),
        }

        Ok(Self {
            hal,
            base_address: partition_offset,
            page_size,
            page_count: pages as u16,
            initialized: false,
            faulted: false,
            pages: Vec::with_capacity(pages),
            ring_start: 0,
            head: 0,
        })
    }

    /// Reads all pages of the partition to
    /// 1. Finish or roll back status transitions interrupted by a reset
    /// 2. Rebuild the usage counters of every page
    /// 3. Tombstone records with an invalid CRC-8
    ///
    /// A partition without any ring-start page, e.g. blank or foreign content, is formatted.
    pub fn init(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("init");

        self.initialized = false;
        self.load_pages()?;
        self.initialized = true;
        self.faulted = false;

        Ok(())
    }

    /// Copies the stored value of `key` into `out` and returns the number of bytes copied. A value
    /// longer than `out` is truncated, `0` means the key does not exist.
    pub fn read_item(&mut self, key: u16, out: &mut [u8]) -> Result<usize, Error> {
        self.guarded(|nvs| nvs.read_item_internal(key, out))
    }

    /// Stores `data` under `key`, replacing a previous value. Writing the value that is already
    /// stored does not touch the flash.
    pub fn write_item(&mut self, key: u16, data: &[u8]) -> Result<(), Error> {
        self.guarded(|nvs| nvs.write_item_internal(key, data))
    }

    /// Deletes all copies of `key` and returns how many were found. Missing keys are not an error.
    pub fn delete_item(&mut self, key: u16) -> Result<usize, Error> {
        self.guarded(|nvs| nvs.delete_item_internal(key))
    }

    /// Maintenance tick, erases pages that were emptied during lookups. Returns the number of
    /// erased pages.
    pub fn run(&mut self) -> Result<usize, Error> {
        self.guarded(|nvs| nvs.sweep())
    }

    /// Length of the stored value of `key`.
    pub fn item_len(&mut self, key: u16) -> Result<Option<usize>, Error> {
        self.guarded(|nvs| Ok(nvs.load_value(key)?.map(|value| value.len())))
    }

    /// Largest payload a single item may carry with the configured page size.
    pub fn max_payload_len(&self) -> usize {
        self.max_item_len()
    }

    /// Get a value from the flash.
    ///
    /// Supported types are bool, signed and unsigned integers up to 64-bit width, Vec<u8> and
    /// OtaInfo.
    pub fn get<R>(&mut self, key: u16) -> Result<Option<R>, Error>
    where
        Nvs<T>: Get<R>,
    {
        self.guarded(|nvs| Get::get(nvs, key))
    }

    /// Set a value and write it to the flash
    ///
    /// Type support:
    ///  * bool, signed and unsigned integers up to 64-bit width: saved little-endian at their width
    ///  * &[u8] and Vec<u8>: saved as is, up to `max_payload_len()` bytes
    ///  * OtaInfo: 48 bytes
    pub fn set<R>(&mut self, key: u16, value: R) -> Result<(), Error>
    where
        Nvs<T>: Set<R>,
    {
        self.guarded(|nvs| Set::set(nvs, key, value))
    }

    /// Firmware metadata persisted by the OTA updater.
    pub fn ota_info(&mut self) -> Result<Option<OtaInfo>, Error> {
        self.get(ConfigKey::Ota.key())
    }

    pub fn update_ota_info(&mut self, info: &OtaInfo) -> Result<(), Error> {
        self.set(ConfigKey::Ota.key(), info)
    }

    /// Returns detailed statistics about the partition usage
    pub fn statistics(&mut self) -> Result<NvsStatistics, Error> {
        self.guarded(|nvs| {
            let mut page_stats = PageStatistics {
                erased: 0,
                active: 0,
                full: 0,
                unavailable: 0,
            };

            let per_page = nvs
                .pages
                .iter()
                .map(|page| {
                    match page.kind() {
                        PageKind::Erased => page_stats.erased += 1,
                        PageKind::Active => page_stats.active += 1,
                        PageKind::Full => page_stats.full += 1,
                        PageKind::Unavailable => page_stats.unavailable += 1,
                    }

                    PageUsage {
                        kind: page.kind(),
                        ring_start: page.status.ring_start,
                        bytes_used: page.bytes_used(),
                        item_count: page.item_count(),
                    }
                })
                .collect::<Vec<_>>();

            Ok(NvsStatistics {
                pages: page_stats,
                per_page,
                ring_start: nvs.ring_start,
                active: nvs.active_page(),
            })
        })
    }

    /// Runs `op` on an initialized store. A flash failure leaves the page table out of sync, so
    /// the store is flagged and rebuilt from the flash on the next call.
    fn guarded<R>(&mut self, op: impl FnOnce(&mut Self) -> Result<R, Error>) -> Result<R, Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        if self.faulted {
            #[cfg(feature = "debug-logs")]
            println!("nvs: reloading pages after flash failure");

            self.load_pages()?;
            self.faulted = false;
        }

        match op(self) {
            Err(Error::IoFailure) => {
                self.faulted = true;
                Err(Error::IoFailure)
            }
            other => other,
        }
    }
}
