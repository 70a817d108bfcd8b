use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{
    END_OF_LOG, ITEM_HEADER_SIZE, ITEM_KEY_OFFSET, ItemHeader, MAX_ITEM_LENGTH, MIN_RECORD_SIZE,
    PAGE_HEADER_SIZE, PageKind, PageStatus, TOMBSTONE_KEY, UNPROGRAMMED_KEY, read_aligned,
    write_aligned,
};
use crate::Nvs;
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "debug-logs")]
use core::fmt::{Debug, Formatter};
#[cfg(feature = "defmt")]
use defmt::trace;
#[cfg(feature = "defmt")]
use defmt::warn;

/// Position of an item record: page index and offset into the content region of the page.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "debug-logs", derive(Debug))]
pub(crate) struct Location {
    pub(crate) page: usize,
    pub(crate) offset: usize,
}

/// The authoritative copy of a key as returned by `Nvs::find`.
pub(crate) struct FoundItem {
    pub(crate) location: Location,
    pub(crate) payload: Vec<u8>,
}

/// What happens to a `Full` page once its last live item got tombstoned.
#[derive(Clone, Copy, PartialEq)]
enum Reclaim {
    /// Erase right away, used on the write and delete paths.
    Immediate,
    /// Mark as `Unavailable` and leave the erase to the maintenance sweep.
    Deferred,
}

/// In-memory mirror of a page. Nothing besides the status byte and the records is persisted,
/// `bytes_used` and `item_count` are rebuilt on every boot.
pub(crate) struct ThinPage {
    pub(crate) address: usize,
    pub(crate) status: PageStatus,
    capacity: u16,
    bytes_used: u16,
    item_count: u16,
}

impl ThinPage {
    pub(crate) fn erased(address: usize, page_size: usize) -> Self {
        Self {
            address,
            status: PageStatus::ERASED,
            capacity: (page_size - PAGE_HEADER_SIZE) as u16,
            bytes_used: 0,
            item_count: 0,
        }
    }

    pub(crate) fn kind(&self) -> PageKind {
        self.status.kind
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub(crate) fn bytes_used(&self) -> usize {
        self.bytes_used as usize
    }

    pub(crate) fn item_count(&self) -> usize {
        self.item_count as usize
    }

    pub(crate) fn free_bytes(&self) -> usize {
        self.capacity() - self.bytes_used()
    }

    /// Erased and unavailable pages never contain live items, so searches skip them.
    fn may_contain_items(&self) -> bool {
        matches!(self.kind(), PageKind::Active | PageKind::Full)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), Error> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(Error::InvalidArgument),
        }
    }

    fn content_address(&self, offset: usize) -> u32 {
        (self.address + PAGE_HEADER_SIZE + offset) as u32
    }

    fn read<T: Platform>(&self, hal: &mut T, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.check_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        read_aligned(hal, self.content_address(offset), buf).map_err(|_| Error::IoFailure)
    }

    fn write<T: Platform>(&self, hal: &mut T, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("page write: @{:#08x}+{}[{}]", self.address, offset, bytes.len());

        self.check_range(offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }

        write_aligned(hal, self.content_address(offset), bytes).map_err(|_| Error::IoFailure)
    }

    /// Resets the whole page including the status byte to `0xFF`.
    fn erase<T: Platform>(&mut self, hal: &mut T) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("page erase: @{:#08x}", self.address);

        #[cfg(feature = "debug-logs")]
        println!("  ThinPage: erase {:#08x}", self.address);

        let end = self.address + PAGE_HEADER_SIZE + self.capacity();
        hal.erase(self.address as _, end as _)
            .map_err(|_| Error::IoFailure)?;

        self.status = PageStatus::ERASED;
        self.bytes_used = 0;
        self.item_count = 0;

        Ok(())
    }

    fn update_status<T: Platform>(&mut self, hal: &mut T, status: PageStatus) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("page status: @{:#08x}: {}", self.address, status.kind);

        #[cfg(feature = "debug-logs")]
        println!(
            "  ThinPage: status {:#08x}: {:?} -> {:?}",
            self.address, self.status, status
        );

        write_aligned(hal, self.address as u32, &[status.to_byte()])
            .map_err(|_| Error::IoFailure)?;

        self.status = status;

        Ok(())
    }

    /// Writes header and payload with a single flash write and returns the offset of the record.
    fn append<T: Platform>(&mut self, hal: &mut T, key: u16, payload: &[u8]) -> Result<usize, Error> {
        let header = ItemHeader::new(key, payload, T::crc8);
        let offset = self.bytes_used();

        let mut record = Vec::with_capacity(header.record_size());
        record.extend_from_slice(&header.to_bytes());
        record.extend_from_slice(payload);

        #[cfg(feature = "debug-logs")]
        println!(
            "  ThinPage: append {header:?} @{:#08x}+{offset}",
            self.address
        );

        self.write(hal, offset, &record)?;

        self.bytes_used += record.len() as u16;
        self.item_count += 1;

        Ok(offset)
    }

    /// Rebuilds `bytes_used` and `item_count` from the raw content of an `Active` or `Full` page.
    /// Records failing their checksum are tombstoned on the way. Returns `false` if the log ends in
    /// garbage, in which case nothing may be appended to the page anymore.
    fn replay<T: Platform>(&mut self, hal: &mut T, content: &[u8]) -> Result<bool, Error> {
        let capacity = self.capacity();
        let mut offset = 0usize;

        self.item_count = 0;

        let clean = loop {
            if offset + ITEM_HEADER_SIZE > capacity {
                // not even a header fits anymore, the tail has to be unprogrammed
                break content[offset..capacity].iter().all(|&it| it == 0xFF);
            }

            let mut raw = [0u8; ITEM_HEADER_SIZE];
            raw.copy_from_slice(&content[offset..offset + ITEM_HEADER_SIZE]);
            let header = ItemHeader::from_bytes(raw);

            if header.is_end_of_log() {
                // an append that got interrupted right at its length byte
                break content[offset..capacity].iter().all(|&it| it == 0xFF);
            }

            let end = offset + header.record_size();
            if end > capacity {
                break false;
            }

            #[cfg(feature = "debug-logs")]
            println!("  replay @{:#08x}+{offset}: {header:?}", self.address);

            if !header.is_tombstone() && !header.is_void() {
                let payload = &content[offset + ITEM_HEADER_SIZE..end];
                if header.key == UNPROGRAMMED_KEY || !header.verify(payload, T::crc8) {
                    #[cfg(feature = "defmt")]
                    warn!(
                        "corrupt item at {:#08x}+{}, tombstoning",
                        self.address, offset
                    );
                    self.write(hal, offset + ITEM_KEY_OFFSET, &TOMBSTONE_KEY.to_le_bytes())?;
                } else {
                    self.item_count += 1;
                }
            }

            offset = end;
        };

        self.bytes_used = offset as u16;

        Ok(clean)
    }
}

#[cfg(feature = "debug-logs")]
impl Debug for ThinPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let address = self.address;
        let status = self.status;
        let bytes_used = self.bytes_used;
        let item_count = self.item_count;
        f.write_fmt(format_args!(
            "Page {{ address: 0x{address:0>8x}, status: {status:?}, bytes_used: {bytes_used}, item_count: {item_count} }}"
        ))
    }
}

pub(crate) fn is_valid_key(key: u16) -> bool {
    key != TOMBSTONE_KEY && key != UNPROGRAMMED_KEY
}

impl<T> Nvs<T>
where
    T: Platform,
{
    pub(crate) fn max_item_len(&self) -> usize {
        (self.page_size - PAGE_HEADER_SIZE - ITEM_HEADER_SIZE).min(MAX_ITEM_LENGTH)
    }

    fn page(&self, page: usize) -> Result<&ThinPage, Error> {
        self.pages.get(page).ok_or(Error::InvalidArgument)
    }

    pub(crate) fn page_read(&mut self, page: usize, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        let page = self.pages.get(page).ok_or(Error::InvalidArgument)?;
        page.read(&mut self.hal, offset, buf)
    }

    pub(crate) fn page_write(&mut self, page: usize, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        let page = self.pages.get(page).ok_or(Error::InvalidArgument)?;
        page.write(&mut self.hal, offset, bytes)
    }

    pub(crate) fn page_erase(&mut self, page: usize) -> Result<(), Error> {
        let page = self.pages.get_mut(page).ok_or(Error::InvalidArgument)?;
        page.erase(&mut self.hal)
    }

    pub(crate) fn page_status_update(&mut self, page: usize, status: PageStatus) -> Result<(), Error> {
        let page = self.pages.get_mut(page).ok_or(Error::InvalidArgument)?;
        page.update_status(&mut self.hal, status)
    }

    fn read_header(&mut self, page: usize, offset: usize) -> Result<ItemHeader, Error> {
        let mut raw = [0u8; ITEM_HEADER_SIZE];
        self.page_read(page, offset, &mut raw)?;
        Ok(ItemHeader::from_bytes(raw))
    }

    fn read_payload(&mut self, location: Location, header: &ItemHeader) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; header.length as usize];
        self.page_read(location.page, location.offset + ITEM_HEADER_SIZE, &mut buf)?;
        Ok(buf)
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page appends go to, if there is one.
    pub(crate) fn active_page(&self) -> Option<usize> {
        self.pages
            .get(self.head)
            .filter(|page| page.kind() == PageKind::Active)
            .map(|_| self.head)
    }

    /// Newest page first. In a strictly rotated ring the walk ends at the ring-start page, but
    /// pages allocated out of order after a reclaim are visited as well.
    fn search_order(&self) -> impl Iterator<Item = usize> + use<T> {
        let count = self.page_count();
        let head = self.head;
        (0..count).map(move |step| (head + count - step) % count)
    }

    fn next_erased_page(&self) -> Option<usize> {
        let count = self.page_count();
        (0..count)
            .map(|step| (self.head + step) % count)
            .find(|&idx| self.pages[idx].kind() == PageKind::Erased)
    }

    /// Reads every page once and rebuilds the page table.
    pub(crate) fn load_pages(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("load_pages");

        #[cfg(feature = "debug-logs")]
        println!("internal: load_pages");

        self.pages.clear();
        for idx in 0..self.page_count as usize {
            let address = self.base_address + idx * self.page_size;
            let page = self.load_page(address)?;

            #[cfg(feature = "debug-logs")]
            println!("internal: load_pages: {page:?}");

            self.pages.push(page);
        }

        self.ensure_ring_start()?;
        self.ensure_single_active_page()?;

        Ok(())
    }

    fn load_page(&mut self, address: usize) -> Result<ThinPage, Error> {
        #[cfg(feature = "defmt")]
        trace!("load_page: @{:#08x}", address);

        let mut buf = vec![0u8; self.page_size];
        read_aligned(&mut self.hal, address as _, &mut buf).map_err(|_| Error::IoFailure)?;

        let mut page = ThinPage::erased(address, self.page_size);
        let content = &buf[PAGE_HEADER_SIZE..];

        let Some(status) = PageStatus::from_byte(buf[0]) else {
            #[cfg(feature = "defmt")]
            warn!(
                "unknown page status {:#04x} at {:#08x}, erasing",
                buf[0], address
            );
            page.erase(&mut self.hal)?;
            return Ok(page);
        };
        page.status = status;

        match status.kind {
            PageKind::Erased => {
                // validate that the page is truly empty, an erase might have been interrupted
                if content.iter().any(|&it| it != 0xFF) {
                    #[cfg(feature = "defmt")]
                    warn!("partially erased page at {:#08x}, erasing again", address);
                    page.erase(&mut self.hal)?;
                    if status.ring_start {
                        page.update_status(&mut self.hal, status)?;
                    }
                }
            }
            PageKind::Unavailable => {
                page.bytes_used = page.capacity;
            }
            PageKind::Active | PageKind::Full => {
                let clean = page.replay(&mut self.hal, content)?;

                // a clean active page stays the head even when nearly full, it holds the newest
                // copies
                if status.kind == PageKind::Active && !clean {
                    #[cfg(feature = "defmt")]
                    warn!("torn append at {:#08x}, sealing page", address);
                    page.update_status(&mut self.hal, status.with_kind(PageKind::Full))?;
                }

                if page.kind() == PageKind::Full && page.item_count == 0 {
                    page.update_status(&mut self.hal, page.status.with_kind(PageKind::Unavailable))?;
                }
            }
        }

        Ok(page)
    }

    /// Makes sure exactly one page is considered the start of the ring. Without one the partition
    /// is formatted, which is the only path that drops data.
    fn ensure_ring_start(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("ensure_ring_start");

        let marked = self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, page)| page.status.ring_start)
            .map(|(idx, page)| (idx, page.kind()))
            .collect::<Vec<_>>();

        if marked.is_empty() {
            return self.format();
        }

        // An interrupted hand-over of the marker leaves it on the emptied page as well, pages
        // holding data take precedence.
        let ring_start = marked
            .iter()
            .find(|(_, kind)| matches!(kind, PageKind::Active | PageKind::Full))
            .unwrap_or(&marked[0])
            .0;

        for &(idx, kind) in &marked {
            if idx != ring_start && matches!(kind, PageKind::Erased | PageKind::Unavailable) {
                #[cfg(feature = "defmt")]
                warn!("stale ring-start marker on page {}, erasing", idx);
                self.page_erase(idx)?;
            }
        }

        self.ring_start = ring_start;

        Ok(())
    }

    /// Erases all pages and starts the ring at page 0.
    fn format(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        warn!("no ring-start page found, formatting all pages");

        #[cfg(feature = "debug-logs")]
        println!("internal: format");

        for idx in 0..self.page_count() {
            let page = &self.pages[idx];
            if page.status != PageStatus::ERASED || page.bytes_used != 0 {
                self.page_erase(idx)?;
            }
        }

        let status = PageStatus::ERASED
            .with_kind(PageKind::Active)
            .with_ring_start();
        self.page_status_update(0, status)?;

        self.ring_start = 0;
        self.head = 0;

        Ok(())
    }

    /// Picks the head page for searches and appends. If more than one page claims to be active
    /// (interrupted hand-over), the one furthest from the ring-start wins and the others are
    /// sealed.
    fn ensure_single_active_page(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("ensure_single_active_page");

        let count = self.page_count();
        let ring_start = self.ring_start;
        let distance = |idx: usize| (idx + count - ring_start) % count;

        let newest_active = (0..count)
            .filter(|&idx| self.pages[idx].kind() == PageKind::Active)
            .max_by_key(|&idx| distance(idx));

        for idx in 0..count {
            if self.pages[idx].kind() == PageKind::Active && Some(idx) != newest_active {
                #[cfg(feature = "defmt")]
                warn!("detected duplicate active page {}, marking as full", idx);
                self.seal(idx)?;
            }
        }

        self.head = match newest_active {
            Some(idx) => idx,
            None => (0..count)
                .filter(|&idx| self.pages[idx].kind() != PageKind::Erased)
                .max_by_key(|&idx| distance(idx))
                .unwrap_or(ring_start),
        };

        Ok(())
    }

    /// Marks a page as `Full`. A page without live items goes straight on to `Unavailable`.
    fn seal(&mut self, idx: usize) -> Result<(), Error> {
        let status = self.page(idx)?.status;
        self.page_status_update(idx, status.with_kind(PageKind::Full))?;

        if self.pages[idx].item_count == 0 {
            self.page_status_update(idx, status.with_kind(PageKind::Unavailable))?;
        }

        Ok(())
    }

    /// Erases a page that holds no live items anymore. If it is the ring-start page, the marker is
    /// handed to the next used page before the erase, so a reset in between leaves two markers
    /// instead of none.
    pub(crate) fn reclaim_page(&mut self, idx: usize) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("reclaim_page: {}", idx);

        #[cfg(feature = "debug-logs")]
        println!("internal: reclaim_page {idx}");

        if !self.page(idx)?.status.ring_start {
            return self.page_erase(idx);
        }

        let count = self.page_count();
        let successor = (1..count)
            .map(|step| (idx + step) % count)
            .find(|&next| self.pages[next].kind() != PageKind::Erased);

        match successor {
            Some(next) => {
                let status = self.pages[next].status.with_ring_start();
                self.page_status_update(next, status)?;
                self.ring_start = next;
                self.page_erase(idx)
            }
            None => {
                self.page_erase(idx)?;
                self.page_status_update(idx, PageStatus::ERASED.with_ring_start())
            }
        }
    }

    fn tombstone(&mut self, location: Location, reclaim: Reclaim) -> Result<(), Error> {
        #[cfg(feature = "debug-logs")]
        println!("internal: tombstone {location:?}");

        #[cfg(feature = "defmt")]
        trace!("tombstone: page {} +{}", location.page, location.offset);

        // the record bytes stay in place until the page is erased
        self.page_write(
            location.page,
            location.offset + ITEM_KEY_OFFSET,
            &TOMBSTONE_KEY.to_le_bytes(),
        )?;

        let page = &mut self.pages[location.page];
        page.item_count = page.item_count.saturating_sub(1);

        if page.item_count != 0 {
            return Ok(());
        }

        match (page.kind(), reclaim) {
            (PageKind::Full, Reclaim::Immediate) => self.reclaim_page(location.page),
            (PageKind::Full, Reclaim::Deferred) => {
                let status = page.status.with_kind(PageKind::Unavailable);
                self.page_status_update(location.page, status)
            }
            _ => Ok(()),
        }
    }

    /// Looks up the newest valid copy of `key`. Every other copy met on the way, as well as
    /// copies failing their checksum, is tombstoned, so at most one copy survives a completed
    /// search.
    pub(crate) fn find(&mut self, key: u16) -> Result<Option<FoundItem>, Error> {
        #[cfg(feature = "defmt")]
        trace!("find: {}", key);

        #[cfg(feature = "debug-logs")]
        println!("internal: find 0x{key:0>4x}");

        let mut found: Option<FoundItem> = None;

        for page_idx in self.search_order() {
            if !self.pages[page_idx].may_contain_items() {
                continue;
            }

            let mut offset = 0usize;
            while offset + ITEM_HEADER_SIZE <= self.pages[page_idx].bytes_used() {
                let header = self.read_header(page_idx, offset)?;
                if header.length == END_OF_LOG {
                    break;
                }

                let location = Location {
                    page: page_idx,
                    offset,
                };
                offset += header.record_size();

                if header.is_tombstone() || header.is_void() || header.key != key {
                    continue;
                }

                let payload = self.read_payload(location, &header)?;
                if !header.verify(&payload, T::crc8) {
                    #[cfg(feature = "defmt")]
                    warn!(
                        "checksum mismatch for key {} in page {}, tombstoning",
                        key, page_idx
                    );
                    self.tombstone(location, Reclaim::Deferred)?;
                    continue;
                }

                match &found {
                    None => {
                        found = Some(FoundItem { location, payload });
                    }
                    // a later record in the same page is the newer one
                    Some(current) if current.location.page == page_idx => {
                        let stale = current.location;
                        self.tombstone(stale, Reclaim::Deferred)?;
                        found = Some(FoundItem { location, payload });
                    }
                    Some(_) => {
                        #[cfg(feature = "debug-logs")]
                        println!("internal: find: dropping stale copy {location:?}");
                        self.tombstone(location, Reclaim::Deferred)?;
                    }
                }
            }
        }

        Ok(found)
    }

    /// Returns the page the next record of `len` payload bytes goes to, allocating a new active
    /// page if the current one is too full.
    fn select_page(&mut self, len: usize) -> Result<usize, Error> {
        #[cfg(feature = "defmt")]
        trace!("select_page: {}", len);

        let needed = ITEM_HEADER_SIZE + len;
        let active = self.active_page();
        if let Some(idx) = active
            && self.pages[idx].free_bytes() >= needed
        {
            return Ok(idx);
        }

        let target = match self.next_erased_page() {
            Some(idx) => idx,
            None => {
                // the maintenance sweep did not get to run yet
                let pending = (0..self.page_count())
                    .find(|&idx| self.pages[idx].kind() == PageKind::Unavailable)
                    .ok_or(Error::OutOfSpace)?;

                #[cfg(feature = "debug-logs")]
                println!("internal: select_page: reclaiming page {pending} inline");

                self.reclaim_page(pending)?;
                self.next_erased_page().ok_or(Error::OutOfSpace)?
            }
        };

        if let Some(idx) = active {
            self.seal(idx)?;
        }

        let status = self.pages[target].status.with_kind(PageKind::Active);
        self.page_status_update(target, status)?;
        self.head = target;

        Ok(target)
    }

    pub(crate) fn read_item_internal(&mut self, key: u16, out: &mut [u8]) -> Result<usize, Error> {
        #[cfg(feature = "defmt")]
        trace!("read_item: {}", key);

        if !is_valid_key(key) || out.is_empty() {
            return Err(Error::InvalidArgument);
        }

        match self.find(key)? {
            None => Ok(0),
            Some(item) => {
                let len = item.payload.len().min(out.len());
                out[..len].copy_from_slice(&item.payload[..len]);
                Ok(len)
            }
        }
    }

    pub(crate) fn load_value(&mut self, key: u16) -> Result<Option<Vec<u8>>, Error> {
        if !is_valid_key(key) {
            return Err(Error::InvalidArgument);
        }

        Ok(self.find(key)?.map(|item| item.payload))
    }

    pub(crate) fn write_item_internal(&mut self, key: u16, data: &[u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_item: {} [{}]", key, data.len());

        #[cfg(feature = "debug-logs")]
        println!("internal: write_item 0x{key:0>4x} [{}]", data.len());

        if !is_valid_key(key) || data.is_empty() || data.len() > self.max_item_len() {
            return Err(Error::InvalidArgument);
        }

        let old = self.find(key)?;
        if let Some(item) = &old
            && item.payload == data
        {
            #[cfg(feature = "debug-logs")]
            println!("internal: write_item: entry already exists and matches");
            return Ok(());
        }

        let page_idx = self.select_page(data.len())?;
        let page = &mut self.pages[page_idx];
        page.append(&mut self.hal, key, data)?;

        // only now that the new copy is durable the old one may go
        if let Some(item) = old {
            self.tombstone(item.location, Reclaim::Immediate)?;
        }

        if self.pages[page_idx].kind() == PageKind::Active
            && self.pages[page_idx].free_bytes() < MIN_RECORD_SIZE
        {
            self.seal(page_idx)?;
        }

        Ok(())
    }

    pub(crate) fn delete_item_internal(&mut self, key: u16) -> Result<usize, Error> {
        #[cfg(feature = "defmt")]
        trace!("delete_item: {}", key);

        #[cfg(feature = "debug-logs")]
        println!("internal: delete_item 0x{key:0>4x}");

        if !is_valid_key(key) {
            return Err(Error::InvalidArgument);
        }

        let mut removed = 0usize;
        for page_idx in self.search_order() {
            let mut offset = 0usize;
            // the page is erased as soon as its last item is gone, which ends the loop
            while self.pages[page_idx].may_contain_items()
                && offset + ITEM_HEADER_SIZE <= self.pages[page_idx].bytes_used()
            {
                let header = self.read_header(page_idx, offset)?;
                if header.length == END_OF_LOG {
                    break;
                }

                let location = Location {
                    page: page_idx,
                    offset,
                };
                offset += header.record_size();

                if header.is_tombstone() || header.is_void() || header.key != key {
                    continue;
                }

                self.tombstone(location, Reclaim::Immediate)?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Erases all pages waiting in `Unavailable` and returns how many were reclaimed.
    pub(crate) fn sweep(&mut self) -> Result<usize, Error> {
        #[cfg(feature = "defmt")]
        trace!("sweep");

        let mut reclaimed = 0;
        for idx in 0..self.page_count() {
            if self.pages[idx].kind() == PageKind::Unavailable {
                self.reclaim_page(idx)?;
                reclaimed += 1;
            }
        }

        Ok(reclaimed)
    }
}
