//! `MmapRegion`: the reserved range faults are served into.
//!
//! A private anonymous read/write mapping. The kernel commits nothing until
//! a page is touched; once the range is registered on a userfaultfd, that
//! first touch becomes a fault event instead of a zero-fill.
//!
//! The accessors below (`read_page`, `write_at`, ...) are plain loads and
//! stores. They block inside the kernel while the fault handler thread
//! resolves the page.

use lazypage_core::error::{last_errno, PagerError, Result};
use lazypage_core::region::{PageSelector, Placement, RegionDescriptor};
use lazypage_core::{kdebug, kwarn};

use std::ops::Range;
use std::ptr;

/// System page size, falling back to 4 KiB if sysconf fails.
pub fn system_page_size() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n <= 0 {
        4096
    } else {
        n as usize
    }
}

pub struct MmapRegion {
    base: *mut u8,
    len: usize,
    page_size: usize,
    placement: Placement,
}

// Safety: the region is a fixed mapping owned by this struct. Concurrent
// access to page contents is arbitrated by the kernel fault path, and the
// accessors never hand out references into the mapping.
unsafe impl Send for MmapRegion {}
unsafe impl Sync for MmapRegion {}

impl MmapRegion {
    /// Reserve `len` bytes at a kernel-chosen address.
    pub fn reserve(len: usize, page_size: usize) -> Result<Self> {
        let base = map_anonymous(ptr::null_mut(), len, page_size)?;
        kdebug!("reserved {:#x}+{:#x}", base as usize, len);
        Ok(Self { base, len, page_size, placement: Placement::Anywhere })
    }

    /// Reserve `len` bytes, asking for `hint` as the base address.
    ///
    /// The hint is never forced (`MAP_FIXED` is not used), so an occupied
    /// range is never clobbered. If the kernel picks another address the
    /// region is `Placement::Relocated`; with `strict` that is an error.
    pub fn reserve_at(hint: u64, len: usize, page_size: usize, strict: bool) -> Result<Self> {
        if hint == 0 {
            return Self::reserve(len, page_size);
        }
        let base = map_anonymous(hint as usize as *mut libc::c_void, len, page_size)?;
        let placement = Placement::resolve(hint, base as u64);
        let region = Self { base, len, page_size, placement };

        if let Placement::Relocated { requested, actual } = placement {
            if strict {
                // region drops here and unmaps
                return Err(PagerError::PlacementRefused { requested, actual });
            }
            kwarn!(
                "requested address {:#x} unavailable, region placed at {:#x}",
                requested,
                actual
            );
        }
        Ok(region)
    }

    /// Reserve a region shaped like `desc`, asking for its address.
    ///
    /// `desc` usually comes off the wire, so a range that wraps the address
    /// space or does not fit in `usize` is rejected before mapping.
    pub fn reserve_from(desc: &RegionDescriptor, page_size: usize, strict: bool) -> Result<Self> {
        let len = desc
            .checked_end()
            .and_then(|_| usize::try_from(desc.len).ok())
            .ok_or_else(|| PagerError::Usage(format!("descriptor {} is not a valid range", desc)))?;
        Self::reserve_at(desc.addr, len, page_size, strict)
    }

    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn pages(&self) -> usize {
        self.len / self.page_size
    }

    #[inline]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn descriptor(&self) -> RegionDescriptor {
        RegionDescriptor::new(self.base as usize, self.len)
    }

    /// Address of page `index`
    #[inline]
    pub fn page_ptr(&self, index: usize) -> *mut u8 {
        assert!(index < self.pages(), "page {} out of range", index);
        unsafe { self.base.add(index * self.page_size) }
    }

    fn check_span(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(PagerError::Usage(format!(
                "access {:#x}+{:#x} outside region of {:#x} bytes",
                offset, len, self.len
            ))),
        }
    }

    fn page_range(&self, sel: PageSelector) -> Result<Range<usize>> {
        let range = sel.indices(self.pages());
        if range.end > self.pages() {
            return Err(PagerError::Usage(format!(
                "page {} out of range (0-{})",
                range.end - 1,
                self.pages() - 1
            )));
        }
        Ok(range)
    }

    /// Copy page `index` into `out` (up to one page).
    pub fn read_page(&self, index: usize, out: &mut [u8]) -> Result<usize> {
        self.page_range(PageSelector::Page(index))?;
        let n = out.len().min(self.page_size);
        unsafe {
            ptr::copy_nonoverlapping(self.page_ptr(index), out.as_mut_ptr(), n);
        }
        Ok(n)
    }

    /// Store `data` at the start of page `index`; the rest of the page is untouched.
    pub fn write_page(&self, index: usize, data: &[u8]) -> Result<()> {
        self.write_at(index, 0, data)
    }

    /// Store `data` at `offset` within page `index`.
    pub fn write_at(&self, index: usize, offset: usize, data: &[u8]) -> Result<()> {
        self.page_range(PageSelector::Page(index))?;
        if offset.checked_add(data.len()).map_or(true, |end| end > self.page_size) {
            return Err(PagerError::Usage(format!(
                "{} bytes at offset {} do not fit in a {}-byte page",
                data.len(),
                offset,
                self.page_size
            )));
        }
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.page_ptr(index).add(offset), data.len());
        }
        Ok(())
    }

    /// Load one byte at a region offset.
    pub fn read_byte(&self, offset: usize) -> Result<u8> {
        self.check_span(offset, 1)?;
        Ok(unsafe { ptr::read_volatile(self.base.add(offset)) })
    }

    /// memset `len` bytes at a region offset.
    pub fn fill(&self, offset: usize, len: usize, byte: u8) -> Result<()> {
        self.check_span(offset, len)?;
        unsafe {
            ptr::write_bytes(self.base.add(offset), byte, len);
        }
        Ok(())
    }

    /// `madvise(MADV_DONTNEED)` the selected pages.
    ///
    /// The next touch of each page is a fresh first touch and, when the
    /// region is registered, a fresh fault event.
    pub fn advise_not_needed(&self, sel: PageSelector) -> Result<()> {
        let range = self.page_range(sel)?;
        let start = self.page_ptr(range.start);
        let len = range.len() * self.page_size;
        let ret = unsafe { libc::madvise(start as *mut libc::c_void, len, libc::MADV_DONTNEED) };
        if ret != 0 {
            return Err(PagerError::Advise(last_errno()));
        }
        kdebug!("released pages {:?}", range);
        Ok(())
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        if !self.base.is_null() {
            unsafe {
                libc::munmap(self.base as *mut libc::c_void, self.len);
            }
            self.base = ptr::null_mut();
        }
    }
}

fn map_anonymous(hint: *mut libc::c_void, len: usize, page_size: usize) -> Result<*mut u8> {
    if len == 0 || len % page_size != 0 {
        return Err(PagerError::Usage(format!(
            "region length {:#x} is not a non-zero multiple of the page size {:#x}",
            len, page_size
        )));
    }
    let base = unsafe {
        libc::mmap(
            hint,
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if base == libc::MAP_FAILED {
        return Err(PagerError::Reserve(last_errno()));
    }
    Ok(base as *mut u8)
}
