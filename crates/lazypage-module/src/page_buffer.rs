//! `PageBuffer`: the dispatcher's scratch page.
//!
//! One page-aligned, page-sized anonymous mapping. UFFDIO_COPY wants a
//! page-aligned source, which a heap `Vec` does not guarantee.

use lazypage_core::error::{last_errno, PagerError, Result};

use std::ptr;

pub struct PageBuffer {
    ptr: *mut u8,
    len: usize,
}

// Safety: exclusively owned mapping, only reachable through &/&mut self.
unsafe impl Send for PageBuffer {}

impl PageBuffer {
    /// Map one zeroed page of `page_size` bytes.
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(PagerError::Usage("page size must be non-zero".into()));
        }
        let p = unsafe {
            libc::mmap(
                ptr::null_mut(),
                page_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if p == libc::MAP_FAILED {
            return Err(PagerError::Reserve(last_errno()));
        }
        Ok(Self { ptr: p as *mut u8, len: page_size })
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
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}
