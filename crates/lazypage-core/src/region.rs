//! Region geometry: descriptors, page arithmetic and page selection.

use std::fmt;
use std::ops::Range;

use crate::error::{PagerError, Result};

/// `{address, length}` pair identifying a reserved virtual range.
///
/// The address is only meaningful inside the process that reserved it.
/// A peer treats it as a requested placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub addr: u64,
    pub len: u64,
}

impl RegionDescriptor {
    pub fn new(addr: usize, len: usize) -> Self {
        Self { addr: addr as u64, len: len as u64 }
    }

    /// End address (exclusive). `None` if the range wraps the address space.
    #[inline]
    pub fn checked_end(&self) -> Option<u64> {
        self.addr.checked_add(self.len)
    }

    /// Number of whole pages covered
    #[inline]
    pub fn pages(&self, page_size: usize) -> usize {
        (self.len / page_size as u64) as usize
    }
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{:#x}", self.addr, self.len)
    }
}

/// Round `addr` down to the start of its page.
///
/// `page_size` must be a power of two.
#[inline]
pub fn page_align_down(addr: usize, page_size: usize) -> usize {
    debug_assert!(page_size.is_power_of_two());
    addr & !(page_size - 1)
}

/// Byte length of a region of `pages` pages.
pub fn region_len(pages: usize, page_size: usize) -> Result<usize> {
    if pages == 0 {
        return Err(PagerError::Usage("page count must be at least 1".into()));
    }
    pages
        .checked_mul(page_size)
        .ok_or_else(|| PagerError::Usage(format!("{} pages overflow the address space", pages)))
}

/// Where a reservation ended up relative to what was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// No address was requested; the kernel chose.
    Anywhere,
    /// The requested address was used.
    Honored,
    /// The kernel placed the mapping elsewhere.
    Relocated { requested: u64, actual: u64 },
}

impl Placement {
    pub fn resolve(requested: u64, actual: u64) -> Self {
        if requested == actual {
            Placement::Honored
        } else {
            Placement::Relocated { requested, actual }
        }
    }

    #[inline]
    pub fn is_relocated(&self) -> bool {
        matches!(self, Placement::Relocated { .. })
    }
}

/// Page chosen by a console command: one index, or every page (`-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    All,
    Page(usize),
}

impl PageSelector {
    /// Parse a console page argument against a region of `pages` pages.
    pub fn parse(s: &str, pages: usize) -> Result<Self> {
        let n: i64 = s
            .trim()
            .parse()
            .map_err(|_| PagerError::Usage(format!("'{}' is not a page number", s.trim())))?;
        match n {
            -1 => Ok(PageSelector::All),
            n if n >= 0 && (n as u64) < pages as u64 => Ok(PageSelector::Page(n as usize)),
            _ => Err(PagerError::Usage(format!(
                "page {} out of range (0-{}, or -1 for all)",
                n,
                pages.saturating_sub(1)
            ))),
        }
    }

    /// Page indices covered by this selection
    pub fn indices(&self, pages: usize) -> Range<usize> {
        match *self {
            PageSelector::All => 0..pages,
            PageSelector::Page(i) => i..i + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_align_down() {
        assert_eq!(page_align_down(0x7000_0000_1234, 4096), 0x7000_0000_1000);
        assert_eq!(page_align_down(0x7000_0000_1000, 4096), 0x7000_0000_1000);
        assert_eq!(page_align_down(0x7000_0000_1fff, 4096), 0x7000_0000_1000);
        assert_eq!(page_align_down(0x20_1234, 2 * 1024 * 1024), 0x20_0000);
    }

    #[test]
    fn test_region_len() {
        assert_eq!(region_len(4, 4096).unwrap(), 16384);
        assert!(matches!(region_len(0, 4096), Err(PagerError::Usage(_))));
        assert!(region_len(usize::MAX, 4096).is_err());
    }

    #[test]
    fn test_descriptor_geometry() {
        let d = RegionDescriptor::new(0x10000, 4 * 4096);
        assert_eq!(d.checked_end(), Some(0x14000));
        assert_eq!(d.pages(4096), 4);

        let wrapped = RegionDescriptor { addr: u64::MAX - 4095, len: 2 * 4096 };
        assert_eq!(wrapped.checked_end(), None);
    }

    #[test]
    fn test_placement() {
        assert_eq!(Placement::resolve(0x1000, 0x1000), Placement::Honored);
        let p = Placement::resolve(0x1000, 0x5000);
        assert!(p.is_relocated());
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(PageSelector::parse("-1", 2).unwrap(), PageSelector::All);
        assert_eq!(PageSelector::parse(" 1\n", 2).unwrap(), PageSelector::Page(1));
        assert!(PageSelector::parse("2", 2).is_err());
        assert!(PageSelector::parse("-2", 2).is_err());
        assert!(PageSelector::parse("x", 2).is_err());
    }

    #[test]
    fn test_selector_indices() {
        assert_eq!(PageSelector::All.indices(3), 0..3);
        assert_eq!(PageSelector::Page(2).indices(3), 2..3);
    }
}
