//! `RotatingFill`: a different byte for every serviced fault.
//!
//! Fault k (counting from 0) gets a page of `base + k % 20`, so with the
//! default base the pages cycle `A`..`T` regardless of which page faulted.

use lazypage_core::constants::FILL_CYCLE;
use lazypage_core::event::FaultEvent;
use lazypage_core::policy::PagePolicy;

#[derive(Debug, Clone, Copy)]
pub struct RotatingFill {
    base: u8,
}

impl RotatingFill {
    pub fn new(base: u8) -> Self {
        Self { base }
    }

    /// Fill byte for the fault serviced after `serviced` earlier ones.
    #[inline]
    pub fn byte_for(&self, serviced: u64) -> u8 {
        self.base.wrapping_add((serviced % FILL_CYCLE) as u8)
    }
}

impl Default for RotatingFill {
    fn default() -> Self {
        Self::new(lazypage_core::constants::FILL_BASE)
    }
}

impl PagePolicy for RotatingFill {
    fn name(&self) -> &'static str {
        "rotating"
    }

    fn fill(&mut self, page: &mut [u8], _fault: &FaultEvent, serviced: u64) {
        page.fill(self.byte_for(serviced));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazypage_core::event::Access;

    #[test]
    fn test_sequence_and_wrap() {
        let p = RotatingFill::default();
        assert_eq!(p.byte_for(0), b'A');
        assert_eq!(p.byte_for(1), b'B');
        assert_eq!(p.byte_for(19), b'T');
        assert_eq!(p.byte_for(20), b'A');
        assert_eq!(p.byte_for(41), b'B');
    }

    #[test]
    fn test_fill_whole_page() {
        let mut p = RotatingFill::new(b'a');
        let mut page = vec![0u8; 4096];
        p.fill(&mut page, &FaultEvent::missing(0x1000, Access::Read), 2);
        assert!(page.iter().all(|&b| b == b'c'));
    }

    #[test]
    fn test_independent_of_fault_address() {
        let mut p = RotatingFill::default();
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];
        p.fill(&mut a, &FaultEvent::missing(0x1000, Access::Read), 5);
        p.fill(&mut b, &FaultEvent::missing(0x9000, Access::Write), 5);
        assert_eq!(a, b);
    }
}
