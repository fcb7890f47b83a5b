//! `StaticBuffer`: every fault gets the same page.
//!
//! The scratch page is written at most once, when the dispatcher primes
//! the policy. Without a seed it stays all zero.

use lazypage_core::event::FaultEvent;
use lazypage_core::policy::PagePolicy;

#[derive(Debug, Clone, Default)]
pub struct StaticBuffer {
    seed: Option<Vec<u8>>,
}

impl StaticBuffer {
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Copy `seed` to the start of the scratch page once; the rest stays zero.
    pub fn with_seed(seed: impl Into<Vec<u8>>) -> Self {
        Self { seed: Some(seed.into()) }
    }
}

impl PagePolicy for StaticBuffer {
    fn name(&self) -> &'static str {
        "static"
    }

    fn prime(&mut self, page: &mut [u8]) {
        if let Some(seed) = self.seed.take() {
            let n = seed.len().min(page.len());
            page[..n].copy_from_slice(&seed[..n]);
        }
    }

    fn fill(&mut self, _page: &mut [u8], _fault: &FaultEvent, _serviced: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazypage_core::event::Access;

    #[test]
    fn test_unseeded_leaves_page_untouched() {
        let mut p = StaticBuffer::new();
        let mut page = vec![0u8; 128];
        p.prime(&mut page);
        p.fill(&mut page, &FaultEvent::missing(0, Access::Read), 7);
        assert!(page.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_seed_written_once() {
        let mut p = StaticBuffer::with_seed(&b"seed"[..]);
        let mut page = vec![0u8; 16];
        p.prime(&mut page);
        assert_eq!(&page[..4], b"seed");

        // Out-of-band mutation survives later faults.
        page[0] = b'X';
        p.prime(&mut page);
        p.fill(&mut page, &FaultEvent::missing(0, Access::Read), 1);
        assert_eq!(&page[..4], b"Xeed");
    }

    #[test]
    fn test_seed_longer_than_page() {
        let mut p = StaticBuffer::with_seed(vec![b'z'; 32]);
        let mut page = vec![0u8; 8];
        p.prime(&mut page);
        assert!(page.iter().all(|&b| b == b'z'));
    }
}
