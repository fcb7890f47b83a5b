//! `ContentPolicy`: runtime choice between the two content policies.

use lazypage_core::config::PagerConfig;
use lazypage_core::event::FaultEvent;
use lazypage_core::policy::{PagePolicy, PolicyKind};

use crate::rotating_fill::RotatingFill;
use crate::static_buffer::StaticBuffer;

#[derive(Debug, Clone)]
pub enum ContentPolicy {
    Rotating(RotatingFill),
    Static(StaticBuffer),
}

impl ContentPolicy {
    pub fn for_kind(kind: PolicyKind, fill_base: u8) -> Self {
        match kind {
            PolicyKind::Rotating => ContentPolicy::Rotating(RotatingFill::new(fill_base)),
            PolicyKind::Static => ContentPolicy::Static(StaticBuffer::new()),
        }
    }

    pub fn from_config(config: &PagerConfig) -> Self {
        Self::for_kind(config.resolved_policy(), config.fill_base)
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            ContentPolicy::Rotating(_) => PolicyKind::Rotating,
            ContentPolicy::Static(_) => PolicyKind::Static,
        }
    }
}

impl PagePolicy for ContentPolicy {
    fn name(&self) -> &'static str {
        match self {
            ContentPolicy::Rotating(p) => p.name(),
            ContentPolicy::Static(p) => p.name(),
        }
    }

    fn prime(&mut self, page: &mut [u8]) {
        match self {
            ContentPolicy::Rotating(p) => p.prime(page),
            ContentPolicy::Static(p) => p.prime(page),
        }
    }

    fn fill(&mut self, page: &mut [u8], fault: &FaultEvent, serviced: u64) {
        match self {
            ContentPolicy::Rotating(p) => p.fill(page, fault, serviced),
            ContentPolicy::Static(p) => p.fill(page, fault, serviced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazypage_core::event::Access;

    #[test]
    fn test_from_config() {
        let c = PagerConfig::new().policy(PolicyKind::Static);
        assert_eq!(ContentPolicy::from_config(&c).kind(), PolicyKind::Static);

        let c = PagerConfig::new().fill_base(b'a');
        let mut p = ContentPolicy::from_config(&c);
        assert_eq!(p.kind(), PolicyKind::Rotating);

        let mut page = vec![0u8; 8];
        p.fill(&mut page, &FaultEvent::missing(0, Access::Read), 1);
        assert_eq!(page, vec![b'b'; 8]);
    }

    #[test]
    fn test_names() {
        assert_eq!(ContentPolicy::for_kind(PolicyKind::Rotating, b'A').name(), "rotating");
        assert_eq!(ContentPolicy::for_kind(PolicyKind::Static, b'A').name(), "static");
    }
}
