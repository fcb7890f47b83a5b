//! Page content policies.
//!
//! A `PagePolicy` decides what bytes satisfy a fault. The dispatcher owns
//! the scratch page and the fault counter and lends them to the policy for
//! each cycle, so a policy never sees a page concurrently with a copy-in.

use std::fmt;
use std::str::FromStr;

use crate::event::FaultEvent;

/// Produces page content for faults.
///
/// # Implementors
///
/// - `RotatingFill`: a different repeated byte for every serviced fault
/// - `StaticBuffer`: the same content for every fault
/// - `ContentPolicy`: runtime selection between the two
pub trait PagePolicy: Send {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Called once, before the first fault, with the fresh (zeroed) page.
    fn prime(&mut self, _page: &mut [u8]) {}

    /// Populate `page` for `fault`. `serviced` is the number of faults the
    /// owning dispatcher has serviced before this one.
    fn fill(&mut self, page: &mut [u8], fault: &FaultEvent, serviced: u64);
}

/// Which policy to run, as chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Rotating,
    Static,
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rotating" | "rotate" => Ok(PolicyKind::Rotating),
            "static" | "zero" => Ok(PolicyKind::Static),
            other => Err(format!("unknown policy '{}'", other)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Rotating => f.write_str("rotating"),
            PolicyKind::Static => f.write_str("static"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("rotating".parse::<PolicyKind>(), Ok(PolicyKind::Rotating));
        assert_eq!("STATIC".parse::<PolicyKind>(), Ok(PolicyKind::Static));
        assert!("lru".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_policy_kind_display_roundtrip() {
        for kind in [PolicyKind::Rotating, PolicyKind::Static] {
            assert_eq!(kind.to_string().parse::<PolicyKind>(), Ok(kind));
        }
    }
}
