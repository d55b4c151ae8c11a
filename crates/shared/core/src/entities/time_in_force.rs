use serde::{Deserialize, Serialize};

/// Time-in-force instructions applied once the matching loop finishes
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good Till Cancelled: the unfilled remainder rests on the book
    #[default]
    GTC,

    /// Immediate or Cancel: execute what is possible, cancel the remainder
    IOC,

    /// Fill or Kill: execute completely or cancel the entire order
    FOK,
}

impl TimeInForce {
    /// Returns true if partial fills are allowed
    pub fn allows_partial_fill(&self) -> bool {
        !matches!(self, TimeInForce::FOK)
    }

    /// Returns true if an unfilled remainder may rest on the book
    pub fn may_rest(&self) -> bool {
        matches!(self, TimeInForce::GTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_gtc_rests() {
        assert!(TimeInForce::GTC.may_rest());
        assert!(!TimeInForce::IOC.may_rest());
        assert!(!TimeInForce::FOK.may_rest());
        assert!(!TimeInForce::FOK.allows_partial_fill());
    }
}
