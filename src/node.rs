use crate::reference::Ref;
use crate::utils::{pairing3, MyHash};

/// A decision node: `if x[level] then high else low`.
///
/// `level` is 1-based; 0 marks the terminal. The high edge of a stored node is
/// never complemented (canonical form with complement edges).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub level: u32,
    pub low: Ref,
    pub high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            level: 0,
            low: Ref::positive(0),
            high: Ref::positive(0),
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(
            self.level as u64,
            self.low.raw() as u64,
            self.high.raw() as u64,
        )
    }
}
