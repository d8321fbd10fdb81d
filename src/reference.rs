use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A handle to a diagram node, possibly complemented.
///
/// The least significant bit is the complement flag, the remaining bits hold
/// the slot index of the node in the manager's table. A `Ref` does not own
/// anything: it is only meaningful together with the manager that issued it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    pub const fn new(index: u32, negated: bool) -> Self {
        Self((index << 1) | (negated as u32))
    }

    pub const fn positive(index: u32) -> Self {
        Self::new(index, false)
    }

    pub const fn is_negated(self) -> bool {
        (self.0 & 1) != 0
    }

    /// Slot index of the referenced node.
    pub const fn index(self) -> u32 {
        self.0 >> 1
    }

    /// The same node without the complement flag.
    pub const fn regular(self) -> Self {
        Self(self.0 & !1)
    }

    /// Raw encoding, unique per (node, polarity).
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}",
            if self.is_negated() { "~" } else { "" },
            self.index()
        )
    }
}
