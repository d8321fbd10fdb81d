//! Type-safe wrappers for feature variables, diagram levels and literals.
//!
//! Feature variables keep their DIMACS numbering (1-based) everywhere in the
//! public API. The manager places them at *levels* according to the planned
//! variable order, so the two notions must never be mixed up.

use std::fmt;
use std::ops::Neg;

/// A feature variable (1-indexed, as in DIMACS).
///
/// # Invariants
///
/// - Variable IDs are in `1..=Var::MAX_ID`, so both literals fit in an `i32`
/// - Variable IDs do not depend on the variable order
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Largest variable ID.
    pub const MAX_ID: u32 = i32::MAX as u32;

    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0` (variables are 1-indexed) or `id > Var::MAX_ID`.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Variable IDs must be >= 1");
        assert!(id <= Self::MAX_ID, "Variable ID {} exceeds {}", id, Self::MAX_ID);
        Var(id)
    }

    /// Creates the variable stored at 0-based position `index`.
    pub fn from_index(index: usize) -> Self {
        assert!(index < Self::MAX_ID as usize, "Variable index {} is too large", index);
        Var(index as u32 + 1)
    }

    /// Returns the raw variable ID.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the 0-based position of this variable in a configuration.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Positive literal of this variable.
    pub fn pos(self) -> Lit {
        Lit(self.0 as i32)
    }

    /// Negative literal of this variable.
    pub fn neg(self) -> Lit {
        Lit(-(self.0 as i32))
    }

    /// Literal of this variable with the given value.
    pub fn lit(self, value: bool) -> Lit {
        if value {
            self.pos()
        } else {
            self.neg()
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A level in the variable order (0-indexed, level 0 is closest to the root).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Level(usize);

impl Level {
    pub fn new(index: usize) -> Self {
        Level(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A literal: a variable together with a polarity.
///
/// Stored in DIMACS form, i.e. `+v` or `-v`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(i32);

impl Lit {
    /// Creates a literal from its DIMACS representation.
    ///
    /// # Panics
    ///
    /// Panics if `value == 0`, which is the clause terminator, not a literal,
    /// or if `value == i32::MIN`, whose negation does not fit.
    pub fn from_dimacs(value: i32) -> Self {
        assert_ne!(value, 0, "Literal must be non-zero");
        assert_ne!(value, i32::MIN, "Literal {} is out of range", value);
        Lit(value)
    }

    pub fn to_dimacs(self) -> i32 {
        self.0
    }

    pub fn var(self) -> Var {
        Var(self.0.unsigned_abs())
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Lit(-self.0)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "~{}", self.var())
        } else {
            write!(f, "{}", self.var())
        }
    }
}
