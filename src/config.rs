//! Accuracy configuration and the solver-wide, shareable kernel tables
//! (spec.md §6 "Configuration enumeration", §9 "Global mutable state").

use std::sync::Arc;

use crate::error::{FmmError, FmmResult};
use crate::tables::KernelTables;

/// The two supported accuracy tiers. Each fixes `pterms == nlambs` and the
/// resulting expansion length `(pterms + 1)^2`, per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accuracy {
    /// 3 significant digits: p = nλ = 9, (p+1)^2 = 100.
    ThreeDigit,
    /// 6 significant digits: p = nλ = 18, (p+1)^2 = 361.
    SixDigit,
}

impl Accuracy {
    pub fn from_digits(digits: u32) -> FmmResult<Self> {
        match digits {
            3 => Ok(Accuracy::ThreeDigit),
            6 => Ok(Accuracy::SixDigit),
            other => Err(FmmError::UnsupportedAccuracy(other)),
        }
    }

    /// Truncation order of the multipole/local spherical-harmonic
    /// expansions, and (by construction) the number of plane-wave rings.
    pub fn pterms(self) -> usize {
        match self {
            Accuracy::ThreeDigit => 9,
            Accuracy::SixDigit => 18,
        }
    }

    pub fn nlambs(self) -> usize {
        self.pterms()
    }

    /// `(pterms + 1)^2`, the packed length of one multipole/local expansion.
    pub fn pgsz(self) -> usize {
        (self.pterms() + 1) * (self.pterms() + 1)
    }
}

/// Solver-wide configuration: accuracy tier, leaf capacity, and the
/// (possibly shared) precomputed kernel tables that depend only on
/// `accuracy`.
///
/// `tables` is reference-counted so that repeated solves at the same
/// accuracy reuse one set of tables, matching the "precomputed tables ...
/// are safe to reuse across solves of equal accuracy" contract in spec.md
/// §3.
#[derive(Clone)]
pub struct FmmConfig {
    pub accuracy: Accuracy,
    pub leaf_capacity: usize,
    pub tables: Arc<KernelTables>,
}

impl FmmConfig {
    pub fn new(accuracy: Accuracy, leaf_capacity: usize) -> FmmResult<Self> {
        if leaf_capacity == 0 {
            return Err(FmmError::InvalidInput("leaf_capacity (s) must be >= 1"));
        }
        Ok(Self {
            accuracy,
            leaf_capacity,
            tables: Arc::new(KernelTables::new(accuracy)),
        })
    }
}
