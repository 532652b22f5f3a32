//! Projection pushdown capability levels
//!
//! A producer advertises a set of support levels. `WithFieldReordering`
//! subsumes `WithoutFieldReordering`: a producer that can reorder fields can
//! also serve an order-insensitive request. The converse never holds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kinds of projection support a producer offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectSupport {
    /// Fields may be dropped as long as the retained fields keep the data
    /// source's native order.
    WithoutFieldReordering,
    /// Fields may additionally be reordered arbitrarily. Subsumes
    /// `WithoutFieldReordering`.
    WithFieldReordering,
}

impl fmt::Display for ProjectSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectSupport::WithoutFieldReordering => write!(f, "WITHOUT_FIELD_REORDERING"),
            ProjectSupport::WithFieldReordering => write!(f, "WITH_FIELD_REORDERING"),
        }
    }
}

/// A small value set of support levels. Commonly empty (no pushdown possible
/// at all), or one, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectSupportSet {
    without_reordering: bool,
    with_reordering: bool,
}

impl ProjectSupportSet {
    /// No pushdown support: only a fixed set of fields can ever be produced.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(levels: &[ProjectSupport]) -> Self {
        let mut set = Self::default();
        for level in levels {
            set.insert(*level);
        }
        set
    }

    pub fn all() -> Self {
        Self {
            without_reordering: true,
            with_reordering: true,
        }
    }

    pub fn insert(&mut self, level: ProjectSupport) {
        match level {
            ProjectSupport::WithoutFieldReordering => self.without_reordering = true,
            ProjectSupport::WithFieldReordering => self.with_reordering = true,
        }
    }

    pub fn contains(&self, level: ProjectSupport) -> bool {
        match level {
            ProjectSupport::WithoutFieldReordering => self.without_reordering,
            ProjectSupport::WithFieldReordering => self.with_reordering,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.without_reordering && !self.with_reordering
    }

    /// Whether this set can honor a request at the given level, accounting
    /// for subsumption: `WithFieldReordering` satisfies an
    /// order-insensitive requirement too.
    pub fn satisfies(&self, required: ProjectSupport) -> bool {
        match required {
            ProjectSupport::WithoutFieldReordering => {
                self.without_reordering || self.with_reordering
            }
            ProjectSupport::WithFieldReordering => self.with_reordering,
        }
    }
}

impl fmt::Display for ProjectSupportSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for level in [
            ProjectSupport::WithoutFieldReordering,
            ProjectSupport::WithFieldReordering,
        ] {
            if self.contains(level) {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}", level)?;
                first = false;
            }
        }
        write!(f, "}}")
    }
}
