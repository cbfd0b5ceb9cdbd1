//! Control-Sequence Generator
//!
//! Builds the ordered list of trial (or block) descriptors for an
//! experiment from a factorial design: the full cross product of every
//! factor's levels, replicated `reps` times and optionally shuffled.
//!
//! Factors whose name starts with [`RESERVED_PREFIX`] only multiply the
//! number of trials; they never show up in the emitted descriptors.
//!
//! ## Usage
//!
//! ```rust
//! use expctl::control::Design;
//!
//! let design = Design::builder(2)
//!     .factor("a", [1, 2])
//!     .factor("b", ["x", "y"])
//!     .build();
//!
//! let sequence = design.generate_seeded(7).unwrap();
//! assert_eq!(sequence.len(), 8);
//! ```
//!
//! The generator is pure: the same design with the same seed always yields
//! the same sequence. It is invoked once, the first time a subject meets an
//! experiment; afterwards the persisted sequence is the source of truth.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::trial::TrialDescriptor;
use crate::{Error, Result};

/// Factor names starting with this marker only control repetition count.
pub const RESERVED_PREFIX: char = '_';

/// An experimental variable and its levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    name: String,
    levels: Vec<Value>,
}

impl Factor {
    /// Create a factor. Duplicate levels are kept and produce duplicate
    /// combinations.
    #[must_use]
    pub fn new<V, I>(name: impl Into<String>, levels: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self {
            name: name.into(),
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }

    /// Get the factor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the factor levels.
    #[must_use]
    pub fn levels(&self) -> &[Value] {
        &self.levels
    }

    /// True if the factor only controls repetition and is not emitted.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.name.starts_with(RESERVED_PREFIX)
    }
}

/// A factorial design: repetition count, factors, and ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    reps: usize,
    factors: Vec<Factor>,
    shuffled: bool,
}

impl Design {
    /// Create a builder for a design replicated `reps` times.
    #[must_use]
    pub fn builder(reps: usize) -> DesignBuilder {
        DesignBuilder::new(reps)
    }

    /// Get the repetition count.
    #[must_use]
    pub const fn reps(&self) -> usize {
        self.reps
    }

    /// Get the factors in declaration order.
    #[must_use]
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Whether generated sequences are shuffled.
    #[must_use]
    pub const fn shuffled(&self) -> bool {
        self.shuffled
    }

    /// Number of cells in one replication of the cross product.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.factors.iter().map(|f| f.levels.len()).product()
    }

    /// Total number of descriptors a generated sequence holds.
    #[must_use]
    pub fn sequence_len(&self) -> usize {
        self.reps * self.condition_count()
    }

    /// One replication of the cross product, in declaration order (the first
    /// factor varies slowest).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] if a factor has an empty name or no
    /// levels.
    pub fn conditions(&self) -> Result<Vec<TrialDescriptor>> {
        let mut cells = vec![TrialDescriptor::new()];

        for factor in &self.factors {
            if factor.name.is_empty() {
                return Err(Error::InvalidDesign("factor name must not be empty".into()));
            }
            if factor.levels.is_empty() {
                return Err(Error::InvalidDesign(format!(
                    "factor '{}' has no levels",
                    factor.name
                )));
            }

            let mut next = Vec::with_capacity(cells.len() * factor.levels.len());
            for cell in &cells {
                for level in &factor.levels {
                    if factor.is_reserved() {
                        next.push(cell.clone());
                    } else {
                        next.push(cell.clone().with_factor(factor.name.clone(), level.clone()));
                    }
                }
            }
            cells = next;
        }

        Ok(cells)
    }

    /// Generate the control sequence, shuffling with `rng` if the design is
    /// shuffled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] if the design cannot produce a
    /// sequence (see [`Design::conditions`]).
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<TrialDescriptor>> {
        let cells = self.conditions()?;

        let mut sequence = Vec::with_capacity(cells.len() * self.reps);
        for _ in 0..self.reps {
            sequence.extend(cells.iter().cloned());
        }

        if self.shuffled {
            sequence.shuffle(rng);
        }

        debug!(
            reps = self.reps,
            factors = self.factors.len(),
            conditions = cells.len(),
            trials = sequence.len(),
            shuffled = self.shuffled,
            "generated control sequence"
        );

        Ok(sequence)
    }

    /// Generate deterministically from a fixed seed.
    ///
    /// # Errors
    ///
    /// See [`Design::generate`].
    pub fn generate_seeded(&self, seed: u64) -> Result<Vec<TrialDescriptor>> {
        self.generate(&mut StdRng::seed_from_u64(seed))
    }
}

/// Builder for `Design`.
#[derive(Debug)]
pub struct DesignBuilder {
    reps: usize,
    factors: Vec<Factor>,
    shuffled: bool,
}

impl DesignBuilder {
    /// Create a new builder. Designs are shuffled unless told otherwise.
    #[must_use]
    pub const fn new(reps: usize) -> Self {
        Self {
            reps,
            factors: Vec::new(),
            shuffled: true,
        }
    }

    /// Add a factor. A factor with the same name as an earlier one replaces
    /// it in place (last one wins).
    #[must_use]
    pub fn factor<V, I>(self, name: impl Into<String>, levels: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.with(Factor::new(name, levels))
    }

    /// Add a prebuilt factor, with the same replacement rule as
    /// [`DesignBuilder::factor`].
    #[must_use]
    pub fn with(mut self, factor: Factor) -> Self {
        match self.factors.iter_mut().find(|f| f.name == factor.name) {
            Some(existing) => *existing = factor,
            None => self.factors.push(factor),
        }
        self
    }

    /// Set whether the sequence is shuffled.
    #[must_use]
    pub const fn shuffled(mut self, shuffled: bool) -> Self {
        self.shuffled = shuffled;
        self
    }

    /// Build the `Design`.
    #[must_use]
    pub fn build(self) -> Design {
        Design {
            reps: self.reps,
            factors: self.factors,
            shuffled: self.shuffled,
        }
    }
}
