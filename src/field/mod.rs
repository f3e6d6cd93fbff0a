//! C4/C5: per-field encode and decode strategies.
//!
//! One function pair per field shape, dispatched by the header schema
//! rather than by a class hierarchy — a tagged dispatch maps cleanly
//! onto our schema table, so there is no boxed-trait-object strategy
//! zoo here.

pub mod decode;
pub mod encode;

use crate::version::MinorVersion;

/// Everything a field encoder/decoder needs about the record it's
/// working on, bundled so call sites don't thread five parameters
/// through every helper.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext {
    pub n_alt_alleles: usize,
    pub max_ploidy: usize,
    pub n_samples: usize,
    pub version: MinorVersion,
}

impl FieldContext {
    pub fn n_alleles(&self) -> usize {
        self.n_alt_alleles + 1
    }
}
