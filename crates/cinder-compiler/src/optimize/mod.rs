//! IR Optimization Passes
//!
//! Runs on SSA form produced by [`crate::ssa`]. Phi elimination always runs
//! since bytecode has no phis; constant folding and dead-code elimination
//! are controlled by [`OptLevel`] and repeat until neither changes anything.

mod constant_fold;
mod dce;
mod phi_elim;

pub use constant_fold::ConstantFolder;
pub use dce::DeadCodeEliminator;
pub use phi_elim::PhiEliminator;

use crate::context::CompileContext;
use crate::error::CompileResult;
use crate::ir::IrProgram;
use serde::{Deserialize, Serialize};

/// Optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    /// Leave SSA form without optimizing
    None,
    /// Constant folding and propagation, dead-code elimination
    #[default]
    Basic,
}

/// Optimizer that runs multiple passes over the IR
pub struct Optimizer {
    level: OptLevel,
}

impl Optimizer {
    /// Create a new optimizer with the given level
    pub fn new(level: OptLevel) -> Self {
        Self { level }
    }

    /// Create an optimizer with basic optimizations
    pub fn basic() -> Self {
        Self::new(OptLevel::Basic)
    }

    /// Create an optimizer that only eliminates phis
    pub fn none() -> Self {
        Self::new(OptLevel::None)
    }

    pub fn level(&self) -> OptLevel {
        self.level
    }

    /// Take `program` out of SSA form and optimize it
    #[tracing::instrument(level = "debug", skip_all, fields(level = ?self.level))]
    pub fn optimize(
        &self,
        program: &mut IrProgram,
        ctx: &mut CompileContext,
    ) -> CompileResult<OptStats> {
        let mut stats = OptStats::default();

        let phis = PhiEliminator::new().eliminate(program, ctx)?;
        stats.edges_split = phis.edges_split;
        stats.copies_inserted = phis.copies_inserted;

        if self.level == OptLevel::None {
            return Ok(stats);
        }

        let folder = ConstantFolder::new();
        let dce = DeadCodeEliminator::new();
        loop {
            let folded = folder.fold(program);
            let removed = dce.eliminate(program);
            stats.constants_folded += folded;
            stats.dead_instructions_removed += removed;
            if folded == 0 && removed == 0 {
                break;
            }
        }

        tracing::debug!(
            folded = stats.constants_folded,
            removed = stats.dead_instructions_removed,
            split = stats.edges_split,
            "optimized program"
        );
        Ok(stats)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::basic()
    }
}

/// Statistics about optimizations performed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptStats {
    /// Critical edges split to hold phi copies
    pub edges_split: usize,
    /// Copies inserted by phi elimination, saves included
    pub copies_inserted: usize,
    /// Instructions rewritten by folding or propagation
    pub constants_folded: usize,
    /// Number of dead instructions eliminated
    pub dead_instructions_removed: usize,
}
