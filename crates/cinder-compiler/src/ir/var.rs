//! IR Variables
//!
//! Before SSA construction one `IrVar` stands for a source variable (one
//! per declaration) or a compiler temporary. Renaming creates a fresh
//! `IrVar` per definition, each carrying a version number.

use super::block::BlockId;
use super::instr::InstId;

/// Variable identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl VarId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Where a variable is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseSite {
    /// An operand of an instruction
    Inst(InstId),
    /// An argument of a phi in the given block
    Phi(BlockId),
}

#[derive(Debug, Clone)]
pub struct IrVar {
    /// Source name or generated temporary name
    pub name: String,
    /// SSA version, assigned by renaming
    pub version: Option<u32>,
    /// Assignments writing this variable; one after SSA renaming
    pub defs: Vec<InstId>,
    /// One entry per operand site reading this variable
    pub uses: Vec<UseSite>,
    /// Compiler-synthesized temporary
    pub is_generated: bool,
    /// Global variable; never renamed and not tracked in def-use chains
    pub is_global: bool,
}

impl IrVar {
    pub fn new(name: impl Into<String>, is_generated: bool, is_global: bool) -> Self {
        Self {
            name: name.into(),
            version: None,
            defs: Vec::new(),
            uses: Vec::new(),
            is_generated,
            is_global,
        }
    }

    /// Storage slot name used in bytecode. Versions are joined with `.`,
    /// which no identifier can contain.
    pub fn ssa_name(&self) -> String {
        match self.version {
            Some(version) => format!("{}.{}", self.name, version),
            None => self.name.clone(),
        }
    }

    /// The unique defining assignment, if there is exactly one
    pub fn def(&self) -> Option<InstId> {
        match self.defs.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn is_used(&self) -> bool {
        !self.uses.is_empty()
    }

    /// Remove one recorded use at `site`
    pub fn kill_use(&mut self, site: UseSite) -> bool {
        match self.uses.iter().position(|u| *u == site) {
            Some(pos) => {
                self.uses.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove one recorded definition
    pub fn kill_def(&mut self, inst: InstId) -> bool {
        match self.defs.iter().position(|d| *d == inst) {
            Some(pos) => {
                self.defs.remove(pos);
                true
            }
            None => false,
        }
    }
}
