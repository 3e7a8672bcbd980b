//! IR Instructions
//!
//! Every instruction is one of four statements: an assignment, a jump, a
//! two-way branch or a return. The right-hand side of an assignment is an
//! [`Rvalue`] built from [`Operand`]s, which are either immediate values or
//! (possibly indexed) variable references.

use super::block::BlockId;
use super::var::VarId;
use cinder_bytecode::{Value, ValueError};

/// Instruction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

impl InstId {
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

impl std::fmt::Display for InstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Result lands in the state register rather than register 1
    pub fn produces_condition(&self) -> bool {
        self.is_comparison() || self.is_logical()
    }

    pub fn evaluate(&self, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
        match self {
            BinaryOp::Add => lhs.try_add(rhs),
            BinaryOp::Sub => lhs.try_sub(rhs),
            BinaryOp::Mul => lhs.try_mul(rhs),
            BinaryOp::Div => lhs.try_div(rhs),
            BinaryOp::Mod => lhs.try_rem(rhs),
            BinaryOp::Pow => lhs.try_pow(rhs),
            BinaryOp::BitAnd => lhs.bit_and(rhs),
            BinaryOp::BitOr => lhs.bit_or(rhs),
            BinaryOp::BitXor => lhs.bit_xor(rhs),
            BinaryOp::Shl => lhs.try_shl(rhs),
            BinaryOp::Shr => lhs.try_shr(rhs),
            BinaryOp::And => lhs.logical_and(rhs),
            BinaryOp::Or => lhs.logical_or(rhs),
            BinaryOp::Eq => lhs.equal(rhs),
            BinaryOp::Ne => lhs.not_equal(rhs),
            BinaryOp::Lt => lhs.less(rhs),
            BinaryOp::Le => lhs.less_equal(rhs),
            BinaryOp::Gt => lhs.greater(rhs),
            BinaryOp::Ge => lhs.greater_equal(rhs),
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn produces_condition(&self) -> bool {
        matches!(self, UnaryOp::Not)
    }

    pub fn evaluate(&self, operand: &Value) -> Result<Value, ValueError> {
        match self {
            UnaryOp::Neg => operand.try_neg(),
            UnaryOp::Not => operand.try_not(),
            UnaryOp::BitNot => operand.bit_not(),
        }
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        };
        write!(f, "{}", s)
    }
}

/// A variable reference with an optional index path
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub var: VarId,
    /// Each entry is an integer constant or an unindexed variable
    pub index: Vec<Operand>,
}

impl Place {
    pub fn new(var: VarId) -> Self {
        Self {
            var,
            index: Vec::new(),
        }
    }

    pub fn indexed(var: VarId, index: Vec<Operand>) -> Self {
        Self { var, index }
    }

    pub fn is_indexed(&self) -> bool {
        !self.index.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Const(Value),
    Var(Place),
}

impl Operand {
    pub fn var(var: VarId) -> Self {
        Operand::Var(Place::new(var))
    }

    pub fn as_const(&self) -> Option<&Value> {
        match self {
            Operand::Const(value) => Some(value),
            Operand::Var(_) => None,
        }
    }

    /// The variable of an unindexed reference
    pub fn as_plain_var(&self) -> Option<VarId> {
        match self {
            Operand::Var(place) if !place.is_indexed() => Some(place.var),
            _ => None,
        }
    }

    fn collect_uses(&self, out: &mut Vec<VarId>) {
        if let Operand::Var(place) = self {
            for index in &place.index {
                index.collect_uses(out);
            }
            out.push(place.var);
        }
    }

    fn visit_vars_mut(&mut self, f: &mut impl FnMut(&mut VarId)) {
        if let Operand::Var(place) = self {
            for index in &mut place.index {
                index.visit_vars_mut(f);
            }
            f(&mut place.var);
        }
    }

    fn visit_operands_mut(&mut self, in_index: bool, f: &mut impl FnMut(&mut Operand, bool)) {
        if let Operand::Var(place) = self {
            for index in &mut place.index {
                index.visit_operands_mut(true, f);
            }
        }
        f(self, in_index);
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Const(value)
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    /// Constant or variable reference
    Use(Operand),
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Unary {
        op: UnaryOp,
        operand: Operand,
    },
    Call {
        callee: String,
        args: Vec<Operand>,
    },
    /// Array literal
    Array(Vec<Operand>),
}

impl Rvalue {
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Rvalue::Use(op) => vec![op],
            Rvalue::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Rvalue::Unary { operand, .. } => vec![operand],
            Rvalue::Call { args, .. } => args.iter().collect(),
            Rvalue::Array(elements) => elements.iter().collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Rvalue::Use(op) => vec![op],
            Rvalue::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Rvalue::Unary { operand, .. } => vec![operand],
            Rvalue::Call { args, .. } => args.iter_mut().collect(),
            Rvalue::Array(elements) => elements.iter_mut().collect(),
        }
    }

    pub fn has_side_effects(&self) -> bool {
        matches!(self, Rvalue::Call { .. })
    }
}

/// IR instruction
#[derive(Debug, Clone, PartialEq)]
pub enum IrInstr {
    /// `dest = src`; an indexed destination updates one element in place
    Assign { dest: Place, src: Rvalue },

    /// Unconditional jump
    Jump(BlockId),

    /// Two-way branch on a truthy condition
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },

    /// Return from the function, optionally with a value
    Return(Option<Operand>),
}

impl IrInstr {
    pub fn assign(dest: VarId, src: Rvalue) -> Self {
        IrInstr::Assign {
            dest: Place::new(dest),
            src,
        }
    }

    /// Simple copy `dest = src`
    pub fn copy(dest: VarId, src: Operand) -> Self {
        IrInstr::assign(dest, Rvalue::Use(src))
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, IrInstr::Jump(_) | IrInstr::Branch { .. } | IrInstr::Return(_))
    }

    /// Explicit control-flow targets of this instruction
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            IrInstr::Jump(target) => vec![*target],
            IrInstr::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }

    /// Redirect every edge to `from` so it goes to `to`
    pub fn retarget(&mut self, from: BlockId, to: BlockId) {
        match self {
            IrInstr::Jump(target) if *target == from => *target = to,
            IrInstr::Branch {
                then_block,
                else_block,
                ..
            } => {
                if *then_block == from {
                    *then_block = to;
                }
                if *else_block == from {
                    *else_block = to;
                }
            }
            _ => {}
        }
    }

    /// Variable written as a whole by this instruction
    pub fn def_var(&self) -> Option<VarId> {
        match self {
            IrInstr::Assign { dest, .. } if !dest.is_indexed() => Some(dest.var),
            _ => None,
        }
    }

    pub fn def_var_mut(&mut self) -> Option<&mut VarId> {
        match self {
            IrInstr::Assign { dest, .. } if !dest.is_indexed() => Some(&mut dest.var),
            _ => None,
        }
    }

    /// Every variable read, once per operand site. An indexed destination
    /// reads its base variable.
    pub fn uses(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        match self {
            IrInstr::Assign { dest, src } => {
                for op in src.operands() {
                    op.collect_uses(&mut out);
                }
                for index in &dest.index {
                    index.collect_uses(&mut out);
                }
                if dest.is_indexed() {
                    out.push(dest.var);
                }
            }
            IrInstr::Branch { cond, .. } => cond.collect_uses(&mut out),
            IrInstr::Return(Some(value)) => value.collect_uses(&mut out),
            IrInstr::Return(None) | IrInstr::Jump(_) => {}
        }
        out
    }

    /// Visit every variable read, in the same order as [`IrInstr::uses`]
    pub fn visit_uses_mut(&mut self, mut f: impl FnMut(&mut VarId)) {
        match self {
            IrInstr::Assign { dest, src } => {
                for op in src.operands_mut() {
                    op.visit_vars_mut(&mut f);
                }
                for index in &mut dest.index {
                    index.visit_vars_mut(&mut f);
                }
                if dest.is_indexed() {
                    f(&mut dest.var);
                }
            }
            IrInstr::Branch { cond, .. } => cond.visit_vars_mut(&mut f),
            IrInstr::Return(Some(value)) => value.visit_vars_mut(&mut f),
            IrInstr::Return(None) | IrInstr::Jump(_) => {}
        }
    }

    /// Visit every operand, index operands included and innermost first.
    /// The flag tells whether the operand sits in an index path.
    pub fn visit_operands_mut(&mut self, mut f: impl FnMut(&mut Operand, bool)) {
        match self {
            IrInstr::Assign { dest, src } => {
                for op in src.operands_mut() {
                    op.visit_operands_mut(false, &mut f);
                }
                for index in &mut dest.index {
                    index.visit_operands_mut(true, &mut f);
                }
            }
            IrInstr::Branch { cond, .. } => cond.visit_operands_mut(false, &mut f),
            IrInstr::Return(Some(value)) => value.visit_operands_mut(false, &mut f),
            IrInstr::Return(None) | IrInstr::Jump(_) => {}
        }
    }

    /// Must never be removed even when its destination is unused
    pub fn has_side_effects(&self) -> bool {
        match self {
            IrInstr::Assign { dest, src } => dest.is_indexed() || src.has_side_effects(),
            IrInstr::Jump(_) | IrInstr::Branch { .. } | IrInstr::Return(_) => true,
        }
    }
}

/// An instruction slot in the arena
#[derive(Debug, Clone)]
pub struct Inst {
    pub kind: IrInstr,
    /// Block currently holding this instruction
    pub block: BlockId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: u32) -> VarId {
        VarId(id)
    }

    #[test]
    fn test_binary_op_classification() {
        assert!(BinaryOp::Lt.is_comparison());
        assert!(BinaryOp::And.is_logical());
        assert!(BinaryOp::Or.produces_condition());
        assert!(!BinaryOp::Add.produces_condition());
        assert!(UnaryOp::Not.produces_condition());
        assert!(!UnaryOp::Neg.produces_condition());
    }

    #[test]
    fn test_evaluate() {
        assert_eq!(
            BinaryOp::Add.evaluate(&Value::Int(1), &Value::Int(2)),
            Ok(Value::Int(3))
        );
        assert_eq!(
            BinaryOp::Le.evaluate(&Value::Int(3), &Value::Int(2)),
            Ok(Value::Int(0))
        );
        assert_eq!(UnaryOp::Neg.evaluate(&Value::Float(1.5)), Ok(Value::Float(-1.5)));
    }

    #[test]
    fn test_uses_count_every_site() {
        let instr = IrInstr::assign(
            v(0),
            Rvalue::Binary {
                op: BinaryOp::Add,
                lhs: Operand::var(v(1)),
                rhs: Operand::var(v(1)),
            },
        );
        assert_eq!(instr.uses(), vec![v(1), v(1)]);
        assert_eq!(instr.def_var(), Some(v(0)));
    }

    #[test]
    fn test_indexed_store_reads_its_base() {
        let instr = IrInstr::Assign {
            dest: Place::indexed(v(0), vec![Operand::var(v(2))]),
            src: Rvalue::Use(Operand::Const(Value::Int(1))),
        };
        assert_eq!(instr.uses(), vec![v(2), v(0)]);
        assert_eq!(instr.def_var(), None);
        assert!(instr.has_side_effects());
    }

    #[test]
    fn test_visit_uses_mut_matches_uses() {
        let mut instr = IrInstr::Assign {
            dest: Place::new(v(0)),
            src: Rvalue::Call {
                callee: "f".to_string(),
                args: vec![
                    Operand::Var(Place::indexed(v(1), vec![Operand::var(v(2))])),
                    Operand::Const(Value::Int(1)),
                ],
            },
        };
        let mut seen = Vec::new();
        instr.visit_uses_mut(|var| seen.push(*var));
        let mut expected = instr.uses();
        expected.sort();
        seen.sort();
        assert_eq!(seen, expected);
        assert!(instr.has_side_effects());
    }

    #[test]
    fn test_visit_operands_flags_index_paths() {
        let mut instr = IrInstr::Assign {
            dest: Place::indexed(v(0), vec![Operand::var(v(1))]),
            src: Rvalue::Use(Operand::Var(Place::indexed(v(2), vec![Operand::var(v(3))]))),
        };
        let mut seen = Vec::new();
        instr.visit_operands_mut(|op, in_index| seen.push((op.clone(), in_index)));
        assert_eq!(
            seen,
            vec![
                (Operand::var(v(3)), true),
                (Operand::Var(Place::indexed(v(2), vec![Operand::var(v(3))])), false),
                (Operand::var(v(1)), true),
            ]
        );
    }

    #[test]
    fn test_retarget() {
        let mut branch = IrInstr::Branch {
            cond: Operand::var(v(0)),
            then_block: BlockId(1),
            else_block: BlockId(2),
        };
        branch.retarget(BlockId(2), BlockId(7));
        assert_eq!(branch.targets(), vec![BlockId(1), BlockId(7)]);
    }
}
