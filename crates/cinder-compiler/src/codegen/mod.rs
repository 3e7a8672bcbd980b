//! Code Generation from IR to Bytecode
//!
//! Transforms phi-free IR into Cinder VM bytecode.
//!
//! # Pipeline
//!
//! ```text
//! IrProgram → BytecodeGenerator → BytecodeUnit → relocate → Program
//! ```
//!
//! Generation keeps one bytecode block per IR block, named after it, with
//! jump and call targets left symbolic. Every function additionally gets a
//! prologue block named after the function holding its `Func` marker and
//! one `Param` per parameter. [`relocate`] then lays the blocks out and
//! resolves every target to an absolute instruction index.
//!
//! # Registers
//!
//! Operands load into registers 1 and 2; comparison and logical results
//! land in the state register 0, everything else in register 1. Array
//! literals are assembled in register 2.

pub mod builtins;
mod relocate;

pub use relocate::{relocate, SymbolTable};

use crate::error::{CompileError, CompileResult};
use crate::ir::{
    BinaryOp, BlockId, IrArena, IrFunction, IrInstr, IrProgram, Operand, Place, Rvalue, UnaryOp,
};
use cinder_bytecode::{
    Argument, IndexEntry, Instruction, Opcode, Target, Value, LHS_REGISTER, RHS_REGISTER,
    STATE_REGISTER,
};

/// Instructions of one block, targets still symbolic
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeBlock {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl BytecodeBlock {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
        }
    }
}

/// A function's blocks in layout order; the first is its prologue
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeFunction {
    pub name: String,
    pub blocks: Vec<BytecodeBlock>,
}

impl BytecodeFunction {
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generated but not yet relocated code
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeUnit {
    /// Global initializers, laid out first
    pub globals: BytecodeBlock,
    pub functions: Vec<BytecodeFunction>,
}

/// Lowers IR instructions to bytecode
pub struct BytecodeGenerator<'a> {
    arena: &'a IrArena,
    /// Function being generated, for diagnostics
    function: String,
    /// Block being generated, for diagnostics
    block: String,
}

impl<'a> BytecodeGenerator<'a> {
    pub fn new(arena: &'a IrArena) -> Self {
        Self {
            arena,
            function: String::new(),
            block: String::new(),
        }
    }

    /// Generate code for the globals block and every function
    #[tracing::instrument(level = "debug", skip_all, fields(functions = program.functions.len()))]
    pub fn generate(&mut self, program: &IrProgram) -> CompileResult<BytecodeUnit> {
        self.function = crate::lower::GLOBALS_BLOCK.to_string();
        let globals = self.generate_block(program.globals)?;

        let mut functions = Vec::with_capacity(program.functions.len());
        for function in &program.functions {
            functions.push(self.generate_function(function)?);
        }

        tracing::debug!(
            globals = globals.instructions.len(),
            instructions = functions.iter().map(BytecodeFunction::len).sum::<usize>(),
            "generated bytecode"
        );
        Ok(BytecodeUnit { globals, functions })
    }

    fn generate_function(&mut self, function: &IrFunction) -> CompileResult<BytecodeFunction> {
        self.function = function.name.clone();
        self.block = function.name.clone();

        let mut prologue = BytecodeBlock::new(function.name.as_str());
        let params = u8::try_from(function.params.len())
            .map_err(|_| CompileError::TooManyParameters {
                name: function.name.clone(),
            })?;
        prologue.instructions.push(Instruction::Func { params });
        for &param in &function.params {
            prologue.instructions.push(Instruction::Param {
                name: self.arena.var(param).ssa_name(),
            });
        }

        let mut blocks = vec![prologue];
        for &block in &function.blocks {
            blocks.push(self.generate_block(block)?);
        }
        Ok(BytecodeFunction {
            name: function.name.clone(),
            blocks,
        })
    }

    fn generate_block(&mut self, block: BlockId) -> CompileResult<BytecodeBlock> {
        let data = self.arena.block(block);
        self.block = data.name.clone();
        if !data.phis.is_empty() {
            return Err(self.internal("phi reached code generation"));
        }

        let mut out = BytecodeBlock::new(data.name.as_str());
        for &inst in &data.insts {
            self.generate_instr(self.arena.instr(inst), &mut out.instructions)?;
        }
        Ok(out)
    }

    fn generate_instr(&self, instr: &IrInstr, out: &mut Vec<Instruction>) -> CompileResult<()> {
        match instr {
            IrInstr::Assign { dest, src } => self.generate_assign(dest, src, out)?,
            IrInstr::Jump(target) => out.push(Instruction::Jmp {
                target: self.label(*target),
            }),
            IrInstr::Branch {
                cond,
                then_block,
                else_block,
            } => {
                self.load(cond, STATE_REGISTER, out)?;
                out.push(Instruction::Jif {
                    then_target: self.label(*then_block),
                    else_target: self.label(*else_block),
                });
            }
            IrInstr::Return(value) => {
                if let Some(value) = value {
                    self.load(value, LHS_REGISTER, out)?;
                }
                out.push(Instruction::Ret);
            }
        }
        Ok(())
    }

    fn generate_assign(
        &self,
        dest: &Place,
        src: &Rvalue,
        out: &mut Vec<Instruction>,
    ) -> CompileResult<()> {
        match src {
            Rvalue::Use(Operand::Const(value)) => out.push(self.store_const(dest, value)?),
            Rvalue::Use(operand) => {
                self.load(operand, LHS_REGISTER, out)?;
                out.push(self.store(dest, LHS_REGISTER)?);
            }
            Rvalue::Binary { op, lhs, rhs } => {
                self.load(lhs, LHS_REGISTER, out)?;
                self.load(rhs, RHS_REGISTER, out)?;
                out.push(Instruction::Binary {
                    op: binary_opcode(*op),
                    lhs: LHS_REGISTER,
                    rhs: RHS_REGISTER,
                });
                let result = if op.produces_condition() {
                    STATE_REGISTER
                } else {
                    LHS_REGISTER
                };
                out.push(self.store(dest, result)?);
            }
            Rvalue::Unary { op, operand } => {
                self.load(operand, LHS_REGISTER, out)?;
                out.push(Instruction::Unary {
                    op: unary_opcode(*op),
                    reg: LHS_REGISTER,
                });
                let result = if op.produces_condition() {
                    STATE_REGISTER
                } else {
                    LHS_REGISTER
                };
                out.push(self.store(dest, result)?);
            }
            Rvalue::Array(elements) => {
                let literal = elements
                    .iter()
                    .map(|element| match element {
                        Operand::Const(value) => value.clone(),
                        Operand::Var(_) => Value::Absent,
                    })
                    .collect();
                out.push(Instruction::LoadA {
                    reg: RHS_REGISTER,
                    elements: literal,
                });
                for (position, element) in elements.iter().enumerate() {
                    if let Operand::Var(place) = element {
                        if place.is_indexed() {
                            return Err(self.internal("indexed array element"));
                        }
                        out.push(Instruction::LoadXA {
                            reg: RHS_REGISTER,
                            position: position as i64,
                            name: self.arena.var(place.var).ssa_name(),
                        });
                    }
                }
                out.push(self.store(dest, RHS_REGISTER)?);
            }
            Rvalue::Call { callee, args } => {
                out.push(Instruction::Call {
                    target: Target::Label(callee.clone()),
                });
                for arg in args {
                    let arg = match arg {
                        Operand::Const(value) => Argument::ByValue(value.clone()),
                        Operand::Var(place) => Argument::ByName {
                            name: self.arena.var(place.var).ssa_name(),
                            index: self.index_path(&place.index)?,
                        },
                    };
                    out.push(Instruction::Arg(arg));
                }
                out.push(self.store(dest, LHS_REGISTER)?);
            }
        }
        Ok(())
    }

    /// Load an operand into `reg`
    fn load(&self, operand: &Operand, reg: u8, out: &mut Vec<Instruction>) -> CompileResult<()> {
        let instruction = match operand {
            Operand::Const(Value::Int(value)) => Instruction::LoadI { reg, value: *value },
            Operand::Const(Value::Float(value)) => Instruction::LoadD { reg, value: *value },
            Operand::Const(Value::Text(value)) => Instruction::LoadS {
                reg,
                value: value.clone(),
            },
            Operand::Const(Value::Absent) => {
                return Err(self.internal("absent value loaded into a register"))
            }
            Operand::Var(place) => Instruction::LoadX {
                name: self.arena.var(place.var).ssa_name(),
                index: self.index_path(&place.index)?,
                reg,
            },
        };
        out.push(instruction);
        Ok(())
    }

    fn store(&self, dest: &Place, reg: u8) -> CompileResult<Instruction> {
        Ok(Instruction::StoreX {
            name: self.arena.var(dest.var).ssa_name(),
            index: self.index_path(&dest.index)?,
            reg,
        })
    }

    /// Store an immediate; typed stores only address whole slots
    fn store_const(&self, dest: &Place, value: &Value) -> CompileResult<Instruction> {
        let name = self.arena.var(dest.var).ssa_name();
        if dest.is_indexed() {
            return Ok(Instruction::StoreA {
                name,
                index: self.index_path(&dest.index)?,
                value: value.clone(),
            });
        }
        Ok(match value {
            Value::Int(value) => Instruction::StoreI { name, value: *value },
            Value::Float(value) => Instruction::StoreD { name, value: *value },
            Value::Text(value) => Instruction::StoreS {
                name,
                value: value.clone(),
            },
            Value::Absent => Instruction::StoreA {
                name,
                index: Vec::new(),
                value: Value::Absent,
            },
        })
    }

    fn index_path(&self, index: &[Operand]) -> CompileResult<Vec<IndexEntry>> {
        index
            .iter()
            .map(|entry| match entry {
                Operand::Const(Value::Int(i)) => Ok(IndexEntry::Int(*i)),
                Operand::Var(place) if !place.is_indexed() => {
                    Ok(IndexEntry::Name(self.arena.var(place.var).ssa_name()))
                }
                other => Err(self.internal(format!("invalid index entry {:?}", other))),
            })
            .collect()
    }

    fn label(&self, block: BlockId) -> Target {
        Target::Label(self.arena.block(block).name.clone())
    }

    fn internal(&self, message: impl Into<String>) -> CompileError {
        CompileError::internal(self.function.as_str(), self.block.as_str(), message)
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Pow => Opcode::Exp,
        BinaryOp::BitAnd => Opcode::Band,
        BinaryOp::BitOr => Opcode::Bor,
        BinaryOp::BitXor => Opcode::Bxor,
        BinaryOp::Shl => Opcode::Shl,
        BinaryOp::Shr => Opcode::Shr,
        BinaryOp::And => Opcode::Land,
        BinaryOp::Or => Opcode::Lor,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
    }
}

fn unary_opcode(op: UnaryOp) -> Opcode {
    match op {
        UnaryOp::Neg => Opcode::Neg,
        UnaryOp::Not => Opcode::Lnot,
        UnaryOp::BitNot => Opcode::Bnot,
    }
}

/// Generate and relocate `program`, entering at `entry`
pub fn generate(program: &IrProgram, entry: &str) -> CompileResult<cinder_bytecode::Program> {
    let unit = BytecodeGenerator::new(&program.arena).generate(program)?;
    let (program, _) = relocate(&unit, entry)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileContext;
    use crate::ir::IrVar;
    use crate::lower::GLOBALS_BLOCK;
    use pretty_assertions::assert_eq;

    struct Fixture {
        ctx: CompileContext,
        arena: IrArena,
        globals: BlockId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut ctx = CompileContext::new();
            let mut arena = IrArena::new();
            let globals = arena.new_named_block(&mut ctx, GLOBALS_BLOCK);
            Self { ctx, arena, globals }
        }

        fn var(&mut self, name: &str, version: u32) -> crate::ir::VarId {
            let mut var = IrVar::new(name, false, false);
            var.version = Some(version);
            self.arena.new_var(var)
        }

        fn program(self, functions: Vec<IrFunction>) -> IrProgram {
            IrProgram {
                arena: self.arena,
                globals: self.globals,
                functions,
            }
        }
    }

    #[test]
    fn test_comparison_stores_state_register() {
        let mut fx = Fixture::new();
        let a = fx.var("a", 0);
        let c = fx.var("c", 0);
        let entry = fx.arena.new_block(&mut fx.ctx);
        fx.arena.push_inst(
            entry,
            IrInstr::assign(
                c,
                Rvalue::Binary {
                    op: BinaryOp::Lt,
                    lhs: Operand::var(a),
                    rhs: Operand::Const(Value::Int(3)),
                },
            ),
        );
        fx.arena.push_inst(entry, IrInstr::Return(Some(Operand::var(c))));
        let mut f = IrFunction::new("f", vec![a]);
        f.blocks.push(entry);
        let program = fx.program(vec![f]);

        let unit = BytecodeGenerator::new(&program.arena).generate(&program).unwrap();
        let f = &unit.functions[0];
        assert_eq!(
            f.blocks[0].instructions,
            vec![
                Instruction::Func { params: 1 },
                Instruction::Param {
                    name: "a.0".to_string()
                },
            ]
        );
        assert_eq!(
            f.blocks[1].instructions,
            vec![
                Instruction::LoadX {
                    name: "a.0".to_string(),
                    index: vec![],
                    reg: LHS_REGISTER
                },
                Instruction::LoadI {
                    reg: RHS_REGISTER,
                    value: 3
                },
                Instruction::Binary {
                    op: Opcode::Lt,
                    lhs: LHS_REGISTER,
                    rhs: RHS_REGISTER
                },
                Instruction::StoreX {
                    name: "c.0".to_string(),
                    index: vec![],
                    reg: STATE_REGISTER
                },
                Instruction::LoadX {
                    name: "c.0".to_string(),
                    index: vec![],
                    reg: LHS_REGISTER
                },
                Instruction::Ret,
            ]
        );
    }

    #[test]
    fn test_array_literal_splices_variables() {
        let mut fx = Fixture::new();
        let x = fx.var("x", 0);
        let arr = fx.var("arr", 0);
        let entry = fx.arena.new_block(&mut fx.ctx);
        fx.arena.push_inst(
            entry,
            IrInstr::assign(
                arr,
                Rvalue::Array(vec![
                    Operand::Const(Value::Int(1)),
                    Operand::var(x),
                    Operand::Const(Value::from("s")),
                ]),
            ),
        );
        fx.arena.push_inst(entry, IrInstr::Return(None));
        let mut f = IrFunction::new("f", vec![x]);
        f.blocks.push(entry);
        let program = fx.program(vec![f]);

        let unit = BytecodeGenerator::new(&program.arena).generate(&program).unwrap();
        assert_eq!(
            unit.functions[0].blocks[1].instructions[..3],
            [
                Instruction::LoadA {
                    reg: RHS_REGISTER,
                    elements: vec![Value::Int(1), Value::Absent, Value::from("s")],
                },
                Instruction::LoadXA {
                    reg: RHS_REGISTER,
                    position: 1,
                    name: "x.0".to_string(),
                },
                Instruction::StoreX {
                    name: "arr.0".to_string(),
                    index: vec![],
                    reg: RHS_REGISTER,
                },
            ]
        );
    }

    #[test]
    fn test_indexed_constant_store_and_call_arguments() {
        let mut fx = Fixture::new();
        let arr = fx.var("arr", 0);
        let i = fx.var("i", 0);
        let t = fx.var("%t0", 0);
        let entry = fx.arena.new_block(&mut fx.ctx);
        fx.arena.push_inst(
            entry,
            IrInstr::Assign {
                dest: Place::indexed(arr, vec![Operand::Const(Value::Int(0)), Operand::var(i)]),
                src: Rvalue::Use(Operand::Const(Value::Int(7))),
            },
        );
        fx.arena.push_inst(
            entry,
            IrInstr::assign(
                t,
                Rvalue::Call {
                    callee: "print".to_string(),
                    args: vec![
                        Operand::Const(Value::Int(1)),
                        Operand::Var(Place::indexed(arr, vec![Operand::var(i)])),
                    ],
                },
            ),
        );
        fx.arena.push_inst(entry, IrInstr::Return(None));
        let mut f = IrFunction::new("f", vec![arr, i]);
        f.blocks.push(entry);
        let program = fx.program(vec![f]);

        let unit = BytecodeGenerator::new(&program.arena).generate(&program).unwrap();
        assert_eq!(
            unit.functions[0].blocks[1].instructions,
            vec![
                Instruction::StoreA {
                    name: "arr.0".to_string(),
                    index: vec![IndexEntry::Int(0), IndexEntry::Name("i.0".to_string())],
                    value: Value::Int(7),
                },
                Instruction::Call {
                    target: Target::Label("print".to_string())
                },
                Instruction::Arg(Argument::ByValue(Value::Int(1))),
                Instruction::Arg(Argument::ByName {
                    name: "arr.0".to_string(),
                    index: vec![IndexEntry::Name("i.0".to_string())],
                }),
                Instruction::StoreX {
                    name: "%t0.0".to_string(),
                    index: vec![],
                    reg: LHS_REGISTER,
                },
                Instruction::Ret,
            ]
        );
    }

    #[test]
    fn test_branch_loads_state_register() {
        let mut fx = Fixture::new();
        let c = fx.var("c", 0);
        let entry = fx.arena.new_block(&mut fx.ctx);
        let yes = fx.arena.new_block(&mut fx.ctx);
        let no = fx.arena.new_block(&mut fx.ctx);
        fx.arena.push_inst(
            entry,
            IrInstr::Branch {
                cond: Operand::var(c),
                then_block: yes,
                else_block: no,
            },
        );
        fx.arena.push_inst(yes, IrInstr::Return(Some(Operand::Const(Value::Int(1)))));
        fx.arena.push_inst(no, IrInstr::Jump(yes));
        let mut f = IrFunction::new("f", vec![c]);
        f.blocks = vec![entry, yes, no];
        let program = fx.program(vec![f]);

        let unit = BytecodeGenerator::new(&program.arena).generate(&program).unwrap();
        let blocks = &unit.functions[0].blocks;
        assert_eq!(
            blocks[1].instructions,
            vec![
                Instruction::LoadX {
                    name: "c.0".to_string(),
                    index: vec![],
                    reg: STATE_REGISTER
                },
                Instruction::Jif {
                    then_target: Target::Label("L1".to_string()),
                    else_target: Target::Label("L2".to_string()),
                },
            ]
        );
        assert_eq!(
            blocks[3].instructions,
            vec![Instruction::Jmp {
                target: Target::Label("L1".to_string())
            }]
        );
    }
}
