//! Syntax Tree to IR Lowering
//!
//! Lowering runs in two passes. The first registers every top-level function
//! and global variable so bodies may refer to declarations that come later.
//! The second lowers global initializers into a synthetic `global_var_decl`
//! block and then each function body into its own set of basic blocks.
//!
//! Every CFG edge is made explicit: a block that continues elsewhere ends in
//! a `Jump`, so the layout order of blocks never matters to control flow.

mod cleanup;
mod expr;
mod stmt;

use crate::ast::{Block, Expr, Stmt, Tree};
use crate::codegen::builtins;
use crate::context::CompileContext;
use crate::error::{CompileError, CompileResult};
use crate::ir::{BlockId, IrArena, IrFunction, IrInstr, IrProgram, IrVar, Operand, VarId};
use rustc_hash::FxHashMap;

/// Label of the block holding global initializers
pub const GLOBALS_BLOCK: &str = "global_var_decl";

/// Maximum number of parameters a `Func` marker can describe
const MAX_PARAMS: usize = u8::MAX as usize;

/// Reject names outside `[A-Za-z_][A-Za-z0-9_]*`. Compiler temporaries and
/// versioned slots use characters this excludes.
fn check_identifier(name: &str) -> CompileResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CompileError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Active loop, innermost last
#[derive(Debug, Clone, Copy)]
struct LoopFrame {
    /// Block carrying the loop's `loop_end` marker
    header: BlockId,
    /// Block a `continue` jumps to
    continue_target: BlockId,
}

/// A `break` waiting for its loop exit to settle
#[derive(Debug, Clone, Copy)]
struct PendingBreak {
    from: BlockId,
    header: BlockId,
}

/// Lowers one syntax tree into an [`IrProgram`]
pub struct IrGenerator<'a> {
    ctx: &'a mut CompileContext,
    arena: IrArena,
    /// Top-level variables, visible everywhere
    globals: FxHashMap<String, VarId>,
    /// User functions and their parameter counts
    functions: FxHashMap<String, usize>,
    /// Function-level variables; `None` while lowering global initializers
    locals: Option<FxHashMap<String, VarId>>,
    /// Name of the function being lowered, for diagnostics
    function_name: String,
    /// Blocks of the function being lowered, in creation order
    blocks: Vec<BlockId>,
    current: BlockId,
    loops: Vec<LoopFrame>,
    breaks: Vec<PendingBreak>,
}

impl<'a> IrGenerator<'a> {
    pub fn new(ctx: &'a mut CompileContext) -> Self {
        let mut arena = IrArena::new();
        let globals_block = arena.new_named_block(ctx, GLOBALS_BLOCK);
        Self {
            ctx,
            arena,
            globals: FxHashMap::default(),
            functions: FxHashMap::default(),
            locals: None,
            function_name: GLOBALS_BLOCK.to_string(),
            blocks: Vec::new(),
            current: globals_block,
            loops: Vec::new(),
            breaks: Vec::new(),
        }
    }

    /// Lower a whole tree, consuming the generator
    #[tracing::instrument(level = "debug", skip_all, fields(stmts = tree.stmts.len()))]
    pub fn generate(mut self, tree: &Tree) -> CompileResult<IrProgram> {
        self.declare_top_level(tree)?;

        let globals_block = self.current;
        for stmt in &tree.stmts {
            match stmt {
                Stmt::Expr { expr } => {
                    self.lower_expr(expr)?;
                }
                Stmt::Import { path } => {
                    tracing::debug!(path = %path, "ignoring import");
                }
                _ => {}
            }
        }
        cleanup::simplify(&mut self.arena, &[globals_block]);

        let mut functions = Vec::new();
        for stmt in &tree.stmts {
            if let Stmt::FuncDecl { name, params, body } = stmt {
                functions.push(self.lower_function(name, params, body)?);
            }
        }

        tracing::debug!(
            functions = functions.len(),
            globals = self.globals.len(),
            blocks = self.arena.block_count(),
            "lowered syntax tree"
        );
        Ok(IrProgram {
            arena: self.arena,
            globals: globals_block,
            functions,
        })
    }

    /// First pass: register functions and global variables by name
    fn declare_top_level(&mut self, tree: &Tree) -> CompileResult<()> {
        for stmt in &tree.stmts {
            match stmt {
                Stmt::FuncDecl { name, params, .. } => {
                    check_identifier(name)?;
                    for param in params {
                        check_identifier(param)?;
                    }
                    if self.globals.contains_key(name) {
                        return Err(CompileError::DuplicateDefinition {
                            name: name.clone(),
                            previous: "variable",
                        });
                    }
                    if self.functions.contains_key(name) || builtins::is_builtin(name) {
                        return Err(CompileError::DuplicateDefinition {
                            name: name.clone(),
                            previous: "function",
                        });
                    }
                    if params.len() > MAX_PARAMS {
                        return Err(CompileError::TooManyParameters { name: name.clone() });
                    }
                    self.functions.insert(name.clone(), params.len());
                }
                Stmt::Expr { expr } => {
                    if let Expr::Assign { target, .. } = expr {
                        if let Expr::Ident { name } = target.as_ref() {
                            self.declare_global(name)?;
                        }
                    }
                }
                Stmt::Import { .. } => {}
                other => {
                    return Err(CompileError::UnexpectedTopLevel {
                        kind: other.kind_name(),
                    })
                }
            }
        }
        Ok(())
    }

    fn declare_global(&mut self, name: &str) -> CompileResult<VarId> {
        check_identifier(name)?;
        if self.functions.contains_key(name) || builtins::is_builtin(name) {
            return Err(CompileError::DuplicateDefinition {
                name: name.to_string(),
                previous: "function",
            });
        }
        if let Some(var) = self.globals.get(name) {
            return Ok(*var);
        }
        let var = self.arena.new_var(IrVar::new(name, false, true));
        self.globals.insert(name.to_string(), var);
        Ok(var)
    }

    #[tracing::instrument(level = "debug", skip(self, params, body), fields(params = params.len()))]
    fn lower_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &Block,
    ) -> CompileResult<IrFunction> {
        self.function_name = name.to_string();
        self.blocks.clear();
        self.loops.clear();
        self.breaks.clear();

        let mut locals = FxHashMap::default();
        let mut param_vars = Vec::with_capacity(params.len());
        for param in params {
            let var = self.arena.new_var(IrVar::new(param.as_str(), false, false));
            locals.insert(param.clone(), var);
            param_vars.push(var);
        }
        self.locals = Some(locals);

        let entry = self.new_block();
        self.current = entry;
        self.lower_block(body)?;
        let tail = self.arena.block(self.current);
        if self.current != entry && tail.is_empty() && tail.preds.is_empty() {
            // leftover block opened after a final return
            let current = self.current;
            self.blocks.retain(|b| *b != current);
        } else if !self.arena.is_terminated(self.current) {
            self.emit(IrInstr::Return(None));
        }
        self.resolve_breaks()?;

        cleanup::simplify(&mut self.arena, &self.blocks);
        self.locals = None;

        tracing::trace!(blocks = self.blocks.len(), "lowered function body");
        let mut function = IrFunction::new(name, param_vars);
        function.blocks = std::mem::take(&mut self.blocks);
        Ok(function)
    }

    // ===== Blocks and edges =====

    fn new_block(&mut self) -> BlockId {
        let block = self.arena.new_block(self.ctx);
        self.blocks.push(block);
        block
    }

    fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    fn emit(&mut self, instr: IrInstr) {
        self.arena.push_inst(self.current, instr);
    }

    /// End `from` with a jump to `to` unless it already transfers control
    fn jump_from(&mut self, from: BlockId, to: BlockId) {
        if !self.arena.is_terminated(from) {
            self.arena.push_inst(from, IrInstr::Jump(to));
            self.arena.add_edge(from, to);
        }
    }

    fn jump(&mut self, to: BlockId) {
        self.jump_from(self.current, to);
    }

    fn branch(&mut self, cond: Operand, then_block: BlockId, else_block: BlockId) {
        let from = self.current;
        self.emit(IrInstr::Branch {
            cond,
            then_block,
            else_block,
        });
        self.arena.add_edge(from, then_block);
        self.arena.add_edge(from, else_block);
    }

    /// Continue lowering in a block nothing jumps to
    fn start_unreachable(&mut self) {
        let block = self.new_block();
        self.switch_to(block);
    }

    /// Point every `break` at the first block that does real work after
    /// its loop, skipping blocks that only jump onward
    fn resolve_breaks(&mut self) -> CompileResult<()> {
        let breaks = std::mem::take(&mut self.breaks);
        for pending in breaks {
            let exit = self.arena.block(pending.header).loop_end.ok_or_else(|| {
                self.internal(pending.header, "loop header without a loop exit")
            })?;
            let target = self.forward_exit(exit)?;
            self.jump_from(pending.from, target);
        }
        Ok(())
    }

    fn forward_exit(&self, exit: BlockId) -> CompileResult<BlockId> {
        let mut target = exit;
        let mut visited = Vec::new();
        loop {
            let block = self.arena.block(target);
            let only_jumps = block
                .insts
                .iter()
                .all(|inst| matches!(self.arena.instr(*inst), IrInstr::Jump(_)));
            if !only_jumps {
                return Ok(target);
            }
            match block.succs.as_slice() {
                [next] => {
                    visited.push(target);
                    if visited.contains(next) {
                        return Err(self.internal(target, "loop exit forwards into a cycle"));
                    }
                    target = *next;
                }
                [] => return Ok(target),
                _ => return Err(self.internal(target, "empty loop exit with several successors")),
            }
        }
    }

    // ===== Names =====

    fn lookup(&self, name: &str) -> CompileResult<VarId> {
        if let Some(var) = self.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Ok(*var);
        }
        if let Some(var) = self.globals.get(name) {
            return Ok(*var);
        }
        if self.functions.contains_key(name) || builtins::is_builtin(name) {
            return Err(CompileError::NotAVariable {
                name: name.to_string(),
            });
        }
        Err(CompileError::UndefinedIdentifier {
            name: name.to_string(),
        })
    }

    /// Resolve an assignment target, declaring it when it is new
    fn resolve_target(&mut self, name: &str) -> CompileResult<VarId> {
        match self.lookup(name) {
            Err(CompileError::UndefinedIdentifier { .. }) => match self.locals.as_mut() {
                Some(locals) => {
                    check_identifier(name)?;
                    let var = self.arena.new_var(IrVar::new(name, false, false));
                    locals.insert(name.to_string(), var);
                    Ok(var)
                }
                None => self.declare_global(name),
            },
            result => result,
        }
    }

    fn new_temp(&mut self) -> VarId {
        let name = self.ctx.next_temp();
        self.arena.new_var(IrVar::new(name, true, false))
    }

    fn internal(&self, block: BlockId, message: &str) -> CompileError {
        CompileError::internal(
            self.function_name.as_str(),
            self.arena.block(block).name.as_str(),
            message,
        )
    }
}

/// Lower a syntax tree with a fresh generator
pub fn generate(tree: &Tree, ctx: &mut CompileContext) -> CompileResult<IrProgram> {
    IrGenerator::new(ctx).generate(tree)
}
