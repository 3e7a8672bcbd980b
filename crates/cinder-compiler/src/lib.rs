//! Cinder Compiler - Syntax Tree to Bytecode
//!
//! This crate lowers a syntax tree into an arena-backed IR, converts it to
//! SSA form, optimizes it and generates relocated bytecode for the Cinder VM.
//!
//! # Pipeline
//!
//! ```text
//! Tree → lower → IrProgram → ssa → optimize → codegen → relocate → Program → bytes
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod context;
pub mod error;
pub mod ir;
pub mod lower;
pub mod optimize;
pub mod ssa;

pub use ast::Tree;
pub use codegen::{BytecodeGenerator, BytecodeUnit, SymbolTable};
pub use config::CompileOptions;
pub use context::CompileContext;
pub use error::{CompileError, CompileResult};
pub use ir::{IrProgram, PrettyPrint};
pub use optimize::{OptLevel, OptStats, Optimizer};
pub use ssa::SsaStats;

// Re-export bytecode types for convenience
pub use cinder_bytecode::{verify_program, Header, Instruction, Program};

/// Main compiler entry point
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Lower, optimize and relocate `tree`
    #[tracing::instrument(level = "debug", skip_all, fields(entry = %self.options.entry))]
    pub fn compile(&self, tree: &Tree) -> CompileResult<Program> {
        let mut ctx = CompileContext::new();
        let ir = self.compile_ir(tree, &mut ctx)?;

        let unit = BytecodeGenerator::new(&ir.arena).generate(&ir)?;
        let (program, symbols) = codegen::relocate(&unit, &self.options.entry)?;
        if self.options.verify {
            verify_program(&program)?;
        }

        tracing::debug!(
            instructions = program.instructions.len(),
            functions = symbols.function_ends.len(),
            "compiled program"
        );
        Ok(program)
    }

    /// Run every IR stage and return the phi-free, optimized IR
    pub fn compile_ir(&self, tree: &Tree, ctx: &mut CompileContext) -> CompileResult<IrProgram> {
        let mut ir = lower::generate(tree, ctx)?;
        let ssa = ssa::build(&mut ir)?;
        let opt = Optimizer::new(self.options.opt_level).optimize(&mut ir, ctx)?;
        tracing::debug!(
            phis = ssa.phis_inserted,
            unreachable = ssa.unreachable_blocks_removed,
            folded = opt.constants_folded,
            removed = opt.dead_instructions_removed,
            "optimized IR"
        );
        tracing::trace!(ir = %ir.dump(), "final IR");
        Ok(ir)
    }

    /// Compile `tree` straight to the binary format
    pub fn compile_to_bytes(&self, tree: &Tree) -> CompileResult<Vec<u8>> {
        Ok(self.compile(tree)?.encode()?)
    }

    /// Compile a JSON-encoded syntax tree to the binary format
    pub fn compile_json(&self, json: &str) -> CompileResult<Vec<u8>> {
        let tree = Tree::from_json(json)?;
        self.compile_to_bytes(&tree)
    }
}

/// Compile `tree` with default options
pub fn compile(tree: &Tree) -> CompileResult<Program> {
    Compiler::default().compile(tree)
}
