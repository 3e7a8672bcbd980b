//! Statement Lowering
//!
//! Control constructs follow a fixed block shape:
//!
//! - `if`: condition, then, else and merge blocks. The else block exists
//!   even when the source has no else branch.
//! - `while`: condition, body and exit blocks.
//! - `for`: init, condition, body, step and exit blocks. `continue` jumps to
//!   the step block.
//! - `switch`/`match`: one compare block per case chained through their
//!   false edges, plus a merge block.

use super::{IrGenerator, LoopFrame, PendingBreak};
use crate::ast::{Block, Expr, MatchArm, Pattern, Stmt, SwitchCase};
use crate::error::{CompileError, CompileResult};
use crate::ir::{BinaryOp, BlockId, IrInstr, Operand, Rvalue};
use cinder_bytecode::Value;

impl<'a> IrGenerator<'a> {
    pub(super) fn lower_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Expr { expr } => {
                self.lower_expr(expr)?;
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_ref())?,
            Stmt::While { cond, body } => self.lower_while(cond, body)?,
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.lower_for(init.as_ref(), cond.as_ref(), step.as_ref(), body)?,
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => self.lower_switch(scrutinee, cases, default.as_ref())?,
            Stmt::Match { scrutinee, arms } => self.lower_match(scrutinee, arms)?,
            Stmt::FuncDecl { name, .. } => {
                return Err(CompileError::NestedFunction { name: name.clone() })
            }
            Stmt::Break => {
                let frame = self.loops.last().copied().ok_or(CompileError::InvalidBreak)?;
                self.breaks.push(PendingBreak {
                    from: self.current,
                    header: frame.header,
                });
                self.start_unreachable();
            }
            Stmt::Continue => {
                let frame = self
                    .loops
                    .last()
                    .copied()
                    .ok_or(CompileError::InvalidContinue)?;
                self.jump(frame.continue_target);
                self.start_unreachable();
            }
            Stmt::Return { value } => {
                let value = value.as_ref().map(|v| self.lower_expr(v)).transpose()?;
                self.emit(IrInstr::Return(value));
                self.start_unreachable();
            }
            Stmt::Import { path } => {
                tracing::debug!(path = %path, "ignoring import");
            }
            Stmt::Block { body } => self.lower_block(body)?,
        }
        Ok(())
    }

    /// Open a block reached from the current one and continue there
    fn enter_new_block(&mut self) -> BlockId {
        let block = self.new_block();
        self.jump(block);
        self.switch_to(block);
        block
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &Block,
        else_branch: Option<&Block>,
    ) -> CompileResult<()> {
        self.enter_new_block();
        let cond = self.lower_expr(cond)?;
        let then_block = self.new_block();
        let else_block = self.new_block();
        self.branch(cond, then_block, else_block);

        self.switch_to(then_block);
        self.lower_block(then_branch)?;
        let then_end = self.current;

        self.switch_to(else_block);
        if let Some(else_branch) = else_branch {
            self.lower_block(else_branch)?;
        }
        let else_end = self.current;

        let merge = self.new_block();
        self.jump_from(then_end, merge);
        self.jump_from(else_end, merge);
        self.switch_to(merge);
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &Block) -> CompileResult<()> {
        let header = self.enter_new_block();
        let cond = self.lower_expr(cond)?;
        let body_block = self.new_block();
        let exit = self.new_block();
        self.branch(cond, body_block, exit);
        self.mark_loop(header, exit);

        self.loops.push(LoopFrame {
            header,
            continue_target: header,
        });
        self.switch_to(body_block);
        self.lower_block(body)?;
        self.jump(header);
        self.loops.pop();

        self.switch_to(exit);
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: Option<&Expr>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Block,
    ) -> CompileResult<()> {
        self.enter_new_block();
        if let Some(init) = init {
            self.lower_expr(init)?;
        }

        let header = self.enter_new_block();
        let cond = match cond {
            Some(cond) => self.lower_expr(cond)?,
            None => Operand::Const(Value::Int(1)),
        };
        let body_block = self.new_block();
        let step_block = self.new_block();
        let exit = self.new_block();
        self.branch(cond, body_block, exit);
        self.mark_loop(header, exit);

        self.loops.push(LoopFrame {
            header,
            continue_target: step_block,
        });
        self.switch_to(body_block);
        self.lower_block(body)?;
        self.jump(step_block);
        self.loops.pop();

        self.switch_to(step_block);
        if let Some(step) = step {
            self.lower_expr(step)?;
        }
        self.jump(header);

        self.switch_to(exit);
        Ok(())
    }

    fn mark_loop(&mut self, header: BlockId, exit: BlockId) {
        self.arena.block_mut(header).loop_end = Some(exit);
        self.arena.block_mut(exit).loop_start = Some(header);
    }

    /// Evaluate a scrutinee once into something cheap to compare repeatedly
    fn lower_scrutinee(&mut self, scrutinee: &Expr) -> CompileResult<Operand> {
        let value = self.lower_expr(scrutinee)?;
        if value.as_const().is_some() || value.as_plain_var().is_some() {
            return Ok(value);
        }
        let temp = self.new_temp();
        self.emit(IrInstr::copy(temp, value));
        Ok(Operand::var(temp))
    }

    /// Lower one `scrutinee == value` test and its body. Returns the block
    /// the body ended in; lowering continues in the test's false edge.
    fn lower_case(
        &mut self,
        scrutinee: &Operand,
        value: &Expr,
        body: &Block,
    ) -> CompileResult<BlockId> {
        self.enter_new_block();
        let value = self.lower_expr(value)?;
        let test = self.new_temp();
        self.emit(IrInstr::assign(
            test,
            Rvalue::Binary {
                op: BinaryOp::Eq,
                lhs: scrutinee.clone(),
                rhs: value,
            },
        ));
        let case_block = self.new_block();
        let next = self.new_block();
        self.branch(Operand::var(test), case_block, next);

        self.switch_to(case_block);
        self.lower_block(body)?;
        let end = self.current;
        self.switch_to(next);
        Ok(end)
    }

    fn finish_cases(&mut self, ends: Vec<BlockId>) {
        let merge = self.new_block();
        for end in ends {
            self.jump_from(end, merge);
        }
        self.jump(merge);
        self.switch_to(merge);
    }

    fn lower_switch(
        &mut self,
        scrutinee: &Expr,
        cases: &[SwitchCase],
        default: Option<&Block>,
    ) -> CompileResult<()> {
        let scrutinee = self.lower_scrutinee(scrutinee)?;
        let mut ends = Vec::with_capacity(cases.len());
        for case in cases {
            ends.push(self.lower_case(&scrutinee, &case.value, &case.body)?);
        }
        if let Some(default) = default {
            self.lower_block(default)?;
        }
        self.finish_cases(ends);
        Ok(())
    }

    fn lower_match(&mut self, scrutinee: &Expr, arms: &[MatchArm]) -> CompileResult<()> {
        let scrutinee = self.lower_scrutinee(scrutinee)?;
        let mut ends = Vec::with_capacity(arms.len());
        for (position, arm) in arms.iter().enumerate() {
            match &arm.pattern {
                Pattern::Literal { value } => {
                    ends.push(self.lower_case(&scrutinee, value, &arm.body)?);
                }
                Pattern::Wildcard => {
                    if position + 1 < arms.len() {
                        tracing::debug!(skipped = arms.len() - position - 1, "arms after wildcard");
                    }
                    self.lower_block(&arm.body)?;
                    break;
                }
            }
        }
        self.finish_cases(ends);
        Ok(())
    }
}
