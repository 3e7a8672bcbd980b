//! Expression Lowering
//!
//! Each expression lowers to an [`Operand`]: literals stay immediate,
//! identifiers and index expressions become variable references, and every
//! computation is assigned to a fresh temporary whose reference is returned.

use super::IrGenerator;
use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::codegen::builtins;
use crate::error::{CompileError, CompileResult};
use crate::ir::{BinaryOp, IrInstr, Operand, Place, Rvalue, UnaryOp};
use cinder_bytecode::Value;

impl<'a> IrGenerator<'a> {
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> CompileResult<Operand> {
        match expr {
            Expr::Int { value } => Ok(Operand::Const(Value::Int(*value))),
            Expr::Float { value } => Ok(Operand::Const(Value::Float(*value))),
            Expr::Str { value } => Ok(Operand::Const(Value::Text(value.clone()))),
            Expr::Ident { name } => Ok(Operand::var(self.lookup(name)?)),
            Expr::Index { name, index } => Ok(Operand::Var(self.lower_place(name, index)?)),
            Expr::Array { elements } => self.lower_array(elements),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                let op = binary_op(*op);
                Ok(self.assign_temp(Rvalue::Binary { op, lhs, rhs }))
            }
            Expr::Unary { op, operand } => self.lower_unary(*op, operand),
            Expr::Assign { target, value } => self.lower_assign(target, value),
            Expr::Call { callee, args } => self.lower_call(callee, args),
        }
    }

    /// Assign `src` to a new temporary and reference it
    fn assign_temp(&mut self, src: Rvalue) -> Operand {
        let temp = self.new_temp();
        self.emit(IrInstr::assign(temp, src));
        Operand::var(temp)
    }

    /// Force an operand into something an index path or array slot can hold
    fn materialize(&mut self, operand: Operand) -> Operand {
        if matches!(&operand, Operand::Var(place) if place.is_indexed()) {
            self.assign_temp(Rvalue::Use(operand))
        } else {
            operand
        }
    }

    fn lower_place(&mut self, name: &str, index: &[Expr]) -> CompileResult<Place> {
        let base = self.lookup(name)?;
        let mut path = Vec::with_capacity(index.len());
        for entry in index {
            let operand = self.lower_expr(entry)?;
            let operand = match operand {
                Operand::Const(Value::Int(_)) => operand,
                Operand::Const(other) => {
                    return Err(CompileError::InvalidIndex {
                        name: name.to_string(),
                        index: other.to_string(),
                    })
                }
                Operand::Var(_) => self.materialize(operand),
            };
            path.push(operand);
        }
        Ok(Place::indexed(base, path))
    }

    fn lower_array(&mut self, elements: &[Expr]) -> CompileResult<Operand> {
        let mut operands = Vec::with_capacity(elements.len());
        for element in elements {
            let operand = self.lower_expr(element)?;
            operands.push(self.materialize(operand));
        }
        Ok(self.assign_temp(Rvalue::Array(operands)))
    }

    fn lower_unary(&mut self, op: UnaryOperator, operand: &Expr) -> CompileResult<Operand> {
        let (step, postfix) = match op {
            UnaryOperator::Neg | UnaryOperator::Not | UnaryOperator::BitNot => {
                let operand = self.lower_expr(operand)?;
                let op = match op {
                    UnaryOperator::Neg => UnaryOp::Neg,
                    UnaryOperator::Not => UnaryOp::Not,
                    _ => UnaryOp::BitNot,
                };
                return Ok(self.assign_temp(Rvalue::Unary { op, operand }));
            }
            UnaryOperator::PreInc => (BinaryOp::Add, false),
            UnaryOperator::PreDec => (BinaryOp::Sub, false),
            UnaryOperator::PostInc => (BinaryOp::Add, true),
            UnaryOperator::PostDec => (BinaryOp::Sub, true),
        };

        let place = match operand {
            Expr::Ident { name } => Place::new(self.lookup(name)?),
            Expr::Index { name, index } => self.lower_place(name, index)?,
            other => {
                return Err(CompileError::InvalidAssignTarget {
                    target: other.kind_name().to_string(),
                })
            }
        };

        let previous = if postfix {
            Some(self.assign_temp(Rvalue::Use(Operand::Var(place.clone()))))
        } else {
            None
        };
        self.emit(IrInstr::Assign {
            dest: place.clone(),
            src: Rvalue::Binary {
                op: step,
                lhs: Operand::Var(place.clone()),
                rhs: Operand::Const(Value::Int(1)),
            },
        });
        Ok(previous.unwrap_or(Operand::Var(place)))
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> CompileResult<Operand> {
        let value = self.lower_expr(value)?;
        let dest = match target {
            Expr::Ident { name } => Place::new(self.resolve_target(name)?),
            Expr::Index { name, index } => self.lower_place(name, index)?,
            other => {
                return Err(CompileError::InvalidAssignTarget {
                    target: other.kind_name().to_string(),
                })
            }
        };
        self.emit(IrInstr::Assign {
            dest: dest.clone(),
            src: Rvalue::Use(value),
        });
        Ok(Operand::Var(dest))
    }

    fn lower_call(&mut self, callee: &str, args: &[Expr]) -> CompileResult<Operand> {
        match self.functions.get(callee) {
            Some(&expected) if expected != args.len() => {
                return Err(CompileError::ArityMismatch {
                    name: callee.to_string(),
                    expected,
                    found: args.len(),
                })
            }
            Some(_) => {}
            None if builtins::is_builtin(callee) => {}
            None => {
                return Err(CompileError::UndefinedFunction {
                    name: callee.to_string(),
                })
            }
        }

        let mut operands = Vec::with_capacity(args.len());
        for arg in args {
            operands.push(self.lower_expr(arg)?);
        }
        Ok(self.assign_temp(Rvalue::Call {
            callee: callee.to_string(),
            args: operands,
        }))
    }
}

fn binary_op(op: BinaryOperator) -> BinaryOp {
    match op {
        BinaryOperator::Add => BinaryOp::Add,
        BinaryOperator::Sub => BinaryOp::Sub,
        BinaryOperator::Mul => BinaryOp::Mul,
        BinaryOperator::Div => BinaryOp::Div,
        BinaryOperator::Mod => BinaryOp::Mod,
        BinaryOperator::Pow => BinaryOp::Pow,
        BinaryOperator::BitAnd => BinaryOp::BitAnd,
        BinaryOperator::BitOr => BinaryOp::BitOr,
        BinaryOperator::BitXor => BinaryOp::BitXor,
        BinaryOperator::Shl => BinaryOp::Shl,
        BinaryOperator::Shr => BinaryOp::Shr,
        BinaryOperator::And => BinaryOp::And,
        BinaryOperator::Or => BinaryOp::Or,
        BinaryOperator::Eq => BinaryOp::Eq,
        BinaryOperator::Ne => BinaryOp::Ne,
        BinaryOperator::Lt => BinaryOp::Lt,
        BinaryOperator::Le => BinaryOp::Le,
        BinaryOperator::Gt => BinaryOp::Gt,
        BinaryOperator::Ge => BinaryOp::Ge,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Stmt, Tree, UnaryOperator};
    use crate::context::CompileContext;
    use crate::error::CompileError;
    use crate::ir::{IrInstr, IrProgram, Operand, Rvalue};
    use crate::lower::generate;
    use cinder_bytecode::Value;

    fn lower_main(body: Vec<Stmt>) -> Result<IrProgram, CompileError> {
        let mut ctx = CompileContext::new();
        generate(&Tree::new(vec![Stmt::func("main", &["a"], body)]), &mut ctx)
    }

    fn entry_instrs(program: &IrProgram) -> Vec<IrInstr> {
        let entry = program.functions[0].blocks[0];
        program
            .arena
            .block(entry)
            .insts
            .iter()
            .map(|inst| program.arena.instr(*inst).clone())
            .collect()
    }

    #[test]
    fn test_postfix_increment_yields_previous_value() {
        let program = lower_main(vec![
            Stmt::expr(Expr::assign(Expr::ident("i"), Expr::int(0))),
            Stmt::expr(Expr::assign(
                Expr::ident("j"),
                Expr::unary(UnaryOperator::PostInc, Expr::ident("i")),
            )),
            Stmt::ret(Some(Expr::binary(
                crate::ast::BinaryOperator::Add,
                Expr::ident("i"),
                Expr::ident("j"),
            ))),
        ])
        .unwrap();

        let body = entry_instrs(&program);
        // i = 0; %t0 = i; i = i + 1; j = %t0; %t1 = i + j; return %t1
        assert_eq!(body.len(), 6);
        match (&body[1], &body[2], &body[3]) {
            (
                IrInstr::Assign { dest: saved, src: Rvalue::Use(Operand::Var(copied)) },
                IrInstr::Assign { dest: inc_dest, src: Rvalue::Binary { rhs, .. } },
                IrInstr::Assign { dest: j, src: Rvalue::Use(Operand::Var(from)) },
            ) => {
                assert!(program.arena.var(saved.var).is_generated);
                assert_eq!(program.arena.var(copied.var).name, "i");
                assert_eq!(program.arena.var(inc_dest.var).name, "i");
                assert_eq!(rhs, &Operand::Const(Value::Int(1)));
                assert_eq!(program.arena.var(j.var).name, "j");
                assert_eq!(from.var, saved.var);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_indexed_assignment_keeps_path() {
        let program = lower_main(vec![
            Stmt::expr(Expr::assign(
                Expr::ident("arr"),
                Expr::array(vec![Expr::int(1), Expr::ident("a")]),
            )),
            Stmt::expr(Expr::assign(
                Expr::index("arr", vec![Expr::int(0), Expr::ident("a")]),
                Expr::str("x"),
            )),
            Stmt::ret(None),
        ])
        .unwrap();

        let body = entry_instrs(&program);
        match &body[1] {
            IrInstr::Assign { dest, src } => {
                assert_eq!(dest.index.len(), 2);
                assert_eq!(dest.index[0], Operand::Const(Value::Int(0)));
                assert_eq!(src, &Rvalue::Use(Operand::Const(Value::Text("x".to_string()))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_index_is_materialized() {
        let program = lower_main(vec![
            Stmt::expr(Expr::assign(Expr::ident("arr"), Expr::array(vec![Expr::int(0)]))),
            Stmt::ret(Some(Expr::index(
                "arr",
                vec![Expr::index("arr", vec![Expr::int(0)])],
            ))),
        ])
        .unwrap();

        let body = entry_instrs(&program);
        match body.last() {
            Some(IrInstr::Return(Some(Operand::Var(place)))) => {
                assert!(place.index[0].as_plain_var().is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_integer_index_is_rejected() {
        let err = lower_main(vec![Stmt::ret(Some(Expr::index("a", vec![Expr::float(1.5)])))])
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidIndex { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = lower_main(vec![Stmt::expr(Expr::assign(Expr::int(1), Expr::int(2)))])
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidAssignTarget { .. }));
    }

    #[test]
    fn test_builtin_call_is_accepted() {
        let program = lower_main(vec![Stmt::expr(Expr::call(
            "print",
            vec![Expr::int(1), Expr::ident("a")],
        ))])
        .unwrap();
        let body = entry_instrs(&program);
        assert!(matches!(
            &body[0],
            IrInstr::Assign { src: Rvalue::Call { callee, args }, .. }
                if callee == "print" && args.len() == 2
        ));
    }
}
