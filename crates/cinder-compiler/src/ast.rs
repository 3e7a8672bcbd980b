//! Syntax tree consumed by the IR generator
//!
//! The parser lives outside this crate; it hands over a [`Tree`] either
//! directly or as JSON (every node carries a `kind` tag).

use crate::error::CompileResult;
use serde::{Deserialize, Serialize};

/// A whole compilation unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tree {
    pub stmts: Vec<Stmt>,
}

impl Tree {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    /// Parse a JSON-encoded syntax tree
    pub fn from_json(json: &str) -> CompileResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A braced statement list, which opens a scope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Neg,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Int {
        value: i64,
    },
    Float {
        value: f64,
    },
    Str {
        value: String,
    },
    Ident {
        name: String,
    },
    /// `name[i][j]...`
    Index {
        name: String,
        index: Vec<Expr>,
    },
    Array {
        elements: Vec<Expr>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Int { value }
    }

    pub fn float(value: f64) -> Self {
        Expr::Float { value }
    }

    pub fn str(value: &str) -> Self {
        Expr::Str {
            value: value.to_string(),
        }
    }

    pub fn ident(name: &str) -> Self {
        Expr::Ident {
            name: name.to_string(),
        }
    }

    pub fn index(name: &str, index: Vec<Expr>) -> Self {
        Expr::Index {
            name: name.to_string(),
            index,
        }
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Expr::Array { elements }
    }

    pub fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: callee.to_string(),
            args,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Int { .. } => "int literal",
            Expr::Float { .. } => "float literal",
            Expr::Str { .. } => "string literal",
            Expr::Ident { .. } => "identifier",
            Expr::Index { .. } => "index expression",
            Expr::Array { .. } => "array literal",
            Expr::Binary { .. } => "binary expression",
            Expr::Unary { .. } => "unary expression",
            Expr::Assign { .. } => "assignment",
            Expr::Call { .. } => "call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    Literal { value: Expr },
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Expr {
        expr: Expr,
    },
    If {
        cond: Expr,
        then_branch: Block,
        #[serde(default)]
        else_branch: Option<Block>,
    },
    For {
        #[serde(default)]
        init: Option<Expr>,
        #[serde(default)]
        cond: Option<Expr>,
        #[serde(default)]
        step: Option<Expr>,
        body: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Switch {
        scrutinee: Expr,
        cases: Vec<SwitchCase>,
        #[serde(default)]
        default: Option<Block>,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
    },
    FuncDecl {
        name: String,
        params: Vec<String>,
        body: Block,
    },
    Break,
    Continue,
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Import {
        path: String,
    },
    Block {
        body: Block,
    },
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr { expr }
    }

    pub fn func(name: &str, params: &[&str], body: Vec<Stmt>) -> Self {
        Stmt::FuncDecl {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Block::new(body),
        }
    }

    pub fn if_else(cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>) -> Self {
        Stmt::If {
            cond,
            then_branch: Block::new(then_branch),
            else_branch: else_branch.map(Block::new),
        }
    }

    pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Self {
        Stmt::While {
            cond,
            body: Block::new(body),
        }
    }

    pub fn for_loop(
        init: Option<Expr>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Vec<Stmt>,
    ) -> Self {
        Stmt::For {
            init,
            cond,
            step,
            body: Block::new(body),
        }
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Stmt::Return { value }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Expr { .. } => "expression statement",
            Stmt::If { .. } => "if statement",
            Stmt::For { .. } => "for statement",
            Stmt::While { .. } => "while statement",
            Stmt::Switch { .. } => "switch statement",
            Stmt::Match { .. } => "match statement",
            Stmt::FuncDecl { .. } => "function declaration",
            Stmt::Break => "break statement",
            Stmt::Continue => "continue statement",
            Stmt::Return { .. } => "return statement",
            Stmt::Import { .. } => "import statement",
            Stmt::Block { .. } => "block",
        }
    }
}
