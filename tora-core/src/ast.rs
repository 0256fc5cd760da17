//! Syntax tree for Tora programs.
//!
//! The tree is built bottom-up by the parser and only read afterwards.
//! Every node exclusively owns its children.

use std::fmt;

/// Position of a name in the source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A name as written in the source, with where it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub position: Position,
}

impl Ident {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Ident {
            name: name.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let(LetDecl),
    Fn(FnDecl),
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        variable: Ident,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Print {
        value: Expr,
        newline: bool,
    },
    Expr(Expr),
    Assign {
        target: Ident,
        value: Expr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetDecl {
    pub name: Ident,
    /// Type annotation as written, e.g. `int` in `let x: int = 1;`.
    pub ty: Option<String>,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    Ident(Ident),
    Number(Number),
    Str(String),
    List(Vec<Expr>),
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_call(&self, name: &str) -> bool {
        matches!(self, Expr::Call { callee, .. } if callee.name == name)
    }
}

/// Numeric literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Int(i64),
    /// Integer literal outside the `i64` range, kept as its digits. Python
    /// integers are unbounded, so the text is emitted as written.
    BigInt(String),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(value) => write!(f, "{value}"),
            Number::BigInt(digits) => f.write_str(digits),
            // `{:?}` keeps the fractional part of whole floats (`2.0`).
            Number::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// Binary operators in the order of the parser's precedence levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Per-variant dispatch over the closed node set.
///
/// Implementors provide one method per statement and expression variant;
/// [`Visitor::visit_stmt`] and [`Visitor::visit_expr`] do the exhaustive
/// match, so adding a variant fails to compile until every stage handles it.
pub trait Visitor {
    type Output;

    fn visit_let(&mut self, decl: &LetDecl) -> Self::Output;
    fn visit_fn(&mut self, decl: &FnDecl) -> Self::Output;
    fn visit_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
    ) -> Self::Output;
    fn visit_while(&mut self, condition: &Expr, body: &[Stmt]) -> Self::Output;
    fn visit_for(&mut self, variable: &Ident, iterable: &Expr, body: &[Stmt]) -> Self::Output;
    fn visit_print(&mut self, value: &Expr, newline: bool) -> Self::Output;
    fn visit_expr_stmt(&mut self, expr: &Expr) -> Self::Output;
    fn visit_assign(&mut self, target: &Ident, value: &Expr) -> Self::Output;

    fn visit_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Self::Output;
    fn visit_call(&mut self, callee: &Ident, args: &[Expr]) -> Self::Output;
    fn visit_ident(&mut self, ident: &Ident) -> Self::Output;
    fn visit_number(&mut self, number: &Number) -> Self::Output;
    fn visit_str(&mut self, value: &str) -> Self::Output;
    fn visit_list(&mut self, elements: &[Expr]) -> Self::Output;

    fn visit_stmt(&mut self, stmt: &Stmt) -> Self::Output {
        match stmt {
            Stmt::Let(decl) => self.visit_let(decl),
            Stmt::Fn(decl) => self.visit_fn(decl),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.visit_if(condition, then_branch, else_branch.as_deref()),
            Stmt::While { condition, body } => self.visit_while(condition, body),
            Stmt::For {
                variable,
                iterable,
                body,
            } => self.visit_for(variable, iterable, body),
            Stmt::Print { value, newline } => self.visit_print(value, *newline),
            Stmt::Expr(expr) => self.visit_expr_stmt(expr),
            Stmt::Assign { target, value } => self.visit_assign(target, value),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) -> Self::Output {
        match expr {
            Expr::Binary { op, left, right } => self.visit_binary(*op, left, right),
            Expr::Call { callee, args } => self.visit_call(callee, args),
            Expr::Ident(ident) => self.visit_ident(ident),
            Expr::Number(number) => self.visit_number(number),
            Expr::Str(value) => self.visit_str(value),
            Expr::List(elements) => self.visit_list(elements),
        }
    }
}
