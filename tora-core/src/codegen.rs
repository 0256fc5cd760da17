//! Python backend for Tora.
//!
//! Translation is syntax-directed: one case per tree variant, each
//! returning Python source text. Statements come back already indented to
//! the current block depth; expressions come back unindented.
//!
//! The generator only accepts analyzed programs and cannot fail. Names that
//! the program itself declares take precedence over builtins of the same
//! name, mirroring the analyzer's scoping.

use std::collections::HashSet;

use tracing::debug;

use crate::ast::{BinaryOp, Expr, FnDecl, Ident, LetDecl, Number, Program, Stmt, Visitor};
use crate::builtins::{Lowering, find_constant, find_function};
use crate::stdlib::prologue;

const INDENT_UNIT: &str = "    ";

/// Statement emitted for an empty block.
const EMPTY_BLOCK: &str = "pass";

#[derive(Debug, Clone)]
pub struct CodeGenerator {
    depth: usize,
    /// Names declared by the program, one set per open function scope.
    declared: Vec<HashSet<String>>,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        CodeGenerator {
            depth: 0,
            declared: vec![HashSet::new()],
        }
    }

    /// The prologue followed by every top-level statement.
    pub fn generate_program(&mut self, program: &Program) -> String {
        let mut parts = vec![prologue(), String::new()];
        parts.extend(self.statements(program));
        let code = parts.join("\n");
        debug!(bytes = code.len(), "generated program");
        code
    }

    /// Top-level statements only, for hosts that already ran the prologue.
    ///
    /// Declarations seen here are remembered across calls, like the
    /// analyzer's global scope.
    pub fn generate_statements(&mut self, program: &Program) -> String {
        self.statements(program).join("\n")
    }

    /// Forget every remembered global declaration.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn statements(&mut self, program: &Program) -> Vec<String> {
        program
            .statements
            .iter()
            .map(|stmt| self.visit_stmt(stmt))
            .collect()
    }

    fn indent(&self) -> String {
        INDENT_UNIT.repeat(self.depth)
    }

    fn line(&self, text: &str) -> String {
        format!("{}{text}", self.indent())
    }

    /// Render a header line followed by its indented block.
    fn block(&mut self, header: String, body: &[Stmt]) -> String {
        let mut lines = vec![self.line(&header)];
        self.depth += 1;
        if body.is_empty() {
            lines.push(self.line(EMPTY_BLOCK));
        } else {
            lines.extend(body.iter().map(|stmt| self.visit_stmt(stmt)));
        }
        self.depth -= 1;
        lines.join("\n")
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.declared.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_user_declared(&self, name: &str) -> bool {
        self.declared.iter().any(|scope| scope.contains(name))
    }
}

impl Visitor for CodeGenerator {
    type Output = String;

    fn visit_let(&mut self, decl: &LetDecl) -> String {
        let value = match &decl.value {
            Some(value) => self.visit_expr(value),
            None => "None".to_string(),
        };
        self.declare(&decl.name.name);
        self.line(&format!("{} = {value}", decl.name.name))
    }

    fn visit_fn(&mut self, decl: &FnDecl) -> String {
        self.declare(&decl.name.name);
        let params: Vec<&str> = decl.params.iter().map(|p| p.name.name.as_str()).collect();
        let header = format!("def {}({}):", decl.name.name, params.join(", "));

        self.declared
            .push(params.iter().map(|name| name.to_string()).collect());
        let code = self.block(header, &decl.body);
        self.declared.pop();
        code
    }

    fn visit_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
    ) -> String {
        let condition = self.visit_expr(condition);
        let mut code = self.block(format!("if {condition}:"), then_branch);
        if let Some(branch) = else_branch.filter(|branch| !branch.is_empty()) {
            code.push('\n');
            code.push_str(&self.block("else:".to_string(), branch));
        }
        code
    }

    fn visit_while(&mut self, condition: &Expr, body: &[Stmt]) -> String {
        let condition = self.visit_expr(condition);
        self.block(format!("while {condition}:"), body)
    }

    fn visit_for(&mut self, variable: &Ident, iterable: &Expr, body: &[Stmt]) -> String {
        let iterable = self.visit_expr(iterable);
        self.declare(&variable.name);
        self.block(format!("for {} in {iterable}:", variable.name), body)
    }

    fn visit_print(&mut self, value: &Expr, newline: bool) -> String {
        let value = self.visit_expr(value);
        self.line(&print_call(&value, newline))
    }

    fn visit_expr_stmt(&mut self, expr: &Expr) -> String {
        let code = self.visit_expr(expr);
        self.line(&code)
    }

    fn visit_assign(&mut self, target: &Ident, value: &Expr) -> String {
        let value = self.visit_expr(value);
        self.declare(&target.name);
        self.line(&format!("{} = {value}", target.name))
    }

    // `+` is numeric only when both operands are literals or bare names;
    // anything else is treated as string concatenation. A name bound to a
    // string still gets numeric `+`, which fails at runtime.
    fn visit_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> String {
        let left_code = self.visit_expr(left);
        let right_code = self.visit_expr(right);

        if op == BinaryOp::Add && !(is_numeric_operand(left) && is_numeric_operand(right)) {
            return format!("{} + {}", coerce_to_str(left_code), coerce_to_str(right_code));
        }
        format!("({left_code} {op} {right_code})")
    }

    fn visit_call(&mut self, callee: &Ident, args: &[Expr]) -> String {
        let args: Vec<String> = args.iter().map(|arg| self.visit_expr(arg)).collect();
        let joined = args.join(", ");
        let name = callee.name.as_str();

        let Some(builtin) = find_function(name).filter(|_| !self.is_user_declared(name)) else {
            return format!("{name}({joined})");
        };

        match builtin.lowering {
            Lowering::Direct => format!("{}({joined})", builtin.host),
            Lowering::Alias => format!("{name}({joined})"),
            Lowering::Lambda => format!("({})({joined})", builtin.host),
            Lowering::Print { newline } => print_call(&joined, newline),
            Lowering::Push => match args.as_slice() {
                [list, item] => format!("{list}.append({item})"),
                // Any other arity goes through the `push = list.append` alias
                // and fails in the host.
                _ => format!("{name}({joined})"),
            },
        }
    }

    fn visit_ident(&mut self, ident: &Ident) -> String {
        match find_constant(&ident.name) {
            Some(constant) if !self.is_user_declared(&ident.name) => constant.host.to_string(),
            _ => ident.name.clone(),
        }
    }

    fn visit_number(&mut self, number: &Number) -> String {
        number.to_string()
    }

    fn visit_str(&mut self, value: &str) -> String {
        python_string_literal(value)
    }

    fn visit_list(&mut self, elements: &[Expr]) -> String {
        let elements: Vec<String> = elements
            .iter()
            .map(|element| match self.visit_expr(element).as_str() {
                "true" => "True".to_string(),
                "false" => "False".to_string(),
                other => other.to_string(),
            })
            .collect();
        format!("[{}]", elements.join(", "))
    }
}

fn is_numeric_operand(expr: &Expr) -> bool {
    matches!(expr, Expr::Number(_) | Expr::Ident(_))
}

fn coerce_to_str(code: String) -> String {
    if code.starts_with("str(") && code.ends_with(')') {
        code
    } else {
        format!("str({code})")
    }
}

fn print_call(args: &str, newline: bool) -> String {
    match (args.is_empty(), newline) {
        (_, true) => format!("print({args})"),
        (true, false) => "print(end='')".to_string(),
        (false, false) => format!("print({args}, end='')"),
    }
}

/// Quote `value` as a double-quoted Python string literal.
pub fn python_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if (ch as u32) < 0x20 || ch == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", ch as u32));
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}
