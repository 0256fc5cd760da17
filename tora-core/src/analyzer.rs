//! Scope checking for Tora programs.
//!
//! The analyzer walks the tree once, keeping a stack of scopes:
//!
//! - scope 0 holds the builtin constants and functions,
//! - scope 1 holds the program's global declarations,
//! - each function body pushes one more scope for its parameters and locals.
//!
//! It verifies that names are declared before use, that no name is declared
//! twice in one scope, and that call targets are functions. It does not
//! check argument counts or types and never rewrites the tree.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::ast::{BinaryOp, Expr, FnDecl, Ident, LetDecl, Number, Program, Stmt, Visitor};
use crate::builtins::{BUILTIN_CONSTANTS, BUILTIN_FUNCTIONS, find_constant};
use crate::error::Diagnostic;

/// Type recorded for a variable. Only annotations are tracked; nothing is
/// inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarType {
    Unknown,
    Annotated(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Variable(VarType),
    Function,
    Constant,
}

type Scope = HashMap<String, SymbolKind>;

const GLOBAL_SCOPE: usize = 1;

/// Ordered stack of scopes, innermost last.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    /// A table holding the builtin scope and an empty global scope.
    pub fn new() -> Self {
        let mut builtins = Scope::new();
        for constant in BUILTIN_CONSTANTS {
            builtins.insert(constant.name.to_string(), SymbolKind::Constant);
        }
        for function in BUILTIN_FUNCTIONS {
            builtins.insert(function.name.to_string(), SymbolKind::Function);
        }
        SymbolTable {
            scopes: vec![builtins, Scope::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pop the innermost scope. The builtin and global scopes are never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > GLOBAL_SCOPE + 1 {
            self.scopes.pop();
        }
    }

    /// Declare `name` in the innermost scope.
    ///
    /// Returns the existing kind, leaving the table unchanged, if the name is
    /// already declared in that scope.
    pub fn declare(&mut self, name: &str, kind: SymbolKind) -> Result<(), SymbolKind> {
        let scope = self.innermost_mut();
        if let Some(existing) = scope.get(name) {
            return Err(existing.clone());
        }
        scope.insert(name.to_string(), kind);
        Ok(())
    }

    /// Resolve `name`, searching from the innermost scope outwards.
    pub fn lookup(&self, name: &str) -> Option<&SymbolKind> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Look `name` up in the innermost scope only.
    pub fn lookup_current(&self, name: &str) -> Option<&SymbolKind> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }

    fn innermost_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-owned analysis context.
///
/// One analyzer may check many programs in sequence (as the REPL does); the
/// global scope persists between calls until [`Analyzer::reset`]. A call
/// that fails leaves the global scope exactly as it was before the call.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    symbols: SymbolTable,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            symbols: SymbolTable::new(),
        }
    }

    /// Check `program`, returning it unchanged on success.
    pub fn analyze<'p>(&mut self, program: &'p Program) -> Result<&'p Program, Diagnostic> {
        let snapshot = self.symbols.scopes[GLOBAL_SCOPE].clone();
        let result = program
            .statements
            .iter()
            .try_for_each(|stmt| self.visit_stmt(stmt));

        self.symbols.scopes.truncate(GLOBAL_SCOPE + 1);
        match result {
            Ok(()) => {
                debug!(
                    statements = program.statements.len(),
                    globals = self.symbols.scopes[GLOBAL_SCOPE].len(),
                    "semantic analysis passed"
                );
                Ok(program)
            }
            Err(diagnostic) => {
                self.symbols.scopes[GLOBAL_SCOPE] = snapshot;
                debug!(%diagnostic, "semantic analysis failed");
                Err(diagnostic)
            }
        }
    }

    /// Forget every global declaration.
    pub fn reset(&mut self) {
        self.symbols = SymbolTable::new();
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolKind> {
        self.symbols.lookup(name)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    fn declare(&mut self, ident: &Ident, kind: SymbolKind, what: &str) -> Result<(), Diagnostic> {
        trace!(name = %ident.name, ?kind, "declare");
        self.symbols.declare(&ident.name, kind).map_err(|_| {
            Diagnostic::semantic(format!("{what} '{}' already declared", ident.name))
                .at(ident.position.line, ident.position.column)
        })
    }

    fn visit_block(&mut self, statements: &[Stmt]) -> Result<(), Diagnostic> {
        statements.iter().try_for_each(|stmt| self.visit_stmt(stmt))
    }
}

impl Visitor for Analyzer {
    type Output = Result<(), Diagnostic>;

    // The name is declared before its initializer is checked, so
    // `let x = x;` passes here and fails only at runtime.
    fn visit_let(&mut self, decl: &LetDecl) -> Self::Output {
        let ty = decl
            .ty
            .clone()
            .map_or(VarType::Unknown, VarType::Annotated);
        self.declare(&decl.name, SymbolKind::Variable(ty), "Variable")?;
        match &decl.value {
            Some(value) => self.visit_expr(value),
            None => Ok(()),
        }
    }

    fn visit_fn(&mut self, decl: &FnDecl) -> Self::Output {
        self.declare(&decl.name, SymbolKind::Function, "Function")?;

        self.symbols.push_scope();
        let result = decl
            .params
            .iter()
            .try_for_each(|param| {
                let ty = param
                    .ty
                    .clone()
                    .map_or(VarType::Unknown, VarType::Annotated);
                self.declare(&param.name, SymbolKind::Variable(ty), "Parameter")
            })
            .and_then(|()| self.visit_block(&decl.body));
        self.symbols.pop_scope();
        result
    }

    fn visit_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
    ) -> Self::Output {
        self.visit_expr(condition)?;
        self.visit_block(then_branch)?;
        match else_branch {
            Some(branch) => self.visit_block(branch),
            None => Ok(()),
        }
    }

    fn visit_while(&mut self, condition: &Expr, body: &[Stmt]) -> Self::Output {
        self.visit_expr(condition)?;
        self.visit_block(body)
    }

    // Loop variables live in the enclosing scope, as in the host language.
    // Re-using a variable name for a later loop is allowed.
    fn visit_for(&mut self, variable: &Ident, iterable: &Expr, body: &[Stmt]) -> Self::Output {
        self.visit_expr(iterable)?;
        if !matches!(
            self.symbols.lookup_current(&variable.name),
            Some(SymbolKind::Variable(_))
        ) {
            self.declare(variable, SymbolKind::Variable(VarType::Unknown), "Variable")?;
        }
        self.visit_block(body)
    }

    fn visit_print(&mut self, value: &Expr, _newline: bool) -> Self::Output {
        self.visit_expr(value)
    }

    fn visit_expr_stmt(&mut self, expr: &Expr) -> Self::Output {
        self.visit_expr(expr)
    }

    // Assignment may introduce a binding, so the target is not resolved.
    fn visit_assign(&mut self, _target: &Ident, value: &Expr) -> Self::Output {
        self.visit_expr(value)
    }

    fn visit_binary(&mut self, _op: BinaryOp, left: &Expr, right: &Expr) -> Self::Output {
        self.visit_expr(left)?;
        self.visit_expr(right)
    }

    fn visit_call(&mut self, callee: &Ident, args: &[Expr]) -> Self::Output {
        let position = callee.position;
        match self.symbols.lookup(&callee.name) {
            None => {
                return Err(Diagnostic::semantic(format!(
                    "Function '{}' not declared",
                    callee.name
                ))
                .at(position.line, position.column));
            }
            Some(SymbolKind::Function) => {}
            Some(_) => {
                return Err(
                    Diagnostic::semantic(format!("'{}' is not a function", callee.name))
                        .at(position.line, position.column),
                );
            }
        }
        args.iter().try_for_each(|arg| self.visit_expr(arg))
    }

    fn visit_ident(&mut self, ident: &Ident) -> Self::Output {
        if self.symbols.lookup(&ident.name).is_some() || find_constant(&ident.name).is_some() {
            return Ok(());
        }
        Err(
            Diagnostic::semantic(format!("Variable '{}' not declared", ident.name))
                .at(ident.position.line, ident.position.column),
        )
    }

    fn visit_number(&mut self, _number: &Number) -> Self::Output {
        Ok(())
    }

    fn visit_str(&mut self, _value: &str) -> Self::Output {
        Ok(())
    }

    fn visit_list(&mut self, elements: &[Expr]) -> Self::Output {
        elements.iter().try_for_each(|element| self.visit_expr(element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use crate::parser::parse;

    fn analyze(source: &str) -> Result<Analyzer, Diagnostic> {
        let program = parse(source).expect("parse");
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&program)?;
        Ok(analyzer)
    }

    #[test]
    fn accepts_declared_variables() {
        let analyzer = analyze("let x = 42;\nlet y = x + 10;").expect("analyze");
        assert_eq!(
            analyzer.lookup("x"),
            Some(&SymbolKind::Variable(VarType::Unknown))
        );
        assert!(analyzer.lookup("y").is_some());
    }

    #[test]
    fn records_type_annotations() {
        let analyzer = analyze("let n: int = 1;").expect("analyze");
        assert_eq!(
            analyzer.lookup("n"),
            Some(&SymbolKind::Variable(VarType::Annotated("int".into())))
        );
    }

    #[test]
    fn rejects_undeclared_identifier() {
        let err = analyze("let y = x + 1;").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Semantic);
        assert_eq!(err.message, "Variable 'x' not declared");
        assert_eq!((err.line, err.column), (Some(1), Some(9)));
    }

    #[test]
    fn rejects_redeclaration_in_same_scope() {
        let err = analyze("let x = 1; let x = 2;").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Semantic);
        assert_eq!(err.message, "Variable 'x' already declared");
    }

    #[test]
    fn allows_shadowing_in_function_scope() {
        analyze("let x = 1; fn f() { let x = 2; return x; }").expect("analyze");
    }

    #[test]
    fn parameters_are_local_to_the_function() {
        let err = analyze("fn f(a) { return a; } let b = a;").unwrap_err();
        assert_eq!(err.message, "Variable 'a' not declared");
    }

    #[test]
    fn rejects_duplicate_parameters() {
        let err = analyze("fn f(a, a) { }").unwrap_err();
        assert_eq!(err.message, "Parameter 'a' already declared");
    }

    #[test]
    fn rejects_duplicate_functions() {
        let err = analyze("fn f() { } fn f() { }").unwrap_err();
        assert_eq!(err.message, "Function 'f' already declared");
    }

    #[test]
    fn recognizes_builtins() {
        let analyzer =
            analyze("let pi_val = PI; let r = len(\"hello\"); let n = random();").expect("analyze");
        assert_eq!(analyzer.lookup("PI"), Some(&SymbolKind::Constant));
        assert_eq!(analyzer.lookup("len"), Some(&SymbolKind::Function));
    }

    #[test]
    fn globals_may_shadow_builtins() {
        analyze("let len = 3; let e = E;").expect("analyze");
    }

    #[test]
    fn does_not_check_arity() {
        analyze("let result = len(\"hello\", \"world\");").expect("analyze");
    }

    #[test]
    fn rejects_calls_to_unknown_names() {
        let err = analyze("foo(1);").unwrap_err();
        assert_eq!(err.message, "Function 'foo' not declared");
    }

    #[test]
    fn rejects_calls_to_variables() {
        let err = analyze("let x = 1; x(2);").unwrap_err();
        assert_eq!(err.message, "'x' is not a function");
        assert_eq!(err.column, Some(12));
    }

    #[test]
    fn checks_call_arguments() {
        let err = analyze("println(len(missing));").unwrap_err();
        assert_eq!(err.message, "Variable 'missing' not declared");
    }

    #[test]
    fn let_initializer_sees_its_own_name() {
        analyze("let x = x;").expect("self reference is not rejected");
    }

    #[test]
    fn allows_recursion() {
        analyze("fn fact(n) { if (n < 2) { return 1; } return n * fact(n - 1); }")
            .expect("analyze");
    }

    #[test]
    fn loop_variables_can_be_reused() {
        analyze("for i in [1, 2] { println(i); } for i in [3] { println(i); }")
            .expect("analyze");
    }

    #[test]
    fn loop_variable_cannot_replace_a_function() {
        let err = analyze("fn i() { } for i in [1] { }").unwrap_err();
        assert_eq!(err.message, "Variable 'i' already declared");
    }

    #[test]
    fn assignment_target_is_not_resolved() {
        analyze("x = 10;").expect("analyze");
        let err = analyze("x = y;").unwrap_err();
        assert_eq!(err.message, "Variable 'y' not declared");
    }

    #[test]
    fn session_keeps_globals_between_calls() {
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&parse("let x = 1;").expect("parse")).expect("first");
        analyzer.analyze(&parse("println(x);").expect("parse")).expect("second");
        assert_eq!(analyzer.symbols().depth(), 2);
    }

    #[test]
    fn failed_call_rolls_back_its_declarations() {
        let mut analyzer = Analyzer::new();
        let err = analyzer
            .analyze(&parse("let a = 1; fn f(p) { let q = missing; }").expect("parse"))
            .unwrap_err();
        assert_eq!(err.message, "Variable 'missing' not declared");
        assert!(analyzer.lookup("a").is_none());
        assert!(analyzer.lookup("f").is_none());
        assert_eq!(analyzer.symbols().depth(), 2);
        analyzer.analyze(&parse("let a = 2;").expect("parse")).expect("retry");
    }

    #[test]
    fn reset_forgets_globals() {
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&parse("let x = 1;").expect("parse")).expect("analyze");
        analyzer.reset();
        assert!(analyzer.lookup("x").is_none());
        assert!(analyzer.lookup("len").is_some());
    }

    #[test]
    fn builtin_scope_cannot_be_popped() {
        let mut table = SymbolTable::new();
        table.pop_scope();
        table.pop_scope();
        assert_eq!(table.depth(), 2);
        assert_eq!(table.lookup("sqrt"), Some(&SymbolKind::Function));
        table.push_scope();
        table.declare("v", SymbolKind::Constant).expect("declare");
        assert_eq!(
            table.declare("v", SymbolKind::Function),
            Err(SymbolKind::Constant)
        );
        table.pop_scope();
        assert!(table.lookup("v").is_none());
    }
}
