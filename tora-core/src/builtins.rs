//! Built-in functions and constants of Tora.
//!
//! This module is the single catalog of names the toolchain pre-declares.
//! The semantic analyzer seeds its outermost scope from it, and the code
//! generator uses each entry's [`Lowering`] to decide how a call is
//! rendered in Python.

/// How a call to a builtin function is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowering {
    /// `host(args)`, e.g. `sqrt(x)` becomes `math.sqrt(x)`.
    Direct,

    /// `name(args)`, resolved at runtime through the prologue alias.
    Alias,

    /// `(host)(args)` where `host` is a lambda expression.
    Lambda,

    /// A call to the host `print`, with `end=''` unless `newline` is set.
    Print { newline: bool },

    /// `list.append(item)` written as a method call on the first argument.
    Push,
}

/// Metadata about a single builtin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinFunction {
    /// Name at the Tora level (e.g. `max_list`).
    pub name: &'static str,

    /// Python spelling the name is bound to in the prologue.
    pub host: &'static str,

    pub lowering: Lowering,
}

impl BuiltinFunction {
    /// Whether the prologue needs a `name = host` line for this builtin.
    pub fn needs_alias(&self) -> bool {
        self.host != self.name
    }
}

/// Metadata about a single builtin constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinConstant {
    pub name: &'static str,

    /// Python expression substituted for every reference.
    pub host: &'static str,
}

const fn function(name: &'static str, host: &'static str, lowering: Lowering) -> BuiltinFunction {
    BuiltinFunction {
        name,
        host,
        lowering,
    }
}

/// The complete list of builtin functions, in prologue order.
pub const BUILTIN_FUNCTIONS: &[BuiltinFunction] = &[
    // output
    function("print", "print", Lowering::Print { newline: false }),
    function("println", "print", Lowering::Print { newline: true }),
    // strings and conversions
    function("len", "len", Lowering::Direct),
    function("str", "str", Lowering::Direct),
    function("int", "int", Lowering::Direct),
    function("float", "float", Lowering::Direct),
    // math
    function("abs", "abs", Lowering::Direct),
    function("max", "max", Lowering::Direct),
    function("min", "min", Lowering::Direct),
    function("pow", "pow", Lowering::Direct),
    function("sqrt", "math.sqrt", Lowering::Direct),
    function("sin", "math.sin", Lowering::Direct),
    function("cos", "math.cos", Lowering::Direct),
    function("tan", "math.tan", Lowering::Direct),
    function("log", "math.log", Lowering::Direct),
    function("log10", "math.log10", Lowering::Direct),
    function("ceil", "math.ceil", Lowering::Direct),
    function("floor", "math.floor", Lowering::Direct),
    function("round", "round", Lowering::Direct),
    // lists
    function("push", "list.append", Lowering::Push),
    function("pop", "list.pop", Lowering::Direct),
    function("contains", "lambda lst, item: item in lst", Lowering::Lambda),
    function("sum", "sum", Lowering::Direct),
    function(
        "average",
        "lambda lst: sum(lst) / len(lst) if lst else 0",
        Lowering::Lambda,
    ),
    function("max_list", "max", Lowering::Direct),
    function("min_list", "min", Lowering::Direct),
    // random numbers; `random` itself would shadow the module
    function("random", "random_module.random", Lowering::Alias),
    function("randint", "random_module.randint", Lowering::Alias),
    // time
    function("time", "datetime.datetime.now", Lowering::Direct),
    function(
        "timestamp",
        "lambda: datetime.datetime.now().timestamp()",
        Lowering::Lambda,
    ),
    // type predicates
    function("is_int", "lambda x: isinstance(x, int)", Lowering::Lambda),
    function("is_float", "lambda x: isinstance(x, float)", Lowering::Lambda),
    function("is_str", "lambda x: isinstance(x, str)", Lowering::Lambda),
    function("is_bool", "lambda x: isinstance(x, bool)", Lowering::Lambda),
    function("is_list", "lambda x: isinstance(x, list)", Lowering::Lambda),
];

/// The complete list of builtin constants, in prologue order.
pub const BUILTIN_CONSTANTS: &[BuiltinConstant] = &[
    BuiltinConstant {
        name: "PI",
        host: "math.pi",
    },
    BuiltinConstant {
        name: "E",
        host: "math.e",
    },
    BuiltinConstant {
        name: "TRUE",
        host: "True",
    },
    BuiltinConstant {
        name: "FALSE",
        host: "False",
    },
    BuiltinConstant {
        name: "NONE",
        host: "None",
    },
];

/// Look up a builtin function by its Tora-level name.
///
/// The search is linear because the table is small.
pub fn find_function(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTIN_FUNCTIONS.iter().find(|builtin| builtin.name == name)
}

/// Look up a builtin constant by its Tora-level name.
pub fn find_constant(name: &str) -> Option<&'static BuiltinConstant> {
    BUILTIN_CONSTANTS.iter().find(|constant| constant.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_across_the_catalog() {
        let mut seen = HashSet::new();
        let names = BUILTIN_FUNCTIONS
            .iter()
            .map(|f| f.name)
            .chain(BUILTIN_CONSTANTS.iter().map(|c| c.name));
        for name in names {
            assert!(seen.insert(name), "duplicate builtin {name}");
        }
    }

    #[test]
    fn finds_functions_and_constants() {
        assert_eq!(find_function("sqrt").map(|f| f.host), Some("math.sqrt"));
        assert_eq!(find_constant("PI").map(|c| c.host), Some("math.pi"));
        assert!(find_function("PI").is_none());
        assert!(find_constant("len").is_none());
    }

    #[test]
    fn catalog_covers_type_predicates() {
        for name in ["is_int", "is_float", "is_str", "is_bool", "is_list"] {
            let builtin = find_function(name).expect("predicate present");
            assert_eq!(builtin.lowering, Lowering::Lambda);
        }
    }

    #[test]
    fn only_renamed_builtins_need_aliases() {
        assert!(!find_function("len").expect("len").needs_alias());
        assert!(find_function("println").expect("println").needs_alias());
        assert!(find_function("random").expect("random").needs_alias());
    }
}
