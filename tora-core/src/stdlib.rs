//! The Python prologue emitted ahead of every generated program.
//!
//! It imports the host modules the builtins rely on, defines the builtin
//! constants, and binds an alias for every builtin function whose Python
//! spelling differs from its Tora name. Aliases let generated code pass
//! builtins around as values (`let f = sqrt;`) and back the `Alias`
//! lowering at call sites.

use crate::builtins::{BUILTIN_CONSTANTS, BUILTIN_FUNCTIONS};

/// Host modules imported at the top of the prologue.
pub const HOST_IMPORTS: &[&str] = &["import math", "import random", "import datetime"];

/// `random` is also a builtin name, so the module is re-imported under
/// another name before the aliases are bound.
pub const RANDOM_MODULE_IMPORT: &str = "import random as random_module";

/// Render the prologue, ending with a blank line.
pub fn prologue() -> String {
    let mut lines: Vec<String> = HOST_IMPORTS.iter().map(|line| line.to_string()).collect();
    lines.push(String::new());

    for constant in BUILTIN_CONSTANTS {
        lines.push(format!("{} = {}", constant.name, constant.host));
    }
    lines.push(String::new());

    let uses_random_module = BUILTIN_FUNCTIONS
        .iter()
        .any(|builtin| builtin.host.starts_with("random_module."));
    if uses_random_module {
        lines.push(RANDOM_MODULE_IMPORT.to_string());
    }

    for builtin in BUILTIN_FUNCTIONS.iter().filter(|b| b.needs_alias()) {
        lines.push(format!("{} = {}", builtin.name, builtin.host));
    }
    lines.push(String::new());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_come_first() {
        let text = prologue();
        assert!(text.starts_with("import math\nimport random\nimport datetime\n"));
    }

    #[test]
    fn defines_constants_before_aliases() {
        let text = prologue();
        let pi = text.find("PI = math.pi").expect("PI defined");
        let alias = text.find("sqrt = math.sqrt").expect("sqrt aliased");
        assert!(pi < alias);
        assert!(text.contains("NONE = None"));
    }

    #[test]
    fn random_aliases_use_renamed_module() {
        let text = prologue();
        let import = text.find(RANDOM_MODULE_IMPORT).expect("module import");
        let alias = text.find("random = random_module.random").expect("alias");
        assert!(import < alias);
    }

    #[test]
    fn skips_identity_aliases_and_binds_lambdas() {
        let text = prologue();
        assert!(!text.lines().any(|line| line == "len = len"));
        assert!(text.contains("contains = lambda lst, item: item in lst"));
        assert!(text.contains("println = print"));
    }
}
