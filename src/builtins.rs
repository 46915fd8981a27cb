//! Single-argument template functions.
//!
//! A builtin never runs at compile time: it renders the Solidity call
//! expression that will convert its argument when the generated code runs.
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy)]
pub struct BuiltinFn {
    pub name: &'static str,
    pub description: &'static str,
    /// Render the call over the argument's access path.
    pub render: fn(&str) -> String,
}

impl BuiltinFn {
    pub fn call(&self, arg: &str) -> String {
        (self.render)(arg)
    }
}

/// Functions available to every template by default.
pub static STANDARD: &[BuiltinFn] = &[
    BuiltinFn {
        name: "toString",
        description: "Decimal string of an integer",
        render: lib_string_to_string,
    },
    BuiltinFn {
        name: "toHexString",
        description: "0x-prefixed hex string of an integer, address or bytes value",
        render: lib_string_to_hex_string,
    },
];

fn lib_string_to_string(arg: &str) -> String {
    format!("LibString.toString({arg})")
}

fn lib_string_to_hex_string(arg: &str) -> String {
    format!("LibString.toHexString({arg})")
}

/// Immutable name → function table handed to the path resolver.
#[derive(Debug, Clone)]
pub struct Builtins {
    table: IndexMap<&'static str, BuiltinFn>,
}

impl Builtins {
    pub fn standard() -> Self {
        Self::from_fns(STANDARD.iter().copied())
    }

    pub fn empty() -> Self {
        Self { table: IndexMap::new() }
    }

    /// Later entries replace earlier ones with the same name.
    pub fn from_fns(fns: impl IntoIterator<Item = BuiltinFn>) -> Self {
        Self { table: fns.into_iter().map(|f| (f.name, f)).collect() }
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinFn> {
        self.table.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuiltinFn> {
        self.table.values()
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}
