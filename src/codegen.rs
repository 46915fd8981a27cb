//! Renders a compiled [`Library`] as a Solidity source file.
use crate::emit::Operation;
use crate::library::{CompiledFunction, Library};

const HEADER: &[&str] = &[
    "// SPDX-License-Identifier: UNLICENSED",
    "// DO NOT edit this file. Code generated by template-json.",
    "pragma solidity ^0.8.8;",
    "",
    "import \"solady/src/utils/LibString.sol\";",
];

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct Codegen {
    out: String,
    indent_level: usize,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, library: &Library) {
        for line in HEADER {
            self.line(line);
        }
        self.line("");
        self.line(&format!("library {} {{", library.contract_name));
        self.indent_level += 1;

        let mut first = true;
        for decl in &library.structs {
            self.separate(&mut first);
            for line in decl.render().lines() {
                self.line(line);
            }
        }
        for function in &library.functions {
            self.separate(&mut first);
            self.emit_function(function);
        }

        self.indent_level -= 1;
        self.line("}");
    }

    fn emit_function(&mut self, function: &CompiledFunction) {
        let params = function.params.iter().map(|p| p.render()).collect::<Vec<_>>();
        self.line(&format!(
            "function {}({}) internal pure returns (bytes memory) {{",
            function.name,
            params.join(", ")
        ));
        self.indent_level += 1;
        self.line("bytes memory body;");
        for op in &function.ops {
            self.emit_op(op);
        }
        self.line("return body;");
        self.indent_level -= 1;
        self.line("}");
    }

    /// Statements open and close blocks; indentation follows their braces.
    fn emit_op(&mut self, op: &Operation) {
        let text = op.render();
        if text.starts_with('}') {
            self.indent_level = self.indent_level.saturating_sub(1);
        }
        self.line(&text);
        if text.ends_with('{') {
            self.indent_level += 1;
        }
    }

    fn separate(&mut self, first: &mut bool) {
        if !*first {
            self.line("");
        }
        *first = false;
    }

    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent_level {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn into_string(self) -> String {
        self.out
    }
}
