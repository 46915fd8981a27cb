//! Template → operation stream.
//!
//! The emitter walks the template AST once, depth first, resolving every
//! action against the schema and lowering `if`/`range` into Solidity control
//! statements. Output goes through two channels:
//!
//! - fragments (literal text or value expressions) that end up as arguments
//!   to `abi.encodePacked`; adjacent fragments are merged into one
//!   [`Operation::FragmentGroup`] so the generated code makes as few calls as
//!   possible;
//! - raw statements (`if (...) {`, `for (...) {`, `}`), never merged.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::builtins::Builtins;
use crate::error::{CompileError, Pos, Result};
use crate::resolve::{Ref, Resolver};
use crate::schema::Ty;
use crate::template::{Branch, ListNode, Node};

/// Appended between range iterations.
pub const SEPARATOR: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Fragment {
    Literal(String),
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FragmentGroup(Vec<Fragment>),
    Statement(String),
}

/// Compile a parsed template against the parameter record `root`.
pub fn compile(root: &Ty, ast: &ListNode, builtins: &Builtins) -> Result<Vec<Operation>> {
    let mut emitter = Emitter::new(builtins);
    emitter.walk_list(&Ref::root(root), ast)?;
    Ok(emitter.finish())
}

/// Per-invocation emitter state. Nothing here outlives one compile.
pub struct Emitter<'b> {
    resolver: Resolver<'b>,
    ops: Vec<Operation>,
    loop_depth: usize,
}

impl<'b> Emitter<'b> {
    pub fn new(builtins: &'b Builtins) -> Self {
        Self { resolver: Resolver::new(builtins), ops: Vec::new(), loop_depth: 0 }
    }

    pub fn finish(self) -> Vec<Operation> {
        self.ops
    }

    /// Merge into the trailing group when there is one.
    fn add_fragment(&mut self, fragment: Fragment) {
        match self.ops.last_mut() {
            Some(Operation::FragmentGroup(group)) => group.push(fragment),
            _ => self.ops.push(Operation::FragmentGroup(vec![fragment])),
        }
    }

    fn add_stmt(&mut self, stmt: impl Into<String>) {
        self.ops.push(Operation::Statement(stmt.into()));
    }

    pub fn walk_list(&mut self, current: &Ref<'_>, list: &ListNode) -> Result<()> {
        for node in &list.nodes {
            self.walk(current, node)?;
        }
        Ok(())
    }

    fn walk(&mut self, current: &Ref<'_>, node: &Node) -> Result<()> {
        match node {
            Node::Text { text, .. } => {
                let text = compact_text(text);
                if !text.is_empty() {
                    self.add_fragment(Fragment::Literal(text));
                }
            }
            Node::Action { pipe, .. } => {
                let value = self.resolver.resolve_pipeline(current, pipe)?;
                let expr = value.value_expr(pipe.pos)?.to_string();
                self.add_fragment(Fragment::Value(expr));
            }
            Node::If(branch) => self.walk_if(current, branch)?,
            Node::Range(branch) => self.walk_range(current, branch)?,
            Node::List(list) => self.walk_list(current, list)?,
            Node::With(branch) => {
                return Err(CompileError::unsupported("with", "scoped `with` blocks", branch.pos));
            }
            Node::Break { pos } => {
                return Err(CompileError::unsupported("break", "loop control inside templates", *pos));
            }
            Node::Continue { pos } => {
                return Err(CompileError::unsupported("continue", "loop control inside templates", *pos));
            }
            Node::Template { pos, name } => {
                return Err(CompileError::unsupported(
                    "template",
                    format!("invocation of sub-template `{name}`"),
                    *pos,
                ));
            }
        }
        Ok(())
    }

    fn walk_if(&mut self, current: &Ref<'_>, branch: &Branch) -> Result<()> {
        let cond = self.resolver.resolve_pipeline(current, &branch.pipe)?;
        let test = condition(&cond, branch.pos)?;

        self.add_stmt(format!("if ({test}) {{"));
        self.walk_list(current, &branch.list)?;
        if let Some(else_list) = &branch.else_list {
            self.add_stmt("} else {");
            self.walk_list(current, else_list)?;
        }
        self.add_stmt("}");
        Ok(())
    }

    fn walk_range(&mut self, current: &Ref<'_>, branch: &Branch) -> Result<()> {
        if branch.else_list.is_some() {
            return Err(CompileError::unsupported("range", "`{{else}}` branch of a range", branch.pos));
        }
        let source = self.resolver.resolve_pipeline(current, &branch.pipe)?;
        let Some(elem) = source.node().and_then(Ty::element) else {
            return Err(CompileError::condition_type(
                "range",
                &source.path,
                format!("not iterable ({})", source.type_name()),
                branch.pos,
            ));
        };

        let index = loop_var(self.loop_depth);
        let len = format!("{}.length", source.path);
        self.add_stmt(format!("for (uint64 {index} = 0; {index} < {len}; {index}++) {{"));

        self.loop_depth += 1;
        self.walk_list(&source.element(elem, &index), &branch.list)?;
        self.loop_depth -= 1;

        self.add_stmt(format!("if ({index} < {len} - 1) {{"));
        self.add_fragment(Fragment::Literal(SEPARATOR.to_string()));
        self.add_stmt("}");
        self.add_stmt("}");
        Ok(())
    }
}

/// Numbers test non-zero, bools test themselves, arrays test non-empty.
fn condition(cond: &Ref<'_>, pos: Pos) -> Result<String> {
    match cond.node() {
        Some(ty) if ty.is_numeric() => Ok(format!("{} != 0", cond.path)),
        Some(ty) if ty.is_bool() => Ok(cond.path.clone()),
        Some(Ty::Sequence(_) | Ty::FixedArray(..)) => Ok(format!("{}.length > 0", cond.path)),
        _ => Err(CompileError::condition_type(
            "if",
            &cond.path,
            format!("no truth value for {}", cond.type_name()),
            pos,
        )),
    }
}

/// `i` for the outermost loop, then `i1`, `i2`, ... so nested loops never shadow.
fn loop_var(depth: usize) -> String {
    if depth == 0 { "i".to_string() } else { format!("i{depth}") }
}

static WHITESPACE_OUTSIDE_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"("[^"]*")|\s+"#).expect("whitespace pattern is valid"));

/// Output is compact JSON: drop line breaks, tabs and any whitespace that is
/// not inside a double-quoted string.
pub fn compact_text(text: &str) -> String {
    let text = text.trim().replace(['\n', '\t', '\r'], "");
    WHITESPACE_OUTSIDE_QUOTES.replace_all(&text, "$1").into_owned()
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

impl Fragment {
    pub fn render(&self) -> String {
        match self {
            Fragment::Literal(text) => string_literal(text),
            Fragment::Value(path) => path.clone(),
        }
    }
}

impl Operation {
    pub fn render(&self) -> String {
        match self {
            Operation::FragmentGroup(fragments) => {
                let args = fragments.iter().map(Fragment::render).collect::<Vec<_>>();
                format!("body = abi.encodePacked(body, {});", args.join(", "))
            }
            Operation::Statement(stmt) => stmt.clone(),
        }
    }
}

/// One rendered statement per operation.
pub fn render(ops: &[Operation]) -> String {
    ops.iter().map(Operation::render).collect::<Vec<_>>().join("\n")
}

/// Single-quoted Solidity string literal; non-ASCII text needs the `unicode` prefix.
fn string_literal(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
    if text.is_ascii() {
        format!("'{escaped}'")
    } else {
        format!("unicode'{escaped}'")
    }
}
