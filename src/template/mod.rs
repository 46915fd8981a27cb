//! `text/template`-style front end: `{{ }}` actions, `if`/`else`/`range`,
//! trim markers and comments.
pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Arg, Branch, Command, ListNode, Node, Pipeline};
pub use parser::parse;
