//! Errors raised while building a schema or compiling a template.
//!
//! Every variant aborts the compile unit it was raised in. Template-level
//! variants carry the byte offset of the offending node so callers can point
//! at it with [`CompileError::format_with_source`].
use thiserror::Error;

/// Byte offset into a template source.
pub type Pos = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Malformed or unresolvable type expression.
    #[error("schema error in `{name}`: {message}")]
    Schema { name: String, message: String },

    /// Field or function resolution failure.
    #[error("path error at `{path}`: {message}")]
    Path { path: String, message: String, pos: Pos },

    /// `if`/`range` operand with no truthiness or iteration rule.
    #[error("{node} on `{path}`: {message}")]
    ConditionType { node: &'static str, path: String, message: String, pos: Pos },

    /// Template node or control form outside the supported subset.
    #[error("unsupported {node}: {message}")]
    UnsupportedConstruct { node: &'static str, message: String, pos: Pos },

    /// Malformed template source.
    #[error("template syntax error: {message}")]
    Syntax { message: String, pos: Pos },
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

impl CompileError {
    pub fn schema(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema { name: name.into(), message: message.into() }
    }

    pub fn path(path: &str, message: impl Into<String>, pos: Pos) -> Self {
        Self::Path { path: display_path(path).to_string(), message: message.into(), pos }
    }

    pub fn condition_type(node: &'static str, path: &str, message: impl Into<String>, pos: Pos) -> Self {
        Self::ConditionType {
            node,
            path: display_path(path).to_string(),
            message: message.into(),
            pos,
        }
    }

    pub fn unsupported(node: &'static str, message: impl Into<String>, pos: Pos) -> Self {
        Self::UnsupportedConstruct { node, message: message.into(), pos }
    }

    pub fn syntax(message: impl Into<String>, pos: Pos) -> Self {
        Self::Syntax { message: message.into(), pos }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema",
            Self::Path { .. } => "path",
            Self::ConditionType { .. } => "condition-type",
            Self::UnsupportedConstruct { .. } => "unsupported",
            Self::Syntax { .. } => "syntax",
        }
    }

    /// Template offset of the offending node. Schema errors have none.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Self::Schema { .. } => None,
            Self::Path { pos, .. }
            | Self::ConditionType { pos, .. }
            | Self::UnsupportedConstruct { pos, .. }
            | Self::Syntax { pos, .. } => Some(*pos),
        }
    }

    /// Format the error with a `line:col` location resolved against `source`.
    pub fn format_with_source(&self, source: &str) -> String {
        match self.pos() {
            Some(pos) => {
                let (line, col) = offset_to_line_col(source, pos);
                format!("[{}] line {}:{}: {}", self.kind(), line, col, self)
            }
            None => format!("[{}] {}", self.kind(), self),
        }
    }
}

/// The root reference has an empty access path; show it as `.`.
fn display_path(path: &str) -> &str {
    if path.is_empty() { "." } else { path }
}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_newlines() {
        let src = "{{.a}}\n  {{.b}}";
        assert_eq!(offset_to_line_col(src, 0), (1, 1));
        assert_eq!(offset_to_line_col(src, 9), (2, 3));
    }

    #[test]
    fn root_path_displays_as_dot() {
        let err = CompileError::path("", "field `x` not found", 3);
        assert_eq!(err.to_string(), "path error at `.`: field `x` not found");
        assert_eq!(
            err.format_with_source("ab\n{{.x}}"),
            "[path] line 2:1: path error at `.`: field `x` not found",
        );
    }

    #[test]
    fn schema_errors_have_no_position() {
        let err = CompileError::schema("Foo", "unknown type `Bar`");
        assert_eq!(err.pos(), None);
        assert_eq!(err.format_with_source(""), "[schema] schema error in `Foo`: unknown type `Bar`");
    }
}
