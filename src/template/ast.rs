use crate::error::Pos;

/// Sequence of nodes; the body of a template or of a branch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListNode {
    pub pos: Pos,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text between actions.
    Text { pos: Pos, text: String },
    /// `{{pipeline}}`
    Action { pos: Pos, pipe: Pipeline },
    /// `{{if pipeline}} list {{else}} list {{end}}`
    If(Branch),
    /// `{{range pipeline}} list {{end}}`
    Range(Branch),
    /// `{{with pipeline}} list {{end}}`
    With(Branch),
    List(ListNode),
    Break { pos: Pos },
    Continue { pos: Pos },
    /// `{{template "name" pipeline}}`
    Template { pos: Pos, name: String },
}

/// Shared shape of `if`, `range` and `with`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub pos: Pos,
    pub pipe: Pipeline,
    pub list: ListNode,
    pub else_list: Option<ListNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub pos: Pos,
    /// Variables declared with `$x :=` / assigned with `$x =`.
    pub decl: Vec<String>,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub pos: Pos,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// `.`
    Dot,
    /// `.a.b` as `["a", "b"]`
    Field(Vec<String>),
    /// Function name.
    Identifier(String),
    /// `$x`, without the sigil.
    Variable(String),
    String(String),
    Number(String),
}

impl Node {
    pub fn pos(&self) -> Pos {
        match self {
            Node::Text { pos, .. }
            | Node::Action { pos, .. }
            | Node::Break { pos }
            | Node::Continue { pos }
            | Node::Template { pos, .. } => *pos,
            Node::If(b) | Node::Range(b) | Node::With(b) => b.pos,
            Node::List(list) => list.pos,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Text { .. } => "text",
            Node::Action { .. } => "action",
            Node::If(_) => "if",
            Node::Range(_) => "range",
            Node::With(_) => "with",
            Node::List(_) => "list",
            Node::Break { .. } => "break",
            Node::Continue { .. } => "continue",
            Node::Template { .. } => "template",
        }
    }
}

impl Arg {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Arg::Dot => "dot",
            Arg::Field(_) => "field",
            Arg::Identifier(_) => "identifier",
            Arg::Variable(_) => "variable",
            Arg::String(_) => "string",
            Arg::Number(_) => "number",
        }
    }
}
