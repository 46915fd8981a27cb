use super::ast::{Arg, Branch, Command, ListNode, Node, Pipeline};
use super::lexer::{SpannedToken, Token, lex};
use crate::error::{CompileError, Pos, Result};

/// Parse template source into its root list.
pub fn parse(source: &str) -> Result<ListNode> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0, end: source.len() };
    let (list, term) = parser.parse_list()?;
    match term {
        Terminator::Eof => Ok(list),
        Terminator::End(pos) => Err(CompileError::syntax("unexpected {{end}}", pos)),
        Terminator::Else(pos) | Terminator::ElseIf(pos, _) => {
            Err(CompileError::syntax("unexpected {{else}}", pos))
        }
    }
}

/// What stopped a list.
enum Terminator {
    Eof,
    End(Pos),
    Else(Pos),
    ElseIf(Pos, Pipeline),
}

enum Step {
    Node(Node),
    Stop(Terminator),
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    end: Pos,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_pos(&self) -> Pos {
        self.tokens.get(self.pos).map_or(self.end, |t| t.pos)
    }

    fn advance(&mut self) -> SpannedToken {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                tok.clone()
            }
            None => SpannedToken { token: Token::Eof, pos: self.end },
        }
    }

    fn parse_list(&mut self) -> Result<(ListNode, Terminator)> {
        let mut list = ListNode { pos: self.peek_pos(), nodes: Vec::new() };
        loop {
            let tok = self.advance();
            match tok.token {
                Token::Eof => return Ok((list, Terminator::Eof)),
                Token::Text(text) => list.nodes.push(Node::Text { pos: tok.pos, text }),
                Token::LeftDelim => match self.parse_action(tok.pos)? {
                    Step::Node(node) => list.nodes.push(node),
                    Step::Stop(term) => return Ok((list, term)),
                },
                other => {
                    return Err(CompileError::syntax(format!("unexpected {other:?} outside action"), tok.pos));
                }
            }
        }
    }

    /// Parse what follows a `{{`; `open` is the delimiter's offset.
    fn parse_action(&mut self, open: Pos) -> Result<Step> {
        let keyword = match self.peek() {
            Some(tok) => tok.clone(),
            None => return Err(CompileError::syntax("unclosed action", open)),
        };
        let node = match keyword {
            Token::If => {
                self.advance();
                let pipe = self.parse_pipeline("if", open)?;
                Node::If(self.parse_branch("if", open, pipe)?)
            }
            Token::Range => {
                self.advance();
                let pipe = self.parse_pipeline("range", open)?;
                Node::Range(self.parse_branch("range", open, pipe)?)
            }
            Token::With => {
                self.advance();
                let pipe = self.parse_pipeline("with", open)?;
                Node::With(self.parse_branch("with", open, pipe)?)
            }
            Token::End => {
                self.advance();
                self.expect_right_delim("end")?;
                return Ok(Step::Stop(Terminator::End(open)));
            }
            Token::Else => {
                self.advance();
                if self.peek() == Some(&Token::If) {
                    self.advance();
                    let pipe = self.parse_pipeline("else if", open)?;
                    return Ok(Step::Stop(Terminator::ElseIf(open, pipe)));
                }
                self.expect_right_delim("else")?;
                return Ok(Step::Stop(Terminator::Else(open)));
            }
            Token::Break => {
                self.advance();
                self.expect_right_delim("break")?;
                Node::Break { pos: open }
            }
            Token::Continue => {
                self.advance();
                self.expect_right_delim("continue")?;
                Node::Continue { pos: open }
            }
            Token::Template => {
                self.advance();
                let name = match self.advance() {
                    SpannedToken { token: Token::String(name), .. } => name,
                    tok => return Err(CompileError::syntax("template name must be a quoted string", tok.pos)),
                };
                if self.peek() == Some(&Token::RightDelim) {
                    self.advance();
                } else {
                    self.parse_pipeline("template", open)?;
                }
                Node::Template { pos: open, name }
            }
            Token::Define => return Err(CompileError::unsupported("define", "nested template definitions", open)),
            Token::Block => return Err(CompileError::unsupported("block", "nested template definitions", open)),
            _ => Node::Action { pos: open, pipe: self.parse_pipeline("command", open)? },
        };
        Ok(Step::Node(node))
    }

    fn parse_branch(&mut self, kind: &'static str, pos: Pos, pipe: Pipeline) -> Result<Branch> {
        let (list, term) = self.parse_list()?;
        let else_list = match term {
            Terminator::End(_) => None,
            Terminator::Eof => return Err(missing_end(kind, pos)),
            Terminator::Else(_) => {
                let (else_list, term) = self.parse_list()?;
                match term {
                    Terminator::End(_) => Some(else_list),
                    Terminator::Eof => return Err(missing_end(kind, pos)),
                    Terminator::Else(p) | Terminator::ElseIf(p, _) => {
                        return Err(CompileError::syntax("expected {{end}} after {{else}} branch", p));
                    }
                }
            }
            // `{{else if x}}` is an `if` nested in the else branch, sharing our `{{end}}`.
            Terminator::ElseIf(else_pos, else_pipe) => {
                if kind != "if" {
                    return Err(CompileError::syntax(format!("{{{{else if}}}} inside {kind}"), else_pos));
                }
                let nested = self.parse_branch("if", else_pos, else_pipe)?;
                Some(ListNode { pos: else_pos, nodes: vec![Node::If(nested)] })
            }
        };
        Ok(Branch { pos, pipe, list, else_list })
    }

    /// Parse a pipeline up to and including the closing `}}`.
    fn parse_pipeline(&mut self, context: &str, open: Pos) -> Result<Pipeline> {
        let mut pipe = Pipeline { pos: self.peek_pos(), decl: Vec::new(), cmds: Vec::new() };

        if let Some(Token::Variable(name)) = self.peek() {
            let name = name.clone();
            let declares = self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|t| matches!(t.token, Token::Declare | Token::Assign));
            if declares {
                self.pos += 2;
                pipe.decl.push(name);
            }
        }

        let mut cmd = Command { pos: self.peek_pos(), args: Vec::new() };
        loop {
            let tok = self.advance();
            let arg = match tok.token {
                Token::RightDelim => break,
                Token::Pipe => {
                    if cmd.args.is_empty() {
                        return Err(CompileError::syntax("missing command before `|`", tok.pos));
                    }
                    let next = Command { pos: self.peek_pos(), args: Vec::new() };
                    pipe.cmds.push(std::mem::replace(&mut cmd, next));
                    continue;
                }
                Token::Dot => Arg::Dot,
                Token::Field(idents) => Arg::Field(idents),
                Token::Ident(name) => Arg::Identifier(name),
                Token::Variable(name) => Arg::Variable(name),
                Token::String(s) => Arg::String(s),
                Token::Number(n) => Arg::Number(n),
                Token::LParen | Token::RParen => {
                    return Err(CompileError::unsupported("pipeline", "parenthesized sub-pipelines", tok.pos));
                }
                Token::Eof => return Err(CompileError::syntax("unclosed action", open)),
                other => {
                    return Err(CompileError::syntax(format!("unexpected {other:?} in {context}"), tok.pos));
                }
            };
            cmd.args.push(arg);
        }

        if cmd.args.is_empty() {
            if !pipe.cmds.is_empty() {
                return Err(CompileError::syntax("missing command after `|`", cmd.pos));
            }
            return Err(CompileError::syntax(format!("missing value for {context}"), open));
        }
        pipe.cmds.push(cmd);
        Ok(pipe)
    }

    fn expect_right_delim(&mut self, context: &str) -> Result<()> {
        let tok = self.advance();
        match tok.token {
            Token::RightDelim => Ok(()),
            other => Err(CompileError::syntax(format!("unexpected {other:?} in {context}"), tok.pos)),
        }
    }
}

fn missing_end(kind: &str, pos: Pos) -> CompileError {
    CompileError::syntax(format!("missing {{{{end}}}} for {kind}"), pos)
}
