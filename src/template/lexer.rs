use crate::error::{CompileError, Pos, Result};

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    LeftDelim,
    RightDelim,

    // Operands
    Dot,
    Field(Vec<String>),
    Ident(String),
    Variable(String),
    String(String),
    Number(String),

    // Keywords
    If,
    Else,
    End,
    Range,
    With,
    Break,
    Continue,
    Template,
    Define,
    Block,

    // Punctuation
    Pipe,
    Declare, // :=
    Assign,  // =
    LParen,
    RParen,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: Pos,
}

pub fn lex(source: &str) -> Result<Vec<SpannedToken>> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<SpannedToken>,
    /// Set by a `-}}` marker: trim leading whitespace of the next text.
    trim_next: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0, tokens: Vec::new(), trim_next: false }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn push(&mut self, token: Token, pos: Pos) {
        self.tokens.push(SpannedToken { token, pos });
    }

    fn tokenize(&mut self) -> Result<()> {
        while self.pos < self.source.len() {
            let start = self.pos;
            let (text_end, action) = match self.rest().find(LEFT_DELIM) {
                Some(off) => (start + off, true),
                None => (self.source.len(), false),
            };

            let trim_left = action && {
                let inner = &self.source[text_end + LEFT_DELIM.len()..];
                inner.starts_with('-') && inner[1..].starts_with(char::is_whitespace)
            };
            let mut text = &self.source[start..text_end];
            if std::mem::take(&mut self.trim_next) {
                text = text.trim_start();
            }
            if trim_left {
                text = text.trim_end();
            }
            if !text.is_empty() {
                self.push(Token::Text(text.to_string()), start);
            }

            if !action {
                self.pos = self.source.len();
                break;
            }
            self.pos = text_end + LEFT_DELIM.len();
            if trim_left {
                self.pos += 1;
            }
            self.lex_action(text_end)?;
        }
        self.push(Token::Eof, self.source.len());
        Ok(())
    }

    /// Lex one `{{ ... }}`; `open` is the offset of its left delimiter.
    fn lex_action(&mut self, open: Pos) -> Result<()> {
        self.skip_whitespace();
        if self.rest().starts_with(LEFT_COMMENT) {
            return self.lex_comment(open);
        }

        self.push(Token::LeftDelim, open);
        loop {
            let skipped = self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with(RIGHT_DELIM) {
                self.push(Token::RightDelim, self.pos);
                self.pos += RIGHT_DELIM.len();
                return Ok(());
            }
            if skipped && rest.starts_with("-}}") {
                self.push(Token::RightDelim, self.pos);
                self.pos += 1 + RIGHT_DELIM.len();
                self.trim_next = true;
                return Ok(());
            }
            if rest.is_empty() {
                return Err(CompileError::syntax("unclosed action", open));
            }
            self.lex_operand()?;
        }
    }

    fn lex_comment(&mut self, open: Pos) -> Result<()> {
        let Some(end) = self.rest().find(RIGHT_COMMENT) else {
            return Err(CompileError::syntax("unclosed comment", open));
        };
        self.pos += end + RIGHT_COMMENT.len();
        let skipped = self.skip_whitespace();
        let rest = self.rest();
        if rest.starts_with(RIGHT_DELIM) {
            self.pos += RIGHT_DELIM.len();
        } else if skipped && rest.starts_with("-}}") {
            self.pos += 1 + RIGHT_DELIM.len();
            self.trim_next = true;
        } else {
            return Err(CompileError::syntax("comment ends before closing delimiter", open));
        }
        Ok(())
    }

    fn lex_operand(&mut self) -> Result<()> {
        let start = self.pos;
        let rest = self.rest();
        let mut chars = rest.chars();
        let Some(ch) = chars.next() else {
            return Err(CompileError::syntax("unexpected end of action", start));
        };
        let next = chars.next();

        match ch {
            '.' if next.is_some_and(is_ident_start) => {
                let mut idents = Vec::new();
                while self.rest().starts_with('.') && self.rest()[1..].starts_with(is_ident_start) {
                    self.pos += 1;
                    idents.push(self.take_ident().to_string());
                }
                self.push(Token::Field(idents), start);
            }
            '.' => {
                self.pos += 1;
                self.push(Token::Dot, start);
            }
            '$' => {
                self.pos += 1;
                let name = self.take_ident().to_string();
                self.push(Token::Variable(name), start);
            }
            ':' if next == Some('=') => {
                self.pos += 2;
                self.push(Token::Declare, start);
            }
            '=' => {
                self.pos += 1;
                self.push(Token::Assign, start);
            }
            '|' => {
                self.pos += 1;
                self.push(Token::Pipe, start);
            }
            '(' => {
                self.pos += 1;
                self.push(Token::LParen, start);
            }
            ')' => {
                self.pos += 1;
                self.push(Token::RParen, start);
            }
            '"' => self.lex_quoted(start)?,
            '`' => {
                let Some(end) = rest[1..].find('`') else {
                    return Err(CompileError::syntax("unterminated raw string", start));
                };
                self.pos += end + 2;
                self.push(Token::String(rest[1..=end].to_string()), start);
            }
            c if c.is_ascii_digit() || (matches!(c, '-' | '+') && next.is_some_and(|n| n.is_ascii_digit())) => {
                let len = 1 + rest[1..]
                    .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_')))
                    .unwrap_or(rest.len() - 1);
                self.pos += len;
                self.push(Token::Number(rest[..len].to_string()), start);
            }
            c if is_ident_start(c) => {
                let ident = self.take_ident();
                let token = match ident {
                    "if" => Token::If,
                    "else" => Token::Else,
                    "end" => Token::End,
                    "range" => Token::Range,
                    "with" => Token::With,
                    "break" => Token::Break,
                    "continue" => Token::Continue,
                    "template" => Token::Template,
                    "define" => Token::Define,
                    "block" => Token::Block,
                    _ => Token::Ident(ident.to_string()),
                };
                self.push(token, start);
            }
            c => {
                return Err(CompileError::syntax(format!("unexpected character `{c}` in action"), start));
            }
        }
        Ok(())
    }

    fn lex_quoted(&mut self, start: Pos) -> Result<()> {
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    self.push(Token::String(value), start);
                    return Ok(());
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, other)) => {
                        return Err(CompileError::syntax(format!("unknown escape `\\{other}`"), start));
                    }
                    None => break,
                },
                '\n' => break,
                c => value.push(c),
            }
        }
        Err(CompileError::syntax("unterminated quoted string", start))
    }

    fn take_ident(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Returns whether any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let rest = self.rest();
        let len = rest.len() - rest.trim_start().len();
        self.pos += len;
        len > 0
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
