//! Schema registry: named type expressions parsed into an immutable type tree.
//!
//! ```text
//! type    := base suffix*
//! base    := scalar | ("record" | "tuple") "(" member ("," member)* ")" | name
//! member  := type ident
//! suffix  := "[]" | "[" digits "]"
//! ```
//!
//! A bare identifier that is not a scalar keyword refers to another named
//! type and is inlined as a copy of that type's tree.
use std::fmt;

use indexmap::IndexMap;

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Scalar(String),
    Record(Vec<Field>),      // declared order
    Sequence(Box<Ty>),
    FixedArray(Box<Ty>, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
}

impl Ty {
    pub fn record(fields: impl IntoIterator<Item = (String, Ty)>) -> Self {
        Ty::Record(fields.into_iter().map(|(name, ty)| Field { name, ty }).collect())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        match self {
            Ty::Record(fields) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    /// `uintN` / `intN` scalars.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Scalar(s) if s.starts_with("uint") || s.starts_with("int"))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Ty::Scalar(s) if s == "bool")
    }

    /// Element type of a sequence or fixed array.
    pub fn element(&self) -> Option<&Ty> {
        match self {
            Ty::Sequence(elem) | Ty::FixedArray(elem, _) => Some(elem),
            Ty::Scalar(_) | Ty::Record(_) => None,
        }
    }

    /// Number of type nodes, counting every inlined reference in full.
    pub fn node_count(&self) -> usize {
        match self {
            Ty::Scalar(_) => 1,
            Ty::Record(fields) => 1 + fields.iter().map(|f| f.ty.node_count()).sum::<usize>(),
            Ty::Sequence(elem) | Ty::FixedArray(elem, _) => 1 + elem.node_count(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Ty::Scalar(_) => "scalar",
            Ty::Record(_) => "record",
            Ty::Sequence(_) => "sequence",
            Ty::FixedArray(..) => "fixed array",
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Scalar(name) => f.write_str(name),
            Ty::Record(fields) => {
                f.write_str("record(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", field.ty, field.name)?;
                }
                f.write_str(")")
            }
            Ty::Sequence(elem) => write!(f, "{elem}[]"),
            Ty::FixedArray(elem, size) => write!(f, "{elem}[{size}]"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: IndexMap<String, Ty>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a `name → expression` mapping. Entries may refer
    /// to each other in any order; cycles are rejected.
    pub fn from_sources<I, K, V>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pending = sources
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<IndexMap<String, String>>();
        let mut registry = Self::new();
        for name in pending.keys() {
            check_type_name(name)?;
            let mut visiting = Vec::new();
            registry.build(name, &pending, &mut visiting)?;
        }
        Ok(registry)
    }

    /// Define one type. Named references must already be registered.
    pub fn define_type(&mut self, name: &str, expr: &str) -> Result<&Ty> {
        check_type_name(name)?;
        if self.types.contains_key(name) {
            return Err(CompileError::schema(name, "type is already defined"));
        }
        let types = &self.types;
        let ty = parse_type_expr(name, expr, &mut |reference: &str| {
            types
                .get(reference)
                .cloned()
                .ok_or_else(|| CompileError::schema(name, format!("undefined type `{reference}`")))
        })?;
        self.types.insert(name.to_string(), ty);
        self.types
            .get(name)
            .ok_or_else(|| CompileError::schema(name, "type vanished after definition"))
    }

    pub fn resolve(&self, name: &str) -> Option<&Ty> {
        self.types.get(name)
    }

    /// Registered types in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Ty)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn build(
        &mut self,
        name: &str,
        pending: &IndexMap<String, String>,
        visiting: &mut Vec<String>,
    ) -> Result<Ty> {
        if let Some(ty) = self.types.get(name) {
            return Ok(ty.clone());
        }
        if visiting.iter().any(|v| v == name) {
            let mut chain = visiting.clone();
            chain.push(name.to_string());
            return Err(CompileError::schema(
                name,
                format!("cyclic type reference: {}", chain.join(" -> ")),
            ));
        }
        let Some(src) = pending.get(name) else {
            let referrer = visiting.last().map(String::as_str).unwrap_or(name);
            return Err(CompileError::schema(referrer, format!("undefined type `{name}`")));
        };

        visiting.push(name.to_string());
        let ty = parse_type_expr(name, src, &mut |reference: &str| self.build(reference, pending, visiting))?;
        visiting.pop();

        self.types.insert(name.to_string(), ty.clone());
        Ok(ty)
    }
}

fn check_type_name(name: &str) -> Result<()> {
    if !is_ident(name) {
        return Err(CompileError::schema(name, "type names must be identifiers"));
    }
    if scalar_name(name).is_some() || matches!(name, "record" | "tuple") {
        return Err(CompileError::schema(name, "type name shadows a builtin type keyword"));
    }
    Ok(())
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Canonical scalar name for a keyword, if it is one.
pub fn scalar_name(ident: &str) -> Option<String> {
    fn sized(rest: &str, valid: impl Fn(u32) -> bool) -> bool {
        !rest.starts_with('0') && rest.parse::<u32>().is_ok_and(valid)
    }
    match ident {
        "bool" | "address" | "string" | "bytes" => Some(ident.to_string()),
        "uint" => Some("uint256".to_string()),
        "int" => Some("int256".to_string()),
        _ => {
            let ok = if let Some(rest) = ident.strip_prefix("uint") {
                sized(rest, |n| n % 8 == 0 && (8..=256).contains(&n))
            } else if let Some(rest) = ident.strip_prefix("int") {
                sized(rest, |n| n % 8 == 0 && (8..=256).contains(&n))
            } else if let Some(rest) = ident.strip_prefix("bytes") {
                sized(rest, |n| (1..=32).contains(&n))
            } else {
                false
            };
            ok.then(|| ident.to_string())
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE EXPRESSION PARSER
// ————————————————————————————————————————————————————————————————————————————

/// Named references are inlined by value, so a chain of entries that each
/// reference the next several times grows geometrically. Every parsed type
/// is capped at this many nodes, which keeps each lookup bounded.
pub const MAX_TYPE_NODES: usize = 4096;

/// Parse `expr` (the definition of `name`); `lookup` resolves named references.
pub fn parse_type_expr(
    name: &str,
    expr: &str,
    lookup: &mut dyn FnMut(&str) -> Result<Ty>,
) -> Result<Ty> {
    let mut parser = TypeParser { name, src: expr, pos: 0, lookup };
    let ty = parser.parse_type()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
        return Err(parser.error(format!("unexpected trailing input `{}`", &parser.src[parser.pos..])));
    }
    let nodes = ty.node_count();
    if nodes > MAX_TYPE_NODES {
        return Err(CompileError::schema(
            name,
            format!("type expands to {nodes} nodes, more than the limit of {MAX_TYPE_NODES}"),
        ));
    }
    Ok(ty)
}

struct TypeParser<'a, 'f> {
    name: &'a str,
    src: &'a str,
    pos: usize,
    lookup: &'f mut dyn FnMut(&str) -> Result<Ty>,
}

impl<'a> TypeParser<'a, '_> {
    fn parse_type(&mut self) -> Result<Ty> {
        let ident = self.ident()?;
        let mut ty = match ident {
            "record" | "tuple" => self.parse_members()?,
            _ => match scalar_name(ident) {
                Some(scalar) => Ty::Scalar(scalar),
                None => (self.lookup)(ident)?,
            },
        };

        while self.eat('[') {
            if self.eat(']') {
                ty = Ty::Sequence(Box::new(ty));
                continue;
            }
            let size = self.number()?;
            if size == 0 {
                return Err(self.error("fixed array size must be positive"));
            }
            self.expect(']')?;
            ty = Ty::FixedArray(Box::new(ty), size);
        }
        Ok(ty)
    }

    fn parse_members(&mut self) -> Result<Ty> {
        self.expect('(')?;
        if self.peek() == Some(')') {
            return Err(self.error("a record needs at least one member"));
        }
        let mut fields: Vec<Field> = Vec::new();
        loop {
            let ty = self.parse_type()?;
            let field_name = self.ident()?.to_string();
            if fields.iter().any(|f| f.name == field_name) {
                return Err(self.error(format!("duplicate member `{field_name}`")));
            }
            fields.push(Field { name: field_name, ty });
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            break;
        }
        Ok(Ty::Record(fields))
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{c}`")))
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let src = self.src;
        let rest = &src[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_alphabetic() || c == '_' || (i > 0 && c.is_ascii_digit())))
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return Err(self.error("expected identifier"));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&src[start..self.pos])
    }

    fn number(&mut self) -> Result<usize> {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 {
            return Err(self.error("expected array size or `]`"));
        }
        let digits = &rest[..len];
        let size = digits
            .parse::<usize>()
            .map_err(|_| self.error(format!("array size `{digits}` out of range")))?;
        self.pos += len;
        Ok(size)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::schema(self.name, format!("{} (at offset {} of `{}`)", message.into(), self.pos, self.src))
    }
}
