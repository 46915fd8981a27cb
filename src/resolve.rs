//! Path resolution: template field chains and builtin calls → typed access
//! expressions rooted at the function's parameter record.
use crate::builtins::{BuiltinFn, Builtins};
use crate::error::{CompileError, Pos, Result};
use crate::schema::Ty;
use crate::template::{Arg, Command, Pipeline};

/// Type side of a [`Ref`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefTy<'s> {
    Node(&'s Ty),
    /// Result of a builtin call; terminal.
    Opaque,
}

/// A typed value reference: its type and the Solidity expression that reads
/// it from the function parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Ref<'s> {
    pub ty: RefTy<'s>,
    pub path: String,
}

impl<'s> Ref<'s> {
    /// The parameter record itself. Its path is empty.
    pub fn root(ty: &'s Ty) -> Self {
        Self { ty: RefTy::Node(ty), path: String::new() }
    }

    pub fn node(&self) -> Option<&'s Ty> {
        match self.ty {
            RefTy::Node(ty) => Some(ty),
            RefTy::Opaque => None,
        }
    }

    pub fn field(&self, name: &str, ty: &'s Ty) -> Self {
        let path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        };
        Self { ty: RefTy::Node(ty), path }
    }

    /// Element of a sequence or fixed array indexed by loop variable `index`.
    pub fn element(&self, ty: &'s Ty, index: &str) -> Self {
        Self { ty: RefTy::Node(ty), path: format!("{}[{}]", self.path, index) }
    }

    /// The Solidity expression for this value. The parameter record itself
    /// has none, so it cannot be emitted or passed to a function.
    pub fn value_expr(&self, pos: Pos) -> Result<&str> {
        if self.path.is_empty() {
            return Err(CompileError::path(
                "",
                "the parameter record has no value expression; select a field such as `.obj0`",
                pos,
            ));
        }
        Ok(&self.path)
    }

    pub fn type_name(&self) -> String {
        match self.ty {
            RefTy::Node(ty) => ty.to_string(),
            RefTy::Opaque => "function result".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'b> {
    builtins: &'b Builtins,
}

impl<'b> Resolver<'b> {
    pub fn new(builtins: &'b Builtins) -> Self {
        Self { builtins }
    }

    /// Supported shapes: `arg`, `fn arg`, `arg | fn`.
    pub fn resolve_pipeline<'s>(&self, current: &Ref<'s>, pipe: &Pipeline) -> Result<Ref<'s>> {
        if let Some(var) = pipe.decl.first() {
            return Err(CompileError::unsupported("variable", format!("declaration of `${var}`"), pipe.pos));
        }
        match pipe.cmds.as_slice() {
            [cmd] => self.resolve_command(current, cmd),
            [first, call] => {
                let arg = self.resolve_command(current, first)?;
                match call.args.as_slice() {
                    [Arg::Identifier(name)] => self.call(name, &arg, call.pos),
                    _ => Err(CompileError::unsupported(
                        "pipeline",
                        "only `value | function` pipelines are supported",
                        call.pos,
                    )),
                }
            }
            cmds => Err(CompileError::unsupported(
                "pipeline",
                format!("{} chained commands; at most `value | function` is supported", cmds.len()),
                pipe.pos,
            )),
        }
    }

    pub fn resolve_command<'s>(&self, current: &Ref<'s>, cmd: &Command) -> Result<Ref<'s>> {
        match cmd.args.as_slice() {
            [Arg::Identifier(name), arg] => {
                let arg = self.resolve_arg(current, arg, cmd.pos)?;
                self.call(name, &arg, cmd.pos)
            }
            [Arg::Identifier(name), rest @ ..] => {
                let function = self.lookup(name, &current.path, cmd.pos)?;
                Err(CompileError::path(
                    &current.path,
                    format!("function `{}` takes exactly one argument, got {}", function.name, rest.len()),
                    cmd.pos,
                ))
            }
            [arg] => self.resolve_arg(current, arg, cmd.pos),
            args => Err(CompileError::unsupported(
                "command",
                format!("{} operands without a function", args.len()),
                cmd.pos,
            )),
        }
    }

    /// Resolve `.a.b` relative to `current`.
    pub fn resolve_field<'s>(&self, current: &Ref<'s>, idents: &[String], pos: Pos) -> Result<Ref<'s>> {
        let mut cur = current.clone();
        for ident in idents {
            let fields_of = match cur.node() {
                Some(ty) if matches!(ty, Ty::Record(_)) => ty,
                _ => {
                    return Err(CompileError::path(
                        &cur.path,
                        format!("not a record ({}), cannot select `{ident}`", cur.type_name()),
                        pos,
                    ));
                }
            };
            let Some(field) = fields_of.field(ident) else {
                let location = if cur.path.is_empty() {
                    "the parameter record".to_string()
                } else {
                    format!("`{}`", cur.path)
                };
                return Err(CompileError::path(
                    &cur.path,
                    format!("field `{ident}` not found in {location}"),
                    pos,
                ));
            };
            cur = cur.field(&field.name, &field.ty);
        }
        Ok(cur)
    }

    fn resolve_arg<'s>(&self, current: &Ref<'s>, arg: &Arg, pos: Pos) -> Result<Ref<'s>> {
        match arg {
            Arg::Dot => Ok(current.clone()),
            Arg::Field(idents) => self.resolve_field(current, idents, pos),
            Arg::Identifier(name) => Err(CompileError::unsupported(
                "argument",
                format!("function `{name}` used as an argument"),
                pos,
            )),
            Arg::Variable(name) => Err(CompileError::unsupported("variable", format!("`${name}`"), pos)),
            Arg::String(_) | Arg::Number(_) => Err(CompileError::unsupported(
                "argument",
                format!("{} literals", arg.kind_name()),
                pos,
            )),
        }
    }

    fn lookup(&self, name: &str, path: &str, pos: Pos) -> Result<&'b BuiltinFn> {
        self.builtins
            .get(name)
            .ok_or_else(|| CompileError::path(path, format!("function `{name}` not found"), pos))
    }

    fn call<'s>(&self, name: &str, arg: &Ref<'s>, pos: Pos) -> Result<Ref<'s>> {
        let function = self.lookup(name, &arg.path, pos)?;
        arg.value_expr(pos)?;
        Ok(Ref { ty: RefTy::Opaque, path: function.call(&arg.path) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::template::{Node, parse};

    fn schema(expr: &str) -> Ty {
        SchemaRegistry::new().define_type("Root", expr).unwrap().clone()
    }

    fn pipeline(src: &str) -> Pipeline {
        let root = parse(src).unwrap();
        match root.nodes.into_iter().next() {
            Some(Node::Action { pipe, .. }) => pipe,
            other => panic!("expected action, got {other:?}"),
        }
    }

    fn resolve<'s>(root: &'s Ty, src: &str) -> Result<Ref<'s>> {
        let builtins = Builtins::standard();
        Resolver::new(&builtins).resolve_pipeline(&Ref::root(root), &pipeline(src))
    }

    #[test]
    fn root_fields_have_bare_paths() {
        let ty = schema("record(record(uint256 c) a)");
        let r = resolve(&ty, "{{.a}}").unwrap();
        assert_eq!(r.path, "a");
        let r = resolve(&ty, "{{.a.c}}").unwrap();
        assert_eq!(r.path, "a.c");
        assert_eq!(r.node(), Some(&Ty::Scalar("uint256".into())));
    }

    #[test]
    fn nested_paths_extend_the_parent() {
        let ty = schema("record(record(record(bool z) y) x)");
        let builtins = Builtins::standard();
        let resolver = Resolver::new(&builtins);
        let x = resolver.resolve_field(&Ref::root(&ty), &["x".into()], 0).unwrap();
        let z = resolver.resolve_field(&x, &["y".into(), "z".into()], 0).unwrap();
        assert_eq!(z.path, format!("{}.y.z", x.path));
    }

    #[test]
    fn dot_is_identity_below_the_root() {
        let ty = schema("record(uint8[] xs)");
        let builtins = Builtins::standard();
        let resolver = Resolver::new(&builtins);
        let xs = resolver.resolve_field(&Ref::root(&ty), &["xs".into()], 0).unwrap();
        let elem = xs.element(xs.node().unwrap().element().unwrap(), "i");
        let same = resolver.resolve_pipeline(&elem, &pipeline("{{.}}")).unwrap();
        assert_eq!(same, elem);
        assert_eq!(same.path, "xs[i]");
    }

    #[test]
    fn dot_at_the_root_is_the_root() {
        let ty = schema("record(bool a)");
        let r = resolve(&ty, "{{.}}").unwrap();
        assert_eq!(r, Ref::root(&ty));
        assert!(matches!(r.value_expr(0), Err(CompileError::Path { .. })));
    }

    #[test]
    fn root_cannot_be_a_function_argument() {
        let ty = schema("record(uint256 n)");
        for src in ["{{toString .}}", "{{. | toHexString}}"] {
            let err = resolve(&ty, src).unwrap_err();
            assert!(matches!(err, CompileError::Path { .. }), "{src}: {err}");
            assert!(err.to_string().contains("no value expression"), "{src}: {err}");
        }
    }

    #[test]
    fn missing_field_and_non_record() {
        let ty = schema("record(record(uint256 c) a)");
        let err = resolve(&ty, "{{.missing}}").unwrap_err();
        assert!(matches!(err, CompileError::Path { .. }));
        assert!(err.to_string().contains("field `missing` not found in the parameter record"), "{err}");

        let err = resolve(&ty, "{{.a.nope}}").unwrap_err();
        assert!(err.to_string().contains("field `nope` not found in `a`"), "{err}");

        let err = resolve(&ty, "{{.a.c.d}}").unwrap_err();
        assert!(err.to_string().contains("not a record"), "{err}");
    }

    #[test]
    fn builtin_calls_render_and_are_opaque() {
        let ty = schema("record(uint256 n, address who)");
        let r = resolve(&ty, "{{toString .n}}").unwrap();
        assert_eq!(r.path, "LibString.toString(n)");
        assert_eq!(r.ty, RefTy::Opaque);

        let r = resolve(&ty, "{{.who | toHexString}}").unwrap();
        assert_eq!(r.path, "LibString.toHexString(who)");

        let builtins = Builtins::standard();
        let err = Resolver::new(&builtins).resolve_field(&r, &["x".into()], 0).unwrap_err();
        assert!(err.to_string().contains("not a record (function result)"), "{err}");
    }

    #[test]
    fn unknown_functions_and_arity() {
        let ty = schema("record(uint256 n)");
        let err = resolve(&ty, "{{printf .n}}").unwrap_err();
        assert!(matches!(err, CompileError::Path { .. }));
        assert!(err.to_string().contains("function `printf` not found"), "{err}");

        let err = resolve(&ty, "{{.n | printf}}").unwrap_err();
        assert!(err.to_string().contains("function `printf` not found"), "{err}");

        let err = resolve(&ty, "{{toString .n .n}}").unwrap_err();
        assert!(err.to_string().contains("takes exactly one argument, got 2"), "{err}");
    }

    #[test]
    fn injected_table_is_the_only_source_of_functions() {
        let ty = schema("record(uint256 n)");
        let empty = Builtins::empty();
        let err = Resolver::new(&empty)
            .resolve_pipeline(&Ref::root(&ty), &pipeline("{{toString .n}}"))
            .unwrap_err();
        assert!(err.to_string().contains("function `toString` not found"), "{err}");
    }

    #[test]
    fn unsupported_pipeline_shapes() {
        let ty = schema("record(uint256 n)");
        for src in [
            "{{$x := .n}}",
            "{{$x}}",
            "{{.n | toString | toHexString}}",
            "{{.n | toString .n}}",
            r#"{{toString "lit"}}"#,
            "{{toString 42}}",
            "{{.n .n}}",
        ] {
            let err = resolve(&ty, src).unwrap_err();
            assert!(matches!(err, CompileError::UnsupportedConstruct { .. }), "{src}: {err}");
        }
    }
}
