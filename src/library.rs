//! Whole-config compilation: struct declarations plus one compiled function
//! per configured template.
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::builtins::Builtins;
use crate::config::{Config, FunctionDef};
use crate::declare::{Declarations, RecordDecl};
use crate::emit::{self, Operation};
use crate::error::CompileError;
use crate::schema::{Field, SchemaRegistry, Ty};
use crate::template;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Library {
    pub contract_name: String,
    pub structs: Vec<RecordDecl>,
    pub functions: Vec<CompiledFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub ops: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub ty: String,
    /// `memory` for reference types, absent for value types.
    pub location: Option<&'static str>,
    pub name: String,
}

impl Param {
    pub fn render(&self) -> String {
        match self.location {
            Some(location) => format!("{} {location} {}", self.ty, self.name),
            None => format!("{} {}", self.ty, self.name),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Schema(CompileError),
    #[error("in function `{function}`")]
    Unit {
        function: String,
        template: String,
        #[source]
        source: CompileError,
    },
}

impl GenerateError {
    /// One-line report; template errors point at `line:col`.
    pub fn report(&self) -> String {
        match self {
            GenerateError::Schema(source) => source.format_with_source(""),
            GenerateError::Unit { function, template, source } => {
                format!("function `{function}`: {}", source.format_with_source(template))
            }
        }
    }
}

pub fn compile_library(config: &Config, builtins: &Builtins) -> Result<Library, GenerateError> {
    info!("compiling library `{}`", config.contract_name);
    let registry = config.registry().map_err(GenerateError::Schema)?;

    let mut decls = Declarations::new();
    for name in config.structs.keys() {
        if let Some(ty) = registry.resolve(name) {
            decls.declare_entry(name, ty);
        }
    }

    let units = config.functions.iter().collect::<Vec<_>>();
    let results = units
        .par_iter()
        .map(|(name, def)| {
            compile_function(&registry, &decls, name, def, builtins).map_err(|source| GenerateError::Unit {
                function: name.to_string(),
                template: def.template.clone(),
                source,
            })
        })
        .collect::<Vec<_>>();

    // First failure in declaration order, regardless of which thread hit it.
    let mut functions = Vec::with_capacity(results.len());
    for result in results {
        if let Some(function) = result? {
            functions.push(function);
        }
    }

    Ok(Library {
        contract_name: config.contract_name.clone(),
        structs: decls.into_decls(),
        functions,
    })
}

/// `None` when the function has no inputs.
pub fn compile_function(
    registry: &SchemaRegistry,
    decls: &Declarations,
    name: &str,
    def: &FunctionDef,
    builtins: &Builtins,
) -> Result<Option<CompiledFunction>, CompileError> {
    if def.inputs.is_empty() {
        warn!("function `{name}` has no inputs; skipping");
        return Ok(None);
    }
    info!("compiling function `{name}`");

    let mut fields = Vec::with_capacity(def.inputs.len());
    let mut params = Vec::with_capacity(def.inputs.len());
    for (index, input) in def.inputs.iter().enumerate() {
        let ty = registry
            .resolve(input)
            .ok_or_else(|| CompileError::schema(input, "undefined struct used as a function input"))?;
        let param_name = format!("obj{index}");
        params.push(Param {
            ty: decls.reference(input).unwrap_or(input).to_string(),
            location: data_location(ty),
            name: param_name.clone(),
        });
        fields.push(Field { name: param_name, ty: ty.clone() });
    }
    let root = Ty::Record(fields);

    let ast = template::parse(&def.template)?;
    let ops = emit::compile(&root, &ast, builtins)?;
    debug!("function `{name}`: {} operations", ops.len());

    Ok(Some(CompiledFunction { name: name.to_string(), params, ops }))
}

fn data_location(ty: &Ty) -> Option<&'static str> {
    match ty {
        Ty::Record(_) | Ty::Sequence(_) | Ty::FixedArray(..) => Some("memory"),
        Ty::Scalar(name) if name == "string" || name == "bytes" => Some("memory"),
        Ty::Scalar(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(src: &str) -> Config {
        Config::from_json(src).unwrap()
    }

    #[test]
    fn functions_keep_declaration_order() {
        let config = config(
            r#"{
                "contract_name": "Enc",
                "structs": { "Point": { "type": "record(int64 x, int64 y)" } },
                "functions": {
                    "b": { "template": "{{toString .obj0.x}}", "inputs": ["Point"] },
                    "a": { "template": "{{toString .obj0.y}}", "inputs": ["Point"] },
                    "c": { "template": "{{toString .obj1.x}}", "inputs": ["Point", "Point"] }
                }
            }"#,
        );
        let library = compile_library(&config, &Builtins::standard()).unwrap();
        let names = library.functions.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(library.structs.len(), 1);
        assert_eq!(
            library.functions[2].params.iter().map(Param::render).collect::<Vec<_>>(),
            ["Point memory obj0", "Point memory obj1"],
        );
    }

    #[test]
    fn value_type_inputs_have_no_location() {
        let config = config(
            r#"{
                "contract_name": "Enc",
                "structs": { "Amount": { "type": "uint" }, "Label": { "type": "string" } },
                "functions": { "f": { "template": "{{toString .obj0}}{{.obj1}}", "inputs": ["Amount", "Label"] } }
            }"#,
        );
        let library = compile_library(&config, &Builtins::standard()).unwrap();
        let params = library.functions[0].params.iter().map(Param::render).collect::<Vec<_>>();
        assert_eq!(params, ["uint256 obj0", "string memory obj1"]);
        assert!(library.structs.is_empty());
    }

    #[test]
    fn functions_without_inputs_are_skipped() {
        let config = config(
            r#"{
                "contract_name": "Enc",
                "functions": { "nothing": { "template": "{}" } }
            }"#,
        );
        let library = compile_library(&config, &Builtins::standard()).unwrap();
        assert!(library.functions.is_empty());
    }

    #[test]
    fn undefined_input_is_a_schema_error() {
        let config = config(
            r#"{
                "contract_name": "Enc",
                "functions": { "f": { "template": "{}", "inputs": ["Ghost"] } }
            }"#,
        );
        let err = compile_library(&config, &Builtins::standard()).unwrap_err();
        let GenerateError::Unit { function, source, .. } = err else { panic!("expected unit error") };
        assert_eq!(function, "f");
        assert!(matches!(source, CompileError::Schema { .. }));
    }

    #[test]
    fn first_failing_unit_in_order_is_reported() {
        let config = config(
            r#"{
                "contract_name": "Enc",
                "structs": { "P": { "type": "record(bool ok)" } },
                "functions": {
                    "good": { "template": "{{if .obj0.ok}}1{{end}}", "inputs": ["P"] },
                    "first": { "template": "{{.obj0.nope}}", "inputs": ["P"] },
                    "second": { "template": "{{if .obj0}}x{{end}}", "inputs": ["P"] }
                }
            }"#,
        );
        let err = compile_library(&config, &Builtins::standard()).unwrap_err();
        assert!(matches!(&err, GenerateError::Unit { function, .. } if function == "first"), "{err}");
    }

    #[test]
    fn report_points_into_the_template() {
        let config = config(
            r#"{
                "contract_name": "Enc",
                "structs": { "P": { "type": "record(bool ok)" } },
                "functions": { "f": { "template": "{\n  \"v\": {{.obj0.nope}}\n}", "inputs": ["P"] } }
            }"#,
        );
        let err = compile_library(&config, &Builtins::standard()).unwrap_err();
        let report = err.report();
        assert!(report.starts_with("function `f`: [path] line 2:"), "{report}");
    }

    #[test]
    fn cyclic_structs_fail_before_any_unit() {
        let config = config(
            r#"{
                "contract_name": "Enc",
                "structs": { "A": { "type": "record(B b)" }, "B": { "type": "record(A a)" } },
                "functions": { "f": { "template": "{}", "inputs": ["A"] } }
            }"#,
        );
        let err = compile_library(&config, &Builtins::standard()).unwrap_err();
        assert!(matches!(err, GenerateError::Schema(CompileError::Schema { .. })));
    }
}
