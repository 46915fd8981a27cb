//! Solidity `struct` declarations derived from schema entries.
//!
//! Records are declared bottom-up: members first, then the record itself, so
//! the list can be emitted in order without forward references. A nested
//! record is named after the member that holds it (`items` → `Items`).
use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::Ty;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDecl {
    pub name: String,
    /// `(field name, rendered type)` in declared order.
    pub fields: Vec<(String, String)>,
}

impl RecordDecl {
    pub fn render(&self) -> String {
        let mut out = format!("struct {} {{\n", self.name);
        for (field, ty) in &self.fields {
            out.push_str(&format!("    {ty} {field};\n"));
        }
        out.push('}');
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct Declarations {
    decls: Vec<RecordDecl>,
    /// schema entry name → reference name
    entries: IndexMap<String, String>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named schema entry once; later calls return the cached name.
    pub fn declare_entry(&mut self, entry: &str, ty: &Ty) -> String {
        if let Some(reference) = self.entries.get(entry) {
            return reference.clone();
        }
        let reference = self.declare(entry, ty);
        self.entries.insert(entry.to_string(), reference.clone());
        reference
    }

    /// Declare `ty` under `name` and return the type name enclosing
    /// declarations should use. Scalars declare nothing.
    pub fn declare(&mut self, name: &str, ty: &Ty) -> String {
        match ty {
            Ty::Scalar(scalar) => scalar.clone(),
            Ty::Sequence(elem) => format!("{}[]", self.declare(name, elem)),
            Ty::FixedArray(elem, size) => format!("{}[{size}]", self.declare(name, elem)),
            Ty::Record(fields) => {
                let fields = fields
                    .iter()
                    .map(|f| (f.name.clone(), self.declare(&f.name, &f.ty)))
                    .collect();
                let decl_name = decl_name(name);
                self.decls.push(RecordDecl { name: decl_name.clone(), fields });
                decl_name
            }
        }
    }

    /// Reference name of an already declared entry.
    pub fn reference(&self, entry: &str) -> Option<&str> {
        self.entries.get(entry).map(String::as_str)
    }

    pub fn decls(&self) -> &[RecordDecl] {
        &self.decls
    }

    pub fn into_decls(self) -> Vec<RecordDecl> {
        self.decls
    }
}

/// First letter upper-cased; the rest is kept as written.
pub fn decl_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    fn ty(expr: &str) -> Ty {
        SchemaRegistry::new().define_type("T", expr).unwrap().clone()
    }

    #[test]
    fn records_are_declared_bottom_up() {
        let mut decls = Declarations::new();
        let reference = decls.declare("order", &ty("record(record(string name, uint64 qty)[] items, record(address who) buyer, uint256 total)"));
        assert_eq!(reference, "Order");
        let names = decls.decls().iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Items", "Buyer", "Order"]);
        assert_eq!(
            decls.decls()[2].fields,
            vec![
                ("items".to_string(), "Items[]".to_string()),
                ("buyer".to_string(), "Buyer".to_string()),
                ("total".to_string(), "uint256".to_string()),
            ],
        );
    }

    #[test]
    fn arrays_annotate_the_element_name() {
        let mut decls = Declarations::new();
        assert_eq!(decls.declare("cells", &ty("record(bool on)[4][]")), "Cells[4][]");
        assert_eq!(decls.declare("flags", &ty("bool[3]")), "bool[3]");
        assert_eq!(decls.decls().len(), 1);
    }

    #[test]
    fn scalars_declare_nothing() {
        let mut decls = Declarations::new();
        assert_eq!(decls.declare("n", &ty("uint")), "uint256");
        assert!(decls.decls().is_empty());
    }

    #[test]
    fn entries_are_cached_by_name() {
        let mut decls = Declarations::new();
        let t = ty("record(bool x)");
        assert_eq!(decls.declare_entry("Flag", &t), "Flag");
        assert_eq!(decls.declare_entry("Flag", &t), "Flag");
        assert_eq!(decls.decls().len(), 1);
        assert_eq!(decls.reference("Flag"), Some("Flag"));
        assert_eq!(decls.reference("Other"), None);
    }

    #[test]
    fn same_derived_name_is_not_disambiguated() {
        let mut decls = Declarations::new();
        decls.declare("one", &ty("record(record(bool x) inner)"));
        decls.declare("two", &ty("record(record(uint8 y) inner)"));
        let inner = decls.decls().iter().filter(|d| d.name == "Inner").count();
        assert_eq!(inner, 2);
    }

    #[test]
    fn render_struct() {
        let decl = RecordDecl {
            name: "Item".into(),
            fields: vec![("name".into(), "string".into()), ("qty".into(), "uint64".into())],
        };
        assert_eq!(decl.render(), "struct Item {\n    string name;\n    uint64 qty;\n}");
        assert_eq!(decl_name("item"), "Item");
        assert_eq!(decl_name(""), "");
    }
}
