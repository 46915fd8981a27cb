//! Compiles JSON-shaped text templates, checked against a typed struct
//! schema, into Solidity functions that build the JSON document with
//! `abi.encodePacked`.
//!
//! Pipeline: [`config`] → [`schema`] registry → [`template`] AST →
//! [`emit`] operation stream (via [`resolve`] and [`builtins`]) →
//! [`codegen`] library source, optionally through [`fmt`].
pub mod builtins;
pub mod codegen;
pub mod config;
pub mod declare;
pub mod emit;
pub mod error;
pub mod fmt;
pub mod library;
pub mod path_de;
pub mod resolve;
pub mod schema;
pub mod template;

pub use config::Config;
pub use error::CompileError;
pub use library::{GenerateError, Library, compile_library};

/// Compile every function in `config` and render the Solidity library.
pub fn generate(config: &Config) -> Result<String, GenerateError> {
    let library = compile_library(config, &builtins::Builtins::standard())?;
    let mut cg = codegen::Codegen::new();
    cg.emit(&library);
    Ok(cg.into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = r#"{
        "contract_name": "OrderEncoder",
        "structs": {
            "Order": { "type": "record(uint256 id, address buyer, bool paid, record(string sku, uint64 qty)[] items)" }
        },
        "functions": {
            "encodeOrder": {
                "template": "{\n  \"id\": {{toString .obj0.id}},\n  \"buyer\": \"{{.obj0.buyer | toHexString}}\",\n  {{- if .obj0.paid}} \"paid\": true,{{end}}\n  \"items\": [{{range .obj0.items}}{\"sku\": \"{{.sku}}\", \"qty\": {{toString .qty}}}{{end}}]\n}",
                "inputs": ["Order"]
            }
        }
    }"#;

    #[test]
    fn generate_is_deterministic() {
        let config = Config::from_json(ORDER).unwrap();
        let first = generate(&config).unwrap();
        for _ in 0..4 {
            assert_eq!(generate(&config).unwrap(), first);
        }
    }

    #[test]
    fn end_to_end_library() {
        let src = generate(&Config::from_json(ORDER).unwrap()).unwrap();
        let expected = "\
// SPDX-License-Identifier: UNLICENSED
// DO NOT edit this file. Code generated by template-json.
pragma solidity ^0.8.8;

import \"solady/src/utils/LibString.sol\";

library OrderEncoder {
    struct Items {
        string sku;
        uint64 qty;
    }

    struct Order {
        uint256 id;
        address buyer;
        bool paid;
        Items[] items;
    }

    function encodeOrder(Order memory obj0) internal pure returns (bytes memory) {
        bytes memory body;
        body = abi.encodePacked(body, '{\"id\":', LibString.toString(obj0.id), ',\"buyer\":\"', LibString.toHexString(obj0.buyer), '\",');
        if (obj0.paid) {
            body = abi.encodePacked(body, '\"paid\":true,');
        }
        body = abi.encodePacked(body, '\"items\":[');
        for (uint64 i = 0; i < obj0.items.length; i++) {
            body = abi.encodePacked(body, '{\"sku\":\"', obj0.items[i].sku, '\", \"qty\":', LibString.toString(obj0.items[i].qty), '}');
            if (i < obj0.items.length - 1) {
                body = abi.encodePacked(body, ',');
            }
        }
        body = abi.encodePacked(body, ']}');
        return body;
    }
}
";
        assert_eq!(src, expected);
    }

    #[test]
    fn unit_failures_name_the_function() {
        let config = Config::from_json(
            r#"{
                "contract_name": "Enc",
                "structs": { "P": { "type": "record(bool ok)" } },
                "functions": { "broken": { "template": "{{range .obj0.ok}}{{end}}", "inputs": ["P"] } }
            }"#,
        )
        .unwrap();
        let err = generate(&config).unwrap_err();
        assert!(matches!(
            &err,
            GenerateError::Unit { function, source: CompileError::ConditionType { .. }, .. } if function == "broken"
        ));
    }
}
