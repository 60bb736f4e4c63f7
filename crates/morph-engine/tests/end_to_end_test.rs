//! End-to-end tests through the public Schema/Transform API.

use morph_engine::{Ctx, EngineError, RawRecord, Schema};
use serde_json::{json, Value};
use std::io::Cursor;

fn read_all(schema: &Schema, input: &str) -> Vec<Value> {
    let mut transform = schema
        .new_transform("test-input", Cursor::new(input.as_bytes().to_vec()), Ctx::new())
        .unwrap();
    let mut outputs = Vec::new();
    while let Some((_, bytes)) = transform.read().unwrap() {
        outputs.push(serde_json::from_slice(&bytes).unwrap());
    }
    outputs
}

const FIXED_SCHEMA: &str = r#"{
    "parser_settings": {"version": "omni.2.1", "file_format_type": "fixedlength"},
    "file_declaration": {
        "columns": [
            {"name": "kind", "start_pos": 1, "length": 1},
            {"name": "value", "start_pos": 2, "length": 10}
        ],
        "records": [
            {"name": "header", "min": 1, "max": 1, "match": "^H"},
            {"name": "body", "min": 1, "max": -1, "match": "^B", "is_target": true},
            {"name": "footer", "min": 1, "max": 1, "match": "^F"}
        ]
    },
    "transform_declarations": {
        "FINAL_OUTPUT": {"object": {"item": {"xpath": "value"}}}
    }
}"#;

#[test]
fn test_fixed_length_header_body_footer() {
    let schema = Schema::new("fixed", FIXED_SCHEMA.as_bytes()).unwrap();
    let outputs = read_all(
        &schema,
        "H20250101\nBwidget\nBbolt\nBnut\nF3\n",
    );
    assert_eq!(
        outputs,
        vec![
            json!({"item": "widget"}),
            json!({"item": "bolt"}),
            json!({"item": "nut"}),
        ]
    );
}

#[test]
fn test_fixed_length_missing_footer_is_incomplete() {
    let schema = Schema::new("fixed", FIXED_SCHEMA.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform(
            "t",
            Cursor::new(b"H20250101\nBwidget\n".to_vec()),
            Ctx::new(),
        )
        .unwrap();
    assert!(transform.read().unwrap().is_some());
    let err = transform.read().unwrap_err();
    assert!(matches!(err, EngineError::IncompleteStream(_)));
    assert!(!transform.is_continuable(&err));
    // Sticky: the same fatal error again.
    assert_eq!(transform.read().unwrap_err(), err);
}

#[test]
fn test_fixed_length_unexpected_row_is_continuable() {
    let schema = Schema::new("fixed", FIXED_SCHEMA.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform(
            "t",
            Cursor::new(b"H20250101\nBwidget\nXoops\nBbolt\nF2\n".to_vec()),
            Ctx::new(),
        )
        .unwrap();

    let (_, bytes) = transform.read().unwrap().unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap()["item"], "widget");

    let err = transform.read().unwrap_err();
    assert!(matches!(err, EngineError::UnexpectedRecord { .. }));
    assert!(transform.is_continuable(&err));

    // Ingestion resumes past the offending row.
    let (_, bytes) = transform.read().unwrap().unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap()["item"], "bolt");
    assert!(transform.read().unwrap().is_none());
}

const EDI_SCHEMA: &str = r#"{
    "parser_settings": {"version": "omni.2.1", "file_format_type": "edi"},
    "file_declaration": {
        "segment_delimiter": "~",
        "element_delimiter": "*",
        "component_delimiter": ":",
        "repetition_delimiter": "^",
        "release_character": "?",
        "records": [
            {"name": "ISA", "min": 1, "max": 1},
            {"name": "REF", "min": 1, "max": -1, "is_target": true},
            {"name": "IEA", "min": 1, "max": 1}
        ]
    },
    "transform_declarations": {
        "FINAL_OUTPUT": {"object": {
            "first": {"xpath": "e1"},
            "raw": {"custom_func": {"name": "copy"}}
        }}
    }
}"#;

#[test]
fn test_edi_stream_to_outputs() {
    let schema = Schema::new("edi", EDI_SCHEMA.as_bytes()).unwrap();
    let outputs = read_all(&schema, "ISA*00*x~REF*A^B:1*Z~REF*Q*W~IEA*1~\r\n");
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0]["first"], "A");
    // Repetition ^ yields a second e1; component : nests c1/c2 under it.
    assert_eq!(
        outputs[0]["raw"]["e1"],
        json!(["A", {"c1": "B", "c2": "1"}])
    );
    assert_eq!(outputs[0]["raw"]["e2"], "Z");
    assert_eq!(outputs[1]["first"], "Q");
}

#[test]
fn test_edi_release_escape_end_to_end() {
    let schema = Schema::new("edi", EDI_SCHEMA.as_bytes()).unwrap();
    let outputs = read_all(&schema, "ISA*1~REF*AB?*CD~IEA*1~");
    assert_eq!(outputs[0]["first"], "AB?*CD");
}

#[test]
fn test_edi_missing_trailer_is_incomplete() {
    let schema = Schema::new("edi", EDI_SCHEMA.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform("t", Cursor::new(b"ISA*1~REF*A~".to_vec()), Ctx::new())
        .unwrap();
    assert!(transform.read().unwrap().is_some());
    let err = transform.read().unwrap_err();
    assert!(matches!(err, EngineError::IncompleteStream(_)));
    assert!(err.to_string().contains("IEA"));
}

#[test]
fn test_edi_corrupt_segment_is_fatal_and_decorated() {
    let schema = Schema::new("edi", EDI_SCHEMA.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform("orders.edi", Cursor::new(b"*no-name~".to_vec()), Ctx::new())
        .unwrap();
    let err = transform.read().unwrap_err();
    assert!(matches!(err, EngineError::InvalidEdi(_)));
    let formatted = transform.format_error(&err);
    assert!(formatted.contains("schema 'edi'"));
    assert!(formatted.contains("input 'orders.edi'"));
}

#[test]
fn test_checksums_stable_and_distinct() {
    let schema = Schema::new("edi", EDI_SCHEMA.as_bytes()).unwrap();
    let collect = |input: &str| {
        let mut t = schema
            .new_transform("t", Cursor::new(input.as_bytes().to_vec()), Ctx::new())
            .unwrap();
        let mut sums = Vec::new();
        while let Some((raw, _)) = t.read().unwrap() {
            sums.push(raw.checksum());
        }
        sums
    };
    let first = collect("ISA*1~REF*A~REF*B~IEA*1~");
    let second = collect("ISA*1~REF*A~REF*B~IEA*1~");
    // Stable across runs, distinct across differing canonical bytes.
    assert_eq!(first, second);
    assert_ne!(first[0], first[1]);
}

#[test]
fn test_output_count_never_exceeds_raw_count() {
    let schema = Schema::new("edi", EDI_SCHEMA.as_bytes()).unwrap();
    let outputs = read_all(&schema, "ISA*1~REF*A~REF*B~REF*C~IEA*1~");
    // 5 raw segments, 3 target records.
    assert_eq!(outputs.len(), 3);
}

const DELIMITED_SCHEMA: &str = r#"{
    "parser_settings": {"version": "omni.2.1", "file_format_type": "delimited"},
    "file_declaration": {
        "delimiter": ",",
        "header_row": true,
        "records": [{"name": "row", "min": 0, "max": -1, "is_target": true}]
    },
    "transform_declarations": {
        "FINAL_OUTPUT": {"object": {
            "who": {"xpath": "name"},
            "age": {"xpath": "age"},
            "greet": {"custom_func": {
                "name": "concat",
                "args": [{"const": "hi "}, {"xpath": "name"}]
            }}
        }}
    }
}"#;

#[test]
fn test_delimited_with_header_row() {
    let schema = Schema::new("csv", DELIMITED_SCHEMA.as_bytes()).unwrap();
    let outputs = read_all(&schema, "name,age\nJohn,30\nJane,25\n");
    assert_eq!(
        outputs,
        vec![
            json!({"who": "John", "age": "30", "greet": "hi John"}),
            json!({"who": "Jane", "age": "25", "greet": "hi Jane"}),
        ]
    );
}

#[test]
fn test_external_values_flow_into_output() {
    let schema_text = r#"{
        "parser_settings": {"version": "omni.2.1", "file_format_type": "edi"},
        "file_declaration": {
            "segment_delimiter": "~",
            "element_delimiter": "*",
            "records": [{"name": "NM1", "is_target": true}]
        },
        "transform_declarations": {
            "FINAL_OUTPUT": {"object": {
                "id": {"xpath": "e1"},
                "greet": {"custom_func": {
                    "name": "concat",
                    "args": [{"const": "hi "}, {"external": "user"}]
                }}
            }}
        }
    }"#;
    let schema = Schema::new("ext", schema_text.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform(
            "t",
            Cursor::new(b"NM1*7~".to_vec()),
            Ctx::new().with("user", "al"),
        )
        .unwrap();
    let (_, bytes) = transform.read().unwrap().unwrap();
    assert_eq!(
        serde_json::from_slice::<Value>(&bytes).unwrap(),
        json!({"id": "7", "greet": "hi al"})
    );
}

#[test]
fn test_missing_external_is_not_continuable() {
    let schema_text = r#"{
        "parser_settings": {"version": "omni.2.1", "file_format_type": "edi"},
        "file_declaration": {
            "segment_delimiter": "~",
            "element_delimiter": "*",
            "records": [{"name": "NM1", "is_target": true}]
        },
        "transform_declarations": {
            "FINAL_OUTPUT": {"external": "user"}
        }
    }"#;
    let schema = Schema::new("ext", schema_text.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform("t", Cursor::new(b"NM1*7~".to_vec()), Ctx::new())
        .unwrap();
    let err = transform.read().unwrap_err();
    assert!(matches!(err, EngineError::MissingExternal(ref n) if n == "user"));
    assert!(!transform.is_continuable(&err));
}

#[test]
fn test_object_member_order_is_declaration_order() {
    let schema_text = r#"{
        "parser_settings": {"version": "omni.2.1", "file_format_type": "edi"},
        "file_declaration": {
            "segment_delimiter": "~",
            "element_delimiter": "*",
            "records": [{"name": "SEG", "is_target": true}]
        },
        "transform_declarations": {
            "FINAL_OUTPUT": {"object": {
                "zulu": {"const": 1},
                "alpha": {"const": 2},
                "mike": {"xpath": "e1"}
            }}
        }
    }"#;
    let schema = Schema::new("order", schema_text.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform("t", Cursor::new(b"SEG*v~".to_vec()), Ctx::new())
        .unwrap();
    let (_, bytes) = transform.read().unwrap().unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"{"zulu":1,"alpha":2,"mike":"v"}"#
    );
}

#[test]
fn test_scripted_custom_func_end_to_end() {
    let schema_text = r#"{
        "parser_settings": {"version": "omni.2.1", "file_format_type": "edi"},
        "file_declaration": {
            "segment_delimiter": "~",
            "element_delimiter": "*",
            "records": [{"name": "NM1", "is_target": true}]
        },
        "transform_declarations": {
            "FINAL_OUTPUT": {"custom_func": {
                "name": "eval",
                "args": [{"const": "upper(arg0) + \"!\""}, {"xpath": "e1"}]
            }}
        }
    }"#;
    let schema = Schema::new("script", schema_text.as_bytes()).unwrap();
    let mut transform = schema
        .new_transform("t", Cursor::new(b"NM1*hello~".to_vec()), Ctx::new())
        .unwrap();
    let (_, bytes) = transform.read().unwrap().unwrap();
    assert_eq!(bytes, br#""HELLO!""#.to_vec());
}

#[test]
fn test_templates_reused_across_members() {
    let schema_text = r#"{
        "parser_settings": {"version": "omni.2.1", "file_format_type": "delimited"},
        "file_declaration": {
            "delimiter": ",",
            "header_row": true,
            "records": [{"name": "row", "min": 0, "max": -1, "is_target": true}]
        },
        "transform_declarations": {
            "FINAL_OUTPUT": {"object": {
                "a": {"template": "name_field"},
                "b": {"template": "name_field"}
            }},
            "name_field": {"xpath": "name"}
        }
    }"#;
    let schema = Schema::new("tmpl", schema_text.as_bytes()).unwrap();
    let outputs = read_all(&schema, "name\nx\n");
    assert_eq!(outputs, vec![json!({"a": "x", "b": "x"})]);
}

#[test]
fn test_shared_schema_multiple_transforms() {
    // A compiled schema is immutable; transforms over it are independent.
    let schema = Schema::new("edi", EDI_SCHEMA.as_bytes()).unwrap();
    let a = read_all(&schema, "ISA*1~REF*A~IEA*1~");
    let b = read_all(&schema, "ISA*1~REF*B~IEA*1~");
    assert_eq!(a[0]["first"], "A");
    assert_eq!(b[0]["first"], "B");
}
