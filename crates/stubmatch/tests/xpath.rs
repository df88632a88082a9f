//! Integration tests for the `xpath` predicate parameter
//!
//! Covers selection, case folding, namespace aliasing, aggregate results and
//! the two configuration errors.

use serde_json::{json, Value};
use stubmatch::{Encoding, Engine, Predicate, PredicateError, Request, SelectorKind};

fn try_evaluate(predicate: Value, request: Value, encoding: Encoding) -> stubmatch::Result<bool> {
    let predicate = Predicate::from_json(&predicate).unwrap();
    let request = Request::from_json(request).unwrap();
    Engine::default().evaluate(&predicate, &request, encoding)
}

fn evaluate(predicate: Value, request: Value) -> bool {
    try_evaluate(predicate, request, Encoding::Utf8).unwrap()
}

// ===== Selection =====

#[test]
fn test_equals_false_when_field_is_not_xml() {
    assert!(!evaluate(
        json!({"equals": {"field": "VALUE"}, "xpath": {"selector": "//title"}}),
        json!({"field": "VALUE"})
    ));
}

#[test]
fn test_equals_false_when_field_is_empty() {
    assert!(!evaluate(
        json!({"equals": {"field": "VALUE"}, "xpath": {"selector": "//title"}}),
        json!({"field": ""})
    ));
}

#[test]
fn test_equals_true_when_selected_value_equals() {
    assert!(evaluate(
        json!({"equals": {"field": "VALUE"}, "xpath": {"selector": "//title"}}),
        json!({"field": "<doc><title>value</title></doc>"})
    ));
}

#[test]
fn test_equals_false_when_selected_value_differs() {
    assert!(!evaluate(
        json!({"equals": {"field": "NOT VALUE"}, "xpath": {"selector": "//title"}}),
        json!({"field": "<doc><title>value</title></doc>"})
    ));
}

#[test]
fn test_selector_is_case_insensitive_by_default() {
    assert!(evaluate(
        json!({"equals": {"field": "VALUE"}, "xpath": {"selector": "//Title"}}),
        json!({"field": "<DOC><TITLE>value</TITLE></DOC>"})
    ));
}

#[test]
fn test_case_sensitive_selector_does_not_match_other_case() {
    assert!(!evaluate(
        json!({
            "equals": {"field": "value"},
            "xpath": {"selector": "//Title"},
            "caseSensitive": true
        }),
        json!({"field": "<DOC><TITLE>value</TITLE></DOC>"})
    ));
}

#[test]
fn test_case_sensitive_selector_matches_same_case() {
    assert!(evaluate(
        json!({
            "equals": {"field": "value"},
            "xpath": {"selector": "//Title"},
            "caseSensitive": true
        }),
        json!({"field": "<Doc><Title>value</Title></Doc>"})
    ));
}

#[test]
fn test_except_applies_to_selected_value() {
    let request = json!({"field": "<Doc><Title>value</Title></Doc>"});
    assert!(evaluate(
        json!({
            "equals": {"field": "ve"},
            "xpath": {"selector": "//Title"},
            "caseSensitive": true,
            "except": "alu"
        }),
        request.clone()
    ));
    assert!(!evaluate(
        json!({
            "equals": {"field": "v"},
            "xpath": {"selector": "//Title"},
            "caseSensitive": true,
            "except": "alu"
        }),
        request
    ));
}

// ===== deepEquals =====

#[test]
fn test_deep_equals_false_when_field_is_not_xml() {
    assert!(!evaluate(
        json!({"deepEquals": {"field": "VALUE"}, "xpath": {"selector": "//title"}}),
        json!({"field": "VALUE"})
    ));
}

#[test]
fn test_deep_equals_selected_attribute() {
    assert!(evaluate(
        json!({"deepEquals": {"field": "VALUE"}, "xpath": {"selector": "//title/@href"}}),
        json!({"field": "<doc><title href=\"value\">text</title></doc>"})
    ));
    assert!(!evaluate(
        json!({"deepEquals": {"field": "NOT VALUE"}, "xpath": {"selector": "//title/@attr"}}),
        json!({"field": "<doc><title attr=\"value\">text</title></doc>"})
    ));
}

#[test]
fn test_deep_equals_multi_value_selection() {
    let predicate = json!({
        "deepEquals": {"field": ["first", "second"]},
        "xpath": {"selector": "//title"}
    });
    assert!(evaluate(
        predicate.clone(),
        json!({"field": "<doc><title>first</title><title>second</title></doc>"})
    ));
    assert!(evaluate(
        predicate.clone(),
        json!({"field": "<doc><title>second</title><title>first</title></doc>"})
    ));
    assert!(!evaluate(
        predicate,
        json!({"field": "<doc><title>first</title><title>second</title><title>third</title></doc>"})
    ));
}

// ===== Other operators =====

#[test]
fn test_contains_on_text_node() {
    let request = json!({"field": "<doc><title>this is a value</title></doc>"});
    assert!(evaluate(
        json!({"contains": {"field": "value"}, "xpath": {"selector": "//title/text()"}}),
        request.clone()
    ));
    assert!(!evaluate(
        json!({
            "contains": {"field": "VALUE"},
            "xpath": {"selector": "//title/text()"},
            "caseSensitive": true
        }),
        request
    ));
}

#[test]
fn test_starts_with_on_default_namespace() {
    let selector = r#"//*[local-name(.)="title" and namespace-uri(.)="myns"]"#;
    let namespaced = json!({"field": "<book><title xmlns=\"myns\">Harry Potter</title></book>"});
    assert!(evaluate(
        json!({"startsWith": {"field": "Harry"}, "xpath": {"selector": selector}}),
        namespaced.clone()
    ));
    assert!(!evaluate(
        json!({"startsWith": {"field": "Potter"}, "xpath": {"selector": selector}}),
        namespaced
    ));
    assert!(!evaluate(
        json!({"startsWith": {"field": "Harry"}, "xpath": {"selector": selector}}),
        json!({"field": "<book><title>Harry Potter</title></book>"})
    ));
}

#[test]
fn test_matches_selected_value() {
    let request = json!({"field": "<doc><title>value</title></doc>"});
    assert!(evaluate(
        json!({"matches": {"field": "^v"}, "xpath": {"selector": "//title"}}),
        request.clone()
    ));
    assert!(!evaluate(
        json!({"matches": {"field": "v$"}, "xpath": {"selector": "//title"}}),
        request
    ));
    assert!(!evaluate(
        json!({"matches": {"field": "VALUE"}, "xpath": {"selector": "//title"}}),
        json!({"field": "VALUE"})
    ));
}

#[test]
fn test_matches_keeps_selector_working_without_case_sensitivity() {
    assert!(evaluate(
        json!({"matches": {"body": "111\\.222\\.333\\.*"}, "xpath": {"selector": "/ipAddress"}}),
        json!({"body": "<ipAddress>111.222.333.456</ipAddress>"})
    ));
}

#[test]
fn test_equals_sequence_against_selection() {
    assert!(evaluate(
        json!({"equals": {"field": ["first", "third", "second"]}, "xpath": {"selector": "//value"}}),
        json!({"field": "<values><value>first</value><value>second</value><value>third</value></values>"})
    ));
}

// ===== Namespaces =====

fn book(prefix: &str, uri: &str) -> Value {
    json!({
        "field": format!(
            "<book xmlns:{prefix}=\"{uri}\"><{prefix}:title>Harry Potter</{prefix}:title></book>"
        )
    })
}

#[test]
fn test_aliased_namespace() {
    assert!(evaluate(
        json!({
            "endsWith": {"field": "Potter"},
            "xpath": {
                "selector": "//bookml:title/text()",
                "ns": {"bookml": "http://example.com/book"}
            }
        }),
        book("bookml", "http://example.com/book")
    ));
}

#[test]
fn test_aliased_namespace_with_capitals_in_uri() {
    assert!(evaluate(
        json!({
            "endsWith": {"field": "Potter"},
            "xpath": {
                "selector": "//bookml:title/text()",
                "ns": {"bookml": "http://EXAMPLE.COM/book"}
            }
        }),
        book("bookml", "http://EXAMPLE.COM/book")
    ));
}

#[test]
fn test_case_sensitive_aliased_namespace_with_capitals_in_uri() {
    assert!(evaluate(
        json!({
            "equals": {"field": "Harry Potter"},
            "caseSensitive": true,
            "xpath": {
                "selector": "//bookml:title/text()",
                "ns": {"bookml": "http://EXAMPLE.COM/book"}
            }
        }),
        book("bookml", "http://EXAMPLE.COM/book")
    ));
}

#[test]
fn test_alias_binds_by_uri_not_by_prefix() {
    assert!(!evaluate(
        json!({
            "endsWith": {"field": "Harry"},
            "xpath": {
                "selector": "//bookml:title/text()",
                "ns": {"bookml": "http://example.com/book"}
            }
        }),
        json!({
            "field": "<b:book xmlns:b=\"http://example.com/book\"><b:title>Harry Potter</b:title></b:book>"
        })
    ));
}

#[test]
fn test_any_matched_node_equals() {
    assert!(evaluate(
        json!({
            "equals": {"field": "Second"},
            "xpath": {
                "selector": "//a:child",
                "ns": {"a": "http://example.com/a", "b": "http://example.com/b"}
            }
        }),
        json!({
            "field": "<root xmlns:thisa=\"http://example.com/a\" xmlns:thisb=\"http://example.com/b\">\
                      <thisa:child>First</thisa:child>\
                      <thisa:child>Second</thisa:child>\
                      <thisa:child>Third</thisa:child>\
                      </root>"
        })
    ));
}

#[test]
fn test_no_match_when_prefixes_agree_but_uris_do_not() {
    assert!(!evaluate(
        json!({
            "equals": {"field": "Second"},
            "xpath": {
                "selector": "//a:child",
                "ns": {"a": "http://example.com/a", "b": "http://example.com/b"}
            }
        }),
        json!({
            "field": "<root xmlns:b=\"http://example.com/a\" xmlns:a=\"http://example.com/b\">\
                      <a:child>First</a:child>\
                      <a:child>Second</a:child>\
                      <a:child>Third</a:child>\
                      </root>"
        })
    ));
}

// ===== Aggregates and exists =====

#[test]
fn test_count_compares_as_number() {
    assert!(evaluate(
        json!({"equals": {"field": 2}, "xpath": {"selector": "count(//title)"}}),
        json!({"field": "<doc><title>first</title><title>second</title></doc>"})
    ));
}

#[test]
fn test_boolean_compares_as_boolean() {
    assert!(evaluate(
        json!({"equals": {"field": false}, "xpath": {"selector": "boolean(//title)"}}),
        json!({"field": "<doc></doc>"})
    ));
}

#[test]
fn test_exists_with_selection() {
    let predicate = json!({"exists": {"field": true}, "xpath": {"selector": "//title"}});
    assert!(evaluate(
        predicate.clone(),
        json!({"field": "<doc><title>value</title></doc>"})
    ));
    assert!(!evaluate(
        predicate,
        json!({"field": "<doc><summary>value</summary></doc>"})
    ));
}

#[test]
fn test_exists_counts_empty_nodes() {
    let predicate = json!({"exists": {"field": true}, "xpath": {"selector": "//book"}});
    assert!(evaluate(
        predicate.clone(),
        json!({"field": "<books><book></book></books>"})
    ));
    assert!(evaluate(
        predicate.clone(),
        json!({"field": "<books><book><title>Game of Thrones</title></book></books>"})
    ));
    assert!(!evaluate(predicate, json!({"field": "<books></books>"})));
}

// ===== CDATA, comments and processing instructions =====

#[test]
fn test_equals_cdata_text_ignoring_case() {
    let request = json!({"field": "<doc><title><![CDATA[value]]></title></doc>"});
    assert!(evaluate(
        json!({"equals": {"field": "VALUE"}, "xpath": {"selector": "//title"}}),
        request.clone()
    ));
    assert!(evaluate(
        json!({"equals": {"field": "VALUE"}, "xpath": {"selector": "//TITLE/text()"}}),
        request
    ));
}

#[test]
fn test_equals_cdata_text_case_sensitive() {
    let request = json!({"field": "<doc><title><![CDATA[value]]></title></doc>"});
    assert!(evaluate(
        json!({
            "equals": {"field": "value"},
            "xpath": {"selector": "//title"},
            "caseSensitive": true
        }),
        request.clone()
    ));
    assert!(!evaluate(
        json!({
            "equals": {"field": "VALUE"},
            "xpath": {"selector": "//title"},
            "caseSensitive": true
        }),
        request
    ));
}

#[test]
fn test_cdata_markup_is_text_not_elements() {
    let request = json!({"field": "<doc><title><![CDATA[<b>Bold</b>]]></title></doc>"});
    assert!(evaluate(
        json!({"equals": {"field": "<B>BOLD</B>"}, "xpath": {"selector": "//title"}}),
        request.clone()
    ));
    assert!(!evaluate(
        json!({"exists": {"field": true}, "xpath": {"selector": "//b"}}),
        request
    ));
}

#[test]
fn test_comment_with_uppercase_text_does_not_break_parsing() {
    let request = json!({"field": "<doc><!-- Generated BY Tool --><title>Value</title></doc>"});
    assert!(evaluate(
        json!({"equals": {"field": "value"}, "xpath": {"selector": "//title"}}),
        request.clone()
    ));
    assert!(evaluate(
        json!({"contains": {"field": "generated by"}, "xpath": {"selector": "//comment()"}}),
        request.clone()
    ));
    assert!(evaluate(
        json!({
            "contains": {"field": "Generated BY"},
            "xpath": {"selector": "//comment()"},
            "caseSensitive": true
        }),
        request
    ));
}

#[test]
fn test_processing_instruction_does_not_break_parsing() {
    let request = json!({"field": "<?xml version=\"1.0\"?><doc><?Render MODE?><title>Value</title></doc>"});
    assert!(evaluate(
        json!({"equals": {"field": "VALUE"}, "xpath": {"selector": "//title"}}),
        request.clone()
    ));
    assert!(evaluate(
        json!({
            "equals": {"field": "Value"},
            "xpath": {"selector": "//title"},
            "caseSensitive": true
        }),
        request
    ));
}

#[test]
fn test_attribute_literal_in_selector_ignores_case() {
    let request = json!({"field": r#"<doc><title lang="EN">Value</title><title lang="fr">Valeur</title></doc>"#});
    assert!(evaluate(
        json!({"deepEquals": {"field": "value"}, "xpath": {"selector": "//title[@lang='en']"}}),
        request.clone()
    ));
    assert!(!evaluate(
        json!({
            "exists": {"field": true},
            "xpath": {"selector": "//title[@lang='en']"},
            "caseSensitive": true
        }),
        request
    ));
}

// ===== Errors =====

#[test]
fn test_error_in_binary_mode() {
    let err = try_evaluate(
        json!({"equals": {"field": "dGVzdA=="}, "xpath": {"selector": "dGVzdA=="}}),
        json!({"field": "dGVzdA=="}),
        Encoding::Base64,
    )
    .unwrap_err();

    assert_eq!(
        err,
        PredicateError::UnsupportedInBinaryMode {
            kind: SelectorKind::XPath
        }
    );
    assert_eq!(err.code(), "bad data");
    assert_eq!(
        err.to_string(),
        "the xpath predicate parameter is not allowed in binary mode"
    );
}

#[test]
fn test_error_for_malformed_selector() {
    let err = try_evaluate(
        json!({"equals": {"field": "value"}, "xpath": {"selector": "=*INVALID*="}}),
        json!({"field": "<doc><title>value</title></doc>"}),
        Encoding::Utf8,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        PredicateError::SelectorSyntax {
            kind: SelectorKind::XPath,
            ..
        }
    ));
    assert_eq!(err.code(), "bad data");
    assert_eq!(err.to_string(), "malformed xpath predicate selector");
}

#[test]
fn test_malformed_selector_fails_even_when_field_is_absent() {
    let result = try_evaluate(
        json!({"equals": {"field": "value"}, "xpath": {"selector": "=*INVALID*="}}),
        json!({}),
        Encoding::Utf8,
    );
    assert!(result.is_err());
}

#[test]
fn test_unknown_function_fails_whatever_the_field_holds() {
    let predicate = json!({"equals": {"field": "value"}, "xpath": {"selector": "shout(//title)"}});
    for request in [
        json!({"field": "<doc><title>value</title></doc>"}),
        json!({"field": "not xml"}),
        json!({}),
    ] {
        let err = try_evaluate(predicate.clone(), request, Encoding::Utf8).unwrap_err();
        assert!(matches!(
            err,
            PredicateError::SelectorSyntax {
                kind: SelectorKind::XPath,
                ..
            }
        ));
    }
}

#[test]
fn test_unbound_prefix_fails_whatever_the_field_holds() {
    let predicate = json!({
        "equals": {"field": "value"},
        "xpath": {"selector": "//bookml:title", "ns": {"other": "http://example.com/book"}}
    });
    for request in [
        json!({"field": "<doc><title>value</title></doc>"}),
        json!({"field": "not xml"}),
        json!({}),
    ] {
        let err = try_evaluate(predicate.clone(), request, Encoding::Utf8).unwrap_err();
        assert_eq!(err.code(), "bad data");
    }
}
