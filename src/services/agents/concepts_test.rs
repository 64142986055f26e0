use super::*;

#[test]
fn catalog_has_five_concepts_in_order() {
    assert_eq!(available(), vec!["variables", "data_types", "conditionals", "loops", "functions"]);
}

#[test]
fn explain_normalizes_key() {
    assert_eq!(explain("Data Types").map(|c| c.key), Some("data_types"));
    assert_eq!(explain("data-types").map(|c| c.key), Some("data_types"));
    assert!(explain("recursion").is_none());
}

#[test]
fn identify_uses_term_mapping() {
    assert_eq!(identify("What is an if statement?").map(|c| c.key), Some("conditionals"));
    assert_eq!(identify("how does a while loop work").map(|c| c.key), Some("loops"));
    assert_eq!(identify("Explain data types please").map(|c| c.key), Some("data_types"));
}

#[test]
fn term_order_breaks_ties() {
    // Both "variable" and "loop" appear; "variable" is checked first.
    assert_eq!(identify("loop over a variable").map(|c| c.key), Some("variables"));
}

#[test]
fn known_concept_reply_carries_explanation() {
    let reply = respond("explain functions to me");
    assert_eq!(reply.message, "Here's an explanation of Functions:");
    let ReplyPayload::Concept(view) = reply.payload else {
        panic!("expected concept payload");
    };
    assert_eq!(view.concept, "functions");
    assert!(view.example.starts_with("```python"));
}

#[test]
fn unknown_concept_lists_catalog() {
    let reply = respond("tell me about recursion");
    assert!((reply.confidence - 0.8).abs() < f64::EPSILON);
    assert!(reply.message.contains("variables, data_types, conditionals, loops, functions"));
    assert!(matches!(reply.payload, ReplyPayload::ConceptCatalog { ref available_concepts } if available_concepts.len() == 5));
}

#[test]
fn examples_are_valid_python() {
    for concept in CONCEPTS {
        let code = crate::services::pysource::extract_code(concept.example).unwrap();
        assert_eq!(crate::services::pysource::check_syntax(&code), Ok(()), "{}", concept.key);
    }
}
