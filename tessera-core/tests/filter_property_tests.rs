//! Property-Based Tests for Filter Serialization
//!
//! **Property: Escaped literals cannot break out**
//!
//! For any value, the serialized clause contains exactly one string literal,
//! and reading that literal back yields the original value.

use proptest::prelude::*;
use tessera_core::{quote, Filter};

/// Read a double-quoted literal from the start of `input`.
/// Returns the unescaped content and whatever follows the closing quote.
fn read_literal(input: &str) -> Option<(String, &str)> {
    let mut chars = input.char_indices();
    if chars.next()?.1 != '"' {
        return None;
    }
    let mut out = String::new();
    let mut escaped = false;
    for (idx, ch) in chars {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return Some((out, &input[idx + 1..]));
        } else {
            out.push(ch);
        }
    }
    None
}

fn hostile_value() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        r#"[a-z"\\ |&=~()]{0,24}"#,
        Just(r#"" || id != ""#.to_string()),
    ]
}

proptest! {
    #[test]
    fn quoted_literal_round_trips(value in hostile_value()) {
        let literal = quote(&value);
        let (content, rest) = read_literal(&literal).expect("well-formed literal");
        prop_assert_eq!(content, value);
        prop_assert_eq!(rest, "");
    }

    #[test]
    fn contains_clause_has_single_literal(value in hostile_value()) {
        let expr = Filter::contains("title", value.clone()).to_expression();
        let literal = expr.strip_prefix("title ~ ").expect("clause prefix");
        let (content, rest) = read_literal(literal).expect("well-formed literal");
        prop_assert_eq!(content, value);
        prop_assert!(rest.is_empty());
    }

    #[test]
    fn conjunction_wraps_both_sides(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let expr = Filter::eq("status", a.clone())
            .and(Filter::contains("title", b.clone()))
            .to_expression();
        prop_assert_eq!(expr, format!("(status = \"{}\") && (title ~ \"{}\")", a, b));
    }
}
