//! Detection and rewriting of second-order query operators.
//!
//! Second-order operators (`citations()`, `similar()`, `docs()`, ...) wrap a
//! whole sub-query. They are found with a small tokenizer that knows about
//! quoted phrases and matches parentheses, so nesting such as
//! `useful(citations(x))` and parentheses inside phrases are handled.

use crate::payload::ParamValue;

/// Operators that run a second pass over the result of an inner query.
pub const SECOND_ORDER_OPERATORS: &[&str] = &[
    "similar",
    "topn",
    "reviews",
    "citations",
    "references",
    "trending",
    "useful",
    "instructive",
];

/// Operator pulling its documents from an uploaded or stored list.
pub const DOCS_OPERATOR: &str = "docs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Word { start: usize, end: usize },
    Open(usize),
    Close(usize),
    Space,
    Other,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '(' => tokens.push(Token::Open(i)),
            ')' => tokens.push(Token::Close(i)),
            '"' => {
                // phrase contents never open or close a call
                for (_, q) in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
                tokens.push(Token::Other);
            }
            '\\' => {
                chars.next();
                tokens.push(Token::Other);
            }
            c if c.is_whitespace() => tokens.push(Token::Space),
            c if is_word_char(c) => {
                let mut end = i + c.len_utf8();
                while let Some(&(j, n)) = chars.peek() {
                    if !is_word_char(n) {
                        break;
                    }
                    end = j + n.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Word { start: i, end });
            }
            _ => tokens.push(Token::Other),
        }
    }

    tokens
}

/// A function-style operator application found in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call<'a> {
    /// Operator name as written.
    pub name: &'a str,
    /// Text between the parentheses (to the end when unbalanced).
    pub argument: &'a str,
    /// Byte offset of the operator name.
    pub start: usize,
    /// Byte offset just past the closing parenthesis.
    pub end: usize,
}

/// Pairs every `Open` token with the byte offset of its closing parenthesis.
///
/// Unclosed parentheses map to `None`; stray closing ones are ignored.
fn match_parens(tokens: &[Token]) -> Vec<Option<usize>> {
    let mut closes = vec![None; tokens.len()];
    let mut open: Vec<usize> = Vec::new();

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::Open(_) => open.push(idx),
            Token::Close(pos) => {
                if let Some(opener) = open.pop() {
                    closes[opener] = Some(*pos);
                }
            }
            _ => {}
        }
    }

    closes
}

/// Returns every call in `text`, outer calls before the calls they contain.
pub fn calls(text: &str) -> Vec<Call<'_>> {
    let tokens = tokenize(text);
    let closes = match_parens(&tokens);
    let mut out = Vec::new();

    for (idx, token) in tokens.iter().enumerate() {
        let Token::Word { start, end } = *token else {
            continue;
        };
        let Some(open_idx) = tokens[idx + 1..]
            .iter()
            .position(|t| *t != Token::Space)
            .map(|p| idx + 1 + p)
        else {
            continue;
        };
        let Token::Open(open) = tokens[open_idx] else {
            continue;
        };

        let (argument, call_end) = match closes[open_idx] {
            Some(pos) => (&text[open + 1..pos], pos + 1),
            None => (&text[open + 1..], text.len()),
        };
        out.push(Call {
            name: &text[start..end],
            argument,
            start,
            end: call_end,
        });
    }

    out
}

/// Returns true if a second-order operator is applied anywhere in `query`.
pub fn is_second_order(query: &str) -> bool {
    calls(query).iter().any(|call| {
        SECOND_ORDER_OPERATORS
            .iter()
            .any(|op| call.name.eq_ignore_ascii_case(op))
    })
}

/// Returns the arguments of every `docs(...)` call in `query`.
pub fn extract_docs_tokens(query: &str) -> Vec<String> {
    calls(query)
        .into_iter()
        .filter(|call| call.name.eq_ignore_ascii_case(DOCS_OPERATOR))
        .map(|call| call.argument.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Rewrites a top-level `citations(...)` / `references(...)` query into a
/// direct `citation:` / `reference:` field query.
///
/// Returns the (possibly rewritten) query and, when a rewrite happened, the
/// original inner expression. Only the first value of a list is considered.
pub fn rewrite_citations(query: &ParamValue) -> (ParamValue, Option<String>) {
    let values = query.values();
    let rewritten = values.first().and_then(|first| rewrite_one(first));

    match rewritten {
        Some((text, expr)) => {
            let mut out = values.to_vec();
            out[0] = text;
            (ParamValue::Multi(out), Some(expr))
        }
        None => {
            let normalized = match query {
                ParamValue::Multi(vs) if vs.len() == 1 => ParamValue::Single(vs[0].clone()),
                other => other.clone(),
            };
            (normalized, None)
        }
    }
}

fn rewrite_one(query: &str) -> Option<(String, String)> {
    let trimmed = query.trim();
    let call = calls(trimmed).into_iter().next()?;
    if call.start != 0 || call.end != trimmed.len() {
        return None;
    }

    let field = if call.name.eq_ignore_ascii_case("citations") {
        "citation"
    } else if call.name.eq_ignore_ascii_case("references") {
        "reference"
    } else {
        return None;
    };

    let expr = call.argument.trim();
    let value = expr.split_once(':').map_or(expr, |(_, v)| v);
    Some((format!("{}:{}", field, value), expr.to_string()))
}

/// Replaces the identifier inside a `citation:` / `reference:` clause.
///
/// A quoted identifier is replaced by the quoted bibcode.
pub fn sub_bibcode(query: &str, bibcode: &str) -> String {
    for prefix in ["citation:", "reference:"] {
        let Some(pos) = query.find(prefix) else {
            continue;
        };
        let value_start = pos + prefix.len();
        let rest = &query[value_start..];

        let (value_len, quoted) = if let Some(inner) = rest.strip_prefix('"') {
            match inner.find('"') {
                Some(close) => (close + 2, true),
                None => (rest.len(), true),
            }
        } else {
            let len = rest
                .find(|c: char| c.is_whitespace() || c == ')')
                .unwrap_or(rest.len());
            (len, false)
        };

        let replacement = if quoted {
            format!("\"{}\"", bibcode)
        } else {
            bibcode.to_string()
        };
        return format!(
            "{}{}{}",
            &query[..value_start],
            replacement,
            &query[value_start + value_len..]
        );
    }
    query.to_string()
}

/// Returns the identifier named by an `identifier:` expression, unquoted.
pub fn identifier_value(expr: &str) -> Option<&str> {
    let (field, value) = expr.trim().split_once(':')?;
    if !field.trim().eq_ignore_ascii_case("identifier") {
        return None;
    }
    let value = value.trim().trim_matches('"');
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi(values: &[&str]) -> ParamValue {
        ParamValue::Multi(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_rewrite_citations_in_list() {
        let (out, expr) = rewrite_citations(&multi(&["citations(bibcode:X=1)", "other"]));
        assert_eq!(out, multi(&["citation:X=1", "other"]));
        assert_eq!(expr.as_deref(), Some("bibcode:X=1"));
    }

    #[test]
    fn test_rewrite_references_scalar_is_wrapped() {
        let (out, expr) = rewrite_citations(&ParamValue::from("references(identifier:Y=4)"));
        assert_eq!(out, multi(&["reference:Y=4"]));
        assert_eq!(expr.as_deref(), Some("identifier:Y=4"));
    }

    #[test]
    fn test_no_rewrite_collapses_single_list() {
        let (out, expr) = rewrite_citations(&multi(&["star"]));
        assert_eq!(out, ParamValue::from("star"));
        assert_eq!(expr, None);

        let (out, _) = rewrite_citations(&multi(&["a", "b"]));
        assert_eq!(out, multi(&["a", "b"]));
    }

    #[test]
    fn test_nested_or_partial_calls_are_not_rewritten() {
        for q in [
            "citations(x) AND year:2000",
            "useful(citations(x))",
            "title:\"citations(x)\"",
        ] {
            let (_, expr) = rewrite_citations(&ParamValue::from(q));
            assert_eq!(expr, None, "query {}", q);
        }
    }

    #[test]
    fn test_is_second_order() {
        assert!(!is_second_order("darmok and jalad"));
        assert!(is_second_order("similar(jalad at tanagra)"));
        assert!(is_second_order("useful(citations(x))"));
        assert!(is_second_order("year:2000 AND topn (10, star)"));
        assert!(!is_second_order("title:\"similar(x)\""));
        assert!(!is_second_order("dissimilar(x)"));
        assert!(!is_second_order("similar"));
    }

    #[test]
    fn test_deeply_nested_input_is_linear() {
        let query = "a(".repeat(100_000);
        let started = std::time::Instant::now();
        assert!(!is_second_order(&query));
        assert_eq!(calls(&query).len(), 100_000);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        let query = format!("{}x{}", "useful(".repeat(50_000), ")".repeat(50_000));
        assert!(is_second_order(&query));
        assert!(extract_docs_tokens(&query).is_empty());
    }

    #[test]
    fn test_stray_close_is_ignored() {
        let found = calls(") similar(x))");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].argument, "x");
    }

    #[test]
    fn test_extract_docs_tokens() {
        assert_eq!(
            extract_docs_tokens("star AND docs(library/abc) OR docs( 1234 )"),
            vec!["library/abc", "1234"]
        );
        assert!(extract_docs_tokens("docs()").is_empty());
        assert_eq!(extract_docs_tokens("docs(unclosed"), vec!["unclosed"]);
    }

    #[test]
    fn test_calls_report_nesting() {
        let found = calls("useful(citations(x))");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "useful");
        assert_eq!(found[0].argument, "citations(x)");
        assert_eq!(found[1].argument, "x");
    }

    #[test]
    fn test_sub_bibcode() {
        assert_eq!(
            sub_bibcode("citation:arXiv:1234", "2020ApJ...1..1A"),
            "citation:2020ApJ...1..1A"
        );
        assert_eq!(
            sub_bibcode("reference:\"10.1/x y\" AND year:2000", "B"),
            "reference:\"B\" AND year:2000"
        );
        assert_eq!(sub_bibcode("title:star", "B"), "title:star");
    }

    #[test]
    fn test_identifier_value() {
        assert_eq!(identifier_value("identifier:\"arXiv:1234\""), Some("arXiv:1234"));
        assert_eq!(identifier_value("bibcode:X"), None);
        assert_eq!(identifier_value("identifier:"), None);
    }
}
