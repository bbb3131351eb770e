//! `@placeholder` tokens inside template strings.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\*@([^@#%&()?\s]+)(?:\((.*?)\))?").expect("placeholder regex is valid")
});

/// One placeholder occurrence in a string.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token<'t> {
    /// Byte range of the whole token in the scanned text.
    pub start: usize,
    pub end: usize,
    /// The raw token, e.g. `@integer(1, 10)`.
    pub raw: &'t str,
    /// Generator or sibling name, e.g. `integer`.
    pub name: &'t str,
    pub args: Vec<Value>,
    /// Written as `\@name`: emitted literally without the backslash.
    pub escaped: bool,
}

/// Find every placeholder in `text`, in order.
pub(super) fn scan(text: &str) -> Vec<Token<'_>> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            Some(Token {
                start: whole.start(),
                end: whole.end(),
                raw: whole.as_str(),
                name,
                args: caps.get(2).map(|m| parse_args(m.as_str())).unwrap_or_default(),
                escaped: whole.as_str().starts_with('\\'),
            })
        })
        .collect()
}

/// Split `1, 'a,b', [1, 2]` into values. Quoted and bracketed commas do
/// not split; single quotes are accepted like double quotes. Anything that
/// is not JSON is kept as a bare string.
pub(super) fn parse_args(raw: &str) -> Vec<Value> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push('"');
            }
            (Some(_), '"') => current.push_str("\\\""),
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                current.push('"');
            }
            (None, '[' | '{') => {
                depth += 1;
                current.push(ch);
            }
            (None, ']' | '}') => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            (None, ',') if depth == 0 => {
                args.push(to_value(&current));
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(to_value(&current));
    }
    args
}

fn to_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_simple() {
        let tokens = scan("@name");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].name, "name");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 5));
        assert!(tokens[0].args.is_empty());
    }

    #[test]
    fn test_scan_with_args_and_text() {
        let tokens = scan("Hi @first, you are @integer(18, 60)!");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "first,");
        assert_eq!(tokens[1].name, "integer");
        assert_eq!(tokens[1].args, vec![json!(18), json!(60)]);
        assert_eq!(tokens[1].raw, "@integer(18, 60)");
    }

    #[test]
    fn test_scan_escaped() {
        let tokens = scan(r"mail \@home");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].escaped);
        assert_eq!(tokens[0].name, "home");
    }

    #[test]
    fn test_parse_args_kinds() {
        assert_eq!(
            parse_args("'yyyy-MM-dd', true, 3.5, null"),
            vec![json!("yyyy-MM-dd"), json!(true), json!(3.5), Value::Null]
        );
        assert_eq!(
            parse_args("['a', 'b,c'], 2"),
            vec![json!(["a", "b,c"]), json!(2)]
        );
        assert_eq!(parse_args("lower"), vec![json!("lower")]);
        assert!(parse_args("").is_empty());
    }

    #[test]
    fn test_parse_args_quotes_inside_single_quotes() {
        assert_eq!(parse_args(r#"'say "hi"'"#), vec![json!("say \"hi\"")]);
    }
}
