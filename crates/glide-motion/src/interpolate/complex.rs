//! Template analysis for complex style strings.
//!
//! A string such as `"0px 0px 10px rgba(0, 0, 0, 0.5)"` is split into a
//! template of literal text and a list of animatable tokens (numbers, colors,
//! CSS variables). Two strings can be mixed when they contain the same
//! number of each token kind.

use super::color::Rgba;
use crate::types::float_prefix_len;

/// An animatable token extracted from a complex string.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Color(Rgba),
    Var(String),
}

impl Token {
    fn kind(&self) -> usize {
        match self {
            Self::Number(_) => 0,
            Self::Color(_) => 1,
            Self::Var(_) => 2,
        }
    }
}

/// A string split into literal pieces around its tokens.
///
/// `pieces.len() == tokens.len() + 1` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexValue {
    pub pieces: Vec<String>,
    pub tokens: Vec<Token>,
}

impl ComplexValue {
    /// Split `input` into template pieces and tokens.
    pub fn analyse(input: &str) -> Self {
        let mut pieces = Vec::new();
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while !rest.is_empty() {
            if let Some((token, len)) = next_token(rest) {
                pieces.push(std::mem::take(&mut literal));
                tokens.push(token);
                rest = &rest[len..];
            } else {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    literal.push(c);
                }
                rest = chars.as_str();
            }
        }
        pieces.push(literal);
        Self { pieces, tokens }
    }

    /// Count of (numbers, colors, vars).
    pub fn counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for token in &self.tokens {
            counts[token.kind()] += 1;
        }
        counts
    }

    /// Rebuild the string with `tokens` substituted into this template.
    pub fn render(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for (i, piece) in self.pieces.iter().enumerate() {
            out.push_str(piece);
            if let Some(token) = tokens.get(i) {
                match token {
                    Token::Number(n) => out.push_str(&format_number(*n)),
                    Token::Color(c) => out.push_str(&c.to_string()),
                    Token::Var(v) => out.push_str(v),
                }
            }
        }
        out
    }

    /// Reorder `self`'s tokens to line up kind-by-kind with `target`.
    ///
    /// Returns `None` when the kind counts differ.
    pub fn match_order(&self, target: &ComplexValue) -> Option<Vec<Token>> {
        if self.counts() != target.counts() {
            return None;
        }
        let mut by_kind: [Vec<&Token>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for token in &self.tokens {
            by_kind[token.kind()].push(token);
        }
        let mut cursors = [0usize; 3];
        let ordered = target
            .tokens
            .iter()
            .map(|t| {
                let kind = t.kind();
                let token = by_kind[kind][cursors[kind]].clone();
                cursors[kind] += 1;
                token
            })
            .collect();
        Some(ordered)
    }
}

/// Format a number the way it is written back into a style string.
pub fn format_number(n: f64) -> String {
    let rounded = (n * 100_000.0).round() / 100_000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

fn next_token(s: &str) -> Option<(Token, usize)> {
    if s.starts_with("var(") {
        let len = balanced_call_len(s)?;
        return Some((Token::Var(s[..len].to_string()), len));
    }
    if let Some(hex) = s.strip_prefix('#') {
        let digits = hex.chars().take_while(|c| c.is_ascii_hexdigit()).count();
        if matches!(digits, 3 | 4 | 6 | 8) {
            let len = digits + 1;
            return Rgba::parse(&s[..len]).map(|c| (Token::Color(c), len));
        }
        return None;
    }
    if ["rgb(", "rgba(", "hsl(", "hsla("].iter().any(|p| s.starts_with(p)) {
        let len = balanced_call_len(s)?;
        return Rgba::parse(&s[..len]).map(|c| (Token::Color(c), len));
    }

    let first = s.chars().next()?;
    let starts_number = first.is_ascii_digit()
        || ((first == '-' || first == '.')
            && s[1..].chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.'));
    if !starts_number {
        return None;
    }
    let len = float_prefix_len(s)?;
    let value = s[..len].parse::<f64>().ok()?;
    Some((Token::Number(value), len))
}

/// Length of a `name(...)` call including its balanced closing paren.
fn balanced_call_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyse_shadow() {
        let value = ComplexValue::analyse("0px 0px 10px rgba(0, 0, 0, 0.5)");
        assert_eq!(value.counts(), [3, 1, 0]);
        assert_eq!(value.pieces, vec!["", "px ", "px ", "px ", ""]);
    }

    #[test]
    fn test_render_round_trips() {
        let value = ComplexValue::analyse("translateX(10px) scale(1.5)");
        assert_eq!(value.render(&value.tokens), "translateX(10px) scale(1.5)");
    }

    #[test]
    fn test_vars_are_single_tokens() {
        let value = ComplexValue::analyse("var(--gap, 4px) 2px");
        assert_eq!(value.counts(), [1, 0, 1]);
        assert_eq!(value.tokens[0], Token::Var("var(--gap, 4px)".into()));
    }

    #[test]
    fn test_match_order_by_kind() {
        let from = ComplexValue::analyse("#000 10px");
        let to = ComplexValue::analyse("20px #fff");
        let ordered = from.match_order(&to).unwrap();
        assert_eq!(ordered[0], Token::Number(10.0));
        assert!(matches!(ordered[1], Token::Color(_)));

        let other = ComplexValue::analyse("20px 30px");
        assert!(from.match_order(&other).is_none());
    }

    #[test]
    fn test_negative_numbers() {
        let value = ComplexValue::analyse("-5px -.5em");
        assert_eq!(value.tokens, vec![Token::Number(-5.0), Token::Number(-0.5)]);
    }
}
