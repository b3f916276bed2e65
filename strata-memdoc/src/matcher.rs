use std::fmt::{self, Display};

/// A compiled, fully-anchored match pattern over document text.
///
/// The surface syntax is the regex subset the translator emits: `^`/`$`
/// anchors, `.` for any character, `.*` for any run, backslash escapes for
/// literals. Patterns built without anchors get an implicit `.*` on the
/// open end.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(char),
    Any,
    AnyRun,
}

impl Pattern {
    pub fn parse(source: &str) -> Self {
        let mut tokens = Vec::new();
        let anchored_start = source.starts_with('^');
        let anchored_end = source.ends_with('$') && !source.ends_with("\\$");
        let body = {
            let start = if anchored_start { 1 } else { 0 };
            let end = if anchored_end {
                source.len() - 1
            } else {
                source.len()
            };
            &source[start..end]
        };
        if !anchored_start {
            tokens.push(Token::AnyRun);
        }
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        tokens.push(Token::Literal(escaped));
                    }
                }
                '.' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        tokens.push(Token::AnyRun);
                    } else {
                        tokens.push(Token::Any);
                    }
                }
                other => tokens.push(Token::Literal(other)),
            }
        }
        if !anchored_end {
            tokens.push(Token::AnyRun);
        }
        Self {
            source: source.into(),
            tokens,
        }
    }

    /// Pattern matching values that start with the literal prefix.
    pub fn starts_with(literal: &str) -> Self {
        Self::parse(&format!("^{}.*$", escape(literal)))
    }

    /// Pattern matching values that end with the literal suffix.
    pub fn ends_with(literal: &str) -> Self {
        Self::parse(&format!("^.*{}$", escape(literal)))
    }

    /// Pattern matching values containing the literal anywhere.
    pub fn contains(literal: &str) -> Self {
        Self::parse(&format!("^.*{}.*$", escape(literal)))
    }

    /// Pattern from a raw LIKE pattern: `%` is any run, `_` any character,
    /// everything else literal.
    pub fn like(pattern: &str) -> Self {
        let mut source = String::from("^");
        for c in pattern.chars() {
            match c {
                '%' => source.push_str(".*"),
                '_' => source.push('.'),
                other => push_escaped(&mut source, other),
            }
        }
        source.push('$');
        Self::parse(&source)
    }

    pub fn matches(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        match_tokens(&self.tokens, &chars)
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn match_tokens(tokens: &[Token], chars: &[char]) -> bool {
    match tokens.first() {
        None => chars.is_empty(),
        Some(Token::AnyRun) => {
            (0..=chars.len()).any(|skip| match_tokens(&tokens[1..], &chars[skip..]))
        }
        Some(Token::Any) => !chars.is_empty() && match_tokens(&tokens[1..], &chars[1..]),
        Some(Token::Literal(c)) => {
            chars.first() == Some(c) && match_tokens(&tokens[1..], &chars[1..])
        }
    }
}

fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        push_escaped(&mut out, c);
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    if matches!(
        c,
        '^' | '$' | '.' | '*' | '\\' | '[' | ']' | '(' | ')' | '{' | '}' | '?' | '+' | '|'
    ) {
        out.push('\\');
    }
    out.push(c);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convenience_patterns_treat_input_as_literal() {
        assert!(Pattern::starts_with("a.b").matches("a.bc"));
        assert!(!Pattern::starts_with("a.b").matches("axbc"));
        assert!(Pattern::ends_with("50%").matches("up to 50%"));
        assert!(Pattern::contains("x*y").matches("0x*y1"));
        assert!(!Pattern::contains("x*y").matches("xxy"));
    }

    #[test]
    fn like_wildcards_translate() {
        let pattern = Pattern::like("a%b_c");
        assert!(pattern.matches("a--bXc"));
        assert!(pattern.matches("abXc"));
        assert!(!pattern.matches("abc"));
        assert!(!pattern.matches("a--bXcd"));
    }

    #[test]
    fn anchors_are_honored() {
        assert!(Pattern::parse("^ab$").matches("ab"));
        assert!(!Pattern::parse("^ab$").matches("xab"));
        assert!(Pattern::parse("ab").matches("xaby"));
        assert!(Pattern::parse("^a.*b$").matches("a123b"));
        assert!(Pattern::parse("^a.*b$").matches("ab"));
    }
}
