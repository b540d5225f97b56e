//! Expression lexer
//!
//! A byte cursor over the query text with the small set of token scanners
//! the parser needs: identifiers, integers, single-quoted strings, and
//! punctuation, plus quote- and depth-aware bracket matching for slicing
//! out filter bodies. All structural characters are ASCII, so byte
//! positions are always valid slice boundaries.

/// Cursor over a query expression.
pub struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Current byte offset into the input.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Remaining untokenized input.
    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    pub fn bump(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.text.len());
    }

    /// Consume `token` if the input continues with it.
    pub fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Scan an identifier: `[A-Za-z_][A-Za-z0-9_]*`.
    pub fn identifier(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        let start = self.pos;
        match bytes.get(start) {
            Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
            _ => return None,
        }
        let mut end = start + 1;
        while bytes
            .get(end)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            end += 1;
        }
        self.pos = end;
        Some(&self.text[start..end])
    }

    /// Scan a bare integer, optionally negative.
    pub fn integer(&mut self) -> Option<i64> {
        let bytes = self.text.as_bytes();
        let start = self.pos;
        let mut end = start;
        if bytes.get(end) == Some(&b'-') {
            end += 1;
        }
        let digits = end;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        if end == digits {
            return None;
        }
        let value = self.text[start..end].parse().ok()?;
        self.pos = end;
        Some(value)
    }

    /// Scan a single-quoted string. A backslash escapes the quote
    /// character only; any other backslash is literal. Returns `None`
    /// (without a defined cursor position) when unterminated.
    pub fn quoted_string(&mut self) -> Option<String> {
        if self.peek() != Some(b'\'') {
            return None;
        }
        let mut out = String::new();
        let mut chars = self.text[self.pos + 1..].char_indices();
        while let Some((offset, ch)) = chars.next() {
            match ch {
                '\'' => {
                    self.pos += 1 + offset + 1;
                    return Some(out);
                }
                '\\' => match chars.next() {
                    Some((_, '\'')) => out.push('\''),
                    Some((_, other)) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => return None,
                },
                other => out.push(other),
            }
        }
        None
    }

    /// Absolute offset of the `]` that closes the bracket the cursor is
    /// currently inside, skipping over nested brackets and quoted text
    /// (both quote kinds, with backslash escapes).
    pub fn closing_bracket(&self) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let mut depth = 1usize;
        let mut quote: Option<u8> = None;
        let mut index = self.pos;
        while index < bytes.len() {
            let b = bytes[index];
            match quote {
                Some(open) => {
                    if b == b'\\' {
                        index += 1;
                    } else if b == open {
                        quote = None;
                    }
                }
                None => match b {
                    b'\'' | b'"' => quote = Some(b),
                    b'[' => depth += 1,
                    b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(index);
                        }
                    }
                    _ => {}
                },
            }
            index += 1;
        }
        None
    }

    /// Slice from the cursor to an absolute offset, advancing past it.
    pub fn take_until(&mut self, end: usize) -> &'a str {
        let start = self.pos;
        self.pos = end;
        &self.text[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        let mut lex = Lexer::new("_abc9.rest");
        assert_eq!(lex.identifier(), Some("_abc9"));
        assert_eq!(lex.rest(), ".rest");

        let mut lex = Lexer::new("9abc");
        assert_eq!(lex.identifier(), None);
        assert_eq!(lex.pos(), 0);
    }

    #[test]
    fn test_integer() {
        let mut lex = Lexer::new("-12]");
        assert_eq!(lex.integer(), Some(-12));
        assert_eq!(lex.rest(), "]");

        let mut lex = Lexer::new("-x");
        assert_eq!(lex.integer(), None);
        assert_eq!(lex.pos(), 0);
    }

    #[test]
    fn test_quoted_string() {
        let mut lex = Lexer::new("'a b'rest");
        assert_eq!(lex.quoted_string(), Some("a b".to_string()));
        assert_eq!(lex.rest(), "rest");
    }

    #[test]
    fn test_quoted_string_escapes_quote_only() {
        let mut lex = Lexer::new(r"'don\'t \n'");
        assert_eq!(lex.quoted_string(), Some("don't \\n".to_string()));
        assert_eq!(lex.rest(), "");
    }

    #[test]
    fn test_quoted_string_unterminated() {
        let mut lex = Lexer::new("'abc");
        assert_eq!(lex.quoted_string(), None);
    }

    #[test]
    fn test_eat_and_whitespace() {
        let mut lex = Lexer::new("  ..x");
        lex.skip_whitespace();
        assert!(lex.eat(".."));
        assert!(!lex.eat(".."));
        assert_eq!(lex.rest(), "x");
    }

    #[test]
    fn test_closing_bracket_nesting() {
        // The cursor is assumed to sit just inside an open bracket.
        let text = ".a[?.b=='x]y']]tail";
        let lex = Lexer::new(text);
        let close = lex.closing_bracket().unwrap();
        assert_eq!(&text[close..], "]tail");
    }

    #[test]
    fn test_closing_bracket_skips_nested_and_quotes() {
        let text = r#".b==["]", [1]]]after"#;
        let lex = Lexer::new(text);
        let close = lex.closing_bracket().unwrap();
        assert_eq!(&text[close..], "]after");
    }

    #[test]
    fn test_closing_bracket_missing() {
        let lex = Lexer::new(".a[?.b");
        // Depth never returns to zero.
        assert_eq!(lex.closing_bracket(), None);
    }

    #[test]
    fn test_take_until() {
        let mut lex = Lexer::new("abcdef");
        assert_eq!(lex.take_until(3), "abc");
        assert_eq!(lex.rest(), "def");
    }
}
