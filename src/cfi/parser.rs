//! CFI Parser
//!
//! Grammar (the subset positions in this engine use):
//! ```text
//! cfi       = "epubcfi(" path ["," path "," path] ")"
//! path      = step* [":" number [assertion]]
//! step      = "/" number [assertion] | "!" [assertion]
//! assertion = "[" text "]"
//! ```
//!
//! Text-location assertions (`[yyy,zzz]`, `[;s=b]`) are validated and dropped;
//! they never participate in ordering. ID assertions are kept.

use thiserror::Error;

use super::types::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfiParseError {
    #[error("Empty CFI string")]
    Empty,

    #[error("CFI must start with 'epubcfi('")]
    MissingPrefix,

    #[error("CFI must end with ')'")]
    MissingClosingParen,

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> CfiParseError {
        CfiParseError::UnexpectedChar(self.peek().unwrap_or('\0'), self.pos)
    }

    fn number(&mut self) -> Result<u32, CfiParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.pos += 1;
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| CfiParseError::ExpectedNumber(start))
    }

    /// Bracket content with `^` escapes resolved. Returns `None` when the
    /// next character is not `[`.
    fn assertion(&mut self) -> Result<Option<String>, CfiParseError> {
        let start = self.pos;
        if !self.skip_if('[') {
            return Ok(None);
        }

        let mut content = String::new();
        while let Some(ch) = self.advance() {
            match ch {
                '^' => match self.advance() {
                    Some(escaped) => content.push(escaped),
                    None => break,
                },
                ']' => return Ok(Some(content)),
                '[' => return Err(CfiParseError::UnexpectedChar('[', self.pos - 1)),
                _ => content.push(ch),
            }
        }

        Err(CfiParseError::UnclosedBracket(start))
    }

    fn step(&mut self) -> Result<Option<CfiStep>, CfiParseError> {
        let kind = if self.skip_if('/') {
            StepKind::Element(self.number()?)
        } else if self.skip_if('!') {
            StepKind::Indirection
        } else {
            return Ok(None);
        };

        let id = self
            .assertion()?
            .filter(|content| !content.contains(',') && !content.contains(';'));

        Ok(Some(CfiStep { kind, id }))
    }

    fn path(&mut self) -> Result<CfiPath, CfiParseError> {
        let mut path = CfiPath::default();
        while let Some(step) = self.step()? {
            path.push(step);
        }

        if self.skip_if(':') {
            path.offset = Some(self.number()?);
            self.assertion()?;
        }

        Ok(path)
    }

    fn cfi(&mut self) -> Result<Cfi, CfiParseError> {
        if !self.input.starts_with("epubcfi(") {
            return Err(CfiParseError::MissingPrefix);
        }
        self.pos = "epubcfi(".len();

        let path = self.path()?;
        let range = if self.skip_if(',') {
            let start = self.path()?;
            if !self.skip_if(',') {
                return Err(self.unexpected());
            }
            let end = self.path()?;
            Some(CfiRange { start, end })
        } else {
            None
        };

        if !self.skip_if(')') {
            return match self.peek() {
                None => Err(CfiParseError::MissingClosingParen),
                Some(_) => Err(self.unexpected()),
            };
        }

        Ok(Cfi { path, range })
    }
}

/// Parse a CFI string
pub fn parse(input: &str) -> Result<Cfi, CfiParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiParseError::Empty);
    }

    let mut parser = Parser::new(input);
    let cfi = parser.cfi()?;

    if parser.peek().is_some() {
        return Err(parser.unexpected());
    }

    Ok(cfi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let cfi = parse("epubcfi(/6/4!/4/2)").unwrap();
        assert_eq!(cfi.path.steps.len(), 5);
        assert_eq!(cfi.path.steps[2].kind, StepKind::Indirection);
        assert_eq!(cfi.path.steps[4].kind, StepKind::Element(2));
        assert!(!cfi.is_range());
    }

    #[test]
    fn test_parse_id_and_offset() {
        let cfi = parse("epubcfi(/6/4[chap26]!/4/2/1:42)").unwrap();
        assert_eq!(cfi.path.steps[1].id.as_deref(), Some("chap26"));
        assert_eq!(cfi.path.offset, Some(42));
        assert_eq!(cfi.to_string(), "epubcfi(/6/4[chap26]!/4/2/1:42)");
    }

    #[test]
    fn test_text_assertions_are_dropped() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:42[hello,world])").unwrap();
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2/1:42)");

        let side_bias = parse("epubcfi(/6/4!/4/2[;s=a]/1:0)").unwrap();
        assert_eq!(side_bias.path.steps[4].id, None);
    }

    #[test]
    fn test_parse_range() {
        let cfi = parse("epubcfi(/6/4!/4/2,/1:0,/1:10)").unwrap();
        assert!(cfi.is_range());
        let range = cfi.range.as_ref().unwrap();
        assert_eq!(range.start.offset, Some(0));
        assert_eq!(range.end.offset, Some(10));
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2,/1:0,/1:10)");
    }

    #[test]
    fn test_escaped_bracket() {
        let cfi = parse("epubcfi(/6/4[test^]value]!/4)").unwrap();
        assert_eq!(cfi.path.steps[1].id.as_deref(), Some("test]value"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("  "), Err(CfiParseError::Empty));
        assert_eq!(parse("/6/4"), Err(CfiParseError::MissingPrefix));
        assert_eq!(parse("epubcfi(/6/4"), Err(CfiParseError::MissingClosingParen));
        assert_eq!(parse("epubcfi(/6/x)"), Err(CfiParseError::ExpectedNumber(11)));
        assert!(matches!(
            parse("epubcfi(/6/4[open)"),
            Err(CfiParseError::UnclosedBracket(_))
        ));
        assert!(matches!(
            parse("epubcfi(/6/4)trailing"),
            Err(CfiParseError::UnexpectedChar('t', _))
        ));
    }
}
