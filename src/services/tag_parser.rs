//! Tokenizer for the tag based workspace/filter file format.
//!
//! The format looks like XML but is not parsed as XML: there is no entity
//! decoding, and a `"` or `\` inside an attribute value is escaped with a
//! backslash (`\"`, `\\`). Any other backslash is kept literally. The
//! document must start with an `<?xml ... ?>` header.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Missing <?xml ... ?> file header")]
    HeaderMissing,

    #[error("Unexpected end of document at byte {0}")]
    UnexpectedEnd(usize),

    #[error("Bad token at byte {0}")]
    BadToken(usize),

    #[error("Unknown tag <{tag}> in {context}")]
    UnknownTag { tag: String, context: String },

    #[error("Parse aborted: {0}")]
    Aborted(String),
}

/// Receiver of parse events. Returning an error stops the parse.
pub trait TagHandler {
    fn element_start(&mut self, name: &str) -> Result<(), ParseError>;

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), ParseError>;

    /// Called for `</name>` as well as for `/>`
    fn element_end(&mut self) -> Result<(), ParseError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    ElementStart(String),
    Attribute { name: String, value: String },
    ElementEnd,
}

fn is_ident(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.' | b':')
}

fn find(doc: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    doc.get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

pub struct Tokenizer<'a> {
    doc: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    /// Start tokenizing after the `<?xml ... ?>` header
    pub fn new(doc: &'a [u8]) -> Result<Self, ParseError> {
        let start = doc.iter().position(|b| *b == b'<').ok_or(ParseError::HeaderMissing)?;
        if !doc[start..].starts_with(b"<?xml") {
            return Err(ParseError::HeaderMissing);
        }
        let end = find(doc, start, b"?>").ok_or(ParseError::HeaderMissing)?;
        Ok(Self {
            doc,
            pos: end + 2,
            failed: false,
        })
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.doc.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn scan_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let doc = self.doc;
        let start = self.pos;
        while self.peek(0).is_some_and(&pred) {
            self.pos += 1;
        }
        &doc[start..self.pos]
    }

    fn element(&mut self) -> Result<Option<Token>, ParseError> {
        let at = self.pos;
        match self.peek(1) {
            None => Err(ParseError::UnexpectedEnd(at)),
            Some(b'/') => {
                let end = find(self.doc, at, b">").ok_or(ParseError::UnexpectedEnd(at))?;
                self.pos = end + 1;
                Ok(Some(Token::ElementEnd))
            }
            Some(b'?') | Some(b'!') => {
                let end = find(self.doc, at, b">").ok_or(ParseError::UnexpectedEnd(at))?;
                self.pos = end + 1;
                Ok(None)
            }
            Some(_) => {
                self.pos += 1;
                let name = self.scan_while(|b| !b.is_ascii_whitespace() && b != b'>' && b != b'/');
                if name.is_empty() {
                    return Err(ParseError::BadToken(at));
                }
                let name = String::from_utf8_lossy(name).into_owned();
                if self.peek(0) == Some(b'>') {
                    self.pos += 1;
                }
                Ok(Some(Token::ElementStart(name)))
            }
        }
    }

    fn value(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let mut value = Vec::new();
        loop {
            match self.peek(0) {
                None => return Err(ParseError::UnexpectedEnd(start)),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&value).into_owned());
                }
                Some(b'\\') if matches!(self.peek(1), Some(b'"' | b'\\')) => {
                    value.extend(self.peek(1));
                    self.pos += 2;
                }
                Some(byte) => {
                    value.push(byte);
                    self.pos += 1;
                }
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        loop {
            self.skip_whitespace();
            let at = self.pos;
            let Some(byte) = self.peek(0) else {
                return Ok(None);
            };

            match byte {
                b'<' => {
                    if let Some(token) = self.element()? {
                        return Ok(Some(token));
                    }
                }
                b'/' => {
                    if self.peek(1) != Some(b'>') {
                        return Err(ParseError::BadToken(at));
                    }
                    self.pos += 2;
                    return Ok(Some(Token::ElementEnd));
                }
                b if is_ident(b) => {
                    let name = self.scan_while(is_ident);
                    self.skip_whitespace();
                    if self.peek(0) != Some(b'=') {
                        // text content
                        continue;
                    }
                    self.pos += 1;
                    self.skip_whitespace();
                    if self.peek(0) != Some(b'"') {
                        return Err(ParseError::BadToken(self.pos));
                    }
                    self.pos += 1;
                    let name = String::from_utf8_lossy(name).into_owned();
                    let value = self.value()?;
                    return Ok(Some(Token::Attribute { name, value }));
                }
                _ => self.pos += 1,
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Feed every token of `doc` to `handler`
pub fn parse_document(doc: &[u8], handler: &mut dyn TagHandler) -> Result<(), ParseError> {
    for token in Tokenizer::new(doc)? {
        match token? {
            Token::ElementStart(name) => handler.element_start(&name)?,
            Token::Attribute { name, value } => handler.attribute(&name, &value)?,
            Token::ElementEnd => handler.element_end()?,
        }
    }
    Ok(())
}

/// First value of `attribute` on an `element` tag, without building anything
pub fn search_element_attribute(doc: &[u8], element: &str, attribute: &str) -> Option<String> {
    let mut open: Vec<String> = Vec::new();
    for token in Tokenizer::new(doc).ok()? {
        match token.ok()? {
            Token::ElementStart(name) => open.push(name),
            Token::ElementEnd => {
                open.pop();
            }
            Token::Attribute { name, value } => {
                if name == attribute && open.last().is_some_and(|e| e == element) {
                    return Some(value);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n";

    fn tokens(body: &str) -> Result<Vec<Token>, ParseError> {
        let doc = format!("{}{}", HEADER, body);
        Tokenizer::new(doc.as_bytes())?.collect()
    }

    fn start(name: &str) -> Token {
        Token::ElementStart(name.to_string())
    }

    fn attr(name: &str, value: &str) -> Token {
        Token::Attribute {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            Tokenizer::new(b"<LogScrutinizer>"),
            Err(ParseError::HeaderMissing)
        ));
        assert!(matches!(Tokenizer::new(b""), Err(ParseError::HeaderMissing)));
        assert!(matches!(Tokenizer::new(b"<?xml version"), Err(ParseError::HeaderMissing)));
    }

    #[test]
    fn test_elements_and_attributes() {
        let got = tokens("<LogScrutinizer version=\"2\">\n  <logs>\n    <log path=\"a.log\" />\n  </logs>\n</LogScrutinizer>\n")
            .unwrap();
        assert_eq!(
            got,
            vec![
                start("LogScrutinizer"),
                attr("version", "2"),
                start("logs"),
                start("log"),
                attr("path", "a.log"),
                Token::ElementEnd,
                Token::ElementEnd,
                Token::ElementEnd,
            ]
        );
    }

    #[test]
    fn test_escaped_quote_in_value() {
        let got = tokens("<filter text=\"he said \\\"hi\\\"\" />").unwrap();
        assert_eq!(got[1], attr("text", "he said \"hi\""));
    }

    #[test]
    fn test_escaped_backslash_before_closing_quote() {
        let got = tokens("<filter text=\"dir\\\\\" enabled=\"y\" />").unwrap();
        assert_eq!(got[1], attr("text", "dir\\"));
        assert_eq!(got[2], attr("enabled", "y"));
    }

    #[test]
    fn test_backslash_kept_literally() {
        let got = tokens("<log path=\"C:\\logs\\a.log\"/>").unwrap();
        assert_eq!(got[1], attr("path", "C:\\logs\\a.log"));
    }

    #[test]
    fn test_lone_slash_is_bad_token() {
        let got = tokens("<a / >");
        assert!(matches!(got, Err(ParseError::BadToken(_))));
    }

    #[test]
    fn test_unterminated_value() {
        assert!(matches!(tokens("<a b=\"open"), Err(ParseError::UnexpectedEnd(_))));
    }

    #[test]
    fn test_comments_and_text_are_skipped() {
        let got = tokens("<!-- note --><a>text here</a>").unwrap();
        assert_eq!(got, vec![start("a"), Token::ElementEnd]);
    }

    #[test]
    fn test_search_element_attribute() {
        let doc = format!(
            "{}<LogScrutinizer>\n<filters name=\"f.flt\">\n</filters>\n<logs>\n<log path=\"x.log\" />\n</logs>\n</LogScrutinizer>\n",
            HEADER
        );
        assert_eq!(
            search_element_attribute(doc.as_bytes(), "log", "path"),
            Some("x.log".to_string())
        );
        assert_eq!(search_element_attribute(doc.as_bytes(), "log", "name"), None);
        assert_eq!(search_element_attribute(b"no header", "log", "path"), None);
    }

    struct Abort;

    impl TagHandler for Abort {
        fn element_start(&mut self, name: &str) -> Result<(), ParseError> {
            Err(ParseError::Aborted(name.to_string()))
        }

        fn attribute(&mut self, _name: &str, _value: &str) -> Result<(), ParseError> {
            Ok(())
        }

        fn element_end(&mut self) -> Result<(), ParseError> {
            Ok(())
        }
    }

    #[test]
    fn test_handler_can_abort() {
        let doc = format!("{}<x/>", HEADER);
        assert_eq!(
            parse_document(doc.as_bytes(), &mut Abort),
            Err(ParseError::Aborted("x".to_string()))
        );
    }

    proptest! {
        #[test]
        fn test_tokenizer_never_panics(body in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut doc = HEADER.as_bytes().to_vec();
            doc.extend(body);
            if let Ok(tokenizer) = Tokenizer::new(&doc) {
                for token in tokenizer {
                    if token.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
