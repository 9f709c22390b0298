use std::collections::BTreeMap;

use thiserror::Error;

use crate::http::codec::url_decode_lossy;
use crate::http::request::Parameters;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("request line is missing a space delimiter")]
    MissingDelimiter,
    #[error("header field has no ':' separator")]
    MissingColon,
    #[error("line is not terminated by CRLF")]
    UnterminatedLine,
    #[error("header block has no CRLFCRLF terminator")]
    Incomplete,
}

/// Everything parsed from the request line and header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    /// Percent-decoded, without the query string.
    pub path: String,
    pub version: String,
    pub fields: BTreeMap<String, String>,
    pub parameters: Parameters,
}

/// Parses a header block.
///
/// `buf` must contain the CRLFCRLF terminator; anything after it is ignored.
/// Returns the head and the number of bytes it occupies, terminator included.
pub fn parse_request_head(buf: &[u8]) -> Result<(RequestHead, usize), ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let mut lines = Lines::new(&buf[..headers_end]);

    // Request line
    let request_line = lines.next().ok_or(ParseError::MissingDelimiter)?;
    reject_bare_cr(request_line)?;
    let mut parts = request_line.splitn(3, |&b| b == b' ');
    let method = parts.next().ok_or(ParseError::MissingDelimiter)?;
    let target = parts.next().ok_or(ParseError::MissingDelimiter)?;
    let version = parts.next().ok_or(ParseError::MissingDelimiter)?;

    // Header fields
    let mut fields = BTreeMap::new();
    for line in lines {
        reject_bare_cr(line)?;

        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(ParseError::MissingColon)?;
        let key = &line[..colon];
        let value = trim_leading_blanks(&line[colon + 1..]);

        fields.insert(text(key), text(value));
    }

    // Query string
    let (path, query) = match target.iter().position(|&b| b == b'?') {
        Some(q) => (&target[..q], &target[q + 1..]),
        None => (target, &[][..]),
    };

    let head = RequestHead {
        method: text(method),
        path: url_decode_lossy(path),
        version: text(version),
        fields,
        parameters: parse_query(query),
    };

    Ok((head, headers_end + 4))
}

/// Splits a query string into decoded key/value pairs.
///
/// Duplicates and order are kept. A token without `=` gets an empty value and
/// a single trailing `&` adds nothing.
pub fn parse_query(query: &[u8]) -> Parameters {
    let mut parameters = Parameters::new();
    if query.is_empty() {
        return parameters;
    }

    let query = query.strip_suffix(b"&").unwrap_or(query);
    for token in query.split(|&b| b == b'&') {
        let (key, value) = match token.iter().position(|&b| b == b'=') {
            Some(eq) => (&token[..eq], &token[eq + 1..]),
            None => (token, &[][..]),
        };
        parameters.insert(url_decode_lossy(key), url_decode_lossy(value));
    }

    parameters
}

pub(crate) fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
}

/// CRLF-separated lines of a header block with the terminator stripped.
struct Lines<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Lines<'a> {
    fn new(block: &'a [u8]) -> Self {
        Self { rest: Some(block) }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.rest?;
        match rest.windows(2).position(|w| w == b"\r\n") {
            Some(end) => {
                self.rest = Some(&rest[end + 2..]);
                Some(&rest[..end])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

fn reject_bare_cr(line: &[u8]) -> Result<(), ParseError> {
    if line.contains(&b'\r') {
        return Err(ParseError::UnterminatedLine);
    }
    Ok(())
}

fn trim_leading_blanks(value: &[u8]) -> &[u8] {
    let start = value
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(value.len());
    &value[start..]
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
