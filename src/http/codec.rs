//! String and path helpers used by the engine and by handlers.
//!
//! Everything here is pure and allocation-only. `sanitize_path` must run on
//! every client-supplied path before it touches the filesystem.

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Percent-encodes everything outside `[A-Za-z0-9-_.]`, turning spaces into `+`.
///
/// ```
/// # use ember::url_encode;
/// assert_eq!(url_encode("a b/c"), "a+b%2Fc");
/// ```
pub fn url_encode(input: impl AsRef<[u8]>) -> String {
    let input = input.as_ref();
    let mut out = String::with_capacity(input.len());

    for &byte in input {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
                out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
            }
        }
    }

    out
}

/// Reverses [`url_encode`].
///
/// A `%` that is not followed by two hex digits is kept as a literal `%` and
/// the characters after it are decoded normally.
///
/// ```
/// # use ember::url_decode;
/// assert_eq!(url_decode("a+b%2Fc"), b"a b/c");
/// assert_eq!(url_decode("100%+x"), b"100% x");
/// ```
pub fn url_decode(input: impl AsRef<[u8]>) -> Vec<u8> {
    let input = input.as_ref();
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        match input[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = input.get(i + 1).copied().and_then(hex_value);
                let lo = input.get(i + 2).copied().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            byte => out.push(byte),
        }
        i += 1;
    }

    out
}

/// [`url_decode`] for text; invalid UTF-8 is replaced with U+FFFD.
pub fn url_decode_lossy(input: impl AsRef<[u8]>) -> String {
    match String::from_utf8(url_decode(input)) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// Escapes `&`, `<` and `>` for inclusion in HTML text. Quotes pass through.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }

    out
}

/// Normalizes a request path so it can never climb above `/`.
///
/// Empty and `.` segments are dropped, every `..` cancels the segment before
/// it, and a trailing `/` survives. Consecutive `..` stack: `a/b/../..`
/// cancels both `b` and `a`, and any left over at the root are dropped.
///
/// ```
/// # use ember::sanitize_path;
/// assert_eq!(sanitize_path("/a/b/../c"), "/a/c");
/// assert_eq!(sanitize_path("/a/b/../../c"), "/c");
/// assert_eq!(sanitize_path("/../../etc/passwd"), "/etc/passwd");
/// ```
pub fn sanitize_path(path: &str) -> String {
    let mut kept = Vec::new();
    let mut pending_parents = 0usize;

    // Walk backwards so each ".." can swallow what precedes it.
    for segment in path.split('/').rev() {
        match segment {
            "" | "." => {}
            ".." => pending_parents += 1,
            _ if pending_parents > 0 => pending_parents -= 1,
            _ => kept.push(segment),
        }
    }
    kept.reverse();

    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    out.push_str(&kept.join("/"));
    if path.ends_with('/') && !kept.is_empty() {
        out.push('/');
    }
    out
}
