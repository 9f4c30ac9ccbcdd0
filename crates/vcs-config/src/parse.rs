//! Line-preserving parser for the git config format.
//!
//! Every physical line of the input lands in exactly one [`Line`], and the
//! concatenation of all `raw` fields reproduces the input byte for byte.
//! An entry whose value continues with a trailing backslash spans several
//! physical lines in one `raw`.

use bstr::BString;

use crate::error::ConfigError;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Section {
        raw: BString,
        /// Lowercased.
        section: BString,
        /// Case preserved.
        subsection: Option<BString>,
    },
    Entry {
        raw: BString,
        /// Lowercased variable name.
        name: BString,
        /// `None` for a bare `key` line without `=`.
        value: Option<BString>,
        line: usize,
    },
    /// Blank line or comment.
    Other(BString),
}

impl Line {
    pub fn raw(&self) -> &BString {
        match self {
            Line::Section { raw, .. } | Line::Entry { raw, .. } | Line::Other(raw) => raw,
        }
    }
}

pub fn parse(input: &[u8], file: &str) -> Result<Vec<Line>, ConfigError> {
    let error = |line: usize, message: &str| ConfigError::Parse {
        file: file.to_string(),
        line,
        message: message.to_string(),
    };

    let mut lines = Vec::new();
    let mut line_no = 1;
    let mut start = 0;
    let mut pos = if input.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 };

    while pos < input.len() {
        let text = skip_blanks(input, pos);
        match input.get(text) {
            None | Some(b'\n' | b'\r' | b'#' | b';') => {
                let end = line_end(input, text);
                lines.push(Line::Other(input[start..end].into()));
                line_no += 1;
                pos = end;
            }
            Some(b'[') => {
                let (section, subsection, after) =
                    parse_header(input, text + 1).map_err(|m| error(line_no, m))?;
                let tail = skip_blanks(input, after);
                if !matches!(input.get(tail), None | Some(b'\n' | b'\r' | b'#' | b';')) {
                    return Err(error(line_no, "unexpected text after section header"));
                }
                let end = line_end(input, tail);
                lines.push(Line::Section {
                    raw: input[start..end].into(),
                    section,
                    subsection,
                });
                line_no += 1;
                pos = end;
            }
            Some(_) => {
                let (name, after) = parse_name(input, text).map_err(|m| error(line_no, m))?;
                let eq = skip_blanks(input, after);
                let (value, end, continued) = match input.get(eq) {
                    None | Some(b'\n' | b'\r' | b'#' | b';') => (None, line_end(input, eq), 0),
                    Some(b'=') => {
                        let (value, end, continued) =
                            parse_value(input, eq + 1).map_err(|m| error(line_no, m))?;
                        (Some(value), end, continued)
                    }
                    Some(_) => return Err(error(line_no, "expected '=' after variable name")),
                };
                lines.push(Line::Entry {
                    raw: input[start..end].into(),
                    name,
                    value,
                    line: line_no,
                });
                line_no += 1 + continued;
                pos = end;
            }
        }
        start = pos;
    }
    Ok(lines)
}

fn skip_blanks(input: &[u8], mut pos: usize) -> usize {
    while matches!(input.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    pos
}

/// Index just past the newline ending the line containing `pos`.
fn line_end(input: &[u8], pos: usize) -> usize {
    match input[pos.min(input.len())..].iter().position(|&b| b == b'\n') {
        Some(i) => pos + i + 1,
        None => input.len(),
    }
}

/// Parse after `[` up to and including `]`.
fn parse_header(
    input: &[u8],
    mut pos: usize,
) -> Result<(BString, Option<BString>, usize), &'static str> {
    let name_start = pos;
    while matches!(input.get(pos), Some(b) if b.is_ascii_alphanumeric() || *b == b'-' || *b == b'.')
    {
        pos += 1;
    }
    let name = input[name_start..pos].to_ascii_lowercase();
    if name.is_empty() {
        return Err("empty section name");
    }

    match input.get(pos) {
        Some(b']') => {
            // Legacy `[section.sub]`: the subsection is lowercased too.
            match name.iter().position(|&b| b == b'.') {
                Some(dot) if dot > 0 && dot + 1 < name.len() => Ok((
                    name[..dot].into(),
                    Some(name[dot + 1..].into()),
                    pos + 1,
                )),
                Some(_) => Err("malformed dotted section name"),
                None => Ok((name.into(), None, pos + 1)),
            }
        }
        Some(b' ' | b'\t') => {
            if name.contains(&b'.') {
                return Err("dotted section name with a quoted subsection");
            }
            pos = skip_blanks(input, pos);
            if input.get(pos) != Some(&b'"') {
                return Err("expected '\"' to open the subsection");
            }
            pos += 1;
            let mut subsection = Vec::new();
            loop {
                match input.get(pos) {
                    None | Some(b'\n') => return Err("unterminated subsection"),
                    Some(b'"') => break,
                    Some(b'\\') => {
                        match input.get(pos + 1) {
                            None | Some(b'\n') => return Err("unterminated subsection"),
                            Some(&b) => subsection.push(b),
                        }
                        pos += 2;
                    }
                    Some(&b) => {
                        subsection.push(b);
                        pos += 1;
                    }
                }
            }
            if input.get(pos + 1) != Some(&b']') {
                return Err("expected ']' after the subsection");
            }
            Ok((name.into(), Some(subsection.into()), pos + 2))
        }
        _ => Err("invalid character in section header"),
    }
}

fn parse_name(input: &[u8], mut pos: usize) -> Result<(BString, usize), &'static str> {
    let start = pos;
    if !matches!(input.get(pos), Some(b) if b.is_ascii_alphabetic()) {
        return Err("variable name must start with a letter");
    }
    while matches!(input.get(pos), Some(b) if b.is_ascii_alphanumeric() || *b == b'-') {
        pos += 1;
    }
    Ok((input[start..pos].to_ascii_lowercase().into(), pos))
}

/// Parse a value after `=`. Returns the value, the index past the line's
/// newline and the number of backslash-newline continuations consumed.
fn parse_value(input: &[u8], mut pos: usize) -> Result<(BString, usize, usize), &'static str> {
    let mut value = Vec::new();
    // Unquoted whitespace is kept only when more content follows it.
    let mut blanks = Vec::new();
    let mut quoted = false;
    let mut continued = 0;

    pos = skip_blanks(input, pos);
    loop {
        let Some(&b) = input.get(pos) else {
            if quoted {
                return Err("unterminated quoted value");
            }
            break;
        };
        match b {
            b'\n' => {
                if quoted {
                    return Err("newline inside quoted value");
                }
                pos += 1;
                break;
            }
            b'\r' if input.get(pos + 1) == Some(&b'\n') => pos += 1,
            b'#' | b';' if !quoted => {
                pos = line_end(input, pos);
                break;
            }
            b' ' | b'\t' if !quoted => {
                blanks.push(b);
                pos += 1;
            }
            _ => {
                value.append(&mut blanks);
                pos += 1;
                match b {
                    b'"' => quoted = !quoted,
                    b'\\' => {
                        let escaped = match input.get(pos) {
                            Some(b'\n') => {
                                continued += 1;
                                None
                            }
                            Some(b'\r') if input.get(pos + 1) == Some(&b'\n') => {
                                pos += 1;
                                continued += 1;
                                None
                            }
                            Some(b'n') => Some(b'\n'),
                            Some(b't') => Some(b'\t'),
                            Some(b'b') => Some(0x08),
                            Some(b'\\') => Some(b'\\'),
                            Some(b'"') => Some(b'"'),
                            _ => return Err("invalid escape sequence"),
                        };
                        value.extend(escaped);
                        pos += 1;
                    }
                    _ => value.push(b),
                }
            }
        }
    }
    Ok((value.into(), pos, continued))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(input: &str) -> Vec<(String, Option<String>)> {
        parse(input.as_bytes(), "test")
            .unwrap()
            .into_iter()
            .filter_map(|line| match line {
                Line::Entry { name, value, .. } => {
                    Some((name.to_string(), value.map(|v| v.to_string())))
                }
                _ => None,
            })
            .collect()
    }

    fn value_of(line: &str) -> Option<String> {
        entries(&format!("[s]\n{line}\n")).remove(0).1
    }

    #[test]
    fn raw_lines_reassemble_input() {
        let input = "\u{feff}# top\n[core]\n\tbare = false ; trailing\n\n[remote \"origin\"]\n  url = x \\\n  y\nlast";
        let lines = parse(input.as_bytes(), "test").unwrap();
        let joined: Vec<u8> = lines.iter().flat_map(|l| l.raw().to_vec()).collect();
        assert_eq!(joined, input.as_bytes());
        assert!(matches!(lines.last(), Some(Line::Entry { value: None, .. })));
    }

    #[test]
    fn values() {
        assert_eq!(value_of("k = plain value"), Some("plain value".into()));
        assert_eq!(value_of("k =   padded   "), Some("padded".into()));
        assert_eq!(value_of("k = a # comment"), Some("a".into()));
        assert_eq!(value_of("k = \" keep \" ; c"), Some(" keep ".into()));
        assert_eq!(value_of("k = \"a;b#c\""), Some("a;b#c".into()));
        assert_eq!(value_of("k = a\\tb\\n\\\\\\\""), Some("a\tb\n\\\"".into()));
        assert_eq!(value_of("k ="), Some("".into()));
        assert_eq!(value_of("k"), None);
        assert_eq!(value_of("K-2=x"), Some("x".into()));
    }

    #[test]
    fn continuation_counts_lines() {
        let lines = parse(b"[s]\na = one \\\ntwo\nb = 3\n", "test").unwrap();
        match &lines[1] {
            Line::Entry { value, line, .. } => {
                assert_eq!(value.as_deref().map(Vec::as_slice), Some(&b"one two"[..]));
                assert_eq!(*line, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&lines[2], Line::Entry { line: 4, .. }));
    }

    #[test]
    fn headers() {
        let lines = parse(
            b"[Core]\n[remote \"Or\\\"ig\"]\n[branch.Main]\n[a] # c\n",
            "test",
        )
        .unwrap();
        let heads: Vec<(String, Option<String>)> = lines
            .into_iter()
            .map(|l| match l {
                Line::Section { section, subsection, .. } => {
                    (section.to_string(), subsection.map(|s| s.to_string()))
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            heads,
            [
                ("core".to_string(), None),
                ("remote".to_string(), Some("Or\"ig".to_string())),
                ("branch".to_string(), Some("main".to_string())),
                ("a".to_string(), None),
            ]
        );
    }

    #[test]
    fn errors_carry_line_numbers() {
        let cases: [(&str, usize); 6] = [
            ("[core\n", 1),
            ("[s]\n\n1key = v\n", 3),
            ("[s]\nk = \"open\n", 2),
            ("[s]\nk = bad\\q\n", 2),
            ("[s \"x\"] junk\n", 1),
            ("[s]\nk v\n", 2),
        ];
        for (input, expected) in cases {
            match parse(input.as_bytes(), "cfg") {
                Err(ConfigError::Parse { line, file, .. }) => {
                    assert_eq!(line, expected, "{input:?}");
                    assert_eq!(file, "cfg");
                }
                other => panic!("{input:?}: {other:?}"),
            }
        }
    }
}
