//! Splits a template body into literal text and directive tags.
//!
//! | Tag        | Meaning                                   |
//! |------------|-------------------------------------------|
//! | `<%= e %>` | output: evaluate `e`, insert its text     |
//! | `<% s %>`  | execution: control flow, no output        |
//! | `<%# c %>` | comment, dropped                          |
//! | `<%%`      | literal `<%`                              |
//! | `<%-`      | strip indentation before the tag          |
//! | `-%>`      | swallow one newline after the tag         |

use super::TemplateError;

const OPEN: &str = "<%";
const CLOSE: &str = "%>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Segment {
    Text(String),
    Output { code: String, line: usize },
    Code { code: String, line: usize },
}

#[derive(Clone, Copy)]
enum TagKind {
    Output,
    Code,
    Comment,
}

pub(super) fn lex(src: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = src;
    let mut line = 1;

    while let Some(start) = rest.find(OPEN) {
        let before = &rest[..start];
        text.push_str(before);
        line += count_lines(before);

        let after = &rest[start + OPEN.len()..];
        if let Some(after) = after.strip_prefix('%') {
            text.push_str(OPEN);
            rest = after;
            continue;
        }

        let (kind, body) = match after.as_bytes().first() {
            Some(b'=') => (TagKind::Output, &after[1..]),
            Some(b'#') => (TagKind::Comment, &after[1..]),
            Some(b'-') => {
                trim_indent(&mut text, segments.is_empty());
                (TagKind::Code, &after[1..])
            }
            _ => (TagKind::Code, after),
        };

        let end = body
            .find(CLOSE)
            .ok_or_else(|| TemplateError::syntax(line, "unterminated `<%` tag"))?;
        let mut code = &body[..end];
        rest = &body[end + CLOSE.len()..];

        let code_line = line;
        line += count_lines(code);
        if let Some(trimmed) = code.strip_suffix('-') {
            code = trimmed;
            if let Some(stripped) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
                rest = stripped;
                line += 1;
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        match kind {
            TagKind::Output => segments.push(Segment::Output {
                code: code.to_owned(),
                line: code_line,
            }),
            TagKind::Code => segments.push(Segment::Code {
                code: code.to_owned(),
                line: code_line,
            }),
            TagKind::Comment => {}
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn count_lines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

/// Drop spaces and tabs between the last newline and a `<%-` tag.
/// Leaves the text alone when anything else precedes the tag on its line.
fn trim_indent(text: &mut String, at_document_start: bool) {
    let line_start = match text.rfind('\n') {
        Some(pos) => pos + 1,
        None if at_document_start => 0,
        None => return,
    };
    if text[line_start..].bytes().all(|b| b == b' ' || b == b'\t') {
        text.truncate(line_start);
    }
}
