//! MIME message parsing: body extraction, attachment listing, HTML-to-text conversion.

use chrono::{DateTime, Utc};
use mail_parser::{Message, MessageParser, MimeHeaders, PartType};

/// Plain and HTML bodies of a stored message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBody {
    /// First `text/plain` part.
    pub plain: Option<String>,

    /// First `text/html` part.
    pub html: Option<String>,
}

impl MessageBody {
    /// Text used for keyword matching: the plain body when it has content,
    /// otherwise the HTML body reduced to text.
    pub fn text(&self) -> String {
        match (&self.plain, &self.html) {
            (Some(plain), _) if !plain.trim().is_empty() => plain.clone(),
            (_, Some(html)) => html_to_text(html),
            (Some(plain), None) => plain.clone(),
            (None, None) => String::new(),
        }
    }
}

/// A message parsed from raw RFC 5322 bytes, with every field owned.
#[derive(Debug, Clone, Default)]
pub struct ParsedMail {
    pub subject: Option<String>,
    pub from_name: Option<String>,
    pub from_address: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub size: u64,
    pub body: MessageBody,
    pub attachments: Vec<ParsedAttachment>,
}

/// A decoded attachment of a [`ParsedMail`].
#[derive(Debug, Clone)]
pub struct ParsedAttachment {
    /// Filename from `Content-Disposition` / `Content-Type`, if any.
    pub name: Option<String>,
    pub data: Vec<u8>,
}

/// Parse the bodies of a stored container.
///
/// Never fails: unparseable input yields the text after the header block
/// as the plain body.
pub fn parse_message_body(raw_message: &[u8]) -> MessageBody {
    let message_bytes = skip_from_line(raw_message);

    match MessageParser::default().parse(message_bytes) {
        Some(msg) => MessageBody {
            plain: first_plain_part(&msg),
            html: first_html_part(&msg),
        },
        None => MessageBody {
            plain: Some(extract_body_fallback(message_bytes)),
            html: None,
        },
    }
}

/// Parse a complete raw message into an owned [`ParsedMail`].
///
/// Returns `None` when `mail-parser` cannot make sense of the bytes.
pub fn parse_mail(raw_message: &[u8]) -> Option<ParsedMail> {
    let message_bytes = skip_from_line(raw_message);
    let msg = MessageParser::default().parse(message_bytes)?;

    let (from_name, from_address) = msg
        .from()
        .and_then(|addr| addr.first())
        .map(|addr| {
            (
                addr.name().map(String::from),
                addr.address().map(String::from),
            )
        })
        .unwrap_or((None, None));

    let date = msg
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));

    let attachments = msg
        .attachments()
        .map(|part| ParsedAttachment {
            name: part.attachment_name().map(String::from),
            data: part.contents().to_vec(),
        })
        .collect();

    Some(ParsedMail {
        subject: msg.subject().map(String::from),
        from_name,
        from_address,
        date,
        size: message_bytes.len() as u64,
        body: MessageBody {
            plain: first_plain_part(&msg),
            html: first_html_part(&msg),
        },
        attachments,
    })
}

/// First genuine `text/plain` body part (not an HTML part converted by
/// `mail-parser`).
fn first_plain_part(msg: &Message<'_>) -> Option<String> {
    msg.text_body
        .iter()
        .filter_map(|&id| msg.parts.get(id as usize))
        .find_map(|part| match &part.body {
            PartType::Text(text) => Some(text.to_string()),
            _ => None,
        })
}

/// First `text/html` body part.
fn first_html_part(msg: &Message<'_>) -> Option<String> {
    msg.html_body
        .iter()
        .filter_map(|&id| msg.parts.get(id as usize))
        .find_map(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        })
}

/// Decode a body payload that arrived as bytes.
///
/// Invalid UTF-8 sequences are replaced, never fatal. A UTF-8 BOM is
/// dropped.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    text.into_owned()
}

/// Drop a leading BOM and the MBOX `From ` separator line, if present.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    if !data.starts_with(b"From ") {
        return data;
    }
    match data.iter().position(|&b| b == b'\n') {
        Some(eol) => &data[eol + 1..],
        None => data,
    }
}

/// Body of a message `mail-parser` rejected: whatever follows the first
/// blank line.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    ["\r\n\r\n", "\n\n"]
        .iter()
        .find_map(|sep| text.find(sep).map(|pos| text[pos + sep.len()..].to_string()))
        .unwrap_or_default()
}

/// Elements that start a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "tr", "li", "table", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Elements whose content is not text.
const HIDDEN_TAGS: &[&str] = &["script", "style", "head"];

/// Reduce HTML to plain text.
///
/// Tags are dropped, block elements become line breaks, script and style
/// content is removed and character references are decoded. Lines are
/// trimmed and blank runs collapse to one empty line.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        push_decoded(&mut text, &rest[..lt]);
        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = &after[..gt];
        rest = &after[gt + 1..];

        let closing = tag.starts_with('/');
        let name = tag_name(tag);
        if !closing && HIDDEN_TAGS.contains(&name.as_str()) {
            rest = skip_element(rest, &name);
        } else if BLOCK_TAGS.contains(&name.as_str()) {
            text.push('\n');
        }
    }
    push_decoded(&mut text, rest);

    collapse_lines(&text)
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Remainder of `html` after the closing tag of `name`, or nothing when
/// the element is never closed.
fn skip_element<'a>(html: &'a str, name: &str) -> &'a str {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let close = format!("</{name}");
    lower
        .find(&close)
        .and_then(|start| lower[start..].find('>').map(|gt| &html[start + gt + 1..]))
        .unwrap_or("")
}

fn push_decoded(out: &mut String, text: &str) {
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 8)
            .and_then(|semi| char_reference(&tail[..semi]).map(|ch| (ch, semi + 1)));
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
}

fn char_reference(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "aacute" => 'á',
        "eacute" => 'é',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "ntilde" => 'ñ',
        "uuml" => 'ü',
        "Aacute" => 'Á',
        "Eacute" => 'É',
        "Iacute" => 'Í',
        "Oacute" => 'Ó',
        "Uacute" => 'Ú',
        "Ntilde" => 'Ñ',
        _ => return None,
    };
    Some(ch)
}

fn collapse_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut gap = false;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            gap = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if gap { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        gap = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALTERNATIVE: &[u8] = b"From: Ana Ruiz <ana@agencia.mx>\r\n\
Subject: COTIZACION AGENTE 123\r\n\
Date: Mon, 12 Feb 2024 10:00:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Solicito su apoyo cotizando\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Solicito su <b>apoyo</b> cotizando</p>\r\n\
--b1--\r\n";

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert!(result.starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert_eq!(result, data);
    }

    #[test]
    fn test_parse_mail_fields() {
        let mail = parse_mail(ALTERNATIVE).unwrap();
        assert_eq!(mail.subject.as_deref(), Some("COTIZACION AGENTE 123"));
        assert_eq!(mail.from_name.as_deref(), Some("Ana Ruiz"));
        assert_eq!(mail.from_address.as_deref(), Some("ana@agencia.mx"));
        assert!(mail.date.is_some());
        assert!(mail.body.plain.as_deref().unwrap().contains("cotizando"));
        assert!(mail.body.html.as_deref().unwrap().contains("<b>apoyo</b>"));
        assert!(mail.attachments.is_empty());
    }

    #[test]
    fn test_body_text_prefers_plain() {
        let body = parse_message_body(ALTERNATIVE);
        assert_eq!(body.text().trim(), "Solicito su apoyo cotizando");
    }

    #[test]
    fn test_body_text_falls_back_to_html() {
        let body = MessageBody {
            plain: None,
            html: Some("<div>Renovar p&oacute;liza 77</div>".into()),
        };
        assert_eq!(body.text(), "Renovar póliza 77");
    }

    #[test]
    fn test_decode_lossy_replaces_invalid_bytes() {
        let text = decode_lossy(b"caf\xe9 ok");
        assert!(text.starts_with("caf"));
        assert!(text.ends_with(" ok"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_html_blocks_become_lines() {
        let text = html_to_text("<p>Estimado <b>agente</b></p><P class=\"x\">Adjunto slip</P>linea<br/>fin");
        assert_eq!(text, "Estimado agente\n\nAdjunto slip\nlinea\nfin");
    }

    #[test]
    fn test_html_character_references() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
        assert_eq!(html_to_text("P&#211;LIZA &#xF3; &amp;lt; &unknown; a & b"), "PÓLIZA ó &lt; &unknown; a & b");
    }

    #[test]
    fn test_html_hidden_elements_removed() {
        assert_eq!(html_to_text("Before<script>alert('x')</script>After"), "BeforeAfter");
        assert_eq!(html_to_text("<HEAD><STYLE>p{}</STYLE></HEAD>Texto"), "Texto");
        assert_eq!(html_to_text("ok<style>never closed"), "ok");
    }

    #[test]
    fn test_fallback_body_after_headers() {
        assert_eq!(extract_body_fallback(b"Subject: x\r\n\r\nCuerpo"), "Cuerpo");
        assert_eq!(extract_body_fallback(b"no headers at all"), "");
    }
}
