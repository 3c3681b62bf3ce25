//! Synthesis of the standalone `.eml` container stored for each message.

use chrono::{DateTime, Utc};
use mail_builder::headers::text::Text;
use mail_builder::MessageBuilder;

use crate::error::{PolicyMailError, Result};

/// Header values carried into the container.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerHeaders<'a> {
    pub subject: Option<&'a str>,
    pub sender_name: Option<&'a str>,
    pub sender_email: Option<&'a str>,
    pub date: Option<DateTime<Utc>>,
}

/// Render an RFC 5322 message holding the given bodies.
///
/// With both bodies the result is `multipart/alternative`. With neither,
/// an empty `text/plain` body is written so the container always parses.
pub fn synthesize(
    headers: &ContainerHeaders<'_>,
    plain: Option<&str>,
    html: Option<&str>,
) -> Result<Vec<u8>> {
    let mut builder = MessageBuilder::new();

    if let Some(subject) = headers.subject {
        builder = builder.subject(subject);
    }

    builder = match (headers.sender_name, headers.sender_email) {
        (Some(name), Some(email)) => builder.from((name, email)),
        (None, Some(email)) => builder.from(email),
        (Some(name), None) => builder.header("From", Text::new(name)),
        (None, None) => builder,
    };

    if let Some(date) = headers.date {
        builder = builder.date(date.timestamp());
    }

    builder = match (plain, html) {
        (Some(plain), Some(html)) => builder.text_body(plain).html_body(html),
        (Some(plain), None) => builder.text_body(plain),
        (None, Some(html)) => builder.html_body(html),
        (None, None) => builder.text_body(""),
    };

    builder
        .write_to_vec()
        .map_err(|e| PolicyMailError::Container(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::mime::{parse_mail, parse_message_body};

    #[test]
    fn test_container_round_trips_through_parser() {
        let date = DateTime::from_timestamp(1_707_732_000, 0).unwrap();
        let headers = ContainerHeaders {
            subject: Some("Renovación póliza 88"),
            sender_name: Some("Ana Ruiz"),
            sender_email: Some("ana@agencia.mx"),
            date: Some(date),
        };
        let raw = synthesize(&headers, Some("Texto plano"), Some("<p>Texto html</p>")).unwrap();

        let mail = parse_mail(&raw).unwrap();
        assert_eq!(mail.subject.as_deref(), Some("Renovación póliza 88"));
        assert_eq!(mail.from_address.as_deref(), Some("ana@agencia.mx"));
        assert_eq!(mail.date, Some(date));
        assert_eq!(mail.body.plain.as_deref().map(str::trim), Some("Texto plano"));
        assert!(mail.body.html.unwrap().contains("Texto html"));
    }

    #[test]
    fn test_container_without_bodies_still_parses() {
        let raw = synthesize(&ContainerHeaders::default(), None, None).unwrap();
        let body = parse_message_body(&raw);
        assert_eq!(body.text().trim(), "");
    }

    #[test]
    fn test_html_only_container() {
        let raw = synthesize(&ContainerHeaders::default(), None, Some("<b>Endoso A</b>")).unwrap();
        let body = parse_message_body(&raw);
        assert!(body.plain.is_none());
        assert_eq!(body.text(), "Endoso A");
    }
}
