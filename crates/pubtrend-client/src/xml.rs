//! Parsing of OAI-PMH list responses.
//!
//! Only the parts a header listing needs are read: every `<header>` with its
//! `status`, `<identifier>`, `<datestamp>` and `<setSpec>` children, the
//! `<resumptionToken>`, and any `<error>` element. Everything else
//! (`<request>`, `<responseDate>`, `<metadata>` payloads) is skipped.
//!
//! Elements are matched on their local name, so namespace prefixes do not
//! matter.

use pubtrend_core::error::AppError;
use pubtrend_core::models::{HeaderRecord, OaiErrorCode, PageResult};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Header child currently collecting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Identifier,
    Datestamp,
    SetSpec,
    ResumptionToken,
    Error,
}

/// Parses one `ListIdentifiers` (or `ListRecords`) response page.
///
/// An empty `<resumptionToken/>` marks the last page and yields `None`.
///
/// # Errors
///
/// - [`AppError::Protocol`] when the document carries an `<error>` element,
///   including `noRecordsMatch` (the page fetcher turns that one into an
///   empty page)
/// - [`AppError::MalformedResponse`] when the body is not well-formed XML,
///   has no `OAI-PMH` root, or ends before the root is closed
///
/// # Examples
///
/// ```
/// use pubtrend_client::parse_list_response;
///
/// let xml = r#"<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
///   <ListIdentifiers>
///     <header>
///       <identifier>oai:arXiv.org:2401.12345</identifier>
///       <datestamp>2024-01-23</datestamp>
///       <setSpec>cs:cs:AI</setSpec>
///     </header>
///     <resumptionToken cursor="0"></resumptionToken>
///   </ListIdentifiers>
/// </OAI-PMH>"#;
///
/// let page = parse_list_response(xml).unwrap();
/// assert_eq!(page.records.len(), 1);
/// assert_eq!(page.records[0].set_specs, vec!["cs:cs:AI"]);
/// assert!(page.resumption_token.is_none());
/// ```
pub fn parse_list_response(xml: &str) -> Result<PageResult, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = PageResult::empty();
    let mut header: Option<HeaderRecord> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut error: Option<(OaiErrorCode, String)> = None;
    let mut error_code = String::new();
    let mut root_opened = false;
    let mut root_closed = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            AppError::MalformedResponse(format!(
                "XML error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"OAI-PMH" => root_opened = true,
                b"header" => {
                    header = Some(HeaderRecord {
                        deleted: is_deleted(&e),
                        ..HeaderRecord::default()
                    });
                }
                b"identifier" if header.is_some() => {
                    start_field(&mut field, &mut text, Field::Identifier)
                }
                b"datestamp" if header.is_some() => {
                    start_field(&mut field, &mut text, Field::Datestamp)
                }
                b"setSpec" if header.is_some() => {
                    start_field(&mut field, &mut text, Field::SetSpec)
                }
                b"resumptionToken" => {
                    start_field(&mut field, &mut text, Field::ResumptionToken)
                }
                b"error" => {
                    error_code = attribute(&e, b"code").unwrap_or_default();
                    start_field(&mut field, &mut text, Field::Error);
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"error" => {
                    let code = attribute(&e, b"code").unwrap_or_default();
                    error = Some((OaiErrorCode::from_code(&code), String::new()));
                }
                _ => {}
            },
            Event::Text(e) => {
                if field.is_some() {
                    let chunk = e.unescape().map_err(|err| {
                        AppError::MalformedResponse(format!("Bad text content: {}", err))
                    })?;
                    text.push_str(&chunk);
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"OAI-PMH" => root_closed = true,
                b"header" => {
                    if let Some(record) = header.take() {
                        page.records.push(record);
                    }
                }
                _ => {
                    if let Some(done) = field.take() {
                        let value = text.trim().to_string();
                        text.clear();
                        finish_field(done, value, &mut header, &mut page, &mut error, &error_code);
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_opened {
        return Err(AppError::MalformedResponse(
            "missing OAI-PMH root element".to_string(),
        ));
    }
    if !root_closed {
        return Err(AppError::MalformedResponse(
            "response ended before </OAI-PMH>".to_string(),
        ));
    }

    if let Some((code, message)) = error {
        return Err(AppError::Protocol { code, message });
    }

    Ok(page)
}

fn start_field(field: &mut Option<Field>, text: &mut String, next: Field) {
    *field = Some(next);
    text.clear();
}

fn finish_field(
    field: Field,
    value: String,
    header: &mut Option<HeaderRecord>,
    page: &mut PageResult,
    error: &mut Option<(OaiErrorCode, String)>,
    error_code: &str,
) {
    match field {
        Field::Identifier => {
            if let Some(h) = header.as_mut() {
                h.identifier = value;
            }
        }
        Field::Datestamp => {
            if let Some(h) = header.as_mut() {
                h.datestamp = Some(value);
            }
        }
        Field::SetSpec => {
            if let Some(h) = header.as_mut() {
                if !value.is_empty() {
                    h.set_specs.push(value);
                }
            }
        }
        Field::ResumptionToken => {
            page.resumption_token = (!value.is_empty()).then_some(value);
        }
        Field::Error => {
            *error = Some((OaiErrorCode::from_code(error_code), value));
        }
    }
}

fn is_deleted(element: &BytesStart<'_>) -> bool {
    attribute(element, b"status").is_some_and(|status| status == "deleted")
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
