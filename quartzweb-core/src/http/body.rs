//! Body decoding by Content-Type

use std::io::Read;

use super::constants::{content_types, headers};
use super::form::{decode_urlencoded, DecodedData, Parameters};
use super::multipart::{extract_boundary, MultipartDecoder};
use super::parser::ParseFailure;
use super::reader::RequestReader;
use super::request::{HttpRequest, RequestBody};
use crate::storage::TempFileGuard;

/// How a body will be interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    None,
    UrlEncoded,
    /// Multipart with its boundary, or `None` when the boundary is missing
    Multipart(Option<String>),
    Opaque,
}

impl BodyKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type.map(str::trim).filter(|ct| !ct.is_empty()) else {
            return BodyKind::None;
        };
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        if media_type.eq_ignore_ascii_case(content_types::FORM_URLENCODED) {
            BodyKind::UrlEncoded
        } else if media_type.eq_ignore_ascii_case(content_types::MULTIPART_FORM_DATA) {
            BodyKind::Multipart(extract_boundary(content_type))
        } else {
            BodyKind::Opaque
        }
    }
}

/// Read and decode the body of `request`, attaching the result to it
///
/// Only requests whose length was validated by the parser carry a body.
/// Files spilled during multipart decoding are tracked by `uploads`.
pub fn decode_body<S: Read>(
    reader: &mut RequestReader<S>,
    request: &mut HttpRequest,
    uploads: &mut TempFileGuard,
) -> Result<(), ParseFailure> {
    let Some(length) = request.content_length() else {
        return Ok(());
    };
    let kind = BodyKind::from_content_type(request.header(headers::CONTENT_TYPE));
    if kind == BodyKind::None {
        return Ok(());
    }

    reader.begin_body(length);

    let body = match kind {
        BodyKind::None => RequestBody::None,
        BodyKind::UrlEncoded => {
            let mut raw = Vec::new();
            reader.read_to_end(&mut raw)?;
            let mut parameters = Parameters::new();
            decode_urlencoded(&String::from_utf8_lossy(&raw), &mut parameters);
            RequestBody::Form(DecodedData { parameters, ..DecodedData::default() })
        }
        BodyKind::Multipart(Some(boundary)) => {
            RequestBody::Form(MultipartDecoder::new(reader, &boundary, uploads).decode()?)
        }
        BodyKind::Multipart(None) => {
            log::debug!("Multipart body without boundary, not decoding it");
            RequestBody::Form(DecodedData::new())
        }
        BodyKind::Opaque => {
            let mut raw = Vec::new();
            reader.read_to_end(&mut raw)?;
            RequestBody::Content(raw)
        }
    };

    request.set_body(body);
    Ok(())
}
