use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::MultipartError;
use serde_json::Value;
use tracing::debug;

use crate::domain::{
    document::{ConversionRequest, PdfDocument, TemplateUpload},
    form::FormData,
};

use super::{ApiError, HttpState};

const SOURCE: &str = "infra::http::convert";
const TEMPLATE_FIELD: &str = "file";
const ATTACHMENT_DISPOSITION: &str = "attachment; filename=\"attachment.pdf\"";
const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

pub(super) async fn generate_pdf(
    State(state): State<HttpState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let request = read_conversion_request(&mut multipart).await?;
    let pdf = state.conversions.convert(request).await?;
    Ok(pdf_response(pdf))
}

async fn read_conversion_request(multipart: &mut Multipart) -> Result<ConversionRequest, ApiError> {
    let mut template: Option<TemplateUpload> = None;
    let mut data = FormData::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == TEMPLATE_FIELD {
            if template.is_some() {
                return Err(ApiError::bad_request(
                    "Only one template file may be uploaded",
                    None,
                ));
            }
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            template = Some(TemplateUpload::new(filename, bytes));
            continue;
        }

        let is_json = field
            .content_type()
            .is_some_and(|value| value.starts_with("application/json"));
        let text = field.text().await.map_err(multipart_error)?;
        let value = if is_json {
            serde_json::from_str(&text).map_err(|err| {
                ApiError::bad_request(
                    "Data field is not valid JSON",
                    Some(format!("field `{name}`: {err}")),
                )
            })?
        } else {
            Value::String(text)
        };

        data.append(&name, value).map_err(|err| {
            ApiError::bad_request("Data field name is malformed", Some(err.to_string()))
        })?;
    }

    let template = template.ok_or_else(|| {
        ApiError::bad_request(
            "Template file is required",
            Some(format!("upload the template in a `{TEMPLATE_FIELD}` field")),
        )
    })?;

    debug!(
        target = SOURCE,
        template = template.filename().unwrap_or(""),
        template_bytes = template.len(),
        "conversion request received"
    );

    Ok(ConversionRequest::new(template, data.into_value()))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(Some(err.body_text()))
    } else {
        ApiError::bad_request("Multipart body could not be read", Some(err.body_text()))
    }
}

fn pdf_response(pdf: PdfDocument) -> Response {
    let length = pdf.len();
    let mut response = Response::new(Body::from(pdf.into_bytes()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(ATTACHMENT_DISPOSITION),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    response
}
