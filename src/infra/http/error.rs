use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::convert::ConvertError;
use crate::application::error::ErrorReport;
use crate::application::printer::PrintError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const TEMPLATE_DECODE: &str = "template_decode_error";
    pub const RENDER: &str = "render_error";
    pub const BROWSER: &str = "browser_error";
    pub const RENDER_TIMEOUT: &str = "render_timeout";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        let report = ErrorReport::from_message(
            "infra::http",
            format!("{code}: {}", hint.as_deref().unwrap_or(message)),
        );
        Self {
            status,
            code,
            message,
            hint,
            report,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn payload_too_large(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            codes::PAYLOAD_TOO_LARGE,
            "Request body exceeds the upload limit",
            hint,
        )
    }
}

impl From<ConvertError> for ApiError {
    fn from(error: ConvertError) -> Self {
        let (status, code, message) = match &error {
            ConvertError::Decode(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                codes::TEMPLATE_DECODE,
                "Template is not valid UTF-8",
            ),
            ConvertError::Template(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                codes::RENDER,
                "Template could not be rendered",
            ),
            ConvertError::Print(PrintError::Timeout(_)) => (
                StatusCode::GATEWAY_TIMEOUT,
                codes::RENDER_TIMEOUT,
                "PDF generation timed out",
            ),
            ConvertError::Print(_) => (
                StatusCode::BAD_GATEWAY,
                codes::BROWSER,
                "PDF generation failed",
            ),
        };

        Self {
            status,
            code,
            message,
            hint: Some(error.to_string()),
            report: ErrorReport::from_error("application::convert", &error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        self.report.attach(&mut response);
        response
    }
}
