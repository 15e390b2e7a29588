use actix_web::{error::InternalError, HttpResponse};
use serde::Serialize;

/// JSON error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

impl ErrorResponse {
    /// Error with a single `message` field
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: serde_json::json!({ "message": message.into() }),
        }
    }
}

fn bad_request(body: ErrorResponse) -> actix_web::Error {
    InternalError::from_response("", HttpResponse::BadRequest().json(body)).into()
}

/// JsonConfig with standardized 400 responses for the whole service
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default().error_handler(|err, _req| match err {
        actix_web_validator::Error::Validate(validation_errors) => {
            let mut fields = serde_json::Map::new();
            for (field, errors) in validation_errors.field_errors() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Validation error in field: {}", field))
                    })
                    .collect();
                fields.insert(field.to_string(), serde_json::json!({ "errors": messages }));
            }
            bad_request(ErrorResponse {
                error: "Validation failed".to_string(),
                fields: serde_json::Value::Object(fields),
            })
        }
        actix_web_validator::Error::Deserialize(de_err) => {
            let err_string = de_err.to_string();
            let message = if err_string.contains("EOF while parsing") {
                "Request body is empty. Expected JSON payload"
            } else if err_string.contains("invalid type") {
                "Invalid field type. chunkSize and retries must be non-negative integers"
            } else {
                "Invalid JSON format"
            };
            bad_request(ErrorResponse::new("Request validation failed", message))
        }
        _ => bad_request(ErrorResponse::new("Validation failed", "Validation error")),
    })
}
