use serde::{Deserialize, Serialize};

/// JSON envelope returned by every endpoint.
///
/// Successful responses carry `data`; failures carry `message` and, for
/// validation failures, a field-keyed `errors` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T, E = serde_json::Value> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<E>,
}

impl<T, E> ApiResponse<T, E> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            errors: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.to_string()),
            errors: None,
        }
    }

    pub fn error_with_details(message: &str, errors: E) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.to_string()),
            errors: Some(errors),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_omits_errors_when_absent() {
        let response = ApiResponse::<()>::error("Task not found");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Task not found");
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn validation_envelope_carries_field_errors() {
        let response = ApiResponse::<(), _>::error_with_details(
            "Validation failed",
            serde_json::json!({ "title": ["The title field is required."] }),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["errors"]["title"][0], "The title field is required.");
    }
}
