use crate::lifecycle::LifecycleError;
use crate::validate::FieldError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn no_workspace() -> Self {
        Self::new("no_workspace", "select a workspace first")
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new("not_found", format!("{} not found", entity))
            .with_details(json!({ "entity": entity, "id": id }))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    pub fn query(e: rusqlite::Error) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn write(e: rusqlite::Error) -> Self {
        Self::new("db_write_failed", e.to_string())
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<FieldError> for HandlerErr {
    fn from(e: FieldError) -> Self {
        HandlerErr::new("validation_failed", e.to_string())
            .with_details(json!({ "field": e.field }))
    }
}

impl From<LifecycleError> for HandlerErr {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::NotFound { entity, id } => HandlerErr::not_found(entity, &id),
            LifecycleError::Invalid(field) => field.into(),
            LifecycleError::Step { step, source } => {
                tracing::error!(step, error = %source, "cascade rolled back");
                HandlerErr::new("cascade_failed", format!("step {} failed: {}", step, source))
                    .with_details(json!({ "step": step }))
            }
            LifecycleError::Db(source) => HandlerErr::write(source),
        }
    }
}
