use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use warp::http::StatusCode;

/// Field name -> messages, rendered as `{"field": ["message"]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
}

impl HtmlError {
    pub fn code(self) -> StatusCode {
        match self {
            HtmlError::InvalidRequest => StatusCode::BAD_REQUEST,
            HtmlError::InvalidSession => StatusCode::UNAUTHORIZED,
            HtmlError::Unauthorized => StatusCode::UNAUTHORIZED,
            HtmlError::Forbidden => StatusCode::FORBIDDEN,
            HtmlError::NotFound => StatusCode::NOT_FOUND,
            HtmlError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            fields: None,
        }
    }

    pub fn default(self) -> Error {
        let info = match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::InvalidSession => "Invalid token.",
            HtmlError::Unauthorized => "Authentication credentials were not provided.",
            HtmlError::Forbidden => "You do not have permission to perform this action.",
            HtmlError::NotFound => "Not found.",
            HtmlError::InternalServerError => "Internal server error",
        };
        self.new(info)
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: StatusCode,
    pub info: Option<String>,
    pub fields: Option<FieldErrors>,
}

impl Error {
    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST,
            info: None,
            fields: Some(fields),
        }
    }

    pub fn field(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        Self::validation(fields)
    }

    /// JSON body sent to the client. Internal details of 5xx errors stay in the log.
    pub fn body(&self) -> serde_json::Value {
        if let Some(fields) = &self.fields {
            return serde_json::json!(fields);
        }
        let detail = match self.code.is_server_error() {
            true => "Internal server error",
            false => self.info.as_deref().unwrap_or("Invalid request"),
        };
        serde_json::json!(ErrorBody { detail })
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.info, &self.fields) {
            (Some(info), _) => write!(f, "{} ({})", self.code, info),
            (None, Some(fields)) => write!(f, "{} ({:?})", self.code, fields),
            (None, None) => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Error {}
impl warp::reject::Reject for Error {}

/// Postgres `foreign_key_violation`, raised when a referenced row is deleted mid-request.
pub fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(e) if e.code().as_deref() == Some("23503"))
}

pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new("RowNotFound".to_string()),
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::PoolTimedOut => Self::new("Pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::new("Pool closed".to_string()),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("Query failed: {}", value.info);
        HtmlError::InternalServerError.new(&value.info)
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        log::error!("Cache failed: {}", value.info);
        HtmlError::InternalServerError.new(&value.info)
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_key_check_ignores_other_errors() {
        assert!(!is_foreign_key_violation(&sqlx::Error::RowNotFound));
        assert!(!is_foreign_key_violation(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn field_errors_render_as_map() {
        let error = Error::field("tags", "This field is required.");
        assert_eq!(error.code, StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            serde_json::json!({"tags": ["This field is required."]})
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let error: Error = QueryError::new("relation \"users\" does not exist".into()).into();
        assert_eq!(error.code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            error.body(),
            serde_json::json!({"detail": "Internal server error"})
        );
    }

    #[test]
    fn client_errors_carry_detail() {
        let error = HtmlError::NotFound.new("Recipe not found");
        assert_eq!(error.code, StatusCode::NOT_FOUND);
        assert_eq!(error.body(), serde_json::json!({"detail": "Recipe not found"}));
    }
}
