use thiserror::Error;

/**
 * the error vocabulary every operation speaks
 * each category carries a human-readable reason, code() gives the stable tag
 */
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Unavailable(_) => "UNAVAILABLE",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            CoreError::Validation(reason)
            | CoreError::Forbidden(reason)
            | CoreError::NotFound(reason)
            | CoreError::Conflict(reason)
            | CoreError::Unavailable(reason) => reason,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CoreError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(CoreError::Forbidden("x".into()).code(), "FORBIDDEN");
        assert_eq!(CoreError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(CoreError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(CoreError::Unavailable("x".into()).code(), "UNAVAILABLE");
    }

    #[test]
    fn reason_is_the_message() {
        let err = CoreError::Forbidden("only the mentor can do this".into());
        assert_eq!(err.reason(), "only the mentor can do this");
        assert_eq!(err.to_string(), "forbidden: only the mentor can do this");
    }
}
