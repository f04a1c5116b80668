use once_cell::sync::Lazy;
use regex::Regex;
use rocket::serde::json::Json;
use validator::Validate;

use crate::error::AppError;

pub static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username pattern compiles"));

pub trait JsonValidateExt<T> {
    /// Unwraps the body, rejecting it with `AppError::Validation` when its rules fail.
    fn validate_request(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_request(self) -> Result<T, AppError> {
        let inner = self.into_inner();
        inner.validate()?;
        Ok(inner)
    }
}
