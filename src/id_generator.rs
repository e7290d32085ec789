//! Client identifier generation
//!
//! Brokers drop an existing session when a second client connects with the
//! same identifier, so every process run appends a random suffix to the
//! configured base name.

use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

/// Length of the canonical hyphenated UUID string
pub const MAX_ID_LENGTH: usize = 36;

/// Default length used by [`generate_id`] callers that have no preference
pub const DEFAULT_ID_LENGTH: usize = 8;

/// Suffix length appended to the configured client id at startup
pub const DEFAULT_SUFFIX_LENGTH: usize = 9;

const SEPARATOR: char = '-';
const ASCII_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Identifier generation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdGeneratorError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Full random GUID in canonical hyphenated form
pub fn generate_guid() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Generate a random identifier of exactly `length` characters.
///
/// The identifier is a prefix of a fresh UUIDv4. A prefix that would end on a
/// hyphen gets its last character replaced by a random ASCII letter, so the
/// result never ends in a separator.
pub fn generate_id(length: usize) -> Result<String, IdGeneratorError> {
    validate_length(length)?;

    let mut id = generate_guid();
    id.truncate(length);

    if id.ends_with(SEPARATOR) {
        id.pop();
        id.push(random_ascii_letter());
    }

    Ok(id)
}

/// Build a client identifier from a human-readable base name.
///
/// Spaces and underscores in `base_name` become hyphens, then
/// `-<suffix_length random characters>` is appended.
pub fn generate_client_id(base_name: &str, suffix_length: usize) -> Result<String, IdGeneratorError> {
    if base_name.is_empty() {
        return Err(IdGeneratorError::InvalidArgument(
            "Client ID cannot be empty".to_string(),
        ));
    }
    validate_length(suffix_length)?;

    let suffix = generate_id(suffix_length)?;
    Ok(format!("{}{SEPARATOR}{suffix}", normalize_base_name(base_name)))
}

/// Replace every space and underscore with a hyphen
pub fn normalize_base_name(base_name: &str) -> String {
    base_name.replace([' ', '_'], "-")
}

fn validate_length(length: usize) -> Result<(), IdGeneratorError> {
    if length < 1 {
        return Err(IdGeneratorError::InvalidArgument(
            "Length must be greater than 0".to_string(),
        ));
    }
    if length > MAX_ID_LENGTH {
        return Err(IdGeneratorError::InvalidArgument(format!(
            "Length must be less than or equal to {MAX_ID_LENGTH}"
        )));
    }
    Ok(())
}

fn random_ascii_letter() -> char {
    let index = rand::rng().random_range(0..ASCII_LETTERS.len());
    ASCII_LETTERS[index] as char
}
