//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a control path is a dotted path of non-empty segments.
///
/// ```ignore
/// validate_control_path("_controls.playback.volume") // Ok
/// validate_control_path("_controls..volume")         // Err - empty segment
/// ```
pub fn validate_control_path(path: &str) -> Result<(), ValidationError> {
    if path.split('.').any(str::is_empty) {
        let mut err = ValidationError::new("control_path_segment");
        err.message = Some("Control path segments must not be empty".into());
        return Err(err);
    }

    if path.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("control_path_format");
        err.message = Some("Control path must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_control_path_valid() {
        assert!(validate_control_path("_controls.playback.volume").is_ok());
        assert!(validate_control_path("volume").is_ok());
    }

    #[test]
    fn test_validate_control_path_invalid() {
        assert!(validate_control_path("").is_err()); // empty
        assert!(validate_control_path("_controls..volume").is_err()); // empty segment
        assert!(validate_control_path(".volume").is_err()); // leading dot
        assert!(validate_control_path("_controls.play back").is_err()); // space
    }
}
