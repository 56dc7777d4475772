//! Local input checks performed before any daemon call.

use crate::error::{CoreError, CoreResult};

/// Validate a new root name for a torrent.
///
/// # Errors
///
/// Returns [`CoreError::InvalidName`] when the name is empty, is `.` or `..`,
/// contains a path separator, or contains a control character.
pub fn validate_rename(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidName { reason: "empty" });
    }
    if name == "." || name == ".." {
        return Err(CoreError::InvalidName {
            reason: "relative_component",
        });
    }
    if name.contains(['/', '\\']) {
        return Err(CoreError::InvalidName {
            reason: "path_separator",
        });
    }
    if name.chars().any(char::is_control) {
        return Err(CoreError::InvalidName {
            reason: "control_character",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(validate_rename("Ubuntu 24.04 ISO").is_ok());
        assert!(validate_rename("a.b-c_d").is_ok());
    }

    #[test]
    fn rejects_invalid_names() {
        let cases = [
            ("", "empty"),
            ("   ", "empty"),
            ("..", "relative_component"),
            ("a/b", "path_separator"),
            ("a\\b", "path_separator"),
            ("a\nb", "control_character"),
            ("tab\there", "control_character"),
        ];
        for (input, reason) in cases {
            assert_eq!(
                validate_rename(input),
                Err(CoreError::InvalidName { reason }),
                "input {input:?}"
            );
        }
    }
}
