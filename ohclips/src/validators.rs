use url::Url;

use crate::errors::{ValidationError, ValidationIssue, ValidationResult};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 40;
pub const GAME_MIN: usize = 3;
pub const COMMENT_MIN: usize = 3;
pub const COMMENT_MAX: usize = 200;

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

fn check_length(
    field: &str,
    label: &str,
    value: &str,
    min: usize,
    max: Option<usize>,
    issues: &mut Vec<ValidationIssue>,
) {
    let len = value.chars().count();
    if len < min {
        issues.push(ValidationIssue::new(field, "validation.length", format!("{label} is too short")));
    }
    if let Some(max) = max
        && len > max
    {
        issues.push(ValidationIssue::new(field, "validation.length", format!("{label} is too long")));
    }
}

/// Normalizes a username to its lowercase document key and checks the
/// registration rules: 3 to 20 ASCII letters, digits or underscores.
pub fn normalize_username(raw: &str) -> ValidationResult<String> {
    let username = raw.trim().to_ascii_lowercase();
    let mut issues = Vec::new();
    check_length("username", "username", &username, USERNAME_MIN, Some(USERNAME_MAX), &mut issues);
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        issues.push(ValidationIssue::new(
            "username",
            "validation.charset",
            "username may only contain letters, digits and underscores",
        ));
    }
    if issues.is_empty() {
        Ok(username)
    } else {
        Err(ValidationError::new(issues))
    }
}

/// Comment text after trimming; emptiness is reported separately by callers.
pub fn validate_comment(raw: &str) -> ValidationResult<String> {
    let comment = raw.trim();
    let mut issues = Vec::new();
    check_length("comment", "Comment", comment, COMMENT_MIN, Some(COMMENT_MAX), &mut issues);
    if issues.is_empty() {
        Ok(comment.to_string())
    } else {
        Err(ValidationError::new(issues))
    }
}

/// Title and game of an upload request.
pub fn validate_upload(title: &str, game: &str) -> ValidationResult<(String, String)> {
    let (title, game) = (title.trim(), game.trim());
    let mut issues = Vec::new();
    check_length("title", "Title", title, TITLE_MIN, Some(TITLE_MAX), &mut issues);
    check_length("game", "Game", game, GAME_MIN, None, &mut issues);
    if issues.is_empty() {
        Ok((title.to_string(), game.to_string()))
    } else {
        Err(ValidationError::new(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation() {
        assert!(is_valid_url("https://api.dicebear.com/5.x/bottts-neutral/svg?seed=a"));
        assert!(!is_valid_url("not-a-url"));
    }

    #[test]
    fn usernames_are_lowercased() {
        assert_eq!(normalize_username("  Alice_99 ").unwrap(), "alice_99");
    }

    #[test]
    fn usernames_reject_bad_input() {
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("a".repeat(21).as_str()).is_err());
        let err = normalize_username("bad name").unwrap_err();
        assert_eq!(err.issues[0].code, "validation.charset");
    }

    #[test]
    fn comment_length_bounds() {
        assert_eq!(validate_comment(" gg ").unwrap_err().summary(), "Comment is too short");
        assert_eq!(validate_comment(&"x".repeat(201)).unwrap_err().summary(), "Comment is too long");
        assert_eq!(validate_comment("nice clip").unwrap(), "nice clip");
    }

    #[test]
    fn upload_reports_every_field() {
        let err = validate_upload("a", "b").unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(validate_upload("Clutch 1v5", "Valorant").is_ok());
    }
}
