// Helper functions for safe logging

/// Masks email addresses for safe logging
///
/// # Example
/// ```
/// use authkit::common::helpers::safe_email_log;
///
/// assert_eq!(safe_email_log("user@example.com"), "u***@example.com");
/// ```
pub fn safe_email_log(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if email.len() > 3 && !local.is_empty() && !domain.contains('@') => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => "***@***.***".to_string(),
    }
}

/// Masks tokens for safe logging, showing only the first and last 4 characters
///
/// # Example
/// ```
/// use authkit::common::helpers::safe_token_log;
///
/// assert_eq!(safe_token_log("eyJhbGciOiJIUzI1NiJ9"), "eyJh...NiJ9");
/// ```
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 8 && token.is_ascii() {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_masking() {
        assert_eq!(safe_email_log("user@example.com"), "u***@example.com");
        assert_eq!(safe_email_log("a@b"), "***@***.***");
        assert_eq!(safe_email_log("no-at-sign"), "***@***.***");
        assert_eq!(safe_email_log("@example.com"), "***@***.***");
    }

    #[test]
    fn test_token_masking() {
        assert_eq!(safe_token_log("short"), "***");
        assert_eq!(safe_token_log("abcdefghijkl"), "abcd...ijkl");
    }
}
