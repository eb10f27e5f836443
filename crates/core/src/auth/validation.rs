use super::AuthError;

/// Longest authorization code accepted from a callback.
pub const MAX_CODE_LEN: usize = 2048;

/// Longest `state` accepted from a callback.
pub const MAX_STATE_LEN: usize = 256;

/// Validates a value received on the provider callback.
///
/// Returns the value unchanged if acceptable.
///
/// # Security
///
/// Callback parameters come straight from the user agent, so they are
/// bounded in length and must not contain control characters before they
/// are used as store keys or forwarded to the provider.
///
/// # Examples
///
/// ```
/// use sessiongate_core::auth::validate_callback_param;
///
/// assert!(validate_callback_param("code", "4/0AX4XfWh", 2048).is_ok());
/// assert!(validate_callback_param("code", "", 2048).is_err());
/// ```
pub fn validate_callback_param<'a>(
    name: &str,
    value: &'a str,
    max_len: usize,
) -> Result<&'a str, AuthError> {
    if value.is_empty() {
        return Err(AuthError::InvalidRequest(format!("missing {name}")));
    }

    if value.len() > max_len {
        return Err(AuthError::InvalidRequest(format!(
            "{name} exceeds {max_len} bytes"
        )));
    }

    if value.chars().any(|c| c.is_control()) {
        return Err(AuthError::InvalidRequest(format!(
            "{name} contains control characters"
        )));
    }

    Ok(value)
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty token.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
