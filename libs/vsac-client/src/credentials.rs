//! VSAC account credentials

use std::fmt;

/// Username/password pair sent as HTTP Basic auth.
///
/// The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials only when both parts are present and non-blank.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        let creds = Self::new(username?, password?);
        creds.is_complete().then_some(creds)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let creds = Credentials::new("apikey", "super-secret-key");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("apikey"));
        assert!(!rendered.contains("super-secret-key"));
    }

    #[test]
    fn blank_parts_are_incomplete() {
        assert!(!Credentials::new("", "pw").is_complete());
        assert!(!Credentials::new("user", "   ").is_complete());
        assert!(Credentials::new("user", "pw").is_complete());
    }

    #[test]
    fn from_parts_requires_both() {
        assert!(Credentials::from_parts(Some("user"), None).is_none());
        assert!(Credentials::from_parts(Some("user"), Some("")).is_none());
        assert!(Credentials::from_parts(Some("user"), Some("pw")).is_some());
    }
}
