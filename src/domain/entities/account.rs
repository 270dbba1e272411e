//! Requested changes to the current account.

/// Fields to change on the current account. Absent or empty fields are left
/// unchanged, each independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    avatar: Option<String>,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.trim().is_empty()).then_some(value)
}

impl AccountChanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = non_empty(username);
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = non_empty(email);
        self
    }

    /// Current password; required by the service when changing the email.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = non_empty(password);
        self
    }

    /// Avatar as a data URI.
    #[must_use]
    pub fn avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = non_empty(avatar);
        self
    }

    #[must_use]
    pub fn new_username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn new_email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn current_password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    #[must_use]
    pub fn new_avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    /// True when nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.avatar.is_none()
    }
}

impl std::fmt::Display for AccountChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields = Vec::new();
        if self.username.is_some() {
            fields.push("username");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.avatar.is_some() {
            fields.push("avatar");
        }
        write!(f, "[{}]", fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_mean_unchanged() {
        let changes = AccountChanges::new().username("").email("  ").password("hunter2");
        assert!(changes.is_empty());
        assert_eq!(changes.new_username(), None);
        assert_eq!(changes.current_password(), Some("hunter2"));
    }

    #[test]
    fn test_fields_are_independent() {
        let changes = AccountChanges::new().username("ferris").avatar("");
        assert!(!changes.is_empty());
        assert_eq!(changes.new_username(), Some("ferris"));
        assert_eq!(changes.new_avatar(), None);
        assert_eq!(changes.to_string(), "[username]");
    }
}
