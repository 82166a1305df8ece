//! Client-side credential checks run before any request is sent.

use crate::error::{Error, Result};

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::Validation("Email is required".to_string()));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(Error::Validation(
            "Enter a valid email address".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(Error::Validation("Password is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_password_confirmation(password: &str, confirmation: &str) -> Result<()> {
    if confirmation.trim().is_empty() {
        return Err(Error::Validation(
            "Password confirmation is required".to_string(),
        ));
    }
    if confirmation != password {
        return Err(Error::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}

/// Full sign-up form check; reports the first failing field.
pub fn validate_sign_up(email: &str, password: &str, confirmation: &str) -> Result<()> {
    validate_email(email)?;
    validate_password(password)?;
    validate_password_confirmation(password, confirmation)
}

pub fn validate_login(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(Error::Validation(
            "Email and password are required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_requires_at_sign_and_dot() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("  ").is_err());
        assert!(validate_email("ab.com").is_err());
        assert!(validate_email("a@bcom").is_err());
    }

    #[test]
    fn password_enforces_minimum_length() {
        assert!(validate_password("secret1").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_password("      ").is_err());
    }

    #[test]
    fn sign_up_reports_first_failing_field() {
        let error = validate_sign_up("bad", "123", "456").unwrap_err();
        assert_eq!(error.user_message(), "Enter a valid email address");

        let error = validate_sign_up("a@b.com", "secret1", "secret2").unwrap_err();
        assert_eq!(error.user_message(), "Passwords do not match");

        assert!(validate_sign_up("a@b.com", "secret1", "secret1").is_ok());
    }

    #[test]
    fn login_requires_both_fields() {
        assert!(validate_login("a@b.com", "").is_err());
        assert!(validate_login(" ", "secret1").is_err());
        assert!(validate_login("a@b.com", "x").is_ok());
    }
}
