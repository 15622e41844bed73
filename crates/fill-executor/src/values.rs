//! Deterministic value table: purpose in, fill value out.

use formpilot_analysis_core::FieldPurpose;
use formpilot_core_types::{SessionId, UserData};

/// A value to fill plus its class hint for reports. `secret` values are
/// filled atomically and never logged.
#[derive(Clone, Debug, PartialEq)]
pub struct FillValue {
    pub text: String,
    pub hint: &'static str,
    pub secret: bool,
}

impl FillValue {
    fn plain(text: String, hint: &'static str) -> Self {
        Self {
            text,
            hint,
            secret: false,
        }
    }

    fn secret(text: String) -> Self {
        Self {
            text,
            hint: "secret",
            secret: true,
        }
    }
}

/// Look up the value for a purpose. `None` means the field should be left
/// untouched (e.g. company kept blank to stay clear of decoys).
pub fn value_for(purpose: FieldPurpose, user: &UserData, session: &SessionId) -> Option<FillValue> {
    match purpose {
        FieldPurpose::Email => Some(FillValue::plain(user.email.clone(), "email")),
        FieldPurpose::Password | FieldPurpose::ConfirmPassword => {
            Some(FillValue::secret(password_for(user, session)))
        }
        FieldPurpose::FirstName => Some(FillValue::plain(user.first_name.clone(), "first-name")),
        FieldPurpose::LastName => Some(FillValue::plain(user.last_name.clone(), "last-name")),
        FieldPurpose::FullName => Some(FillValue::plain(user.full_name(), "full-name")),
        FieldPurpose::Username => {
            Some(FillValue::plain(user.username_or_derived(), "username"))
        }
        FieldPurpose::Phone => user
            .phone
            .clone()
            .filter(|p| !p.is_empty())
            .map(|p| FillValue::plain(p, "phone")),
        FieldPurpose::Company => user
            .company
            .clone()
            .filter(|c| !c.is_empty())
            .map(|c| FillValue::plain(c, "company")),
        FieldPurpose::Country => Some(FillValue::plain("United States".to_string(), "country")),
        FieldPurpose::Other => Some(FillValue::plain(user.full_name(), "best-effort")),
    }
}

/// Session-derived secret when the profile carries no password:
/// deterministic within a session, never reused across sessions.
fn password_for(user: &UserData, session: &SessionId) -> String {
    match &user.password {
        Some(password) if !password.is_empty() => password.clone(),
        _ => {
            let tail: String = session
                .0
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(12)
                .collect();
            format!("Fp!{tail}7q")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserData {
        UserData {
            email: "jane@example.com".into(),
            password: Some("hunter2hunter2".into()),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: Some("5550104477".into()),
            ..Default::default()
        }
    }

    #[test]
    fn table_maps_core_purposes() {
        let session = SessionId::new();
        let u = user();

        let email = value_for(FieldPurpose::Email, &u, &session).unwrap();
        assert_eq!(email.text, "jane@example.com");
        assert!(!email.secret);

        let password = value_for(FieldPurpose::Password, &u, &session).unwrap();
        assert_eq!(password.text, "hunter2hunter2");
        assert!(password.secret);

        let confirm = value_for(FieldPurpose::ConfirmPassword, &u, &session).unwrap();
        assert_eq!(confirm.text, password.text);

        assert_eq!(
            value_for(FieldPurpose::Username, &u, &session).unwrap().text,
            "jane"
        );
    }

    #[test]
    fn generated_password_is_stable_within_a_session() {
        let session = SessionId::new();
        let mut u = user();
        u.password = None;

        let first = value_for(FieldPurpose::Password, &u, &session).unwrap();
        let second = value_for(FieldPurpose::ConfirmPassword, &u, &session).unwrap();
        assert_eq!(first.text, second.text);
        assert!(first.text.starts_with("Fp!"));

        let other_session = SessionId::new();
        let third = value_for(FieldPurpose::Password, &u, &other_session).unwrap();
        assert_ne!(first.text, third.text);
    }

    #[test]
    fn empty_company_is_left_untouched() {
        let session = SessionId::new();
        let u = user();
        assert!(value_for(FieldPurpose::Company, &u, &session).is_none());

        let mut with_company = user();
        with_company.company = Some("Acme Corp".into());
        assert_eq!(
            value_for(FieldPurpose::Company, &with_company, &session)
                .unwrap()
                .text,
            "Acme Corp"
        );
    }
}
