//! Person entity
//!
//! A [`Person`] is the canonical identity of a participant, organizer or
//! staff member. Records predate online accounts (many were migrated from
//! the participant database), so almost every field is optional.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::PersonId;
use crate::error::PeopleError;
use crate::validation::{validate_email, validate_orcid};

/// Canonical identity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    /// Unique, compared case-insensitively
    pub email: Option<String>,
    pub mailing_address: Option<String>,
    pub phone_number: Option<String>,
    /// Canonical dashed ORCID iD, unique when present
    pub orcid_id: Option<String>,
    pub home_page: Option<String>,
    /// MathSciNet author identifier
    pub math_review_id: Option<String>,
    pub institution: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Creates an empty person record
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: PersonId::new_v7(),
            first_name: None,
            middle_name: None,
            last_name: None,
            preferred_name: None,
            email: None,
            mailing_address: None,
            phone_number: None,
            orcid_id: None,
            home_page: None,
            math_review_id: None,
            institution: None,
            dietary_restrictions: None,
            gender: None,
            ethnicity: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a person with a name and email
    pub fn with_name(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            email,
            ..Self::new()
        }
    }

    /// Name for display, preferring the preferred name over the first name
    pub fn display_name(&self) -> String {
        let given = self
            .preferred_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.first_name.as_deref())
            .unwrap_or("");
        let family = self.last_name.as_deref().unwrap_or("");
        format!("{} {}", given, family).trim().to_string()
    }

    /// Percentage (0-100) of the key contact fields that are filled in
    ///
    /// The fields counted are first name, last name, email, institution,
    /// phone number, mailing address and ORCID iD.
    pub fn profile_completion(&self) -> u8 {
        let fields = [
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.institution,
            &self.phone_number,
            &self.mailing_address,
            &self.orcid_id,
        ];
        let filled = fields
            .iter()
            .filter(|f| f.as_deref().map_or(false, |s| !s.trim().is_empty()))
            .count();
        ((filled * 100) / fields.len()) as u8
    }
}

impl Default for Person {
    fn default() -> Self {
        Self::new()
    }
}

/// Profile changes submitted by the person
///
/// `None` leaves a field untouched. `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    pub email: Option<String>,
    pub mailing_address: Option<String>,
    pub phone_number: Option<String>,
    pub orcid_id: Option<String>,
    pub home_page: Option<String>,
    pub math_review_id: Option<String>,
    pub institution: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
}

fn apply_text(target: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        let v = v.trim();
        *target = if v.is_empty() { None } else { Some(v.to_string()) };
    }
}

impl PersonUpdate {
    /// Validates and normalizes the email and ORCID fields
    ///
    /// Empty values pass through untouched so they can clear the field.
    pub fn normalized(mut self) -> Result<Self, PeopleError> {
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            self.email = Some(validate_email(email)?);
        }
        if let Some(orcid) = self.orcid_id.as_deref().filter(|o| !o.trim().is_empty()) {
            self.orcid_id = Some(validate_orcid(orcid)?);
        }
        Ok(self)
    }

    /// Applies the update to a person record
    pub fn apply_to(self, person: &mut Person) {
        apply_text(&mut person.first_name, self.first_name);
        apply_text(&mut person.middle_name, self.middle_name);
        apply_text(&mut person.last_name, self.last_name);
        apply_text(&mut person.preferred_name, self.preferred_name);
        apply_text(&mut person.email, self.email);
        apply_text(&mut person.mailing_address, self.mailing_address);
        apply_text(&mut person.phone_number, self.phone_number);
        apply_text(&mut person.orcid_id, self.orcid_id);
        apply_text(&mut person.home_page, self.home_page);
        apply_text(&mut person.math_review_id, self.math_review_id);
        apply_text(&mut person.institution, self.institution);
        apply_text(&mut person.dietary_restrictions, self.dietary_restrictions);
        apply_text(&mut person.gender, self.gender);
        apply_text(&mut person.ethnicity, self.ethnicity);
        person.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_preferred_name() {
        let mut person = Person::with_name("Katherine", "Johnson", None);
        assert_eq!(person.display_name(), "Katherine Johnson");
        person.preferred_name = Some("Kate".to_string());
        assert_eq!(person.display_name(), "Kate Johnson");
    }

    #[test]
    fn test_profile_completion() {
        let mut person = Person::new();
        assert_eq!(person.profile_completion(), 0);

        person.first_name = Some("Emmy".to_string());
        person.last_name = Some("Noether".to_string());
        person.email = Some("emmy@example.org".to_string());
        // 3 of 7
        assert_eq!(person.profile_completion(), 42);

        person.institution = Some("Göttingen".to_string());
        person.phone_number = Some("555-0100".to_string());
        person.mailing_address = Some("Bunsenstraße 3".to_string());
        person.orcid_id = Some("0000-0002-1825-0097".to_string());
        assert_eq!(person.profile_completion(), 100);
    }

    #[test]
    fn test_blank_fields_do_not_count() {
        let mut person = Person::new();
        person.first_name = Some("   ".to_string());
        assert_eq!(person.profile_completion(), 0);
    }

    #[test]
    fn test_update_clears_with_empty_string() {
        let mut person = Person::with_name("Ada", "Lovelace", None);
        person.institution = Some("Analytical Society".to_string());

        PersonUpdate {
            institution: Some(String::new()),
            phone_number: Some(" 555-0199 ".to_string()),
            ..Default::default()
        }
        .apply_to(&mut person);

        assert_eq!(person.institution, None);
        assert_eq!(person.phone_number.as_deref(), Some("555-0199"));
        assert_eq!(person.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_update_normalizes_orcid() {
        let update = PersonUpdate {
            orcid_id: Some("https://orcid.org/0000-0002-1825-0097".to_string()),
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(update.orcid_id.as_deref(), Some("0000-0002-1825-0097"));
    }

    #[test]
    fn test_update_rejects_bad_email() {
        let result = PersonUpdate {
            email: Some("nope".to_string()),
            ..Default::default()
        }
        .normalized();
        assert!(matches!(result, Err(PeopleError::InvalidEmail(_))));
    }
}
