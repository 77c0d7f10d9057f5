//! Request handlers

pub mod auth;
pub mod me;
pub mod programs;
pub mod enrollments;
pub mod invitations;
pub mod reimbursements;
pub mod staff;
pub mod health;

use core_kernel::Actor;
use domain_people::Person;
use domain_programs::Participant;

use crate::error::ApiError;
use crate::AppState;

/// The fields an enrollment copies from a person
pub(crate) fn participant_from(person: &Person) -> Participant {
    Participant {
        person_id: person.id,
        first_name: person.first_name.clone(),
        middle_name: person.middle_name.clone(),
        last_name: person.last_name.clone(),
        email: person.email.clone(),
        orcid_id: person.orcid_id.clone(),
        institution: person.institution.clone(),
    }
}

/// Loads the signed-in user's person as a program participant
pub(crate) async fn participant_for(state: &AppState, actor: &Actor) -> Result<Participant, ApiError> {
    let person = state.people.person_for_user(actor.user_id).await?;
    Ok(participant_from(&person))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_copies_contact_fields() {
        let mut person = Person::with_name("Sofia", "Kovalevskaya", Some("sofia@example.org".into()));
        person.institution = Some("Stockholm University".into());
        let participant = participant_from(&person);
        assert_eq!(participant.person_id, person.id);
        assert_eq!(participant.last_name.as_deref(), Some("Kovalevskaya"));
        assert_eq!(participant.institution.as_deref(), Some("Stockholm University"));
        assert_eq!(participant.email, person.email);
    }
}
