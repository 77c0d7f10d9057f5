//! Cross-domain workflow tests
//!
//! Sign-in, enrollment and reimbursement services working together over
//! in-memory storage.

use chrono::Utc;
use rust_decimal_macros::dec;

use core_kernel::{Money, Permission};
use domain_people::Person;
use domain_programs::{
    ApplicationDecision, EnrollmentDetails, EnrollmentStatus, InvitationAction, Participant, ProgramError,
};
use domain_reimbursements::{
    ApprovalOverride, ExpenseCategory, NewLineItem, ReimbursementError, RequestStatus, TaxStatus,
};
use test_utils::*;

fn participant(person: &Person) -> Participant {
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

mod sign_in_to_application {
    use super::*;

    #[tokio::test]
    async fn test_first_sign_in_creates_everything_once() {
        let services = TestServices::new().await;
        let identity = TestIdentityBuilder::new().with_email("ada@example.org").build();

        let first = services.people.link_orcid_login(identity.clone(), Utc::now()).await.unwrap();
        assert!(first.user_created);
        assert!(first.person_created);
        assert_eq!(first.person.orcid_id.as_deref(), Some(OrcidFixtures::josiah()));

        let second = services.people.link_orcid_login(identity, Utc::now()).await.unwrap();
        assert!(!second.user_created);
        assert!(!second.person_created);
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(second.person.id, first.person.id);
        assert_eq!(services.people_port.person_count().await, 1);
        assert_eq!(services.people_port.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_apply_then_accept() {
        let program = TestProgramBuilder::new(1042).build();
        let services = TestServices::with_programs(vec![program.clone()]).await;
        let link = services
            .people
            .link_orcid_login(TestIdentityBuilder::new().build(), Utc::now())
            .await
            .unwrap();

        let enrollment = services
            .enrollments
            .apply(&participant(&link.person), program.code, EnrollmentDetails::default(), Utc::now())
            .await
            .unwrap();
        assert_enrollment_status(&enrollment, EnrollmentStatus::Pending);

        let overview = services.enrollments.overview(link.person.id, Utc::now()).await.unwrap();
        assert_eq!(overview.pending_applications.len(), 1);
        assert!(overview.upcoming.is_empty());

        // Applying again is refused
        let again = services
            .enrollments
            .apply(&participant(&link.person), program.code, EnrollmentDetails::default(), Utc::now())
            .await;
        assert!(matches!(again, Err(ProgramError::AlreadyEnrolled(_))));

        let accepted = services
            .enrollments
            .decide_application(&ActorFixtures::program_manager(), enrollment.id, ApplicationDecision::Accept, Utc::now())
            .await
            .unwrap();
        assert_enrollment_status(&accepted, EnrollmentStatus::Accepted);

        let overview = services.enrollments.overview(link.person.id, Utc::now()).await.unwrap();
        assert_eq!(overview.upcoming.len(), 1);
        assert!(overview.pending_applications.is_empty());

        let open = services
            .programs
            .open_programs_for(link.person.id, Utc::now(), 10)
            .await
            .unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_closed_program_refuses_applications() {
        let program = TestProgramBuilder::new(7).closed().build();
        let services = TestServices::with_programs(vec![program.clone()]).await;
        let person = TestPersonBuilder::new().build();

        let result = services
            .enrollments
            .apply(&participant(&person), program.code, EnrollmentDetails::default(), Utc::now())
            .await;
        assert!(matches!(result, Err(ProgramError::NotAcceptingApplications(_))));
    }
}

mod invitations {
    use super::*;

    #[tokio::test]
    async fn test_invited_person_accepts_on_sign_in() {
        let program = TestProgramBuilder::new(1042).build();
        let services = TestServices::with_programs(vec![program.clone()]).await;

        let invitation = services
            .invitations
            .invite(&ActorFixtures::program_manager(), program.id, "Grace@Example.org", None, Utc::now())
            .await
            .unwrap();

        let link = services
            .people
            .link_orcid_login(
                TestIdentityBuilder::new().with_email("grace@example.org").build(),
                Utc::now(),
            )
            .await
            .unwrap();

        let pending = services
            .invitations
            .pending_for(link.person.id, link.person.email.as_deref(), Utc::now())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].expired);

        let response = services
            .invitations
            .respond(&invitation.token, InvitationAction::Accept, Some(&participant(&link.person)), Utc::now())
            .await
            .unwrap();
        let enrollment = response.enrollment.expect("accepting enrolls");
        assert_enrollment_status(&enrollment, EnrollmentStatus::Accepted);
        assert!(!response.already_enrolled);

        let pending = services
            .invitations
            .pending_for(link.person.id, link.person.email.as_deref(), Utc::now())
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_accept_without_sign_in() {
        let program = TestProgramBuilder::new(1042).build();
        let services = TestServices::with_programs(vec![program.clone()]).await;
        let invitation = services
            .invitations
            .invite(&ActorFixtures::program_manager(), program.id, "guest@example.org", None, Utc::now())
            .await
            .unwrap();

        let result = services
            .invitations
            .respond(&invitation.token, InvitationAction::Accept, None, Utc::now())
            .await;
        assert!(matches!(result, Err(ProgramError::LoginRequired)));
        assert_eq!(services.enrollment_port.enrollment_count().await, 0);
    }

    #[tokio::test]
    async fn test_invite_needs_permission() {
        let program = TestProgramBuilder::new(1042).build();
        let services = TestServices::with_programs(vec![program.clone()]).await;
        let result = services
            .invitations
            .invite(&ActorFixtures::reviewer(), program.id, "guest@example.org", None, Utc::now())
            .await;
        assert!(matches!(result, Err(ProgramError::PermissionDenied(Permission::ManagePrograms))));
    }
}

mod reimbursement_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_draft_to_paid() {
        let services = TestServices::new().await;
        let link = services
            .people
            .link_orcid_login(TestIdentityBuilder::new().build(), Utc::now())
            .await
            .unwrap();
        let submitter = link.user.actor(Some(link.person.id));

        let builder = TestReimbursementBuilder::new(link.person.id, link.user.id)
            .without_expenses()
            .without_receipts();
        let draft = services
            .reimbursements
            .create(&submitter, builder.new_reimbursement(), Utc::now())
            .await
            .unwrap();
        assert_request_status(&draft, RequestStatus::Draft);

        // Nothing to submit
        let empty = services.reimbursements.submit(&submitter, draft.id, "Ada Lovelace", Utc::now()).await;
        assert!(matches!(empty, Err(ReimbursementError::NotReady(_))));

        let (_, airfare) = services
            .reimbursements
            .add_line_item(
                &submitter,
                draft.id,
                NewLineItem {
                    category: ExpenseCategory::Airfare,
                    description: "LHR-LAX return".to_string(),
                    date_incurred: TimeFixtures::travel_date(),
                    amount_requested: MoneyFixtures::usd_airfare(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let (with_meal, _) = services
            .reimbursements
            .add_line_item(
                &submitter,
                draft.id,
                NewLineItem {
                    category: ExpenseCategory::Meals,
                    description: "Dinner at LAX".to_string(),
                    date_incurred: TimeFixtures::travel_date(),
                    amount_requested: MoneyFixtures::usd_meal(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_money_eq(&with_meal.total_requested, dec!(682.75));
        assert_totals_consistent(&with_meal);

        let submitted = services
            .reimbursements
            .submit(&submitter, draft.id, "Ada Lovelace", Utc::now())
            .await
            .unwrap();
        assert_request_status(&submitted, RequestStatus::Submitted);
        assert!(submitted.payment_info_snapshot.is_some());

        // Submitted requests are read-only for the submitter
        let late_edit = services
            .reimbursements
            .remove_line_item(&submitter, draft.id, airfare, Utc::now())
            .await;
        assert!(matches!(late_edit, Err(ReimbursementError::NotEditable(_))));

        let reviewer = ActorFixtures::reviewer();
        assert_eq!(services.reimbursements.pending_review(&reviewer).await.unwrap().len(), 1);
        let denied = services
            .reimbursements
            .approve(&reviewer, draft.id, &[], Utc::now())
            .await;
        assert!(matches!(denied, Err(ReimbursementError::PermissionDenied(_))));

        let approved = services
            .reimbursements
            .approve(
                &ActorFixtures::approver(),
                draft.id,
                &[ApprovalOverride {
                    line_item_id: airfare,
                    amount_approved: Money::usd(dec!(600.00)),
                    reviewer_notes: Some("Capped at economy fare".to_string()),
                }],
                Utc::now(),
            )
            .await
            .unwrap();
        assert_money_eq(&approved.total_approved.unwrap(), dec!(642.75));

        let payer = ActorFixtures::payer();
        assert_eq!(services.reimbursements.pending_payment(&payer).await.unwrap().len(), 1);
        let paid = services
            .reimbursements
            .mark_paid(&payer, draft.id, Some("ACH-20250410"), None, Utc::now())
            .await
            .unwrap();
        assert_request_status(&paid, RequestStatus::Paid);
        assert_money_eq(&paid.total_paid.unwrap(), dec!(642.75));
        assert_timeline_ordered(&paid);

        let summary = services.reimbursements.status_summary(link.user.id).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.paid, 1);
    }

    #[tokio::test]
    async fn test_changes_requested_then_resubmitted() {
        let services = TestServices::new().await;
        let person = TestPersonBuilder::new().build();
        let submitter = ActorFixtures::participant(person.id);
        let request = TestReimbursementBuilder::new(person.id, submitter.user_id).build_submitted();
        services.reimbursement_port.force_put(request.clone()).await;

        let sent_back = services
            .reimbursements
            .request_changes(&ActorFixtures::reviewer(), request.id, "Please attach the hotel folio", Utc::now())
            .await
            .unwrap();
        assert_request_status(&sent_back, RequestStatus::ChangesNeeded);
        assert!(sent_back.is_editable());
        assert_eq!(services.reimbursements.needs_attention(&submitter).await.unwrap().len(), 1);

        let (_, _) = services
            .reimbursements
            .add_line_item(
                &submitter,
                request.id,
                NewLineItem {
                    category: ExpenseCategory::Lodging,
                    description: "Hotel, 1 night".to_string(),
                    date_incurred: TimeFixtures::travel_date(),
                    amount_requested: MoneyFixtures::usd_lodging(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let resubmitted = services
            .reimbursements
            .submit(&submitter, request.id, "Ada Lovelace", Utc::now())
            .await
            .unwrap();
        assert_request_status(&resubmitted, RequestStatus::Submitted);
        assert_eq!(resubmitted.line_items.len(), 2);
    }

    #[tokio::test]
    async fn test_visa_holder_needs_passport() {
        let services = TestServices::new().await;
        let person = TestPersonBuilder::new().build();
        let submitter = ActorFixtures::participant(person.id);
        let draft = TestReimbursementBuilder::new(person.id, submitter.user_id)
            .with_tax(PayeeFixtures::visa_holder())
            .build_draft();
        assert_eq!(draft.tax.tax_status, TaxStatus::VisaNonresident);
        assert_not_ready_because(&draft, "Passport");
        services.reimbursement_port.force_put(draft.clone()).await;

        let result = services.reimbursements.submit(&submitter, draft.id, "Ada Lovelace", Utc::now()).await;
        assert!(matches!(result, Err(ReimbursementError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_other_users_cannot_see_requests() {
        let services = TestServices::new().await;
        let person = TestPersonBuilder::new().build();
        let owner = ActorFixtures::participant(person.id);
        let draft = TestReimbursementBuilder::new(person.id, owner.user_id).build_draft();
        services.reimbursement_port.force_put(draft.clone()).await;

        let stranger = ActorFixtures::participant(TestPersonBuilder::new().build().id);
        let result = services.reimbursements.get(&stranger, draft.id).await;
        assert!(matches!(result, Err(ReimbursementError::NotFound(_))));

        assert!(services.reimbursements.get(&ActorFixtures::reviewer(), draft.id).await.is_ok());
    }
}
