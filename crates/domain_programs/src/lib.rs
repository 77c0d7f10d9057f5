//! Programs Domain
//!
//! Programs are the workshops, SQuaRE groups and meetings the institute
//! runs. People take part in a program through an [`Enrollment`], which is
//! created either by applying, by accepting a [`ProgramInvitation`], or by
//! staff directly.
//!
//! # Enrollment lifecycle
//!
//! ```text
//! (apply) ──> PENDING ──accept──> ACCEPTED ──withdraw──> DECLINED
//!                │
//!                └────decline───> DECLINED
//! (invitation accepted) ───────> ACCEPTED
//! ```
//!
//! The status is derived from the `accepted_at` and `declined_at`
//! timestamps; a withdrawal is a decline after acceptance.
//!
//! # Invitations
//!
//! An invitation carries an opaque token sent by email. It stays pending
//! until the invitee accepts or declines, and expires at the program's
//! application deadline.

pub mod program;
pub mod enrollment;
pub mod invitation;
pub mod error;
pub mod ports;
pub mod services;

pub use program::{Program, ProgramType, NewProgram, Organizer};
pub use enrollment::{
    Enrollment, EnrollmentSource, EnrollmentStatus, EnrollmentDetails, Participant,
};
pub use invitation::{ProgramInvitation, InvitationStatus, InvitationAction};
pub use error::ProgramError;
pub use ports::{ProgramPort, EnrollmentPort, ProgramQuery, ProgramOrder};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::{MockProgramPort, MockEnrollmentPort};
pub use services::{
    ProgramService, EnrollmentService, InvitationService,
    ApplicationDecision, EnrollmentWithProgram, EnrollmentOverview,
    InvitationResponse, PendingInvitation,
};
