// Domain entities for the review workflow

pub mod filing;
pub mod lock;
pub mod question;
pub mod revision;
pub mod submission;

pub use filing::Filing;
pub use lock::QuestionLockRecord;
pub use question::Question;
pub use revision::AnswerRevision;
pub use submission::{Submission, SubmissionAnswer};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Identifies one filing progressing through the workflow.
    FilingId
);
id_type!(QuestionId);
id_type!(RevisionId);
id_type!(SubmissionId);
id_type!(UserId);
id_type!(ProjectId);
id_type!(
    /// A versioned question catalogue; filings pin the version they answer.
    CatalogueVersionId
);
