use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FilingId, QuestionId, UserId};

/// TTL-bounded exclusive claim on editing one answer.
/// At most one non-expired holder exists per (filing, question); expiry is
/// detected lazily on access, there is no background sweeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionLockRecord {
    pub filing_id: FilingId,
    pub question_id: QuestionId,
    pub holder: UserId,
    pub expires_at: DateTime<Utc>,
}

impl QuestionLockRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
