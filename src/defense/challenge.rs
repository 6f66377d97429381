//! Placeholder human check shown once a client crosses the challenge threshold.
//!
//! The challenge lives in the browser session, not in the defense stores. The
//! engine only says whether one is required; it never sees the question.

use rand::Rng;
use std::ops::RangeInclusive;

const OPERAND_RANGE: RangeInclusive<u32> = 1..=9;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeRecord {
    pub question: String,
    pub expected_answer: String,
}

/// Where a pending challenge is kept between requests.
pub trait ChallengeSlot {
    fn challenge(&self) -> Option<&ChallengeRecord>;
    fn set_challenge(&mut self, challenge: ChallengeRecord);
    fn take_challenge(&mut self) -> Option<ChallengeRecord>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChallengeManager;

impl ChallengeManager {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Return the pending challenge, generating one if none exists.
    ///
    /// The same question is returned until it is answered or cleared.
    pub fn ensure<S: ChallengeSlot>(&self, session: &mut S) -> ChallengeRecord {
        if let Some(existing) = session.challenge() {
            return existing.clone();
        }
        let challenge = generate();
        session.set_challenge(challenge.clone());
        challenge
    }

    /// Exact match against the stored answer. A wrong answer keeps the challenge.
    pub fn validate<S: ChallengeSlot>(&self, session: &S, submitted: &str) -> bool {
        session
            .challenge()
            .is_some_and(|challenge| challenge.expected_answer == submitted)
    }

    pub fn clear<S: ChallengeSlot>(&self, session: &mut S) {
        session.take_challenge();
    }
}

fn generate() -> ChallengeRecord {
    let mut rng = rand::thread_rng();
    let a = rng.gen_range(OPERAND_RANGE);
    let b = rng.gen_range(OPERAND_RANGE);
    ChallengeRecord {
        question: format!("What is {a} + {b}?"),
        expected_answer: (a + b).to_string(),
    }
}
