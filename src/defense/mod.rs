//! Login defense: failure tracking, escalation policy, lockout and challenge.
//!
//! State is in-memory and local to one running instance. Several instances
//! behind a load balancer each defend on their own; a guesser spread across
//! them is not caught here.

pub mod challenge;
pub mod client_key;
pub mod clock;
pub mod engine;
pub mod lockout;
pub mod policy;
pub mod state;
pub mod window;

pub use challenge::{ChallengeManager, ChallengeRecord, ChallengeSlot};
pub use client_key::{diagnostic_client_ip, ClientKey, ClientKeyResolver, ClientKeySlot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::DefenseEngine;
pub use lockout::LockoutStore;
pub use policy::{DefensePolicy, PolicyError, PolicyMessages};
pub use state::{DefenseMessage, DefenseStage, DefenseState, Severity};
pub use window::FailureWindow;
