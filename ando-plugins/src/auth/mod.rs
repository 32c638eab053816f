mod cookie;
pub mod session;
pub mod token;

use ando_core::identity::Identity;

/// The result of running either authenticator (C3). `Fail` from spec §4.2
/// (misconfiguration, or a verification exception) collapses into `Absent`
/// here — the orchestrator treats the two identically, so there is no
/// separate variant to keep around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Identity(Identity),
    Absent,
}

impl AuthOutcome {
    pub fn is_absent(&self) -> bool {
        matches!(self, AuthOutcome::Absent)
    }
}
