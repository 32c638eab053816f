use serde::{Deserialize, Serialize};

/// The identity asserted by authentication and forwarded to the upstream as
/// `X-User-Id` / `X-User-Role` / `X-User-Plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: String,
    pub plan: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            plan: plan.into(),
        }
    }

    /// The sentinel returned for requests admitted by a public-path rule.
    pub fn anonymous() -> Self {
        Self::new("anonymous", "ROLE_ANONYMOUS", "FREE")
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty() || self.id == "anonymous"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_sentinel_matches_spec() {
        let anon = Identity::anonymous();
        assert_eq!(anon.id, "anonymous");
        assert_eq!(anon.role, "ROLE_ANONYMOUS");
        assert_eq!(anon.plan, "FREE");
        assert!(anon.is_anonymous());
    }

    #[test]
    fn non_anonymous_identity_is_not_anonymous() {
        let id = Identity::new("u1", "ROLE_USER", "PRO");
        assert!(!id.is_anonymous());
    }
}
