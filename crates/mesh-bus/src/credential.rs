//! # Credential Scoping
//!
//! The transport-level authorization boundary. A [`Credential`] states which
//! subjects a session may publish or subscribe to; the bus checks it on
//! every operation and rejects violations with `AuthorizationDenied`.
//!
//! The registry, discovery, and invocation components never re-check
//! authorization themselves — they only react to traffic the bus let
//! through.

use crate::subject::{Subject, SubjectPattern};
use mesh_types::TenantId;

/// What a credential is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Scoped to a single tenant's subjects.
    Tenant(TenantId),
    /// Infrastructure scope covering every tenant. Held only by the mesh
    /// node's own services (registry, discovery).
    Service,
}

/// A caller identity with a subject scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Display name for logs.
    name: String,
    /// Subject scope.
    scope: Scope,
}

impl Credential {
    /// Credential scoped to one tenant.
    #[must_use]
    pub fn tenant(name: impl Into<String>, tenant: TenantId) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Tenant(tenant),
        }
    }

    /// Infrastructure credential covering all tenants.
    #[must_use]
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Service,
        }
    }

    /// Display name for logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The credential's scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Whether this credential may publish to / request on a subject.
    #[must_use]
    pub fn allows_subject(&self, subject: &Subject) -> bool {
        match &self.scope {
            Scope::Service => true,
            Scope::Tenant(tenant) => subject.tenant() == tenant,
        }
    }

    /// Whether this credential may subscribe with a pattern.
    ///
    /// Tenant credentials must pin the tenant position to their own tenant
    /// literal; wildcard-tenant patterns require service scope.
    #[must_use]
    pub fn allows_pattern(&self, pattern: &SubjectPattern) -> bool {
        match &self.scope {
            Scope::Service => true,
            Scope::Tenant(tenant) => pattern.tenant_literal() == Some(tenant.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use mesh_types::DeviceId;

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name).unwrap()
    }

    #[test]
    fn test_tenant_credential_scoped_to_own_subjects() {
        let cred = Credential::tenant("agent-1", tenant("warehouse-east"));

        let own = Subject::Registry {
            tenant: tenant("warehouse-east"),
        };
        let foreign = Subject::Command {
            tenant: tenant("factory"),
            device_id: DeviceId::new("robot-001").unwrap(),
        };

        assert!(cred.allows_subject(&own));
        assert!(!cred.allows_subject(&foreign));
    }

    #[test]
    fn test_tenant_credential_rejects_wildcard_tenant_pattern() {
        let cred = Credential::tenant("agent-1", tenant("warehouse-east"));

        let own = SubjectPattern::parse("warehouse-east.*.event.>").unwrap();
        let wild = SubjectPattern::parse("*.registry").unwrap();
        let foreign = SubjectPattern::parse("factory.*.event.>").unwrap();

        assert!(cred.allows_pattern(&own));
        assert!(!cred.allows_pattern(&wild));
        assert!(!cred.allows_pattern(&foreign));
    }

    #[test]
    fn test_service_credential_covers_everything() {
        let cred = Credential::service("registry");
        assert!(cred.allows_subject(&Subject::Registry {
            tenant: tenant("factory")
        }));
        assert!(cred.allows_pattern(&SubjectPattern::parse("*.registry").unwrap()));
    }
}
