//! Tenant isolation verifier
//!
//! The defining asymmetry: the authorized tenant's read must SUCCEED, and
//! the unauthorized tenant's read must FAIL with a denial. A successful
//! unauthorized read is a security violation, not an error condition to be
//! handled; a denial on that side is the expected outcome.

use tracing::{error, info};

use crossflow_common::types::TenantId;
use crossflow_common::Error;

use crate::surface::ApiSurface;

/// Outcome of one isolation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsolationCheck {
    /// Authorized read succeeded and unauthorized read was denied
    Isolated,
    /// The authorized tenant could not read its own project
    AuthorizedReadFailed(String),
    /// The unauthorized read neither succeeded nor produced a denial
    /// (e.g. a transient failure), so nothing was proven
    Indeterminate(String),
    /// The unauthorized tenant read the project
    Leaked,
}

impl IsolationCheck {
    pub fn passed(&self) -> bool {
        matches!(self, IsolationCheck::Isolated)
    }
}

pub struct IsolationVerifier<'a, A: ApiSurface + ?Sized> {
    api: &'a A,
}

impl<'a, A: ApiSurface + ?Sized> IsolationVerifier<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub async fn check(
        &self,
        project_id: i64,
        authorized: &TenantId,
        unauthorized: &TenantId,
    ) -> IsolationCheck {
        // Side (a): the owner must be able to read the project.
        if let Err(e) = self.api.get_project(project_id, authorized).await {
            error!(project_id, tenant = %authorized, "authorized read failed: {e}");
            return IsolationCheck::AuthorizedReadFailed(e.to_string());
        }

        // Side (b): success here is the failure condition.
        match self.api.get_project(project_id, unauthorized).await {
            Ok(_) => {
                error!(
                    project_id,
                    tenant = %unauthorized,
                    "unauthorized tenant read the project - SECURITY VIOLATION"
                );
                IsolationCheck::Leaked
            }
            Err(Error::NotFound { .. }) | Err(Error::Forbidden { .. }) => {
                info!(project_id, tenant = %unauthorized, "unauthorized read correctly denied");
                IsolationCheck::Isolated
            }
            Err(e) => IsolationCheck::Indeterminate(format!(
                "unauthorized read failed without a denial: {e}"
            )),
        }
    }

    /// True iff the authorized read succeeds AND the unauthorized read is
    /// denied.
    pub async fn verify(
        &self,
        project_id: i64,
        authorized: &TenantId,
        unauthorized: &TenantId,
    ) -> bool {
        self.check(project_id, authorized, unauthorized).await.passed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use test_case::test_case;

    use crossflow_common::types::{Credentials, Project};
    use crossflow_common::Result;

    /// Fake API with scripted per-tenant read outcomes
    struct ScriptedApi {
        owner_read_ok: bool,
        other_read: OtherRead,
    }

    #[derive(Clone, Copy)]
    enum OtherRead {
        Succeeds,
        Denied,
        Transient,
    }

    fn project(tenant: &TenantId) -> Project {
        Project {
            id: Some(1),
            name: "P1".into(),
            description: "d".into(),
            collaborators: vec![],
            tenant: tenant.clone(),
        }
    }

    #[async_trait]
    impl ApiSurface for ScriptedApi {
        async fn authenticate(&self, _credentials: &Credentials) -> Result<()> {
            Ok(())
        }

        async fn create_project(&self, p: &Project, _tenant: &TenantId) -> Result<Project> {
            Ok(p.clone())
        }

        async fn get_project(&self, id: i64, tenant: &TenantId) -> Result<Project> {
            if tenant.as_str() == "company1" {
                if self.owner_read_ok {
                    Ok(project(tenant))
                } else {
                    Err(Error::NotFound { kind: "project".into(), id: id.to_string() })
                }
            } else {
                match self.other_read {
                    OtherRead::Succeeds => Ok(project(tenant)),
                    OtherRead::Denied => Err(Error::Forbidden { tenant: tenant.clone() }),
                    OtherRead::Transient => Err(Error::Transient("connection reset".into())),
                }
            }
        }

        async fn delete_project(&self, _id: i64, _tenant: &TenantId) -> Result<bool> {
            Ok(true)
        }

        async fn find_project(&self, _name: &str, _tenant: &TenantId) -> Result<Option<Project>> {
            Ok(None)
        }
    }

    #[test_case(true, OtherRead::Denied, true; "owner reads, other denied: isolated")]
    #[test_case(true, OtherRead::Succeeds, false; "other tenant reads: leaked")]
    #[test_case(false, OtherRead::Denied, false; "owner read fails: not isolated")]
    #[test_case(false, OtherRead::Succeeds, false; "both wrong: not isolated")]
    #[tokio::test]
    async fn isolation_asymmetry(owner_ok: bool, other: OtherRead, expected: bool) {
        let api = ScriptedApi { owner_read_ok: owner_ok, other_read: other };
        let verifier = IsolationVerifier::new(&api);
        let passed = verifier
            .verify(1, &TenantId::from("company1"), &TenantId::from("company2"))
            .await;
        assert_eq!(passed, expected);
    }

    #[tokio::test]
    async fn leak_is_distinguished_from_owner_failure() {
        let api = ScriptedApi { owner_read_ok: true, other_read: OtherRead::Succeeds };
        let verifier = IsolationVerifier::new(&api);
        let check = verifier
            .check(1, &TenantId::from("company1"), &TenantId::from("company2"))
            .await;
        assert_eq!(check, IsolationCheck::Leaked);
    }

    #[tokio::test]
    async fn transient_unauthorized_failure_is_indeterminate_not_isolated() {
        let api = ScriptedApi { owner_read_ok: true, other_read: OtherRead::Transient };
        let verifier = IsolationVerifier::new(&api);
        let check = verifier
            .check(1, &TenantId::from("company1"), &TenantId::from("company2"))
            .await;
        assert!(matches!(check, IsolationCheck::Indeterminate(_)));
        assert!(!check.passed());
    }
}
