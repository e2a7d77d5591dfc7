//! crates/bookstore_core/src/access.rs
//!
//! The access control gate. Two checks live side by side and are applied to
//! different route groups: a literal role match against the token's role
//! claim, and a lookup in the persisted user -> role -> permission mapping.
//! They are intentionally not merged into one policy. Both fail closed.

use std::sync::Arc;

use tracing::{debug, error};

use crate::domain::Identity;
use crate::error::AuthError;
use crate::ports::PermissionRepository;

/// Permission names follow `<resource>/<action>`.
pub mod permissions {
    pub const AUTHOR_CREATE: &str = "author/create";
    pub const AUTHOR_UPDATE: &str = "author/update";
    pub const AUTHOR_DELETE: &str = "author/delete";
    pub const BOOK_CREATE: &str = "book/create";
    pub const BOOK_UPDATE: &str = "book/update";
    pub const BOOK_DELETE: &str = "book/delete";
}

pub const ADMIN_ROLE: &str = "admin";

pub struct AccessGate {
    permissions: Arc<dyn PermissionRepository>,
}

impl AccessGate {
    pub fn new(permissions: Arc<dyn PermissionRepository>) -> Self {
        Self { permissions }
    }

    /// Coarse check: the identity's role claim must equal `role` exactly.
    pub fn require_role(identity: &Identity, role: &str) -> Result<(), AuthError> {
        if identity.role != role {
            debug!(user_id = identity.user_id, role = %identity.role, required = role, "role check denied");
            return Err(AuthError::Forbidden);
        }
        Ok(())
    }

    /// Fine-grained check against the persisted mapping. A lookup failure is
    /// treated as a denial.
    pub async fn require_permission(
        &self,
        identity: &Identity,
        permission: &str,
    ) -> Result<(), AuthError> {
        match self.permissions.has_access(identity.user_id, permission).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(user_id = identity.user_id, permission, "permission check denied");
                Err(AuthError::PermissionDenied)
            }
            Err(e) => {
                error!(user_id = identity.user_id, permission, "Failed to look up permission: {:?}", e);
                Err(AuthError::PermissionDenied)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;

    fn identity(user_id: i64, role: &str) -> Identity {
        Identity {
            user_id,
            username: format!("user-{user_id}"),
            role: role.to_string(),
        }
    }

    #[test]
    fn role_check_is_a_literal_match() {
        assert!(AccessGate::require_role(&identity(1, "admin"), ADMIN_ROLE).is_ok());
        assert_eq!(
            AccessGate::require_role(&identity(1, "user"), ADMIN_ROLE),
            Err(AuthError::Forbidden)
        );
        assert_eq!(
            AccessGate::require_role(&identity(1, "Admin"), ADMIN_ROLE),
            Err(AuthError::Forbidden)
        );
    }

    #[tokio::test]
    async fn permission_follows_the_persisted_mapping() {
        let store = InMemoryStore::new();
        store.grant(1, permissions::BOOK_CREATE);
        store.grant(2, permissions::AUTHOR_DELETE);
        let gate = AccessGate::new(Arc::new(store));

        let users = [1, 2, 3];
        let names = [
            permissions::BOOK_CREATE,
            permissions::BOOK_DELETE,
            permissions::AUTHOR_DELETE,
        ];
        for user in users {
            for name in names {
                let allowed = gate.require_permission(&identity(user, "admin"), name).await;
                let expected = (user == 1 && name == permissions::BOOK_CREATE)
                    || (user == 2 && name == permissions::AUTHOR_DELETE);
                assert_eq!(allowed.is_ok(), expected, "user {user} / {name}");
            }
        }
    }

    struct BrokenPermissions;

    #[async_trait]
    impl PermissionRepository for BrokenPermissions {
        async fn has_access(&self, _user_id: i64, _permission: &str) -> PortResult<bool> {
            Err(PortError::Unexpected("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn permission_lookup_failure_denies() {
        let gate = AccessGate::new(Arc::new(BrokenPermissions));
        let result = gate
            .require_permission(&identity(1, "admin"), permissions::BOOK_UPDATE)
            .await;
        assert_eq!(result, Err(AuthError::PermissionDenied));
    }
}
