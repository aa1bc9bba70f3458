//! User directory seam.
//!
//! The directory is an external collaborator: the core only needs
//! existence checks, role checks and the active/verified flags used for
//! driver fan-out eligibility. Embedders back this trait with their own
//! account store; [`InMemoryDirectory`] serves tests and demos.

use async_trait::async_trait;
use dashmap::DashMap;
use shared::CoreResult;
use shared::models::User;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up one user by id.
    async fn get(&self, id: &str) -> CoreResult<Option<User>>;

    /// The full user directory (driver fan-out iterates this).
    async fn all(&self) -> CoreResult<Vec<User>>;
}

/// DashMap-backed directory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<String, User>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn insert(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get(&self, id: &str) -> CoreResult<Option<User>> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn all(&self) -> CoreResult<Vec<User>> {
        Ok(self.users.iter().map(|entry| entry.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::UserRole;

    #[tokio::test]
    async fn lookup_roundtrip() {
        let directory = InMemoryDirectory::new();
        directory.insert(User {
            id: "driver-1".to_string(),
            name: "Budi".to_string(),
            role: UserRole::Driver,
            active: true,
            verified: true,
            location: None,
        });

        let user = directory.get("driver-1").await.unwrap().unwrap();
        assert_eq!(user.name, "Budi");
        assert!(directory.get("missing").await.unwrap().is_none());
        assert_eq!(directory.all().await.unwrap().len(), 1);
    }
}
