/// In-process [`UserStore`]
///
/// Keeps records in insertion order behind a `tokio::sync::RwLock` and
/// enforces the same unique-email rule as the PostgreSQL index. Used by the
/// API test suites so they run without a database server.
///
/// [`MemoryUserStore::set_offline`] simulates a lost connection: while set,
/// every call fails with [`StoreError::Unavailable`].

use crate::db::store::{StoreError, StoreResult, UserStore};
use crate::models::user::{User, UserPatch, ValidNewUser};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory user store
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
    offline: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the store offline or brings it back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_all(&self) -> StoreResult<Vec<User>> {
        self.online()?;
        Ok(self.users.read().await.clone())
    }

    async fn insert(&self, user: ValidNewUser) -> StoreResult<User> {
        self.online()?;
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::duplicate_email(user.email));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            age: user.age,
            city: user.city,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());

        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        self.online()?;
        let mut users = self.users.write().await;

        let Some(index) = users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = &patch.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::duplicate_email(email.clone()));
            }
        }

        let user = &mut users[index];

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(age) = patch.age {
            user.age = age;
        }
        if let Some(city) = patch.city {
            user.city = city;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<Option<Uuid>> {
        self.online()?;
        let mut users = self.users.write().await;

        let Some(index) = users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };

        Ok(Some(users.remove(index).id))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(name: &str, email: &str) -> ValidNewUser {
        ValidNewUser {
            name: name.to_string(),
            email: email.to_string(),
            age: None,
            city: "Portmore".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let store = MemoryUserStore::new();
        let user = store.insert(valid("Ada", "ada@example.com")).await.unwrap();

        assert!(!user.id.is_nil());
        assert_eq!(user.created_at, user.updated_at);
        assert_eq!(store.find_all().await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert(valid("Ada", "ada@example.com")).await.unwrap();

        let err = store.insert(valid("Other", "ada@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref key, ref value } if key == "email" && value == "ada@example.com"));
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_to_existing_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert(valid("Ada", "ada@example.com")).await.unwrap();
        let grace = store.insert(valid("Grace", "grace@example.com")).await.unwrap();

        let patch = UserPatch {
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(grace.id, patch).await,
            Err(StoreError::Duplicate { .. })
        ));

        // Re-saving one's own email is not a conflict
        let patch = UserPatch {
            email: Some("grace@example.com".to_string()),
            ..Default::default()
        };
        assert!(store.update(grace.id, patch).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_applies_only_present_fields() {
        let store = MemoryUserStore::new();
        let mut input = valid("Ada", "ada@example.com");
        input.age = Some(36);
        let user = store.insert(input).await.unwrap();

        let updated = store
            .update(
                user.id,
                UserPatch {
                    city: Some("Kingston".to_string()),
                    age: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.city, "Kingston");
        assert_eq!(updated.age, None);
        assert!(updated.updated_at >= user.updated_at);
        assert_eq!(updated.created_at, user.created_at);
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let store = MemoryUserStore::new();
        assert!(store.update(Uuid::new_v4(), UserPatch::default()).await.unwrap().is_none());
        assert!(store.delete(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = MemoryUserStore::new();
        let user = store.insert(valid("Ada", "ada@example.com")).await.unwrap();

        assert_eq!(store.delete(user.id).await.unwrap(), Some(user.id));
        assert!(store.find_all().await.unwrap().is_empty());
        assert_eq!(store.delete(user.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = MemoryUserStore::new();
        let user = store.insert(valid("Ada", "ada@example.com")).await.unwrap();

        store.set_offline(true);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable)));
        assert!(matches!(store.find_all().await, Err(StoreError::Unavailable)));
        assert!(matches!(store.delete(user.id).await, Err(StoreError::Unavailable)));

        store.set_offline(false);
        assert!(store.ping().await.is_ok());
        assert_eq!(store.find_all().await.unwrap(), vec![user]);
    }
}
