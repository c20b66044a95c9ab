//! Favorite contacts
//!
//! Nicknamed phone numbers persisted under `favorites_contacts`.
//! Unreadable persisted state degrades to the empty list rather than
//! erroring.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{keys, KeyValueStore};
use crate::{validate, Result};

/// A saved contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub phone: String,
    /// Optional nickname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Shared handle over the persisted favorites list
#[derive(Clone)]
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
}

impl FavoritesStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Favorite>> {
        match self.store.get(keys::FAVORITES).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(favorites) => Ok(favorites),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable favorites");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    /// Add a contact; duplicates by phone are ignored
    pub async fn add(&self, favorite: Favorite) -> Result<()> {
        validate::phone(&favorite.phone)?;
        let mut favorites = self.list().await?;
        if favorites.iter().any(|f| f.phone == favorite.phone) {
            return Ok(());
        }
        favorites.push(favorite);
        self.persist(&favorites).await
    }

    pub async fn remove(&self, phone: &str) -> Result<()> {
        let mut favorites = self.list().await?;
        favorites.retain(|f| f.phone != phone);
        self.persist(&favorites).await
    }

    pub async fn is_favorite(&self, phone: &str) -> Result<bool> {
        Ok(self.list().await?.iter().any(|f| f.phone == phone))
    }

    async fn persist(&self, favorites: &[Favorite]) -> Result<()> {
        self.store
            .put(keys::FAVORITES, &serde_json::to_string(favorites)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn favorite(phone: &str) -> Favorite {
        Favorite {
            phone: phone.to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn test_add_remove_list() {
        let favorites = FavoritesStore::new(Arc::new(MemoryStore::new()));
        assert!(favorites.list().await.unwrap().is_empty());

        favorites
            .add(Favorite {
                phone: "+15551234567".to_string(),
                name: Some("Alice".to_string()),
            })
            .await
            .unwrap();
        favorites.add(favorite("+15559876543")).await.unwrap();

        assert!(favorites.is_favorite("+15551234567").await.unwrap());
        assert_eq!(favorites.list().await.unwrap().len(), 2);

        favorites.remove("+15551234567").await.unwrap();
        assert!(!favorites.is_favorite("+15551234567").await.unwrap());
        assert_eq!(favorites.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_ignored() {
        let favorites = FavoritesStore::new(Arc::new(MemoryStore::new()));
        favorites.add(favorite("+15551234567")).await.unwrap();
        favorites
            .add(Favorite {
                phone: "+15551234567".to_string(),
                name: Some("renamed".to_string()),
            })
            .await
            .unwrap();

        let list = favorites.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].name.is_none()); // first write wins
    }

    #[tokio::test]
    async fn test_corrupt_state_degrades_to_empty() {
        let store = Arc::new(MemoryStore::new());
        store.put(keys::FAVORITES, "{not json").await.unwrap();

        let favorites = FavoritesStore::new(store);
        assert!(favorites.list().await.unwrap().is_empty());
    }
}
