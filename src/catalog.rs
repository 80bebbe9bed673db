use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::AppError;

/// External catalog collaborator. Rooms store only song ids and order; song
/// content, names and list composition live on the catalog side.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Whether the catalog knows this song
    async fn song_exists(&self, song_id: Uuid) -> Result<bool, AppError>;

    /// Song ids of a curated list, in the list's order; None if the list
    /// does not exist
    async fn list_songs(&self, list_id: Uuid) -> Result<Option<Vec<Uuid>>, AppError>;
}

/// In-memory catalog for development and tests
#[derive(Default)]
pub struct InMemoryCatalog {
    songs: RwLock<HashSet<Uuid>>,
    lists: RwLock<HashMap<Uuid, Vec<Uuid>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_song(&self, song_id: Uuid) {
        self.songs.write().await.insert(song_id);
    }

    pub async fn register_list(&self, list_id: Uuid, songs: Vec<Uuid>) {
        {
            let mut known = self.songs.write().await;
            known.extend(songs.iter().copied());
        }
        self.lists.write().await.insert(list_id, songs);
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn song_exists(&self, song_id: Uuid) -> Result<bool, AppError> {
        Ok(self.songs.read().await.contains(&song_id))
    }

    async fn list_songs(&self, list_id: Uuid) -> Result<Option<Vec<Uuid>>, AppError> {
        Ok(self.lists.read().await.get(&list_id).cloned())
    }
}
