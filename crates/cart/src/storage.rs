//! Client-local persistence for the cart.

use std::path::PathBuf;

use async_trait::async_trait;
use model::CartItem;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Where the cart lives between sessions.
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Stored items, empty if nothing was saved yet.
    async fn load(&self) -> Result<Vec<CartItem>, StorageError>;

    /// Replaces the stored items with `items`.
    async fn save(&self, items: &[CartItem]) -> Result<(), StorageError>;
}

/// Stores the cart as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CartStorage for JsonFileStorage {
    async fn load(&self) -> Result<Vec<CartItem>, StorageError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, items: &[CartItem]) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(items)?;
        // The stored file is only ever replaced whole.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory storage, used when nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Vec<CartItem>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `items` already stored.
    pub fn with_items(items: Vec<CartItem>) -> Self {
        Self {
            inner: Mutex::new(items),
        }
    }

    /// Copy of what is currently stored.
    pub async fn stored(&self) -> Vec<CartItem> {
        self.inner.lock().await.clone()
    }
}

#[async_trait]
impl CartStorage for MemoryStorage {
    async fn load(&self) -> Result<Vec<CartItem>, StorageError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, items: &[CartItem]) -> Result<(), StorageError> {
        *self.inner.lock().await = items.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("cart-{name}-{}-{nanos}.json", std::process::id()))
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let storage = JsonFileStorage::new(temp_path("missing"));
        assert!(storage.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_keeps_items() {
        let path = temp_path("saved");
        let storage = JsonFileStorage::new(&path);
        let item = CartItem {
            id: "p1".into(),
            name: "Margherita".into(),
            price: Decimal::from(100),
            quantity: 2,
            image: None,
            description: None,
            is_veg: true,
            original_price: None,
            restaurant: "Pizza Place".into(),
            restaurant_id: "r1".into(),
        };
        storage.save(std::slice::from_ref(&item)).await.unwrap();

        let reopened = JsonFileStorage::new(&path);
        assert_eq!(reopened.load().await.unwrap(), vec![item]);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"{not json").unwrap();
        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load().await, Err(StorageError::Serde(_))));
        let _ = std::fs::remove_file(path);
    }
}
