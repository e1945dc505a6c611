//! Cart store: the single owner of the items a customer has selected.
//!
//! All reads return snapshots and all writes go through [`CartStore`]'s
//! operations, which keep two invariants:
//! - every item carries the same `restaurant_id`;
//! - quantities are at least 1 (going to zero removes the item).
//!
//! Each settled mutation is persisted through a [`CartStorage`] and announced
//! on a broadcast channel of [`CartEvent`]s.

mod events;
mod storage;

pub use events::{CartEvent, CartEventKind};
pub use storage::{CartStorage, JsonFileStorage, MemoryStorage, StorageError};

use std::sync::Arc;

use model::{CartItem, NewCartItem, ProductInfo, SourcePosition};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Errors returned by cart mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The item belongs to a different restaurant than the cart.
    #[error(
        "Your cart contains items from {cart_restaurant}. Clear the cart to add items from {item_restaurant}."
    )]
    RestaurantMismatch {
        cart_restaurant_id: String,
        cart_restaurant: String,
        item_restaurant_id: String,
        item_restaurant: String,
    },
    /// The caller did not fill in the item's restaurant.
    #[error("Item {0} has no restaurant id")]
    MissingRestaurant(String),
}

/// Thread-safe cart shared by every surface that shows or edits it.
pub struct CartStore {
    items: RwLock<Vec<CartItem>>,
    storage: Arc<dyn CartStorage>,
    events: broadcast::Sender<CartEvent>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore").finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an empty cart backed by `storage`, without reading it.
    pub fn new(storage: Arc<dyn CartStorage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            items: RwLock::new(Vec::new()),
            storage,
            events,
        }
    }

    /// Restore the cart saved in `storage`.
    ///
    /// Unreadable storage yields an empty cart and zero-quantity records are
    /// dropped. A stored cart spanning several restaurants is kept as is and
    /// reported; checkout repairs it with [`Self::clean_cart_for_restaurant`].
    pub async fn open(storage: Arc<dyn CartStorage>) -> Self {
        let stored = match storage.load().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to restore cart, starting empty: {e}");
                Vec::new()
            }
        };
        let total = stored.len();
        let items: Vec<CartItem> = stored.into_iter().filter(|i| i.quantity > 0).collect();
        if items.len() != total {
            warn!(dropped = total - items.len(), "Dropped stored cart items with zero quantity");
        }
        if let Some(first) = items.first() {
            if items.iter().any(|i| i.restaurant_id != first.restaurant_id) {
                warn!("Restored cart holds items from more than one restaurant");
            }
        }

        let store = Self::new(storage);
        *store.items.write().await = items;
        store
    }

    /// Subscribe to cart change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    /// Add one unit of `item`.
    ///
    /// An item already in the cart has its quantity incremented; otherwise it
    /// is appended with quantity 1.
    ///
    /// # Errors
    /// [`CartError::RestaurantMismatch`] if the cart holds items from another
    /// restaurant, [`CartError::MissingRestaurant`] if `item` has no
    /// restaurant id. The cart is unchanged in both cases.
    pub async fn add_to_cart(
        &self,
        item: NewCartItem,
        source: Option<SourcePosition>,
    ) -> Result<CartItem, CartError> {
        if item.restaurant_id.trim().is_empty() {
            return Err(CartError::MissingRestaurant(item.id));
        }

        let mut items = self.items.write().await;
        if let Some(first) = items.first() {
            if first.restaurant_id != item.restaurant_id {
                info!(
                    cart_restaurant_id = %first.restaurant_id,
                    item_restaurant_id = %item.restaurant_id,
                    "Rejected item from another restaurant"
                );
                return Err(CartError::RestaurantMismatch {
                    cart_restaurant_id: first.restaurant_id.clone(),
                    cart_restaurant: first.restaurant.clone(),
                    item_restaurant_id: item.restaurant_id,
                    item_restaurant: item.restaurant,
                });
            }
        }

        let (added, before) = match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => {
                let before = existing.quantity;
                existing.quantity = existing.quantity.saturating_add(1);
                (existing.clone(), before)
            }
            None => {
                let added = item.into_item(1);
                items.push(added.clone());
                (added, 0)
            }
        };
        debug!(item_id = %added.id, quantity = added.quantity, "Item added to cart");

        self.persist(&items).await;
        self.emit(CartEvent::item(
            CartEventKind::Added,
            &added.id,
            before,
            added.quantity,
            source,
            None,
        ));
        Ok(added)
    }

    /// Set the quantity of `item_id`. Zero or less removes the item.
    /// Unknown ids are ignored.
    pub async fn update_quantity(
        &self,
        item_id: &str,
        quantity: i64,
        source: Option<SourcePosition>,
        product: Option<ProductInfo>,
    ) {
        if quantity <= 0 {
            self.remove_from_cart(item_id, source, product).await;
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let mut items = self.items.write().await;
        let Some(existing) = items.iter_mut().find(|i| i.id == item_id) else {
            debug!(item_id, "Quantity update for item not in cart ignored");
            return;
        };
        let before = existing.quantity;
        if before == quantity {
            return;
        }
        existing.quantity = quantity;

        self.persist(&items).await;
        self.emit(CartEvent::item(
            CartEventKind::Updated,
            item_id,
            before,
            quantity,
            source,
            product,
        ));
    }

    /// Remove `item_id` whatever its quantity. Unknown ids are ignored.
    pub async fn remove_from_cart(
        &self,
        item_id: &str,
        source: Option<SourcePosition>,
        product: Option<ProductInfo>,
    ) {
        let mut items = self.items.write().await;
        let Some(pos) = items.iter().position(|i| i.id == item_id) else {
            return;
        };
        let removed = items.remove(pos);

        self.persist(&items).await;
        self.emit(CartEvent::item(
            CartEventKind::Removed,
            item_id,
            removed.quantity,
            0,
            source,
            product,
        ));
    }

    /// Empty the cart.
    pub async fn clear_cart(&self) {
        let mut items = self.items.write().await;
        let before = count(&items);
        items.clear();

        self.persist(&items).await;
        self.emit(CartEvent::bulk(CartEventKind::Cleared, before, 0));
        info!("Cart cleared");
    }

    /// Keep only the items of the given restaurant and return how many lines
    /// were dropped.
    ///
    /// Items match on `restaurant_id`; items without an id match on the
    /// restaurant name instead.
    pub async fn clean_cart_for_restaurant(
        &self,
        restaurant_id: &str,
        restaurant_name: &str,
    ) -> usize {
        self.clean_cart_where(|i| {
            if i.restaurant_id.trim().is_empty() {
                i.restaurant.trim() == restaurant_name.trim()
            } else {
                i.restaurant_id == restaurant_id
            }
        })
        .await
    }

    /// Keep only the items `keep` accepts and return how many lines were
    /// dropped. Used when one restaurant appears under several ids.
    pub async fn clean_cart_where<F>(&self, keep: F) -> usize
    where
        F: Fn(&CartItem) -> bool,
    {
        let mut items = self.items.write().await;
        let before_lines = items.len();
        let before = count(&items);
        items.retain(|i| keep(i));
        let dropped = before_lines - items.len();
        if dropped == 0 {
            return 0;
        }

        let kept = items.first().map(|i| i.restaurant.clone()).unwrap_or_default();
        warn!(%kept, dropped, "Removed cart items from other restaurants");
        self.persist(&items).await;
        self.emit(CartEvent::bulk(CartEventKind::Cleaned, before, count(&items)));
        dropped
    }

    /// Sum of all quantities.
    pub async fn cart_count(&self) -> u32 {
        count(&self.items.read().await)
    }

    /// The line for `item_id`, if present.
    pub async fn cart_item(&self, item_id: &str) -> Option<CartItem> {
        self.items
            .read()
            .await
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
    }

    /// Snapshot of the cart in insertion order.
    pub async fn items(&self) -> Vec<CartItem> {
        self.items.read().await.clone()
    }

    /// True when the cart holds no items.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Sum of line totals at current unit prices.
    pub async fn subtotal(&self) -> Decimal {
        model::subtotal(&self.items.read().await)
    }

    /// Restaurant the cart is scoped to, `None` while empty.
    pub async fn restaurant_id(&self) -> Option<String> {
        self.items
            .read()
            .await
            .first()
            .map(|i| i.restaurant_id.clone())
    }

    async fn persist(&self, items: &[CartItem]) {
        if let Err(e) = self.storage.save(items).await {
            warn!("Failed to persist cart: {e}");
        }
    }

    fn emit(&self, event: CartEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn count(items: &[CartItem]) -> u32 {
    items.iter().fold(0u32, |acc, i| acc.saturating_add(i.quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str, restaurant_id: &str, restaurant: &str, price: i64) -> NewCartItem {
        NewCartItem {
            id: id.into(),
            name: format!("Item {id}"),
            price: Decimal::from(price),
            image: None,
            description: None,
            is_veg: false,
            original_price: None,
            restaurant: restaurant.into(),
            restaurant_id: restaurant_id.into(),
        }
    }

    fn store() -> CartStore {
        CartStore::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_add_to_empty_cart() {
        let cart = store();
        let added = cart
            .add_to_cart(draft("p1", "r1", "Pizza Place", 100), None)
            .await
            .unwrap();
        assert_eq!(added.quantity, 1);
        assert_eq!(cart.items().await.len(), 1);
        assert_eq!(cart.cart_count().await, 1);
    }

    #[tokio::test]
    async fn test_add_existing_item_increments() {
        let cart = store();
        cart.add_to_cart(draft("p1", "r1", "Pizza Place", 100), None).await.unwrap();
        cart.add_to_cart(draft("p2", "r1", "Pizza Place", 50), None).await.unwrap();
        let again = cart
            .add_to_cart(draft("p1", "r1", "Pizza Place", 100), None)
            .await
            .unwrap();
        assert_eq!(again.quantity, 2);
        assert_eq!(cart.items().await.len(), 2);
        assert_eq!(cart.cart_count().await, 3);
        assert_eq!(cart.subtotal().await, Decimal::from(250));
    }

    #[tokio::test]
    async fn test_second_restaurant_is_rejected() {
        let cart = store();
        cart.add_to_cart(draft("p1", "r1", "Pizza Place", 100), None).await.unwrap();

        let err = cart
            .add_to_cart(draft("p2", "r2", "Burger Hub", 80), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::RestaurantMismatch { ref cart_restaurant_id, .. } if cart_restaurant_id == "r1"));
        let items = cart.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "p1");
    }

    #[tokio::test]
    async fn test_any_add_sequence_keeps_one_restaurant() {
        let cart = store();
        let sequence = [
            ("a", "r1"),
            ("b", "r2"),
            ("c", "r1"),
            ("d", "r3"),
            ("a", "r1"),
            ("e", "r2"),
        ];
        for (id, restaurant) in sequence {
            let _ = cart.add_to_cart(draft(id, restaurant, restaurant, 10), None).await;
            let items = cart.items().await;
            assert!(items.iter().all(|i| i.restaurant_id == items[0].restaurant_id));
        }
        assert_eq!(cart.restaurant_id().await.as_deref(), Some("r1"));
        assert_eq!(cart.cart_count().await, 3);
    }

    #[tokio::test]
    async fn test_missing_restaurant_is_rejected() {
        let cart = store();
        let err = cart.add_to_cart(draft("p1", " ", "Pizza Place", 100), None).await;
        assert_eq!(err, Err(CartError::MissingRestaurant("p1".into())));
        assert!(cart.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_quantity_jumps_and_removes() {
        let cart = store();
        cart.add_to_cart(draft("p1", "r1", "Pizza Place", 100), None).await.unwrap();
        cart.add_to_cart(draft("p2", "r1", "Pizza Place", 100), None).await.unwrap();

        cart.update_quantity("p1", 7, None, None).await;
        assert_eq!(cart.cart_item("p1").await.unwrap().quantity, 7);

        for n in [0, -3] {
            cart.update_quantity("p2", n, None, None).await;
            assert!(cart.cart_item("p2").await.is_none());
        }
        cart.update_quantity("p1", 0, None, None).await;
        assert!(cart.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_item_is_noop() {
        let cart = store();
        cart.add_to_cart(draft("p1", "r1", "Pizza Place", 100), None).await.unwrap();
        cart.update_quantity("missing", 4, None, None).await;
        cart.remove_from_cart("missing", None, None).await;
        assert_eq!(cart.cart_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cart = store();
        cart.add_to_cart(draft("p1", "r1", "Pizza Place", 100), None).await.unwrap();
        cart.add_to_cart(draft("p2", "r1", "Pizza Place", 100), None).await.unwrap();

        cart.remove_from_cart("p1", None, None).await;
        let once = cart.items().await;
        cart.remove_from_cart("p1", None, None).await;
        assert_eq!(cart.items().await, once);
    }

    #[tokio::test]
    async fn test_clean_keeps_matching_restaurant() {
        let storage = Arc::new(MemoryStorage::with_items(vec![
            draft("p1", "r1", "Pizza Place", 100).into_item(1),
            draft("p2", "r2", "Burger Hub", 80).into_item(2),
        ]));
        let cart = CartStore::open(storage.clone()).await;
        let mut rx = cart.subscribe();

        let dropped = cart.clean_cart_for_restaurant("r2", "Burger Hub").await;
        assert_eq!(dropped, 1);
        let items = cart.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].restaurant_id, "r2");
        assert_eq!(storage.stored().await, items);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, CartEventKind::Cleaned);
        assert_eq!((event.before, event.after), (3, 2));

        assert_eq!(cart.clean_cart_for_restaurant("r2", "Burger Hub").await, 0);
    }

    #[tokio::test]
    async fn test_clean_matches_name_when_id_missing() {
        let storage = Arc::new(MemoryStorage::with_items(vec![
            draft("p1", "", "Pizza Place", 100).into_item(1),
            draft("p2", "r2", "Burger Hub", 80).into_item(1),
        ]));
        let cart = CartStore::open(storage).await;
        assert_eq!(cart.clean_cart_for_restaurant("r1", "Pizza Place").await, 1);
        assert_eq!(cart.items().await[0].id, "p1");
    }

    #[tokio::test]
    async fn test_clean_where_keeps_every_accepted_id() {
        let storage = Arc::new(MemoryStorage::with_items(vec![
            draft("p1", "r1", "Pizza Place", 100).into_item(1),
            draft("p2", "64af01", "Pizza Place", 60).into_item(1),
            draft("b1", "r2", "Burger Hub", 80).into_item(1),
        ]));
        let cart = CartStore::open(storage.clone()).await;

        let dropped = cart.clean_cart_where(|i| i.restaurant == "Pizza Place").await;
        assert_eq!(dropped, 1);
        let ids: Vec<String> = cart.items().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(storage.stored().await.len(), 2);
        assert_eq!(cart.clean_cart_where(|_| true).await, 0);
    }

    #[tokio::test]
    async fn test_open_restores_items() {
        let mut zero = draft("p0", "r1", "Pizza Place", 10).into_item(1);
        zero.quantity = 0;
        let storage = Arc::new(MemoryStorage::with_items(vec![
            zero,
            draft("p1", "r1", "Pizza Place", 100).into_item(2),
            draft("p3", "r1", "Pizza Place", 60).into_item(1),
        ]));

        let cart = CartStore::open(storage).await;
        let ids: Vec<String> = cart.items().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
        assert_eq!(cart.cart_count().await, 3);
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = CartStore::new(storage.clone());
        cart.add_to_cart(draft("p1", "r1", "Pizza Place", 100), None).await.unwrap();
        cart.update_quantity("p1", 3, None, None).await;
        assert_eq!(storage.stored().await[0].quantity, 3);

        cart.clear_cart().await;
        assert!(storage.stored().await.is_empty());
    }

    #[tokio::test]
    async fn test_events_describe_changes() {
        let cart = store();
        let mut rx = cart.subscribe();
        let anchor = SourcePosition { x: 10.0, y: 20.0 };

        cart.add_to_cart(draft("p1", "r1", "Pizza Place", 100), Some(anchor))
            .await
            .unwrap();
        cart.update_quantity("p1", 3, None, None).await;
        cart.remove_from_cart(
            "p1",
            None,
            Some(ProductInfo {
                name: "Item p1".into(),
                image: None,
            }),
        )
        .await;

        let added = rx.recv().await.unwrap();
        assert_eq!(added.kind, CartEventKind::Added);
        assert_eq!((added.before, added.after), (0, 1));
        assert_eq!(added.source, Some(anchor));

        let updated = rx.recv().await.unwrap();
        assert_eq!(updated.kind, CartEventKind::Updated);
        assert_eq!((updated.before, updated.after), (1, 3));

        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.kind, CartEventKind::Removed);
        assert_eq!(removed.after, 0);
        assert_eq!(removed.product.unwrap().name, "Item p1");
    }
}
