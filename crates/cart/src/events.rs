//! Notifications describing what a cart mutation changed.
//!
//! Presentation code subscribes to these (fly-to-cart animations, badges).
//! Pricing and checkout never read them.

use chrono::{DateTime, Utc};
use model::{ProductInfo, SourcePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEventKind {
    Added,
    Updated,
    Removed,
    Cleared,
    /// Items of other restaurants were dropped.
    Cleaned,
}

/// One settled cart mutation.
///
/// For item-level events `before`/`after` are that item's quantities; for
/// `Cleared` and `Cleaned` they are the cart counts.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEvent {
    pub kind: CartEventKind,
    pub item_id: Option<String>,
    pub before: u32,
    pub after: u32,
    pub source: Option<SourcePosition>,
    pub product: Option<ProductInfo>,
    pub at: DateTime<Utc>,
}

impl CartEvent {
    pub(crate) fn item(
        kind: CartEventKind,
        item_id: &str,
        before: u32,
        after: u32,
        source: Option<SourcePosition>,
        product: Option<ProductInfo>,
    ) -> Self {
        Self {
            kind,
            item_id: Some(item_id.to_string()),
            before,
            after,
            source,
            product,
            at: Utc::now(),
        }
    }

    pub(crate) fn bulk(kind: CartEventKind, before: u32, after: u32) -> Self {
        Self {
            kind,
            item_id: None,
            before,
            after,
            source: None,
            product: None,
            at: Utc::now(),
        }
    }
}
