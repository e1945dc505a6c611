//! Works out which restaurant an order is for.
//!
//! The backend's restaurant record wins over whatever the cart items carry;
//! the items are only consulted when the record is missing or has no id.

use model::{CartItem, RestaurantRecord};

/// Where the resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    ServerRecord,
    CartItem,
    /// Several ids in the cart; picked the one whose name matches the record.
    NameMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestaurantIdentity {
    pub id: String,
    pub name: String,
    pub source: IdentitySource,
}

impl RestaurantIdentity {
    /// Whether `item` belongs to this restaurant, by id or by normalised name.
    pub fn owns(&self, item: &CartItem) -> bool {
        item.restaurant_id == self.id || same_name(&item.restaurant, &self.name)
    }
}

/// Lowercase alphanumerics only, so "Pizza-Place " and "pizza place" compare equal.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn same_name(a: &str, b: &str) -> bool {
    let a = normalize_name(a);
    !a.is_empty() && a == normalize_name(b)
}

/// Resolve the order's restaurant, `None` when no id can be found anywhere.
pub fn resolve(record: Option<&RestaurantRecord>, items: &[CartItem]) -> Option<RestaurantIdentity> {
    let record = record.filter(|r| !r.id.trim().is_empty() || !r.name.trim().is_empty());

    if let Some(r) = record.filter(|r| !r.id.trim().is_empty()) {
        let name = if r.name.trim().is_empty() {
            items
                .iter()
                .find(|i| i.restaurant_id == r.id)
                .map(|i| i.restaurant.clone())
                .unwrap_or_default()
        } else {
            r.name.clone()
        };
        return Some(RestaurantIdentity {
            id: r.id.clone(),
            name,
            source: IdentitySource::ServerRecord,
        });
    }

    let with_id: Vec<&CartItem> = items
        .iter()
        .filter(|i| !i.restaurant_id.trim().is_empty())
        .collect();
    let first = with_id.first()?;

    let distinct_ids = with_id
        .iter()
        .any(|i| i.restaurant_id != first.restaurant_id);
    if distinct_ids {
        if let Some(matched) = record.and_then(|r| with_id.iter().find(|i| same_name(&i.restaurant, &r.name))) {
            return Some(RestaurantIdentity {
                id: matched.restaurant_id.clone(),
                name: matched.restaurant.clone(),
                source: IdentitySource::NameMatch,
            });
        }
    }

    Some(RestaurantIdentity {
        id: first.restaurant_id.clone(),
        name: first.restaurant.clone(),
        source: IdentitySource::CartItem,
    })
}

/// Distinct restaurant names in the cart, compared normalised.
pub fn distinct_names(items: &[CartItem]) -> usize {
    let mut names: Vec<String> = items
        .iter()
        .map(|i| normalize_name(&i.restaurant))
        .filter(|n| !n.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names.len()
}

/// Distinct raw restaurant ids in the cart.
pub fn distinct_ids(items: &[CartItem]) -> usize {
    let mut ids: Vec<&str> = items
        .iter()
        .map(|i| i.restaurant_id.as_str())
        .filter(|id| !id.trim().is_empty())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}
