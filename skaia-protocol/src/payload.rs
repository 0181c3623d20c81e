//! # Store and Forum Payloads
//!
//! Records carried in the `payload` field of an [`Envelope`](crate::Envelope).
//! Snapshot payloads (`*:sync`) carry optional lists; update payloads
//! (`*:update`) are tagged by an `action` field.

use serde::{Deserialize, Serialize};

// ─── Store ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A line in a shopping cart. `id` is the product id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

impl From<&Product> for CartItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity: 1,
        }
    }
}

/// Payload of `store:sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart: Option<Vec<CartItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<StoreCategory>>,
}

/// Payload of `store:update`.
///
/// Serialized as e.g. `{"action": "add_to_cart", "product": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StoreAction {
    AddToCart { product: Product },
    RemoveFromCart { product_id: String },
}

// ─── Forum ───────────────────────────────────────────────────────

/// A forum thread. Only `title` and `content` are required on the wire;
/// threads drafted in the UI have no server-side counters yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumThread {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub view_count: u32,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub content: String,
}

/// Payload of `forum:sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<Vec<ForumThread>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<ForumPost>>,
}

/// Payload of `forum:update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ForumAction {
    CreateThread { thread: ForumThread },
    DeleteThread { thread_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_to_cart_uses_action_tag() {
        let action = StoreAction::AddToCart {
            product: Product {
                id: "1".into(),
                name: "Starter Rank".into(),
                description: "Begin your adventure".into(),
                price: 4.99,
                image_url: None,
                stock: 100,
            },
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["action"], "add_to_cart");
        assert_eq!(value["product"]["name"], "Starter Rank");
        assert!(value["product"].get("image_url").is_none());
    }

    #[test]
    fn create_thread_accepts_minimal_thread() {
        let action: ForumAction = serde_json::from_value(json!({
            "action": "create_thread",
            "thread": {"title": "Hi", "content": "Hello"}
        }))
        .unwrap();

        match action {
            ForumAction::CreateThread { thread } => {
                assert_eq!(thread.title, "Hi");
                assert_eq!(thread.content, "Hello");
                assert_eq!(thread.id, None);
                assert!(!thread.is_pinned);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn store_snapshot_fields_are_optional() {
        let payload: StorePayload = serde_json::from_value(json!({
            "cart": [{"id": "2", "name": "1000 Coins", "price": 9.99, "quantity": 2}]
        }))
        .unwrap();
        assert_eq!(payload.cart.as_ref().map(Vec::len), Some(1));
        assert!(payload.products.is_none());
        assert!(payload.categories.is_none());
    }

    #[test]
    fn cart_line_total_multiplies_quantity() {
        let item = CartItem {
            id: "2".into(),
            name: "1000 Coins".into(),
            price: 2.5,
            quantity: 4,
        };
        assert_eq!(item.line_total(), 10.0);
    }
}
