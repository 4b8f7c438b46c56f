//! Order Store consumed by the lifecycle engine.
//!
//! [`OrderStore`] is the narrow persistence interface the engine depends on.
//! Every method reports a missing order as [`StorageError::NotFound`],
//! distinct from backend failures, and never retries on its own.
//! [`StorageService`] implements it on top of any key/value backend.

use crate::{StorageError, StorageService};
use async_trait::async_trait;
use atelier_types::{Order, OrderStatus, StorageKey};
use chrono::Utc;

/// Partial update applied to a stored order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
	/// New status, if it changes.
	pub status: Option<OrderStatus>,
}

impl OrderUpdate {
	/// Update that only changes the status.
	pub fn status(status: OrderStatus) -> Self {
		Self {
			status: Some(status),
		}
	}
}

/// Persistence interface for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Persists a new order.
	async fn insert(&self, order: &Order) -> Result<(), StorageError>;

	/// Loads one order.
	async fn get(&self, id: &str) -> Result<Order, StorageError>;

	/// Applies `update` to a stored order, refreshing `updated_at`, and
	/// returns the stored result.
	async fn update(&self, id: &str, update: OrderUpdate) -> Result<Order, StorageError>;

	/// Removes an order. Fails with `NotFound` when it does not exist.
	async fn delete(&self, id: &str) -> Result<(), StorageError>;

	/// Returns every order, newest first.
	async fn all(&self) -> Result<Vec<Order>, StorageError>;

	/// Returns orders whose client name contains `query`, ignoring case,
	/// newest first.
	async fn find_by_client_name(&self, query: &str) -> Result<Vec<Order>, StorageError>;
}

/// Sorts orders newest first, breaking ties by id so the order is stable.
pub fn sort_newest_first(orders: &mut [Order]) {
	orders.sort_by(|a, b| {
		b.created_at
			.cmp(&a.created_at)
			.then_with(|| a.id.cmp(&b.id))
	});
}

/// Case-insensitive literal substring match on the client name.
pub fn client_name_matches(order: &Order, query: &str) -> bool {
	order
		.client_name
		.to_lowercase()
		.contains(&query.to_lowercase())
}

#[async_trait]
impl OrderStore for StorageService {
	async fn insert(&self, order: &Order) -> Result<(), StorageError> {
		self.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
	}

	async fn get(&self, id: &str) -> Result<Order, StorageError> {
		self.retrieve(StorageKey::Orders.as_str(), id).await
	}

	async fn update(&self, id: &str, update: OrderUpdate) -> Result<Order, StorageError> {
		let mut order: Order = self.retrieve(StorageKey::Orders.as_str(), id).await?;

		if let Some(status) = update.status {
			order.status = status;
		}
		order.updated_at = Utc::now();

		StorageService::update(self, StorageKey::Orders.as_str(), id, &order).await?;
		Ok(order)
	}

	async fn delete(&self, id: &str) -> Result<(), StorageError> {
		if !self.exists(StorageKey::Orders.as_str(), id).await? {
			return Err(StorageError::NotFound);
		}
		self.remove(StorageKey::Orders.as_str(), id).await
	}

	async fn all(&self) -> Result<Vec<Order>, StorageError> {
		let mut orders: Vec<Order> = self.retrieve_all(StorageKey::Orders.as_str()).await?;
		sort_newest_first(&mut orders);
		Ok(orders)
	}

	async fn find_by_client_name(&self, query: &str) -> Result<Vec<Order>, StorageError> {
		let mut orders = OrderStore::all(self).await?;
		orders.retain(|order| client_name_matches(order, query));
		Ok(orders)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::{file::FileStorage, memory::MemoryStorage};
	use atelier_types::NewOrder;
	use chrono::Duration;
	use rust_decimal::Decimal;

	fn order(name: &str) -> Order {
		Order::from_new(NewOrder {
			client_name: name.to_string(),
			phone: "0600000000".to_string(),
			details: "vase".to_string(),
			price: Decimal::new(20, 0),
		})
	}

	fn memory_store() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_insert_get_update() {
		let store = memory_store();
		let created = order("Alice");
		store.insert(&created).await.unwrap();

		assert_eq!(store.get(&created.id).await.unwrap(), created);

		let updated = OrderStore::update(&store, &created.id, OrderUpdate::status(OrderStatus::Ready))
			.await
			.unwrap();
		assert_eq!(updated.status, OrderStatus::Ready);
		assert_eq!(updated.created_at, created.created_at);
		assert!(updated.updated_at >= created.updated_at);
		assert_eq!(store.get(&created.id).await.unwrap(), updated);
	}

	#[tokio::test]
	async fn test_missing_order_is_not_found() {
		let store = memory_store();

		assert!(matches!(store.get("nope").await, Err(StorageError::NotFound)));
		assert!(matches!(
			OrderStore::update(&store, "nope", OrderUpdate::status(OrderStatus::Ready)).await,
			Err(StorageError::NotFound)
		));
		assert!(matches!(
			OrderStore::delete(&store, "nope").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_delete_removes_order() {
		let store = memory_store();
		let created = order("Alice");
		store.insert(&created).await.unwrap();

		OrderStore::delete(&store, &created.id).await.unwrap();
		assert!(OrderStore::all(&store).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_all_is_newest_first() {
		let store = memory_store();
		let mut older = order("Older");
		older.created_at -= Duration::seconds(30);
		let newer = order("Newer");

		store.insert(&older).await.unwrap();
		store.insert(&newer).await.unwrap();

		let names: Vec<_> = OrderStore::all(&store)
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.client_name)
			.collect();
		assert_eq!(names, vec!["Newer", "Older"]);
	}

	#[tokio::test]
	async fn test_find_by_client_name_ignores_case() {
		let store = memory_store();
		for name in ["Alice Martin", "Bob Alice", "Chloé"] {
			store.insert(&order(name)).await.unwrap();
		}

		let mut names: Vec<_> = store
			.find_by_client_name("alice")
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.client_name)
			.collect();
		names.sort();
		assert_eq!(names, vec!["Alice Martin", "Bob Alice"]);

		let accented = store.find_by_client_name("CHLOÉ").await.unwrap();
		assert_eq!(accented.len(), 1);

		assert!(store.find_by_client_name("zoe").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_file_backed_store() {
		let temp_dir = tempfile::TempDir::new().unwrap();
		let store = StorageService::new(Box::new(FileStorage::new(temp_dir.path().to_path_buf())));

		let created = order("Alice");
		store.insert(&created).await.unwrap();
		OrderStore::update(&store, &created.id, OrderUpdate::status(OrderStatus::Ready))
			.await
			.unwrap();

		let all = OrderStore::all(&store).await.unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].status, OrderStatus::Ready);
		assert_eq!(all[0].price, Decimal::new(20, 0));
	}
}
