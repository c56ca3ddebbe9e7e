//! Shared application state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reliability_engine::Engine;

use crate::store::PgStore;

pub struct AppState {
  pub engine: Engine,
  pub store: PgStore,
  locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppState {
  pub fn new(engine: Engine, store: PgStore) -> Self {
    Self {
      engine,
      store,
      locks: Mutex::new(HashMap::new()),
    }
  }

  /// One in-flight ingest per product. Held across awaits, hence tokio's mutex.
  pub fn product_lock(&self, product_id: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    locks
      .entry(product_id.to_string())
      .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
      .clone()
  }

  /// Forget the product's lock once only the table and `lock` refer to it.
  pub fn release_lock(&self, product_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
    let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let idle = locks
      .get(product_id)
      .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
    if idle {
      locks.remove(product_id);
    }
  }

  #[cfg(test)]
  fn tracked_locks(&self) -> usize {
    self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use sqlx_postgres::PgPoolOptions;

  fn state() -> AppState {
    // Lazy pool: never connects unless a query runs.
    let pool = PgPoolOptions::new()
      .connect_lazy("postgres://localhost/reliability_test")
      .unwrap();
    AppState::new(Engine::with_defaults(), PgStore::new(pool))
  }

  #[tokio::test]
  async fn same_product_shares_a_lock() {
    let state = state();
    let a = state.product_lock("mon-1");
    let b = state.product_lock("mon-1");
    let c = state.product_lock("mon-2");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));

    let _held = a.lock().await;
    assert!(b.try_lock().is_err());
    assert!(c.try_lock().is_ok());
  }

  #[tokio::test]
  async fn released_locks_leave_the_table() {
    let state = state();
    for i in 0..100 {
      let id = format!("mon-{i}");
      let lock = state.product_lock(&id);
      drop(lock.lock().await);
      state.release_lock(&id, lock);
    }
    assert_eq!(state.tracked_locks(), 0);
  }

  #[tokio::test]
  async fn lock_survives_while_a_waiter_holds_it() {
    let state = state();
    let first = state.product_lock("mon-1");
    let waiter = state.product_lock("mon-1");

    state.release_lock("mon-1", first);
    assert_eq!(state.tracked_locks(), 1);
    assert!(Arc::ptr_eq(&waiter, &state.product_lock("mon-1")));

    state.release_lock("mon-1", waiter);
    assert_eq!(state.tracked_locks(), 0);
  }
}
