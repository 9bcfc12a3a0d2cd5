/// Persistence client
///
/// [`DbClient`] owns the connection to the store and everything that sits
/// between a handler and raw storage:
///
/// - the connection state, published through a `tokio::sync::watch` channel
///   so the availability gate and health check read it without locking
/// - the connect-retry loop run once at startup
/// - health tracking after that: [`DbClient::monitor`] pings the store on
///   an interval, and any call that finds the store unreachable marks the
///   client disconnected until a ping succeeds again
/// - id parsing and field validation before any write
///
/// # Retry Policy
///
/// Attempts are spaced by a fixed interval (5 seconds unless configured) with
/// no backoff growth. There is no cap unless [`RetryPolicy::max_attempts`]
/// is set. Once a store is attached it stays attached; the pool reconnects
/// on its own, so recovery after an outage only has to flip the state back.
///
/// # Example
///
/// ```no_run
/// use roster_shared::db::client::{DbClient, RetryPolicy};
/// use roster_shared::db::pool::DatabaseConfig;
/// use roster_shared::db::postgres::PgUserStore;
/// use roster_shared::db::store::UserStore;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let config = DatabaseConfig {
///     url: "postgresql://localhost/roster".to_string(),
///     ..Default::default()
/// };
///
/// let client = Arc::new(DbClient::new());
/// let connecting = client.clone();
/// tokio::spawn(async move {
///     connecting
///         .connect_with_retry(
///             move || {
///                 let config = config.clone();
///                 async move {
///                     let store = PgUserStore::connect(config).await?;
///                     Ok(Arc::new(store) as Arc<dyn UserStore>)
///                 }
///             },
///             RetryPolicy::default(),
///         )
///         .await
/// });
/// # }
/// ```

use crate::db::store::{StoreError, StoreResult, UserStore};
use crate::models::user::{validate_changes, validate_new, NewUser, User, UserChanges};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Connection state of the persistence client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Startup; the first connection has not succeeded yet
    Connecting,

    /// A store is attached and serving requests
    Connected,

    /// The store is unreachable, retries were exhausted, or the client was
    /// shut down
    Disconnected,
}

/// Fixed-interval retry settings for the startup connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between failed attempts
    pub interval: Duration,

    /// Give up after this many attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

/// Persistence client shared by every request handler
pub struct DbClient {
    store: OnceCell<Arc<dyn UserStore>>,
    state: watch::Sender<ConnectionState>,
    closed: AtomicBool,
}

impl Default for DbClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DbClient {
    /// Creates a client in the [`ConnectionState::Connecting`] state
    pub fn new() -> Self {
        Self {
            store: OnceCell::new(),
            state: watch::Sender::new(ConnectionState::Connecting),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a client already attached to `store`
    pub fn with_store(store: Arc<dyn UserStore>) -> Self {
        let client = Self::new();
        client.attach(store);
        client
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether requests can be served
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watches state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Attaches a connected store
    ///
    /// Returns `false` if a store was attached before, in which case the
    /// first one stays, or if the client was already disconnected.
    pub fn attach(&self, store: Arc<dyn UserStore>) -> bool {
        let name = store.name().to_string();
        if self.closed.load(Ordering::SeqCst) {
            warn!("Client closed, ignoring {}", name);
            return false;
        }
        if self.store.set(store).is_err() {
            warn!("Store already attached, ignoring {}", name);
            return false;
        }
        self.set_state(ConnectionState::Connected);
        true
    }

    /// Connects with `connect`, retrying on failure per `policy`
    ///
    /// Returns the final state: [`ConnectionState::Connected`] on success, or
    /// [`ConnectionState::Disconnected`] once `max_attempts` is exhausted.
    pub async fn connect_with_retry<F, Fut>(
        &self,
        mut connect: F,
        policy: RetryPolicy,
    ) -> ConnectionState
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<Arc<dyn UserStore>>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(attempt, "Connecting to database");

            match connect().await {
                Ok(store) => {
                    info!(attempt, store = store.name(), "Connected to database");
                    self.attach(store);
                    return self.state();
                }
                Err(err) => {
                    if policy.max_attempts.is_some_and(|max| attempt >= max) {
                        error!(error = %err, attempt, "Database connection failed, giving up");
                        self.set_state(ConnectionState::Disconnected);
                        return ConnectionState::Disconnected;
                    }

                    warn!(
                        error = %err,
                        attempt,
                        retry_in_secs = policy.interval.as_secs_f64(),
                        "Database connection failed, retrying"
                    );
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }

    /// Pings the attached store and updates the state from the result
    ///
    /// Returns the state afterwards. Without a store, or after
    /// [`DbClient::disconnect`], the state is returned unchanged.
    pub async fn check(&self) -> ConnectionState {
        let Some(store) = self.store.get() else {
            return self.state();
        };
        if self.closed.load(Ordering::SeqCst) {
            return self.state();
        }

        match store.ping().await {
            Ok(()) => {
                if self.set_state(ConnectionState::Connected) {
                    info!("Database connection restored");
                }
            }
            Err(err) => {
                if self.set_state(ConnectionState::Disconnected) {
                    warn!(error = %err, "Database connection lost");
                }
            }
        }

        self.state()
    }

    /// Runs [`DbClient::check`] every `interval` until the client is closed
    pub async fn monitor(&self, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            if self.closed.load(Ordering::SeqCst) {
                debug!("Client closed, stopping database monitor");
                return;
            }
            self.check().await;
        }
    }

    /// Closes the store and marks the client disconnected for good
    pub async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Disconnected);
        if let Some(store) = self.store.get() {
            store.close().await;
        }
    }

    /// Moves to `next` unless closed; returns whether the state changed
    fn set_state(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if self.closed.load(Ordering::SeqCst) || *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    fn store(&self) -> StoreResult<&Arc<dyn UserStore>> {
        match self.store.get() {
            Some(store) if self.is_connected() => Ok(store),
            _ => Err(StoreError::Unavailable),
        }
    }

    /// Marks the client disconnected when the store reports it is unreachable
    fn observe<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if matches!(result, Err(StoreError::Unavailable))
            && self.set_state(ConnectionState::Disconnected)
        {
            warn!("Database connection lost");
        }
        result
    }

    /// Returns every record in store order
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when not connected, or a store failure.
    pub async fn find_all(&self) -> StoreResult<Vec<User>> {
        let store = self.store()?;
        self.observe(store.find_all().await)
    }

    /// Validates and persists a new record
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`] listing every bad field, or
    /// [`StoreError::Duplicate`] if the email is taken.
    pub async fn create(&self, candidate: NewUser) -> StoreResult<User> {
        let store = self.store()?;
        let user = validate_new(candidate)?;
        self.observe(store.insert(user).await)
    }

    /// Validates the fields present in `changes` and applies them to `id`
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidId`] for a malformed id, [`StoreError::NotFound`]
    /// if no record matches, [`StoreError::Validation`] or
    /// [`StoreError::Duplicate`] for bad fields.
    pub async fn update_by_id(&self, id: &str, changes: UserChanges) -> StoreResult<User> {
        let store = self.store()?;
        let id = parse_id(id)?;
        let patch = validate_changes(changes)?;
        self.observe(store.update(id, patch).await)?
            .ok_or(StoreError::NotFound)
    }

    /// Removes the record `id` and returns its id
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidId`] for a malformed id, [`StoreError::NotFound`]
    /// if no record matches.
    pub async fn delete_by_id(&self, id: &str) -> StoreResult<Uuid> {
        let store = self.store()?;
        let id = parse_id(id)?;
        self.observe(store.delete(id).await)?
            .ok_or(StoreError::NotFound)
    }
}

fn parse_id(id: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryUserStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn connected() -> DbClient {
        DbClient::with_store(Arc::new(MemoryUserStore::new()))
    }

    fn ada() -> NewUser {
        NewUser {
            name: Some("Ada".to_string()),
            email: Some("Ada@Example.com".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_client_is_unavailable() {
        let client = DbClient::new();
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert!(!client.is_connected());
        assert!(matches!(client.find_all().await, Err(StoreError::Unavailable)));
        assert!(matches!(client.create(ada()).await, Err(StoreError::Unavailable)));
    }

    #[tokio::test]
    async fn test_attach_only_once() {
        let client = connected();
        assert!(client.is_connected());
        assert!(!client.attach(Arc::new(MemoryUserStore::new())));
    }

    #[tokio::test]
    async fn test_create_validates_before_storing() {
        let client = connected();
        let err = client
            .create(NewUser {
                name: Some("A".to_string()),
                ..ada()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
        assert!(client.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_ignores_case() {
        let client = connected();
        client.create(ada()).await.unwrap();

        let err = client
            .create(NewUser {
                email: Some("ADA@example.COM".to_string()),
                ..ada()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(client.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_and_missing_ids() {
        let client = connected();

        assert!(matches!(
            client.update_by_id("not-a-uuid", UserChanges::default()).await,
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            client.delete_by_id("42").await,
            Err(StoreError::InvalidId(_))
        ));

        let absent = Uuid::new_v4().to_string();
        assert!(matches!(
            client.update_by_id(&absent, UserChanges::default()).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(client.delete_by_id(&absent).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_and_delete_roundtrip() {
        let client = connected();
        let user = client.create(ada()).await.unwrap();
        let id = user.id.to_string();

        let updated = client
            .update_by_id(
                &id,
                UserChanges {
                    name: Some("Ada King".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ada King");
        assert_eq!(updated.email, "ada@example.com");

        assert_eq!(client.delete_by_id(&id).await.unwrap(), user.id);
        assert!(matches!(client.delete_by_id(&id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_at_fixed_interval() {
        let client = DbClient::new();
        let attempts = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let state = client
            .connect_with_retry(
                || {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if attempt < 3 {
                            Err(StoreError::Database("connection refused".to_string()))
                        } else {
                            Ok(Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>)
                        }
                    }
                },
                RetryPolicy::default(),
            )
            .await;

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // two failures, two fixed 5s waits
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(15));
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_gives_up_at_cap() {
        let client = DbClient::new();
        let attempts = AtomicU32::new(0);

        let state = client
            .connect_with_retry(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(StoreError::Database("connection refused".to_string())) }
                },
                RetryPolicy {
                    interval: Duration::from_secs(1),
                    max_attempts: Some(4),
                },
            )
            .await;

        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_blocks_requests() {
        let client = connected();
        let mut states = client.subscribe();

        client.disconnect().await;

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
        assert!(matches!(client.find_all().await, Err(StoreError::Unavailable)));
    }

    #[tokio::test]
    async fn test_unreachable_store_closes_gate_until_ping_succeeds() {
        let store = Arc::new(MemoryUserStore::new());
        let client = DbClient::with_store(store.clone());
        client.create(ada()).await.unwrap();

        store.set_offline(true);
        assert!(matches!(client.find_all().await, Err(StoreError::Unavailable)));
        assert_eq!(client.state(), ConnectionState::Disconnected);

        // Still offline: the ping keeps the client disconnected
        assert_eq!(client.check().await, ConnectionState::Disconnected);

        store.set_offline(false);
        // Gated until a ping confirms the store is back
        assert!(matches!(client.find_all().await, Err(StoreError::Unavailable)));
        assert_eq!(client.check().await, ConnectionState::Connected);
        assert_eq!(client.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_follows_store_health() {
        let store = Arc::new(MemoryUserStore::new());
        let client = Arc::new(DbClient::with_store(store.clone()));
        let interval = Duration::from_secs(5);

        let monitor = {
            let client = client.clone();
            tokio::spawn(async move { client.monitor(interval).await })
        };

        store.set_offline(true);
        tokio::time::sleep(interval + Duration::from_millis(1)).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);

        store.set_offline(false);
        tokio::time::sleep(interval).await;
        assert_eq!(client.state(), ConnectionState::Connected);

        client.disconnect().await;
        tokio::time::sleep(interval).await;
        assert!(monitor.is_finished());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_final() {
        let client = connected();
        client.disconnect().await;
        assert_eq!(client.check().await, ConnectionState::Disconnected);

        let client = DbClient::new();
        client.disconnect().await;
        assert!(!client.attach(Arc::new(MemoryUserStore::new())));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
