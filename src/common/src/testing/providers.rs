//! In-process stand-ins for the identity provider, the billing provider and
//! the media store.
//!
//! The fakes keep their state behind plain mutexes and expose switches for
//! injecting outages, so failure-path behavior can be tested without a
//! network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore, PutMultipartOpts,
    PutOptions, PutPayload, PutResult,
};
use uuid::Uuid;

use crate::billing::{BillingError, BillingProvider, SubscriptionState};
use crate::identity::{AccountIdentity, IdentityError, IdentityProvider};

/// Identity provider backed by an in-memory account registry.
#[derive(Default)]
pub struct StaticIdentityProvider {
    /// token -> account id
    tokens: Mutex<HashMap<String, Uuid>>,
    /// account id -> email
    accounts: Mutex<HashMap<Uuid, String>>,
    fail_deletions: AtomicBool,
    delete_calls: AtomicUsize,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account together with a bearer token that resolves to it.
    /// Returns the new account id.
    pub fn register(&self, token: &str, email: &str) -> Uuid {
        let account_id = Uuid::new_v4();
        self.register_account(account_id, email);
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), account_id);
        account_id
    }

    /// Register an account without a token (enough for deletion tests).
    pub fn register_account(&self, account_id: Uuid, email: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account_id, email.to_string());
    }

    /// Make every subsequent `delete_account` call fail as unavailable.
    pub fn fail_deletions(&self, fail: bool) {
        self.fail_deletions.store(fail, Ordering::SeqCst);
    }

    /// Number of `delete_account` calls seen so far.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Whether the provider still has a record for this account.
    pub fn knows_account(&self, account_id: Uuid) -> bool {
        self.accounts.lock().unwrap().contains_key(&account_id)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<AccountIdentity, IdentityError> {
        let account_id = match self.tokens.lock().unwrap().get(token) {
            Some(id) => *id,
            None => return Err(IdentityError::Unauthorized),
        };
        let email = self
            .accounts
            .lock()
            .unwrap()
            .get(&account_id)
            .cloned()
            .unwrap_or_default();
        Ok(AccountIdentity { account_id, email })
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<(), IdentityError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletions.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("injected outage".to_string()));
        }

        if self.accounts.lock().unwrap().remove(&account_id).is_none() {
            return Err(IdentityError::NotFound);
        }
        // Any tokens pointing at the account die with it
        self.tokens
            .lock()
            .unwrap()
            .retain(|_, id| *id != account_id);
        Ok(())
    }
}

/// Billing provider backed by an in-memory subscription table.
///
/// `cancel_at_period_end` only flips the flag; it never removes the
/// subscription or changes its status, mirroring the renewal-only contract
/// of the real provider call.
#[derive(Default)]
pub struct FakeBillingProvider {
    subscriptions: Mutex<HashMap<String, SubscriptionState>>,
    fail_requests: AtomicBool,
    cancel_calls: AtomicUsize,
}

impl FakeBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a subscription.
    pub fn add_subscription(&self, state: SubscriptionState) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(state.subscription_id.clone(), state);
    }

    /// Seed an active subscription with the given period end.
    pub fn add_active_subscription(
        &self,
        subscription_id: &str,
        customer_id: &str,
        current_period_end: DateTime<Utc>,
    ) {
        self.add_subscription(SubscriptionState {
            subscription_id: subscription_id.to_string(),
            customer_id: customer_id.to_string(),
            status: "active".to_string(),
            cancel_at_period_end: false,
            current_period_end: Some(current_period_end),
        });
    }

    /// Make every subsequent provider call fail as unavailable.
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Number of `cancel_at_period_end` calls seen so far.
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// Current provider-side view of a subscription.
    pub fn subscription(&self, subscription_id: &str) -> Option<SubscriptionState> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
    }
}

#[async_trait]
impl BillingProvider for FakeBillingProvider {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, BillingError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(BillingError::Unavailable("injected outage".to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or(BillingError::NotFound)
    }

    async fn cancel_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, BillingError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(BillingError::Unavailable("injected outage".to_string()));
        }

        let mut subscriptions = self.subscriptions.lock().unwrap();
        let state = subscriptions
            .get_mut(subscription_id)
            .ok_or(BillingError::NotFound)?;
        state.cancel_at_period_end = true;
        Ok(state.clone())
    }
}

/// Object store that delegates to [`InMemory`] but can be told to fail
/// list or delete calls, for exercising best-effort reclamation paths.
pub struct FlakyObjectStore {
    inner: InMemory,
    fail_lists: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyObjectStore {
    pub fn new() -> Self {
        Self {
            inner: InMemory::new(),
            fail_lists: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `list` yield an error instead of objects.
    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` call fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn injected(call: &str) -> object_store::Error {
        object_store::Error::Generic {
            store: "FlakyObjectStore",
            source: format!("injected {call} failure").into(),
        }
    }
}

impl Default for FlakyObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlakyObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FlakyObjectStore({})", self.inner)
    }
}

impl std::fmt::Debug for FlakyObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyObjectStore").finish()
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &Path,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return stream::once(async { Err(FlakyObjectStore::injected("list")) }).boxed();
        }
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_identity_provider_round_trip() {
        let provider = StaticIdentityProvider::new();
        let account_id = provider.register("tok-1", "p@example.com");

        let identity = provider.verify_token("tok-1").await.unwrap();
        assert_eq!(identity.account_id, account_id);
        assert_eq!(identity.email, "p@example.com");

        provider.delete_account(account_id).await.unwrap();
        assert!(!provider.knows_account(account_id));
        assert!(matches!(
            provider.verify_token("tok-1").await,
            Err(IdentityError::Unauthorized)
        ));

        // Second deletion reports NotFound, which callers treat as success
        assert!(matches!(
            provider.delete_account(account_id).await,
            Err(IdentityError::NotFound)
        ));
        assert_eq!(provider.delete_calls(), 2);
    }

    #[tokio::test]
    async fn test_static_identity_provider_injected_outage() {
        let provider = StaticIdentityProvider::new();
        let account_id = provider.register("tok-1", "p@example.com");

        provider.fail_deletions(true);
        let err = provider.delete_account(account_id).await.unwrap_err();
        assert!(err.is_transient());
        assert!(provider.knows_account(account_id));

        provider.fail_deletions(false);
        provider.delete_account(account_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_fake_billing_cancel_is_non_destructive() {
        let provider = FakeBillingProvider::new();
        let period_end = Utc::now() + chrono::Duration::days(10);
        provider.add_active_subscription("sub_1", "cus_1", period_end);

        let updated = provider.cancel_at_period_end("sub_1").await.unwrap();
        assert!(updated.cancel_at_period_end);
        assert_eq!(updated.status, "active");

        // The subscription still exists, still active, only flagged
        let current = provider.subscription("sub_1").unwrap();
        assert!(current.cancel_at_period_end);
        assert_eq!(current.status, "active");
        assert_eq!(current.current_period_end.unwrap(), period_end);
        assert_eq!(provider.cancel_calls(), 1);
    }

    #[tokio::test]
    async fn test_fake_billing_unknown_subscription() {
        let provider = FakeBillingProvider::new();
        assert!(matches!(
            provider.fetch_subscription("sub_missing").await,
            Err(BillingError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_flaky_object_store_injects_failures() {
        let store = FlakyObjectStore::new();
        let path = Path::from("avatars/acct-1/profile.png");
        store
            .put(&path, PutPayload::from_static(b"img"))
            .await
            .unwrap();

        store.fail_lists(true);
        let mut listing = store.list(None);
        assert!(listing.next().await.unwrap().is_err());
        store.fail_lists(false);

        store.fail_deletes(true);
        assert!(store.delete(&path).await.is_err());
        store.fail_deletes(false);

        store.delete(&path).await.unwrap();
        let mut listing = store.list(None);
        assert!(listing.next().await.is_none());
    }
}
