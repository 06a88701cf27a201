//! Entry point tying the cache, transport, and controllers together.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ApiClient, Transport, TransportError};
use crate::auth::Session;
use crate::cache::{CacheKey, ResourceStore};
use crate::config::Config;
use crate::envelope::Envelope;
use crate::error::SyncError;
use crate::models::{Car, CreateRequest, Destination, Resource, StaffMember, StaffRole, TourPackage};
use crate::mutation::MutationController;
use crate::query::{QueryConfig, QueryController};

/// One admin client: a shared cache, one query controller per collection,
/// and create operations that keep the cache honest.
pub struct TourDesk {
    store: ResourceStore,
    transport: Arc<dyn Transport>,
    config: QueryConfig,
    mutations: MutationController,
    queries: DashMap<CacheKey, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for TourDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourDesk")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("queries", &self.queries.len())
            .finish_non_exhaustive()
    }
}

impl TourDesk {
    pub fn new(transport: Arc<dyn Transport>, config: QueryConfig) -> Self {
        let store = ResourceStore::new(&config);
        Self {
            mutations: MutationController::new(Arc::clone(&transport), store.clone()),
            store,
            transport,
            config,
            queries: DashMap::new(),
        }
    }

    /// Build an HTTP client from `config`, authorized with `token` if given.
    pub fn connect(config: &Config, token: Option<&str>) -> Result<Self, TransportError> {
        let mut client = ApiClient::from_config(config)?;
        if let Some(token) = token {
            client.set_token(token.to_string());
        }
        Ok(Self::new(Arc::new(client), config.query_config()))
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn mutations(&self) -> &MutationController {
        &self.mutations
    }

    /// The controller for `R`'s collection, created on first use.
    pub fn query<R>(&self) -> Result<QueryController<Vec<R>>, SyncError>
    where
        R: Resource + DeserializeOwned + Send + Sync + 'static,
    {
        let key = CacheKey::new(R::KEY);
        self.queries
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(key = %key, path = R::PATH, "Creating query controller");
                Box::new(QueryController::<Vec<R>>::for_path(
                    key.clone(),
                    R::PATH,
                    self.store.clone(),
                    self.config.clone(),
                    Arc::clone(&self.transport),
                )) as Box<dyn Any + Send + Sync>
            })
            .downcast_ref::<QueryController<Vec<R>>>()
            .cloned()
            .ok_or_else(|| SyncError::TypeMismatch(key.to_string()))
    }

    pub fn cars(&self) -> Result<QueryController<Vec<Car>>, SyncError> {
        self.query()
    }

    pub fn destinations(&self) -> Result<QueryController<Vec<Destination>>, SyncError> {
        self.query()
    }

    pub fn tour_packages(&self) -> Result<QueryController<Vec<TourPackage>>, SyncError> {
        self.query()
    }

    pub fn staff_members(&self) -> Result<QueryController<Vec<StaffMember>>, SyncError> {
        self.query()
    }

    pub fn staff_roles(&self) -> Result<QueryController<Vec<StaffRole>>, SyncError> {
        self.query()
    }

    /// Validate, submit, and invalidate the resource's collection.
    ///
    /// Validation failures return before anything is sent.
    pub async fn create<C>(&self, form: C) -> Result<Envelope<C::Entity>, SyncError>
    where
        C: CreateRequest,
        C::Entity: DeserializeOwned,
    {
        let request = form.into_request()?;
        self.mutations.execute(request).await
    }

    /// End the session and forget everything cached under it.
    pub fn logout(&self, session: &mut Session) -> anyhow::Result<()> {
        self.queries.clear();
        session.logout(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::EncodedBody;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn get(&self, _path: &str) -> Result<Bytes, TransportError> {
            Err(TransportError::NetworkError("offline".to_string()))
        }

        async fn post(&self, _path: &str, _body: EncodedBody) -> Result<Bytes, TransportError> {
            Err(TransportError::NetworkError("offline".to_string()))
        }
    }

    #[test]
    fn test_query_controllers_are_reused() {
        let desk = TourDesk::new(Arc::new(Offline), QueryConfig::default());
        let first = desk.cars().expect("cars");
        let second = desk.cars().expect("cars");
        assert_eq!(first.key(), second.key());
        assert_eq!(desk.queries.len(), 1);

        let roles = desk.staff_roles().expect("roles");
        assert_eq!(roles.key().as_str(), "staff-roles");
        assert_eq!(desk.queries.len(), 2);
    }

    #[test]
    fn test_entries_start_empty() {
        let desk = TourDesk::new(Arc::new(Offline), QueryConfig::default());
        let entry = desk.destinations().expect("destinations").entry().expect("entry");
        assert!(entry.data.is_empty());
        assert!(entry.last_fetched_at.is_none());
    }
}
