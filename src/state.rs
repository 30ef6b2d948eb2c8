use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::ExpiringCache;
use crate::config::{CacheConfig, Config};
use crate::db::{RecordStore, Store};
use crate::domain::{
    Chat, Class, Club, Course, Event, Message, Record, School, SetupAccount, Subject, User,
};
use crate::services::{CachedRecordService, RecordService};

fn record_service<R: Record>(
    store: &Arc<dyn RecordStore>,
    cache: &Arc<ExpiringCache>,
    config: &CacheConfig,
) -> Arc<dyn RecordService<R>> {
    Arc::new(CachedRecordService::<R>::new(
        store.clone(),
        cache.clone(),
        config.ttl_for(R::COLLECTION),
        config.verify_policy(),
    ))
}

/// Process-wide services. All record services share one cache and one store.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Arc<dyn RecordStore>,

    pub cache: Arc<ExpiringCache>,

    pub schools: Arc<dyn RecordService<School>>,

    pub classes: Arc<dyn RecordService<Class>>,

    pub subjects: Arc<dyn RecordService<Subject>>,

    pub courses: Arc<dyn RecordService<Course>>,

    pub chats: Arc<dyn RecordService<Chat>>,

    pub messages: Arc<dyn RecordService<Message>>,

    pub clubs: Arc<dyn RecordService<Club>>,

    pub events: Arc<dyn RecordService<Event>>,

    pub users: Arc<dyn RecordService<User>>,

    pub setup_accounts: Arc<dyn RecordService<SetupAccount>>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Wires the record services over an already opened store.
    #[must_use]
    pub fn with_store(config: Config, store: Arc<dyn RecordStore>) -> Self {
        let cache = Arc::new(ExpiringCache::new());
        let c = &config.cache;

        Self {
            schools: record_service(&store, &cache, c),
            classes: record_service(&store, &cache, c),
            subjects: record_service(&store, &cache, c),
            courses: record_service(&store, &cache, c),
            chats: record_service(&store, &cache, c),
            messages: record_service(&store, &cache, c),
            clubs: record_service(&store, &cache, c),
            events: record_service(&store, &cache, c),
            users: record_service(&store, &cache, c),
            setup_accounts: record_service(&store, &cache, c),
            config: Arc::new(RwLock::new(config)),
            store,
            cache,
        }
    }
}
