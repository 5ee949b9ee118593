use std::sync::Arc;
use std::time::Duration;

use soulbridge_core::{
    Authenticator, Config, DownloadTracker, KeyedLock, RollingCache, SanitizedConfig,
    SearchService, SlskdApi, SlskdError,
};

/// How long a reachability check result is served.
const HEALTH_TTL: Duration = Duration::from_secs(30);
/// Within this window of expiry the check is refreshed in the background.
const HEALTH_REFRESH_WINDOW: Duration = Duration::from_secs(10);

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    slskd: Arc<dyn SlskdApi>,
    lock: Arc<KeyedLock>,
    search: SearchService,
    tracker: DownloadTracker,
    health: RollingCache<&'static str, bool>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        slskd: Arc<dyn SlskdApi>,
    ) -> Self {
        let lock = Arc::new(KeyedLock::new());
        let search = SearchService::new(Arc::clone(&slskd), Arc::clone(&lock), &config.search);

        Self {
            config,
            authenticator,
            slskd,
            lock,
            search,
            tracker: DownloadTracker::new(),
            health: RollingCache::new(HEALTH_TTL, HEALTH_REFRESH_WINDOW),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn slskd(&self) -> &dyn SlskdApi {
        self.slskd.as_ref()
    }

    /// Keyed lock shared with the search pipeline. Job operations use `job:<nzo_id>`.
    pub fn lock(&self) -> &KeyedLock {
        &self.lock
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn tracker(&self) -> &DownloadTracker {
        &self.tracker
    }

    /// Whether slskd answered its last check.
    pub async fn slskd_reachable(&self) -> bool {
        let slskd = Arc::clone(&self.slskd);
        self.health
            .get_or_load("slskd", move || async move {
                slskd.ping().await.map(|_| true)
            })
            .await
            .unwrap_or_else(|e: SlskdError| {
                tracing::debug!(error = %e, "slskd health check failed");
                false
            })
    }
}
