pub mod auth;
pub mod cache;
pub mod config;
pub mod downloads;
pub mod metrics;
pub mod nzb;
pub mod resilience;
pub mod search;
pub mod slskd;
pub mod testing;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use cache::{RollingCache, TtlCache};
pub use config::{
    config_path, load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use downloads::{DownloadStatus, DownloadTracker, TrackedDownload};
pub use nzb::{decode_nzb, encode_nzb, NzbError, NzbMetadata};
pub use resilience::{KeyedLock, ResilientCaller, RetryPolicy};
pub use search::{GroupedResult, SearchCoordinator, SearchService};
pub use slskd::{SlskdApi, SlskdClient, SlskdError};
