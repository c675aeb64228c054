pub mod password;
pub mod store;
pub mod users;

use crate::clock::{Clock, SystemClock};
use crate::config::{SecurityConfig, StorageConfig};
use crate::security::store::SecurityStore;
use crate::security::users::UserRegistry;
use rocket::fairing::AdHoc;
use std::sync::Arc;

/// Connect the key-value backend, load the security store and the user
/// registry, and hand them to Rocket's managed state.
pub fn stage_security(storage_config: StorageConfig, security_config: SecurityConfig) -> AdHoc {
    AdHoc::try_on_ignite("Security store", |rocket| async move {
        match crate::storage::connect(&storage_config).await {
            Ok(storage) => {
                let clock: Arc<dyn Clock> = Arc::new(SystemClock);
                let store = SecurityStore::load(security_config, storage.clone(), clock).await;
                let registry = UserRegistry::load(storage).await;
                tracing::info!("Security store initialized");
                Ok(rocket.manage(Arc::new(store)).manage(Arc::new(registry)))
            }
            Err(e) => {
                tracing::error!("Failed to initialize key-value storage: {}", e);
                Err(rocket)
            }
        }
    })
}
