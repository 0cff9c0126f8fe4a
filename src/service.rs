//! Service bootstrap
//!
//! Resolves secrets from the environment, wires the optional collaborators
//! (language model, datastore, tabular engine) and exposes the HTTP state.
//! Every external dependency is optional; absence switches the matching
//! behavior to its permissive or mock form.

use crate::api::{self, ApiState, Authenticator};
use crate::config::ServiceConfig;
use crate::datastore::{Datastore, PgDatastore};
use crate::dispatcher::Dispatcher;
use crate::error::{ServiceError, ServiceResult};
use crate::llm::{LlmProvider, LlmProviderFactory};
use crate::modules::{ModuleRegistry, ModuleServices};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Service {
    config: ServiceConfig,
    state: ApiState,
}

impl Service {
    /// Build every component from configuration and process environment
    pub fn from_config(config: ServiceConfig) -> ServiceResult<Self> {
        config.validate()?;

        let api_key = config.resolve_api_key()?;
        if api_key.is_none() {
            warn!(
                env = %config.auth.api_key_env,
                "No API key configured, authentication is disabled for all routes"
            );
        }
        let auth = Authenticator::new(api_key);

        let llm = Self::build_llm(&config)?;
        let datastore = Self::build_datastore(&config);

        let services = ModuleServices::from_llm_section(&config.llm)
            .with_llm(llm)
            .with_datastore(datastore);
        if services.tabular.is_none() {
            warn!("Built without a tabular engine, data_processor will report it as unavailable");
        }

        Ok(Self::with_services(config, auth, services))
    }

    /// Assemble a service around already-built collaborators
    pub fn with_services(
        config: ServiceConfig,
        auth: Authenticator,
        services: ModuleServices,
    ) -> Self {
        let registry = Arc::new(ModuleRegistry::with_builtin_modules());
        info!(modules = ?registry.ids(), "Module registry initialized");

        let dispatcher = Arc::new(Dispatcher::new(registry, services));
        let state = ApiState::new(dispatcher, auth, &config.auth.header);
        Self { config, state }
    }

    fn build_llm(config: &ServiceConfig) -> ServiceResult<Option<Arc<dyn LlmProvider>>> {
        match config.get_llm_api_key() {
            Some(key) => {
                let provider = LlmProviderFactory::create_provider(&config.llm, key)?;
                info!(
                    provider = provider.name(),
                    model = %config.llm.model,
                    "Language model provider configured"
                );
                Ok(Some(provider))
            }
            None => {
                warn!(
                    env = %config.llm.api_key_env,
                    "No language model API key configured, nlp_processor will return mock responses"
                );
                Ok(None)
            }
        }
    }

    fn build_datastore(config: &ServiceConfig) -> Option<Arc<dyn Datastore>> {
        match config.get_database_url() {
            Some(url) => {
                info!("Audit datastore configured");
                let datastore: Arc<dyn Datastore> = Arc::new(PgDatastore::new(url));
                Some(datastore)
            }
            None => {
                warn!(
                    env = %config.database.url_env,
                    "No database URL configured, audit logging disabled and tenant checks will deny"
                );
                None
            }
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn state(&self) -> ApiState {
        self.state.clone()
    }

    pub fn listen_addr(&self) -> ServiceResult<SocketAddr> {
        let ip: IpAddr = self.config.server.host.parse().map_err(|e| {
            ServiceError::server(format!(
                "Invalid listen host '{}': {e}",
                self.config.server.host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.config.server.port))
    }

    /// Serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> ServiceResult<()> {
        let addr = self.listen_addr()?;
        let (_, server) = api::bind(self.state, addr, shutdown)?;
        server.await;
        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn isolated_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.auth.api_key_env = "AGENT_MODULES_TEST_UNSET_API_KEY".to_string();
        config.llm.api_key_env = "AGENT_MODULES_TEST_UNSET_LLM_KEY".to_string();
        config.database.url_env = "AGENT_MODULES_TEST_UNSET_DB_URL".to_string();
        config
    }

    #[test]
    fn test_zero_configuration_starts_permissive() {
        let service = Service::from_config(isolated_config()).unwrap();
        let state = service.state();
        assert!(!state.auth.is_enabled());
        assert_eq!(
            state.dispatcher.module_ids(),
            vec!["nlp_processor", "data_processor"]
        );
    }

    #[test]
    fn test_required_api_key_is_startup_error() {
        let mut config = isolated_config();
        config.auth.require_api_key = true;

        let result = Service::from_config(config);
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_listen_addr() {
        let mut config = isolated_config();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 8123;
        let service = Service::from_config(config).unwrap();
        assert_eq!(service.listen_addr().unwrap().to_string(), "127.0.0.1:8123");
    }

    #[test]
    fn test_invalid_host_rejected() {
        let mut config = isolated_config();
        config.server.host = "not a host".to_string();
        let service = Service::from_config(config).unwrap();
        assert!(matches!(
            service.listen_addr(),
            Err(ServiceError::Server { .. })
        ));
    }
}
