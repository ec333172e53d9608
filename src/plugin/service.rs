use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::plugin::{ContextPlugin, Plugin};
use crate::action::into_flux_error;
use crate::config::ServiceConfig;
use crate::context::{ActionContext, ContextOptions, RequestInfo};
use crate::error::{FluxError, FluxResult};

/// CRUD operation requested from a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Everything a service receives for one call.
#[derive(Debug, Clone)]
pub struct ServiceCall {
    pub operation: Operation,
    pub params: Value,
    /// Request body; `Null` for read and delete.
    pub body: Value,
    pub config: Value,
    /// Request the calling context was created for, if any.
    pub request: Option<RequestInfo>,
}

fn unsupported(service: &str, operation: Operation) -> anyhow::Error {
    FluxError::OperationNotSupported {
        service: service.to_string(),
        operation: operation.to_string(),
    }
    .into()
}

/// A data service reachable from actions through [`ServiceClient`].
///
/// Implement the operations the service supports; the rest fail with
/// [`FluxError::OperationNotSupported`].
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    async fn read(&self, _call: &ServiceCall) -> anyhow::Result<Value> {
        Err(unsupported(self.name(), Operation::Read))
    }

    async fn create(&self, _call: &ServiceCall) -> anyhow::Result<Value> {
        Err(unsupported(self.name(), Operation::Create))
    }

    async fn update(&self, _call: &ServiceCall) -> anyhow::Result<Value> {
        Err(unsupported(self.name(), Operation::Update))
    }

    async fn delete(&self, _call: &ServiceCall) -> anyhow::Result<Value> {
        Err(unsupported(self.name(), Operation::Delete))
    }
}

type Services = Arc<IndexMap<String, Arc<dyn Service>>>;

/// Action-side handle for calling registered services.
#[derive(Clone)]
pub struct ServiceClient {
    services: Services,
    request: Option<RequestInfo>,
    config: Arc<RwLock<ServiceConfig>>,
}

impl ServiceClient {
    pub async fn read(&self, service: &str, params: Value, config: Value) -> FluxResult<Value> {
        self.call(service, Operation::Read, params, Value::Null, config)
            .await
    }

    pub async fn create(&self, service: &str, params: Value, body: Value, config: Value) -> FluxResult<Value> {
        self.call(service, Operation::Create, params, body, config)
            .await
    }

    pub async fn update(&self, service: &str, params: Value, body: Value, config: Value) -> FluxResult<Value> {
        self.call(service, Operation::Update, params, body, config)
            .await
    }

    pub async fn delete(&self, service: &str, params: Value, config: Value) -> FluxResult<Value> {
        self.call(service, Operation::Delete, params, Value::Null, config)
            .await
    }

    /// Transport settings carried from the server.
    pub fn config(&self) -> ServiceConfig {
        self.config.read().clone()
    }

    async fn call(
        &self,
        service: &str,
        operation: Operation,
        params: Value,
        body: Value,
        config: Value,
    ) -> FluxResult<Value> {
        let handler = self
            .services
            .get(service)
            .cloned()
            .ok_or_else(|| FluxError::UnknownService(service.to_string()))?;
        let call = ServiceCall {
            operation,
            params,
            body,
            config,
            request: self.request.clone(),
        };

        tracing::debug!(service, %operation, "service call");
        let result = match operation {
            Operation::Read => handler.read(&call).await,
            Operation::Create => handler.create(&call).await,
            Operation::Update => handler.update(&call).await,
            Operation::Delete => handler.delete(&call).await,
        };
        result.map_err(into_flux_error)
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("config", &*self.config.read())
            .finish()
    }
}

/// Registers services and exposes a [`ServiceClient`] on action contexts.
#[derive(Clone, Default)]
pub struct ServicePlugin {
    services: Services,
    config: ServiceConfig,
}

impl ServicePlugin {
    pub const NAME: &'static str = "ServicePlugin";

    pub fn new(config: ServiceConfig) -> Self {
        Self {
            services: Services::default(),
            config,
        }
    }

    /// Register a service under its own name, replacing any previous one.
    pub fn register<S: Service + 'static>(mut self, service: S) -> Self {
        Arc::make_mut(&mut self.services).insert(service.name().to_string(), Arc::new(service));
        self
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }
}

impl Plugin for ServicePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn plug_context(&self, options: &ContextOptions) -> Box<dyn ContextPlugin> {
        Box::new(ServiceContextPlugin {
            client: ServiceClient {
                services: Arc::clone(&self.services),
                request: options.request.clone(),
                config: Arc::new(RwLock::new(self.config.clone())),
            },
        })
    }
}

struct ServiceContextPlugin {
    client: ServiceClient,
}

impl ContextPlugin for ServiceContextPlugin {
    fn plug_action_context(&self, context: &mut ActionContext) {
        context.extensions_mut().insert(self.client.clone());
    }

    fn dehydrate(&self) -> FluxResult<Option<Value>> {
        Ok(Some(serde_json::to_value(self.client.config())?))
    }

    fn rehydrate(&self, state: Value) -> FluxResult<()> {
        let config: ServiceConfig =
            serde_json::from_value(state).map_err(|e| FluxError::rehydrate(ServicePlugin::NAME, e))?;
        *self.client.config.write() = config;
        Ok(())
    }
}
