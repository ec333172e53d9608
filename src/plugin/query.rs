use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::plugin::{ContextPlugin, Plugin};
use crate::context::{ActionContext, ComponentContext, ContextOptions};
use crate::error::{FluxError, FluxResult};

/// Query parameters of the request a context was created for.
///
/// Shared by the action and component contexts of one context; rehydration
/// on the client updates every holder.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl QueryParams {
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().get(key).cloned()
    }

    pub fn all(&self) -> BTreeMap<String, String> {
        self.inner.read().clone()
    }
}

#[derive(Serialize, Deserialize)]
struct QueryState {
    query: BTreeMap<String, String>,
}

/// Captures the request query on the server and carries it to the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlugin;

impl QueryPlugin {
    pub const NAME: &'static str = "QueryPlugin";
}

impl Plugin for QueryPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn plug_context(&self, options: &ContextOptions) -> Box<dyn ContextPlugin> {
        let query = options
            .request
            .as_ref()
            .map(|request| request.query.clone())
            .unwrap_or_default();
        Box::new(QueryContextPlugin {
            params: QueryParams {
                inner: Arc::new(RwLock::new(query)),
            },
        })
    }
}

struct QueryContextPlugin {
    params: QueryParams,
}

impl ContextPlugin for QueryContextPlugin {
    fn plug_action_context(&self, context: &mut ActionContext) {
        context.extensions_mut().insert(self.params.clone());
    }

    fn plug_component_context(&self, context: &mut ComponentContext) {
        context.extensions_mut().insert(self.params.clone());
    }

    fn dehydrate(&self) -> FluxResult<Option<Value>> {
        let state = QueryState {
            query: self.params.all(),
        };
        Ok(Some(serde_json::to_value(state)?))
    }

    fn rehydrate(&self, state: Value) -> FluxResult<()> {
        let state: QueryState =
            serde_json::from_value(state).map_err(|e| FluxError::rehydrate(QueryPlugin::NAME, e))?;
        *self.params.inner.write() = state.query;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Fluxible, RequestInfo};
    use serde_json::json;

    #[test]
    fn query_is_visible_on_facades_and_round_trips() {
        let app = Fluxible::new();
        app.plug(QueryPlugin);

        let request = RequestInfo::get("/search").with_query("q", "rust");
        let server = app.create_context(ContextOptions::for_request(request));

        let params = server.get_action_context().extension::<QueryParams>().cloned().unwrap();
        assert_eq!(params.get("q").as_deref(), Some("rust"));

        let state = server.dehydrate().unwrap();
        assert_eq!(state.plugin(QueryPlugin::NAME), Some(&json!({ "query": { "q": "rust" } })));

        let client = app.rehydrate(state).unwrap();
        let component = client.get_component_context();
        let params = component.extension::<QueryParams>().unwrap();
        assert_eq!(params.get("q").as_deref(), Some("rust"));
    }

    #[test]
    fn malformed_query_state_fails_rehydration() {
        let app = Fluxible::new();
        app.plug(QueryPlugin);

        let state = crate::DehydratedState::from_value(json!({
            "stores": {},
            "QueryPlugin": { "query": 12 }
        }))
        .unwrap();

        let err = app.rehydrate(state).unwrap_err();
        assert!(matches!(err, FluxError::Rehydrate { ref target, .. } if target == "QueryPlugin"));
    }
}
