use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clock::IdSource;

/// The incoming request a server-side context is created for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl RequestInfo {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Options for [`Fluxible::create_context`](super::Fluxible::create_context).
#[derive(Clone, Default)]
pub struct ContextOptions {
    /// Request being served; plugins read per-request data from it.
    pub request: Option<RequestInfo>,
    /// Overrides the application's id source for this context.
    pub ids: Option<Arc<dyn IdSource>>,
}

impl ContextOptions {
    pub fn for_request(request: RequestInfo) -> Self {
        Self {
            request: Some(request),
            ..Self::default()
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = Some(ids);
        self
    }
}

impl std::fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextOptions")
            .field("request", &self.request)
            .field("custom_ids", &self.ids.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SequentialIds;

    #[test]
    fn options_carry_only_request_and_ids() {
        let options = ContextOptions::for_request(RequestInfo::get("/items").with_query("page", "2"))
            .with_ids(Arc::new(SequentialIds::new("req")));

        let request = options.request.as_ref().unwrap();
        assert_eq!(request.query.get("page").map(String::as_str), Some("2"));
        assert!(options.ids.is_some());

        let debug = format!("{options:?}");
        assert!(debug.contains("custom_ids: true"));
        assert!(!debug.contains("extensions"));
    }
}
