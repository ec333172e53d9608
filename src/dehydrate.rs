//! Wire format for server-to-client state transfer.
//!
//! A dehydrated context looks like
//! `{ "stores": { "<store>": <state>, ... }, "<plugin>": <state>, ... }`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FluxError, FluxResult};

/// Serialised state of one context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DehydratedState {
    /// Store states keyed by store name.
    pub stores: Map<String, Value>,
    /// Plugin states keyed by plugin name.
    #[serde(flatten)]
    pub plugins: Map<String, Value>,
}

impl DehydratedState {
    pub fn store(&self, name: &str) -> Option<&Value> {
        self.stores.get(name)
    }

    pub fn plugin(&self, name: &str) -> Option<&Value> {
        self.plugins.get(name)
    }

    pub fn to_value(&self) -> FluxResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self) -> FluxResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// JSON that can be inlined in an HTML `<script>` element.
    ///
    /// `<`, `>`, `&`, U+2028 and U+2029 are written as `\u` escapes, so the
    /// text can neither close the script element nor break a JS string
    /// literal. Parsing it as JSON gives back the same value.
    pub fn to_script_safe_json(&self) -> FluxResult<String> {
        let json = self.to_json()?;
        let mut out = String::with_capacity(json.len());
        for c in json.chars() {
            match c {
                '<' => out.push_str("\\u003c"),
                '>' => out.push_str("\\u003e"),
                '&' => out.push_str("\\u0026"),
                '\u{2028}' => out.push_str("\\u2028"),
                '\u{2029}' => out.push_str("\\u2029"),
                c => out.push(c),
            }
        }
        Ok(out)
    }

    /// Parse state produced by [`to_json`](Self::to_json) or
    /// [`to_script_safe_json`](Self::to_script_safe_json).
    pub fn from_json(json: &str) -> FluxResult<Self> {
        serde_json::from_str(json).map_err(|e| FluxError::rehydrate("dehydrated state", e))
    }

    /// Interpret an arbitrary JSON value as dehydrated state.
    pub fn from_value(value: Value) -> FluxResult<Self> {
        serde_json::from_value(value).map_err(|e| FluxError::rehydrate("dehydrated state", e))
    }
}
