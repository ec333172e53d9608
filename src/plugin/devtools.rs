use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::plugin::{ContextPlugin, Plugin};
use crate::action::{Action, ActionCall};
use crate::clock::{Clock, SystemClock};
use crate::config::DevToolsConfig;
use crate::context::{ActionContext, ActionRecord, ComponentContext, ContextOptions};
use crate::error::{FluxError, FluxResult};

/// An event dispatched from inside a traced action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTrace {
    pub event: String,
    pub timestamp_ms: u64,
}

/// Timing and outcome of one action execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTrace {
    pub id: String,
    pub root_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub start_ms: u64,
    pub end_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub failed: bool,
    pub dispatches: Vec<DispatchTrace>,
}

impl ActionTrace {
    fn started(record: &ActionRecord, start_ms: u64) -> Self {
        Self {
            id: record.id.clone(),
            root_id: record.root_id.clone(),
            parent_id: record.parent_id.clone(),
            name: record.display_name.clone(),
            start_ms,
            end_ms: None,
            duration_ms: None,
            failed: false,
            dispatches: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_ms.is_some()
    }
}

/// An action trace with the traces of the actions it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionNode {
    pub trace: ActionTrace,
    pub children: Vec<ActionNode>,
}

struct DevToolsInner {
    clock: Arc<dyn Clock>,
    enabled: AtomicBool,
    history: Mutex<Vec<ActionTrace>>,
}

/// Per-context trace recorder.
///
/// Available as an extension on action and component contexts. Cloning
/// gives another handle to the same history.
#[derive(Clone)]
pub struct DevTools {
    inner: Arc<DevToolsInner>,
}

impl DevTools {
    fn new(clock: Arc<dyn Clock>, enabled: bool) -> Self {
        Self {
            inner: Arc::new(DevToolsInner {
                clock,
                enabled: AtomicBool::new(enabled),
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn enable_debug(&self) {
        self.inner.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable_debug(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Traces in the order their actions started.
    pub fn action_history(&self) -> Vec<ActionTrace> {
        self.inner.history.lock().clone()
    }

    /// The history arranged by parent action.
    ///
    /// Traces whose parent is not in the history become roots.
    pub fn call_tree(&self) -> Vec<ActionNode> {
        fn build(trace: &ActionTrace, history: &[ActionTrace]) -> ActionNode {
            ActionNode {
                trace: trace.clone(),
                children: history
                    .iter()
                    .filter(|t| t.parent_id.as_deref() == Some(trace.id.as_str()))
                    .map(|t| build(t, history))
                    .collect(),
            }
        }

        let history = self.action_history();
        let ids: HashSet<&str> = history.iter().map(|t| t.id.as_str()).collect();
        history
            .iter()
            .filter(|t| t.parent_id.as_deref().map_or(true, |parent| !ids.contains(parent)))
            .map(|t| build(t, &history))
            .collect()
    }

    fn start(&self, record: &ActionRecord) {
        let trace = ActionTrace::started(record, self.inner.clock.now_ms());
        self.inner.history.lock().push(trace);
    }

    fn finish(&self, id: &str, failed: bool) {
        let now = self.inner.clock.now_ms();
        let mut history = self.inner.history.lock();
        if let Some(trace) = history.iter_mut().rev().find(|t| t.id == id) {
            trace.end_ms = Some(now);
            trace.duration_ms = Some(now.saturating_sub(trace.start_ms));
            trace.failed = failed;
        }
    }

    fn record_dispatch(&self, id: &str, event: &str) {
        if !self.is_enabled() {
            return;
        }
        let timestamp_ms = self.inner.clock.now_ms();
        let mut history = self.inner.history.lock();
        if let Some(trace) = history.iter_mut().rev().find(|t| t.id == id) {
            trace.dispatches.push(DispatchTrace {
                event: event.to_string(),
                timestamp_ms,
            });
        }
    }
}

impl std::fmt::Debug for DevTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevTools")
            .field("enabled", &self.is_enabled())
            .field("traces", &self.inner.history.lock().len())
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct DevToolsState {
    action_history: Vec<ActionTrace>,
}

/// Records a trace for every action run while debugging is enabled.
#[derive(Clone)]
pub struct DevToolsPlugin {
    clock: Arc<dyn Clock>,
    debug: bool,
}

impl Default for DevToolsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl DevToolsPlugin {
    pub const NAME: &'static str = "DevToolsPlugin";

    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            debug: false,
        }
    }

    pub fn from_config(config: &DevToolsConfig) -> Self {
        Self::new().debug(config.debug)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start every context with debugging enabled.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

impl std::fmt::Debug for DevToolsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevToolsPlugin")
            .field("debug", &self.debug)
            .finish()
    }
}

impl Plugin for DevToolsPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn plug_context(&self, _options: &ContextOptions) -> Box<dyn ContextPlugin> {
        Box::new(DevToolsContextPlugin {
            devtools: DevTools::new(Arc::clone(&self.clock), self.debug),
        })
    }
}

struct DevToolsContextPlugin {
    devtools: DevTools,
}

impl ContextPlugin for DevToolsContextPlugin {
    fn plug_action_context(&self, context: &mut ActionContext) {
        context.extensions_mut().insert(self.devtools.clone());
        let devtools = self.devtools.clone();
        context.on_dispatch(Arc::new(move |record: &ActionRecord, event: &str, _: &Value| {
            devtools.record_dispatch(&record.id, event);
        }));
    }

    fn plug_component_context(&self, context: &mut ComponentContext) {
        context.extensions_mut().insert(self.devtools.clone());
    }

    fn plug_execute_action(&self, call: ActionCall) -> ActionCall {
        if !self.devtools.is_enabled() {
            return call;
        }

        let devtools = self.devtools.clone();
        let inner = call.action.clone();
        let traced = Action::future(call.action.name(), move |cx, payload| {
            let devtools = devtools.clone();
            let inner = inner.clone();
            async move {
                let id = cx.id().to_string();
                devtools.start(cx.record());
                let result = inner.invoke(cx, payload).await;
                devtools.finish(&id, result.is_err());
                result.map_err(anyhow::Error::from)
            }
        });

        ActionCall {
            action: traced,
            ..call
        }
    }

    fn dehydrate(&self) -> FluxResult<Option<Value>> {
        if !self.devtools.is_enabled() {
            return Ok(None);
        }
        let state = DevToolsState {
            action_history: self.devtools.action_history(),
        };
        Ok(Some(serde_json::to_value(state)?))
    }

    fn rehydrate(&self, state: Value) -> FluxResult<()> {
        let state: DevToolsState =
            serde_json::from_value(state).map_err(|e| FluxError::rehydrate(DevToolsPlugin::NAME, e))?;
        *self.devtools.inner.history.lock() = state.action_history;
        self.devtools.enable_debug();
        Ok(())
    }
}
