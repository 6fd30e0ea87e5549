//! Tool registry.

use crate::BoxedTool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of available tools, keyed by model-facing name.
///
/// Each session owns its own registry; there is no process-wide instance.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, BoxedTool>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(crate::read::ReadFileTool));
        registry.register(Arc::new(crate::write::WriteFileTool));
        registry.register(Arc::new(crate::edit::EditTool));
        registry.register(Arc::new(crate::list::ListTool));
        registry.register(Arc::new(crate::find::FindTool));
        registry.register(Arc::new(crate::glob::GlobTool));
        registry.register(Arc::new(crate::search::SearchTool));
        registry.register(Arc::new(crate::bash::BashTool));
        registry.register(Arc::new(crate::todo::TodoWriteTool));
        registry.register(Arc::new(crate::todo::TodoReadTool));
        registry.register(Arc::new(crate::question::QuestionTool));
        registry.register(Arc::new(crate::skill::SkillTool));
        registry.register(Arc::new(crate::patch::PatchTool));
        registry.register(Arc::new(crate::webfetch::WebFetchTool));
        registry.register(Arc::new(crate::analyze::CodeAnalyzeTool));

        registry
    }

    /// Register a tool under its own ID, replacing any previous entry.
    pub fn register(&mut self, tool: BoxedTool) {
        let name = tool.id().to_string();
        self.register_as(name, tool);
    }

    /// Register a tool under an explicit name, replacing any previous entry.
    pub fn register_as(&mut self, name: impl Into<String>, tool: BoxedTool) {
        let name = name.into();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced registered tool");
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<BoxedTool> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Snapshot of every registered `(name, tool)` pair, ordered by name.
    ///
    /// The returned vector is detached from the registry.
    pub fn list(&self) -> Vec<(String, BoxedTool)> {
        self.tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.clone()))
            .collect()
    }

    /// Registered tool names, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
