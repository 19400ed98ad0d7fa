//! Shared mutable state for one script's code generation.
//!
//! One `CodegenContext` is created per compiled script and owned by that
//! compilation alone; batch compilation never shares a context between
//! scripts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::ScriptAnalysis;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModuleMode {
    #[default]
    Esm,
    Cjs,
    Iife,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetLevel {
    Es5,
    Es2015,
    #[default]
    Es2020,
}

fn default_runtime_import() -> String {
    "@lokascript/runtime".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenOptions {
    #[serde(default)]
    pub target: TargetLevel,
    #[serde(default)]
    pub mode: ModuleMode,
    #[serde(default)]
    pub minify: bool,
    #[serde(default)]
    pub source_maps: bool,
    #[serde(default = "default_runtime_import")]
    pub runtime_import: String,
    #[serde(default)]
    pub preserve_comments: bool,
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            target: TargetLevel::default(),
            mode: ModuleMode::default(),
            minify: false,
            source_maps: false,
            runtime_import: default_runtime_import(),
            preserve_comments: false,
            debug_mode: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct CodegenContext {
    next_id: u32,
    /// Selector string → cache variable name. Populated only for selectors
    /// the analysis marked cacheable and that are used more than once.
    selector_cache: BTreeMap<String, String>,
    /// Required runtime helpers. Grows monotonically; registration is
    /// idempotent per distinct name.
    helpers: BTreeSet<String>,
    pub options: CodegenOptions,
}

impl CodegenContext {
    pub fn new(options: CodegenOptions) -> Self {
        Self {
            next_id: 0,
            selector_cache: BTreeMap::new(),
            helpers: BTreeSet::new(),
            options,
        }
    }

    /// Build a context for one script, pre-allocating cache variables for
    /// the analysis-approved selectors.
    pub fn for_script(options: CodegenOptions, analysis: &ScriptAnalysis) -> Self {
        let mut ctx = Self::new(options);
        for info in analysis.cacheable_selectors() {
            let var = format!("_sel_{}", ctx.next_id());
            ctx.selector_cache.insert(info.selector.clone(), var);
        }
        ctx
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn cached_selector(&self, selector: &str) -> Option<&str> {
        self.selector_cache.get(selector).map(String::as_str)
    }

    /// Cache declarations in deterministic (selector-sorted) order, for the
    /// handler prologue.
    pub fn cache_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.selector_cache
            .iter()
            .map(|(sel, var)| (sel.as_str(), var.as_str()))
    }

    pub fn has_cached_selectors(&self) -> bool {
        !self.selector_cache.is_empty()
    }

    pub fn require_helper(&mut self, name: &str) {
        self.helpers.insert(name.to_string());
    }

    pub fn helpers(&self) -> &BTreeSet<String> {
        &self.helpers
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_registration_is_idempotent() {
        let mut ctx = CodegenContext::new(CodegenOptions::default());
        ctx.require_helper("globals");
        ctx.require_helper("globals");
        ctx.require_helper("contains");
        assert_eq!(ctx.helpers().len(), 2);
    }

    #[test]
    fn test_id_counter_is_monotonic() {
        let mut ctx = CodegenContext::new(CodegenOptions::default());
        assert_eq!(ctx.next_id(), 0);
        assert_eq!(ctx.next_id(), 1);
        assert_eq!(ctx.next_id(), 2);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: CodegenOptions = serde_json::from_str(r#"{"mode":"iife"}"#).unwrap();
        assert_eq!(opts.mode, ModuleMode::Iife);
        assert_eq!(opts.target, TargetLevel::Es2020);
        assert_eq!(opts.runtime_import, "@lokascript/runtime");
    }
}
