//! Bundle assembler.
//!
//! Merges the compiled handlers of one batch into a single module: a
//! module-load line for the chosen format, a runtime-alias object, every
//! handler body, and a ready-gated block that binds each handler to its
//! target element(s).

use std::collections::BTreeSet;

use crate::compiler::CompiledHandler;
use crate::context::{CodegenOptions, ModuleMode};
use crate::expression::escape_selector;

/// Helpers every bundle carries regardless of what the handlers used. The
/// binding block depends on the DOM-ready helper.
pub const BASELINE_HELPERS: &[&str] = &["ready"];

/// Binding target when a handler declares neither an element id nor a
/// selector.
pub const DEFAULT_BINDING_SELECTOR: &str = "[data-hs]";

#[derive(Debug, Clone)]
pub struct AssembledBundle {
    pub code: String,
    /// Byte length of the module-load + alias preamble.
    pub runtime_size: usize,
}

fn module_load_line(helpers: &BTreeSet<String>, options: &CodegenOptions) -> String {
    let names = helpers.iter().cloned().collect::<Vec<_>>().join(", ");
    match options.mode {
        ModuleMode::Esm => format!(
            "import {{ {} }} from '{}';",
            names, options.runtime_import
        ),
        ModuleMode::Cjs => format!(
            "const {{ {} }} = require('{}');",
            names, options.runtime_import
        ),
        ModuleMode::Iife => format!("const {{ {} }} = window.lokascript;", names),
    }
}

fn runtime_alias_object(helpers: &BTreeSet<String>) -> String {
    let entries = helpers
        .iter()
        .map(|name| format!("{}: {}", name, name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("const _runtime = {{ {} }};", entries)
}

/// Resolve the DOM-binding selector for one handler.
pub fn binding_selector(handler: &CompiledHandler) -> String {
    if let Some(id) = &handler.element_id {
        return format!("#{}", id);
    }
    if let Some(selector) = &handler.element_selector {
        return selector.clone();
    }
    DEFAULT_BINDING_SELECTOR.to_string()
}

fn binding_block(handlers: &[CompiledHandler]) -> String {
    let mut lines = vec!["ready(() => {".to_string()];
    for handler in handlers {
        let selector = binding_selector(handler);
        lines.push(format!(
            "  document.querySelectorAll('{}').forEach((el) => {{",
            escape_selector(&selector)
        ));
        for event in &handler.events {
            match handler.listener_options.to_js() {
                Some(opts) => lines.push(format!(
                    "    el.addEventListener('{}', {}, {});",
                    escape_selector(event),
                    handler.id,
                    opts
                )),
                None => lines.push(format!(
                    "    el.addEventListener('{}', {});",
                    escape_selector(event),
                    handler.id
                )),
            }
        }
        lines.push("  });".to_string());
    }
    lines.push("});".to_string());
    lines.join("\n")
}

/// Assemble one module from the batch's handlers and the accumulated
/// helper set.
pub fn assemble_bundle(
    handlers: &[CompiledHandler],
    helpers: &BTreeSet<String>,
    options: &CodegenOptions,
) -> AssembledBundle {
    let mut all_helpers = helpers.clone();
    for baseline in BASELINE_HELPERS {
        all_helpers.insert((*baseline).to_string());
    }

    let preamble = format!(
        "{}\n{}",
        module_load_line(&all_helpers, options),
        runtime_alias_object(&all_helpers)
    );
    let runtime_size = preamble.len();

    let mut sections = vec![preamble];
    for handler in handlers {
        let mut section = String::new();
        if options.preserve_comments {
            let source_line = handler.source.replace('\n', " ");
            section.push_str(&format!("// {}\n", source_line));
        }
        section.push_str(&handler.body);
        sections.push(section);
    }
    sections.push(binding_block(handlers));

    AssembledBundle {
        code: sections.join("\n\n"),
        runtime_size,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
