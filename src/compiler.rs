//! Compiler orchestrator.
//!
//! Owns the end-to-end pipeline for one snippet — parse with fallback,
//! normalize, analyze, optimize, generate — plus handler-ID allocation and
//! batch aggregation. Parser strategies are injected at construction; the
//! only state shared between scripts in a batch is the used-id set and the
//! accumulated runtime-helper set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::analysis::analyze;
use crate::ast::{EventNode, Node, ScriptInput, SourceLocation};
use crate::bundle::assemble_bundle;
use crate::context::{CodegenContext, CodegenOptions};
use crate::error::CompileError;
use crate::handler::{generate_handler, ListenerOptions};
use crate::ids::HandlerIdAllocator;
use crate::optimize::{optimize, PASS_SELECTOR_CACHING};
use crate::parser::{recognize, GrammarParser, SemanticParser, BUILTIN_PARSER_NAME};

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_OPTIMIZATION_LEVEL: u8 = 2;

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_optimization_level() -> u8 {
    DEFAULT_OPTIMIZATION_LEVEL
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u8,
    #[serde(default)]
    pub codegen: CodegenOptions,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            language: default_language(),
            confidence_threshold: default_confidence_threshold(),
            debug: false,
            optimization_level: default_optimization_level(),
            codegen: CodegenOptions::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationMetadata {
    pub handler_id: String,
    pub parser_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub commands_used: Vec<String>,
    pub optimizations_applied: Vec<String>,
    pub needs_runtime: bool,
    pub runtime_helpers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compilation {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CompilationMetadata>,
}

impl Compilation {
    fn failure(message: String, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            code: None,
            errors: vec![message],
            warnings,
            metadata: None,
        }
    }
}

/// One compiled event handler plus its DOM-binding metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledHandler {
    pub id: String,
    pub source: String,
    pub events: Vec<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_selector: Option<String>,
    #[serde(default)]
    pub listener_options: ListenerOptions,
    #[serde(default)]
    pub helpers: Vec<String>,
}

/// A script the pipeline could not lower; the batch records it and moves on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackScript {
    pub id: String,
    pub source: String,
    pub reason: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total: usize,
    pub compiled: usize,
    pub fallbacks: usize,
    pub total_size: usize,
    pub runtime_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub handlers: Vec<CompiledHandler>,
    pub code: String,
    pub fallbacks: Vec<FallbackScript>,
    pub stats: BatchStats,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

struct ParsedSnippet {
    node: Node,
    parser_used: String,
    warnings: Vec<String>,
}

pub struct Compiler {
    options: CompilerOptions,
    grammar: Option<Box<dyn GrammarParser>>,
    semantic: Option<Box<dyn SemanticParser>>,
    ids: HandlerIdAllocator,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            grammar: None,
            semantic: None,
            ids: HandlerIdAllocator::new(),
        }
    }

    pub fn with_grammar_parser(mut self, parser: Box<dyn GrammarParser>) -> Self {
        self.grammar = Some(parser);
        self
    }

    pub fn with_semantic_parser(mut self, parser: Box<dyn SemanticParser>) -> Self {
        self.semantic = Some(parser);
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Clear the session's used handler-id set.
    pub fn reset(&mut self) {
        self.ids.reset();
    }

    // ───────────────────────────────────────────────────────────────────────────
    // FRONT-END
    // ───────────────────────────────────────────────────────────────────────────

    fn parse_snippet(&self, input: &ScriptInput) -> Option<ParsedSnippet> {
        let mut warnings = Vec::new();
        let language = input
            .language
            .clone()
            .unwrap_or_else(|| self.options.language.clone());

        if language != DEFAULT_LANGUAGE {
            if let Some(semantic) = &self.semantic {
                if semantic.supports_language(&language) {
                    match semantic.parse(&input.code, &language) {
                        Ok(parse) if parse.confidence >= self.options.confidence_threshold => {
                            return Some(ParsedSnippet {
                                node: parse.node,
                                parser_used: semantic.name().to_string(),
                                warnings,
                            });
                        }
                        Ok(parse) => {
                            debug!(
                                confidence = parse.confidence,
                                threshold = self.options.confidence_threshold,
                                "semantic parse below confidence threshold"
                            );
                            if self.options.debug {
                                warnings.push(format!(
                                    "semantic parse confidence {:.2} below threshold {:.2}; falling back",
                                    parse.confidence, self.options.confidence_threshold
                                ));
                            }
                        }
                        Err(err) => {
                            debug!(error = %err, "semantic parser failed");
                        }
                    }
                }
            }
        }

        if let Some(grammar) = &self.grammar {
            match grammar.parse(&input.code) {
                Ok(node) => {
                    return Some(ParsedSnippet {
                        node,
                        parser_used: grammar.name().to_string(),
                        warnings,
                    })
                }
                Err(err) => {
                    debug!(error = %err, "grammar parser failed");
                }
            }
        }

        recognize(&input.code).map(|node| ParsedSnippet {
            node,
            parser_used: BUILTIN_PARSER_NAME.to_string(),
            warnings,
        })
    }

    /// Every AST handed to the generators is `event`-rooted; anything else
    /// is wrapped into a default click handler here, and nowhere else.
    fn normalize(node: Node) -> EventNode {
        match node {
            Node::Event(ev) => ev,
            other => EventNode {
                event: "click".to_string(),
                modifiers: vec![],
                body: vec![other],
                target: None,
                location: None,
            },
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // SINGLE-SCRIPT PIPELINE
    // ───────────────────────────────────────────────────────────────────────────

    pub fn compile_script(&mut self, input: &ScriptInput) -> Compilation {
        self.compile_internal(input).0
    }

    fn compile_internal(&mut self, input: &ScriptInput) -> (Compilation, Option<CompiledHandler>) {
        let parsed = match self.parse_snippet(input) {
            Some(parsed) => parsed,
            None => {
                debug!(source = input.code.as_str(), "all parser strategies failed");
                return (
                    Compilation::failure(CompileError::ParseFailure.to_string(), vec![]),
                    None,
                );
            }
        };

        let event = Self::normalize(parsed.node);
        let root = Node::Event(event);
        let analysis = analyze(&root);

        let (root, applied) = optimize(root, &analysis, self.options.optimization_level);
        let event = Self::normalize(root);

        let first_command = event.body.iter().find_map(|node| match node {
            Node::Command(cmd) => Some(cmd.name.clone()),
            _ => None,
        });
        let events = event.event_names();
        let id_event = events
            .first()
            .map(String::as_str)
            .unwrap_or(event.event.as_str());
        let handler_id = self
            .ids
            .allocate(id_event, first_command.as_deref(), &input.code);

        // The selector cache is only pre-populated when the caching pass
        // actually ran.
        let mut ctx = if applied.contains(&PASS_SELECTOR_CACHING) {
            CodegenContext::for_script(self.options.codegen.clone(), &analysis)
        } else {
            CodegenContext::new(self.options.codegen.clone())
        };

        let generated = match generate_handler(&event, &handler_id, &analysis, &mut ctx) {
            Ok(generated) => generated,
            Err(err) => {
                // Policy: codegen errors fail the script, not the batch.
                debug!(error = %err, "code generation failed");
                return (
                    Compilation::failure(err.to_string(), parsed.warnings),
                    None,
                );
            }
        };

        let mut warnings = parsed.warnings;
        warnings.extend(analysis.warnings.iter().cloned());

        let helpers: Vec<String> = ctx.helpers().iter().cloned().collect();
        let metadata = CompilationMetadata {
            handler_id: handler_id.clone(),
            parser_used: parsed.parser_used,
            language: input.language.clone(),
            commands_used: analysis.commands.iter().cloned().collect(),
            optimizations_applied: applied.iter().map(|s| s.to_string()).collect(),
            needs_runtime: !helpers.is_empty(),
            runtime_helpers: helpers.clone(),
        };

        let handler = CompiledHandler {
            id: handler_id,
            source: input.code.clone(),
            events,
            body: generated.body.clone(),
            element_id: input.element_id.clone(),
            element_selector: input.element_selector.clone(),
            listener_options: generated.listener_options,
            helpers,
        };

        (
            Compilation {
                success: true,
                code: Some(generated.body),
                errors: vec![],
                warnings,
                metadata: Some(metadata),
            },
            Some(handler),
        )
    }

    // ───────────────────────────────────────────────────────────────────────────
    // BATCH PIPELINE
    // ───────────────────────────────────────────────────────────────────────────

    pub fn compile_batch(&mut self, inputs: &[ScriptInput]) -> BatchResult {
        let mut handlers: Vec<CompiledHandler> = Vec::new();
        let mut fallbacks: Vec<FallbackScript> = Vec::new();
        let mut helper_union: BTreeSet<String> = BTreeSet::new();

        for input in inputs {
            let (compilation, handler) = self.compile_internal(input);
            match handler {
                Some(handler) => {
                    helper_union.extend(handler.helpers.iter().cloned());
                    handlers.push(handler);
                }
                None => {
                    let reason = if compilation.errors.is_empty() {
                        "compilation failed".to_string()
                    } else {
                        compilation.errors.join("; ")
                    };
                    let id = self.ids.allocate("script", Some("fallback"), &input.code);
                    fallbacks.push(FallbackScript {
                        id,
                        source: input.code.clone(),
                        reason,
                        location: input.location,
                    });
                }
            }
        }

        let bundle = assemble_bundle(&handlers, &helper_union, &self.options.codegen);
        let stats = BatchStats {
            total: inputs.len(),
            compiled: handlers.len(),
            fallbacks: fallbacks.len(),
            total_size: bundle.code.len(),
            runtime_size: bundle.runtime_size,
        };

        BatchResult {
            handlers,
            code: bundle.code,
            fallbacks,
            stats,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::parser::SemanticParse;

    #[test]
    fn test_compile_simple_toggle() {
        let mut compiler = Compiler::default();
        let result = compiler.compile_script(&ScriptInput::from_code("on click toggle .active"));
        assert!(result.success);
        let code = result.code.unwrap();
        assert!(code.contains("classList.toggle('active')"));
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.parser_used, "builtin");
        assert!(metadata.handler_id.starts_with("click_toggle_"));
        assert!(metadata.commands_used.contains(&"toggle".to_string()));
        assert!(metadata.needs_runtime);
        assert!(metadata.runtime_helpers.contains(&"context".to_string()));
    }

    #[test]
    fn test_bare_command_normalized_to_click_event() {
        let mut compiler = Compiler::default();
        let result = compiler.compile_script(&ScriptInput::from_code("toggle .active"));
        assert!(result.success);
        let metadata = result.metadata.unwrap();
        assert!(metadata.handler_id.starts_with("click_toggle_"));
    }

    #[test]
    fn test_parse_failure_is_not_an_exception() {
        let mut compiler = Compiler::default();
        let result =
            compiler.compile_script(&ScriptInput::from_code("definitely not a known shape"));
        assert!(!result.success);
        assert!(result.code.is_none());
        assert_eq!(result.errors.len(), 1);
        assert!(result.metadata.is_none());
    }

    struct FixedGrammar;

    impl GrammarParser for FixedGrammar {
        fn parse(&self, _source: &str) -> Result<Node, ParseError> {
            Ok(Node::Event(EventNode {
                event: "keydown".to_string(),
                modifiers: vec![],
                body: vec![Node::Command(crate::ast::CommandNode {
                    name: "hide".to_string(),
                    args: vec![],
                    target: None,
                    modifiers: Default::default(),
                    body: vec![],
                    location: None,
                })],
                target: None,
                location: None,
            }))
        }
    }

    #[test]
    fn test_grammar_parser_takes_precedence_over_builtin() {
        let mut compiler = Compiler::default().with_grammar_parser(Box::new(FixedGrammar));
        let result = compiler.compile_script(&ScriptInput::from_code("on click toggle .active"));
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.parser_used, "grammar");
        assert!(metadata.handler_id.starts_with("keydown_hide_"));
    }

    struct FailingGrammar;

    impl GrammarParser for FailingGrammar {
        fn parse(&self, source: &str) -> Result<Node, ParseError> {
            Err(ParseError::Syntax(format!("cannot parse '{}'", source)))
        }
    }

    #[test]
    fn test_grammar_failure_falls_back_to_builtin() {
        let mut compiler = Compiler::default().with_grammar_parser(Box::new(FailingGrammar));
        let result = compiler.compile_script(&ScriptInput::from_code("on click toggle .active"));
        assert!(result.success);
        assert_eq!(result.metadata.unwrap().parser_used, "builtin");
    }

    struct ConfidentSemantic {
        confidence: f64,
    }

    impl SemanticParser for ConfidentSemantic {
        fn supports_language(&self, language: &str) -> bool {
            language == "es"
        }

        fn parse(&self, _source: &str, _language: &str) -> Result<SemanticParse, ParseError> {
            Ok(SemanticParse {
                node: Node::Event(EventNode {
                    event: "click".to_string(),
                    modifiers: vec![],
                    body: vec![Node::Command(crate::ast::CommandNode {
                        name: "show".to_string(),
                        args: vec![],
                        target: None,
                        modifiers: Default::default(),
                        body: vec![],
                        location: None,
                    })],
                    target: None,
                    location: None,
                }),
                confidence: self.confidence,
            })
        }
    }

    #[test]
    fn test_semantic_parser_accepted_above_threshold() {
        let mut compiler = Compiler::new(CompilerOptions {
            language: "es".to_string(),
            ..CompilerOptions::default()
        })
        .with_semantic_parser(Box::new(ConfidentSemantic { confidence: 0.9 }));
        let result = compiler.compile_script(&ScriptInput::from_code("al hacer clic mostrar"));
        assert!(result.success);
        assert_eq!(result.metadata.unwrap().parser_used, "semantic");
    }

    #[test]
    fn test_semantic_low_confidence_falls_back() {
        let mut compiler = Compiler::new(CompilerOptions {
            language: "es".to_string(),
            debug: true,
            ..CompilerOptions::default()
        })
        .with_semantic_parser(Box::new(ConfidentSemantic { confidence: 0.4 }));
        // The snippet also matches the builtin recognizer, so the pipeline
        // should land there after rejecting the low-confidence parse.
        let result = compiler.compile_script(&ScriptInput::from_code("on click toggle .active"));
        assert!(result.success);
        let warnings = result.warnings.clone();
        assert!(warnings.iter().any(|w| w.contains("confidence")));
        assert_eq!(result.metadata.unwrap().parser_used, "builtin");
    }

    #[test]
    fn test_duplicate_sources_get_distinct_ids() {
        let mut compiler = Compiler::default();
        let first = compiler
            .compile_script(&ScriptInput::from_code("on click toggle .active"))
            .metadata
            .unwrap()
            .handler_id;
        let second = compiler
            .compile_script(&ScriptInput::from_code("on click toggle .active"))
            .metadata
            .unwrap()
            .handler_id;
        assert_ne!(first, second);
        assert!(second.ends_with("_2"));
    }

    #[test]
    fn test_batch_conservation_law() {
        let mut compiler = Compiler::default();
        let inputs = vec![
            ScriptInput::from_code("on click toggle .active"),
            ScriptInput::from_code("not parseable at all"),
            ScriptInput::from_code("on mouseenter add .hover"),
        ];
        let batch = compiler.compile_batch(&inputs);
        assert_eq!(batch.stats.total, 3);
        assert_eq!(batch.stats.compiled, 2);
        assert_eq!(batch.stats.fallbacks, 1);
        assert_eq!(
            batch.stats.compiled + batch.stats.fallbacks,
            batch.stats.total
        );
        assert_eq!(batch.handlers.len(), 2);
        assert_eq!(batch.fallbacks.len(), 1);
        assert!(!batch.fallbacks[0].reason.is_empty());
        assert!(batch.stats.total_size >= batch.stats.runtime_size);
    }

    #[test]
    fn test_batch_bundle_contains_handlers_and_bindings() {
        let mut compiler = Compiler::default();
        let mut input = ScriptInput::from_code("on click toggle .active");
        input.element_id = Some("save".to_string());
        let batch = compiler.compile_batch(&[input]);
        assert!(batch.code.contains("import {"));
        assert!(batch.code.contains("const _runtime ="));
        assert!(batch.code.contains("document.querySelectorAll('#save')"));
        assert!(batch
            .code
            .contains(&format!("el.addEventListener('click', {})", batch.handlers[0].id)));
    }

    #[test]
    fn test_optimizations_reported_in_metadata() {
        let mut compiler = Compiler::default();
        let result = compiler.compile_script(&ScriptInput::from_code("on click toggle .active"));
        // A single toggle has nothing to fold, cache, prune, or unroll.
        assert!(result.metadata.unwrap().optimizations_applied.is_empty());
    }
}
