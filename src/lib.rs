//! # lokascript-native compilation core
//!
//! Ahead-of-time compiler core that lowers DOM-scripting command sentences
//! ("on click toggle .active") into standalone JavaScript, with no runtime
//! interpreter. Scanners and grammar parsers are external collaborators;
//! this crate owns the pipeline between them and the emitted bundle.
//!
//! ## Pipeline Invariants
//!
//! 1. **Event-rooted ASTs**: every tree handed to the generators is an
//!    `event` node. Any other top-level shape is wrapped into a default
//!    click handler once, in the orchestrator, never in the generators.
//! 2. **One context per script**: the codegen context (ID counter, selector
//!    cache, required-helper set) is freshly allocated per script and owned
//!    by that compilation alone.
//! 3. **Monotonic helper set**: helper registration only grows and is
//!    idempotent per distinct name; a bundle imports each helper once.
//! 4. **Session-unique handler ids**: ids are deterministic
//!    (`<event>_<command>_<djb2 base36>`) and collision-resolved with
//!    numeric suffixes for the lifetime of the compiler instance.
//! 5. **Batch conservation**: `compiled + fallbacks == total` for every
//!    batch; a script that cannot be lowered becomes a fallback record,
//!    never an abort.

mod analysis;
mod ast;
mod bundle;
mod compiler;
mod context;
mod error;
mod expression;
mod handler;
mod ids;
mod optimize;
mod parser;


pub use analysis::{
    analyze, ControlFlowFlags, DependencySummary, ScriptAnalysis, SelectorInfo, VariableTables,
    VariableUsage,
};
pub use ast::{
    ArrayNode, BinaryNode, CallNode, CommandNode, ConditionalNode, EventModifier, EventNode,
    IdentifierNode, LiteralNode, MemberNode, MemberProperty, Node, ObjectNode, ObjectProperty,
    Position, PositionalNode, PossessiveNode, ScriptInput, SelectorNode, SourceLocation,
    TemplateNode, UnaryNode, VarScope, VariableNode,
};
pub use bundle::{assemble_bundle, AssembledBundle, BASELINE_HELPERS, DEFAULT_BINDING_SELECTOR};
pub use compiler::{
    BatchResult, BatchStats, Compilation, CompilationMetadata, CompiledHandler, Compiler,
    CompilerOptions, FallbackScript, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LANGUAGE,
    DEFAULT_OPTIMIZATION_LEVEL,
};
pub use context::{CodegenContext, CodegenOptions, ModuleMode, TargetLevel};
pub use error::{CodegenError, CompileError, ParseError};
pub use expression::{escape_selector, generate_expression, sanitize_identifier};
pub use handler::{generate_handler, GeneratedHandler, ListenerOptions};
pub use ids::HandlerIdAllocator;
pub use optimize::{optimize, LOOP_UNROLL_LIMIT};
pub use parser::{recognize, GrammarParser, SemanticParse, SemanticParser};
