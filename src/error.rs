//! Error taxonomy for the compilation core.
//!
//! Parse-stage failures are demoted to fallback records by the orchestrator;
//! codegen-stage failures are surfaced as `CodegenError` and, by policy,
//! demoted the same way at the batch level (see DESIGN.md).

use thiserror::Error;

/// Failure of one parser strategy. The orchestrator swallows these into a
/// debug log and moves on to the next strategy in the chain.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("parse error: {0}")]
    Syntax(String),

    #[error("language '{0}' is not supported by this parser")]
    UnsupportedLanguage(String),

    #[error("semantic parse confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence { confidence: f64, threshold: f64 },
}

/// Failure inside the code generators.
#[derive(Debug, Clone, Error)]
pub enum CodegenError {
    /// A node kind the expression generator does not recognize and that
    /// carries no literal `value` to fall back to.
    #[error("unknown expression type '{0}'")]
    UnknownExpressionType(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid assignment target '{0}'")]
    InvalidAssignmentTarget(String),
}

/// Top-level compilation failure.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("no parser strategy produced an AST")]
    ParseFailure,

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}
