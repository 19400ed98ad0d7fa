//! Parser strategies.
//!
//! The orchestrator tries strategies in order: an optional multilingual
//! semantic parser (gated by a confidence threshold), an optional
//! general-purpose grammar parser, and finally the built-in recognizer
//! below. Strategies are constructor-injected trait objects; the compiler
//! holds no global parser state.
//!
//! The built-in recognizer matches only a handful of literal command shapes
//! so the pipeline stays exercisable without a full grammar attached.

use lazy_static::lazy_static;
use regex::Regex;

use crate::ast::{CommandNode, EventNode, Node};
use crate::error::ParseError;

// ═══════════════════════════════════════════════════════════════════════════════
// STRATEGY TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// General-purpose grammar parser for the default language.
pub trait GrammarParser {
    fn name(&self) -> &'static str {
        "grammar"
    }

    fn parse(&self, source: &str) -> Result<Node, ParseError>;
}

/// A semantic parse carries the parser's confidence in its reading.
#[derive(Debug, Clone)]
pub struct SemanticParse {
    pub node: Node,
    pub confidence: f64,
}

/// Multilingual pattern-matching parser. Only consulted for languages it
/// claims to support; its result is only accepted above the configured
/// confidence threshold.
pub trait SemanticParser {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn supports_language(&self, language: &str) -> bool;

    fn parse(&self, source: &str, language: &str) -> Result<SemanticParse, ParseError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILT-IN RECOGNIZER
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref CLASS_COMMAND_RE: Regex = Regex::new(
        r"^(toggle|add|remove)\s+(\.[A-Za-z][\w-]*)(?:\s+on\s+(\S+))?$"
    )
    .unwrap();
    static ref VISIBILITY_COMMAND_RE: Regex =
        Regex::new(r"^(show|hide)(?:\s+(\S+))?$").unwrap();
}

pub const BUILTIN_PARSER_NAME: &str = "builtin";

fn target_node(token: &str) -> Node {
    match token {
        "me" | "my" | "it" | "result" | "body" | "document" | "window" => Node::identifier(token),
        _ => Node::selector(token),
    }
}

fn recognize_command(source: &str) -> Option<Node> {
    let source = source.trim();

    if let Some(caps) = CLASS_COMMAND_RE.captures(source) {
        let name = caps.get(1).map(|m| m.as_str())?;
        let class = caps.get(2).map(|m| m.as_str())?;
        let target = caps.get(3).map(|m| target_node(m.as_str()));
        return Some(Node::Command(CommandNode {
            name: name.to_string(),
            args: vec![Node::selector(class)],
            target: target.map(Box::new),
            modifiers: Default::default(),
            body: vec![],
            location: None,
        }));
    }

    if let Some(caps) = VISIBILITY_COMMAND_RE.captures(source) {
        let name = caps.get(1).map(|m| m.as_str())?;
        let target = caps.get(2).map(|m| target_node(m.as_str()));
        return Some(Node::Command(CommandNode {
            name: name.to_string(),
            args: vec![],
            target: target.map(Box::new),
            modifiers: Default::default(),
            body: vec![],
            location: None,
        }));
    }

    None
}

/// Match one of the literal built-in shapes, or nothing.
pub fn recognize(source: &str) -> Option<Node> {
    let source = source.trim();

    if let Some(rest) = source.strip_prefix("on ") {
        let rest = rest.trim_start();
        let (event_spec, command_text) = rest.split_once(char::is_whitespace)?;
        let mut parts = event_spec.split('.');
        let event = parts.next()?.to_string();
        if event.is_empty() {
            return None;
        }
        let modifiers: Vec<String> = parts.map(str::to_string).collect();
        let command = recognize_command(command_text)?;
        return Some(Node::Event(EventNode {
            event,
            modifiers,
            body: vec![command],
            target: None,
            location: None,
        }));
    }

    recognize_command(source)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
