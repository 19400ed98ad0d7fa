//! AST data model for the lokascript compilation core.
//!
//! Scanners and grammar parsers hand the compiler a tagged-union node tree
//! serialized with a `type` discriminant. The union is closed: every stage
//! downstream matches exhaustively, so a new node kind is a compile error in
//! each stage rather than a silent fall-through.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LOCATIONS & SCANNER INPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// One raw DSL snippet as extracted by a scanning collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInput {
    pub code: String,
    #[serde(default)]
    pub location: SourceLocation,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub element_selector: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub attribute_name: Option<String>,
}

impl ScriptInput {
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            location: SourceLocation::default(),
            element_id: None,
            element_selector: None,
            language: None,
            attribute_name: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE UNION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Event(EventNode),
    Command(CommandNode),
    Literal(LiteralNode),
    Identifier(IdentifierNode),
    Selector(SelectorNode),
    Variable(VariableNode),
    Binary(BinaryNode),
    Member(MemberNode),
    Possessive(PossessiveNode),
    Call(CallNode),
    Positional(PositionalNode),
    Array(ArrayNode),
    Object(ObjectNode),
    Template(TemplateNode),
    Unary(UnaryNode),
    Conditional(ConditionalNode),
}

impl Node {
    /// Stable tag name, matching the serialized `type` discriminant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Event(_) => "event",
            Node::Command(_) => "command",
            Node::Literal(_) => "literal",
            Node::Identifier(_) => "identifier",
            Node::Selector(_) => "selector",
            Node::Variable(_) => "variable",
            Node::Binary(_) => "binary",
            Node::Member(_) => "member",
            Node::Possessive(_) => "possessive",
            Node::Call(_) => "call",
            Node::Positional(_) => "positional",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
            Node::Template(_) => "template",
            Node::Unary(_) => "unary",
            Node::Conditional(_) => "conditional",
        }
    }

    /// The bare literal payload, if this node carries one. Non-expression
    /// nodes reaching the expression generator fall back to this before the
    /// unknown-type error fires.
    pub fn literal_value(&self) -> Option<&serde_json::Value> {
        match self {
            Node::Literal(lit) => Some(&lit.value),
            _ => None,
        }
    }

    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Node::Literal(LiteralNode {
            value: value.into(),
        })
    }

    pub fn identifier(value: impl Into<String>) -> Self {
        Node::Identifier(IdentifierNode {
            value: value.into(),
            location: None,
        })
    }

    pub fn selector(value: impl Into<String>) -> Self {
        Node::Selector(SelectorNode {
            value: value.into(),
            location: None,
        })
    }
}

/// Top-level handler: one DOM event (or several, `" or "`-separated) plus a
/// command body and an optional delegation target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNode {
    pub event: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub body: Vec<Node>,
    #[serde(default)]
    pub target: Option<Box<Node>>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

impl EventNode {
    /// Declared DOM event names. `on click or touchstart` binds both.
    pub fn event_names(&self) -> Vec<String> {
        self.event
            .split(" or ")
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandNode {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Node>,
    #[serde(default)]
    pub target: Option<Box<Node>>,
    #[serde(default)]
    pub modifiers: HashMap<String, serde_json::Value>,
    /// Nested statements for block commands (`repeat`, `if`).
    #[serde(default)]
    pub body: Vec<Node>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteralNode {
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierNode {
    pub value: String,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorNode {
    pub value: String,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarScope {
    Local,
    Global,
    Element,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableNode {
    pub name: String,
    pub scope: VarScope,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryNode {
    pub operator: String,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

/// `member.property` is `string | node` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberProperty {
    Name(String),
    Expr(Box<Node>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberNode {
    pub object: Box<Node>,
    pub property: MemberProperty,
    #[serde(default)]
    pub computed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PossessiveNode {
    pub object: Box<Node>,
    pub property: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNode {
    pub callee: Box<Node>,
    #[serde(default)]
    pub args: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    First,
    Last,
    Next,
    Previous,
    Closest,
    Parent,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionalNode {
    pub position: Position,
    #[serde(default)]
    pub target: Option<Box<Node>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayNode {
    #[serde(default)]
    pub elements: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProperty {
    pub key: String,
    pub value: Node,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectNode {
    #[serde(default)]
    pub properties: Vec<ObjectProperty>,
}

/// Template string. String-literal segments inline as raw text; any other
/// segment is substituted as an embedded expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateNode {
    #[serde(default)]
    pub segments: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnaryNode {
    pub operator: String,
    pub operand: Box<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalNode {
    pub test: Box<Node>,
    pub consequent: Box<Node>,
    pub alternate: Box<Node>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT MODIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventModifier {
    PreventDefault,
    StopPropagation,
    Once,
    Passive,
    Capture,
    Debounce(u32),
    Throttle(u32),
}

impl EventModifier {
    /// Parse one modifier token from its attribute form. Accepts both
    /// `debounce(300)` and `debounce:300` for the timed modifiers.
    pub fn parse(raw: &str) -> Option<EventModifier> {
        let raw = raw.trim();
        match raw {
            "prevent" | "prevent-default" | "preventDefault" => {
                return Some(EventModifier::PreventDefault)
            }
            "stop" | "stop-propagation" | "stopPropagation" => {
                return Some(EventModifier::StopPropagation)
            }
            "once" => return Some(EventModifier::Once),
            "passive" => return Some(EventModifier::Passive),
            "capture" => return Some(EventModifier::Capture),
            _ => {}
        }

        let (name, arg) = if let Some(open) = raw.find('(') {
            let close = raw.rfind(')')?;
            if close <= open {
                return None;
            }
            (&raw[..open], &raw[open + 1..close])
        } else if let Some(colon) = raw.find(':') {
            (&raw[..colon], &raw[colon + 1..])
        } else {
            return None;
        };

        let ms: u32 = arg.trim().parse().ok()?;
        match name {
            "debounce" => Some(EventModifier::Debounce(ms)),
            "throttle" => Some(EventModifier::Throttle(ms)),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
