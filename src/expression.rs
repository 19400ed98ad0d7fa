//! Expression code generator.
//!
//! Recursively translates one expression node into a JavaScript source-text
//! fragment. Dispatch is exhaustive over the node union; the two
//! non-expression kinds (`event`, `command`) fall back to literal
//! re-emission when they carry a bare value and are an
//! `UnknownExpressionType` error otherwise.
//!
//! Any branch that references a non-inlineable capability registers the
//! matching runtime helper in the shared context; registration is idempotent
//! per distinct helper name.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::analysis::is_id_selector;
use crate::ast::{MemberProperty, Node, Position};
use crate::context::CodegenContext;
use crate::error::CodegenError;

// ═══════════════════════════════════════════════════════════════════════════════
// STRING HYGIENE
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace every character outside `[A-Za-z0-9_$]` with `_`. Idempotent on
/// already-valid identifiers.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Escape a selector (or attribute name) for embedding in a single-quoted
/// JS string: backslash, both quote kinds, newline, and CR are escaped; NUL
/// bytes are dropped entirely.
pub fn escape_selector(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    for c in selector.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => {}
            other => out.push(other),
        }
    }
    out
}

fn escape_template_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEXT KEYWORDS & DOM PROPERTY ALLOWLIST
// ═══════════════════════════════════════════════════════════════════════════════

/// Context keyword → fixed runtime-context accessor. Returns None for plain
/// identifiers.
fn context_accessor(name: &str) -> Option<&'static str> {
    match name {
        "me" | "my" | "I" => Some("_ctx.me"),
        "you" | "your" | "yourself" => Some("_ctx.you"),
        "it" | "its" | "result" => Some("_ctx.result"),
        "event" => Some("_ctx.event"),
        "body" => Some("document.body"),
        "document" => Some("document"),
        "window" => Some("window"),
        "true" => Some("true"),
        "false" => Some("false"),
        "null" => Some("null"),
        "undefined" => Some("undefined"),
        _ => None,
    }
}

/// Keywords the analyzer records in the context variable table.
pub fn is_context_keyword(name: &str) -> bool {
    matches!(
        name,
        "me" | "my" | "I" | "you" | "your" | "yourself" | "it" | "its" | "result" | "event"
    )
}

lazy_static! {
    /// Common DOM property names a possessive resolves to direct dotted
    /// access. Anything outside this set goes through the `getProp` helper.
    pub static ref DOM_PROPERTY_ALLOWLIST: HashSet<&'static str> = {
        [
            "value",
            "textContent",
            "innerText",
            "innerHTML",
            "outerHTML",
            "classList",
            "className",
            "id",
            "style",
            "dataset",
            "children",
            "childNodes",
            "parentElement",
            "parentNode",
            "nextElementSibling",
            "previousElementSibling",
            "firstElementChild",
            "lastElementChild",
            "offsetWidth",
            "offsetHeight",
            "offsetTop",
            "offsetLeft",
            "offsetParent",
            "scrollTop",
            "scrollLeft",
            "scrollWidth",
            "scrollHeight",
            "clientWidth",
            "clientHeight",
            "checked",
            "disabled",
            "selected",
            "hidden",
            "length",
            "tagName",
            "name",
            "type",
            "href",
            "src",
            "title",
            "placeholder",
        ]
        .into_iter()
        .collect()
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Translate one expression node into a source-text fragment.
pub fn generate_expression(node: &Node, ctx: &mut CodegenContext) -> Result<String, CodegenError> {
    match node {
        Node::Literal(lit) => Ok(emit_literal(&lit.value)),
        Node::Identifier(id) => Ok(emit_identifier(&id.value, ctx)),
        Node::Selector(sel) => Ok(emit_selector(&sel.value, ctx)),
        Node::Variable(var) => Ok(emit_variable(var, ctx)),
        Node::Binary(bin) => emit_binary(bin, ctx),
        Node::Member(member) => emit_member(member, ctx),
        Node::Possessive(poss) => emit_possessive(poss, ctx),
        Node::Call(call) => {
            let callee = generate_expression(&call.callee, ctx)?;
            let args = generate_list(&call.args, ctx)?;
            Ok(format!("{}({})", callee, args))
        }
        Node::Positional(pos) => emit_positional(pos, ctx),
        Node::Array(arr) => {
            let elements = generate_list(&arr.elements, ctx)?;
            Ok(format!("[{}]", elements))
        }
        Node::Object(obj) => {
            let mut props = Vec::with_capacity(obj.properties.len());
            for prop in &obj.properties {
                let value = generate_expression(&prop.value, ctx)?;
                props.push(format!(
                    "{}: {}",
                    serde_json::Value::String(prop.key.clone()),
                    value
                ));
            }
            Ok(format!("{{ {} }}", props.join(", ")))
        }
        Node::Template(tpl) => {
            let mut out = String::from("`");
            for segment in &tpl.segments {
                match segment.literal_value() {
                    Some(serde_json::Value::String(text)) => {
                        out.push_str(&escape_template_text(text));
                    }
                    _ => {
                        let expr = generate_expression(segment, ctx)?;
                        out.push_str("${");
                        out.push_str(&expr);
                        out.push('}');
                    }
                }
            }
            out.push('`');
            Ok(out)
        }
        Node::Unary(un) => {
            let operand = generate_expression(&un.operand, ctx)?;
            let op = match un.operator.as_str() {
                "not" => "!",
                other => other,
            };
            if op.chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(format!("({} {})", op, operand))
            } else {
                Ok(format!("({}{})", op, operand))
            }
        }
        Node::Conditional(cond) => {
            let test = generate_expression(&cond.test, ctx)?;
            let consequent = generate_expression(&cond.consequent, ctx)?;
            let alternate = generate_expression(&cond.alternate, ctx)?;
            Ok(format!("({} ? {} : {})", test, consequent, alternate))
        }
        Node::Event(_) | Node::Command(_) => match node.literal_value() {
            Some(value) => Ok(emit_literal(value)),
            None => Err(CodegenError::UnknownExpressionType(
                node.type_name().to_string(),
            )),
        },
    }
}

fn generate_list(nodes: &[Node], ctx: &mut CodegenContext) -> Result<String, CodegenError> {
    let mut parts = Vec::with_capacity(nodes.len());
    for node in nodes {
        parts.push(generate_expression(node, ctx)?);
    }
    Ok(parts.join(", "))
}

fn emit_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        // serde_json produces the JSON escape form, which is valid JS.
        other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
    }
}

fn emit_identifier(value: &str, ctx: &mut CodegenContext) -> String {
    if let Some(accessor) = context_accessor(value) {
        return accessor.to_string();
    }
    if let Some(name) = value.strip_prefix("::") {
        ctx.require_helper("globals");
        return format!("globals.get('{}')", sanitize_identifier(name));
    }
    if let Some(name) = value.strip_prefix('$') {
        ctx.require_helper("globals");
        return format!("globals.get('{}')", sanitize_identifier(name));
    }
    if let Some(name) = value.strip_prefix(':') {
        return format!("_ctx.locals.get('{}')", sanitize_identifier(name));
    }
    sanitize_identifier(value)
}

fn emit_selector(value: &str, ctx: &mut CodegenContext) -> String {
    // Cache precedence: a cacheable selector always resolves to its cache
    // variable, even when it would qualify for the by-ID fast path.
    if let Some(var) = ctx.cached_selector(value) {
        return var.to_string();
    }
    if is_id_selector(value) {
        return format!("document.getElementById('{}')", escape_selector(&value[1..]));
    }
    format!("document.querySelector('{}')", escape_selector(value))
}

fn emit_variable(var: &crate::ast::VariableNode, ctx: &mut CodegenContext) -> String {
    let name = sanitize_identifier(var.name.trim_start_matches([':', '$']));
    match var.scope {
        crate::ast::VarScope::Local => format!("_ctx.locals.get('{}')", name),
        crate::ast::VarScope::Global => {
            ctx.require_helper("globals");
            format!("globals.get('{}')", name)
        }
        crate::ast::VarScope::Element => format!("_ctx.me.{}", name),
    }
}

fn emit_binary(
    bin: &crate::ast::BinaryNode,
    ctx: &mut CodegenContext,
) -> Result<String, CodegenError> {
    let op = bin.operator.as_str();

    // `has` with a `.class` selector right-hand side becomes a classList
    // membership check; the selector must not be emitted as a DOM query.
    if op == "has" {
        if let Node::Selector(sel) = bin.right.as_ref() {
            if let Some(class) = sel.value.strip_prefix('.') {
                let left = generate_expression(&bin.left, ctx)?;
                return Ok(format!(
                    "{}.classList.contains('{}')",
                    left,
                    escape_selector(class)
                ));
            }
        }
        let left = generate_expression(&bin.left, ctx)?;
        let right = generate_expression(&bin.right, ctx)?;
        ctx.require_helper("contains");
        return Ok(format!("contains({}, {})", left, right));
    }

    // Type checks keep the raw right-hand identifier for the typeof branch.
    if matches!(op, "is a" | "is an" | "is not a" | "is not an") {
        let left = generate_expression(&bin.left, ctx)?;
        let check = if let Node::Identifier(id) = bin.right.as_ref() {
            format!(
                "(typeof {} === \"{}\" || {} instanceof {})",
                left,
                id.value.to_lowercase(),
                left,
                sanitize_identifier(&id.value)
            )
        } else {
            let right = generate_expression(&bin.right, ctx)?;
            format!("({} instanceof {})", left, right)
        };
        return Ok(if op.starts_with("is not") {
            format!("!{}", check)
        } else {
            check
        });
    }

    let left = generate_expression(&bin.left, ctx)?;
    let right = generate_expression(&bin.right, ctx)?;

    Ok(match op {
        "is" | "==" => format!("({} === {})", left, right),
        "is not" | "!=" => format!("({} !== {})", left, right),
        "<" | "<=" | ">" | ">=" | "+" | "-" | "*" | "/" | "%" => {
            format!("({} {} {})", left, op, right)
        }
        "and" | "&&" => format!("({} && {})", left, right),
        "or" | "||" => format!("({} || {})", left, right),
        "contains" => {
            ctx.require_helper("contains");
            format!("contains({}, {})", left, right)
        }
        "matches" => {
            ctx.require_helper("matches");
            format!("matches({}, {})", left, right)
        }
        "starts with" => format!("String({}).startsWith({})", left, right),
        "ends with" => format!("String({}).endsWith({})", left, right),
        "&" => format!("(String({}) + String({}))", left, right),
        other => format!("{} {} {}", left, other, right),
    })
}

fn emit_property_access(object: &str, property: &str) -> Option<String> {
    if let Some(style_prop) = property.strip_prefix('*') {
        return Some(if style_prop.contains('-') {
            format!("{}.style['{}']", object, escape_selector(style_prop))
        } else {
            format!("{}.style.{}", object, sanitize_identifier(style_prop))
        });
    }
    if let Some(attr) = property.strip_prefix('@') {
        return Some(format!(
            "{}.getAttribute('{}')",
            object,
            escape_selector(attr)
        ));
    }
    None
}

fn emit_member(
    member: &crate::ast::MemberNode,
    ctx: &mut CodegenContext,
) -> Result<String, CodegenError> {
    let object = generate_expression(&member.object, ctx)?;

    match &member.property {
        MemberProperty::Expr(expr) => {
            let index = generate_expression(expr, ctx)?;
            Ok(format!("{}[{}]", object, index))
        }
        MemberProperty::Name(name) => {
            if let Some(special) = emit_property_access(&object, name) {
                return Ok(special);
            }
            if member.computed {
                Ok(format!("{}['{}']", object, escape_selector(name)))
            } else {
                Ok(format!("{}.{}", object, sanitize_identifier(name)))
            }
        }
    }
}

fn emit_possessive(
    poss: &crate::ast::PossessiveNode,
    ctx: &mut CodegenContext,
) -> Result<String, CodegenError> {
    let object = generate_expression(&poss.object, ctx)?;
    if let Some(special) = emit_property_access(&object, &poss.property) {
        return Ok(special);
    }
    if DOM_PROPERTY_ALLOWLIST.contains(poss.property.as_str()) {
        return Ok(format!("{}.{}", object, poss.property));
    }
    ctx.require_helper("getProp");
    Ok(format!(
        "getProp({}, '{}')",
        object,
        escape_selector(&poss.property)
    ))
}

fn emit_positional(
    pos: &crate::ast::PositionalNode,
    ctx: &mut CodegenContext,
) -> Result<String, CodegenError> {
    let selector_target = match pos.target.as_deref() {
        Some(Node::Selector(sel)) => Some(sel.value.clone()),
        _ => None,
    };

    match pos.position {
        Position::First => {
            if let Some(sel) = selector_target {
                Ok(format!(
                    "document.querySelector('{}')",
                    escape_selector(&sel)
                ))
            } else {
                ctx.require_helper("first");
                let target = positional_operand(pos, ctx)?;
                Ok(format!("first({})", target))
            }
        }
        Position::Last => {
            if let Some(sel) = selector_target {
                Ok(format!(
                    "Array.from(document.querySelectorAll('{}')).pop()",
                    escape_selector(&sel)
                ))
            } else {
                ctx.require_helper("last");
                let target = positional_operand(pos, ctx)?;
                Ok(format!("last({})", target))
            }
        }
        Position::Random => {
            ctx.require_helper("random");
            if let Some(sel) = selector_target {
                Ok(format!(
                    "random(Array.from(document.querySelectorAll('{}')))",
                    escape_selector(&sel)
                ))
            } else {
                let target = positional_operand(pos, ctx)?;
                Ok(format!("random({})", target))
            }
        }
        Position::Next => Ok("_ctx.me.nextElementSibling".to_string()),
        Position::Previous => Ok("_ctx.me.previousElementSibling".to_string()),
        Position::Parent => Ok("_ctx.me.parentElement".to_string()),
        Position::Closest => {
            if let Some(sel) = selector_target {
                Ok(format!("_ctx.me.closest('{}')", escape_selector(&sel)))
            } else {
                Ok("_ctx.me.parentElement".to_string())
            }
        }
    }
}

fn positional_operand(
    pos: &crate::ast::PositionalNode,
    ctx: &mut CodegenContext,
) -> Result<String, CodegenError> {
    match &pos.target {
        Some(target) => generate_expression(target, ctx),
        None => Ok("_ctx.result".to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryNode, VarScope, VariableNode};
    use crate::context::CodegenOptions;

    fn ctx() -> CodegenContext {
        CodegenContext::new(CodegenOptions::default())
    }

    fn gen(node: &Node) -> String {
        generate_expression(node, &mut ctx()).unwrap()
    }

    #[test]
    fn test_sanitize_identifier_is_idempotent() {
        assert_eq!(sanitize_identifier("already_valid$1"), "already_valid$1");
        assert_eq!(sanitize_identifier("foo-bar baz"), "foo_bar_baz");
        assert_eq!(
            sanitize_identifier(&sanitize_identifier("foo-bar baz")),
            "foo_bar_baz"
        );
    }

    #[test]
    fn test_escape_selector_safety() {
        let nasty = "div\\:hover'\"\n\r\0end";
        let escaped = escape_selector(nasty);
        assert_eq!(escaped, "div\\\\:hover\\'\\\"\\n\\rend");
        assert!(!escaped.contains('\0'));
    }

    #[test]
    fn test_literals() {
        assert_eq!(gen(&Node::literal(serde_json::Value::Null)), "null");
        assert_eq!(gen(&Node::literal(true)), "true");
        assert_eq!(gen(&Node::literal(42)), "42");
        assert_eq!(gen(&Node::literal("say \"hi\"")), r#""say \"hi\"""#);
    }

    #[test]
    fn test_context_identifiers() {
        assert_eq!(gen(&Node::identifier("me")), "_ctx.me");
        assert_eq!(gen(&Node::identifier("you")), "_ctx.you");
        assert_eq!(gen(&Node::identifier("result")), "_ctx.result");
        assert_eq!(gen(&Node::identifier("event")), "_ctx.event");
        assert_eq!(gen(&Node::identifier("body")), "document.body");
        assert_eq!(gen(&Node::identifier("undefined")), "undefined");
    }

    #[test]
    fn test_prefixed_identifiers() {
        assert_eq!(
            gen(&Node::identifier(":count")),
            "_ctx.locals.get('count')"
        );
        let mut c = ctx();
        let out = generate_expression(&Node::identifier("$theme"), &mut c).unwrap();
        assert_eq!(out, "globals.get('theme')");
        assert!(c.helpers().contains("globals"));
        let out = generate_expression(&Node::identifier("::theme"), &mut c).unwrap();
        assert_eq!(out, "globals.get('theme')");
    }

    #[test]
    fn test_selector_id_fast_path() {
        assert_eq!(
            gen(&Node::selector("#myId")),
            "document.getElementById('myId')"
        );
        assert_eq!(
            gen(&Node::selector(".active")),
            "document.querySelector('.active')"
        );
    }

    #[test]
    fn test_variable_scopes() {
        let local = Node::Variable(VariableNode {
            name: ":count".to_string(),
            scope: VarScope::Local,
            location: None,
        });
        assert_eq!(gen(&local), "_ctx.locals.get('count')");

        let element = Node::Variable(VariableNode {
            name: "open".to_string(),
            scope: VarScope::Element,
            location: None,
        });
        assert_eq!(gen(&element), "_ctx.me.open");
    }

    #[test]
    fn test_binary_has_classlist() {
        let node = Node::Binary(BinaryNode {
            operator: "has".to_string(),
            left: Box::new(Node::identifier("me")),
            right: Box::new(Node::selector(".active")),
        });
        assert_eq!(gen(&node), "_ctx.me.classList.contains('active')");
    }

    #[test]
    fn test_binary_operators() {
        let is = Node::Binary(BinaryNode {
            operator: "is".to_string(),
            left: Box::new(Node::literal(1)),
            right: Box::new(Node::literal(2)),
        });
        assert_eq!(gen(&is), "(1 === 2)");

        let concat = Node::Binary(BinaryNode {
            operator: "&".to_string(),
            left: Box::new(Node::literal("a")),
            right: Box::new(Node::literal("b")),
        });
        assert_eq!(gen(&concat), "(String(\"a\") + String(\"b\"))");

        let unknown = Node::Binary(BinaryNode {
            operator: "<=>".to_string(),
            left: Box::new(Node::literal(1)),
            right: Box::new(Node::literal(2)),
        });
        assert_eq!(gen(&unknown), "1 <=> 2");
    }

    #[test]
    fn test_binary_contains_registers_helper_once() {
        let mut c = ctx();
        for _ in 0..3 {
            let node = Node::Binary(BinaryNode {
                operator: "contains".to_string(),
                left: Box::new(Node::identifier("me")),
                right: Box::new(Node::literal("x")),
            });
            generate_expression(&node, &mut c).unwrap();
        }
        assert_eq!(
            c.helpers().iter().filter(|h| h.as_str() == "contains").count(),
            1
        );
    }

    #[test]
    fn test_is_a_type_check() {
        let node = Node::Binary(BinaryNode {
            operator: "is a".to_string(),
            left: Box::new(Node::identifier("result")),
            right: Box::new(Node::identifier("Number")),
        });
        assert_eq!(
            gen(&node),
            "(typeof _ctx.result === \"number\" || _ctx.result instanceof Number)"
        );

        let negated = Node::Binary(BinaryNode {
            operator: "is not a".to_string(),
            left: Box::new(Node::identifier("result")),
            right: Box::new(Node::identifier("String")),
        });
        assert!(gen(&negated).starts_with('!'));
    }

    #[test]
    fn test_member_style_attr_and_computed() {
        let style = Node::Member(crate::ast::MemberNode {
            object: Box::new(Node::identifier("me")),
            property: MemberProperty::Name("*background-color".to_string()),
            computed: false,
        });
        assert_eq!(gen(&style), "_ctx.me.style['background-color']");

        let attr = Node::Member(crate::ast::MemberNode {
            object: Box::new(Node::identifier("me")),
            property: MemberProperty::Name("@data-id".to_string()),
            computed: false,
        });
        assert_eq!(gen(&attr), "_ctx.me.getAttribute('data-id')");

        let computed = Node::Member(crate::ast::MemberNode {
            object: Box::new(Node::identifier("me")),
            property: MemberProperty::Expr(Box::new(Node::literal(0))),
            computed: true,
        });
        assert_eq!(gen(&computed), "_ctx.me[0]");
    }

    #[test]
    fn test_possessive_allowlist_vs_helper() {
        let allowed = Node::Possessive(crate::ast::PossessiveNode {
            object: Box::new(Node::identifier("me")),
            property: "textContent".to_string(),
        });
        assert_eq!(gen(&allowed), "_ctx.me.textContent");

        let mut c = ctx();
        let exotic = Node::Possessive(crate::ast::PossessiveNode {
            object: Box::new(Node::identifier("me")),
            property: "weirdProp".to_string(),
        });
        assert_eq!(
            generate_expression(&exotic, &mut c).unwrap(),
            "getProp(_ctx.me, 'weirdProp')"
        );
        assert!(c.helpers().contains("getProp"));
    }

    #[test]
    fn test_call_on_member() {
        let node = Node::Call(crate::ast::CallNode {
            callee: Box::new(Node::Member(crate::ast::MemberNode {
                object: Box::new(Node::identifier("me")),
                property: MemberProperty::Name("focus".to_string()),
                computed: false,
            })),
            args: vec![],
        });
        assert_eq!(gen(&node), "_ctx.me.focus()");
    }

    #[test]
    fn test_positionals() {
        let first = Node::Positional(crate::ast::PositionalNode {
            position: Position::First,
            target: Some(Box::new(Node::selector(".item"))),
        });
        assert_eq!(gen(&first), "document.querySelector('.item')");

        let last = Node::Positional(crate::ast::PositionalNode {
            position: Position::Last,
            target: Some(Box::new(Node::selector(".item"))),
        });
        assert_eq!(
            gen(&last),
            "Array.from(document.querySelectorAll('.item')).pop()"
        );

        let mut c = ctx();
        let random = Node::Positional(crate::ast::PositionalNode {
            position: Position::Random,
            target: None,
        });
        assert_eq!(
            generate_expression(&random, &mut c).unwrap(),
            "random(_ctx.result)"
        );
        assert!(c.helpers().contains("random"));

        let next = Node::Positional(crate::ast::PositionalNode {
            position: Position::Next,
            target: None,
        });
        assert_eq!(gen(&next), "_ctx.me.nextElementSibling");

        let closest = Node::Positional(crate::ast::PositionalNode {
            position: Position::Closest,
            target: Some(Box::new(Node::selector("form"))),
        });
        assert_eq!(gen(&closest), "_ctx.me.closest('form')");
    }

    #[test]
    fn test_template_escaping() {
        let tpl = Node::Template(crate::ast::TemplateNode {
            segments: vec![
                Node::literal("total `${}` is "),
                Node::identifier(":count"),
            ],
        });
        assert_eq!(
            gen(&tpl),
            "`total \\`\\${}\\` is ${_ctx.locals.get('count')}`"
        );
    }

    #[test]
    fn test_cache_precedence_over_id_lookup() {
        let analysis = crate::analysis::analyze(&Node::Event(crate::ast::EventNode {
            event: "click".to_string(),
            modifiers: vec![],
            body: vec![
                Node::Command(crate::ast::CommandNode {
                    name: "toggle".to_string(),
                    args: vec![],
                    target: Some(Box::new(Node::selector("#panel"))),
                    modifiers: Default::default(),
                    body: vec![],
                    location: None,
                }),
                Node::Command(crate::ast::CommandNode {
                    name: "add".to_string(),
                    args: vec![],
                    target: Some(Box::new(Node::selector("#panel"))),
                    modifiers: Default::default(),
                    body: vec![],
                    location: None,
                }),
            ],
            target: None,
            location: None,
        }));
        let mut c = CodegenContext::for_script(CodegenOptions::default(), &analysis);
        let out = generate_expression(&Node::selector("#panel"), &mut c).unwrap();
        assert_eq!(out, "_sel_0");
    }

    #[test]
    fn test_unknown_expression_type() {
        let cmd = Node::Command(crate::ast::CommandNode {
            name: "toggle".to_string(),
            args: vec![],
            target: None,
            modifiers: Default::default(),
            body: vec![],
            location: None,
        });
        let err = generate_expression(&cmd, &mut ctx()).unwrap_err();
        assert!(matches!(err, CodegenError::UnknownExpressionType(t) if t == "command"));
    }
}
