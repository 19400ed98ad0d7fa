//! Event-handler code generator.
//!
//! Turns one normalized `event` AST plus its analysis into a handler
//! function body, applying the declared modifiers and lowering each body
//! command to a statement. Required runtime helpers accumulate in the
//! shared codegen context.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::ScriptAnalysis;
use crate::ast::{CommandNode, EventModifier, EventNode, MemberProperty, Node};
use crate::context::CodegenContext;
use crate::error::CodegenError;
use crate::expression::{escape_selector, generate_expression, sanitize_identifier};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Listener registration options carried to the binding block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerOptions {
    pub once: bool,
    pub passive: bool,
    pub capture: bool,
}

impl ListenerOptions {
    pub fn is_default(&self) -> bool {
        *self == ListenerOptions::default()
    }

    /// Options-object literal for `addEventListener`, or None when every
    /// flag is off.
    pub fn to_js(&self) -> Option<String> {
        if self.is_default() {
            return None;
        }
        let mut flags = Vec::new();
        if self.once {
            flags.push("once: true");
        }
        if self.passive {
            flags.push("passive: true");
        }
        if self.capture {
            flags.push("capture: true");
        }
        Some(format!("{{ {} }}", flags.join(", ")))
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedHandler {
    /// Complete function (or wrapped const) definition text.
    pub body: String,
    pub is_async: bool,
    pub listener_options: ListenerOptions,
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLER GENERATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn generate_handler(
    event: &EventNode,
    handler_id: &str,
    analysis: &ScriptAnalysis,
    ctx: &mut CodegenContext,
) -> Result<GeneratedHandler, CodegenError> {
    ctx.require_helper("context");

    let mut listener_options = ListenerOptions::default();
    let mut prologue: Vec<String> = Vec::new();
    let mut debounce_ms: Option<u32> = None;
    let mut throttle_ms: Option<u32> = None;

    for raw in &event.modifiers {
        match EventModifier::parse(raw) {
            Some(EventModifier::PreventDefault) => {
                prologue.push("event.preventDefault();".to_string())
            }
            Some(EventModifier::StopPropagation) => {
                prologue.push("event.stopPropagation();".to_string())
            }
            Some(EventModifier::Once) => listener_options.once = true,
            Some(EventModifier::Passive) => listener_options.passive = true,
            Some(EventModifier::Capture) => listener_options.capture = true,
            Some(EventModifier::Debounce(ms)) => debounce_ms = Some(ms),
            Some(EventModifier::Throttle(ms)) => throttle_ms = Some(ms),
            None => warn!(modifier = raw.as_str(), "ignoring unknown event modifier"),
        }
    }

    let mut state = LowerState {
        is_async: analysis.flags.has_async,
    };

    let mut statements = vec!["const _ctx = context(event);".to_string()];
    statements.extend(prologue);

    let cache_declarations: Vec<String> = ctx
        .cache_entries()
        .map(|(selector, var)| {
            format!(
                "const {} = document.querySelector('{}');",
                var,
                escape_selector(selector)
            )
        })
        .collect();
    statements.extend(cache_declarations);

    for command in &event.body {
        statements.extend(lower_statement(command, ctx, &mut state)?);
    }

    let async_prefix = if state.is_async { "async " } else { "" };
    let inner = indent_lines(&statements, 1);

    let body = if let Some(ms) = debounce_ms {
        ctx.require_helper("debounce");
        format!(
            "const {} = debounce({}function (event) {{\n{}\n}}, {});",
            handler_id, async_prefix, inner, ms
        )
    } else if let Some(ms) = throttle_ms {
        ctx.require_helper("throttle");
        format!(
            "const {} = throttle({}function (event) {{\n{}\n}}, {});",
            handler_id, async_prefix, inner, ms
        )
    } else {
        format!(
            "{}function {}(event) {{\n{}\n}}",
            async_prefix, handler_id, inner
        )
    };

    Ok(GeneratedHandler {
        body,
        is_async: state.is_async,
        listener_options,
    })
}

fn indent_lines(lines: &[String], level: usize) -> String {
    let pad = "  ".repeat(level);
    lines
        .iter()
        .flat_map(|stmt| stmt.lines())
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

struct LowerState {
    is_async: bool,
}

fn lower_statement(
    node: &Node,
    ctx: &mut CodegenContext,
    state: &mut LowerState,
) -> Result<Vec<String>, CodegenError> {
    match node {
        Node::Command(cmd) => lower_command(cmd, ctx, state),
        // A bare expression in statement position evaluates for its side
        // effect and feeds the last-result slot.
        other => {
            let expr = generate_expression(other, ctx)?;
            Ok(vec![format!("_ctx.result = {};", expr)])
        }
    }
}

fn target_or_me(cmd: &CommandNode, ctx: &mut CodegenContext) -> Result<String, CodegenError> {
    match &cmd.target {
        Some(target) => generate_expression(target, ctx),
        None => Ok("_ctx.me".to_string()),
    }
}

/// `.class` selectors (and string literals of the same shape) used as class
/// arguments.
fn class_name(node: &Node) -> Option<String> {
    let raw = match node {
        Node::Selector(sel) => sel.value.clone(),
        Node::Literal(lit) => lit.value.as_str()?.to_string(),
        _ => return None,
    };
    let class = raw.strip_prefix('.').unwrap_or(&raw);
    if class.is_empty() || class.contains([' ', '.', '#']) {
        return None;
    }
    Some(class.to_string())
}

fn lower_class_command(
    cmd: &CommandNode,
    method: &str,
    ctx: &mut CodegenContext,
) -> Result<Vec<String>, CodegenError> {
    // `toggle .active on #panel` carries the class in args and the element
    // in target; bare `toggle .active` carries the class as the target.
    if let Some(class) = cmd.args.first().and_then(class_name) {
        let element = target_or_me(cmd, ctx)?;
        return Ok(vec![format!(
            "{}.classList.{}('{}');",
            element,
            method,
            escape_selector(&class)
        )]);
    }
    if let Some(class) = cmd.target.as_deref().and_then(class_name) {
        return Ok(vec![format!(
            "_ctx.me.classList.{}('{}');",
            method,
            escape_selector(&class)
        )]);
    }
    if let Some(arg) = cmd.args.first() {
        let class_expr = generate_expression(arg, ctx)?;
        let element = target_or_me(cmd, ctx)?;
        return Ok(vec![format!(
            "{}.classList.{}({});",
            element, method, class_expr
        )]);
    }
    Err(CodegenError::InvalidAssignmentTarget(cmd.name.clone()))
}

/// Assignment targets need the write form of the accessor: `@attr` becomes
/// `setAttribute`, not `getAttribute`.
fn lower_assignment(
    target: &Node,
    value: &str,
    ctx: &mut CodegenContext,
) -> Result<String, CodegenError> {
    match target {
        Node::Variable(var) => Ok(match var.scope {
            crate::ast::VarScope::Local => format!(
                "_ctx.locals.set('{}', {});",
                sanitize_identifier(var.name.trim_start_matches([':', '$'])),
                value
            ),
            crate::ast::VarScope::Global => {
                ctx.require_helper("globals");
                format!(
                    "globals.set('{}', {});",
                    sanitize_identifier(var.name.trim_start_matches([':', '$'])),
                    value
                )
            }
            crate::ast::VarScope::Element => format!(
                "_ctx.me.{} = {};",
                sanitize_identifier(&var.name),
                value
            ),
        }),
        Node::Identifier(id) => {
            if let Some(name) = id.value.strip_prefix("::") {
                ctx.require_helper("globals");
                return Ok(format!(
                    "globals.set('{}', {});",
                    sanitize_identifier(name),
                    value
                ));
            }
            if let Some(name) = id.value.strip_prefix('$') {
                ctx.require_helper("globals");
                return Ok(format!(
                    "globals.set('{}', {});",
                    sanitize_identifier(name),
                    value
                ));
            }
            let name = id.value.strip_prefix(':').unwrap_or(&id.value);
            Ok(format!(
                "_ctx.locals.set('{}', {});",
                sanitize_identifier(name),
                value
            ))
        }
        Node::Member(member) => {
            let object = generate_expression(&member.object, ctx)?;
            match &member.property {
                MemberProperty::Name(name) => Ok(write_property(&object, name, value)),
                MemberProperty::Expr(expr) => {
                    let index = generate_expression(expr, ctx)?;
                    Ok(format!("{}[{}] = {};", object, index, value))
                }
            }
        }
        Node::Possessive(poss) => {
            let object = generate_expression(&poss.object, ctx)?;
            Ok(write_property(&object, &poss.property, value))
        }
        other => Err(CodegenError::InvalidAssignmentTarget(
            other.type_name().to_string(),
        )),
    }
}

fn write_property(object: &str, property: &str, value: &str) -> String {
    if let Some(style_prop) = property.strip_prefix('*') {
        if style_prop.contains('-') {
            return format!("{}.style['{}'] = {};", object, escape_selector(style_prop), value);
        }
        return format!(
            "{}.style.{} = {};",
            object,
            sanitize_identifier(style_prop),
            value
        );
    }
    if let Some(attr) = property.strip_prefix('@') {
        return format!(
            "{}.setAttribute('{}', {});",
            object,
            escape_selector(attr),
            value
        );
    }
    format!("{}.{} = {};", object, sanitize_identifier(property), value)
}

/// Read form of an assignable accessor, for compound updates.
fn read_accessor(target: &Node, ctx: &mut CodegenContext) -> Result<String, CodegenError> {
    generate_expression(target, ctx)
}

fn event_name_of(node: &Node) -> Option<String> {
    match node {
        Node::Identifier(id) => Some(id.value.clone()),
        Node::Literal(lit) => lit.value.as_str().map(str::to_string),
        _ => None,
    }
}

fn lower_command(
    cmd: &CommandNode,
    ctx: &mut CodegenContext,
    state: &mut LowerState,
) -> Result<Vec<String>, CodegenError> {
    match cmd.name.as_str() {
        "toggle" => lower_class_command(cmd, "toggle", ctx),
        "add" => lower_class_command(cmd, "add", ctx),
        "remove" => {
            // `remove .cls` strips a class; `remove #el` removes the element.
            if cmd.args.first().and_then(class_name).is_some()
                || cmd.target.as_deref().and_then(class_name).is_some()
            {
                lower_class_command(cmd, "remove", ctx)
            } else {
                let element = target_or_me(cmd, ctx)?;
                Ok(vec![format!("{}.remove();", element)])
            }
        }
        "show" => {
            let element = target_or_me(cmd, ctx)?;
            Ok(vec![format!("{}.style.display = '';", element)])
        }
        "hide" => {
            let element = target_or_me(cmd, ctx)?;
            Ok(vec![format!("{}.style.display = 'none';", element)])
        }
        "set" => {
            let target = cmd
                .target
                .as_deref()
                .ok_or_else(|| CodegenError::InvalidAssignmentTarget("set".to_string()))?;
            let value = match cmd.args.first() {
                Some(arg) => generate_expression(arg, ctx)?,
                None => "null".to_string(),
            };
            Ok(vec![lower_assignment(target, &value, ctx)?])
        }
        "put" => {
            let value = match cmd.args.first() {
                Some(arg) => generate_expression(arg, ctx)?,
                None => "_ctx.result".to_string(),
            };
            let target = cmd
                .target
                .as_deref()
                .ok_or_else(|| CodegenError::InvalidAssignmentTarget("put".to_string()))?;
            match target {
                Node::Member(_) | Node::Possessive(_) | Node::Variable(_) | Node::Identifier(_) => {
                    Ok(vec![lower_assignment(target, &value, ctx)?])
                }
                other => {
                    let element = generate_expression(other, ctx)?;
                    let position = cmd
                        .modifiers
                        .get("position")
                        .and_then(|v| v.as_str())
                        .unwrap_or("into");
                    Ok(vec![match position {
                        "before" => format!(
                            "{}.insertAdjacentHTML('beforebegin', {});",
                            element, value
                        ),
                        "after" => {
                            format!("{}.insertAdjacentHTML('afterend', {});", element, value)
                        }
                        "start" => {
                            format!("{}.insertAdjacentHTML('afterbegin', {});", element, value)
                        }
                        "end" => {
                            format!("{}.insertAdjacentHTML('beforeend', {});", element, value)
                        }
                        _ => format!("{}.innerHTML = {};", element, value),
                    }])
                }
            }
        }
        "append" => {
            let value = match cmd.args.first() {
                Some(arg) => generate_expression(arg, ctx)?,
                None => "_ctx.result".to_string(),
            };
            let element = target_or_me(cmd, ctx)?;
            Ok(vec![format!("{}.append({});", element, value)])
        }
        "log" => {
            let mut parts = Vec::with_capacity(cmd.args.len().max(1));
            for arg in &cmd.args {
                parts.push(generate_expression(arg, ctx)?);
            }
            if let Some(target) = &cmd.target {
                parts.push(generate_expression(target, ctx)?);
            }
            if parts.is_empty() {
                parts.push("_ctx.result".to_string());
            }
            Ok(vec![format!("console.log({});", parts.join(", "))])
        }
        "send" | "trigger" => {
            let name_expr = match cmd.args.first() {
                Some(node) => match event_name_of(node) {
                    Some(name) => format!("'{}'", escape_selector(&name)),
                    None => generate_expression(node, ctx)?,
                },
                None => return Err(CodegenError::UnknownCommand(cmd.name.clone())),
            };
            let element = target_or_me(cmd, ctx)?;
            Ok(vec![format!(
                "{}.dispatchEvent(new CustomEvent({}, {{ bubbles: true }}));",
                element, name_expr
            )])
        }
        "wait" => {
            state.is_async = true;
            ctx.require_helper("wait");
            let duration = match cmd.args.first() {
                Some(arg) => generate_expression(arg, ctx)?,
                None => "0".to_string(),
            };
            Ok(vec![format!("await wait({});", duration)])
        }
        "increment" | "decrement" => {
            let op = if cmd.name == "increment" { "+" } else { "-" };
            let target = cmd
                .target
                .as_deref()
                .ok_or_else(|| CodegenError::InvalidAssignmentTarget(cmd.name.clone()))?;
            let amount = match cmd.args.first() {
                Some(arg) => generate_expression(arg, ctx)?,
                None => "1".to_string(),
            };
            let current = read_accessor(target, ctx)?;
            let update = format!("(({} || 0) {} {})", current, op, amount);
            Ok(vec![lower_assignment(target, &update, ctx)?])
        }
        "call" | "get" => {
            let expr = match cmd.args.first().or(cmd.target.as_deref()) {
                Some(node) => generate_expression(node, ctx)?,
                None => return Err(CodegenError::UnknownCommand(cmd.name.clone())),
            };
            Ok(vec![format!("_ctx.result = {};", expr)])
        }
        "focus" => {
            let element = target_or_me(cmd, ctx)?;
            Ok(vec![format!("{}.focus();", element)])
        }
        "blur" => {
            let element = target_or_me(cmd, ctx)?;
            Ok(vec![format!("{}.blur();", element)])
        }
        "go" => {
            let destination = match cmd.args.first().or(cmd.target.as_deref()) {
                Some(node) => generate_expression(node, ctx)?,
                None => return Err(CodegenError::UnknownCommand("go".to_string())),
            };
            Ok(vec![format!("window.location.href = {};", destination)])
        }
        "return" | "halt" | "exit" => Ok(vec!["return;".to_string()]),
        "repeat" => {
            let count = match cmd.args.first() {
                Some(arg) => generate_expression(arg, ctx)?,
                None => return Err(CodegenError::UnknownCommand("repeat".to_string())),
            };
            let mut body = Vec::new();
            for stmt in &cmd.body {
                body.extend(lower_statement(stmt, ctx, state)?);
            }
            let loop_var = format!("_i{}", ctx.next_id());
            Ok(vec![format!(
                "for (let {var} = 0; {var} < {count}; {var}++) {{\n{body}\n}}",
                var = loop_var,
                count = count,
                body = indent_lines(&body, 1)
            )])
        }
        "if" | "unless" => {
            let condition = match cmd.args.first() {
                Some(arg) => generate_expression(arg, ctx)?,
                None => return Err(CodegenError::UnknownCommand(cmd.name.clone())),
            };
            let guard = if cmd.name == "unless" {
                format!("!({})", condition)
            } else {
                condition
            };
            let mut body = Vec::new();
            for stmt in &cmd.body {
                body.extend(lower_statement(stmt, ctx, state)?);
            }
            Ok(vec![format!(
                "if ({}) {{\n{}\n}}",
                guard,
                indent_lines(&body, 1)
            )])
        }
        other => Err(CodegenError::UnknownCommand(other.to_string())),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
