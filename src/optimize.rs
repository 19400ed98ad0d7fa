//! Optimization pipeline.
//!
//! A fixed list of named passes run in deterministic order, gated by the
//! integer optimization level (0 = none, 1 = basic, 2 = full). Every pass is
//! a pure tree-to-tree function; passes communicate only through the
//! transformed tree. The pipeline reports which passes actually changed
//! something so the orchestrator can expose `optimizationsApplied`.

use crate::analysis::ScriptAnalysis;
use crate::ast::{CommandNode, Node};

/// Inline at most this many copies of a `repeat` body. Larger or unknown
/// counts keep the loop.
pub const LOOP_UNROLL_LIMIT: u64 = 8;

pub const PASS_CONSTANT_FOLDING: &str = "constant-folding";
pub const PASS_SELECTOR_CACHING: &str = "selector-caching";
pub const PASS_DEAD_CODE: &str = "dead-code-elimination";
pub const PASS_LOOP_UNROLLING: &str = "loop-unrolling";

struct Pass {
    name: &'static str,
    min_level: u8,
    run: fn(Node, &ScriptAnalysis) -> (Node, bool),
}

const PASSES: &[Pass] = &[
    Pass {
        name: PASS_CONSTANT_FOLDING,
        min_level: 1,
        run: constant_folding,
    },
    Pass {
        name: PASS_SELECTOR_CACHING,
        min_level: 2,
        run: selector_caching,
    },
    Pass {
        name: PASS_DEAD_CODE,
        min_level: 1,
        run: dead_code_elimination,
    },
    Pass {
        name: PASS_LOOP_UNROLLING,
        min_level: 2,
        run: loop_unrolling,
    },
];

/// Run every pass enabled at `level`, in order. Returns the transformed
/// tree and the names of the passes that fired.
pub fn optimize(ast: Node, analysis: &ScriptAnalysis, level: u8) -> (Node, Vec<&'static str>) {
    let mut ast = ast;
    let mut applied = Vec::new();
    for pass in PASSES {
        if level < pass.min_level {
            continue;
        }
        let (next, changed) = (pass.run)(ast, analysis);
        ast = next;
        if changed {
            applied.push(pass.name);
        }
    }
    (ast, applied)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANT FOLDING
// ═══════════════════════════════════════════════════════════════════════════════

fn constant_folding(ast: Node, _analysis: &ScriptAnalysis) -> (Node, bool) {
    let mut changed = false;
    let folded = fold_node(ast, &mut changed);
    (folded, changed)
}

fn fold_node(node: Node, changed: &mut bool) -> Node {
    match node {
        Node::Event(mut ev) => {
            ev.body = ev.body.into_iter().map(|n| fold_node(n, changed)).collect();
            ev.target = ev.target.map(|t| Box::new(fold_node(*t, changed)));
            Node::Event(ev)
        }
        Node::Command(mut cmd) => {
            cmd.args = cmd.args.into_iter().map(|n| fold_node(n, changed)).collect();
            cmd.target = cmd.target.map(|t| Box::new(fold_node(*t, changed)));
            cmd.body = cmd.body.into_iter().map(|n| fold_node(n, changed)).collect();
            Node::Command(cmd)
        }
        Node::Binary(mut bin) => {
            bin.left = Box::new(fold_node(*bin.left, changed));
            bin.right = Box::new(fold_node(*bin.right, changed));
            if let (Some(left), Some(right)) =
                (bin.left.literal_value(), bin.right.literal_value())
            {
                if let Some(folded) = fold_literals(&bin.operator, left, right) {
                    *changed = true;
                    return Node::literal(folded);
                }
            }
            Node::Binary(bin)
        }
        Node::Unary(mut un) => {
            un.operand = Box::new(fold_node(*un.operand, changed));
            Node::Unary(un)
        }
        Node::Conditional(mut cond) => {
            cond.test = Box::new(fold_node(*cond.test, changed));
            cond.consequent = Box::new(fold_node(*cond.consequent, changed));
            cond.alternate = Box::new(fold_node(*cond.alternate, changed));
            Node::Conditional(cond)
        }
        Node::Array(mut arr) => {
            arr.elements = arr
                .elements
                .into_iter()
                .map(|n| fold_node(n, changed))
                .collect();
            Node::Array(arr)
        }
        Node::Object(mut obj) => {
            for prop in &mut obj.properties {
                let value = std::mem::replace(&mut prop.value, Node::literal(0));
                prop.value = fold_node(value, changed);
            }
            Node::Object(obj)
        }
        Node::Template(mut tpl) => {
            tpl.segments = tpl
                .segments
                .into_iter()
                .map(|n| fold_node(n, changed))
                .collect();
            Node::Template(tpl)
        }
        Node::Call(mut call) => {
            call.callee = Box::new(fold_node(*call.callee, changed));
            call.args = call
                .args
                .into_iter()
                .map(|n| fold_node(n, changed))
                .collect();
            Node::Call(call)
        }
        other => other,
    }
}

fn fold_literals(
    operator: &str,
    left: &serde_json::Value,
    right: &serde_json::Value,
) -> Option<serde_json::Value> {
    use serde_json::Value;

    match operator {
        "+" | "-" | "*" | "/" => {
            let (l, r) = (left.as_f64()?, right.as_f64()?);
            let result = match operator {
                "+" => l + r,
                "-" => l - r,
                "*" => l * r,
                // Division by a literal zero stays unfolded.
                "/" if r != 0.0 => l / r,
                _ => return None,
            };
            // Keep integral results integral so counts stay usable
            // downstream (`repeat (1 + 2) times`).
            if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
                Some(Value::Number(serde_json::Number::from(result as i64)))
            } else {
                serde_json::Number::from_f64(result).map(Value::Number)
            }
        }
        "and" | "&&" => {
            let (l, r) = (left.as_bool()?, right.as_bool()?);
            Some(Value::Bool(l && r))
        }
        "or" | "||" => {
            let (l, r) = (left.as_bool()?, right.as_bool()?);
            Some(Value::Bool(l || r))
        }
        "&" => {
            let l = scalar_to_string(left)?;
            let r = scalar_to_string(right)?;
            Some(Value::String(format!("{}{}", l, r)))
        }
        _ => None,
    }
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTOR CACHING PREPARATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Marking-only pass: the tree is untouched; cache-variable allocation
/// happens when the codegen context is built. Fires when the analyzer found
/// at least one cacheable selector used more than once, which tells the
/// orchestrator to pre-populate the context's selector cache.
fn selector_caching(ast: Node, analysis: &ScriptAnalysis) -> (Node, bool) {
    let fired = !analysis.cacheable_selectors().is_empty();
    (ast, fired)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEAD CODE ELIMINATION
// ═══════════════════════════════════════════════════════════════════════════════

fn is_terminal_command(node: &Node) -> bool {
    matches!(node, Node::Command(cmd) if matches!(cmd.name.as_str(), "halt" | "return" | "exit"))
}

fn dead_code_elimination(ast: Node, _analysis: &ScriptAnalysis) -> (Node, bool) {
    let mut changed = false;
    let pruned = prune_node(ast, &mut changed);
    (pruned, changed)
}

fn prune_body(body: Vec<Node>, changed: &mut bool) -> Vec<Node> {
    let mut out = Vec::with_capacity(body.len());
    let mut terminated = false;
    for stmt in body {
        if terminated {
            *changed = true;
            continue;
        }
        let terminal = is_terminal_command(&stmt);
        out.push(prune_node(stmt, changed));
        if terminal {
            terminated = true;
        }
    }
    out
}

fn prune_node(node: Node, changed: &mut bool) -> Node {
    match node {
        Node::Event(mut ev) => {
            ev.body = prune_body(ev.body, changed);
            Node::Event(ev)
        }
        Node::Command(mut cmd) => {
            cmd.body = prune_body(cmd.body, changed);
            Node::Command(cmd)
        }
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOOP UNROLLING
// ═══════════════════════════════════════════════════════════════════════════════

fn repeat_count(cmd: &CommandNode) -> Option<u64> {
    if cmd.name != "repeat" {
        return None;
    }
    let count = cmd.args.first()?.literal_value()?.as_u64()?;
    if count >= 1 && count <= LOOP_UNROLL_LIMIT && !cmd.body.is_empty() {
        Some(count)
    } else {
        None
    }
}

fn loop_unrolling(ast: Node, _analysis: &ScriptAnalysis) -> (Node, bool) {
    let mut changed = false;
    let unrolled = unroll_node(ast, &mut changed);
    (unrolled, changed)
}

fn unroll_body(body: Vec<Node>, changed: &mut bool) -> Vec<Node> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        let stmt = unroll_node(stmt, changed);
        match stmt {
            Node::Command(cmd) => {
                if let Some(count) = repeat_count(&cmd) {
                    *changed = true;
                    for _ in 0..count {
                        out.extend(cmd.body.iter().cloned());
                    }
                } else {
                    out.push(Node::Command(cmd));
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn unroll_node(node: Node, changed: &mut bool) -> Node {
    match node {
        Node::Event(mut ev) => {
            ev.body = unroll_body(ev.body, changed);
            Node::Event(ev)
        }
        Node::Command(mut cmd) => {
            cmd.body = unroll_body(cmd.body, changed);
            Node::Command(cmd)
        }
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::ast::{BinaryNode, EventNode};
    use std::collections::HashMap;

    fn command(name: &str) -> Node {
        Node::Command(CommandNode {
            name: name.to_string(),
            args: vec![],
            target: None,
            modifiers: HashMap::new(),
            body: vec![],
            location: None,
        })
    }

    fn event(body: Vec<Node>) -> Node {
        Node::Event(EventNode {
            event: "click".to_string(),
            modifiers: vec![],
            body,
            target: None,
            location: None,
        })
    }

    #[test]
    fn test_level_zero_runs_nothing() {
        let ast = event(vec![command("halt"), command("log")]);
        let analysis = analyze(&ast);
        let (out, applied) = optimize(ast, &analysis, 0);
        assert!(applied.is_empty());
        match out {
            Node::Event(ev) => assert_eq!(ev.body.len(), 2),
            _ => panic!("expected event root"),
        }
    }

    #[test]
    fn test_constant_folding_literal_addition() {
        let sum = Node::Binary(BinaryNode {
            operator: "+".to_string(),
            left: Box::new(Node::literal(1)),
            right: Box::new(Node::literal(2)),
        });
        let ast = event(vec![Node::Command(CommandNode {
            name: "log".to_string(),
            args: vec![sum],
            target: None,
            modifiers: HashMap::new(),
            body: vec![],
            location: None,
        })]);
        let analysis = analyze(&ast);
        let (out, applied) = optimize(ast, &analysis, 1);
        assert!(applied.contains(&PASS_CONSTANT_FOLDING));
        match out {
            Node::Event(ev) => match &ev.body[0] {
                Node::Command(cmd) => {
                    assert_eq!(cmd.args[0].literal_value().unwrap().as_f64(), Some(3.0));
                }
                _ => panic!("expected command"),
            },
            _ => panic!("expected event root"),
        }
    }

    #[test]
    fn test_division_by_zero_unfolded() {
        let div = Node::Binary(BinaryNode {
            operator: "/".to_string(),
            left: Box::new(Node::literal(1)),
            right: Box::new(Node::literal(0)),
        });
        let ast = event(vec![Node::Command(CommandNode {
            name: "log".to_string(),
            args: vec![div],
            target: None,
            modifiers: HashMap::new(),
            body: vec![],
            location: None,
        })]);
        let analysis = analyze(&ast);
        let (out, applied) = optimize(ast, &analysis, 1);
        assert!(!applied.contains(&PASS_CONSTANT_FOLDING));
        match out {
            Node::Event(ev) => assert!(matches!(&ev.body[0], Node::Command(cmd)
                if matches!(cmd.args[0], Node::Binary(_)))),
            _ => panic!("expected event root"),
        }
    }

    #[test]
    fn test_string_concat_folding() {
        assert_eq!(
            fold_literals("&", &serde_json::json!("a"), &serde_json::json!(1)),
            Some(serde_json::json!("a1"))
        );
    }

    #[test]
    fn test_dead_code_after_halt() {
        let ast = event(vec![command("toggle"), command("halt"), command("log")]);
        let analysis = analyze(&ast);
        let (out, applied) = optimize(ast, &analysis, 1);
        assert!(applied.contains(&PASS_DEAD_CODE));
        match out {
            Node::Event(ev) => {
                assert_eq!(ev.body.len(), 2);
                assert!(is_terminal_command(&ev.body[1]));
            }
            _ => panic!("expected event root"),
        }
    }

    #[test]
    fn test_loop_unrolling_small_literal_count() {
        let repeat = Node::Command(CommandNode {
            name: "repeat".to_string(),
            args: vec![Node::literal(3)],
            target: None,
            modifiers: HashMap::new(),
            body: vec![command("toggle")],
            location: None,
        });
        let ast = event(vec![repeat]);
        let analysis = analyze(&ast);
        let (out, applied) = optimize(ast, &analysis, 2);
        assert!(applied.contains(&PASS_LOOP_UNROLLING));
        match out {
            Node::Event(ev) => assert_eq!(ev.body.len(), 3),
            _ => panic!("expected event root"),
        }
    }

    #[test]
    fn test_loop_unrolling_respects_limit() {
        let repeat = Node::Command(CommandNode {
            name: "repeat".to_string(),
            args: vec![Node::literal(100)],
            target: None,
            modifiers: HashMap::new(),
            body: vec![command("toggle")],
            location: None,
        });
        let ast = event(vec![repeat]);
        let analysis = analyze(&ast);
        let (out, applied) = optimize(ast, &analysis, 2);
        assert!(!applied.contains(&PASS_LOOP_UNROLLING));
        match out {
            Node::Event(ev) => assert_eq!(ev.body.len(), 1),
            _ => panic!("expected event root"),
        }
    }

    #[test]
    fn test_selector_caching_fires_only_with_repeats() {
        let ast = event(vec![
            Node::Command(CommandNode {
                name: "show".to_string(),
                args: vec![],
                target: Some(Box::new(Node::selector(".card"))),
                modifiers: HashMap::new(),
                body: vec![],
                location: None,
            }),
            Node::Command(CommandNode {
                name: "hide".to_string(),
                args: vec![],
                target: Some(Box::new(Node::selector(".card"))),
                modifiers: HashMap::new(),
                body: vec![],
                location: None,
            }),
        ]);
        let analysis = analyze(&ast);
        let (_, applied) = optimize(ast.clone(), &analysis, 2);
        assert!(applied.contains(&PASS_SELECTOR_CACHING));

        let single = event(vec![Node::Command(CommandNode {
            name: "show".to_string(),
            args: vec![],
            target: Some(Box::new(Node::selector(".card"))),
            modifiers: HashMap::new(),
            body: vec![],
            location: None,
        })]);
        let analysis = analyze(&single);
        let (_, applied) = optimize(single, &analysis, 2);
        assert!(!applied.contains(&PASS_SELECTOR_CACHING));
    }
}
