//! Static analysis of one script AST.
//!
//! The analyzer is a pure function of the tree: no side effects, no compile
//! options. Its result is computed once per script and consumed read-only by
//! the optimizer and both code generators. The selector cacheability rule
//! pinned here is the one the selector-caching pass and the expression
//! generator both depend on.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::ast::{
    CommandNode, MemberProperty, Node, Position, SourceLocation, VarScope,
};
use crate::expression::{is_context_keyword, DOM_PROPERTY_ALLOWLIST};

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableUsage {
    pub reads: Vec<SourceLocation>,
    pub writes: Vec<SourceLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableTables {
    pub local: BTreeMap<String, VariableUsage>,
    pub global: BTreeMap<String, VariableUsage>,
    pub context: BTreeMap<String, VariableUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorInfo {
    pub selector: String,
    pub usages: Vec<SourceLocation>,
    pub is_id: bool,
    pub cacheable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFlowFlags {
    pub has_async: bool,
    pub has_loops: bool,
    pub has_conditionals: bool,
    pub can_throw: bool,
    pub max_nesting_depth: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySummary {
    pub dom_queries: BTreeSet<String>,
    pub event_types: BTreeSet<String>,
    pub behaviors: BTreeSet<String>,
    pub runtime_helpers: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptAnalysis {
    pub commands: BTreeSet<String>,
    pub variables: VariableTables,
    /// Compile-time-constant expressions seen in the tree.
    pub pure_expressions: u32,
    /// Expressions whose value depends on runtime state.
    pub dynamic_expressions: u32,
    pub selectors: BTreeMap<String, SelectorInfo>,
    pub flags: ControlFlowFlags,
    pub dependencies: DependencySummary,
    pub warnings: Vec<String>,
}

impl ScriptAnalysis {
    /// Selectors the codegen context should pre-allocate cache variables
    /// for: cacheable and used more than once.
    pub fn cacheable_selectors(&self) -> Vec<&SelectorInfo> {
        self.selectors
            .values()
            .filter(|s| s.cacheable && s.usages.len() > 1)
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// Commands that restructure the DOM. Any of these in a script makes
    /// every selector non-cacheable: a cached element reference may go stale
    /// between uses.
    static ref DOM_MUTATING_COMMANDS: HashSet<&'static str> = {
        ["put", "append", "prepend", "insert", "remove", "swap", "make", "clone"]
            .into_iter()
            .collect()
    };

    static ref ASYNC_COMMANDS: HashSet<&'static str> =
        ["wait", "fetch", "transition", "settle"].into_iter().collect();

    static ref THROWING_COMMANDS: HashSet<&'static str> =
        ["call", "send", "trigger", "fetch", "go"].into_iter().collect();
}

/// Bare `#id` selectors qualify for the by-ID fast path: single `#`, no
/// spaces, no dots, no further combinators.
pub fn is_id_selector(selector: &str) -> bool {
    lazy_static! {
        static ref ID_RE: regex::Regex = regex::Regex::new(r"^#[A-Za-z][\w-]*$").unwrap();
    }
    ID_RE.is_match(selector)
}

/// A bare `.class` token. Class commands treat these as class names, not
/// DOM queries.
fn is_bare_class(selector: &str) -> bool {
    match selector.strip_prefix('.') {
        Some(rest) => !rest.is_empty() && !rest.contains([' ', '.', '#']),
        None => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZER
// ═══════════════════════════════════════════════════════════════════════════════

/// Analyze a single AST. Pure: the tree is not modified and no state outside
/// the returned value is touched.
pub fn analyze(root: &Node) -> ScriptAnalysis {
    let mut walker = Walker::default();
    walker.visit(root, 0);

    let mutates_dom = walker
        .analysis
        .commands
        .iter()
        .any(|c| DOM_MUTATING_COMMANDS.contains(c.as_str()));

    for info in walker.analysis.selectors.values_mut() {
        // Cacheable iff static and safely re-evaluatable without mutation
        // between uses. Selector nodes are always static strings; templated
        // selectors never reach the selector table.
        info.cacheable = !mutates_dom;
    }

    walker.analysis
}

#[derive(Default)]
struct Walker {
    analysis: ScriptAnalysis,
}

impl Walker {
    fn record_selector(&mut self, value: &str, location: Option<SourceLocation>) {
        let entry = self
            .analysis
            .selectors
            .entry(value.to_string())
            .or_insert_with(|| SelectorInfo {
                selector: value.to_string(),
                usages: vec![],
                is_id: is_id_selector(value),
                cacheable: false,
            });
        entry.usages.push(location.unwrap_or_default());
        self.analysis
            .dependencies
            .dom_queries
            .insert(value.to_string());
    }

    fn record_variable(
        &mut self,
        scope: VarScope,
        name: &str,
        location: Option<SourceLocation>,
        write: bool,
    ) {
        let table = match scope {
            VarScope::Local => &mut self.analysis.variables.local,
            VarScope::Global => &mut self.analysis.variables.global,
            VarScope::Element => &mut self.analysis.variables.context,
        };
        let usage = table.entry(name.to_string()).or_default();
        if write {
            usage.writes.push(location.unwrap_or_default());
        } else {
            usage.reads.push(location.unwrap_or_default());
        }
        if scope == VarScope::Global {
            self.analysis
                .dependencies
                .runtime_helpers
                .insert("globals".to_string());
        }
    }

    fn record_context_read(&mut self, keyword: &str, location: Option<SourceLocation>) {
        self.analysis
            .variables
            .context
            .entry(keyword.to_string())
            .or_default()
            .reads
            .push(location.unwrap_or_default());
    }

    fn visit_command(&mut self, cmd: &CommandNode, depth: u32) {
        let name = cmd.name.as_str();
        self.analysis.commands.insert(name.to_string());

        if ASYNC_COMMANDS.contains(name) {
            self.analysis.flags.has_async = true;
            if name == "wait" {
                self.analysis
                    .dependencies
                    .runtime_helpers
                    .insert("wait".to_string());
            }
        }
        if THROWING_COMMANDS.contains(name) {
            self.analysis.flags.can_throw = true;
        }
        match name {
            "repeat" => self.analysis.flags.has_loops = true,
            "if" | "unless" => self.analysis.flags.has_conditionals = true,
            "install" => {
                for arg in &cmd.args {
                    if let Node::Identifier(id) = arg {
                        self.analysis
                            .dependencies
                            .behaviors
                            .insert(id.value.clone());
                    }
                }
            }
            _ => {}
        }

        // Class commands take `.class` tokens as class names, not queries.
        let class_command = matches!(name, "toggle" | "add" | "remove");

        // set / increment / decrement write their target; everything else
        // only reads it.
        let target_is_write = matches!(name, "set" | "increment" | "decrement");
        if let Some(target) = &cmd.target {
            let target_is_class_token = class_command
                && cmd.args.is_empty()
                && matches!(target.as_ref(), Node::Selector(s) if is_bare_class(&s.value));
            if target_is_class_token {
                // nothing to record
            } else if target_is_write {
                if let Node::Variable(var) = target.as_ref() {
                    self.record_variable(var.scope, &var.name, var.location, true);
                } else {
                    self.visit(target, depth);
                }
            } else {
                self.visit(target, depth);
            }
        }

        for arg in &cmd.args {
            if class_command && matches!(arg, Node::Selector(s) if is_bare_class(&s.value)) {
                continue;
            }
            self.visit(arg, depth);
        }

        if !cmd.body.is_empty() {
            let inner = depth + 1;
            self.analysis.flags.max_nesting_depth =
                self.analysis.flags.max_nesting_depth.max(inner);
            for stmt in &cmd.body {
                self.visit(stmt, inner);
            }
        }
    }

    fn visit(&mut self, node: &Node, depth: u32) {
        match node {
            Node::Event(ev) => {
                for name in ev.event_names() {
                    self.analysis.dependencies.event_types.insert(name);
                }
                if let Some(target) = &ev.target {
                    self.visit(target, depth);
                }
                for stmt in &ev.body {
                    self.visit(stmt, depth);
                }
            }
            Node::Command(cmd) => self.visit_command(cmd, depth),
            Node::Literal(_) => {
                self.analysis.pure_expressions += 1;
            }
            Node::Identifier(id) => {
                let value = id.value.as_str();
                if is_context_keyword(value) {
                    self.record_context_read(value, id.location);
                } else if let Some(name) = value.strip_prefix("::") {
                    self.record_variable(VarScope::Global, name, id.location, false);
                } else if let Some(name) = value.strip_prefix('$') {
                    self.record_variable(VarScope::Global, name, id.location, false);
                } else if let Some(name) = value.strip_prefix(':') {
                    self.record_variable(VarScope::Local, name, id.location, false);
                }
                self.analysis.dynamic_expressions += 1;
            }
            Node::Selector(sel) => {
                self.record_selector(&sel.value, sel.location);
                self.analysis.dynamic_expressions += 1;
            }
            Node::Variable(var) => {
                self.record_variable(var.scope, &var.name, var.location, false);
                self.analysis.dynamic_expressions += 1;
            }
            Node::Binary(bin) => {
                match bin.operator.as_str() {
                    "contains" => {
                        self.analysis
                            .dependencies
                            .runtime_helpers
                            .insert("contains".to_string());
                    }
                    "matches" => {
                        self.analysis
                            .dependencies
                            .runtime_helpers
                            .insert("matches".to_string());
                    }
                    _ => {}
                }
                self.visit(&bin.left, depth);
                self.visit(&bin.right, depth);
            }
            Node::Member(member) => {
                self.visit(&member.object, depth);
                if let MemberProperty::Expr(expr) = &member.property {
                    self.visit(expr, depth);
                }
            }
            Node::Possessive(poss) => {
                self.visit(&poss.object, depth);
                let prop = poss.property.as_str();
                if !prop.starts_with('*')
                    && !prop.starts_with('@')
                    && !DOM_PROPERTY_ALLOWLIST.contains(prop)
                {
                    self.analysis
                        .dependencies
                        .runtime_helpers
                        .insert("getProp".to_string());
                }
            }
            Node::Call(call) => {
                self.analysis.flags.can_throw = true;
                self.visit(&call.callee, depth);
                for arg in &call.args {
                    self.visit(arg, depth);
                }
            }
            Node::Positional(pos) => {
                let on_selector = matches!(pos.target.as_deref(), Some(Node::Selector(_)));
                match pos.position {
                    Position::First | Position::Last if !on_selector => {
                        let helper = if pos.position == Position::First {
                            "first"
                        } else {
                            "last"
                        };
                        self.analysis
                            .dependencies
                            .runtime_helpers
                            .insert(helper.to_string());
                    }
                    Position::Random => {
                        self.analysis
                            .dependencies
                            .runtime_helpers
                            .insert("random".to_string());
                    }
                    _ => {}
                }
                if let Some(target) = &pos.target {
                    self.visit(target, depth);
                }
            }
            Node::Array(arr) => {
                for el in &arr.elements {
                    self.visit(el, depth);
                }
            }
            Node::Object(obj) => {
                for prop in &obj.properties {
                    self.visit(&prop.value, depth);
                }
            }
            Node::Template(tpl) => {
                self.analysis.dynamic_expressions += 1;
                for seg in &tpl.segments {
                    self.visit(seg, depth);
                }
            }
            Node::Unary(un) => self.visit(&un.operand, depth),
            Node::Conditional(cond) => {
                self.analysis.flags.has_conditionals = true;
                self.visit(&cond.test, depth);
                self.visit(&cond.consequent, depth);
                self.visit(&cond.alternate, depth);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CommandNode, EventNode};
    use std::collections::HashMap;

    fn command(name: &str, target: Option<Node>) -> Node {
        Node::Command(CommandNode {
            name: name.to_string(),
            args: vec![],
            target: target.map(Box::new),
            modifiers: HashMap::new(),
            body: vec![],
            location: None,
        })
    }

    fn event_with_body(body: Vec<Node>) -> Node {
        Node::Event(EventNode {
            event: "click".to_string(),
            modifiers: vec![],
            body,
            target: None,
            location: None,
        })
    }

    #[test]
    fn test_is_id_selector() {
        assert!(is_id_selector("#myId"));
        assert!(is_id_selector("#nav-bar"));
        assert!(!is_id_selector("#a b"));
        assert!(!is_id_selector("#a.b"));
        assert!(!is_id_selector(".cls"));
        assert!(!is_id_selector("#"));
    }

    #[test]
    fn test_commands_and_events_collected() {
        let ast = event_with_body(vec![
            command("toggle", Some(Node::selector(".active"))),
            command("log", None),
        ]);
        let analysis = analyze(&ast);
        assert!(analysis.commands.contains("toggle"));
        assert!(analysis.commands.contains("log"));
        assert!(analysis.dependencies.event_types.contains("click"));
    }

    #[test]
    fn test_selector_cacheable_without_dom_mutation() {
        let ast = event_with_body(vec![
            command("show", Some(Node::selector(".card"))),
            command("hide", Some(Node::selector(".card"))),
        ]);
        let analysis = analyze(&ast);
        let info = &analysis.selectors[".card"];
        assert!(info.cacheable);
        assert_eq!(info.usages.len(), 2);
        assert_eq!(analysis.cacheable_selectors().len(), 1);
    }

    #[test]
    fn test_dom_mutation_defeats_caching() {
        let ast = event_with_body(vec![
            command("show", Some(Node::selector(".card"))),
            command("hide", Some(Node::selector(".card"))),
            command("append", Some(Node::selector("#box"))),
        ]);
        let analysis = analyze(&ast);
        assert!(!analysis.selectors[".card"].cacheable);
        assert!(analysis.cacheable_selectors().is_empty());
    }

    #[test]
    fn test_class_tokens_are_not_queries() {
        let ast = event_with_body(vec![command("toggle", Some(Node::selector(".active")))]);
        let analysis = analyze(&ast);
        assert!(!analysis.selectors.contains_key(".active"));
        assert!(analysis.dependencies.dom_queries.is_empty());
    }

    #[test]
    fn test_variable_reads_and_writes() {
        let write_target = Node::Variable(crate::ast::VariableNode {
            name: "count".to_string(),
            scope: VarScope::Local,
            location: None,
        });
        let ast = event_with_body(vec![
            command("increment", Some(write_target)),
            command(
                "log",
                Some(Node::Variable(crate::ast::VariableNode {
                    name: "count".to_string(),
                    scope: VarScope::Local,
                    location: None,
                })),
            ),
        ]);
        let analysis = analyze(&ast);
        let usage = &analysis.variables.local["count"];
        assert_eq!(usage.writes.len(), 1);
        assert_eq!(usage.reads.len(), 1);
    }

    #[test]
    fn test_flags() {
        let mut repeat = CommandNode {
            name: "repeat".to_string(),
            args: vec![Node::literal(3)],
            target: None,
            modifiers: HashMap::new(),
            body: vec![command("wait", None)],
            location: None,
        };
        repeat.body.push(command("send", None));
        let ast = event_with_body(vec![Node::Command(repeat)]);
        let analysis = analyze(&ast);
        assert!(analysis.flags.has_loops);
        assert!(analysis.flags.has_async);
        assert!(analysis.flags.can_throw);
        assert_eq!(analysis.flags.max_nesting_depth, 1);
        assert!(analysis.dependencies.runtime_helpers.contains("wait"));
    }

    #[test]
    fn test_global_variable_predicts_globals_helper() {
        let ast = event_with_body(vec![command(
            "log",
            Some(Node::Variable(crate::ast::VariableNode {
                name: "theme".to_string(),
                scope: VarScope::Global,
                location: None,
            })),
        )]);
        let analysis = analyze(&ast);
        assert!(analysis.dependencies.runtime_helpers.contains("globals"));
        assert!(analysis.variables.global.contains_key("theme"));
    }
}
