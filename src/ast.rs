//! Input AST for Constela programs.
//!
//! A `Program` arrives as JSON that has already passed structural (schema)
//! validation upstream. Every tree here is a closed tagged union so the
//! analyzer, the lowering engine, and the evaluator are forced to handle
//! every variant exhaustively:
//!
//! - expressions are tagged by the `expr` field
//! - view nodes are tagged by the `kind` field
//! - action steps are tagged by the `do` field
//!
//! These discriminants are a compatibility surface shared with the client
//! runtime and external tooling. Renaming any of them breaks consumers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub version: String,
    #[serde(default)]
    pub state: IndexMap<String, StateField>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    pub view: ViewNode,
    #[serde(default)]
    pub components: IndexMap<String, ComponentDef>,
    #[serde(default)]
    pub route: Option<RouteDef>,
    #[serde(default)]
    pub imports: Option<IndexMap<String, ImportDef>>,
    #[serde(default)]
    pub data: Option<IndexMap<String, DataSourceDef>>,
    #[serde(default)]
    pub styles: IndexMap<String, StylePreset>,
    #[serde(default)]
    pub lifecycle: Option<Lifecycle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateField {
    #[serde(rename = "type")]
    pub field_type: StateType,
    pub initial: Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    String,
    Number,
    Boolean,
    Object,
    List,
}

impl StateType {
    pub fn label(&self) -> &'static str {
        match self {
            StateType::String => "string",
            StateType::Number => "number",
            StateType::Boolean => "boolean",
            StateType::Object => "object",
            StateType::List => "list",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<ActionStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDef {
    #[serde(default)]
    pub params: IndexMap<String, ParamDef>,
    #[serde(default)]
    pub local_state: IndexMap<String, StateField>,
    #[serde(default)]
    pub local_actions: Vec<ActionDefinition>,
    pub view: ViewNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDef {
    #[serde(rename = "type")]
    pub param_type: String,
    /// Params are required unless this is explicitly `false`.
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub default: Option<PropValue>,
}

impl ParamDef {
    pub fn is_required(&self) -> bool {
        self.required != Some(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDef {
    pub path: String,
    #[serde(default)]
    pub title: Option<Expression>,
    #[serde(default)]
    pub meta: IndexMap<String, Expression>,
    #[serde(default)]
    pub canonical: Option<Expression>,
    #[serde(default)]
    pub json_ld: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDef {
    pub from: String,
    #[serde(default)]
    pub export: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDef {
    pub source: String,
}

/// A named style preset: a base class plus variant axes. Variant declaration
/// order is preserved because compiled class lists resolve in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePreset {
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub variants: IndexMap<String, StyleVariantDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleVariantDef {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub options: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    #[serde(default)]
    pub on_load: Vec<ActionStep>,
    #[serde(default)]
    pub on_unload: Vec<ActionStep>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Expression {
    Lit {
        value: Json,
    },
    State {
        name: String,
    },
    Var {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Bin {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not {
        operand: Box<Expression>,
    },
    Cond {
        #[serde(rename = "if")]
        cond: Box<Expression>,
        then: Box<Expression>,
        #[serde(rename = "else")]
        otherwise: Box<Expression>,
    },
    Get {
        base: Box<Expression>,
        path: String,
    },
    Route {
        param: String,
    },
    Import {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Data {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Ref {
        name: String,
    },
    Index {
        base: Box<Expression>,
        index: Box<Expression>,
    },
    Param {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Style {
        name: String,
        #[serde(default)]
        variants: IndexMap<String, Expression>,
    },
    Concat {
        parts: Vec<Expression>,
    },
    Validity {
        #[serde(rename = "ref")]
        ref_name: String,
    },
    Call {
        target: Box<Expression>,
        method: String,
        #[serde(default)]
        args: Vec<Expression>,
    },
    Lambda {
        param: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        body: Box<Expression>,
    },
    Array {
        items: Vec<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIEW TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewNode {
    Element {
        tag: String,
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        ref_name: Option<String>,
        #[serde(default)]
        props: IndexMap<String, PropValue>,
        #[serde(default)]
        children: Vec<ViewNode>,
    },
    Text {
        value: Expression,
    },
    If {
        condition: Expression,
        then: Box<ViewNode>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<ViewNode>>,
    },
    Each {
        items: Expression,
        #[serde(rename = "as")]
        binding: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<Expression>,
        body: Box<ViewNode>,
    },
    Component {
        name: String,
        #[serde(default)]
        props: IndexMap<String, PropValue>,
        #[serde(default)]
        children: Vec<ViewNode>,
    },
    /// Placeholder replaced by invocation children at inline time. Only legal
    /// inside component or layout bodies.
    Slot,
    Markdown {
        content: Expression,
    },
    Code {
        content: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Portal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default)]
        children: Vec<ViewNode>,
    },
    Island {
        #[serde(default)]
        children: Vec<ViewNode>,
    },
    Suspense {
        #[serde(default)]
        children: Vec<ViewNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<ViewNode>>,
    },
    ErrorBoundary {
        #[serde(default)]
        children: Vec<ViewNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<ViewNode>>,
    },
}

/// Element/component prop: either an expression or an event handler. The
/// handler object is not an expression and never enters the expression
/// validator; only its `action` and `payload` fields are checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Expr(Expression),
    Handler(EventHandler),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandler {
    pub event: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Expression>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION STEPS
// ═══════════════════════════════════════════════════════════════════════════════

/// One step of an action. Steps carrying `onSuccess`/`onError`/`then`/`else`
/// lists form a recursive callback tree; each list runs sequentially.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "do", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionStep {
    Set {
        target: String,
        value: Expression,
    },
    Update {
        target: String,
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<Expression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delete_count: Option<Expression>,
    },
    SetPath {
        target: String,
        path: String,
        value: Expression,
    },
    Fetch {
        url: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Expression>,
        #[serde(default)]
        headers: IndexMap<String, Expression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default)]
        on_success: Vec<ActionStep>,
        #[serde(default)]
        on_error: Vec<ActionStep>,
    },
    Storage {
        operation: String,
        storage: String,
        key: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Clipboard {
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Navigate {
        to: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Import {
        name: String,
        #[serde(default)]
        on_success: Vec<ActionStep>,
        #[serde(default)]
        on_error: Vec<ActionStep>,
    },
    Call {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Expression>,
    },
    Subscribe {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<Expression>,
    },
    Dispose {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Dom {
        #[serde(rename = "ref")]
        ref_name: String,
        method: String,
        #[serde(default)]
        args: Vec<Expression>,
    },
    If {
        condition: Expression,
        #[serde(default)]
        then: Vec<ActionStep>,
        #[serde(rename = "else", default)]
        otherwise: Vec<ActionStep>,
    },
    Send {
        value: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    Close {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    Delay {
        ms: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        then: Vec<ActionStep>,
    },
    Interval {
        ms: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        then: Vec<ActionStep>,
    },
    ClearTimer {
        id: String,
    },
    Focus {
        #[serde(rename = "ref")]
        ref_name: String,
    },
    Generate {
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<Expression>,
        #[serde(default)]
        on_success: Vec<ActionStep>,
        #[serde(default)]
        on_error: Vec<ActionStep>,
    },
    SseConnect {
        url: Expression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    SseClose {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Optimistic {
        target: String,
        value: Expression,
        #[serde(default)]
        on_error: Vec<ActionStep>,
    },
    Confirm {
        message: Expression,
        #[serde(default)]
        then: Vec<ActionStep>,
        #[serde(rename = "else", default)]
        otherwise: Vec<ActionStep>,
    },
    Reject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Expression>,
    },
    Bind {
        target: String,
        #[serde(rename = "ref")]
        ref_name: String,
    },
    Unbind {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expression_discriminants_round_trip() {
        let expr: Expression = serde_json::from_value(json!({
            "expr": "bin",
            "op": "+",
            "left": {"expr": "state", "name": "count"},
            "right": {"expr": "lit", "value": 1}
        }))
        .unwrap();

        let back = serde_json::to_value(&expr).unwrap();
        assert_eq!(back["expr"], "bin");
        assert_eq!(back["op"], "+");
        assert_eq!(back["left"]["expr"], "state");
    }

    #[test]
    fn view_node_kind_tags() {
        let node: ViewNode = serde_json::from_value(json!({
            "kind": "each",
            "items": {"expr": "state", "name": "items"},
            "as": "item",
            "body": {"kind": "text", "value": {"expr": "var", "name": "item"}}
        }))
        .unwrap();

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["kind"], "each");
        assert_eq!(back["as"], "item");
        assert!(back.get("index").is_none());
    }

    #[test]
    fn prop_value_distinguishes_handlers_from_expressions() {
        let handler: PropValue = serde_json::from_value(json!({
            "event": "click",
            "action": "increment"
        }))
        .unwrap();
        assert!(matches!(handler, PropValue::Handler(_)));

        let expr: PropValue = serde_json::from_value(json!({
            "expr": "lit", "value": "title"
        }))
        .unwrap();
        assert!(matches!(expr, PropValue::Expr(_)));
    }

    #[test]
    fn action_step_do_tags() {
        let step: ActionStep = serde_json::from_value(json!({
            "do": "update",
            "target": "count",
            "operation": "increment"
        }))
        .unwrap();
        assert!(matches!(step, ActionStep::Update { .. }));

        let nested: ActionStep = serde_json::from_value(json!({
            "do": "fetch",
            "url": {"expr": "lit", "value": "/api"},
            "onSuccess": [{"do": "set", "target": "posts",
                           "value": {"expr": "var", "name": "response"}}]
        }))
        .unwrap();
        match nested {
            ActionStep::Fetch { on_success, .. } => assert_eq!(on_success.len(), 1),
            _ => panic!("expected fetch step"),
        }
    }

    #[test]
    fn param_required_defaults_to_true() {
        let def: ParamDef = serde_json::from_value(json!({"type": "string"})).unwrap();
        assert!(def.is_required());
        let opt: ParamDef =
            serde_json::from_value(json!({"type": "string", "required": false})).unwrap();
        assert!(!opt.is_required());
    }
}
