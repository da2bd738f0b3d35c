//! Compiled intermediate representation.
//!
//! The lowering target: component invocations are gone (inlined), `slot`
//! placeholders are gone (substituted), `data` expressions have become
//! `import` expressions, and `param` references have been spliced away.
//! A `param` variant still exists so that an unsubstituted reference
//! serializes instead of panicking; the evaluator maps it to undefined.
//!
//! The serialized form is the wire format shared with the client runtime:
//! the `expr`/`kind`/`do` discriminants and camelCase field names are a
//! compatibility surface.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::ast::{BinOp, StateType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledProgram {
    pub version: String,
    #[serde(default)]
    pub state: IndexMap<String, CompiledStateField>,
    #[serde(default)]
    pub actions: IndexMap<String, CompiledAction>,
    pub view: CompiledNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<CompiledRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<CompiledLifecycle>,
    /// Present only when build-time data was supplied and non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_data: Option<IndexMap<String, Json>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStateField {
    #[serde(rename = "type")]
    pub field_type: StateType,
    pub initial: Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledAction {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<CompiledStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledRoute {
    pub path: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<CompiledExpression>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub meta: IndexMap<String, CompiledExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<CompiledExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_ld: Option<CompiledExpression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledLifecycle {
    #[serde(default)]
    pub on_load: Vec<CompiledStep>,
    #[serde(default)]
    pub on_unload: Vec<CompiledStep>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CompiledExpression {
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
        left: Box<CompiledExpression>,
        right: Box<CompiledExpression>,
    },
    Not {
        operand: Box<CompiledExpression>,
    },
    Cond {
        #[serde(rename = "if")]
        cond: Box<CompiledExpression>,
        then: Box<CompiledExpression>,
        #[serde(rename = "else")]
        otherwise: Box<CompiledExpression>,
    },
    Get {
        base: Box<CompiledExpression>,
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
    Ref {
        name: String,
    },
    Index {
        base: Box<CompiledExpression>,
        index: Box<CompiledExpression>,
    },
    /// Should have been substituted away. Evaluates to undefined.
    Param {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Style {
        name: String,
        #[serde(default)]
        variants: IndexMap<String, CompiledExpression>,
    },
    Concat {
        parts: Vec<CompiledExpression>,
    },
    Validity {
        #[serde(rename = "ref")]
        ref_name: String,
    },
    Call {
        target: Box<CompiledExpression>,
        method: String,
        #[serde(default)]
        args: Vec<CompiledExpression>,
    },
    Lambda {
        param: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        body: Box<CompiledExpression>,
    },
    Array {
        items: Vec<CompiledExpression>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIEW TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CompiledNode {
    Element {
        tag: String,
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        ref_name: Option<String>,
        #[serde(default)]
        props: IndexMap<String, CompiledPropValue>,
        #[serde(default)]
        children: Vec<CompiledNode>,
    },
    Text {
        value: CompiledExpression,
    },
    If {
        condition: CompiledExpression,
        then: Box<CompiledNode>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<CompiledNode>>,
    },
    Each {
        items: CompiledExpression,
        #[serde(rename = "as")]
        binding: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<CompiledExpression>,
        body: Box<CompiledNode>,
    },
    /// Wrapper emitted around an inlined component that declared local state
    /// or local actions; gives each instantiation its own mutable scope.
    LocalState {
        #[serde(default)]
        state: IndexMap<String, CompiledStateField>,
        #[serde(default)]
        actions: IndexMap<String, CompiledAction>,
        child: Box<CompiledNode>,
    },
    Markdown {
        content: CompiledExpression,
    },
    Code {
        content: CompiledExpression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Portal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default)]
        children: Vec<CompiledNode>,
    },
    Island {
        #[serde(default)]
        children: Vec<CompiledNode>,
    },
    Suspense {
        #[serde(default)]
        children: Vec<CompiledNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<CompiledNode>>,
    },
    ErrorBoundary {
        #[serde(default)]
        children: Vec<CompiledNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<CompiledNode>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompiledPropValue {
    Expr(CompiledExpression),
    Handler(CompiledHandler),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledHandler {
    pub event: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<CompiledExpression>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION STEPS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "do", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CompiledStep {
    Set {
        target: String,
        value: CompiledExpression,
    },
    Update {
        target: String,
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<CompiledExpression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<CompiledExpression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delete_count: Option<CompiledExpression>,
    },
    SetPath {
        target: String,
        path: String,
        value: CompiledExpression,
    },
    Fetch {
        url: CompiledExpression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<CompiledExpression>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        headers: IndexMap<String, CompiledExpression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        on_success: Vec<CompiledStep>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        on_error: Vec<CompiledStep>,
    },
    Storage {
        operation: String,
        storage: String,
        key: CompiledExpression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<CompiledExpression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Clipboard {
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<CompiledExpression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Navigate {
        to: CompiledExpression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Import {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        on_success: Vec<CompiledStep>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        on_error: Vec<CompiledStep>,
    },
    Call {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<CompiledExpression>,
    },
    Subscribe {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<CompiledExpression>,
    },
    Dispose {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Dom {
        #[serde(rename = "ref")]
        ref_name: String,
        method: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<CompiledExpression>,
    },
    If {
        condition: CompiledExpression,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        then: Vec<CompiledStep>,
        #[serde(rename = "else", default, skip_serializing_if = "Vec::is_empty")]
        otherwise: Vec<CompiledStep>,
    },
    Send {
        value: CompiledExpression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    Close {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    Delay {
        ms: CompiledExpression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        then: Vec<CompiledStep>,
    },
    Interval {
        ms: CompiledExpression,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        then: Vec<CompiledStep>,
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
        prompt: Option<CompiledExpression>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        on_success: Vec<CompiledStep>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        on_error: Vec<CompiledStep>,
    },
    SseConnect {
        url: CompiledExpression,
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
        value: CompiledExpression,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        on_error: Vec<CompiledStep>,
    },
    Confirm {
        message: CompiledExpression,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        then: Vec<CompiledStep>,
        #[serde(rename = "else", default, skip_serializing_if = "Vec::is_empty")]
        otherwise: Vec<CompiledStep>,
    },
    Reject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<CompiledExpression>,
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
