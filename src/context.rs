//! Analysis context: the precomputed sets of valid names for one compilation.
//!
//! Built in a single pass over the program before any validation runs, then
//! shared read-only by every validator. Collection cannot fail.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::ast::{ParamDef, Program, StateType, ViewNode};

lazy_static! {
    /// `:param` segments of a route path pattern.
    static ref ROUTE_PARAM_RE: Regex = Regex::new(r"(?:^|/):([^/]+)").unwrap();
}

#[derive(Debug, Clone, Copy)]
pub struct ParamInfo {
    pub required: bool,
    pub has_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub state_names: HashSet<String>,
    pub state_types: HashMap<String, StateType>,
    /// Duplicates intentionally preserved; a later pass reports them.
    pub action_names: Vec<String>,
    pub component_names: HashSet<String>,
    pub component_params: HashMap<String, Vec<(String, ParamInfo)>>,
    pub route_params: HashSet<String>,
    pub import_names: HashSet<String>,
    pub data_names: HashSet<String>,
    pub ref_names: HashSet<String>,
    pub style_names: HashSet<String>,
    pub style_variants: HashMap<String, HashSet<String>>,
    pub has_route: bool,
    pub has_imports: bool,
    pub has_data: bool,
}

impl AnalysisContext {
    pub fn has_action(&self, name: &str) -> bool {
        self.action_names.iter().any(|a| a == name)
    }
}

pub fn collect_context(program: &Program) -> AnalysisContext {
    let mut ctx = AnalysisContext::default();

    for (name, field) in &program.state {
        ctx.state_names.insert(name.clone());
        ctx.state_types.insert(name.clone(), field.field_type);
    }

    for action in &program.actions {
        ctx.action_names.push(action.name.clone());
    }

    for (name, def) in &program.components {
        ctx.component_names.insert(name.clone());
        let params: Vec<(String, ParamInfo)> = def
            .params
            .iter()
            .map(|(pname, pdef)| (pname.clone(), param_info(pdef)))
            .collect();
        ctx.component_params.insert(name.clone(), params);
    }

    if let Some(route) = &program.route {
        ctx.has_route = true;
        ctx.route_params = extract_route_params(&route.path).into_iter().collect();
    }

    if let Some(imports) = &program.imports {
        ctx.has_imports = true;
        ctx.import_names = imports.keys().cloned().collect();
    }

    if let Some(data) = &program.data {
        ctx.has_data = true;
        ctx.data_names = data.keys().cloned().collect();
    }

    for (name, preset) in &program.styles {
        ctx.style_names.insert(name.clone());
        ctx.style_variants
            .insert(name.clone(), preset.variants.keys().cloned().collect());
    }

    // Refs live on elements of the call-site view tree only; component
    // definitions keep their refs private to each expansion.
    collect_refs(&program.view, &mut ctx.ref_names);

    ctx
}

fn param_info(def: &ParamDef) -> ParamInfo {
    ParamInfo {
        required: def.is_required(),
        has_default: def.default.is_some(),
    }
}

/// Extract `:param` names from a route path pattern like `/posts/:id`.
pub fn extract_route_params(path: &str) -> Vec<String> {
    ROUTE_PARAM_RE
        .captures_iter(path)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn collect_refs(node: &ViewNode, refs: &mut HashSet<String>) {
    match node {
        ViewNode::Element {
            ref_name, children, ..
        } => {
            if let Some(r) = ref_name {
                refs.insert(r.clone());
            }
            for child in children {
                collect_refs(child, refs);
            }
        }
        ViewNode::If {
            then, otherwise, ..
        } => {
            collect_refs(then, refs);
            if let Some(alt) = otherwise {
                collect_refs(alt, refs);
            }
        }
        ViewNode::Each { body, .. } => collect_refs(body, refs),
        ViewNode::Component { children, .. } => {
            // Slot content belongs to the caller's tree.
            for child in children {
                collect_refs(child, refs);
            }
        }
        ViewNode::Portal { children, .. } | ViewNode::Island { children } => {
            for child in children {
                collect_refs(child, refs);
            }
        }
        ViewNode::Suspense {
            children, fallback, ..
        }
        | ViewNode::ErrorBoundary {
            children, fallback, ..
        } => {
            for child in children {
                collect_refs(child, refs);
            }
            if let Some(fb) = fallback {
                collect_refs(fb, refs);
            }
        }
        ViewNode::Text { .. }
        | ViewNode::Slot
        | ViewNode::Markdown { .. }
        | ViewNode::Code { .. } => {}
    }
}
