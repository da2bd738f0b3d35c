//! Component dependency graph and cycle detection.
//!
//! Inlining recurses through component bodies, so a cycle between component
//! definitions would never terminate. The analyzer runs this pass before
//! lowering is allowed to begin. Edges come from component bodies only; an
//! invocation's slot children belong to the caller and contribute edges to
//! the caller's own node.

use std::collections::{HashMap, HashSet};

use crate::ast::{Program, ViewNode};
use crate::error::{self, ConstelaError};

pub fn check_component_cycles(program: &Program, errors: &mut Vec<ConstelaError>) {
    let graph = build_graph(program);

    let mut visited: HashSet<&str> = HashSet::new();
    // Deterministic order: components in declaration order.
    for name in program.components.keys() {
        if visited.contains(name.as_str()) {
            continue;
        }
        let mut stack: Vec<&str> = Vec::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        if let Some(cycle) = dfs(name, &graph, &mut visited, &mut stack, &mut on_stack) {
            errors.push(
                ConstelaError::new(
                    error::COMPONENT_CYCLE,
                    format!("Component '{}' is part of a dependency cycle.", name),
                    format!("/components/{}", name),
                )
                .with_context(cycle.join(" -> ")),
            );
        }
    }
}

/// Adjacency: component name -> components its body invokes.
fn build_graph(program: &Program) -> HashMap<&str, Vec<&str>> {
    let mut graph = HashMap::new();
    for (name, def) in &program.components {
        let mut edges = Vec::new();
        collect_invocations(&def.view, &mut edges);
        graph.insert(name.as_str(), edges);
    }
    graph
}

fn collect_invocations<'a>(node: &'a ViewNode, edges: &mut Vec<&'a str>) {
    match node {
        ViewNode::Component { name, children, .. } => {
            edges.push(name.as_str());
            // Slot children may invoke further components.
            for child in children {
                collect_invocations(child, edges);
            }
        }
        ViewNode::Element { children, .. }
        | ViewNode::Portal { children, .. }
        | ViewNode::Island { children } => {
            for child in children {
                collect_invocations(child, edges);
            }
        }
        ViewNode::If {
            then, otherwise, ..
        } => {
            collect_invocations(then, edges);
            if let Some(alt) = otherwise {
                collect_invocations(alt, edges);
            }
        }
        ViewNode::Each { body, .. } => collect_invocations(body, edges),
        ViewNode::Suspense {
            children, fallback, ..
        }
        | ViewNode::ErrorBoundary {
            children, fallback, ..
        } => {
            for child in children {
                collect_invocations(child, edges);
            }
            if let Some(fb) = fallback {
                collect_invocations(fb, edges);
            }
        }
        ViewNode::Text { .. }
        | ViewNode::Slot
        | ViewNode::Markdown { .. }
        | ViewNode::Code { .. } => {}
    }
}

/// Depth-first search returning the first cycle reachable from `node`, as
/// the chain of names from the cycle entry back around to itself.
fn dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    on_stack: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    stack.push(node);
    on_stack.insert(node);

    if let Some(edges) = graph.get(node) {
        for &next in edges {
            if on_stack.contains(next) {
                let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle: Vec<String> =
                    stack[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(next.to_string());
                return Some(cycle);
            }
            // Edges to undefined components are COMPONENT_NOT_FOUND elsewhere.
            if !visited.contains(next) && graph.contains_key(next) {
                if let Some(cycle) = dfs(next, graph, visited, stack, on_stack) {
                    return Some(cycle);
                }
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
    None
}
