//! Structural comparison of parsed implementations.
//!
//! This is a two-branch approximation, not a prover. Two programs that each
//! consist of a single function without nested blocks compare their headers
//! and their statements as a multiset, so independent statements may be
//! reordered. Anything with control flow compares canonical trees exactly.

use std::collections::HashSet;

use steadfast_ir::naming::convert;
use steadfast_ir::NamingStyle;

use crate::parser::{top_level_positions, Block, BlockKind, Node, ProgramTree, Token, TokenKind};
use crate::spec_eq::multiset;

const LANGUAGE_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "self", "cls",
];

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "//=", "%=", "**=", "&=", "|=", "^=", ">>=", "<<=", "@=",
];

fn is_bindable(token: &Token) -> bool {
    token.kind == TokenKind::Name && !LANGUAGE_KEYWORDS.contains(&token.text.as_str())
}

/// Names in `region` that are not attribute accesses (`obj.name`).
fn plain_names(region: &[Token], out: &mut HashSet<String>) {
    for (idx, token) in region.iter().enumerate() {
        let after_dot = idx > 0 && region[idx - 1].is_punct(".");
        if is_bindable(token) && !after_dot {
            out.insert(token.text.clone());
        }
    }
}

/// `as` targets and walrus targets anywhere in a token run.
fn alias_targets(tokens: &[Token], out: &mut HashSet<String>) {
    for (idx, token) in tokens.iter().enumerate() {
        if token.is_name("as") {
            if let Some(next) = tokens.get(idx + 1).filter(|t| is_bindable(t)) {
                out.insert(next.text.clone());
            }
        }
        if token.is_op(":=") && idx > 0 && is_bindable(&tokens[idx - 1]) {
            out.insert(tokens[idx - 1].text.clone());
        }
    }
}

fn assignment_targets(tokens: &[Token], out: &mut HashSet<String>) {
    let assigns = top_level_positions(tokens, |t| {
        t.kind == TokenKind::Operator && ASSIGN_OPS.contains(&t.text.as_str())
    });
    let mut start = 0;
    for pos in assigns {
        let mut region = &tokens[start..pos];
        // Annotated target: `total: float = 0.0`.
        if let Some(&colon) = top_level_positions(region, |t| t.is_punct(":")).first() {
            region = &region[..colon];
        }
        plain_names(region, out);
        start = pos + 1;
    }
}

fn function_bindings(block: &Block, out: &mut HashSet<String>) {
    if let Some(name) = block.name() {
        out.insert(name.to_string());
    }
    for param in block.parameters() {
        if let Some(name) = param.iter().find(|t| is_bindable(t)) {
            out.insert(name.text.clone());
        }
    }
}

fn loop_targets(block: &Block, out: &mut HashSet<String>) {
    let header = &block.header;
    let Some(for_pos) = header.iter().position(|t| t.is_name("for")) else {
        return;
    };
    let in_pos = header
        .iter()
        .skip(for_pos + 1)
        .position(|t| t.is_name("in"))
        .map(|p| p + for_pos + 1)
        .unwrap_or(header.len());
    plain_names(&header[for_pos + 1..in_pos], out);
}

fn collect_bindings(nodes: &[Node], out: &mut HashSet<String>) {
    for node in nodes {
        match node {
            Node::Statement(tokens) => {
                assignment_targets(tokens, out);
                alias_targets(tokens, out);
            }
            Node::Block(block) => {
                match block.kind {
                    BlockKind::Function => function_bindings(block, out),
                    BlockKind::Control if block.keyword == "for" => loop_targets(block, out),
                    _ => {}
                }
                alias_targets(&block.header, out);
                collect_bindings(&block.body, out);
            }
        }
    }
}

fn rename_tokens(tokens: &mut [Token], bound: &HashSet<String>) {
    for idx in 0..tokens.len() {
        let after_dot = idx > 0 && tokens[idx - 1].is_punct(".");
        let token = &mut tokens[idx];
        if after_dot || token.kind != TokenKind::Name || !bound.contains(&token.text) {
            continue;
        }
        let converted = convert(&token.text, NamingStyle::SnakeCase);
        if !converted.is_empty() {
            token.text = converted;
        }
    }
}

fn rename_nodes(nodes: &mut [Node], bound: &HashSet<String>) {
    for node in nodes {
        match node {
            Node::Statement(tokens) => rename_tokens(tokens, bound),
            Node::Block(block) => {
                rename_tokens(&mut block.header, bound);
                rename_nodes(&mut block.body, bound);
            }
        }
    }
}

/// Rewrite every bound identifier (function names, parameters, assignment,
/// loop and `as` targets) to snake_case, at every use site.
pub fn normalize_bound_names(tree: &mut ProgramTree) {
    let mut bound = HashSet::new();
    collect_bindings(&tree.nodes, &mut bound);
    rename_nodes(&mut tree.nodes, &bound);
}

pub fn canonical_statement(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_docstring(tokens: &[Token]) -> bool {
    matches!(tokens, [only] if only.kind == TokenKind::Str)
}

fn is_import(tokens: &[Token]) -> bool {
    tokens
        .first()
        .is_some_and(|t| t.is_name("import") || t.is_name("from"))
}

/// The single control-flow-free function a program reduces to, if any.
///
/// Top-level imports and docstrings are ignored; a nested block of any kind
/// disqualifies the function.
pub fn flat_function(tree: &ProgramTree) -> Option<&Block> {
    let mut found = None;
    for node in &tree.nodes {
        match node {
            Node::Block(block) if block.kind == BlockKind::Function => {
                if found.replace(block).is_some() {
                    return None;
                }
            }
            Node::Statement(tokens) if is_import(tokens) || is_docstring(tokens) => {}
            _ => return None,
        }
    }
    let func = found?;
    func.body
        .iter()
        .all(|n| matches!(n, Node::Statement(_)))
        .then_some(func)
}

/// Which branch decided a structural comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralBranch {
    FlatMultiset,
    ExactTree,
}

/// Compare two already-normalized trees.
pub fn trees_equivalent(a: &ProgramTree, b: &ProgramTree) -> (bool, StructuralBranch) {
    match (flat_function(a), flat_function(b)) {
        (Some(fa), Some(fb)) => {
            let statements = |f: &Block| -> Vec<String> {
                f.body
                    .iter()
                    .filter_map(|n| match n {
                        Node::Statement(tokens) if !is_docstring(tokens) => {
                            Some(canonical_statement(tokens))
                        }
                        _ => None,
                    })
                    .collect()
            };
            // The header carries the name, the parameter list and any return annotation.
            let same = fa.header == fb.header
                && multiset(&statements(fa)) == multiset(&statements(fb));
            (same, StructuralBranch::FlatMultiset)
        }
        _ => (a == b, StructuralBranch::ExactTree),
    }
}
