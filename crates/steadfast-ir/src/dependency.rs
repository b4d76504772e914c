//! Heuristic dependency inference over effect descriptions.
//!
//! An edge `i -> j` in an [`EffectDependencyGraph`] means effect `j` must not
//! be moved before effect `i`. Edges come from [`DEPENDENCY_RULES`], a small
//! ordered list of named predicates that are OR-combined. The rules
//! over-approximate: when a pair is ambiguous it is treated as dependent. A
//! cycle, should one arise, pins the whole list to its original order.

use std::collections::HashSet;
use std::sync::OnceLock;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

/// Verbs that suggest an effect mutates state.
const WRITE_VERBS: &[&str] = &[
    "write", "set", "update", "insert", "add", "append", "create", "delete", "remove", "store",
    "save", "modify", "assign", "increment", "decrement", "push", "pop", "put", "clear", "reset",
    "initialize", "mutate", "replace", "record", "overwrite",
];

/// Verbs that suggest an effect observes state.
const READ_VERBS: &[&str] = &[
    "read", "get", "fetch", "load", "query", "check", "compute", "return", "use", "validate",
    "calculate", "verify", "count", "find", "select", "compare", "lookup", "inspect", "sum",
    "divide", "filter", "sort", "emit", "output", "print",
];

/// Tokens that never count as evidence of a shared subject.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "onto", "this", "that", "each", "all", "any",
    "its", "their", "then", "when", "value", "values", "result", "results", "given", "new", "old",
];

/// Strip one common inflection so `updates`, `updated` and `update` compare equal.
fn stem(word: &str) -> &str {
    for suffix in ["ing", "ed", "es", "s", "e"] {
        if let Some(base) = word.strip_suffix(suffix) {
            if base.len() >= 3 {
                return base;
            }
        }
    }
    word
}

fn stems_of(words: &[&'static str]) -> HashSet<&'static str> {
    words.iter().map(|&w| stem(w)).collect()
}

/// Stemmed word lists, built once per process.
struct Lexicon {
    write: HashSet<&'static str>,
    read: HashSet<&'static str>,
    stop: HashSet<&'static str>,
}

fn lexicon() -> &'static Lexicon {
    static LEXICON: OnceLock<Lexicon> = OnceLock::new();
    LEXICON.get_or_init(|| Lexicon {
        write: stems_of(WRITE_VERBS),
        read: stems_of(READ_VERBS),
        stop: stems_of(STOP_WORDS),
    })
}

/// Pre-tokenized view of one effect description.
#[derive(Debug, Clone)]
pub struct EffectText {
    normalized: String,
    stems: Vec<String>,
}

impl EffectText {
    pub fn new(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let stems = lowered
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .map(|t| stem(t).to_string())
            .collect();
        let normalized = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
        Self { normalized, stems }
    }

    fn has_any(&self, verbs: &HashSet<&'static str>) -> bool {
        self.stems.iter().any(|s| verbs.contains(s.as_str()))
    }

    /// Stems that could identify a shared subject (not verbs, not filler).
    fn subject_stems(&self) -> HashSet<&str> {
        let lex = lexicon();
        self.stems
            .iter()
            .map(String::as_str)
            .filter(|s| {
                s.len() > 2
                    && !lex.write.contains(*s)
                    && !lex.read.contains(*s)
                    && !lex.stop.contains(*s)
            })
            .collect()
    }

    fn shares_subject_with(&self, other: &EffectText) -> bool {
        let mine = self.subject_stems();
        other.subject_stems().iter().any(|s| mine.contains(*s))
    }
}

/// A named dependency heuristic. `applies(a, b)` answers "does `a` depend on `b`?"
#[derive(Clone, Copy)]
pub struct DependencyRule {
    pub name: &'static str,
    pub applies: fn(&EffectText, &EffectText) -> bool,
}

impl std::fmt::Debug for DependencyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyRule")
            .field("name", &self.name)
            .finish()
    }
}

/// `a` mutates something `b` observes.
fn write_then_read(a: &EffectText, b: &EffectText) -> bool {
    let lex = lexicon();
    a.has_any(&lex.write) && b.has_any(&lex.read) && a.shares_subject_with(b)
}

/// `b` is restated inside `a`.
fn substring(a: &EffectText, b: &EffectText) -> bool {
    !b.normalized.is_empty() && a.normalized.contains(&b.normalized)
}

/// Rules consulted by [`depends_on`], in order.
pub const DEPENDENCY_RULES: &[DependencyRule] = &[
    DependencyRule {
        name: "write_then_read",
        applies: write_then_read,
    },
    DependencyRule {
        name: "substring",
        applies: substring,
    },
];

/// Name of the first rule under which `a` depends on `b`, if any.
pub fn matching_rule(a: &EffectText, b: &EffectText) -> Option<&'static str> {
    DEPENDENCY_RULES
        .iter()
        .find(|rule| (rule.applies)(a, b))
        .map(|rule| rule.name)
}

/// Whether effect `a` depends on effect `b` under any rule.
pub fn depends_on(a: &str, b: &str) -> bool {
    matching_rule(&EffectText::new(a), &EffectText::new(b)).is_some()
}

/// Directed "must not precede" graph over effect indices.
#[derive(Debug, Clone)]
pub struct EffectDependencyGraph {
    graph: DiGraph<usize, ()>,
}

impl EffectDependencyGraph {
    /// Graph over `node_count` effects with no edges.
    pub fn with_nodes(node_count: usize) -> Self {
        let mut graph = DiGraph::with_capacity(node_count, 0);
        for idx in 0..node_count {
            graph.add_node(idx);
        }
        Self { graph }
    }

    /// Infer dependencies: edge `i -> j` whenever effect `j` depends on effect `i`.
    pub fn build<S: AsRef<str>>(effects: &[S]) -> Self {
        let texts: Vec<EffectText> = effects
            .iter()
            .map(|e| EffectText::new(e.as_ref()))
            .collect();
        let mut graph = Self::with_nodes(texts.len());
        for i in 0..texts.len() {
            for j in 0..texts.len() {
                if i == j {
                    continue;
                }
                if let Some(rule) = matching_rule(&texts[j], &texts[i]) {
                    debug!(from = i, to = j, rule, "inferred effect dependency");
                    graph.add_edge(i, j);
                }
            }
        }
        graph
    }

    /// Add `from -> to`. Out-of-range indices are ignored.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        let n = self.node_count();
        if from < n && to < n && !self.has_edge(from, to) {
            self.graph
                .add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.graph
            .find_edge(NodeIndex::new(from), NodeIndex::new(to))
            .is_some()
    }

    /// All edges as `(from, to)` index pairs, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (a.index(), b.index()))
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Whether `order` is a permutation of the nodes that respects every edge.
    pub fn respects(&self, order: &[usize]) -> bool {
        let n = self.node_count();
        if order.len() != n {
            return false;
        }
        let mut position = vec![usize::MAX; n];
        for (pos, &node) in order.iter().enumerate() {
            if node >= n || position[node] != usize::MAX {
                return false;
            }
            position[node] = pos;
        }
        self.edges()
            .into_iter()
            .all(|(from, to)| position[from] < position[to])
    }

    fn successors(&self) -> Vec<Vec<usize>> {
        let mut succ = vec![Vec::new(); self.node_count()];
        for (from, to) in self.edges() {
            succ[from].push(to);
        }
        succ
    }
}

/// Lazy depth-first enumeration of every topological order of an acyclic graph.
///
/// Orders are produced in lexicographic order of node indices, so the identity
/// order comes first whenever it is valid. Work stops as soon as the caller
/// stops pulling.
#[derive(Debug)]
pub struct TopologicalOrderings {
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    used: Vec<bool>,
    prefix: Vec<usize>,
    cursors: Vec<usize>,
    exhausted: bool,
}

impl TopologicalOrderings {
    pub fn new(graph: &EffectDependencyGraph) -> Self {
        let successors = graph.successors();
        let mut in_degree = vec![0; successors.len()];
        for targets in &successors {
            for &t in targets {
                in_degree[t] += 1;
            }
        }
        Self {
            used: vec![false; successors.len()],
            successors,
            in_degree,
            prefix: Vec::new(),
            cursors: vec![0],
            exhausted: false,
        }
    }

    fn place(&mut self, node: usize) {
        self.used[node] = true;
        self.prefix.push(node);
        for &s in &self.successors[node] {
            self.in_degree[s] -= 1;
        }
        self.cursors.push(0);
    }

    fn unplace(&mut self) {
        self.cursors.pop();
        if let Some(node) = self.prefix.pop() {
            self.used[node] = false;
            for &s in &self.successors[node] {
                self.in_degree[s] += 1;
            }
        }
    }
}

impl Iterator for TopologicalOrderings {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let n = self.successors.len();
        loop {
            if self.exhausted {
                return None;
            }
            let depth = self.prefix.len();
            if depth == n {
                let order = self.prefix.clone();
                if n == 0 {
                    self.exhausted = true;
                } else {
                    self.unplace();
                }
                return Some(order);
            }
            let start = self.cursors[depth];
            let candidate = (start..n).find(|&c| !self.used[c] && self.in_degree[c] == 0);
            match candidate {
                Some(node) => {
                    self.cursors[depth] = node + 1;
                    self.place(node);
                }
                None if depth == 0 => self.exhausted = true,
                None => self.unplace(),
            }
        }
    }
}

/// Distinct effect orderings admitted by a dependency graph, at most `limit`.
///
/// Orderings are distinct by the resulting effect-text sequence, not by index
/// permutation, so duplicate effect texts never yield look-alike results.
#[derive(Debug)]
pub struct Orderings<'a> {
    effects: &'a [String],
    source: OrderingSource,
    seen: HashSet<Vec<&'a str>>,
    remaining: usize,
}

#[derive(Debug)]
enum OrderingSource {
    Topological(TopologicalOrderings),
    Original(Option<Vec<usize>>),
}

impl<'a> Iterator for Orderings<'a> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        while self.remaining > 0 {
            let order = match &mut self.source {
                OrderingSource::Topological(iter) => iter.next()?,
                OrderingSource::Original(slot) => slot.take()?,
            };
            let key: Vec<&'a str> = order.iter().map(|&i| self.effects[i].as_str()).collect();
            if self.seen.insert(key) {
                self.remaining -= 1;
                return Some(order);
            }
        }
        None
    }
}

/// Enumerate up to `limit` distinct orderings of `effects` consistent with `graph`.
///
/// A cyclic graph, or one whose size disagrees with `effects`, admits only
/// the original ordering.
pub fn enumerate_orderings<'a>(
    graph: &EffectDependencyGraph,
    effects: &'a [String],
    limit: usize,
) -> Orderings<'a> {
    let original: Vec<usize> = (0..effects.len()).collect();
    let source = if graph.node_count() != effects.len() {
        debug!(
            graph_nodes = graph.node_count(),
            effects = effects.len(),
            "dependency graph does not match effect list; keeping original order"
        );
        OrderingSource::Original(Some(original))
    } else if !graph.is_acyclic() {
        debug!("dependency graph is cyclic; keeping original order");
        OrderingSource::Original(Some(original))
    } else {
        OrderingSource::Topological(TopologicalOrderings::new(graph))
    };
    Orderings {
        effects,
        source,
        seen: HashSet::new(),
        remaining: limit,
    }
}
