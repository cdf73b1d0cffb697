// SPDX-License-Identifier: MIT

//! Graph builder and compile-time validation

use super::types::{EdgeSpec, Target};
use crate::lca::workflow::error::ValidationError;
use crate::lca::workflow::state::StateSchema;
use crate::lca::workflow::step::StepDescriptor;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Collects steps and edges, then validates them into a [`CompiledGraph`]
pub struct GraphBuilder {
    name: String,
    schema: StateSchema,
    steps: Vec<StepDescriptor>,
    edges: Vec<EdgeSpec>,
    entries: Vec<String>,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: StateSchema::new(),
            steps: Vec::new(),
            edges: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    pub fn entry(mut self, step: &str) -> Self {
        self.entries.push(step.to_string());
        self
    }

    /// Static edge `from -> to`
    pub fn edge(mut self, from: &str, to: Target) -> Self {
        self.edges.push(EdgeSpec::fixed(from, to));
        self
    }

    /// Any edge, typically one built with [`EdgeSpec::conditional`]
    pub fn edge_spec(mut self, edge: EdgeSpec) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn compile(self) -> Result<CompiledGraph, ValidationError> {
        compile(self.name, self.schema, self.steps, self.edges, self.entries)
    }
}

struct GraphInner {
    name: String,
    schema: StateSchema,
    steps: HashMap<String, StepDescriptor>,
    order: Vec<String>,
    entries: Vec<String>,
    outgoing: HashMap<String, Vec<EdgeSpec>>,
}

/// A validated, immutable workflow graph; cheap to clone and share across runs
#[derive(Clone)]
pub struct CompiledGraph {
    inner: Arc<GraphInner>,
}

impl CompiledGraph {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.inner.schema
    }

    pub fn step(&self, name: &str) -> Option<&StepDescriptor> {
        self.inner.steps.get(name)
    }

    /// Steps in declaration order
    pub fn steps(&self) -> impl Iterator<Item = &StepDescriptor> {
        self.inner
            .order
            .iter()
            .filter_map(|name| self.inner.steps.get(name))
    }

    pub fn entries(&self) -> &[String] {
        &self.inner.entries
    }

    pub fn outgoing(&self, step: &str) -> &[EdgeSpec] {
        self.inner
            .outgoing
            .get(step)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    /// True when only routers can activate `step`
    pub fn is_router_gated(&self, step: &str) -> bool {
        if self.inner.entries.iter().any(|entry| entry == step) {
            return false;
        }
        !self.inner.outgoing.values().flatten().any(|edge| {
            matches!(edge, EdgeSpec::Static { to: Target::Step(to), .. } if to == step)
        })
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.inner.name)
            .field("steps", &self.inner.order)
            .field("entries", &self.inner.entries)
            .finish()
    }
}

/// Validate a set of steps and edges into an executable graph
pub fn compile(
    name: String,
    schema: StateSchema,
    steps: Vec<StepDescriptor>,
    edges: Vec<EdgeSpec>,
    entries: Vec<String>,
) -> Result<CompiledGraph, ValidationError> {
    let mut order = Vec::with_capacity(steps.len());
    let mut by_name: HashMap<String, StepDescriptor> = HashMap::new();
    for step in steps {
        if by_name.contains_key(&step.name) {
            return Err(ValidationError::DuplicateStep(step.name));
        }
        order.push(step.name.clone());
        by_name.insert(step.name.clone(), step);
    }

    check_entries(&by_name, &entries)?;
    check_references(&by_name, &order, &edges)?;
    check_writers(&by_name, &order, &schema)?;

    let index: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    check_static_cycles(&order, &index, &edges)?;
    check_prerequisite_cycles(&by_name, &order, &index)?;
    check_reachability(&order, &index, &edges, &entries)?;

    let mut outgoing: HashMap<String, Vec<EdgeSpec>> = HashMap::new();
    for edge in edges {
        outgoing
            .entry(edge.from().to_string())
            .or_default()
            .push(edge);
    }

    log::debug!(
        "Compiled graph '{}' with {} steps, entries {:?}",
        name,
        order.len(),
        entries
    );

    Ok(CompiledGraph {
        inner: Arc::new(GraphInner {
            name,
            schema,
            steps: by_name,
            order,
            entries,
            outgoing,
        }),
    })
}

fn check_entries(
    steps: &HashMap<String, StepDescriptor>,
    entries: &[String],
) -> Result<(), ValidationError> {
    if entries.is_empty() {
        return Err(ValidationError::NoEntry);
    }
    for entry in entries {
        let step = steps
            .get(entry)
            .ok_or_else(|| ValidationError::UnknownEntry(entry.clone()))?;
        if !step.after.is_empty() {
            return Err(ValidationError::EntryHasPrerequisites {
                step: entry.clone(),
                prerequisites: step.after.clone(),
            });
        }
    }
    Ok(())
}

fn check_references(
    steps: &HashMap<String, StepDescriptor>,
    order: &[String],
    edges: &[EdgeSpec],
) -> Result<(), ValidationError> {
    let unknown = |from: &str, to: &str| ValidationError::UnknownStepReference {
        from: from.to_string(),
        to: to.to_string(),
    };

    for name in order {
        for prerequisite in &steps[name].after {
            if !steps.contains_key(prerequisite) {
                return Err(unknown(name, prerequisite));
            }
        }
    }

    for edge in edges {
        let from = edge.from();
        if !steps.contains_key(from) {
            return Err(unknown("<edge>", from));
        }
        match edge {
            EdgeSpec::Static { to, .. } => {
                if let Target::Step(to) = to {
                    if !steps.contains_key(to) {
                        return Err(unknown(from, to));
                    }
                }
            }
            EdgeSpec::Conditional(conditional) => {
                for (outcome, target) in &conditional.routes {
                    match target {
                        None => {
                            return Err(ValidationError::UnmappedOutcome {
                                from: from.to_string(),
                                outcome: outcome.clone(),
                            })
                        }
                        Some(Target::Step(to)) if !steps.contains_key(to) => {
                            return Err(unknown(from, to));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }
    Ok(())
}

/// Overwrite fields must have exactly one writer; commutative reducers may have many
fn check_writers(
    steps: &HashMap<String, StepDescriptor>,
    order: &[String],
    schema: &StateSchema,
) -> Result<(), ValidationError> {
    let mut writers: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for name in order {
        for field in &steps[name].outputs {
            writers
                .entry(field.as_str())
                .or_default()
                .push(name.clone());
        }
    }

    for (field, mut names) in writers {
        if names.len() > 1 && !schema.reducer(field).is_commutative() {
            names.sort();
            return Err(ValidationError::AmbiguousWriter {
                field: field.to_string(),
                steps: names,
            });
        }
    }
    Ok(())
}

fn new_graph<'a>(order: &'a [String]) -> (DiGraph<&'a str, ()>, Vec<NodeIndex>) {
    let mut graph = DiGraph::<&str, ()>::new();
    let nodes = order
        .iter()
        .map(|name| graph.add_node(name.as_str()))
        .collect();
    (graph, nodes)
}

fn check_static_cycles(
    order: &[String],
    index: &HashMap<&str, usize>,
    edges: &[EdgeSpec],
) -> Result<(), ValidationError> {
    let (mut graph, nodes) = new_graph(order);
    for edge in edges {
        if let EdgeSpec::Static {
            from,
            to: Target::Step(to),
        } = edge
        {
            graph.add_edge(nodes[index[from.as_str()]], nodes[index[to.as_str()]], ());
        }
    }

    toposort(&graph, None)
        .map(|_| ())
        .map_err(|cycle| {
            ValidationError::CyclicUnconditionalPath(graph[cycle.node_id()].to_string())
        })
}

fn check_prerequisite_cycles(
    steps: &HashMap<String, StepDescriptor>,
    order: &[String],
    index: &HashMap<&str, usize>,
) -> Result<(), ValidationError> {
    let (mut graph, nodes) = new_graph(order);
    for name in order {
        for prerequisite in &steps[name].after {
            graph.add_edge(
                nodes[index[prerequisite.as_str()]],
                nodes[index[name.as_str()]],
                (),
            );
        }
    }

    toposort(&graph, None)
        .map(|_| ())
        .map_err(|cycle| ValidationError::CyclicPrerequisites(graph[cycle.node_id()].to_string()))
}

fn check_reachability(
    order: &[String],
    index: &HashMap<&str, usize>,
    edges: &[EdgeSpec],
    entries: &[String],
) -> Result<(), ValidationError> {
    let (mut graph, nodes) = new_graph(order);
    for edge in edges {
        let from = nodes[index[edge.from()]];
        let targets: Vec<&Target> = match edge {
            EdgeSpec::Static { to, .. } => vec![to],
            EdgeSpec::Conditional(conditional) => conditional.targets().collect(),
        };
        for name in targets.into_iter().filter_map(|t| t.step_name()) {
            graph.add_edge(from, nodes[index[name]], ());
        }
    }

    let mut reached: HashSet<NodeIndex> = HashSet::new();
    for entry in entries {
        let mut bfs = Bfs::new(&graph, nodes[index[entry.as_str()]]);
        while let Some(node) = bfs.next(&graph) {
            reached.insert(node);
        }
    }

    let unreached = order
        .iter()
        .zip(&nodes)
        .find(|(_, node)| !reached.contains(*node));
    match unreached {
        Some((name, _)) => Err(ValidationError::UnreachableStep(name.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lca::workflow::graph::RouteOutcome;
    use crate::lca::workflow::state::{ReducerType, StateUpdate, WorkflowState};
    use crate::lca::workflow::step::{step_fn, StepContext};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Again {
        Repeat,
        Stop,
    }

    impl RouteOutcome for Again {
        fn all() -> &'static [Self] {
            &[Again::Repeat, Again::Stop]
        }
    }

    fn noop(name: &str) -> StepDescriptor {
        StepDescriptor::new(
            name,
            step_fn(|_ctx: StepContext| async { Ok(StateUpdate::new()) }),
        )
    }

    fn stop_router(_state: &WorkflowState) -> Vec<Again> {
        vec![Again::Stop]
    }

    fn diamond() -> GraphBuilder {
        GraphBuilder::new("diamond")
            .step(noop("a").writes(&["x"]))
            .step(noop("b").writes(&["y"]))
            .step(noop("c").writes(&["z"]))
            .step(noop("d").after(&["b", "c"]))
            .entry("a")
            .edge("a", Target::step("b"))
            .edge("a", Target::step("c"))
            .edge("b", Target::step("d"))
            .edge("c", Target::step("d"))
            .edge("d", Target::End)
    }

    #[test]
    fn test_compile_valid_graph() {
        let graph = diamond().compile().unwrap();
        assert_eq!(graph.name(), "diamond");
        assert_eq!(graph.entries(), &["a".to_string()]);
        assert_eq!(graph.outgoing("a").len(), 2);
        assert!(graph.outgoing("unknown").is_empty());
        let names: Vec<&str> = graph.steps().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_router_self_loop_is_allowed() {
        let graph = GraphBuilder::new("loop")
            .step(noop("scan"))
            .entry("scan")
            .edge_spec(EdgeSpec::conditional(
                "scan",
                stop_router,
                &[
                    (Again::Repeat, Target::step("scan")),
                    (Again::Stop, Target::End),
                ],
            ))
            .compile();
        assert!(graph.is_ok());
    }

    #[test]
    fn test_duplicate_step() {
        let err = diamond().step(noop("b")).compile().unwrap_err();
        assert_eq!(err, ValidationError::DuplicateStep("b".into()));
    }

    #[test]
    fn test_missing_and_unknown_entry() {
        let err = GraphBuilder::new("g")
            .step(noop("a"))
            .compile()
            .unwrap_err();
        assert_eq!(err, ValidationError::NoEntry);

        let err = GraphBuilder::new("g")
            .step(noop("a"))
            .entry("z")
            .compile()
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownEntry("z".into()));
    }

    #[test]
    fn test_entry_with_prerequisites() {
        let err = GraphBuilder::new("g")
            .step(noop("a"))
            .step(noop("b").after(&["a"]))
            .entry("a")
            .entry("b")
            .edge("a", Target::step("b"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, ValidationError::EntryHasPrerequisites { step, .. } if step == "b"));
    }

    #[test]
    fn test_unknown_references() {
        let err = diamond()
            .edge("d", Target::step("nowhere"))
            .compile()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownStepReference {
                from: "d".into(),
                to: "nowhere".into()
            }
        );

        let err = diamond()
            .step(noop("e").after(&["ghost"]))
            .edge("d", Target::step("e"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownStepReference { to, .. } if to == "ghost"));

        let err = diamond()
            .edge_spec(EdgeSpec::conditional(
                "d",
                stop_router,
                &[
                    (Again::Repeat, Target::step("typo")),
                    (Again::Stop, Target::End),
                ],
            ))
            .compile()
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownStepReference { to, .. } if to == "typo"));
    }

    #[test]
    fn test_unmapped_outcome() {
        let err = diamond()
            .edge_spec(EdgeSpec::conditional(
                "d",
                stop_router,
                &[(Again::Repeat, Target::step("a"))],
            ))
            .compile()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnmappedOutcome {
                from: "d".into(),
                outcome: "Stop".into()
            }
        );
    }

    #[test]
    fn test_unreachable_step() {
        let err = diamond().step(noop("island")).compile().unwrap_err();
        assert_eq!(err, ValidationError::UnreachableStep("island".into()));
    }

    #[test]
    fn test_static_cycle_rejected() {
        let err = diamond()
            .edge("d", Target::step("a"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, ValidationError::CyclicUnconditionalPath(_)));
    }

    #[test]
    fn test_prerequisite_cycle_rejected() {
        let err = GraphBuilder::new("g")
            .step(noop("root"))
            .step(noop("a").after(&["b"]))
            .step(noop("b").after(&["a"]))
            .entry("root")
            .edge("root", Target::step("a"))
            .edge("root", Target::step("b"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, ValidationError::CyclicPrerequisites(_)));
    }

    #[test]
    fn test_ambiguous_writer() {
        let err = diamond()
            .step(noop("e").writes(&["x"]))
            .edge("d", Target::step("e"))
            .compile()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::AmbiguousWriter {
                field: "x".into(),
                steps: vec!["a".into(), "e".into()]
            }
        );
    }

    #[test]
    fn test_shared_append_field_is_allowed() {
        let schema = StateSchema::new().field("sources", ReducerType::UnionByKey("url".into()));
        let graph = GraphBuilder::new("g")
            .schema(schema)
            .step(noop("a").writes(&["sources"]))
            .step(noop("b").writes(&["sources"]))
            .entry("a")
            .entry("b")
            .compile();
        assert!(graph.is_ok());
    }
}
