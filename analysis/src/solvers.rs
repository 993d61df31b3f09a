use fixedbitset::FixedBitSet;

/// Propagate a boolean fact backwards over a graph with dense node indices.
/// Every seed is marked, then every predecessor of a marked node is marked,
/// transitively. The graph may contain cycles; the done set guarantees each
/// node is finalized exactly once, so the number of steps is bounded by the
/// number of edges.
///
/// # Arguments
///
/// * `node_num` - The number of nodes, node indices are in `0..node_num`.
/// * `seeds` - Nodes where the fact holds initially.
/// * `preds` - Returns the predecessors of a node (e.g., the callers of a
///   function).
/// * `on_mark` - Called once for every node the first time it gets marked,
///   together with the node that caused the marking (`None` for seeds).
pub fn propagate_backward<Preds, I, OnMark>(
    node_num: usize,
    seeds: impl IntoIterator<Item = usize>,
    mut preds: Preds,
    mut on_mark: OnMark,
) -> FixedBitSet
where
    Preds: FnMut(usize) -> I,
    I: IntoIterator<Item = usize>,
    OnMark: FnMut(usize, Option<usize>),
{
    let mut done = FixedBitSet::with_capacity(node_num);
    let mut worklist = Vec::new();
    for seed in seeds {
        if !done.put(seed) {
            on_mark(seed, None);
            worklist.push(seed);
        }
    }

    while let Some(current) = worklist.pop() {
        for pred in preds(current) {
            if !done.put(pred) {
                on_mark(pred, Some(current));
                worklist.push(pred);
            }
        }
    }
    done
}

/// Inclusion-constraint solver. Each node holds a set of values from a
/// finite universe, and each edge `from -> to` requires the set at `from`
/// to be a subset of the set at `to`. Solving computes the least solution
/// that satisfies every constraint, starting from the seeded values.
///
/// This is the core of type propagation style call graph refinements,
/// where the values are the functions or concrete types that may flow into
/// a variable.
#[derive(Clone, Debug)]
pub struct SubsetFlow {
    succs: Vec<Vec<usize>>,
    sets: Vec<FixedBitSet>,
    universe: usize,
}

impl SubsetFlow {
    pub fn new(node_num: usize, universe: usize) -> Self {
        Self {
            succs: vec![Vec::new(); node_num],
            sets: vec![FixedBitSet::with_capacity(universe); node_num],
            universe,
        }
    }

    pub fn node_num(&self) -> usize {
        self.sets.len()
    }

    pub fn add_edge(&mut self, from: usize, to: usize) -> &mut Self {
        if from != to && !self.succs[from].contains(&to) {
            self.succs[from].push(to);
        }
        self
    }

    pub fn seed(&mut self, node: usize, value: usize) -> &mut Self {
        debug_assert!(value < self.universe);
        self.sets[node].insert(value);
        self
    }

    /// Run the solver to a fixed point. Termination follows from the sets
    /// only growing and the universe being finite.
    pub fn solve(&mut self) {
        let mut queued = FixedBitSet::with_capacity(self.node_num());
        let mut worklist: Vec<usize> = (0..self.node_num())
            .filter(|&node| !self.sets[node].is_clear())
            .collect();
        for &node in &worklist {
            queued.insert(node);
        }

        while let Some(current) = worklist.pop() {
            queued.set(current, false);
            let incoming = self.sets[current].clone();
            for &next in &self.succs[current] {
                if incoming.is_subset(&self.sets[next]) {
                    continue;
                }
                self.sets[next].union_with(&incoming);
                if !queued.put(next) {
                    worklist.push(next);
                }
            }
        }
    }

    /// The values that may reach a node, in increasing order.
    pub fn values(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.sets[node].ones()
    }
}
