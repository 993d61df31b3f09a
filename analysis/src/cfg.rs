use std::fmt::Write;

/// Position of an operation within a control flow graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpPos {
    pub block_id: usize,
    pub op_id: usize,
}

pub trait CfgBlock {
    type Operation;

    fn operations(&self) -> &[Self::Operation];
    fn successors(&self) -> &[usize];
    fn predecessors(&self) -> &[usize];
}

pub trait ControlFlowGraph {
    type Block: CfgBlock;
    fn blocks(&self) -> &[Self::Block];

    /// The block executed before any branch. Empty graphs have no entry.
    fn entry(&self) -> Option<&Self::Block> {
        self.blocks().first()
    }

    /// Iterate over every operation together with its position.
    fn operations(
        &self,
    ) -> impl Iterator<Item = (OpPos, &<Self::Block as CfgBlock>::Operation)> {
        self.blocks().iter().enumerate().flat_map(|(block_id, block)| {
            block
                .operations()
                .iter()
                .enumerate()
                .map(move |(op_id, op)| (OpPos { block_id, op_id }, op))
        })
    }
}

pub trait MutableCfg: ControlFlowGraph {
    fn new_block(&mut self) -> usize;
    fn add_edge(&mut self, from: usize, to: usize) -> &mut Self;

    fn add_edges(&mut self, edges: &[(usize, usize)]) -> &mut Self {
        for &(from, to) in edges {
            self.add_edge(from, to);
        }
        self
    }
}

pub fn print<Cfg, OpPrinter>(name: Option<&str>, cfg: &Cfg, printer: OpPrinter) -> String
where
    Cfg: ControlFlowGraph,
    OpPrinter: Fn(&<<Cfg as ControlFlowGraph>::Block as CfgBlock>::Operation) -> String,
{
    let mut output = format!("digraph {} {{\n", name.unwrap_or("CFG"));
    for (counter, block) in cfg.blocks().iter().enumerate() {
        write!(output, "  Node_{counter}[label=\"").unwrap();
        let text: Vec<_> = block.operations().iter().map(&printer).collect();
        output.push_str(&text.join("\\n"));
        output.push_str("\"]\n");
    }
    output.push('\n');
    for (counter, block) in cfg.blocks().iter().enumerate() {
        for next in block.successors() {
            writeln!(output, "  Node_{counter} -> Node_{next}").unwrap();
        }
    }
    output.push_str("}\n");
    output
}
