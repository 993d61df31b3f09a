//! This crate contains a set of helpers to build whole-program static
//! analysis tools. The building blocks include helpers for
//! [control flow graphs](https://en.wikipedia.org/wiki/Control-flow_graph),
//! worklist based solvers to propagate facts over (possibly cyclic) graphs
//! like [call graphs](https://en.wikipedia.org/wiki/Call_graph), and a
//! write-once fact store that lets the results computed for one compilation
//! unit be reused by the units analyzed after it.
//!
//! None of the helpers know anything about a concrete intermediate
//! representation. Look at the tir-lib crate for an example how to define
//! analyses using the helpers in this crate.
//!
//! Some resources to learn more about interprocedural analysis:
//! * [Static Program Analysis, Anders Møller and Michael I. Schwartzbach](https://cs.au.dk/~amoeller/spa/)
//! * [Data Flow Analysis: Theory and Practice](https://www.amazon.com/Data-Flow-Analysis-Theory-Practice/dp/0849328802)
//! * [Practical Virtual Method Call Resolution for Java](https://dl.acm.org/doi/10.1145/353171.353189)
//!
//! Frameworks:
//! * [PHASAR](https://phasar.org/)
//! * [Infer](https://fbinfer.com/)
//! * [WALA](https://github.com/wala/WALA)

/// Trait for defining a control flow graph, and some algorithms and data
/// structures to make it easier to work with them.
pub mod cfg;

/// Session scoped storage for facts proven about symbols.
pub mod facts;

/// Implementations of fixed-point iteration algorithms using worklists.
pub mod solvers;


#[cfg(test)]
mod facts_tests;
