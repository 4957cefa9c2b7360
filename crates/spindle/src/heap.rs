//! The graph heap: an arena of nodes addressed by dense indices.
//!
//! Nodes are allocated by machine instructions and mutated only through
//! `Update`, which overwrites a node with an indirection to the result so every
//! existing reference transparently forwards. Nothing is ever freed within a
//! run; the resource tracker bounds growth instead of a collector.

use smallvec::SmallVec;

use crate::{gmachine::Code, names::NameId, value::Atom};

/// Address of a node in the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Addr(u32);

impl Addr {
    /// Placeholder target used by `Alloc` before `letrec` patching.
    pub const NULL: Self = Self(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A heap node.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    /// An atomic value in WHNF.
    Num(Atom),
    /// An application of `func` to `arg`.
    App(Addr, Addr),
    /// A supercombinator closure.
    Global { name: NameId, arity: usize, code: Code },
    /// Forwarding pointer installed by `Update`.
    Ind(Addr),
    /// A saturated constructor value.
    Data { tag: u32, fields: SmallVec<[Addr; 2]> },
}

impl Node {
    /// Short description for machine diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Num(atom) => atom.describe(),
            Self::App(..) => "application".to_owned(),
            Self::Global { arity, .. } => format!("supercombinator of arity {arity}"),
            Self::Ind(_) => "indirection".to_owned(),
            Self::Data { tag, fields } => format!("constructor <{tag}> with {} fields", fields.len()),
        }
    }
}

/// The arena.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    nodes: Vec<Node>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a node and returns its address.
    pub fn alloc(&mut self, node: Node) -> Addr {
        let addr = Addr(u32::try_from(self.nodes.len()).expect("heap exceeds u32 addresses"));
        self.nodes.push(node);
        addr
    }

    /// Looks a node up; `None` for the null placeholder or an out-of-range address.
    pub fn get(&self, addr: Addr) -> Option<&Node> {
        if addr == Addr::NULL {
            return None;
        }
        self.nodes.get(addr.index())
    }

    /// Overwrites the node at `addr` in place.
    pub fn update(&mut self, addr: Addr, node: Node) {
        self.nodes[addr.index()] = node;
    }
}
