//! The G-machine: a lazy graph-reducing interpreter.
//!
//! State is the classic five-tuple — code, stack, dump, heap, globals — evolved
//! by a single-threaded step function. Code is a stack of shared instruction
//! blocks so `Cond` and `CaseJump` arms splice in without copying; the dump
//! saves whole (code, stack) continuations around strict sub-evaluations.
//!
//! `Unwind` drives reduction: it forwards through indirections, descends
//! application spines, enters saturated supercombinators after rearranging the
//! argument addresses onto the stack, and treats an unsaturated application as
//! a value when a dump frame is waiting for it. Sharing comes from `Update`
//! overwriting the redex root with an indirection, which makes every later
//! demand see the result instead of re-reducing.

use smallvec::SmallVec;

use crate::{
    error::{RunError, RunErrorKind, RunResult},
    gmachine::op::{Code, Instr},
    heap::{Addr, Heap, Node},
    names::{NameId, Names},
    resource::ResourceTracker,
    symtab::SymbolTable,
    tracer::MachineTracer,
    value::{Atom, BinaryOp, Output},
};

/// Tag of the predeclared empty-list constructor.
pub(crate) const NIL_TAG: u32 = 1;
/// Tag of the predeclared list-cell constructor.
pub(crate) const CONS_TAG: u32 = 2;

/// One shared instruction block with its instruction pointer.
#[derive(Debug)]
struct CodeFrame {
    code: Code,
    ip: usize,
}

/// A continuation saved by `Eval` around a strict sub-evaluation.
#[derive(Debug)]
struct DumpFrame {
    frames: Vec<CodeFrame>,
    stack: Vec<Addr>,
}

/// The G-machine.
#[derive(Debug)]
pub(crate) struct Machine<'a, R: ResourceTracker, T: MachineTracer> {
    heap: Heap,
    stack: Vec<Addr>,
    frames: Vec<CodeFrame>,
    dump: Vec<DumpFrame>,
    /// Global addresses, indexed densely by `NameId`.
    globals: Vec<Option<Addr>>,
    names: &'a Names,
    unwind_code: Code,
    tracker: R,
    tracer: T,
}

/// What `Unwind` decided to do with the node at the top of the stack.
enum UnwindStep {
    /// Indirection: replace the top and keep going.
    Forward(Addr),
    /// Application: push the function and keep going.
    Descend(Addr),
    /// WHNF reached.
    Value,
    /// A supercombinator to enter.
    Enter { name: NameId, arity: usize, code: Code },
}

impl<'a, R: ResourceTracker, T: MachineTracer> Machine<'a, R, T> {
    /// Builds the initial state: one `Global` node per symbol-table record.
    pub fn new(symtab: &SymbolTable, names: &'a Names, tracker: R, tracer: T) -> Self {
        let mut heap = Heap::new();
        let mut globals = vec![None; names.len()];
        for record in symtab.iter() {
            let addr = heap.alloc(Node::Global {
                name: record.name,
                arity: record.arity,
                code: record.code.clone(),
            });
            globals[record.name.index()] = Some(addr);
        }
        Self {
            heap,
            stack: Vec::new(),
            frames: Vec::new(),
            dump: Vec::new(),
            globals,
            names,
            unwind_code: std::sync::Arc::new(vec![Instr::Unwind]),
            tracker,
            tracer,
        }
    }

    /// Evaluates the given global to WHNF and renders it to printed form.
    pub fn evaluate(&mut self, entry: NameId) -> RunResult<Output> {
        let addr = self.global_addr(entry)?;
        let whnf = self.reduce(addr)?;
        self.render_whnf(whnf)
    }

    // --- driver loop ---

    /// Reduces the graph at `addr` to WHNF and returns the (chased) result.
    ///
    /// A sentinel dump frame catches partial applications, so an unsaturated
    /// result comes back as the spine root instead of underflowing.
    fn reduce(&mut self, addr: Addr) -> RunResult<Addr> {
        self.stack.clear();
        self.frames.clear();
        self.dump.clear();
        self.dump.push(DumpFrame {
            frames: Vec::new(),
            stack: Vec::new(),
        });
        self.stack.push(addr);
        self.push_code(self.unwind_code.clone());
        self.run_loop()?;
        let result = self
            .stack
            .last()
            .copied()
            .ok_or_else(|| RunError::underflow("reduction finished with an empty stack"))?;
        self.chase(result)
    }

    fn run_loop(&mut self) -> RunResult<()> {
        loop {
            let Some(instr) = self.fetch() else {
                if self.dump.is_empty() {
                    return Ok(());
                }
                return Err(RunError::bad_program("code exhausted with suspended evaluations"));
            };
            self.tracker.on_step()?;
            self.tracer.on_instruction(&instr, self.stack.len(), self.dump.len());
            self.step(instr)?;
        }
    }

    fn fetch(&mut self) -> Option<Instr> {
        loop {
            let frame = self.frames.last_mut()?;
            if frame.ip < frame.code.len() {
                let instr = frame.code[frame.ip].clone();
                frame.ip += 1;
                return Some(instr);
            }
            self.frames.pop();
        }
    }

    fn step(&mut self, instr: Instr) -> RunResult<()> {
        match instr {
            Instr::PushGlobal(id) => {
                let addr = self.global_addr(id)?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::PushInt(n) => {
                let addr = self.alloc(Node::Num(Atom::Int(n)))?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::PushDecimal(d) => {
                let addr = self.alloc(Node::Num(Atom::Decimal(d)))?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::PushChar(c) => {
                let addr = self.alloc(Node::Num(Atom::Char(c)))?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::PushBool(b) => {
                let addr = self.alloc(Node::Num(Atom::Bool(b)))?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::Push(k) => {
                let addr = self.peek(k)?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::MkApp => {
                let func = self.pop()?;
                let arg = self.pop()?;
                let addr = self.alloc(Node::App(func, arg))?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::Update(k) => {
                let result = self.pop()?;
                let target = self.peek(k)?;
                self.heap.update(target, Node::Ind(result));
                Ok(())
            }
            Instr::Pop(k) => self.drop_entries(k),
            Instr::Alloc(k) => {
                for _ in 0..k {
                    let addr = self.alloc(Node::Ind(Addr::NULL))?;
                    self.stack.push(addr);
                }
                Ok(())
            }
            Instr::Slide(k) => {
                let top = self.pop()?;
                self.drop_entries(k)?;
                self.stack.push(top);
                Ok(())
            }
            Instr::Unwind => self.unwind(),
            Instr::Eval => {
                let addr = self.pop()?;
                let addr = self.chase(addr)?;
                match self.node(addr)? {
                    Node::Num(_) | Node::Data { .. } => {
                        self.stack.push(addr);
                        Ok(())
                    }
                    _ => {
                        let frames = std::mem::take(&mut self.frames);
                        let stack = std::mem::replace(&mut self.stack, vec![addr]);
                        self.dump.push(DumpFrame { frames, stack });
                        self.tracer.on_dump_transition(true, self.dump.len());
                        self.push_code(self.unwind_code.clone());
                        Ok(())
                    }
                }
            }
            Instr::Return => {
                let result = self
                    .stack
                    .first()
                    .copied()
                    .ok_or_else(|| RunError::underflow("'Return' on an empty stack"))?;
                self.return_to_caller(result)
            }
            Instr::Binary(op) => {
                self.tracer.on_primop(op);
                let rhs_addr = self.pop()?;
                let lhs_addr = self.pop()?;
                let lhs = self.atom_at(lhs_addr, op)?;
                let rhs = self.atom_at(rhs_addr, op)?;
                let value = Atom::binary(op, &lhs, &rhs)?;
                let addr = self.alloc(Node::Num(value))?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::Neg => {
                let addr = self.pop()?;
                let addr = self.chase(addr)?;
                let value = match self.node(addr)? {
                    Node::Num(atom) => atom.negate()?,
                    other => {
                        return Err(RunError::type_error(format!(
                            "'negate' applied to {}",
                            other.describe()
                        )));
                    }
                };
                let addr = self.alloc(Node::Num(value))?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::Cond(then_code, else_code) => {
                let addr = self.pop()?;
                let addr = self.chase(addr)?;
                let flag = match self.node(addr)? {
                    Node::Num(atom) => atom.as_bool()?,
                    other => {
                        return Err(RunError::type_error(format!(
                            "condition evaluated to {}",
                            other.describe()
                        )));
                    }
                };
                self.push_code(if flag { then_code } else { else_code });
                Ok(())
            }
            Instr::Pack { tag, arity } => {
                let mut fields = SmallVec::with_capacity(arity as usize);
                for _ in 0..arity {
                    fields.push(self.pop()?);
                }
                let addr = self.alloc(Node::Data { tag, fields })?;
                self.stack.push(addr);
                Ok(())
            }
            Instr::CaseJump(arms) => {
                let top = self.peek(0)?;
                let chased = self.chase(top)?;
                let last = self
                    .stack
                    .last_mut()
                    .ok_or_else(|| RunError::underflow("'CaseJump' on an empty stack"))?;
                *last = chased;
                let tag = match self.node(chased)? {
                    Node::Data { tag, .. } => *tag,
                    other => {
                        return Err(RunError::type_error(format!(
                            "case scrutinee reduced to {}",
                            other.describe()
                        )));
                    }
                };
                match arms.iter().find(|(t, _)| *t == tag) {
                    Some((_, code)) => {
                        self.push_code(code.clone());
                        Ok(())
                    }
                    None => Err(RunError::new(
                        RunErrorKind::NoMatchingAlternative,
                        format!("no alternative matches constructor <{tag}>"),
                    )),
                }
            }
            Instr::Split(arity) => {
                let addr = self.pop()?;
                let addr = self.chase(addr)?;
                let fields = match self.node(addr)? {
                    Node::Data { tag, fields } => {
                        if fields.len() != arity as usize {
                            return Err(RunError::type_error(format!(
                                "constructor <{tag}> has {} fields but the pattern binds {arity}",
                                fields.len()
                            )));
                        }
                        fields.clone()
                    }
                    other => {
                        return Err(RunError::type_error(format!(
                            "'Split' applied to {}",
                            other.describe()
                        )));
                    }
                };
                self.stack.extend(fields);
                Ok(())
            }
            Instr::Abort => Err(RunError::new(RunErrorKind::ExplicitAbort, "evaluation aborted".to_owned())),
        }
    }

    /// Reads the atom a strict primop operand reduced to.
    fn atom_at(&mut self, addr: Addr, op: BinaryOp) -> RunResult<Atom> {
        let addr = self.chase(addr)?;
        match self.node(addr)? {
            Node::Num(atom) => Ok(atom.clone()),
            other => Err(RunError::type_error(format!(
                "'{op}' applied to {}",
                other.describe()
            ))),
        }
    }

    // --- unwinding ---

    /// The graph-reduction driver.
    fn unwind(&mut self) -> RunResult<()> {
        loop {
            self.tracker.on_step()?;
            let top = self.peek(0)?;
            let step = match self.node(top)? {
                Node::Ind(next) => UnwindStep::Forward(*next),
                Node::App(func, _) => UnwindStep::Descend(*func),
                Node::Num(_) | Node::Data { .. } => UnwindStep::Value,
                Node::Global { name, arity, code } => UnwindStep::Enter {
                    name: *name,
                    arity: *arity,
                    code: code.clone(),
                },
            };
            match step {
                UnwindStep::Forward(next) => {
                    let last = self
                        .stack
                        .last_mut()
                        .ok_or_else(|| RunError::underflow("'Unwind' on an empty stack"))?;
                    *last = next;
                }
                UnwindStep::Descend(func) => {
                    self.stack.push(func);
                }
                UnwindStep::Value => return self.unwind_value(top),
                UnwindStep::Enter { name, arity, code } => return self.enter_global(name, arity, code),
            }
        }
    }

    /// WHNF at the top of the stack: hand it to whoever demanded it.
    fn unwind_value(&mut self, value: Addr) -> RunResult<()> {
        if self.stack.len() != 1 {
            // A number or constructor ended up in function position.
            let node = self.node(value)?;
            return Err(RunError::type_error(format!(
                "{} was applied to arguments",
                node.describe()
            )));
        }
        self.return_to_caller(value)
    }

    /// Enters a supercombinator, or returns a partial application as a value.
    fn enter_global(&mut self, name: NameId, arity: usize, code: Code) -> RunResult<()> {
        let available = self.stack.len() - 1;
        if available < arity {
            // Unsaturated: the whole spine is a value. Its root is the bottom
            // of this frame's stack.
            let root = self
                .stack
                .first()
                .copied()
                .ok_or_else(|| RunError::underflow("'Unwind' on an empty stack"))?;
            return self.return_to_caller(root);
        }
        // Rearrange: entry j takes the argument of the application node at
        // entry j + 1; the deepest of those stays put as the redex root.
        let len = self.stack.len();
        for j in 0..arity {
            let app_addr = self.stack[len - 2 - j];
            let arg = match self.node(app_addr)? {
                Node::App(_, arg) => *arg,
                other => {
                    return Err(RunError::bad_program(format!(
                        "spine entry is {}, expected an application",
                        other.describe()
                    )));
                }
            };
            self.stack[len - 1 - j] = arg;
        }
        self.tracer.on_global_entry(self.names.resolve(name), arity);
        self.push_code(code);
        Ok(())
    }

    /// Pops the dump and delivers `result` to the restored continuation; with
    /// an exhausted dump, `result` is the machine's final answer.
    fn return_to_caller(&mut self, result: Addr) -> RunResult<()> {
        match self.dump.pop() {
            Some(frame) => {
                self.tracer.on_dump_transition(false, self.dump.len());
                self.frames = frame.frames;
                self.stack = frame.stack;
                self.stack.push(result);
                Ok(())
            }
            None => {
                self.frames.clear();
                self.stack.clear();
                self.stack.push(result);
                Ok(())
            }
        }
    }

    // --- rendering ---

    /// Renders a WHNF address: atoms directly, constructors by forcing fields.
    fn render_whnf(&mut self, addr: Addr) -> RunResult<Output> {
        match self.node(addr)? {
            Node::Num(atom) => Ok(Output::from_atom(atom)),
            Node::Data { tag, fields } => {
                let tag = *tag;
                let fields: Vec<Addr> = fields.iter().copied().collect();
                if let Some(items) = self.try_render_list(addr)? {
                    return Ok(Output::List(items));
                }
                let mut rendered = Vec::with_capacity(fields.len());
                for field in fields {
                    let whnf = self.reduce(field)?;
                    rendered.push(self.render_whnf(whnf)?);
                }
                Ok(Output::Data { tag, fields: rendered })
            }
            other => Err(RunError::type_error(format!(
                "result is {}; only atoms and constructors can be rendered",
                other.describe()
            ))),
        }
    }

    /// Walks a `cons`/`nil` chain, rendering each head; `None` when the chain
    /// is not a proper list.
    fn try_render_list(&mut self, addr: Addr) -> RunResult<Option<Vec<Output>>> {
        let mut items = Vec::new();
        let mut cursor = addr;
        loop {
            let (head, tail) = match self.node(cursor)? {
                Node::Data { tag: NIL_TAG, fields } if fields.is_empty() => return Ok(Some(items)),
                Node::Data { tag: CONS_TAG, fields } if fields.len() == 2 => (fields[0], fields[1]),
                _ => return Ok(None),
            };
            let head_whnf = self.reduce(head)?;
            items.push(self.render_whnf(head_whnf)?);
            cursor = self.reduce(tail)?;
        }
    }

    // --- plumbing ---

    fn push_code(&mut self, code: Code) {
        self.frames.push(CodeFrame { code, ip: 0 });
    }

    fn global_addr(&self, id: NameId) -> RunResult<Addr> {
        self.globals
            .get(id.index())
            .copied()
            .flatten()
            .ok_or_else(|| RunError::bad_program(format!("unknown global '{}'", self.names.resolve(id))))
    }

    fn alloc(&mut self, node: Node) -> RunResult<Addr> {
        self.tracker.on_heap_alloc()?;
        Ok(self.heap.alloc(node))
    }

    fn node(&self, addr: Addr) -> RunResult<&Node> {
        self.heap
            .get(addr)
            .ok_or_else(|| RunError::bad_program("dangling heap address"))
    }

    fn pop(&mut self) -> RunResult<Addr> {
        self.stack
            .pop()
            .ok_or_else(|| RunError::underflow("pop on an empty stack"))
    }

    fn peek(&self, k: usize) -> RunResult<Addr> {
        let len = self.stack.len();
        if k < len {
            Ok(self.stack[len - 1 - k])
        } else {
            Err(RunError::underflow(format!("stack entry {k} out of {len}")))
        }
    }

    fn drop_entries(&mut self, k: usize) -> RunResult<()> {
        let len = self.stack.len();
        if k > len {
            return Err(RunError::underflow(format!("dropping {k} of {len} entries")));
        }
        self.stack.truncate(len - k);
        Ok(())
    }

    /// Follows indirections; counts as steps so indirection cycles stay
    /// bounded under a limited tracker.
    fn chase(&mut self, mut addr: Addr) -> RunResult<Addr> {
        while let Node::Ind(next) = self.node(addr)? {
            let next = *next;
            self.tracker.on_step()?;
            addr = next;
        }
        Ok(addr)
    }
}
