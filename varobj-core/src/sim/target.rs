//! The simulated target
//!
//! A deterministic stand-in for a stopped program: types, globals, lexical
//! blocks with frame-relative locals, a frame stack, an RTTI table and a
//! scheduler-locking flag. Faults can be injected into any provider call to
//! exercise failure handling.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::trace;

use super::eval::{Binding, Evaluator, SimExpr, Storage};
use super::memory::Memory;
use super::parser::parse_expr;
use crate::error::EvalError;
use crate::target::{Block, CompiledExpr, FrameId, FrameProvider, SourceLanguage, ValueProvider};
use crate::types::{base_offset, check_typedef, target_type, Type, TypeRef};
use crate::value::Value;

/// Bytes reserved for the locals of each frame.
const FRAME_SIZE: u64 = 0x400;

#[derive(Debug)]
struct Scope {
    block: Block,
    /// Symbols declared directly in this block.
    symbols: HashMap<String, Binding>,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    id: FrameId,
    pc: u64,
    base: u64,
}

#[derive(Debug)]
pub struct SimTarget {
    language: SourceLanguage,
    memory: Memory,
    types: HashMap<String, TypeRef>,
    int_type: TypeRef,
    char_type: TypeRef,
    globals: HashMap<String, Binding>,
    scopes: Vec<Scope>,
    next_local: u64,
    /// Innermost frame last.
    frames: Vec<Frame>,
    selected: Option<FrameId>,
    next_frame: u64,
    scheduler_locked: bool,
    lock_acquisitions: usize,
    /// Most-derived class of objects, by address.
    rtti: BTreeMap<u64, TypeRef>,
    faults: HashSet<String>,
}

impl Default for SimTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTarget {
    pub fn new() -> Self {
        Self::with_language(SourceLanguage::C)
    }

    /// A target whose expressions compile as `language`.
    pub fn with_language(language: SourceLanguage) -> Self {
        let int_type = Type::int("int", 4, true);
        let char_type = Type::char("char", true);
        let mut target = Self {
            language,
            memory: Memory::default(),
            types: HashMap::new(),
            int_type: int_type.clone(),
            char_type: char_type.clone(),
            globals: HashMap::new(),
            scopes: Vec::new(),
            next_local: 0,
            frames: Vec::new(),
            selected: None,
            next_frame: 0,
            scheduler_locked: false,
            lock_acquisitions: 0,
            rtti: BTreeMap::new(),
            faults: HashSet::new(),
        };
        for ty in [
            int_type,
            char_type,
            Type::int("unsigned int", 4, false),
            Type::int("short", 2, true),
            Type::int("long", 8, true),
            Type::int("unsigned long", 8, false),
            Type::char("unsigned char", false),
            Type::bool("bool"),
            Type::float("float", 4),
            Type::float("double", 8),
            Type::void(),
        ] {
            target.add_type(&ty);
        }
        target
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    pub fn set_language(&mut self, language: SourceLanguage) {
        self.language = language;
    }

    /// Make a named type available to casts and type expressions.
    pub fn add_type(&mut self, ty: &TypeRef) {
        if let Some(name) = ty.name() {
            self.types.insert(name.to_string(), ty.clone());
        }
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).cloned()
    }

    pub fn int_type(&self) -> TypeRef {
        self.int_type.clone()
    }

    // Memory

    pub fn malloc(&mut self, size: u64) -> u64 {
        self.memory.alloc(size)
    }

    pub fn free(&mut self, address: u64) -> bool {
        self.memory.free(address)
    }

    pub fn poke(&mut self, address: u64, bytes: &[u8]) -> Result<(), EvalError> {
        self.memory.write(address, bytes)
    }

    pub fn peek(&self, address: u64, len: u64) -> Result<Vec<u8>, EvalError> {
        self.memory.read(address, len)
    }

    /// Store an integer of `size` bytes at `address`.
    pub fn poke_int(&mut self, address: u64, size: u64, value: i128) -> Result<(), EvalError> {
        self.memory.write(address, &value.to_le_bytes()[..size as usize])
    }

    // Symbols

    /// Define a global variable in zeroed memory and return its address.
    pub fn add_global(&mut self, name: &str, ty: &TypeRef) -> u64 {
        let address = self.memory.alloc(check_typedef(ty).size());
        self.globals.insert(
            name.to_string(),
            Binding {
                ty: ty.clone(),
                storage: Storage::Static(address),
            },
        );
        address
    }

    pub fn global_address(&self, name: &str) -> Option<u64> {
        match self.globals.get(name)?.storage {
            Storage::Static(address) => Some(address),
            Storage::Frame(_) => None,
        }
    }

    fn scope_mut(&mut self, block: Block) -> &mut Scope {
        let index = match self.scopes.iter().position(|scope| scope.block == block) {
            Some(index) => index,
            None => {
                self.scopes.push(Scope {
                    block,
                    symbols: HashMap::new(),
                });
                self.scopes.len() - 1
            }
        };
        &mut self.scopes[index]
    }

    /// Declare a function whose code occupies `[start, end)`.
    pub fn add_function(&mut self, name: &str, start: u64, end: u64) -> Block {
        let block = Block::new(start, end);
        trace!("function {} at {:#x}..{:#x}", name, start, end);
        self.scope_mut(block);
        block
    }

    /// Declare a lexical block, possibly nested in a function.
    pub fn add_block(&mut self, start: u64, end: u64) -> Block {
        let block = Block::new(start, end);
        self.scope_mut(block);
        block
    }

    /// Declare a frame-relative local of `block`.
    pub fn add_local(&mut self, block: Block, name: &str, ty: &TypeRef) {
        let size = check_typedef(ty).size().max(1);
        let offset = self.next_local;
        self.next_local += size.div_ceil(8) * 8;
        self.scope_mut(block).symbols.insert(
            name.to_string(),
            Binding {
                ty: ty.clone(),
                storage: Storage::Frame(offset),
            },
        );
    }

    /// Declare a variable with static storage that is only visible in
    /// `block`, and return its address.
    pub fn add_static(&mut self, block: Block, name: &str, ty: &TypeRef) -> u64 {
        let address = self.memory.alloc(check_typedef(ty).size());
        self.scope_mut(block).symbols.insert(
            name.to_string(),
            Binding {
                ty: ty.clone(),
                storage: Storage::Static(address),
            },
        );
        address
    }

    /// Record that the object at `address` is really a `class`.
    pub fn register_object(&mut self, address: u64, class: &TypeRef) {
        self.rtti.insert(address, class.clone());
    }

    // Frames

    /// Push a new innermost frame executing at `pc` and select it.
    pub fn push_frame(&mut self, pc: u64) -> FrameId {
        self.next_frame += 1;
        let id = FrameId(self.next_frame);
        let base = self.memory.alloc(FRAME_SIZE);
        self.frames.push(Frame { id, pc, base });
        self.selected = Some(id);
        id
    }

    /// Return from the innermost frame; the caller becomes selected.
    pub fn pop_frame(&mut self) -> Option<FrameId> {
        let frame = self.frames.pop()?;
        self.memory.free(frame.base);
        self.selected = self.frames.last().map(|frame| frame.id);
        Some(frame.id)
    }

    fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().find(|frame| frame.id == id)
    }

    pub fn set_pc(&mut self, id: FrameId, pc: u64) {
        if let Some(frame) = self.frames.iter_mut().find(|frame| frame.id == id) {
            frame.pc = pc;
        }
    }

    /// Address of a local of `frame`.
    pub fn local_address(&self, frame: FrameId, name: &str) -> Option<u64> {
        let frame = self.frame(frame)?;
        let binding = self.visible_scopes(self.innermost_block(frame.pc)?)
            .find_map(|scope| scope.symbols.get(name))?;
        match binding.storage {
            Storage::Frame(offset) => Some(frame.base + offset),
            Storage::Static(address) => Some(address),
        }
    }

    // Scheduler

    pub fn scheduler_locked(&self) -> bool {
        self.scheduler_locked
    }

    /// How many times scheduler locking was switched on.
    pub fn lock_acquisitions(&self) -> usize {
        self.lock_acquisitions
    }

    /// Make every later call of the provider operation `op` panic.
    pub fn inject_fault(&mut self, op: &str) {
        self.faults.insert(op.to_string());
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    fn check_fault(&self, op: &str) {
        if self.faults.contains(op) {
            panic!("simulated fault in {}", op);
        }
    }

    /// Smallest declared block containing `pc`.
    fn innermost_block(&self, pc: u64) -> Option<Block> {
        self.scopes
            .iter()
            .map(|scope| scope.block)
            .filter(|block| block.contains(pc))
            .min_by_key(|block| block.end - block.start)
    }

    /// Scopes enclosing `block`, innermost first.
    fn visible_scopes(&self, block: Block) -> impl Iterator<Item = &Scope> {
        let mut scopes: Vec<&Scope> = self
            .scopes
            .iter()
            .filter(|scope| scope.block.start <= block.start && block.end <= scope.block.end)
            .collect();
        scopes.sort_by_key(|scope| scope.block.end - scope.block.start);
        scopes.into_iter()
    }

    fn evaluator(&self) -> Evaluator<'_> {
        let frame_base = self
            .selected
            .and_then(|id| self.frame(id))
            .map(|frame| frame.base);
        Evaluator {
            memory: &self.memory,
            frame_base,
            int_type: &self.int_type,
            char_type: &self.char_type,
        }
    }

    fn sim_expr<'e>(&self, expr: &'e CompiledExpr) -> Result<&'e SimExpr, EvalError> {
        expr.handle::<SimExpr>()
            .ok_or_else(|| EvalError::Internal("expression was not compiled by this target".to_string()))
    }
}

impl ValueProvider for SimTarget {
    fn compile(&self, text: &str, block: Option<Block>) -> Result<CompiledExpr, EvalError> {
        self.check_fault("compile");
        let expr = parse_expr(text, &|name| self.lookup_type(name))?;
        let block = block.or_else(|| {
            self.selected
                .and_then(|id| self.frame(id))
                .and_then(|frame| self.innermost_block(frame.pc))
        });

        let mut bindings = HashMap::new();
        let mut innermost: Option<Block> = None;
        let mut unknown = None;
        expr.for_each_ident(&mut |name: &str| {
            if bindings.contains_key(name) || unknown.is_some() {
                return;
            }
            let local = block.and_then(|block| {
                self.visible_scopes(block)
                    .find(|scope| scope.symbols.contains_key(name))
                    .map(|scope| (scope.block, scope.symbols[name].clone()))
            });
            let binding = match local {
                Some((scope_block, binding)) => {
                    if matches!(binding.storage, Storage::Frame(_))
                        && innermost.map_or(true, |current| {
                            scope_block.end - scope_block.start < current.end - current.start
                        })
                    {
                        innermost = Some(scope_block);
                    }
                    binding
                }
                None => match self.globals.get(name) {
                    Some(binding) => binding.clone(),
                    None => {
                        unknown = Some(name.to_string());
                        return;
                    }
                },
            };
            bindings.insert(name.to_string(), binding);
        });
        if let Some(name) = unknown {
            return Err(EvalError::unknown_symbol(name));
        }

        let is_type = matches!(expr, super::ast::Expr::Type(_));
        let sim_expr = SimExpr { expr, bindings };
        Ok(CompiledExpr::new(self.language, innermost, is_type, sim_expr))
    }

    fn evaluate(&mut self, expr: &CompiledExpr) -> Result<Value, EvalError> {
        self.check_fault("evaluate");
        let sim_expr = self.sim_expr(expr)?;
        self.evaluator().eval(&sim_expr.expr, &sim_expr.bindings)
    }

    fn evaluate_type(&mut self, expr: &CompiledExpr) -> Result<TypeRef, EvalError> {
        self.check_fault("evaluate_type");
        let sim_expr = self.sim_expr(expr)?;
        self.evaluator().type_of(&sim_expr.expr, &sim_expr.bindings)
    }

    fn assign(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
        self.check_fault("assign");
        let address = lhs.address().ok_or(EvalError::NotAnLvalue)?;
        let evaluator = self.evaluator();
        let converted = if check_typedef(lhs.ty()).is_scalar() {
            evaluator.cast(rhs, lhs.ty())?
        } else {
            evaluator.cast(&evaluator.fetch(rhs)?, lhs.ty())?
        };
        let bytes = evaluator
            .fetch(&converted)?
            .contents()
            .map(<[u8]>::to_vec)
            .ok_or(EvalError::NotAnLvalue)?;
        self.memory.write(address, &bytes)?;
        Ok(Value::at(lhs.ty().clone(), address, bytes))
    }

    fn fetch_lazy(&mut self, value: &mut Value) -> Result<(), EvalError> {
        self.check_fault("fetch_lazy");
        let fetched = self.evaluator().fetch(value)?;
        if let Some(bytes) = fetched.contents() {
            value.set_contents(bytes.to_vec());
        }
        Ok(())
    }

    fn dynamic_type(&mut self, value: &Value) -> Result<Option<TypeRef>, EvalError> {
        self.check_fault("dynamic_type");
        let ty = check_typedef(value.ty());
        if !ty.is_pointer_or_reference() {
            return Ok(None);
        }
        let Some(pointee) = target_type(&ty).filter(|target| target.is_struct_or_union()) else {
            return Ok(None);
        };
        let address = self.evaluator().fetch(value)?.as_address().ok_or(EvalError::NotAPointer)?;
        // The object may be a base-class part of a larger registered object.
        // Lower addresses first, so the outermost enclosing object wins.
        let found = self.rtti.range(..=address).find_map(|(&object, class)| {
            let offset = address.checked_sub(object)?;
            (base_offset(class, &pointee)? == offset).then(|| class.clone())
        });
        Ok(found)
    }

    fn value_equal(&mut self, a: &Value, b: &Value) -> Result<bool, EvalError> {
        self.check_fault("value_equal");
        self.evaluator().equal(a, b)
    }

    fn subscript(&mut self, array: &Value, index: u64) -> Result<Value, EvalError> {
        self.check_fault("subscript");
        self.evaluator().subscript(array, index)
    }

    fn member(&mut self, value: &Value, name: &str) -> Result<Value, EvalError> {
        self.check_fault("member");
        self.evaluator().member(value, name)
    }

    fn dereference(&mut self, value: &Value) -> Result<Value, EvalError> {
        self.check_fault("dereference");
        self.evaluator().dereference(value)
    }

    fn cast(&mut self, value: &Value, ty: &TypeRef) -> Result<Value, EvalError> {
        self.check_fault("cast");
        self.evaluator().cast(value, ty)
    }
}

impl FrameProvider for SimTarget {
    fn selected_frame(&self) -> Option<FrameId> {
        self.selected
    }

    fn select_frame(&mut self, frame: FrameId) {
        if self.frame(frame).is_some() {
            self.selected = Some(frame);
        }
    }

    fn frame_pc(&self, frame: FrameId) -> Option<u64> {
        self.frame(frame).map(|frame| frame.pc)
    }

    fn frame_block(&self, frame: FrameId) -> Option<Block> {
        self.innermost_block(self.frame(frame)?.pc)
    }

    fn set_scheduler_locking(&mut self, on: bool) -> bool {
        if on {
            self.lock_acquisitions += 1;
        }
        std::mem::replace(&mut self.scheduler_locked, on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, Layout};

    #[test]
    fn test_locals_follow_the_selected_frame() {
        let mut sim = SimTarget::new();
        let int = sim.int_type();
        let main = sim.add_function("main", 0x100, 0x200);
        sim.add_local(main, "n", &int);
        let outer = sim.push_frame(0x110);
        let inner = sim.push_frame(0x120);
        let outer_n = sim.local_address(outer, "n").unwrap();
        let inner_n = sim.local_address(inner, "n").unwrap();
        sim.poke_int(outer_n, 4, 1).unwrap();
        sim.poke_int(inner_n, 4, 2).unwrap();

        let expr = sim.compile("n", None).unwrap();
        assert_eq!(expr.innermost_block(), Some(main));
        let mut value = sim.evaluate(&expr).unwrap();
        sim.fetch_lazy(&mut value).unwrap();
        assert_eq!(value.as_i128(), Some(2));

        sim.select_frame(outer);
        let mut value = sim.evaluate(&expr).unwrap();
        sim.fetch_lazy(&mut value).unwrap();
        assert_eq!(value.as_i128(), Some(1));
    }

    #[test]
    fn test_globals_have_no_block() {
        let mut sim = SimTarget::new();
        let int = sim.int_type();
        sim.add_global("g", &int);
        let expr = sim.compile("g + 1", None).unwrap();
        assert_eq!(expr.innermost_block(), None);
        assert!(matches!(
            sim.compile("missing", None),
            Err(EvalError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn test_static_in_block_needs_no_frame() {
        let mut sim = SimTarget::new();
        let int = sim.int_type();
        let file = sim.add_block(0x0, 0x1000);
        let address = sim.add_static(file, "counter", &int);
        sim.poke_int(address, 4, 9).unwrap();
        let expr = sim.compile("counter", Some(file)).unwrap();
        assert_eq!(expr.innermost_block(), None);
        let value = sim.evaluate(&expr).unwrap();
        assert_eq!(value.address(), Some(address));
    }

    #[test]
    fn test_type_expression() {
        let sim = SimTarget::new();
        let expr = sim.compile("unsigned int", None).unwrap();
        assert!(expr.is_type());
    }

    #[test]
    fn test_assign_converts_to_lvalue_type() {
        let mut sim = SimTarget::new();
        let short = sim.lookup_type("short").unwrap();
        let address = sim.add_global("s", &short);
        let lhs = Value::lazy(short, address);
        let rhs = Value::from_i128(sim.int_type(), 0x12345);
        let stored = sim.assign(&lhs, &rhs).unwrap();
        assert_eq!(stored.as_i128(), Some(0x2345));
        assert_eq!(sim.peek(address, 2).unwrap(), vec![0x45, 0x23]);

        let rvalue = Value::from_i128(sim.int_type(), 1);
        assert!(matches!(sim.assign(&rvalue, &rhs), Err(EvalError::NotAnLvalue)));
    }

    #[test]
    fn test_dynamic_type_through_base_pointer() {
        let mut sim = SimTarget::new();
        let int = sim.int_type();
        let base = Type::structure("Base", 4, Layout::new(vec![Field::new("b", int.clone(), 0)]));
        let derived = Type::structure(
            "Derived",
            8,
            Layout::new(vec![Field::new("d", int, 4)]).with_bases(vec![crate::types::BaseClass {
                ty: base.clone(),
                offset: 0,
            }]),
        );
        let object = sim.malloc(8);
        sim.register_object(object, &derived);
        let p = Value::from_i128(Type::pointer_to(&base), object as i128);
        let found = sim.dynamic_type(&p).unwrap().unwrap();
        assert_eq!(found.to_string(), "Derived");

        let int_ptr = Value::from_i128(Type::pointer_to(&sim.int_type()), object as i128);
        assert!(sim.dynamic_type(&int_ptr).unwrap().is_none());
    }

    #[test]
    fn test_dynamic_type_prefers_the_enclosing_object() {
        let mut sim = SimTarget::new();
        let int = sim.int_type();
        let base = Type::structure("Base", 4, Layout::new(vec![Field::new("b", int.clone(), 0)]));
        let derived = Type::structure(
            "Derived",
            8,
            Layout::new(vec![Field::new("d", int.clone(), 4)]).with_bases(vec![
                crate::types::BaseClass {
                    ty: base.clone(),
                    offset: 0,
                },
            ]),
        );
        let outer = Type::structure(
            "Outer",
            16,
            Layout::new(vec![Field::new("o", int, 0)]).with_bases(vec![crate::types::BaseClass {
                ty: derived.clone(),
                offset: 8,
            }]),
        );
        let object = sim.malloc(16);
        // Both registrations explain a `Base *` at `object + 8`.
        sim.register_object(object + 8, &derived);
        sim.register_object(object, &outer);

        let p = Value::from_i128(Type::pointer_to(&base), (object + 8) as i128);
        for _ in 0..3 {
            let found = sim.dynamic_type(&p).unwrap().unwrap();
            assert_eq!(found.to_string(), "Outer");
        }
    }

    #[test]
    fn test_scheduler_locking_counter() {
        let mut sim = SimTarget::new();
        assert!(!sim.set_scheduler_locking(true));
        assert!(sim.set_scheduler_locking(false));
        assert_eq!(sim.lock_acquisitions(), 1);
    }

    #[test]
    #[should_panic(expected = "simulated fault in evaluate")]
    fn test_injected_fault_panics() {
        let mut sim = SimTarget::new();
        let int = sim.int_type();
        sim.add_global("g", &int);
        let expr = sim.compile("g", None).unwrap();
        sim.inject_fault("evaluate");
        let _ = sim.evaluate(&expr);
    }
}
