// Symbol tables
//
// One table holds the globals; every subroutine owns another one laid out
// relative to its frame base. Addresses are handed out in declaration order
// and never reused.

use indexmap::IndexMap;
use std::collections::HashSet;

/// Names user code may not declare or reference directly
pub const PROGRAM_COUNTER: &str = "pc";
pub const DISPLAY: &str = "display";
pub const CALL_STACK_POINTER: &str = "call";
pub const SCRATCH_PREFIX: &str = "scratch";

lazy_static! {
    static ref RESERVED_NAMES: HashSet<&'static str> = {
        let mut names = HashSet::new();
        names.insert(PROGRAM_COUNTER);
        names.insert(CALL_STACK_POINTER);
        names
    };
}

pub fn is_reserved(name: &str) -> bool {
    if RESERVED_NAMES.contains(name) {
        return true;
    }
    match name.strip_prefix(SCRATCH_PREFIX) {
        Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarType {
    Scalar,
    /// Base cell holds a pointer to the first element, which follows it
    Array,
    /// Holds a frame address returned by a call to the named subroutine
    SubroutinePointer(String),
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    addresses: IndexMap<String, usize>,
    types: IndexMap<String, VarType>,
    memory_map: Vec<Vec<String>>,
    next_free: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.addresses.contains_key(name)
    }

    pub fn address(&self, name: &str) -> Option<usize> {
        self.addresses.get(name).copied()
    }

    pub fn var_type(&self, name: &str) -> Option<&VarType> {
        self.types.get(name)
    }

    pub fn set_type(&mut self, name: &str, var_type: VarType) {
        if let Some(slot) = self.types.get_mut(name) {
            *slot = var_type;
        }
    }

    pub fn next_free(&self) -> usize {
        self.next_free
    }

    /// Names bound to each address, in address order
    pub fn memory_map(&self) -> &[Vec<String>] {
        &self.memory_map
    }

    pub fn names(&self) -> impl Iterator<Item = (&str, usize)> {
        self.addresses.iter().map(|(name, address)| (name.as_str(), *address))
    }

    fn bind(&mut self, name: String, address: usize) {
        if self.memory_map.len() <= address {
            self.memory_map.resize(address + 1, Vec::new());
        }
        self.memory_map[address].push(name.clone());
        self.addresses.insert(name, address);
        self.next_free = self.next_free.max(address + 1);
    }

    /// Reserves one cell and returns its address
    pub fn declare_word(&mut self, name: &str) -> usize {
        let address = self.next_free;
        self.bind(name.to_string(), address);
        self.types.insert(name.to_string(), VarType::Scalar);
        log::trace!("declared word '{}' at {}", name, address);
        address
    }

    /// Reserves a base cell plus `max(size, initialized)` element cells.
    /// Elements are named `name[i]`. Returns the base address.
    pub fn declare_array(&mut self, name: &str, size: usize, initialized: usize) -> usize {
        let base = self.next_free;
        self.bind(name.to_string(), base);
        self.types.insert(name.to_string(), VarType::Array);
        for i in 0..size.max(initialized) {
            self.bind(format!("{}[{}]", name, i), base + 1 + i);
        }
        log::trace!(
            "declared array '{}' at {} with {} elements",
            name,
            base,
            size.max(initialized)
        );
        base
    }
}
