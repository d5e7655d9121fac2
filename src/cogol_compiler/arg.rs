// Operand model
//
// An operand is a value plus an addressing mode. The value is either already
// known (a constant, or a cell address) or a symbolic reference that the
// resolution pass fills in once every variable and label has a home.

use crate::cogol_compiler::open_loop::BlockName;
use std::fmt;

/// Addressing mode of an operand.
///
/// Reading an operand applies the mode to its value: a constant is used as-is,
/// `Address` reads the cell at that address, and each further level follows
/// one more pointer. As a destination, the mode is applied one level lower:
/// a `Constant` destination writes straight to the given address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Constant = 0,
    Address = 1,
    Deref = 2,
    DoubleDeref = 3,
}

impl Mode {
    pub fn from_level(level: i32) -> Option<Mode> {
        match level {
            0 => Some(Mode::Constant),
            1 => Some(Mode::Address),
            2 => Some(Mode::Deref),
            3 => Some(Mode::DoubleDeref),
            _ => None,
        }
    }

    pub fn level(self) -> i32 {
        self as i32
    }

    pub fn shifted(self, delta: i32) -> Option<Mode> {
        Mode::from_level(self.level() + delta)
    }

    /// Listing prefix for this mode
    pub fn prefix(self) -> &'static str {
        match self {
            Mode::Constant => "",
            Mode::Address => "A",
            Mode::Deref => "B",
            Mode::DoubleDeref => "C",
        }
    }
}

/// A label attached to an instruction and resolved to its final index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Begin(BlockName),
    End(BlockName),
    CallReturn { id: u32, sub: String },
    MultiplyEnd(u32),
    PreloadCallStack,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Label::Begin(block) => write!(f, "begin{}", block),
            Label::End(block) => write!(f, "end{}", block),
            Label::CallReturn { id, sub } => write!(f, "call{}_{}", id, sub),
            Label::MultiplyEnd(id) => write!(f, "endMult{}", id),
            Label::PreloadCallStack => write!(f, "preloadCallStack"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A variable, looked up in the global table or in `owner`'s frame table
    Variable(String),
    Label(Label),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Variable(name) => write!(f, "{}", name),
            Symbol::Label(label) => write!(f, "{}", label),
        }
    }
}

/// Unresolved reference: `symbol + offset`, optionally inside a subroutine frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub symbol: Symbol,
    pub offset: i32,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Resolved(i32),
    Unresolved(SymbolRef),
}

/// One instruction operand.
///
/// `scratches` lists the scratch cells backing this operand (for example the
/// cell holding a computed element address). It is transient bookkeeping for
/// the statement being compiled and is dropped when the operand is copied into
/// a `Command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub mode: Mode,
    pub operand: Operand,
    pub scratches: Vec<usize>,
}

impl Arg {
    pub fn new(mode: Mode, value: i32) -> Self {
        Arg {
            mode,
            operand: Operand::Resolved(value),
            scratches: Vec::new(),
        }
    }

    pub fn constant(value: i32) -> Self {
        Arg::new(Mode::Constant, value)
    }

    /// Reads the cell at `address`
    pub fn cell(address: usize) -> Self {
        Arg::new(Mode::Address, address as i32)
    }

    /// A scratch cell in destination form, owning the cell
    pub fn scratch(address: usize) -> Self {
        Arg {
            mode: Mode::Constant,
            operand: Operand::Resolved(address as i32),
            scratches: vec![address],
        }
    }

    /// Reads through the pointer held in scratch cell `address`, owning the cell
    pub fn through_scratch(address: usize) -> Self {
        Arg {
            mode: Mode::Deref,
            operand: Operand::Resolved(address as i32),
            scratches: vec![address],
        }
    }

    pub fn variable(mode: Mode, name: &str, offset: i32) -> Self {
        Arg {
            mode,
            operand: Operand::Unresolved(SymbolRef {
                symbol: Symbol::Variable(name.to_string()),
                offset,
                owner: None,
            }),
            scratches: Vec::new(),
        }
    }

    /// Offset of `name` inside subroutine `owner`'s frame
    pub fn local(name: &str, owner: &str) -> Self {
        Arg {
            mode: Mode::Constant,
            operand: Operand::Unresolved(SymbolRef {
                symbol: Symbol::Variable(name.to_string()),
                offset: 0,
                owner: Some(owner.to_string()),
            }),
            scratches: Vec::new(),
        }
    }

    /// Code address of `label + offset`
    pub fn label(label: Label, offset: i32) -> Self {
        Arg {
            mode: Mode::Constant,
            operand: Operand::Unresolved(SymbolRef {
                symbol: Symbol::Label(label),
                offset,
                owner: None,
            }),
            scratches: Vec::new(),
        }
    }

    pub fn value(&self) -> Option<i32> {
        match self.operand {
            Operand::Resolved(value) => Some(value),
            Operand::Unresolved(_) => None,
        }
    }

    /// Value of a resolved constant-mode operand
    pub fn constant_value(&self) -> Option<i32> {
        match (self.mode, &self.operand) {
            (Mode::Constant, Operand::Resolved(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.constant_value() == Some(0)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// The source form of a destination operand: one more level of indirection.
    pub fn read(&self) -> Arg {
        let mut arg = self.clone();
        arg.mode = self.mode.shifted(1).unwrap_or(Mode::DoubleDeref);
        arg
    }

    /// Copy without scratch ownership
    pub fn detached(&self) -> Arg {
        Arg {
            mode: self.mode,
            operand: self.operand.clone(),
            scratches: Vec::new(),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mode.prefix())?;
        match &self.operand {
            Operand::Resolved(value) => write!(f, "{}", value),
            Operand::Unresolved(reference) => {
                write!(f, "(")?;
                if let Some(owner) = &reference.owner {
                    write!(f, "{}.", owner)?;
                }
                write!(f, "{}", reference.symbol)?;
                if reference.offset > 0 {
                    write!(f, "+{}", reference.offset)?;
                } else if reference.offset < 0 {
                    write!(f, "{}", reference.offset)?;
                }
                write!(f, ")")
            }
        }
    }
}
