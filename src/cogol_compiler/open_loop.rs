// Open block bookkeeping
//
// Every `if`, `else`, `while`, `do` and `sub` opened in the source stays on the
// block stack until its closing brace. The trailer is spliced in at the brace.

use crate::cogol_compiler::arg::Label;
use crate::cogol_compiler::command::Command;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    If,
    Else,
    While,
    DoWhile,
    Sub,
}

impl BlockKind {
    pub fn title(self) -> &'static str {
        match self {
            BlockKind::If => "If",
            BlockKind::Else => "Else",
            BlockKind::While => "While",
            BlockKind::DoWhile => "DoWhile",
            BlockKind::Sub => "Sub",
        }
    }
}

/// Unique name of a block, e.g. `While3_x`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockName {
    pub kind: BlockKind,
    pub id: u32,
    pub suffix: String,
}

impl BlockName {
    pub fn new(kind: BlockKind, id: u32, suffix: String) -> Self {
        BlockName { kind, id, suffix }
    }

    pub fn begin(&self) -> Label {
        Label::Begin(self.clone())
    }

    pub fn end(&self) -> Label {
        Label::End(self.clone())
    }
}

impl fmt::Display for BlockName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.kind.title(), self.id, self.suffix)
    }
}

#[derive(Debug, Clone)]
pub struct OpenLoop {
    pub name: BlockName,
    /// Code appended when the block closes
    pub trailer: Vec<Command>,
}

impl OpenLoop {
    pub fn new(name: BlockName) -> Self {
        OpenLoop {
            name,
            trailer: Vec::new(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.name.kind
    }
}
