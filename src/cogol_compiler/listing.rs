// Compiler outputs: the QFTASM listing and the memory maps

use crate::cogol_compiler::command::Command;
use crate::cogol_compiler::error::Diagnostic;
use indexmap::IndexMap;
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub commands: Vec<Command>,
    /// Names bound to each global address
    pub memory_map: Vec<Vec<String>>,
    /// Frame layout of each subroutine, by offset
    pub subroutine_maps: IndexMap<String, Vec<Vec<String>>>,
    pub diagnostics: Vec<Diagnostic>,
    pub(crate) annotate: bool,
}

impl CompiledProgram {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Address of a global, looked up in the memory map
    pub fn address_of(&self, name: &str) -> Option<usize> {
        self.memory_map
            .iter()
            .position(|names| names.iter().any(|n| n == name))
    }

    /// One `i. OP a b c;` line per instruction
    pub fn listing(&self) -> String {
        render_listing(&self.commands, self.annotate)
    }

    /// `address: names` lines for the globals, then one section per subroutine
    pub fn memory_map_text(&self) -> String {
        let mut text = render_map(&self.memory_map);
        for (name, map) in &self.subroutine_maps {
            let _ = write!(text, "\n{} map:\n", name);
            text.push_str(&render_map(map));
        }
        text
    }
}

pub fn render_listing(commands: &[Command], annotate: bool) -> String {
    commands
        .iter()
        .enumerate()
        .map(|(i, command)| format!("{}. {}", i, command.render(annotate)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_map(map: &[Vec<String>]) -> String {
    let mut text = String::new();
    for (address, names) in map.iter().enumerate() {
        let _ = writeln!(text, "{}: {}", address, names.join(" "));
    }
    text
}
