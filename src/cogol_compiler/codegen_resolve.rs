/// codegen_resolve.rs - Symbol resolution for the assembled program
///
/// Runs once the predefs and the main program are joined. Labels take the
/// index of the instruction carrying them; variables take their global address,
/// or their frame offset when the reference names an owning subroutine.
/// Anything left unknown is reported and resolved to 0.
///
use crate::cogol_compiler::arg::{Arg, Label, Operand, Symbol};
use crate::cogol_compiler::codegen::CodeGen;
use crate::cogol_compiler::command::Command;
use crate::cogol_compiler::error::DiagnosticKind;
use std::collections::{BTreeSet, HashMap};

impl CodeGen {
    /// Resolves every symbolic operand in place. Returns the set of program
    /// indices that some label reference can transfer control to.
    pub(crate) fn resolve_symbols(&mut self, commands: &mut [Command]) -> BTreeSet<usize> {
        let mut label_indices: HashMap<Label, usize> = HashMap::new();
        for (index, command) in commands.iter().enumerate() {
            for tag in &command.tags {
                label_indices.insert(tag.clone(), index);
            }
        }
        log::debug!(
            "Resolving symbols: {} instructions, {} labels",
            commands.len(),
            label_indices.len()
        );

        let mut landing_sites = BTreeSet::new();
        for command in commands.iter_mut() {
            for arg in command.args_mut() {
                self.resolve_arg(arg, &label_indices, &mut landing_sites);
            }
        }
        landing_sites
    }

    fn resolve_arg(
        &mut self,
        arg: &mut Arg,
        label_indices: &HashMap<Label, usize>,
        landing_sites: &mut BTreeSet<usize>,
    ) {
        let Operand::Unresolved(reference) = &arg.operand else {
            return;
        };

        let base = match (&reference.symbol, &reference.owner) {
            (Symbol::Variable(name), None) => self.globals.address(name),
            (Symbol::Variable(name), Some(owner)) => self
                .subroutines
                .get(owner)
                .and_then(|sub| sub.table.address(name)),
            (Symbol::Label(label), _) => label_indices.get(label).copied(),
        };

        match base {
            Some(base) => {
                let value = base as i32 + reference.offset;
                if let Symbol::Label(_) = reference.symbol {
                    if value >= 0 {
                        landing_sites.insert(value as usize);
                    }
                }
                log::trace!("resolved {} to {}", arg, value);
                arg.operand = Operand::Resolved(value);
            }
            None => {
                let message = match &reference.owner {
                    Some(owner) if !self.subroutines.contains_key(owner) => {
                        format!("'{}' is not a subroutine, so {} has no meaning", owner, arg)
                    }
                    _ => format!("undefined name {}", arg),
                };
                self.report(DiagnosticKind::UnresolvedSymbol, message);
                arg.operand = Operand::Resolved(0);
            }
        }
    }
}
