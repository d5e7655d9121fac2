// Scratch cell pool
//
// Temporaries live in global cells named `scratchN`. Cells are reused between
// statements; the pool only grows when a statement needs more at once.

use crate::cogol_compiler::symbols::SCRATCH_PREFIX;

#[derive(Debug, Clone, Copy)]
struct ScratchCell {
    address: usize,
    busy: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScratchPool {
    cells: Vec<ScratchCell>,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for the next cell the pool would grow by
    pub fn next_name(&self) -> String {
        format!("{}{}", SCRATCH_PREFIX, self.cells.len())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell at `address`, free if `busy` is false
    pub fn add(&mut self, address: usize, busy: bool) {
        self.cells.push(ScratchCell { address, busy });
    }

    /// Marks the lowest free cell busy and returns its address
    pub fn acquire(&mut self) -> Option<usize> {
        let cell = self.cells.iter_mut().find(|cell| !cell.busy)?;
        cell.busy = true;
        Some(cell.address)
    }

    pub fn release(&mut self, address: usize) {
        if let Some(cell) = self.cells.iter_mut().find(|cell| cell.address == address) {
            cell.busy = false;
        }
    }

    pub fn release_all(&mut self) {
        for cell in &mut self.cells {
            cell.busy = false;
        }
    }

    pub fn busy_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.busy).count()
    }
}
