//! Stand-in for the USB interrupt mask

use std::cell::Cell;
use std::rc::Rc;

use kicksmash_core::hal::AccessMask;

#[derive(Debug, Default)]
struct MaskState {
    depth: Cell<u32>,
    sections: Cell<u64>,
}

/// Counts masked sections so tests can check they are balanced
///
/// Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct SimMask {
    state: Rc<MaskState>,
}

impl SimMask {
    /// Create an unmasked state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth; 0 when unmasked
    pub fn depth(&self) -> u32 {
        self.state.depth.get()
    }

    /// Number of outermost masked sections entered so far
    pub fn sections(&self) -> u64 {
        self.state.sections.get()
    }
}

impl AccessMask for SimMask {
    fn mask(&mut self) {
        let depth = self.state.depth.get();
        if depth == 0 {
            self.state.sections.set(self.state.sections.get() + 1);
        }
        self.state.depth.set(depth + 1);
    }

    fn unmask(&mut self) {
        let depth = self.state.depth.get();
        if depth == 0 {
            log::warn!("unbalanced unmask");
        }
        self.state.depth.set(depth.saturating_sub(1));
    }
}
