//! Compile time book keeping about variables and functions
//!
//! Globals live in an append only list, their index is their slot in the global store.
//! Locals live in a list that grows when a variable is declared and is truncated when a
//! block ends. The position of a local in that list, counted from the start of the
//! innermost function frame, is its slot on the runtime stack relative to the frame base.

/// what kind of thing a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function { arity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// the scope depth at which the symbol was declared, 0 is global
    pub depth: usize,
    pub kind: SymbolKind,
}

/// where a variable lives at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// slot in the global store
    Global(usize),
    /// slot relative to the current frame base
    Local(usize),
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    globals: Vec<Symbol>,
    locals: Vec<Symbol>,
    functions: Vec<Symbol>,
    depth: usize,
    /// for each function that is currently being compiled, the index in `locals` at which
    /// its frame starts
    frame_starts: Vec<usize>,
}

impl SymbolTable {
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// whether a function body is currently being compiled
    pub fn in_function(&self) -> bool {
        !self.frame_starts.is_empty()
    }

    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.globals.iter().map(|s| s.name.as_str())
    }

    fn frame_start(&self) -> usize {
        self.frame_starts.last().copied().unwrap_or(0)
    }

    pub fn begin_block(&mut self) {
        self.depth += 1;
    }

    /// leaves the current block and returns the number of locals that died with it
    pub fn end_block(&mut self) -> usize {
        self.depth -= 1;
        let alive = self
            .locals
            .iter()
            .position(|s| s.depth > self.depth)
            .unwrap_or(self.locals.len());
        let dropped = self.locals.len() - alive;
        self.locals.truncate(alive);
        dropped
    }

    /// starts a new call frame. Locals of enclosing blocks are invisible from inside it
    pub fn begin_function(&mut self) {
        self.frame_starts.push(self.locals.len());
    }

    pub fn end_function(&mut self) {
        self.frame_starts.pop();
    }

    /// finds a variable, locals first (innermost first), then globals
    pub fn resolve_variable(&self, name: &str) -> Option<Location> {
        let frame_start = self.frame_start();
        let local = self.locals[frame_start..]
            .iter()
            .rposition(|s| s.name == name)
            .map(Location::Local);
        local.or_else(|| {
            self.globals
                .iter()
                .rposition(|s| s.name == name)
                .map(Location::Global)
        })
    }

    /// declares a variable at the current depth. At depth 0 that's a global, otherwise a
    /// local that occupies the next stack slot of the current frame
    pub fn declare_variable(&mut self, name: &str) -> Location {
        let symbol = Symbol {
            name: name.to_owned(),
            depth: self.depth,
            kind: SymbolKind::Variable,
        };
        if self.depth == 0 {
            self.globals.push(symbol);
            Location::Global(self.globals.len() - 1)
        } else {
            self.locals.push(symbol);
            Location::Local(self.locals.len() - 1 - self.frame_start())
        }
    }

    pub fn declare_function(&mut self, name: &str, arity: usize) {
        self.functions.push(Symbol {
            name: name.to_owned(),
            depth: self.depth,
            kind: SymbolKind::Function { arity },
        });
    }

    /// finds a function, the most recent declaration wins
    pub fn function(&self, name: &str) -> Option<&Symbol> {
        self.functions.iter().rev().find(|s| s.name == name)
    }
}
