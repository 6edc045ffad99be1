use crate::core::*;
use crate::vm::ErrorKind;

pub type Stack = Vec<Value>;

/// the book keeping of one active function call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// where execution continues after the call returns
    pub return_pc: usize,
    /// stack index of the first argument, local slots are relative to it
    pub base: usize,
}

/// Represents the memory areas of the VM: the operand stack, which also holds the locals,
/// the global store and the call frames
#[derive(Default, Debug)]
pub struct Memory {
    pub stack: Stack,
    /// a slot is `None` until the first store to it
    pub globals: Vec<Option<Value>>,
    pub frames: Vec<Frame>,
}

pub type MemResult<T> = Result<T, ErrorKind>;

impl Memory {
    /// puts something on the stack
    pub fn push<T>(&mut self, entry: T)
    where
        T: Into<Value>,
    {
        self.stack.push(entry.into());
    }

    pub fn pop(&mut self) -> MemResult<Value> {
        self.stack.pop().ok_or(ErrorKind::StackUnderflow)
    }

    /// the base of the current frame. Top level code runs with base 0
    pub fn base(&self) -> usize {
        self.frames.last().map(|f| f.base).unwrap_or(0)
    }

    fn local_idx(&self, slot: usize) -> MemResult<usize> {
        let idx = self.base() + slot;
        if idx < self.stack.len() {
            Ok(idx)
        } else {
            Err(ErrorKind::InvalidLocal(slot))
        }
    }

    /// copies a local to the stack top
    pub fn load_local(&mut self, slot: usize) -> MemResult<()> {
        let val = self.stack[self.local_idx(slot)?].clone();
        self.stack.push(val);
        Ok(())
    }

    /// pops the stack top into a local
    pub fn store_local(&mut self, slot: usize) -> MemResult<()> {
        let val = self.pop()?;
        let idx = self.local_idx(slot)?;
        self.stack[idx] = val;
        Ok(())
    }

    /// copies a global to the stack top
    pub fn load_global(&mut self, slot: usize) -> MemResult<()> {
        match self.globals.get(slot) {
            Some(Some(val)) => {
                let val = val.clone();
                self.stack.push(val);
                Ok(())
            }
            _ => Err(ErrorKind::UninitializedGlobal(slot)),
        }
    }

    /// pops the stack top into a global, the store grows as needed
    pub fn store_global(&mut self, slot: usize) -> MemResult<()> {
        let val = self.pop()?;
        if self.globals.len() <= slot {
            self.globals.resize(slot + 1, None);
        }
        self.globals[slot] = Some(val);
        Ok(())
    }

    /// enters a function whose `argc` arguments are on the stack top
    pub fn push_frame(&mut self, return_pc: usize, argc: usize) -> MemResult<()> {
        let base = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or(ErrorKind::StackUnderflow)?;
        self.frames.push(Frame { return_pc, base });
        Ok(())
    }

    /// leaves the current function: pops the result, drops everything the callee left on the
    /// stack and pushes the result back. Returns the return address
    pub fn pop_frame(&mut self) -> MemResult<usize> {
        let frame = self.frames.pop().ok_or(ErrorKind::ReturnOutsideCall)?;
        let result = self.pop()?;
        self.stack.truncate(frame.base);
        self.stack.push(result);
        Ok(frame.return_pc)
    }
}
