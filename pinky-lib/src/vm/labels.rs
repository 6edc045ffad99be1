use std::collections::HashMap;

use crate::core::Instruction;
use crate::vm::{Error, ErrorKind, Result};

/// Maps label names to the index of their `LABEL` instruction.
///
/// The table is built once before execution starts and never changes afterwards. Building
/// it also checks that every jump and call refers to an existing label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable(HashMap<String, usize>);

impl LabelTable {
    pub fn scan(code: &[Instruction]) -> Result<Self> {
        let mut table = HashMap::new();
        for (pc, instruction) in code.iter().enumerate() {
            if let Instruction::Label(name) = instruction {
                if table.insert(name.clone(), pc).is_some() {
                    return Err(Error {
                        pc,
                        kind: ErrorKind::DuplicateLabel(name.clone()),
                    });
                }
            }
        }
        for (pc, instruction) in code.iter().enumerate() {
            if let Some(name) = instruction.label_ref() {
                if !table.contains_key(name) {
                    return Err(Error {
                        pc,
                        kind: ErrorKind::UnresolvedLabel(name.into()),
                    });
                }
            }
        }
        Ok(LabelTable(table))
    }

    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
