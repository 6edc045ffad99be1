use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;

use crate::core::Instruction;
use crate::utils;

/// Represents a compiled program. This is the only thing the vm needs to run it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub header: Header,
    pub code: Vec<Instruction>,
    pub debug: DebugInformation,
}

/// the header of a compiled program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// version of the crate that compiled this program
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugInformation {
    /// Has one entry for each instruction in code. The nth entry contains the source line of
    /// the node that produced the nth instruction
    pub lines: Vec<usize>,
    /// the names of the globals, indexed by slot
    pub globals: Vec<String>,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid bytecode file: {0}")]
    Decode(#[from] postcard::Error),

    #[error("Bytecode was compiled by version {found}, but this is version {expected}")]
    VersionMismatch { found: String, expected: String },
}

impl Program {
    /// creates a program without debug information, stamped with the current version
    pub fn new(code: Vec<Instruction>) -> Self {
        Program {
            header: Header {
                version: utils::get_version().into(),
            },
            code,
            debug: DebugInformation::default(),
        }
    }

    /// the source line that produced the instruction at `pc`, if it is known
    pub fn line_of(&self, pc: usize) -> Option<usize> {
        self.debug.lines.get(pc).copied()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// loads a program written by [`Program::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let program: Program = postcard::from_bytes(bytes)?;
        let expected = utils::get_version();
        if program.header.version != expected {
            return Err(LoadError::VersionMismatch {
                found: program.header.version,
                expected: expected.into(),
            });
        }
        Ok(program)
    }
}

/// prints the disassembly, one instruction per line, prefixed by its address
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.code.iter().enumerate() {
            match instruction {
                Instruction::Label(_) => writeln!(f, "{:08} {}", i, instruction)?,
                _ => writeln!(f, "{:08}     {}", i, instruction)?,
            }
        }
        Ok(())
    }
}
