//! Scopes is a stack of Mappings. Used by the interpreter to hold the block scopes of one
//! call frame.
//!
//! Every function call gets its own instance, the top level code gets one too. An instance
//! without any scope means that the code runs at depth 0, where assignments create globals.
//! This uses immutable datastructures with structural sharing, so taking a snapshot of a
//! frame is cheap.

use im::HashMap as ImHashMap;
use im::Vector as ImVec;

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

pub type Scope<K, V> = ImHashMap<K, V>;

/// represents the scope hirarchy of one frame
#[derive(Debug, Clone)]
pub struct Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    /// Each Entry in the vec is a new scope, the last is the inner most one.
    pub scopes: ImVec<Scope<K, V>>,
}

impl<K, V> Default for Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    fn default() -> Self {
        Scopes {
            scopes: ImVec::new(),
        }
    }
}

impl<K, V> Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    /// open a new scope
    pub fn open_new(&mut self) {
        self.scopes.push_back(ImHashMap::new());
    }

    /// collapse the innermost scope, returns None if there was no scope
    pub fn collapse_innermost(&mut self) -> Option<Scope<K, V>> {
        self.scopes.pop_back()
    }

    /// the number of open scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// add a symbol to the innermost scope. Returns false if there is no scope to add it to
    pub fn add_entry(&mut self, key: K, val: V) -> bool {
        match self.scopes.back_mut() {
            Some(scope) => {
                scope.insert(key, val);
                true
            }
            None => false,
        }
    }

    /// returns the entry for a symbol if it can be found.
    ///
    /// starts searching in the innermost scope, and goes outwards,
    /// if the symbol is not in the scope. Returns None if the symbol is not
    /// in any scope
    pub fn find_entry<BK>(&self, key: &BK) -> Option<&V>
    where
        BK: Hash + Eq + ?Sized,
        K: Borrow<BK>,
    {
        for scope in self.scopes.iter().rev() {
            if let Some(info) = scope.get(key) {
                return Some(info);
            }
        }
        None
    }

    /// like [`Scopes::find_entry`], but allows to overwrite the entry
    pub fn find_entry_mut<BK>(&mut self, key: &BK) -> Option<&mut V>
    where
        BK: Hash + Eq + ?Sized,
        K: Borrow<BK>,
    {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(info) = scope.get_mut(key) {
                return Some(info);
            }
        }
        None
    }
}
