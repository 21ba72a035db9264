//! Handle scopes
//!
//! Every object handed to native code is rooted in the innermost open scope
//! until that scope closes. Scopes nest and must be closed innermost first.

use gcl_gc::ObjectId;

use crate::error::{HostError, HostResult};

/// Token for an open handle scope. Close it with
/// [`Env::close_handle_scope`](crate::Env::close_handle_scope).
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an open handle scope keeps its values alive until closed"]
pub struct HandleScope {
    depth: usize,
}

impl HandleScope {
    /// Nesting depth, starting at 1 for the outermost scope
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    frames: Vec<Vec<ObjectId>>,
}

impl ScopeStack {
    pub(crate) fn open(&mut self) -> HandleScope {
        self.frames.push(Vec::new());
        HandleScope {
            depth: self.frames.len(),
        }
    }

    pub(crate) fn close(&mut self, scope: HandleScope) -> HostResult<()> {
        let expected = self.frames.len();
        if scope.depth != expected || expected == 0 {
            return Err(HostError::ScopeMismatch {
                expected,
                actual: scope.depth,
            });
        }
        self.frames.pop();
        Ok(())
    }

    pub(crate) fn root(&mut self, id: ObjectId) -> HostResult<()> {
        let frame = self.frames.last_mut().ok_or(HostError::NoHandleScope)?;
        frame.push(id);
        Ok(())
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.frames.iter().flatten().copied()
    }
}
