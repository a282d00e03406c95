//! Engine-instance registry and the per-instance call discipline.
//!
//! An engine instance is single-threaded-cooperative: at most one call may
//! be actively executing inside it, because the value stack and the engine's
//! internal registries are not safe for concurrent mutation. The session
//! guard enforces that at every boundary crossing. It is reentrant for its
//! owning thread - a proxy invocation arriving from a host frame that is
//! already inside the engine proceeds as a nested entry, while other threads
//! block until the instance is idle again.

use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, ThreadId};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::stack::ScriptEngine;

/// Process-wide identifier of a live engine instance.
pub type EngineId = u32;

#[derive(Default)]
struct SessionState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// Exclusive-access discipline for one engine instance.
pub struct SessionGuard {
    state: Mutex<SessionState>,
    idle: Condvar,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            idle: Condvar::new(),
        }
    }

    /// Enter the session, blocking while another thread owns it. Nested
    /// entries from the owning thread succeed immediately.
    pub fn enter(&self) -> SessionEntry<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock().expect("session state poisoned");
        while state.owner.is_some_and(|owner| owner != me) {
            state = self.idle.wait(state).expect("session state poisoned");
        }
        state.owner = Some(me);
        state.depth += 1;
        SessionEntry { guard: self }
    }

    /// Enter without blocking; None if another thread owns the session.
    pub fn try_enter(&self) -> Option<SessionEntry<'_>> {
        let me = thread::current().id();
        let mut state = self.state.lock().expect("session state poisoned");
        if state.owner.is_some_and(|owner| owner != me) {
            return None;
        }
        state.owner = Some(me);
        state.depth += 1;
        Some(SessionEntry { guard: self })
    }
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII token for one (possibly nested) session entry.
pub struct SessionEntry<'a> {
    guard: &'a SessionGuard,
}

impl Drop for SessionEntry<'_> {
    fn drop(&mut self) {
        let mut state = self.guard.state.lock().expect("session state poisoned");
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.guard.idle.notify_one();
        }
    }
}

/// One live engine instance: the embedder's engine plus its session guard.
pub struct EngineInstance {
    id: EngineId,
    session: SessionGuard,
    engine: Box<dyn ScriptEngine + Send + Sync>,
}

impl EngineInstance {
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// Enter this instance's session for the duration of a boundary crossing.
    pub fn enter(&self) -> SessionEntry<'_> {
        self.session.enter()
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    /// The embedder's engine. Callers must hold a session entry.
    pub fn engine(&self) -> &dyn ScriptEngine {
        self.engine.as_ref()
    }
}

/// Process-wide registry of live engine instances, keyed by integer id.
/// Instance lifecycle is owned by the embedder: it registers an engine when
/// it creates one and unregisters it before tearing it down.
#[derive(Default)]
pub struct EngineRegistry {
    engines: RwLock<FxHashMap<EngineId, Arc<EngineInstance>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        id: EngineId,
        engine: Box<dyn ScriptEngine + Send + Sync>,
    ) -> Arc<EngineInstance> {
        let instance = Arc::new(EngineInstance {
            id,
            session: SessionGuard::new(),
            engine,
        });
        debug!(id, "registering engine instance");
        self.engines
            .write()
            .expect("engine registry poisoned")
            .insert(id, Arc::clone(&instance));
        instance
    }

    /// Look up a live instance; unknown ids are a configuration error.
    pub fn existing(&self, id: EngineId) -> BridgeResult<Arc<EngineInstance>> {
        self.engines
            .read()
            .expect("engine registry poisoned")
            .get(&id)
            .cloned()
            .ok_or(BridgeError::UnknownEngine { id })
    }

    pub fn unregister(&self, id: EngineId) -> Option<Arc<EngineInstance>> {
        self.engines
            .write()
            .expect("engine registry poisoned")
            .remove(&id)
    }
}
