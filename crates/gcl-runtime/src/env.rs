//! Host environment
//!
//! [`Env`] ties the managed heap, the reference table, handle scopes, the
//! event loop and the uncaught-exception channel together. It is a cheap,
//! cloneable handle to single-threaded state.
//!
//! ## Collector context
//!
//! Finalizers run from inside [`Env::collect_garbage`]. While they run the
//! environment is marked as being in collector context, and every operation
//! that could allocate, run script code, touch scopes or references, or start
//! another collection fails with [`HostError::InCollector`]. A finalizer only
//! gets a [`FinalizeContext`], which exposes the event loop and a weak
//! environment handle for later use.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use gcl_gc::{FinalizationRegistry, GcStats, Heap, ObjectId};

use crate::config::RuntimeConfig;
use crate::error::{CallError, HostError, HostResult};
use crate::event_loop::EventLoop;
use crate::object::{CallInfo, ErrorKind, ErrorObject, Function, JsObject};
use crate::reference::{Reference, ReferenceTable};
use crate::scope::{HandleScope, ScopeStack};
use crate::value::{Value, ValueType};

/// Native finalizer, run once from collector context
pub type Finalizer = Box<dyn FnOnce(&FinalizeContext<'_>)>;

/// Uncaught exception handler
pub type UncaughtHandler = Rc<dyn Fn(&Env, Value)>;

#[derive(Default)]
struct UncaughtState {
    handler: Option<UncaughtHandler>,
    /// Exceptions reported with no handler installed; rooted until taken
    pending: Vec<Value>,
}

struct EnvInner {
    heap: RefCell<Heap<JsObject>>,
    finalizers: RefCell<FinalizationRegistry<Finalizer>>,
    references: Rc<RefCell<ReferenceTable>>,
    scopes: RefCell<ScopeStack>,
    event_loop: EventLoop,
    in_collector: Cell<bool>,
    uncaught: RefCell<UncaughtState>,
}

/// Host environment handle
#[derive(Clone)]
pub struct Env {
    inner: Rc<EnvInner>,
}

/// Non-owning environment handle
#[derive(Clone)]
pub struct WeakEnv {
    inner: Weak<EnvInner>,
}

impl WeakEnv {
    /// Upgrade to a usable environment, if it is still alive
    pub fn upgrade(&self) -> Option<Env> {
        self.inner.upgrade().map(|inner| Env { inner })
    }

    /// Like [`upgrade`](Self::upgrade), reporting a dropped environment as
    /// [`HostError::EnvClosed`]
    pub fn try_upgrade(&self) -> HostResult<Env> {
        self.upgrade().ok_or(HostError::EnvClosed)
    }
}

impl fmt::Debug for WeakEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEnv")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// What a finalizer may touch while the collector is running
pub struct FinalizeContext<'a> {
    env: &'a Env,
}

impl FinalizeContext<'_> {
    /// The environment's event loop
    pub fn event_loop(&self) -> HostResult<EventLoop> {
        self.env.event_loop()
    }

    /// Weak handle to the environment, for use once the collector is done
    pub fn env_handle(&self) -> WeakEnv {
        self.env.downgrade()
    }
}

/// Marks the environment as in collector context for its lifetime
struct CollectorGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> CollectorGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for CollectorGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl Env {
    /// Create a new environment with default config
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new environment
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(EnvInner {
                heap: RefCell::new(Heap::with_config(config.gc)),
                finalizers: RefCell::new(FinalizationRegistry::new()),
                references: Rc::new(RefCell::new(ReferenceTable::default())),
                scopes: RefCell::new(ScopeStack::default()),
                event_loop: EventLoop::with_config(config.event_loop),
                in_collector: Cell::new(false),
                uncaught: RefCell::new(UncaughtState::default()),
            }),
        }
    }

    /// Non-owning handle to this environment
    pub fn downgrade(&self) -> WeakEnv {
        WeakEnv {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether finalizers are currently running
    pub fn in_collector(&self) -> bool {
        self.inner.in_collector.get()
    }

    fn ensure_reentrant(&self, operation: &'static str) -> HostResult<()> {
        if self.in_collector() {
            return Err(HostError::InCollector { operation });
        }
        Ok(())
    }

    /// The environment's event loop. Allowed from collector context.
    pub fn event_loop(&self) -> HostResult<EventLoop> {
        Ok(self.inner.event_loop.clone())
    }

    /// Run the event loop until nothing is armed
    pub fn run_event_loop(&self) -> HostResult<usize> {
        self.ensure_reentrant("run_event_loop")?;
        Ok(self.inner.event_loop.run())
    }

    // ---- handle scopes ----

    /// Open a nested handle scope
    pub fn open_handle_scope(&self) -> HostResult<HandleScope> {
        self.ensure_reentrant("open_handle_scope")?;
        Ok(self.inner.scopes.borrow_mut().open())
    }

    /// Close the innermost handle scope
    pub fn close_handle_scope(&self, scope: HandleScope) -> HostResult<()> {
        self.ensure_reentrant("close_handle_scope")?;
        self.inner.scopes.borrow_mut().close(scope)
    }

    /// Run `f` inside a fresh handle scope
    pub fn scoped<R>(&self, f: impl FnOnce(&Env) -> R) -> HostResult<R> {
        let scope = self.open_handle_scope()?;
        let result = f(self);
        self.close_handle_scope(scope)?;
        Ok(result)
    }

    /// Number of open handle scopes
    pub fn open_scopes(&self) -> usize {
        self.inner.scopes.borrow().depth()
    }

    // ---- values ----

    fn alloc(&self, object: JsObject) -> HostResult<Value> {
        self.ensure_reentrant("allocate")?;
        let mut scopes = self.inner.scopes.borrow_mut();
        if scopes.depth() == 0 {
            return Err(HostError::NoHandleScope);
        }
        let id = self.inner.heap.borrow_mut().alloc(object)?;
        scopes.root(id)?;
        Ok(Value::Object(id))
    }

    fn object_id(&self, value: &Value) -> HostResult<ObjectId> {
        match value.as_object() {
            Some(id) => Ok(id),
            None => Err(HostError::ObjectExpected(self.type_of(value)?)),
        }
    }

    /// Create an empty object
    pub fn create_object(&self) -> HostResult<Value> {
        self.alloc(JsObject::Plain(Vec::new()))
    }

    /// Create a native function
    pub fn create_function<F>(&self, name: &str, f: F) -> HostResult<Value>
    where
        F: Fn(&Env, &CallInfo<'_>) -> Result<Value, Value> + 'static,
    {
        self.alloc(JsObject::Function(Function::new(name, Rc::new(f))))
    }

    /// Create an error object
    pub fn create_error(&self, kind: ErrorKind, message: &str) -> HostResult<Value> {
        self.alloc(JsObject::Error(ErrorObject {
            kind,
            message: Rc::from(message),
        }))
    }

    /// Kind and message of an error object
    pub fn error_info(&self, value: &Value) -> Option<(ErrorKind, String)> {
        let id = value.as_object()?;
        match self.inner.heap.borrow().get(id)? {
            JsObject::Error(e) => Some((e.kind, e.message.to_string())),
            _ => None,
        }
    }

    /// `typeof value`
    pub fn type_of(&self, value: &Value) -> HostResult<ValueType> {
        Ok(match value {
            Value::Undefined => ValueType::Undefined,
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Object(id) => self.inner.heap.borrow().try_get(*id)?.type_of(),
        })
    }

    /// Set a named property on a plain object
    pub fn set_property(&self, object: &Value, key: &str, value: Value) -> HostResult<()> {
        self.ensure_reentrant("set_property")?;
        let id = self.object_id(object)?;
        let mut heap = self.inner.heap.borrow_mut();
        let target = heap.get_mut(id).ok_or(gcl_gc::GcError::StaleObject(id))?;
        if target.set_property(key, value) {
            Ok(())
        } else {
            Err(HostError::ObjectExpected(target.type_of()))
        }
    }

    /// Read a named property; missing properties read as `undefined`
    pub fn get_property(&self, object: &Value, key: &str) -> HostResult<Value> {
        let id = self.object_id(object)?;
        let heap = self.inner.heap.borrow();
        Ok(heap.try_get(id)?.property(key).cloned().unwrap_or_default())
    }

    /// Human-readable rendering for logs
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => format!("{s:?}"),
            Value::Object(id) => match self.inner.heap.borrow().get(*id) {
                Some(JsObject::Error(e)) => format!("{}: {}", e.kind, e.message),
                Some(JsObject::Function(f)) => format!("[Function {}]", f.name()),
                Some(JsObject::Plain(_)) => "[object Object]".to_string(),
                None => format!("<collected {id}>"),
            },
        }
    }

    // ---- references ----

    /// Create a durable reference with the given initial count
    pub fn create_reference(&self, value: &Value, initial_count: u32) -> HostResult<Reference> {
        self.ensure_reentrant("create_reference")?;
        if let Some(id) = value.as_object() {
            self.inner.heap.borrow().try_get(id)?;
        }
        let table = &self.inner.references;
        let id = table.borrow_mut().insert(value.clone(), initial_count);
        tracing::trace!(reference = id, initial_count, "reference created");
        Ok(Reference::new(id, table))
    }

    fn owned(&self, reference: &Reference) -> HostResult<()> {
        if reference.belongs_to(&self.inner.references) {
            Ok(())
        } else {
            Err(HostError::ForeignReference)
        }
    }

    /// Resolve a reference. `None` when a weak target has been collected.
    /// A resolved object is rooted in the innermost handle scope.
    pub fn reference_value(&self, reference: &Reference) -> HostResult<Option<Value>> {
        self.ensure_reentrant("reference_value")?;
        self.owned(reference)?;
        let value = self
            .inner
            .references
            .borrow()
            .value(reference.id())
            .ok_or(HostError::ForeignReference)?;
        if let Some(id) = value.as_ref().and_then(Value::as_object) {
            self.inner.scopes.borrow_mut().root(id)?;
        }
        Ok(value)
    }

    /// Increment a reference count, returning the new count
    pub fn reference_ref(&self, reference: &Reference) -> HostResult<u32> {
        self.ensure_reentrant("reference_ref")?;
        self.owned(reference)?;
        self.inner
            .references
            .borrow_mut()
            .adjust(reference.id(), true)
            .ok_or(HostError::ForeignReference)
    }

    /// Decrement a reference count, returning the new count
    pub fn reference_unref(&self, reference: &Reference) -> HostResult<u32> {
        self.ensure_reentrant("reference_unref")?;
        self.owned(reference)?;
        self.inner
            .references
            .borrow_mut()
            .adjust(reference.id(), false)
            .ok_or(HostError::ForeignReference)
    }

    /// Release a reference
    pub fn delete_reference(&self, reference: Reference) -> HostResult<()> {
        self.owned(&reference)?;
        tracing::trace!(reference = reference.id(), "reference deleted");
        drop(reference);
        Ok(())
    }

    /// Number of references not yet released
    pub fn live_references(&self) -> usize {
        self.inner.references.borrow().len()
    }

    // ---- finalizers and collection ----

    /// Attach a finalizer to an object. It runs once, from collector
    /// context, after the object has been found unreachable.
    pub fn add_finalizer<F>(&self, object: &Value, finalizer: F) -> HostResult<()>
    where
        F: FnOnce(&FinalizeContext<'_>) + 'static,
    {
        self.ensure_reentrant("add_finalizer")?;
        let id = self.object_id(object)?;
        self.inner.heap.borrow().try_get(id)?;
        self.inner
            .finalizers
            .borrow_mut()
            .register(id, Box::new(finalizer));
        Ok(())
    }

    /// Finalizers whose objects are still alive
    pub fn pending_finalizers(&self) -> usize {
        self.inner.finalizers.borrow().len()
    }

    fn roots(&self) -> Vec<ObjectId> {
        let mut roots: Vec<ObjectId> = self.inner.scopes.borrow().roots().collect();
        roots.extend(self.inner.references.borrow().strong_roots());
        roots.extend(
            self.inner
                .uncaught
                .borrow()
                .pending
                .iter()
                .filter_map(Value::as_object),
        );
        roots
    }

    /// Run a full collection and dispatch the finalizers of dead objects
    pub fn collect_garbage(&self) -> HostResult<GcStats> {
        self.ensure_reentrant("collect_garbage")?;
        let _guard = CollectorGuard::enter(&self.inner.in_collector);

        let roots = self.roots();
        let collection = {
            let mut heap = self.inner.heap.borrow_mut();
            let mut finalizers = self.inner.finalizers.borrow_mut();
            heap.collect_with_finalizers(roots, &mut *finalizers)
        };
        self.inner
            .references
            .borrow_mut()
            .clear_freed(&collection.freed);

        tracing::debug!(
            freed = collection.freed.len(),
            reclaimed = collection.reclaimed,
            finalizers = collection.finalized.len(),
            "collection finished, dispatching finalizers"
        );

        let ctx = FinalizeContext { env: self };
        for finalizer in collection.finalized {
            finalizer(&ctx);
        }

        Ok(self.heap_stats())
    }

    /// Whether live bytes have reached the configured GC threshold
    pub fn should_gc(&self) -> bool {
        self.inner.heap.borrow().should_gc()
    }

    /// Heap statistics
    pub fn heap_stats(&self) -> GcStats {
        self.inner.heap.borrow().stats()
    }

    // ---- calls and exceptions ----

    /// Call `func` with receiver `this`
    pub fn call_function(&self, this: &Value, func: &Value, args: &[Value]) -> Result<Value, CallError> {
        self.ensure_reentrant("call_function")?;
        let body = {
            let id = self.object_id(func).map_err(|_| {
                HostError::FunctionExpected(self.type_of(func).unwrap_or(ValueType::Undefined))
            })?;
            let heap = self.inner.heap.borrow();
            match heap.try_get(id).map_err(HostError::from)? {
                JsObject::Function(f) => f.body(),
                other => return Err(HostError::FunctionExpected(other.type_of()).into()),
            }
        };

        (*body)(self, &CallInfo { this, args }).map_err(CallError::Exception)
    }

    /// Install the uncaught exception handler, replacing any previous one
    ///
    /// Until a handler is installed, reported exceptions queue up and stay
    /// GC roots. The queue is unbounded; hosts that run without a handler
    /// must drain it with [`Env::take_uncaught_exceptions`].
    pub fn on_uncaught_exception<F>(&self, handler: F)
    where
        F: Fn(&Env, Value) + 'static,
    {
        self.inner.uncaught.borrow_mut().handler = Some(Rc::new(handler));
    }

    /// Report an exception nobody caught
    ///
    /// With no handler installed the exception is logged and queued for
    /// [`Env::take_uncaught_exceptions`].
    pub fn trigger_uncaught_exception(&self, exception: Value) -> HostResult<()> {
        self.ensure_reentrant("trigger_uncaught_exception")?;
        let handler = self.inner.uncaught.borrow().handler.clone();
        match handler {
            Some(handler) => handler(self, exception),
            None => {
                tracing::error!(exception = %self.describe(&exception), "uncaught exception");
                self.inner.uncaught.borrow_mut().pending.push(exception);
            }
        }
        Ok(())
    }

    /// Take exceptions reported while no handler was installed
    pub fn take_uncaught_exceptions(&self) -> Vec<Value> {
        std::mem::take(&mut self.inner.uncaught.borrow_mut().pending)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("heap", &*self.inner.heap.borrow())
            .field("references", &self.live_references())
            .field("scopes", &self.open_scopes())
            .field("event_loop", &self.inner.event_loop)
            .finish()
    }
}
