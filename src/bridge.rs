//! Entry points the script engine calls back into.
//!
//! These implement the index-metamethod protocol: member lookup, instance
//! construction, method dispatch, and proxy creation. Each entry looks up
//! the live engine instance by id, enters its session, reads arguments off
//! the engine stack, and reports results by pushing values back.
//!
//! Locking discipline: the handle table's lock is never held across a host
//! callable invocation or a re-entry into the engine, so nested boundary
//! crossings (proxy calls in particular) cannot deadlock. Instance values
//! are vacated from their slot for the duration of a native call and
//! restored afterwards.

use std::any::Any;
use std::sync::{Mutex, MutexGuard};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::debug;

use crate::coerce::Coercer;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::handles::{HandleTable, HostHandle, ReleaseOutcome, RuntimeClass, Side};
use crate::host::{HostCallContext, HostRegistry, HostValue};
use crate::host_type::ClassId;
use crate::proxy::{self, ScriptProxy};
use crate::resolve::{self, ResolvedMember, Subject};
use crate::script_value::ValueTag;
use crate::session::{EngineId, EngineRegistry};
use crate::signature::{self, CandidateSignature};
use crate::stack;

/// Integer-coded result of a member-index lookup, in the order the index
/// metamethod expects: absent, field (one value pushed), callable (dispatch
/// deferred to call time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum IndexOutcome {
    Absent = 0,
    Field = 1,
    Callable = 2,
}

/// The bridge: class registry, cross-runtime handle table, and live engine
/// instances, plus the entry points that tie them together.
pub struct Bridge {
    config: BridgeConfig,
    classes: HostRegistry,
    objects: Mutex<HandleTable>,
    engines: EngineRegistry,
}

impl Bridge {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            config,
            classes: HostRegistry::new(),
            objects: Mutex::new(HandleTable::new()),
            engines: EngineRegistry::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn classes(&self) -> &HostRegistry {
        &self.classes
    }

    /// Mutable registry access for the setup phase, before engines run.
    pub fn classes_mut(&mut self) -> &mut HostRegistry {
        &mut self.classes
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    fn lock_objects(&self) -> MutexGuard<'_, HandleTable> {
        self.objects.lock().expect("handle table poisoned")
    }

    // ========== Host-side object plumbing ==========

    /// Store a host-created object, crediting the initial reference to
    /// `side`.
    pub fn adopt<T: Any + Send + Sync>(&self, value: T, class: ClassId, side: Side) -> HostHandle {
        self.lock_objects()
            .allocate(Box::new(value), RuntimeClass::Instance(class), side)
    }

    /// Run `f` against the stored object. None if the handle is stale, the
    /// type mismatches, or the value is vacated by an in-flight call.
    pub fn with_object<T: Any, R>(&self, handle: HostHandle, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock_objects().get::<T>(handle).map(f)
    }

    pub fn retain_object(&self, handle: HostHandle, side: Side) -> BridgeResult<()> {
        if self.lock_objects().retain(handle, side) {
            Ok(())
        } else {
            Err(BridgeError::StaleHandle)
        }
    }

    /// Release one side's reference. Retirement happens only when both
    /// sides have released; a retiring proxy also releases its
    /// backing-table reference back to the engine.
    pub fn release_object(&self, handle: HostHandle, side: Side) -> BridgeResult<()> {
        match self.lock_objects().release(handle, side) {
            ReleaseOutcome::Alive => Ok(()),
            ReleaseOutcome::Retired(value) => {
                if let Ok(proxy) = value.downcast::<ScriptProxy>() {
                    let proxy = *proxy;
                    if let Ok(instance) = self.engines.existing(proxy.engine) {
                        let _session = instance.enter();
                        instance.engine().release_ref(proxy.backing);
                    }
                }
                Ok(())
            }
            ReleaseOutcome::Stale => Err(BridgeError::StaleHandle),
        }
    }

    // ========== Entry points called by the script engine ==========

    /// Index lookup on a host object or class. Pushes the field value for
    /// [`IndexOutcome::Field`]; pushes nothing otherwise.
    pub fn member_index(
        &self,
        engine_id: EngineId,
        subject: Subject,
        name: &str,
    ) -> BridgeResult<IndexOutcome> {
        let instance = self.engines.existing(engine_id)?;
        let _session = instance.enter();

        let objects = self.lock_objects();
        let resolved = resolve::resolve_index(&self.classes, &objects, subject, name);
        drop(objects);

        let outcome = match resolved {
            ResolvedMember::Field(value) => {
                stack::push_host_value(instance.engine(), &value);
                IndexOutcome::Field
            }
            ResolvedMember::Callable(_) => IndexOutcome::Callable,
            ResolvedMember::Absent => IndexOutcome::Absent,
        };
        debug!(name, ?outcome, "member index");
        Ok(outcome)
    }

    /// Construct an instance of a class resolved by name; arguments are the
    /// stack slots `first_arg..top`. Pushes the new handle.
    pub fn construct_instance(
        &self,
        engine_id: EngineId,
        class_name: &str,
        first_arg: usize,
    ) -> BridgeResult<usize> {
        let class_id = self
            .classes
            .lookup(class_name)
            .ok_or_else(|| BridgeError::UnknownClass {
                name: class_name.to_string(),
            })?;
        self.construct(engine_id, class_id, first_arg)
    }

    /// Construct an instance from an already-resolved class reference.
    pub fn construct(
        &self,
        engine_id: EngineId,
        class_id: ClassId,
        first_arg: usize,
    ) -> BridgeResult<usize> {
        let instance = self.engines.existing(engine_id)?;
        let _session = instance.enter();
        let engine = instance.engine();

        let class = self
            .classes
            .get(class_id)
            .ok_or_else(|| BridgeError::UnknownClass {
                name: format!("#{class_id}"),
            })?;
        let args = stack::read_args(engine, first_arg);

        let selected = {
            let objects = self.lock_objects();
            let coercer = Coercer::new(&self.classes, &objects, &self.config);
            let candidates =
                class
                    .constructors
                    .iter()
                    .enumerate()
                    .map(|(index, ctor)| CandidateSignature {
                        index,
                        params: &ctor.params,
                    });
            signature::select(&coercer, candidates, &args)
        }
        .map_err(|_| BridgeError::NoMatchingSignature {
            kind: "constructor",
            name: class.name.clone(),
        })?;

        // The factory runs without the handle-table lock held.
        let value = class.constructors[selected.index]
            .instantiate(&selected.args)
            .map_err(|source| BridgeError::InvocationFault {
                name: class.name.clone(),
                source,
            })?;

        let handle =
            self.lock_objects()
                .allocate(value, RuntimeClass::Instance(class_id), Side::Script);
        engine.push_host_handle(handle);
        Ok(1)
    }

    /// Dispatch a named method on a host object or class; arguments are the
    /// stack slots `first_arg..top`. Pushes zero or one result value and
    /// returns how many were pushed.
    pub fn call_method(
        &self,
        engine_id: EngineId,
        subject: Subject,
        name: &str,
        first_arg: usize,
    ) -> BridgeResult<usize> {
        let instance = self.engines.existing(engine_id)?;
        let _session = instance.enter();
        let engine = instance.engine();

        let args = stack::read_args(engine, first_arg);

        let objects = self.lock_objects();
        let (roots, static_only) = resolve::subject_roots(&objects, subject)
            .ok_or(BridgeError::StaleHandle)?;
        let methods: Vec<_> = roots
            .iter()
            .flat_map(|&root| self.classes.methods_named(root, name, static_only))
            .collect();
        if methods.is_empty() {
            return Err(BridgeError::NoMatchingSignature {
                kind: "method",
                name: name.to_string(),
            });
        }

        let coercer = Coercer::new(&self.classes, &objects, &self.config);
        let candidates = methods
            .iter()
            .enumerate()
            .map(|(index, method)| CandidateSignature {
                index,
                params: &method.params,
            });
        let selected = signature::select(&coercer, candidates, &args).map_err(|_| {
            BridgeError::NoMatchingSignature {
                kind: "method",
                name: name.to_string(),
            }
        })?;
        let method = methods[selected.index];

        let result = if method.is_static {
            drop(objects);
            let mut ctx = HostCallContext::new(None, &selected.args);
            let invoked = method.invoke(&mut ctx);
            let ret = ctx.take_return();
            invoked.map_err(|source| BridgeError::InvocationFault {
                name: name.to_string(),
                source,
            })?;
            ret
        } else {
            let Subject::Object(handle) = subject else {
                // Class subjects only ever see static candidates.
                return Err(BridgeError::NoMatchingSignature {
                    kind: "method",
                    name: name.to_string(),
                });
            };
            let mut objects = objects;
            let mut value = objects
                .take_value(handle)
                .ok_or(BridgeError::StaleHandle)?;
            drop(objects);

            let mut ctx =
                HostCallContext::new(Some(&mut *value as &mut dyn Any), &selected.args);
            let invoked = method.invoke(&mut ctx);
            let ret = ctx.take_return();

            self.lock_objects().restore_value(handle, value);
            invoked.map_err(|source| BridgeError::InvocationFault {
                name: name.to_string(),
                source,
            })?;
            ret
        };

        match result {
            Some(value) => {
                stack::push_host_value(engine, &value);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Build a proxy over the table at `table_slot` implementing every named
    /// interface. Validation happens before any engine reference is taken.
    /// Pushes the proxy handle.
    pub fn create_proxy(
        &self,
        engine_id: EngineId,
        interface_names: &[&str],
        table_slot: usize,
    ) -> BridgeResult<usize> {
        let instance = self.engines.existing(engine_id)?;
        let _session = instance.enter();
        let engine = instance.engine();

        let interfaces = proxy::validate_interfaces(&self.classes, interface_names)?;
        if engine.tag_at(table_slot) != ValueTag::Table {
            return Err(BridgeError::BackingNotATable);
        }
        let backing = engine
            .ref_at(table_slot)
            .ok_or(BridgeError::BackingNotATable)?;

        let handle = proxy::bind(
            &mut self.lock_objects(),
            engine_id,
            backing,
            interfaces,
            Side::Script,
        );
        engine.push_host_handle(handle);
        Ok(1)
    }

    /// Invoke an interface method on a proxy from the host side.
    ///
    /// Re-enters the proxy's engine; the session guard serializes this with
    /// any call already in flight on that instance.
    pub fn invoke_proxy(
        &self,
        handle: HostHandle,
        method: &str,
        args: &[HostValue],
    ) -> BridgeResult<Option<HostValue>> {
        let proxy = self
            .lock_objects()
            .get::<ScriptProxy>(handle)
            .cloned()
            .ok_or(BridgeError::StaleHandle)?;
        let decl = proxy::declared_method(&self.classes, &proxy, method).ok_or_else(|| {
            BridgeError::UndeclaredProxyMethod {
                method: method.to_string(),
            }
        })?;

        let instance = self.engines.existing(proxy.engine)?;
        let _session = instance.enter();
        let raw = proxy::invoke_over(instance.engine(), handle, decl, &proxy.backing, args)?;

        match (&decl.ret, raw) {
            (Some(ret_ty), Some(raw)) => {
                let objects = self.lock_objects();
                let coercer = Coercer::new(&self.classes, &objects, &self.config);
                let value =
                    coercer
                        .coerce(&raw, ret_ty)
                        .map_err(|source| BridgeError::ReturnMismatch {
                            method: method.to_string(),
                            source,
                        })?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    // ========== Standalone existence checks ==========

    pub fn has_field(&self, subject: Subject, name: &str) -> bool {
        resolve::has_field(&self.classes, &self.lock_objects(), subject, name)
    }

    pub fn has_method(&self, subject: Subject, name: &str) -> bool {
        resolve::has_method(&self.classes, &self.lock_objects(), subject, name)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_outcome_integer_codes() {
        assert_eq!(i32::from(IndexOutcome::Absent), 0);
        assert_eq!(i32::from(IndexOutcome::Field), 1);
        assert_eq!(i32::from(IndexOutcome::Callable), 2);
        assert_eq!(IndexOutcome::try_from(2).unwrap(), IndexOutcome::Callable);
        assert!(IndexOutcome::try_from(3).is_err());
    }

    #[test]
    fn unknown_engine_is_reported() {
        let bridge = Bridge::new();
        let result = bridge.member_index(99, Subject::Class(0), "anything");
        assert!(matches!(
            result,
            Err(BridgeError::UnknownEngine { id: 99 })
        ));
    }

    #[test]
    fn stale_proxy_handle_is_reported() {
        let bridge = Bridge::new();
        let handle = HostHandle {
            index: 0,
            generation: 0,
        };
        assert!(matches!(
            bridge.invoke_proxy(handle, "run", &[]),
            Err(BridgeError::StaleHandle)
        ));
    }
}
