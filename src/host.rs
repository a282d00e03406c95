//! The reflective host object model.
//!
//! Classes and interfaces are registered up front through builders; the
//! recorded fields, methods and constructors are the introspection surface
//! the resolver and matcher scan at call time. Registration order is
//! preserved - overload resolution selects the first eligible candidate in
//! that order, which is the documented, deterministic policy.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{BridgeError, HostError};
use crate::handles::HostHandle;
use crate::host_type::{ClassFlags, ClassId, HostType, TypeHash};
use crate::script_value::ScriptRef;

/// A host-side value: the product of coercion, or a callable's result.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
    /// Wrapped script table or function handle.
    Script(ScriptRef),
    /// Handle to a host object in the handle table.
    Object(HostHandle),
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int8(_) => "int8",
            HostValue::Int16(_) => "int16",
            HostValue::Int32(_) => "int32",
            HostValue::Int64(_) => "int64",
            HostValue::Float32(_) => "float32",
            HostValue::Float64(_) => "float64",
            HostValue::Str(_) => "string",
            HostValue::Script(_) => "script handle",
            HostValue::Object(_) => "object",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            HostValue::Int32(value) => Some(*value),
            HostValue::Int16(value) => Some(i32::from(*value)),
            HostValue::Int8(value) => Some(i32::from(*value)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int64(value) => Some(*value),
            HostValue::Int32(value) => Some(i64::from(*value)),
            HostValue::Int16(value) => Some(i64::from(*value)),
            HostValue::Int8(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Float64(value) => Some(*value),
            HostValue::Float32(value) => Some(f64::from(*value)),
            HostValue::Int32(value) => Some(f64::from(*value)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<HostHandle> {
        match self {
            HostValue::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptRef> {
        match self {
            HostValue::Script(reference) => Some(reference),
            _ => None,
        }
    }
}

/// Context passed to native callable invocations.
///
/// Provides the 'this' object for methods (None for statics and
/// constructors), the coerced arguments, and a slot for the return value.
pub struct HostCallContext<'a> {
    this: Option<&'a mut dyn Any>,
    args: &'a [HostValue],
    ret: Option<HostValue>,
}

impl<'a> HostCallContext<'a> {
    pub fn new(this: Option<&'a mut dyn Any>, args: &'a [HostValue]) -> Self {
        Self {
            this,
            args,
            ret: None,
        }
    }

    pub fn has_this(&self) -> bool {
        self.this.is_some()
    }

    /// Get 'this' as a concrete type (immutable).
    pub fn this_ref<T: Any>(&self) -> Result<&T, HostError> {
        self.this
            .as_deref()
            .ok_or(HostError::MissingThis)?
            .downcast_ref::<T>()
            .ok_or(HostError::ThisTypeMismatch {
                expected: std::any::type_name::<T>(),
            })
    }

    /// Get 'this' as a concrete type (mutable).
    pub fn this_mut<T: Any>(&mut self) -> Result<&mut T, HostError> {
        self.this
            .as_deref_mut()
            .ok_or(HostError::MissingThis)?
            .downcast_mut::<T>()
            .ok_or(HostError::ThisTypeMismatch {
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn arg(&self, index: usize) -> Option<&HostValue> {
        self.args.get(index)
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[HostValue] {
        self.args
    }

    pub fn set_return(&mut self, value: HostValue) {
        self.ret = Some(value);
    }

    /// Consume the context and return the return value, if any was set.
    pub fn take_return(self) -> Option<HostValue> {
        self.ret
    }

    // ========== Argument extraction helpers ==========

    pub fn arg_bool(&self, index: usize) -> Result<bool, HostError> {
        self.arg(index)
            .and_then(HostValue::as_bool)
            .ok_or(HostError::BadArgument {
                index,
                expected: "bool",
            })
    }

    pub fn arg_i32(&self, index: usize) -> Result<i32, HostError> {
        self.arg(index)
            .and_then(HostValue::as_i32)
            .ok_or(HostError::BadArgument {
                index,
                expected: "int32",
            })
    }

    pub fn arg_i64(&self, index: usize) -> Result<i64, HostError> {
        self.arg(index)
            .and_then(HostValue::as_i64)
            .ok_or(HostError::BadArgument {
                index,
                expected: "int64",
            })
    }

    pub fn arg_f64(&self, index: usize) -> Result<f64, HostError> {
        self.arg(index)
            .and_then(HostValue::as_f64)
            .ok_or(HostError::BadArgument {
                index,
                expected: "float64",
            })
    }

    pub fn arg_str(&self, index: usize) -> Result<&str, HostError> {
        self.arg(index)
            .and_then(HostValue::as_str)
            .ok_or(HostError::BadArgument {
                index,
                expected: "string",
            })
    }

    pub fn arg_object(&self, index: usize) -> Result<HostHandle, HostError> {
        self.arg(index)
            .and_then(HostValue::as_object)
            .ok_or(HostError::BadArgument {
                index,
                expected: "object",
            })
    }

    pub fn arg_script(&self, index: usize) -> Result<&ScriptRef, HostError> {
        self.arg(index)
            .and_then(HostValue::as_script)
            .ok_or(HostError::BadArgument {
                index,
                expected: "script handle",
            })
    }
}

/// Type-erased native callable.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn Fn(&mut HostCallContext) -> Result<(), HostError> + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut HostCallContext) -> Result<(), HostError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn call(&self, ctx: &mut HostCallContext) -> Result<(), HostError> {
        (self.inner)(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

type FieldGetter = Arc<dyn Fn(Option<&dyn Any>) -> Result<HostValue, HostError> + Send + Sync>;

/// A readable field declared on a host class.
pub struct HostField {
    pub name: String,
    pub ty: HostType,
    pub is_static: bool,
    getter: FieldGetter,
}

impl HostField {
    /// Read the field's current value. Getters must not call back into the
    /// bridge.
    pub fn read(&self, instance: Option<&dyn Any>) -> Result<HostValue, HostError> {
        (self.getter)(instance)
    }
}

impl fmt::Debug for HostField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostField")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

/// A method declared on a host class or interface.
pub struct HostMethod {
    pub name: String,
    pub params: Vec<HostType>,
    pub ret: Option<HostType>,
    pub is_static: bool,
    /// None for abstract interface signatures.
    func: Option<NativeFn>,
}

impl HostMethod {
    pub fn is_abstract(&self) -> bool {
        self.func.is_none()
    }

    pub fn invoke(&self, ctx: &mut HostCallContext) -> Result<(), HostError> {
        match &self.func {
            Some(f) => f.call(ctx),
            None => Err(HostError::AbstractMethod {
                name: self.name.clone(),
            }),
        }
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("is_static", &self.is_static)
            .field("abstract", &self.is_abstract())
            .finish()
    }
}

type Factory =
    Arc<dyn Fn(&[HostValue]) -> Result<Box<dyn Any + Send + Sync>, HostError> + Send + Sync>;

/// A constructor declared on a host class.
pub struct HostConstructor {
    pub params: Vec<HostType>,
    factory: Factory,
}

impl HostConstructor {
    pub fn instantiate(
        &self,
        args: &[HostValue],
    ) -> Result<Box<dyn Any + Send + Sync>, HostError> {
        (self.factory)(args)
    }
}

impl fmt::Debug for HostConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostConstructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// One registered class or interface.
#[derive(Debug)]
pub struct HostClass {
    pub id: ClassId,
    pub name: String,
    pub hash: TypeHash,
    pub flags: ClassFlags,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub fields: Vec<HostField>,
    pub methods: Vec<HostMethod>,
    pub constructors: Vec<HostConstructor>,
}

impl HostClass {
    pub fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::INTERFACE)
    }
}

/// Registry of every class and interface the host exposes to scripts.
///
/// `ClassId`s index the class list; insertion order is the introspection
/// order the matcher scans.
#[derive(Debug, Default)]
pub struct HostRegistry {
    classes: Vec<HostClass>,
    by_name: FxHashMap<String, ClassId>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start registering a class. Finish with [`ClassBuilder::build`].
    pub fn register_class(&mut self, name: &str) -> ClassBuilder<'_> {
        ClassBuilder::new(self, name.to_string(), ClassFlags::CLASS)
    }

    /// Start registering an interface: abstract method signatures only.
    pub fn register_interface(&mut self, name: &str) -> ClassBuilder<'_> {
        ClassBuilder::new(self, name.to_string(), ClassFlags::INTERFACE)
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: ClassId) -> Option<&HostClass> {
        self.classes.get(id as usize)
    }

    /// Class name for diagnostics; tolerates unknown ids.
    pub fn name_of(&self, id: ClassId) -> &str {
        self.get(id).map_or("<unknown>", |class| class.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether an instance of `from` may stand where `to` is expected:
    /// the same class, a superclass, or a (transitively) implemented
    /// interface.
    pub fn is_assignable(&self, from: ClassId, to: ClassId) -> bool {
        if from == to {
            return true;
        }
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(class) = self.get(id) else {
                return false;
            };
            if id == to {
                return true;
            }
            if class
                .interfaces
                .iter()
                .any(|&iface| self.is_assignable(iface, to))
            {
                return true;
            }
            current = class.superclass;
        }
        false
    }

    /// Exact-name field lookup, searching the superclass chain.
    pub fn find_field(&self, class: ClassId, name: &str, static_only: bool) -> Option<&HostField> {
        let mut current = Some(class);
        while let Some(id) = current {
            let class = self.get(id)?;
            if let Some(field) = class
                .fields
                .iter()
                .find(|field| field.name == name && (!static_only || field.is_static))
            {
                return Some(field);
            }
            current = class.superclass;
        }
        None
    }

    /// All methods with the given name, in introspection order: the class's
    /// own declarations first, then the superclass chain.
    pub fn methods_named(
        &self,
        class: ClassId,
        name: &str,
        static_only: bool,
    ) -> Vec<&HostMethod> {
        let mut found = Vec::new();
        let mut current = Some(class);
        while let Some(id) = current {
            let Some(class) = self.get(id) else { break };
            found.extend(
                class
                    .methods
                    .iter()
                    .filter(|method| method.name == name && (!static_only || method.is_static)),
            );
            current = class.superclass;
        }
        found
    }

    pub fn has_method_named(&self, class: ClassId, name: &str, static_only: bool) -> bool {
        !self.methods_named(class, name, static_only).is_empty()
    }

    fn add_class(&mut self, class: HostClass) -> ClassId {
        let id = class.id;
        self.by_name.insert(class.name.clone(), id);
        self.classes.push(class);
        id
    }
}

/// Builder for registering a class or interface.
///
/// Created by [`HostRegistry::register_class`] or
/// [`HostRegistry::register_interface`].
pub struct ClassBuilder<'r> {
    registry: &'r mut HostRegistry,
    name: String,
    flags: ClassFlags,
    superclass: Option<ClassId>,
    interfaces: Vec<ClassId>,
    fields: Vec<HostField>,
    methods: Vec<HostMethod>,
    constructors: Vec<HostConstructor>,
}

impl<'r> ClassBuilder<'r> {
    fn new(registry: &'r mut HostRegistry, name: String, flags: ClassFlags) -> Self {
        Self {
            registry,
            name,
            flags,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: ClassId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: ClassId) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.flags |= ClassFlags::ABSTRACT;
        self
    }

    /// Declare an instance field with an infallible getter.
    pub fn field<T, F>(mut self, name: &str, ty: HostType, get: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> HostValue + Send + Sync + 'static,
    {
        let getter: FieldGetter = Arc::new(move |instance| {
            let instance = instance.ok_or(HostError::MissingThis)?;
            let this = instance
                .downcast_ref::<T>()
                .ok_or(HostError::ThisTypeMismatch {
                    expected: std::any::type_name::<T>(),
                })?;
            Ok(get(this))
        });
        self.fields.push(HostField {
            name: name.to_string(),
            ty,
            is_static: false,
            getter,
        });
        self
    }

    /// Declare an instance field whose getter may fail.
    pub fn field_with<T, F>(mut self, name: &str, ty: HostType, get: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Result<HostValue, HostError> + Send + Sync + 'static,
    {
        let getter: FieldGetter = Arc::new(move |instance| {
            let instance = instance.ok_or(HostError::MissingThis)?;
            let this = instance
                .downcast_ref::<T>()
                .ok_or(HostError::ThisTypeMismatch {
                    expected: std::any::type_name::<T>(),
                })?;
            get(this)
        });
        self.fields.push(HostField {
            name: name.to_string(),
            ty,
            is_static: false,
            getter,
        });
        self
    }

    /// Declare a static field.
    pub fn static_field<F>(mut self, name: &str, ty: HostType, get: F) -> Self
    where
        F: Fn() -> HostValue + Send + Sync + 'static,
    {
        let getter: FieldGetter = Arc::new(move |_| Ok(get()));
        self.fields.push(HostField {
            name: name.to_string(),
            ty,
            is_static: true,
            getter,
        });
        self
    }

    /// Declare an instance method.
    pub fn method<F>(mut self, name: &str, params: Vec<HostType>, ret: Option<HostType>, f: F) -> Self
    where
        F: Fn(&mut HostCallContext) -> Result<(), HostError> + Send + Sync + 'static,
    {
        self.methods.push(HostMethod {
            name: name.to_string(),
            params,
            ret,
            is_static: false,
            func: Some(NativeFn::new(f)),
        });
        self
    }

    /// Declare a static method.
    pub fn static_method<F>(
        mut self,
        name: &str,
        params: Vec<HostType>,
        ret: Option<HostType>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut HostCallContext) -> Result<(), HostError> + Send + Sync + 'static,
    {
        self.methods.push(HostMethod {
            name: name.to_string(),
            params,
            ret,
            is_static: true,
            func: Some(NativeFn::new(f)),
        });
        self
    }

    /// Declare an abstract method signature (interfaces).
    pub fn method_sig(mut self, name: &str, params: Vec<HostType>, ret: Option<HostType>) -> Self {
        self.methods.push(HostMethod {
            name: name.to_string(),
            params,
            ret,
            is_static: false,
            func: None,
        });
        self
    }

    /// Declare a constructor.
    pub fn constructor<F>(mut self, params: Vec<HostType>, f: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<Box<dyn Any + Send + Sync>, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.push(HostConstructor {
            params,
            factory: Arc::new(f),
        });
        self
    }

    /// Finish and register. Fails if the name is already taken.
    pub fn build(self) -> Result<ClassId, BridgeError> {
        if self.registry.lookup(&self.name).is_some() {
            return Err(BridgeError::DuplicateClass { name: self.name });
        }
        let id = self.registry.classes.len() as ClassId;
        let hash = TypeHash::from_name(&self.name);
        debug!(name = %self.name, id, "registering host class");
        Ok(self.registry.add_class(HostClass {
            id,
            name: self.name,
            hash,
            flags: self.flags,
            superclass: self.superclass,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            constructors: self.constructors,
        }))
    }
}
