//! Script-table-backed interface proxies.
//!
//! A proxy is a host-visible object whose runtime type implements one or
//! more registered interfaces; every invoked method is forwarded to a
//! same-named function in a backing script table. The proxy holds an engine
//! reference to that table for as long as the proxy itself is alive - the
//! binding is shared ownership across the boundary, released only when both
//! runtimes have let go.

use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::handles::{HandleTable, HostHandle, RuntimeClass, Side};
use crate::host::{HostMethod, HostRegistry, HostValue};
use crate::host_type::ClassId;
use crate::script_value::{ScriptRef, ScriptValue, ValueTag};
use crate::session::EngineId;
use crate::stack::{self, ScriptEngine};

/// Association between host interfaces and a backing script table.
#[derive(Debug, Clone)]
pub struct ScriptProxy {
    /// Engine instance the backing table lives in.
    pub engine: EngineId,
    /// Engine reference to the backing table; released when the proxy
    /// retires.
    pub backing: ScriptRef,
    /// Interfaces the proxy's runtime type implements.
    pub interfaces: Vec<ClassId>,
}

/// Resolve and validate the requested interface names.
///
/// Fails before any invocation if a name is unknown, names a non-interface
/// type, or the list is empty.
pub fn validate_interfaces(
    classes: &HostRegistry,
    interface_names: &[&str],
) -> BridgeResult<Vec<ClassId>> {
    if interface_names.is_empty() {
        return Err(BridgeError::EmptyInterfaceList);
    }
    let mut ids = Vec::with_capacity(interface_names.len());
    for name in interface_names {
        let id = classes
            .lookup(name)
            .ok_or_else(|| BridgeError::UnknownClass {
                name: (*name).to_string(),
            })?;
        let class = classes.get(id).ok_or_else(|| BridgeError::UnknownClass {
            name: (*name).to_string(),
        })?;
        if !class.is_interface() {
            return Err(BridgeError::NotAnInterface {
                name: (*name).to_string(),
            });
        }
        ids.push(id);
    }
    Ok(ids)
}

/// Bind a proxy over `backing` and store it in the handle table. The initial
/// reference is credited to the side the proxy is handed to.
pub fn bind(
    objects: &mut HandleTable,
    engine: EngineId,
    backing: ScriptRef,
    interfaces: Vec<ClassId>,
    side: Side,
) -> HostHandle {
    debug!(engine, ?interfaces, "binding script proxy");
    let runtime = RuntimeClass::Proxy(interfaces.clone());
    let proxy = ScriptProxy {
        engine,
        backing,
        interfaces,
    };
    objects.allocate(Box::new(proxy), runtime, side)
}

/// The declared signature for `method` among the proxy's interfaces, in
/// binding order.
pub fn declared_method<'a>(
    classes: &'a HostRegistry,
    proxy: &ScriptProxy,
    method: &str,
) -> Option<&'a HostMethod> {
    proxy
        .interfaces
        .iter()
        .find_map(|&iface| classes.methods_named(iface, method, false).into_iter().next())
}

/// Forward one host-side invocation into the backing table.
///
/// Looks up a same-named value in the table (absent or non-callable is a
/// contract violation), pushes the proxy's own handle as the self-style
/// first argument followed by the host arguments, invokes the script
/// function, and hands back the raw first result (None for void methods).
/// Script faults propagate to the caller.
///
/// The caller holds the engine's session entry; the return value is coerced
/// to the declared type by the caller, which owns the registries.
pub fn invoke_over(
    engine: &dyn ScriptEngine,
    handle: HostHandle,
    decl: &HostMethod,
    backing: &ScriptRef,
    args: &[HostValue],
) -> BridgeResult<Option<ScriptValue>> {
    engine.push_table_field(backing, &decl.name);
    if engine.tag_at(engine.top() - 1) != ValueTag::Function {
        engine.pop(1);
        return Err(BridgeError::ContractViolation {
            method: decl.name.clone(),
        });
    }

    engine.push_host_handle(handle);
    for arg in args {
        stack::push_host_value(engine, arg);
    }

    debug!(method = %decl.name, nargs = args.len(), "forwarding proxy invocation");
    match &decl.ret {
        None => {
            engine.call(args.len() + 1, 0)?;
            Ok(None)
        }
        Some(_) => {
            engine.call(args.len() + 1, 1)?;
            let result = stack::read_value(engine, engine.top() - 1);
            engine.pop(1);
            Ok(Some(result))
        }
    }
}
