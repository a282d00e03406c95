//! Member lookup on host objects and classes.
//!
//! Implements the index protocol the script engine's metamethod needs: given
//! a subject and a name, decide whether the name denotes a readable field
//! (answered with its coerced value) or a callable (answered with a deferred
//! dispatch token). Overload selection cannot happen here - arguments are
//! only known at call time - so `Callable` is a token, not a bound call.

use tracing::trace;

use crate::handles::{HandleTable, HostHandle, RuntimeClass};
use crate::host::{HostRegistry, HostValue};
use crate::host_type::ClassId;

/// What a member lookup is performed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// A live object; instance and static members are visible.
    Object(HostHandle),
    /// A class reference; static members only.
    Class(ClassId),
}

/// Deferred-dispatch token produced when a name resolves to a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchToken {
    pub subject: Subject,
    pub name: String,
}

/// Result of an index lookup. Never both field and callable: the field
/// phase runs first and wins if the name is present and readable.
#[derive(Debug)]
pub enum ResolvedMember {
    Field(HostValue),
    Callable(DispatchToken),
    Absent,
}

/// The classes a subject's members are looked up on, plus whether lookup is
/// restricted to statics. None if the subject handle is stale.
pub(crate) fn subject_roots(
    objects: &HandleTable,
    subject: Subject,
) -> Option<(Vec<ClassId>, bool)> {
    match subject {
        Subject::Class(id) => Some((vec![id], true)),
        Subject::Object(handle) => match objects.runtime_class(handle)? {
            RuntimeClass::Instance(id) => Some((vec![*id], false)),
            RuntimeClass::Proxy(interfaces) => Some((interfaces.clone(), false)),
        },
    }
}

/// Two-phase index lookup: field first, then callable, else absent.
pub fn resolve_index(
    classes: &HostRegistry,
    objects: &HandleTable,
    subject: Subject,
    name: &str,
) -> ResolvedMember {
    let Some((roots, static_only)) = subject_roots(objects, subject) else {
        return ResolvedMember::Absent;
    };

    // Phase 1: exact-name field.
    for &root in &roots {
        if let Some(field) = classes.find_field(root, name, static_only) {
            let instance = match subject {
                Subject::Object(handle) if !field.is_static => objects.any_ref(handle),
                _ => None,
            };
            match field.read(instance.map(|any| any as &dyn std::any::Any)) {
                Ok(value) => return ResolvedMember::Field(value),
                // A failing getter degrades to "no such field" for lookup;
                // faults only surface through the dispatch path.
                Err(err) => {
                    trace!(field = name, %err, "field read degraded to absent");
                }
            }
        }
    }

    // Phase 2: any callable with the name; overload choice is deferred.
    for &root in &roots {
        if classes.has_method_named(root, name, static_only) {
            return ResolvedMember::Callable(DispatchToken {
                subject,
                name: name.to_string(),
            });
        }
    }

    ResolvedMember::Absent
}

/// Standalone existence check for a field with the given name.
pub fn has_field(
    classes: &HostRegistry,
    objects: &HandleTable,
    subject: Subject,
    name: &str,
) -> bool {
    subject_roots(objects, subject).is_some_and(|(roots, static_only)| {
        roots
            .iter()
            .any(|&root| classes.find_field(root, name, static_only).is_some())
    })
}

/// Standalone existence check for a method with the given name.
pub fn has_method(
    classes: &HostRegistry,
    objects: &HandleTable,
    subject: Subject,
    name: &str,
) -> bool {
    subject_roots(objects, subject).is_some_and(|(roots, static_only)| {
        roots
            .iter()
            .any(|&root| classes.has_method_named(root, name, static_only))
    })
}
