//! Scope chain and stack accounting
//!
//! This module provides the frames that make up the active scope:
//! - [`ScopeKind::Block`]: a compound statement (or `for` loop) being executed
//! - [`ScopeKind::Function`]: an active call, holding the caller's
//!   continuation and the evaluated `[callee, args...]`
//! - [`ScopeKind::Variable`]: one name bound to a reference into memory
//!
//! Frames form an immutable singly-linked chain. Pushing a frame returns the
//! new top; the old chain is untouched, so earlier states keep their scope.
//!
//! # Stack Accounting
//!
//! Each frame records `limit`, the next free stack address. The stack grows
//! down from the top of memory: declaring a variable of size `n` places it at
//! `limit - n` and lowers the limit. Leaving a frame restores the parent's
//! limit, so stack space is released with the scope.
//!
//! # Name Resolution
//!
//! Lookups walk the chain from the top and stop at the nearest function
//! frame: a function never sees the locals of its callers.

use super::types::{Type, TypeRef};
use super::value::{Address, PointerValue, Value};
use crate::ast::NodeId;
use crate::interpreter::control::Cont;
use crate::interpreter::errors::RuntimeError;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum ScopeKind {
    Root,
    Block {
        node: NodeId,
    },
    Function {
        cont: Cont,
        values: Vec<Value>,
    },
    Variable {
        name: String,
        ty: TypeRef,
        reference: PointerValue,
    },
}

/// One frame of the scope chain
#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<Rc<Scope>>,
    /// Strictly increasing along the chain
    pub key: u64,
    /// Next free stack address
    pub limit: Address,
    pub kind: ScopeKind,
}

impl Scope {
    /// The bottom frame, with the whole stack free above `limit`
    pub fn root(limit: Address) -> Rc<Scope> {
        Rc::new(Scope {
            parent: None,
            key: 0,
            limit,
            kind: ScopeKind::Root,
        })
    }

    fn push(parent: &Rc<Scope>, limit: Address, kind: ScopeKind) -> Rc<Scope> {
        Rc::new(Scope {
            parent: Some(parent.clone()),
            key: parent.key + 1,
            limit,
            kind,
        })
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ScopeKind::Root)
    }
}

/// Frames from the top of the chain down to the root
pub fn frames<'a>(scope: &'a Rc<Scope>) -> impl Iterator<Item = &'a Rc<Scope>> + 'a {
    std::iter::successors(Some(scope), |frame| frame.parent.as_ref())
}

pub fn declare_block(scope: &Rc<Scope>, node: NodeId) -> Rc<Scope> {
    Scope::push(scope, scope.limit, ScopeKind::Block { node })
}

/// Bind `name` to fresh stack storage, or to existing storage
///
/// An array declared with a pointer initializer (a string literal, for
/// instance) aliases the pointed-to storage and consumes no stack. The
/// returned flag says whether the initializer still has to be stored.
pub fn declare_variable(
    scope: &Rc<Scope>,
    name: &str,
    ty: TypeRef,
    init: Option<&Value>,
) -> Result<(Rc<Scope>, PointerValue, bool), RuntimeError> {
    if let (Type::Array(_), Some(Value::Pointer(storage))) = (&*ty, init) {
        let reference = PointerValue::new(ty.clone(), storage.address);
        let kind = ScopeKind::Variable {
            name: name.to_string(),
            ty,
            reference: reference.clone(),
        };
        return Ok((Scope::push(scope, scope.limit, kind), reference, false));
    }
    let address = scope
        .limit
        .checked_sub(ty.size() as Address)
        .ok_or_else(|| RuntimeError::StackOverflow {
            name: name.to_string(),
        })?;
    let reference = PointerValue::new(ty.clone(), address);
    let kind = ScopeKind::Variable {
        name: name.to_string(),
        ty,
        reference: reference.clone(),
    };
    Ok((Scope::push(scope, address, kind), reference, init.is_some()))
}

pub fn declare_function_call(scope: &Rc<Scope>, cont: Cont, values: Vec<Value>) -> Rc<Scope> {
    Scope::push(scope, scope.limit, ScopeKind::Function { cont, values })
}

/// Pop frames up to and including the block frame opened for `node`
pub fn leave(scope: &Rc<Scope>, node: NodeId) -> Result<Rc<Scope>, RuntimeError> {
    frames(scope)
        .find(|frame| matches!(frame.kind, ScopeKind::Block { node: n } if n == node))
        .and_then(|frame| frame.parent.clone())
        .ok_or_else(|| RuntimeError::StackUnderflow {
            context: format!("leaving block {}", node),
        })
}

/// Pop frames up to and including the nearest function frame
///
/// Returns the caller's scope, its continuation and the call values.
pub fn leave_function(scope: &Rc<Scope>) -> Result<(Rc<Scope>, Cont, Vec<Value>), RuntimeError> {
    for frame in frames(scope) {
        if let ScopeKind::Function { cont, values } = &frame.kind {
            if let Some(parent) = &frame.parent {
                return Ok((parent.clone(), cont.clone(), values.clone()));
            }
        }
    }
    Err(RuntimeError::StackUnderflow {
        context: "returning from a function".to_string(),
    })
}

/// Reference bound to `name` in the current function, if any
pub fn resolve_name(scope: &Rc<Scope>, name: &str) -> Option<PointerValue> {
    for frame in frames(scope) {
        match &frame.kind {
            ScopeKind::Function { .. } => return None,
            ScopeKind::Variable { name: bound, reference, .. } if bound == name => {
                return Some(reference.clone())
            }
            _ => {}
        }
    }
    None
}

/// The innermost active function frame
pub fn nearest_function(scope: &Rc<Scope>) -> Option<&Rc<Scope>> {
    frames(scope).find(|frame| matches!(frame.kind, ScopeKind::Function { .. }))
}

/// Whether `frame` is still part of the chain
pub fn contains(scope: &Rc<Scope>, frame: &Rc<Scope>) -> bool {
    frames(scope).any(|f| Rc::ptr_eq(f, frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Scalar;

    #[test]
    fn test_variables_grow_down() {
        let root = Scope::root(0x1000);
        let (scope, a, store) = declare_variable(&root, "a", Type::int(), Some(&Value::int(1))).unwrap();
        assert!(store);
        assert_eq!(a.address, 0xffc);
        let (scope, b, store) = declare_variable(&scope, "b", Type::scalar(Scalar::Char), None).unwrap();
        assert!(!store);
        assert_eq!(b.address, 0xffb);
        assert_eq!(scope.limit, 0xffb);
        assert_eq!(scope.key, 2);
        assert_eq!(resolve_name(&scope, "a"), Some(a));
    }

    #[test]
    fn test_array_from_pointer_aliases_storage() {
        let root = Scope::root(0x1000);
        let literal = Value::Pointer(PointerValue::new(Type::scalar(Scalar::Char), 0x100));
        let ty = Type::array_of(Type::scalar(Scalar::Char), Some(4));
        let (scope, reference, store) = declare_variable(&root, "s", ty, Some(&literal)).unwrap();
        assert!(!store);
        assert_eq!(reference.address, 0x100);
        assert_eq!(scope.limit, 0x1000);
    }

    #[test]
    fn test_leave_restores_limit() {
        let root = Scope::root(0x1000);
        let block = declare_block(&root, 7);
        let (inner, _, _) = declare_variable(&block, "x", Type::int(), None).unwrap();
        let (inner, _, _) = declare_variable(&inner, "y", Type::int(), None).unwrap();
        assert_eq!(inner.limit, 0xff8);

        let left = leave(&inner, 7).unwrap();
        assert!(Rc::ptr_eq(&left, &root));
        assert_eq!(left.limit, block.limit);
        assert!(matches!(
            leave(&inner, 8),
            Err(RuntimeError::StackUnderflow { .. })
        ));
    }

    #[test]
    fn test_lookup_stops_at_function_frame() {
        let root = Scope::root(0x1000);
        let outer_call = declare_function_call(&root, Cont::Halt, vec![]);
        let (outer, outer_x, _) = declare_variable(&outer_call, "x", Type::int(), None).unwrap();
        let inner_call = declare_function_call(&outer, Cont::Halt, vec![]);
        assert_eq!(resolve_name(&inner_call, "x"), None);

        let (inner, inner_x, _) = declare_variable(&inner_call, "x", Type::int(), None).unwrap();
        assert_ne!(inner_x.address, outer_x.address);
        assert_eq!(resolve_name(&inner, "x"), Some(inner_x));

        let (caller, _, _) = leave_function(&inner).unwrap();
        assert_eq!(resolve_name(&caller, "x"), Some(outer_x));
        assert!(contains(&inner, &inner_call));
        assert!(!contains(&caller, &inner_call));
        assert_eq!(nearest_function(&caller).map(|f| f.key), Some(outer_call.key));
    }

    #[test]
    fn test_return_without_function_underflows() {
        let root = Scope::root(0x1000);
        let err = leave_function(&declare_block(&root, 1)).unwrap_err();
        assert_eq!(err.tag(), "stack-underflow");
    }
}
