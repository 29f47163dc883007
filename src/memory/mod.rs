//! Memory model for the C interpreter
//!
//! This module provides the core memory abstractions:
//! - [`types`]: C types, sizes and record layout
//! - [`value`]: runtime value representation
//! - [`serial`]: packing values to bytes and back
//! - [`stack`]: the scope chain (blocks, calls, variable bindings)
//!
//! # Layout
//!
//! [`Memory`] is a single flat byte buffer of fixed capacity. Static storage
//! (string literals, then globals) starts at the heap start address and grows
//! up; the stack starts at the top of memory and grows down. Address 0 is
//! never handed out, so accesses through it fail as null dereferences.
//!
//! # Versions
//!
//! Memory is immutable: [`Memory::write`] returns a new version and leaves
//! the old one intact. Versions share their storage until one of them is
//! written, so keeping an old version around for comparison is cheap.

pub mod serial;
pub mod stack;
pub mod types;
pub mod value;

use crate::interpreter::errors::RuntimeError;
use serial::Endianness;
use std::rc::Rc;
use value::{Address, PointerValue, Value};

/// A versioned, byte-addressable store
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Rc<Vec<u8>>,
    version: u64,
    endianness: Endianness,
}

impl Memory {
    /// All-zero memory of the given capacity
    pub fn allocate(size: usize, endianness: Endianness) -> Self {
        Memory {
            bytes: Rc::new(vec![0; size]),
            version: 0,
            endianness,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether two versions still share the same storage
    pub fn shares_storage(&self, other: &Memory) -> bool {
        Rc::ptr_eq(&self.bytes, &other.bytes)
    }

    fn check(&self, address: Address, size: usize) -> Result<usize, RuntimeError> {
        if address == 0 && size > 0 {
            return Err(RuntimeError::NullDereference { size });
        }
        let fault = RuntimeError::MemoryFault { address, size };
        let start = usize::try_from(address).map_err(|_| fault.clone())?;
        match start.checked_add(size) {
            Some(end) if end <= self.capacity() => Ok(start),
            _ => Err(fault),
        }
    }

    /// Store `value` at the reference's address
    ///
    /// `None` means "no initializer" and leaves memory untouched.
    pub fn write(&self, reference: &PointerValue, value: Option<&Value>) -> Result<Memory, RuntimeError> {
        let Some(value) = value else {
            return Ok(self.clone());
        };
        let offset = self.check(reference.address, value.ty().size())?;
        let mut next = self.clone();
        serial::pack(value, Rc::make_mut(&mut next.bytes).as_mut_slice(), offset, self.endianness)?;
        next.version += 1;
        Ok(next)
    }

    /// Load a value of the reference's pointee type
    pub fn read(&self, reference: &PointerValue) -> Result<Value, RuntimeError> {
        let offset = self.check(reference.address, reference.size())?;
        serial::unpack(reference.pointee(), &self.bytes, offset, self.endianness)
    }

    /// NUL-terminated UTF-8 text starting at `address`
    ///
    /// The scan stops after `max` bytes when given, otherwise at the end of
    /// memory.
    pub fn read_c_string(&self, address: Address, max: Option<usize>) -> Result<String, RuntimeError> {
        let start = self.check(address, 1)?;
        let end = match max {
            Some(max) => start.saturating_add(max).min(self.capacity()),
            None => self.capacity(),
        };
        let scanned = &self.bytes[start..end];
        let text = match scanned.iter().position(|b| *b == 0) {
            Some(nul) => &scanned[..nul],
            None => scanned,
        };
        String::from_utf8(text.to_vec()).map_err(|err| RuntimeError::InvalidString {
            address,
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Load,
    Store,
}

/// One memory access recorded in the current log window
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: AccessKind,
    pub reference: PointerValue,
    /// The stored value, for stores
    pub value: Option<Value>,
}

/// Whether the byte ranges `[address, address + size)` of two references overlap
pub fn refs_intersect(a: &PointerValue, b: &PointerValue) -> bool {
    let a_end = a.address.saturating_add(a.size() as Address);
    let b_end = b.address.saturating_add(b.size() as Address);
    a.address < b_end && b.address < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Scalar, Type};

    #[test]
    fn test_write_creates_new_version() {
        let memory = Memory::allocate(0x100, Endianness::Little);
        let reference = PointerValue::new(Type::int(), 0x10);
        let written = memory.write(&reference, Some(&Value::int(42))).unwrap();

        assert_eq!(written.read(&reference).unwrap(), Value::int(42));
        assert_eq!(memory.read(&reference).unwrap(), Value::int(0));
        assert_eq!(written.version(), memory.version() + 1);
        assert!(!written.shares_storage(&memory));
    }

    #[test]
    fn test_write_without_value_is_noop() {
        let memory = Memory::allocate(0x100, Endianness::Little);
        let reference = PointerValue::new(Type::int(), 0x10);
        let same = memory.write(&reference, None).unwrap();
        assert!(same.shares_storage(&memory));
        assert_eq!(same.version(), memory.version());
    }

    #[test]
    fn test_null_and_out_of_bounds() {
        let memory = Memory::allocate(0x100, Endianness::Little);
        assert!(matches!(
            memory.read(&PointerValue::new(Type::int(), 0)),
            Err(RuntimeError::NullDereference { size: 4 })
        ));
        assert!(matches!(
            memory.read(&PointerValue::new(Type::int(), 0xfe)),
            Err(RuntimeError::MemoryFault { address: 0xfe, size: 4 })
        ));
    }

    #[test]
    fn test_read_c_string() {
        let memory = Memory::allocate(0x100, Endianness::Little);
        let text = Value::Array {
            elem: Type::scalar(Scalar::Char),
            elements: b"hi!\0"
                .iter()
                .map(|b| Value::integral(Scalar::Char, *b as i128))
                .collect(),
        };
        let at = PointerValue::new(text.ty(), 0x20);
        let memory = memory.write(&at, Some(&text)).unwrap();
        assert_eq!(memory.read_c_string(0x20, None).unwrap(), "hi!");
        assert_eq!(memory.read_c_string(0x20, Some(2)).unwrap(), "hi");
    }

    #[test]
    fn test_refs_intersect() {
        let int_at = |address| PointerValue::new(Type::int(), address);
        let char_at = |address| PointerValue::new(Type::scalar(Scalar::Char), address);
        assert!(refs_intersect(&int_at(0x10), &char_at(0x13)));
        assert!(!refs_intersect(&int_at(0x10), &char_at(0x14)));
        assert!(refs_intersect(&int_at(0x10), &int_at(0x0e)));
        assert!(!refs_intersect(&int_at(0x10), &int_at(0x0c)));
        assert!(refs_intersect(&int_at(u64::MAX - 1), &char_at(u64::MAX - 1)));
    }
}
