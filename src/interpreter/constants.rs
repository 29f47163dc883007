// Constants for the C interpreter

/// Default memory capacity in bytes
/// The stack starts at the top of memory and grows down
pub const DEFAULT_MEMORY_SIZE: usize = 0x1_0000;

/// First address of static storage (string literals and globals)
/// Bytes below this are never handed out, so address 0 stays null
pub const HEAP_START: u64 = 0x100;

/// Width of a data pointer in bytes
pub const POINTER_SIZE: usize = 4;

/// Width of a function pointer in bytes (an index into the function table)
pub const FUNCTION_POINTER_SIZE: usize = 2;

/// Default snapshot history budget for the interactive driver (100 MiB)
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 100 * 1024 * 1024;
