//! Custom allocator hook.
//!
//! The `{alloc, free, opaque}` triple with both-or-neither validation is
//! re-architected as a small trait; the default implementation defers to
//! the platform allocator (always backed by `Vec`) while still exposing
//! the seam a caller-supplied allocator needs.

use crate::error::{ErrorCode, Res};

pub trait Allocator: Send + Sync {
    fn alloc(&self, size: usize) -> Vec<u8>;
}

pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn alloc(&self, size: usize) -> Vec<u8> {
        vec![0u8; size]
    }
}

/// Validates the both-or-neither rule: a caller either supplies both halves
/// of a custom allocator or neither.
pub fn validate_pair<T, U>(alloc: &Option<T>, free: &Option<U>) -> Res<()> {
    crate::ensure!(
        alloc.is_some() == free.is_some(),
        ErrorCode::ParameterUnsupported,
        "custom allocator requires both alloc and free, or neither"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_allocator_zeroes_memory() {
        let alloc = SystemAllocator;
        let buf = alloc.alloc(16);
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn both_or_neither_rule_holds() {
        assert!(validate_pair(&Some(1), &Some(2)).is_ok());
        assert!(validate_pair::<i32, i32>(&None, &None).is_ok());
        assert!(validate_pair(&Some(1), &None::<i32>).is_err());
    }
}
