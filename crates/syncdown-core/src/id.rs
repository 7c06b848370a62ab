//! Identity types for syncdown contexts

use std::fmt;

/// Context identity - one per tab/window running a timer engine
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextId(pub u64);

impl ContextId {
    pub const ZERO: ContextId = ContextId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        ContextId(id)
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:016x})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_display() {
        let id = ContextId::new(0xabc);
        assert_eq!(id.to_string(), "0000000000000abc");
        assert_eq!(format!("{:?}", id), "Context(0000000000000abc)");
    }
}
