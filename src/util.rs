use std::cell::Cell;

thread_local!(static CONTEXT_ID_GEN: IdGen = IdGen::new());
thread_local!(static OBJECT_KEY_GEN: IdGen = IdGen::new());

struct IdGen {
    next: Cell<u64>,
}

impl IdGen {
    const fn new() -> Self {
        IdGen { next: Cell::new(0) }
    }

    fn next(&self) -> u64 {
        let next = self.next.get();

        self.next.set(next + 1);

        next
    }
}

/// A new id for a [RenderDevice](crate::runtime::RenderDevice).
pub(crate) fn next_context_id() -> usize {
    CONTEXT_ID_GEN.with(|id_gen| id_gen.next()) as usize
}

/// A new key for a GL object. Keys are never reused within a thread.
pub(crate) fn next_object_key() -> u64 {
    OBJECT_KEY_GEN.with(|id_gen| id_gen.next())
}

/// Declares an id type for a kind of resource registered with a device. The id carries the id of
/// the device that issued it.
macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub struct $name {
            pub(crate) context: usize,
            pub(crate) index: u64,
        }

        impl $name {
            pub(crate) fn new(context: usize, index: u64) -> Self {
                $name { context, index }
            }
        }
    };
}

pub(crate) use resource_id;

/// Little-endian bytes for a slice of `f32` values, the layout WebGL expects for `FLOAT` data.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn u32_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys_are_unique() {
        let a = next_object_key();
        let b = next_object_key();

        assert_ne!(a, b);
    }

    #[test]
    fn test_f32_bytes() {
        assert_eq!(f32_bytes(&[1.0]), vec![0, 0, 128, 63]);
        assert_eq!(u16_bytes(&[1, 2]), vec![1, 0, 2, 0]);
    }
}
