//! Opaque resource identities.

use std::fmt;

/// Identity of an entry in a [`Context`](crate::Context) registry.
///
/// An id packs the arena slot that holds the record and the generation the
/// slot was filled with. Generations come from a per-arena counter that only
/// moves forward, so an arena never hands out the same id twice and a stale
/// id cannot alias a record created later in a reused slot.
///
/// Ids can only be produced by a registry. [`Id::INVALID`] is the one value
/// that is available everywhere and it never resolves to a record.
///
/// An id carries no tag of the [`Context`](crate::Context) that issued it.
/// Every context numbers its arenas independently, so a handle passed to a
/// context other than its own may resolve to an unrelated record there.
/// Keep handles with the context they came from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    // Field order matters: the derived ordering sorts by generation first,
    // which is creation order within one arena.
    generation: u32,
    slot: u32,
}

impl Id {
    /// Sentinel that is never assigned to a live resource.
    pub const INVALID: Id = Id {
        generation: 0,
        slot: u32::MAX,
    };

    pub(crate) const fn new(slot: u32, generation: u32) -> Self {
        Self { generation, slot }
    }

    /// `false` only for [`Id::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.generation != 0
    }

    /// Allocation serial within the owning arena, starting at 1.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub(crate) const fn slot(self) -> u32 {
        self.slot
    }

    /// Packed 64-bit form, handy for logs and foreign keys.
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.slot as u64
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}v{}", self.slot, self.generation)
        } else {
            f.write_str("invalid")
        }
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn invalid_is_default_and_not_valid() {
        assert_eq!(Id::default(), Id::INVALID);
        assert!(!Id::INVALID.is_valid());
        assert!(Id::new(0, 1).is_valid());
    }

    #[test]
    fn ordering_follows_generation() {
        let older = Id::new(7, 1);
        let newer = Id::new(0, 2);
        assert!(older < newer);
    }

    #[test]
    fn hash_and_eq_are_structural() {
        let mut set = HashSet::new();
        set.insert(Id::new(3, 9));
        assert!(set.contains(&Id::new(3, 9)));
        assert!(!set.contains(&Id::new(3, 10)));
    }

    #[test]
    fn display_formats_slot_and_generation() {
        assert_eq!(Id::new(2, 5).to_string(), "2v5");
        assert_eq!(Id::INVALID.to_string(), "invalid");
        assert_eq!(Id::new(1, 1).to_bits(), (1u64 << 32) | 1);
    }
}
