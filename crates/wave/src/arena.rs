//! Generational storage backing the registry maps.

use crate::id::Id;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena keyed by [`Id`].
///
/// Freed slots are reused, but every insert draws a fresh generation from a
/// counter that never goes backwards, so ids of removed entries stay dead.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    next_generation: u32,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            next_generation: 1,
            len: 0,
        }
    }

    /// Store `value` under a new id.
    ///
    /// Hands the value back when the id space is exhausted.
    pub(crate) fn insert(&mut self, value: T) -> Result<Id, T> {
        let generation = self.next_generation;
        let Some(next) = generation.checked_add(1) else {
            return Err(value);
        };

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Slot {
                    generation,
                    value: Some(value),
                };
                slot
            }
            None => {
                let Ok(slot) = u32::try_from(self.slots.len()) else {
                    return Err(value);
                };
                if slot == u32::MAX {
                    return Err(value);
                }
                self.slots.push(Slot {
                    generation,
                    value: Some(value),
                });
                slot
            }
        };

        self.next_generation = next;
        self.len += 1;
        Ok(Id::new(slot, generation))
    }

    pub(crate) fn get(&self, id: Id) -> Option<&T> {
        self.slots
            .get(id.slot() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.slots
            .get_mut(id.slot() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.value.as_mut())
    }

    pub(crate) fn contains(&self, id: Id) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn remove(&mut self, id: Id) -> Option<T> {
        let slot = self
            .slots
            .get_mut(id.slot() as usize)
            .filter(|s| s.generation == id.generation())?;
        let value = slot.value.take()?;
        self.free.push(id.slot());
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, s)| {
            s.value
                .as_ref()
                .map(|v| (Id::new(slot as u32, s.generation), v))
        })
    }

    /// Remove every entry, oldest first.
    pub(crate) fn take_all(&mut self) -> Vec<(Id, T)> {
        let mut out: Vec<(Id, T)> = Vec::with_capacity(self.len);
        for (slot, s) in self.slots.iter_mut().enumerate() {
            if let Some(value) = s.value.take() {
                out.push((Id::new(slot as u32, s.generation), value));
                self.free.push(slot as u32);
            }
        }
        self.len = 0;
        out.sort_by_key(|(id, _)| *id);
        out
    }
}
