use waywire_wire::ObjectId;

use crate::error::{EngineError, Result};

#[derive(Debug)]
enum Slot<T> {
    Vacant,
    Occupied(T),
    /// Taken out for dispatch. `released` records an erase that happened
    /// meanwhile; the id goes to the freelist once the value is restored.
    Lent { released: bool },
}

/// Dense id → object map with O(1) insert, lookup and removal.
///
/// Ids are `base + index` into a vector of slots. Erasing clears the slot and
/// pushes the id onto a freelist, so other ids stay valid and the next insert
/// reuses the freed id before growing the vector. Storage never shrinks.
#[derive(Debug)]
pub struct ObjectTable<T> {
    base: ObjectId,
    limit: ObjectId,
    slots: Vec<Slot<T>>,
    freelist: Vec<ObjectId>,
    live: usize,
}

impl<T> ObjectTable<T> {
    /// Create a table issuing ids in `[base, limit)`.
    pub fn new(base: ObjectId, limit: ObjectId) -> Self {
        Self {
            base,
            limit,
            slots: Vec::new(),
            freelist: Vec::new(),
            live: 0,
        }
    }

    /// First id this table can issue.
    pub fn base(&self) -> ObjectId {
        self.base
    }

    /// One past the last id this table can issue.
    pub fn limit(&self) -> ObjectId {
        self.limit
    }

    /// Number of slots ever issued (live or released).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of ids currently bound, including lent ones.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Whether `id` belongs to this table's namespace.
    pub fn owns(&self, id: ObjectId) -> bool {
        id >= self.base && id < self.limit
    }

    fn index(&self, id: ObjectId) -> Result<usize> {
        if !self.owns(id) {
            return Err(EngineError::IdOutOfRange(id));
        }
        let index = (id - self.base) as usize;
        if index >= self.slots.len() {
            return Err(EngineError::IdOutOfRange(id));
        }
        Ok(index)
    }

    /// Store `value` and return its id.
    ///
    /// Released ids are reused first (last released, first reused); otherwise
    /// the id is `base + len()`.
    pub fn insert(&mut self, value: T) -> Result<ObjectId> {
        while let Some(id) = self.freelist.pop() {
            let index = (id - self.base) as usize;
            // insert_at may have claimed a freed id directly; skip those
            if matches!(self.slots[index], Slot::Vacant) {
                self.slots[index] = Slot::Occupied(value);
                self.live += 1;
                return Ok(id);
            }
        }

        let id = u32::try_from(self.slots.len())
            .ok()
            .and_then(|offset| self.base.checked_add(offset))
            .filter(|id| *id < self.limit)
            .ok_or(EngineError::IdsExhausted)?;
        self.slots.push(Slot::Occupied(value));
        self.live += 1;
        Ok(id)
    }

    /// Store `value` under an id chosen by the peer.
    ///
    /// The id must name a vacant slot or be exactly `base + len()`; the peer
    /// allocates its ids densely, so anything further out is rejected.
    pub fn insert_at(&mut self, id: ObjectId, value: T) -> Result<()> {
        if !self.owns(id) {
            return Err(EngineError::IdOutOfRange(id));
        }
        let index = (id - self.base) as usize;
        if index > self.slots.len() {
            return Err(EngineError::IdOutOfRange(id));
        }
        if index == self.slots.len() {
            self.slots.push(Slot::Occupied(value));
            self.live += 1;
            return Ok(());
        }

        match self.slots[index] {
            Slot::Vacant => {
                self.slots[index] = Slot::Occupied(value);
                self.live += 1;
                Ok(())
            }
            _ => Err(EngineError::IdInUse(id)),
        }
    }

    /// Whether `id` is bound (lent objects count as bound).
    pub fn contains(&self, id: ObjectId) -> bool {
        match self.index(id) {
            Ok(index) => matches!(
                self.slots[index],
                Slot::Occupied(_) | Slot::Lent { released: false }
            ),
            Err(_) => false,
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.try_get(id).ok()
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut T> {
        let index = self.index(id).ok()?;
        match &mut self.slots[index] {
            Slot::Occupied(value) => Some(value),
            _ => None,
        }
    }

    /// Like [`get`](Self::get), but tells an out-of-range id apart from a
    /// released or lent one.
    pub fn try_get(&self, id: ObjectId) -> Result<&T> {
        let index = self.index(id)?;
        match &self.slots[index] {
            Slot::Occupied(value) => Ok(value),
            Slot::Vacant | Slot::Lent { released: true } => Err(EngineError::AlreadyReleased(id)),
            Slot::Lent { released: false } => Err(EngineError::ObjectBusy(id)),
        }
    }

    /// Drop the object at `id` and make the id available for reuse.
    ///
    /// A lent object is only marked; it is dropped by [`restore`](Self::restore).
    pub fn erase(&mut self, id: ObjectId) -> Result<()> {
        let index = self.index(id)?;
        let lent = match self.slots[index] {
            Slot::Occupied(_) => false,
            Slot::Lent { released: false } => true,
            Slot::Vacant | Slot::Lent { released: true } => {
                return Err(EngineError::AlreadyReleased(id))
            }
        };

        if lent {
            self.slots[index] = Slot::Lent { released: true };
        } else {
            self.slots[index] = Slot::Vacant;
            self.freelist.push(id);
        }
        self.live -= 1;
        Ok(())
    }

    /// Take the object out of its slot for the duration of a dispatch.
    pub fn lend(&mut self, id: ObjectId) -> Result<T> {
        let index = self.index(id)?;
        match std::mem::replace(&mut self.slots[index], Slot::Lent { released: false }) {
            Slot::Occupied(value) => Ok(value),
            other => {
                let err = match other {
                    Slot::Lent { released: false } => EngineError::ObjectBusy(id),
                    _ => EngineError::AlreadyReleased(id),
                };
                self.slots[index] = other;
                Err(err)
            }
        }
    }

    /// Put a lent object back. Returns `false` if the id was erased while the
    /// object was out, in which case `value` is dropped and the id freed.
    pub fn restore(&mut self, id: ObjectId, value: T) -> bool {
        let Ok(index) = self.index(id) else {
            return false;
        };
        match self.slots[index] {
            Slot::Lent { released: false } => {
                self.slots[index] = Slot::Occupied(value);
                true
            }
            Slot::Lent { released: true } => {
                self.slots[index] = Slot::Vacant;
                self.freelist.push(id);
                false
            }
            _ => {
                debug_assert!(false, "restore of object {id} that was not lent");
                false
            }
        }
    }

    /// Iterate over bound objects in id order. Lent objects are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(index, slot)| match slot {
                Slot::Occupied(value) => Some((self.base + index as ObjectId, value)),
                _ => None,
            })
    }

    /// Drop every object and forget all issued ids.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.freelist.clear();
        self.live = 0;
    }
}
