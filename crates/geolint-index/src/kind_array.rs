use std::ops::{Index, IndexMut};

use geolint_model::EntityKind;

/// One value per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindArray<T> {
    slots: [T; 3],
}

impl<T> KindArray<T> {
    pub fn from_fn(f: impl FnMut(EntityKind) -> T) -> Self {
        Self {
            slots: EntityKind::ALL.map(f),
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityKind, &mut T)> {
        EntityKind::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

impl<T> Index<EntityKind> for KindArray<T> {
    type Output = T;

    fn index(&self, kind: EntityKind) -> &T {
        &self.slots[kind.index()]
    }
}

impl<T> IndexMut<EntityKind> for KindArray<T> {
    fn index_mut(&mut self, kind: EntityKind) -> &mut T {
        &mut self.slots[kind.index()]
    }
}
