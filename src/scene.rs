// src/scene.rs - Scene graph seam and a small in-memory implementation
use nalgebra::Isometry3;

/// Generational handle to an entity owned by a scene graph. A handle whose
/// slot has been reused compares unequal to the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

/// What the tracking pipeline needs from the host's entity hierarchy.
pub trait SceneGraph {
    fn spawn(&mut self) -> EntityId;

    fn despawn(&mut self, entity: EntityId);

    fn is_alive(&self, entity: EntityId) -> bool;

    /// Reparents `child`; `None` detaches it to the scene root.
    fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>);

    /// Sets the transform relative to the entity's parent.
    fn set_local_transform(&mut self, entity: EntityId, transform: Isometry3<f32>);
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    alive: bool,
    parent: Option<EntityId>,
    local: Isometry3<f32>,
    writes: u64,
}

/// Flat-array scene graph used by the demo and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryScene {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl InMemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, entity: EntityId) -> Option<&Slot> {
        self.slots
            .get(entity.index as usize)
            .filter(|slot| slot.alive && slot.generation == entity.generation)
    }

    fn slot_mut(&mut self, entity: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|slot| slot.alive && slot.generation == entity.generation)
    }

    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.slot(entity).and_then(|slot| slot.parent)
    }

    pub fn local_transform(&self, entity: EntityId) -> Option<Isometry3<f32>> {
        self.slot(entity).map(|slot| slot.local)
    }

    /// Number of times the entity's transform has been written.
    pub fn transform_writes(&self, entity: EntityId) -> u64 {
        self.slot(entity).map(|slot| slot.writes).unwrap_or(0)
    }

    /// Composes local transforms up the parent chain. Dead parents end the walk.
    pub fn world_transform(&self, entity: EntityId) -> Option<Isometry3<f32>> {
        let mut world = self.slot(entity)?.local;
        let mut current = self.parent(entity);
        let mut depth = 0;

        while let Some(parent) = current {
            let Some(slot) = self.slot(parent) else { break };
            world = slot.local * world;
            current = slot.parent;
            depth += 1;
            if depth > self.slots.len() {
                break;
            }
        }

        Some(world)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.alive).count()
    }
}

impl SceneGraph for InMemoryScene {
    fn spawn(&mut self) -> EntityId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.alive = true;
            slot.parent = None;
            slot.local = Isometry3::identity();
            slot.writes = 0;
            return EntityId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            alive: true,
            parent: None,
            local: Isometry3::identity(),
            writes: 0,
        });
        EntityId { index, generation: 0 }
    }

    fn despawn(&mut self, entity: EntityId) {
        if let Some(slot) = self.slot_mut(entity) {
            slot.alive = false;
            slot.parent = None;
            self.free.push(entity.index);
        }
    }

    fn is_alive(&self, entity: EntityId) -> bool {
        self.slot(entity).is_some()
    }

    fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) {
        if let Some(slot) = self.slot_mut(child) {
            slot.parent = parent;
        }
    }

    fn set_local_transform(&mut self, entity: EntityId, transform: Isometry3<f32>) {
        if let Some(slot) = self.slot_mut(entity) {
            slot.local = transform;
            slot.writes += 1;
        }
    }
}
