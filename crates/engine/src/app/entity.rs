use thiserror::Error;
use tracing::error;

use super::behavior::BehaviorDispatcher;
use super::geometry::Vec2;

pub const ORDER_QUEUE_CAPACITY: usize = 10;
pub const ENTITY_KIND_COUNT: usize = 3;
pub const ORIENTATION_COUNT: u8 = 16;

/// Slot index plus the slot's generation at spawn time, so ids of despawned
/// entities never resolve to whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    slot: u32,
    generation: u32,
}

impl EntityId {
    pub fn slot(self) -> usize {
        self.slot as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityKind {
    #[default]
    Unit,
    Structure,
    Critter,
}

impl EntityKind {
    pub const ALL: [EntityKind; ENTITY_KIND_COUNT] =
        [EntityKind::Unit, EntityKind::Structure, EntityKind::Critter];

    pub const fn index(self) -> usize {
        match self {
            EntityKind::Unit => 0,
            EntityKind::Structure => 1,
            EntityKind::Critter => 2,
        }
    }

    pub fn default_hit_points(self) -> i32 {
        match self {
            EntityKind::Unit => 100,
            EntityKind::Structure => 500,
            EntityKind::Critter => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BehaviorState {
    #[default]
    Idle,
    Moving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderKind {
    #[default]
    Hold,
    Move,
    Attack,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Order {
    pub kind: OrderKind,
    pub target: Vec2,
    pub target_entity: Option<EntityId>,
}

impl Order {
    pub fn move_to(target: Vec2) -> Self {
        Self {
            kind: OrderKind::Move,
            target,
            target_entity: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order queue is full ({ORDER_QUEUE_CAPACITY} orders)")]
pub struct OrderQueueFull;

/// Fixed-capacity ring of pending orders. `head < capacity` and `len <= capacity` always hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderQueue {
    orders: [Order; ORDER_QUEUE_CAPACITY],
    head: usize,
    len: usize,
}

impl OrderQueue {
    pub fn push(&mut self, order: Order) -> Result<(), OrderQueueFull> {
        if self.len == ORDER_QUEUE_CAPACITY {
            return Err(OrderQueueFull);
        }
        let index = (self.head + self.len) % ORDER_QUEUE_CAPACITY;
        self.orders[index] = order;
        self.len += 1;
        Ok(())
    }

    pub fn front(&self) -> Option<&Order> {
        (self.len > 0).then(|| &self.orders[self.head])
    }

    pub fn pop_front(&mut self) -> Option<Order> {
        if self.len == 0 {
            return None;
        }
        let order = self.orders[self.head];
        self.head = (self.head + 1) % ORDER_QUEUE_CAPACITY;
        self.len -= 1;
        Some(order)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head_index(&self) -> usize {
        self.head
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    pub kind: EntityKind,
    pub hit_points: i32,
    pub state: BehaviorState,
    pub position: Vec2,
    pub prev_position: Vec2,
    /// One of [`ORIENTATION_COUNT`] directions; 0 faces +x and indices turn clockwise on screen.
    pub facing: u8,
    pub frame: u32,
    pub orders: OrderQueue,
    active: bool,
}

impl Entity {
    fn vacant(slot: u32) -> Self {
        Self {
            id: EntityId { slot, generation: 0 },
            kind: EntityKind::default(),
            hit_points: 0,
            state: BehaviorState::Idle,
            position: Vec2::ZERO,
            prev_position: Vec2::ZERO,
            facing: 0,
            frame: 0,
            orders: OrderQueue::default(),
            active: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Places the entity without leaving an interpolation trail.
    pub fn place_at(&mut self, position: Vec2) {
        self.position = position;
        self.prev_position = position;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EntityPoolError {
    #[error("entity pool exhausted: all {capacity} slots are active")]
    Exhausted { capacity: usize },
}

/// Fixed-size store of every simulated entity.
///
/// Despawning only clears the slot's active flag; the next spawn reuses the
/// first free slot. The pool never grows after construction.
#[derive(Debug, Clone)]
pub struct EntityPool {
    slots: Vec<Entity>,
    active: usize,
}

impl EntityPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity as u32).map(Entity::vacant).collect(),
            active: 0,
        }
    }

    /// Activates a free slot and hands it back reset for the caller to fill in.
    pub fn spawn(&mut self, kind: EntityKind) -> Result<&mut Entity, EntityPoolError> {
        let capacity = self.slots.len();
        let Some(slot) = self.slots.iter_mut().find(|entity| !entity.active) else {
            error!(capacity, "entity_pool_exhausted");
            return Err(EntityPoolError::Exhausted { capacity });
        };
        let generation = slot.id.generation.wrapping_add(1);
        *slot = Entity {
            id: EntityId {
                slot: slot.id.slot,
                generation,
            },
            kind,
            hit_points: kind.default_hit_points(),
            active: true,
            ..Entity::vacant(slot.id.slot)
        };
        self.active += 1;
        Ok(slot)
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        match self.get_mut(id) {
            Some(entity) => {
                entity.active = false;
                entity.orders.clear();
                self.active -= 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id.slot())
            .filter(|entity| entity.active && entity.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.slot())
            .filter(|entity| entity.active && entity.id == id)
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter(|entity| entity.active)
    }

    /// Runs one simulation step: every active slot gets exactly one behavior call.
    /// Returns how many entities were processed.
    pub fn tick(&mut self, dispatcher: &BehaviorDispatcher) -> usize {
        let mut processed = 0;
        for entity in self.slots.iter_mut().filter(|entity| entity.active) {
            entity.prev_position = entity.position;
            dispatcher.dispatch(entity);
            processed += 1;
        }
        processed
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }
}
