use std::f32::consts::TAU;

use super::entity::{
    BehaviorState, Entity, EntityKind, OrderKind, ENTITY_KIND_COUNT, ORIENTATION_COUNT,
};
use super::geometry::Vec2;

pub const ANIMATION_FRAMES_PER_CYCLE: u32 = 4;
pub const UNIT_SPEED_PX_PER_TICK: f32 = 4.0;

pub type BehaviorFn = fn(&mut Entity);

/// Per-kind behavior table. Each simulation tick calls exactly one entry per active entity.
#[derive(Clone)]
pub struct BehaviorDispatcher {
    table: [BehaviorFn; ENTITY_KIND_COUNT],
}

impl Default for BehaviorDispatcher {
    fn default() -> Self {
        let mut table: [BehaviorFn; ENTITY_KIND_COUNT] =
            [cycle_animation as BehaviorFn; ENTITY_KIND_COUNT];
        table[EntityKind::Unit.index()] = unit_behavior;
        Self { table }
    }
}

impl std::fmt::Debug for BehaviorDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorDispatcher")
            .field("kinds", &ENTITY_KIND_COUNT)
            .finish()
    }
}

impl BehaviorDispatcher {
    pub fn register(&mut self, kind: EntityKind, behavior: BehaviorFn) {
        self.table[kind.index()] = behavior;
    }

    pub fn dispatch(&self, entity: &mut Entity) {
        (self.table[entity.kind.index()])(entity);
    }
}

pub fn cycle_animation(entity: &mut Entity) {
    entity.frame = (entity.frame + 1) % ANIMATION_FRAMES_PER_CYCLE;
}

/// Walks in a straight line toward the head `Move` order and drops it on arrival.
pub fn unit_behavior(entity: &mut Entity) {
    cycle_animation(entity);

    let Some(order) = entity.orders.front().copied() else {
        entity.state = BehaviorState::Idle;
        return;
    };
    if order.kind != OrderKind::Move {
        entity.orders.pop_front();
        entity.state = BehaviorState::Idle;
        return;
    }

    let delta = order.target - entity.position;
    let distance = delta.length();
    if distance <= UNIT_SPEED_PX_PER_TICK {
        entity.position = order.target;
        entity.orders.pop_front();
        entity.state = if entity.orders.is_empty() {
            BehaviorState::Idle
        } else {
            BehaviorState::Moving
        };
        return;
    }

    let step = UNIT_SPEED_PX_PER_TICK / distance;
    entity.position = entity.position + Vec2::new(delta.x * step, delta.y * step);
    entity.facing = facing_for_direction(delta);
    entity.state = BehaviorState::Moving;
}

/// Quantizes a direction into one of the sprite sheet's orientations.
pub fn facing_for_direction(direction: Vec2) -> u8 {
    if direction == Vec2::ZERO {
        return 0;
    }
    let sector = TAU / ORIENTATION_COUNT as f32;
    let angle = direction.y.atan2(direction.x).rem_euclid(TAU);
    ((angle / sector).round() as u32 % ORIENTATION_COUNT as u32) as u8
}
