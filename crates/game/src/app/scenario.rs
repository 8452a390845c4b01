use tileclient_engine::{EntityKind, Game, GraphicsBackend, Vec2};
use tracing::{error, info};

const UNIT_COUNT: u32 = 12;
const STRUCTURE_COUNT: u32 = 4;
const CRITTER_COUNT: u32 = 24;
const UNIT_SPACING_PX: f32 = 48.0;
const SCENARIO_SEED: u32 = 0x5eed_1234;

/// Small deterministic generator so every run starts from the same layout.
struct Lcg(u32);

impl Lcg {
    fn next_unit(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 8) as f32 / (1u32 << 24) as f32
    }
}

/// Seeds the opening layout: a block of units near the map center, a few
/// structures around it and critters scattered over the whole map. Stops at
/// the first pool exhaustion. Returns how many entities were spawned.
pub(crate) fn populate<B: GraphicsBackend>(game: &mut Game<B>) -> usize {
    let map_px = game.map().pixel_size();
    let sprite = game.config().sprite_size_px;
    let center = Vec2::new(map_px.x * 0.5, map_px.y * 0.5);
    let mut rng = Lcg(SCENARIO_SEED);

    let mut placements = Vec::new();
    let columns = 4;
    for index in 0..UNIT_COUNT {
        let offset = Vec2::new(
            (index % columns) as f32 * UNIT_SPACING_PX - UNIT_SPACING_PX * 1.5,
            (index / columns) as f32 * UNIT_SPACING_PX - UNIT_SPACING_PX,
        );
        placements.push((EntityKind::Unit, center + offset));
    }
    for index in 0..STRUCTURE_COUNT {
        let angle = index as f32 * std::f32::consts::FRAC_PI_2;
        let ring = Vec2::new(angle.cos() * 320.0, angle.sin() * 240.0);
        placements.push((EntityKind::Structure, center + ring));
    }
    for _ in 0..CRITTER_COUNT {
        let position = Vec2::new(
            rng.next_unit() * (map_px.x - sprite).max(0.0),
            rng.next_unit() * (map_px.y - sprite).max(0.0),
        );
        placements.push((EntityKind::Critter, position));
    }

    let mut spawned = 0;
    for (kind, position) in placements {
        if let Err(error) = game.spawn(kind, position) {
            error!(error = %error, spawned, "scenario_spawn_failed");
            break;
        }
        spawned += 1;
    }

    game.camera_mut().center_on(center);
    info!(spawned, "scenario_populated");
    spawned
}
