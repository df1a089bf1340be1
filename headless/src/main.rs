//! Headless training arena: a tiny deterministic asteroids field driven by
//! the NEAT engine, with no rendering. Prints a summary line per generation.

use astroneat::{ControllerOutput, Driver, GameInterface, PlayerStatus, PoolRng, BOX_RADIUS};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BOARD_W: u32 = 800;
const BOARD_H: u32 = 800;
const GENERATIONS: u32 = 20;
const MAX_FRAMES: u64 = 50_000_000;
const ROCK_COUNT: usize = 6;
const BULLET_RANGE: f32 = 300.0;
const PLAYER_RADIUS: f32 = 12.0;
const ROCK_RADIUS: f32 = 40.0;

struct Rock {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
}

struct Bullet {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    travelled: f32,
}

struct Arena {
    rng: ChaCha8Rng,
    rocks: Vec<Rock>,
    bullets: Vec<Bullet>,
    player_x: f32,
    player_y: f32,
    player_vx: f32,
    player_vy: f32,
    player_angle: f32,
    player_ticks: u32,
    player_moved: bool,
    controls: ControllerOutput,
    shoot_cooldown: u32,
    score: i32,
    wins: i32,
    losses: i32,
}

impl Arena {
    fn new(seed: u64) -> Arena {
        let mut arena = Arena {
            rng: ChaCha8Rng::seed_from_u64(seed),
            rocks: Vec::new(),
            bullets: Vec::new(),
            player_x: 0.0,
            player_y: 0.0,
            player_vx: 0.0,
            player_vy: 0.0,
            player_angle: 0.0,
            player_ticks: 0,
            player_moved: false,
            controls: ControllerOutput::default(),
            shoot_cooldown: 0,
            score: 0,
            wins: 0,
            losses: 0,
        };
        arena.spawn_rocks();
        arena
    }

    fn spawn_rocks(&mut self) {
        let half_w = BOARD_W as f32 / 2.0;
        let half_h = BOARD_H as f32 / 2.0;
        self.rocks.clear();
        for _ in 0..ROCK_COUNT {
            // Keep spawns off the player's start position.
            let x = self.rng.gen_range(-half_w..half_w);
            let y = self.rng.gen_range(half_h * 0.25..half_h);
            let speed = self.rng.gen_range(0.5..2.0);
            let direction = self.rng.gen_range(0.0..std::f32::consts::TAU);
            self.rocks.push(Rock {
                x,
                y,
                vx: speed * direction.cos(),
                vy: speed * direction.sin(),
            });
        }
    }

    fn wrap(value: f32, half: f32) -> f32 {
        if value > half {
            value - half * 2.0
        } else if value < -half {
            value + half * 2.0
        } else {
            value
        }
    }

    /// Advances the world one frame under the current controls.
    fn step(&mut self) {
        let half_w = BOARD_W as f32 / 2.0;
        let half_h = BOARD_H as f32 / 2.0;

        self.player_moved = false;
        if self.controls.left {
            self.player_angle -= 0.1;
            self.player_moved = true;
        }
        if self.controls.right {
            self.player_angle += 0.1;
            self.player_moved = true;
        }
        if self.controls.thrust {
            self.player_vx += 0.15 * self.player_angle.cos();
            self.player_vy += 0.15 * self.player_angle.sin();
            self.player_moved = true;
        }
        self.player_vx *= 0.99;
        self.player_vy *= 0.99;
        self.player_x = Self::wrap(self.player_x + self.player_vx, half_w);
        self.player_y = Self::wrap(self.player_y + self.player_vy, half_h);
        self.player_ticks += 1;

        if self.shoot_cooldown > 0 {
            self.shoot_cooldown -= 1;
        }
        if self.controls.shoot && self.shoot_cooldown == 0 {
            self.bullets.push(Bullet {
                x: self.player_x,
                y: self.player_y,
                vx: 6.0 * self.player_angle.cos(),
                vy: 6.0 * self.player_angle.sin(),
                travelled: 0.0,
            });
            self.shoot_cooldown = 10;
        }

        for rock in &mut self.rocks {
            rock.x = Self::wrap(rock.x + rock.vx, half_w);
            rock.y = Self::wrap(rock.y + rock.vy, half_h);
        }

        for bullet in &mut self.bullets {
            bullet.x = Self::wrap(bullet.x + bullet.vx, half_w);
            bullet.y = Self::wrap(bullet.y + bullet.vy, half_h);
            bullet.travelled += 6.0;
        }
        self.bullets.retain(|b| b.travelled < BULLET_RANGE);

        // Bullets vs rocks.
        let mut destroyed: Vec<usize> = Vec::new();
        for (i, rock) in self.rocks.iter().enumerate() {
            let hit = self.bullets.iter().any(|b| {
                let dx = b.x - rock.x;
                let dy = b.y - rock.y;
                (dx * dx + dy * dy).sqrt() < ROCK_RADIUS
            });
            if hit {
                destroyed.push(i);
            }
        }
        for &i in destroyed.iter().rev() {
            self.rocks.remove(i);
            self.score += 10;
        }
        if self.rocks.is_empty() {
            self.wins += 1;
            self.spawn_rocks();
        }

        // Rocks vs player.
        let crashed = self.rocks.iter().any(|rock| {
            let dx = rock.x - self.player_x;
            let dy = rock.y - self.player_y;
            (dx * dx + dy * dy).sqrt() < ROCK_RADIUS + PLAYER_RADIUS
        });
        if crashed {
            self.losses += 1;
            self.player_x = 0.0;
            self.player_y = 0.0;
            self.player_vx = 0.0;
            self.player_vy = 0.0;
            self.player_ticks = 0;
        }
    }
}

impl GameInterface for Arena {
    fn restart(&mut self) {
        self.bullets.clear();
        self.player_x = 0.0;
        self.player_y = 0.0;
        self.player_vx = 0.0;
        self.player_vy = 0.0;
        self.player_angle = 0.0;
        self.player_ticks = 0;
        self.player_moved = false;
        self.controls = ControllerOutput::default();
        self.shoot_cooldown = 0;
        self.score = 0;
        self.wins = 0;
        self.losses = 0;
        self.spawn_rocks();
    }

    fn sensors(&self) -> Vec<i32> {
        let cells_w = (BOARD_W / BOX_RADIUS) as i32;
        let cells_h = (BOARD_H / BOX_RADIUS) as i32;
        let radius = BOX_RADIUS as f32;
        let mut inputs = Vec::with_capacity((cells_w * cells_h) as usize);

        for cy in 0..cells_h {
            for cx in 0..cells_w {
                let dx = (cx - cells_w / 2) as f32 * radius;
                let dy = (cy - cells_h / 2) as f32 * radius;
                let mut cell = 0;
                for rock in &self.rocks {
                    if ((rock.x - dx).abs() - ROCK_RADIUS) <= 8.0
                        && ((rock.y - dy).abs() - ROCK_RADIUS) <= 8.0
                    {
                        cell = -1;
                    }
                }
                if ((self.player_x - dx).abs() - PLAYER_RADIUS) <= 8.0
                    && ((self.player_y - dy).abs() - PLAYER_RADIUS) <= 8.0
                {
                    cell = 1;
                }
                inputs.push(cell);
            }
        }

        inputs
    }

    fn set_controls(&mut self, controls: ControllerOutput) {
        self.controls = controls;
    }

    fn player(&self) -> Option<PlayerStatus> {
        Some(PlayerStatus {
            moved: self.player_moved,
            ticks: self.player_ticks,
        })
    }

    fn score(&self) -> i32 {
        self.score
    }

    fn wins(&self) -> i32 {
        self.wins
    }

    fn losses(&self) -> i32 {
        self.losses
    }
}

fn main() {
    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(42u64);

    let arena = Arena::new(seed);
    let mut driver = Driver::new(arena, BOARD_W, BOARD_H, PoolRng::from_seed(seed), ".");

    println!("training on a {}x{} board, seed {}", BOARD_W, BOARD_H, seed);

    let mut generation = driver.generation();
    let mut frames = 0u64;
    while driver.generation() < GENERATIONS && frames < MAX_FRAMES {
        driver.game_mut().step();
        driver.process();
        frames += 1;

        if driver.generation() != generation {
            generation = driver.generation();
            println!(
                "generation {:>3}: {:>3} species, max fitness {}",
                generation,
                driver.pool().species.len(),
                driver.max_fitness()
            );
        }
    }

    if let Err(e) = driver.save() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    println!("saved final population to pool.json");

    driver.play_top();
    println!("replaying champion (fitness {})", driver.max_fitness());
    for _ in 0..1000 {
        driver.game_mut().step();
        driver.process();
    }
}
