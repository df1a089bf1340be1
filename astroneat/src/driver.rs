//! The per-frame driver: walks the population cursor across species and
//! genomes, runs one episode per genome against the game, measures fitness
//! and triggers the generation step when the whole population has played.
//!
//! The game itself lives behind [`GameInterface`]; the driver only ever sees
//! an opaque sensor vector and pushes back a [`ControllerOutput`].

use crate::params::{OUTPUTS, TIMEOUT_CONSTANT};
use crate::populations::Pool;
use crate::rng::PoolRng;
use crate::snapshot::{self, SnapshotError, POOL_FILE, TEMP_FILE};
use crate::BOX_RADIUS;

use std::path::PathBuf;

/// Button state for one frame, in the fixed order
/// `[THRUST, RIGHT, LEFT, SHOOT]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerOutput {
    pub thrust: bool,
    pub right: bool,
    pub left: bool,
    pub shoot: bool,
}

impl ControllerOutput {
    fn from_network(outputs: &[bool]) -> ControllerOutput {
        ControllerOutput {
            thrust: outputs[0],
            right: outputs[1],
            left: outputs[2],
            shoot: outputs[3],
        }
    }

    /// The four buttons in protocol order.
    pub fn as_array(&self) -> [bool; OUTPUTS] {
        [self.thrust, self.right, self.left, self.shoot]
    }
}

/// What the game reports about its player this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    /// Whether the player moved under its own power this frame.
    pub moved: bool,
    /// Frames the player has stayed alive.
    pub ticks: u32,
}

/// The external game the driver plays.
///
/// The sensor vector must have length `board_w_cells * board_h_cells`, one
/// entry per [`BOX_RADIUS`]-sized cell: `+1` when the nearest overlapping
/// entity is allied, `-1` when hostile, `0` for empty. The engine never
/// inspects game state beyond this trait.
pub trait GameInterface {
    /// Tears down and restarts the game for a fresh episode.
    fn restart(&mut self);

    /// Produces the sensor grid for the current frame.
    fn sensors(&self) -> Vec<i32>;

    /// Applies the AI's button state.
    fn set_controls(&mut self, controls: ControllerOutput);

    /// Reports the player, if one is alive.
    fn player(&self) -> Option<PlayerStatus>;

    /// Current score.
    fn score(&self) -> i32;

    /// Rounds won so far this episode.
    fn wins(&self) -> i32;

    /// Lives lost so far this episode.
    fn losses(&self) -> i32;
}

/// Per-frame evolution loop over a [`Pool`] and a game.
pub struct Driver<G> {
    game: G,
    pool: Pool,
    outputs: ControllerOutput,
    timeout: i32,
    frames_survived: i32,
    save_dir: PathBuf,
}

impl<G: GameInterface> Driver<G> {
    /// Seeds a fresh population sized to the game board (in world units)
    /// and starts the first episode. A diagnostic snapshot lands in
    /// `save_dir` right after seeding.
    pub fn new<P: Into<PathBuf>>(
        game: G,
        board_w: u32,
        board_h: u32,
        rng: PoolRng,
        save_dir: P,
    ) -> Driver<G> {
        let cells_w = (board_w / BOX_RADIUS) as usize;
        let cells_h = (board_h / BOX_RADIUS) as usize;
        let mut pool = Pool::new(cells_w, cells_h, rng);
        pool.init();

        let mut driver = Driver {
            game,
            pool,
            outputs: ControllerOutput::default(),
            timeout: 0,
            frames_survived: 0,
            save_dir: save_dir.into(),
        };
        driver.write_snapshot(TEMP_FILE);
        driver.initialize_run();
        driver
    }

    /// Steps the AI one frame. Must be called once per game frame, after
    /// the game has advanced its own state.
    ///
    /// Every fifth frame the network re-evaluates the sensors; in between,
    /// the previous button state holds. When the inactivity timeout
    /// (softened by an age bonus of a quarter of the episode's frames)
    /// expires, the episode ends: fitness is computed, a zero result is
    /// stored as -1 so the genome still counts as measured, and the cursor
    /// moves to the next unmeasured genome, breeding a new generation if
    /// the sweep wrapped.
    pub fn process(&mut self) {
        if self.pool.current_frame % 5 == 0 {
            self.evaluate_current();
        }

        if let Some(player) = self.game.player() {
            if player.moved && player.ticks as i32 > self.frames_survived {
                self.frames_survived = player.ticks as i32;
                self.timeout = TIMEOUT_CONSTANT;
            }
        }

        self.timeout -= 1;

        let timeout_bonus = self.pool.current_frame as i32 / 4;
        if self.timeout + timeout_bonus <= 0 {
            let mut fitness = self.frames_survived - self.pool.current_frame as i32 / 2;
            fitness += self.game.score() + self.game.wins() * 1000;
            fitness -= self.game.losses() * 100;
            if fitness == 0 {
                fitness = -1;
            }
            self.pool.current_mut().fitness = fitness;

            if fitness > self.pool.max_fitness {
                self.pool.max_fitness = fitness;
            }

            self.pool.current_species = 0;
            self.pool.current_genome = 0;
            while self.fitness_already_measured() {
                self.next_genome();
            }
            self.initialize_run();
        }

        self.pool.current_frame += 1;
    }

    /// Feeds the current sensor grid through the current genome's network
    /// and pushes the resulting button state to the game.
    ///
    /// A sensor vector of the wrong arity clears every button. LEFT and
    /// RIGHT are mutually exclusive: when the network asserts both, both
    /// drop.
    pub fn evaluate_current(&mut self) {
        let inputs = self.game.sensors();
        let controller = self.pool.current_mut().evaluate_network(&inputs);

        self.outputs = if controller.len() == OUTPUTS {
            let mut outputs = ControllerOutput::from_network(&controller);
            if outputs.left && outputs.right {
                outputs.left = false;
                outputs.right = false;
            }
            outputs
        } else {
            ControllerOutput::default()
        };

        self.game.set_controls(self.outputs);
    }

    /// Restarts the game and the episode bookkeeping, rebuilds the current
    /// genome's phenotype, and runs an immediate first evaluation.
    fn initialize_run(&mut self) {
        self.game.restart();
        self.frames_survived = 0;
        self.timeout = TIMEOUT_CONSTANT;
        self.pool.current_frame = 0;
        self.outputs = ControllerOutput::default();
        self.game.set_controls(self.outputs);

        let input_size = self.pool.input_size;
        self.pool.current_mut().build_network(input_size);
        self.evaluate_current();
    }

    /// Advances the cursor one genome, wrapping through species and
    /// breeding a new generation when the whole population has played.
    fn next_genome(&mut self) {
        self.pool.current_genome += 1;
        if self.pool.current_genome >= self.pool.species[self.pool.current_species].genomes.len() {
            self.pool.current_genome = 0;
            self.pool.current_species += 1;
            if self.pool.current_species >= self.pool.species.len() {
                self.pool.new_generation();
                self.write_snapshot(&snapshot::backup_file(self.pool.generation));
                self.pool.current_species = 0;
            }
        }
    }

    /// Whether the genome under the cursor already carries a fitness.
    fn fitness_already_measured(&self) -> bool {
        self.pool.current().fitness != 0
    }

    /// Moves the cursor onto the best-measured genome and replays it.
    pub fn play_top(&mut self) {
        let mut best = 0;
        let (mut best_species, mut best_genome) = (0, 0);
        for (s, spec) in self.pool.species.iter().enumerate() {
            for (g, genome) in spec.genomes.iter().enumerate() {
                if genome.fitness > best {
                    best = genome.fitness;
                    best_species = s;
                    best_genome = g;
                }
            }
        }

        self.pool.current_species = best_species;
        self.pool.current_genome = best_genome;
        self.pool.max_fitness = best;
        self.initialize_run();
        self.pool.current_frame += 1;
    }

    /// Writes the canonical save file.
    pub fn save(&self) -> Result<(), SnapshotError> {
        snapshot::write_pool(&self.save_dir.join(POOL_FILE), &self.pool)
    }

    /// Replaces the pool with the canonical save file's contents and
    /// resumes at the first unmeasured genome.
    ///
    /// # Errors
    /// Fails without touching the live pool when the file is missing or
    /// malformed.
    pub fn load(&mut self) -> Result<(), SnapshotError> {
        let document = snapshot::read_pool(&self.save_dir.join(POOL_FILE))?;
        self.pool = document.into_pool(self.pool.board_w, self.pool.board_h)?;

        while self.fitness_already_measured() {
            self.next_genome();
        }
        self.initialize_run();
        self.pool.current_frame += 1;
        Ok(())
    }

    fn write_snapshot(&self, name: &str) {
        let path = self.save_dir.join(name);
        if let Err(e) = snapshot::write_pool(&path, &self.pool) {
            log::error!("failed to write snapshot {}: {}", path.display(), e);
        }
    }

    /// Current generation number.
    pub fn generation(&self) -> u32 {
        self.pool.generation
    }

    /// Best fitness measured so far.
    pub fn max_fitness(&self) -> i32 {
        self.pool.max_fitness
    }

    /// The button state most recently pushed to the game.
    pub fn outputs(&self) -> ControllerOutput {
        self.outputs
    }

    /// Read access to the evolving pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Read access to the game.
    pub fn game(&self) -> &G {
        &self.game
    }

    /// Mutable access to the game, for the host's own frame stepping.
    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::rc::Rc;

    /// A scripted game: static sensors, a configurable score, and a player
    /// that never moves, so every episode times out on schedule.
    struct ScriptedGame {
        input_size: usize,
        score: i32,
        sensor_value: i32,
        wrong_arity: bool,
        restarts: Rc<Cell<u32>>,
        last_controls: Rc<Cell<ControllerOutput>>,
    }

    impl ScriptedGame {
        fn new(input_size: usize, score: i32) -> ScriptedGame {
            ScriptedGame {
                input_size,
                score,
                sensor_value: 0,
                wrong_arity: false,
                restarts: Rc::new(Cell::new(0)),
                last_controls: Rc::new(Cell::new(ControllerOutput::default())),
            }
        }
    }

    impl GameInterface for ScriptedGame {
        fn restart(&mut self) {
            self.restarts.set(self.restarts.get() + 1);
        }

        fn sensors(&self) -> Vec<i32> {
            if self.wrong_arity {
                vec![self.sensor_value; self.input_size + 1]
            } else {
                vec![self.sensor_value; self.input_size]
            }
        }

        fn set_controls(&mut self, controls: ControllerOutput) {
            self.last_controls.set(controls);
        }

        fn player(&self) -> Option<PlayerStatus> {
            Some(PlayerStatus {
                moved: false,
                ticks: 0,
            })
        }

        fn score(&self) -> i32 {
            self.score
        }

        fn wins(&self) -> i32 {
            0
        }

        fn losses(&self) -> i32 {
            0
        }
    }

    fn test_driver(score: i32) -> (Driver<ScriptedGame>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let game = ScriptedGame::new(4, score);
        let driver = Driver::new(game, 200, 200, PoolRng::from_seed(42), dir.path());
        (driver, dir)
    }

    /// With an immobile player the timeout plus age bonus reaches zero on
    /// the 26th frame, so the fitness formula gives
    /// `0 - 25 / 2 + score = score - 12`.
    const FRAMES_PER_EPISODE: u32 = 26;

    #[test]
    fn episode_ends_on_the_scheduled_frame() {
        let (mut driver, _dir) = test_driver(0);
        let restarts = driver.game().restarts.clone();
        let initial_restarts = restarts.get();

        for _ in 0..FRAMES_PER_EPISODE - 1 {
            driver.process();
        }
        assert_eq!(restarts.get(), initial_restarts);

        driver.process();
        assert_eq!(restarts.get(), initial_restarts + 1);
    }

    #[test]
    fn zero_fitness_is_stored_as_minus_one() {
        // score 12 makes the raw fitness exactly 0.
        let (mut driver, _dir) = test_driver(12);

        for _ in 0..FRAMES_PER_EPISODE {
            driver.process();
        }

        assert_eq!(driver.pool().species[0].genomes[0].fitness, -1);
        // -1 is not a record; max_fitness stays untouched.
        assert_eq!(driver.max_fitness(), 0);
    }

    #[test]
    fn positive_fitness_raises_the_record() {
        let (mut driver, _dir) = test_driver(100);

        for _ in 0..FRAMES_PER_EPISODE {
            driver.process();
        }

        assert_eq!(driver.pool().species[0].genomes[0].fitness, 100 - 12);
        assert_eq!(driver.max_fitness(), 100 - 12);
    }

    #[test]
    fn cursor_skips_measured_genomes() {
        let (mut driver, _dir) = test_driver(50);

        for _ in 0..FRAMES_PER_EPISODE {
            driver.process();
        }

        // The first genome is measured; the cursor moved past it onto an
        // unmeasured one.
        assert_ne!(
            (driver.pool().current_species, driver.pool().current_genome),
            (0, 0)
        );
        assert_eq!(driver.pool().current().fitness, 0);
    }

    #[test]
    fn wrong_sensor_arity_clears_all_buttons() {
        let (mut driver, _dir) = test_driver(0);
        driver.game_mut().wrong_arity = true;

        driver.evaluate_current();
        assert_eq!(driver.outputs(), ControllerOutput::default());
    }

    #[test]
    fn left_right_conflict_drops_both() {
        use crate::genomics::Gene;
        use crate::params::MAX_NODES;

        let (mut driver, _dir) = test_driver(0);
        driver.game_mut().sensor_value = 1;

        // Rig the current genome to assert RIGHT, LEFT and SHOOT at once.
        let input_size = driver.pool().input_size;
        let genome = driver.pool.current_mut();
        genome.genes = vec![
            Gene::link(0, MAX_NODES + 1, 2.0, 100),
            Gene::link(0, MAX_NODES + 2, 2.0, 101),
            Gene::link(0, MAX_NODES + 3, 2.0, 102),
        ];
        genome.build_network(input_size);

        driver.evaluate_current();

        let outputs = driver.outputs();
        assert!(!outputs.left && !outputs.right);
        assert!(outputs.shoot);
        assert!(!outputs.thrust);
        assert_eq!(driver.game().last_controls.get(), outputs);
    }

    #[test]
    fn play_top_targets_the_best_genome() {
        let (mut driver, _dir) = test_driver(0);

        driver.pool.species[0].genomes[0].fitness = 5;
        let last_species = driver.pool.species.len() - 1;
        let last_genome = driver.pool.species[last_species].genomes.len() - 1;
        driver.pool.species[last_species].genomes[last_genome].fitness = 90;

        driver.play_top();

        assert_eq!(driver.pool().current_species, last_species);
        assert_eq!(driver.pool().current_genome, last_genome);
        assert_eq!(driver.max_fitness(), 90);
    }

    #[test]
    fn save_and_load_resume_past_measured_genomes() {
        let (mut driver, _dir) = test_driver(50);

        for _ in 0..FRAMES_PER_EPISODE {
            driver.process();
        }
        driver.save().unwrap();

        driver.load().unwrap();
        // Genome (0, 0) carries fitness 38 from before the save, so the
        // resumed cursor sits past it on an unmeasured genome.
        assert_eq!(driver.pool().species[0].genomes[0].fitness, 38);
        assert_ne!(
            (driver.pool().current_species, driver.pool().current_genome),
            (0, 0)
        );
        assert_eq!(driver.pool().current().fitness, 0);
        assert_eq!(driver.pool().current_frame, 1);
    }

    #[test]
    fn failed_load_leaves_the_pool_untouched() {
        let (mut driver, dir) = test_driver(0);

        std::fs::write(dir.path().join(POOL_FILE), "{ not json").unwrap();
        let before_generation = driver.generation();

        assert!(matches!(driver.load(), Err(SnapshotError::Parse(_))));
        assert_eq!(driver.generation(), before_generation);
    }
}
