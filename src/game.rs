use crate::balancing::Balancing;
use crate::block::{BlockSource, RandomBlockSource};
use crate::sound::{Sound, SoundFlags};
use crate::tetris::{PlayerInput, Tetris, Upgrades};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GameConfig {
    /// Slots on the between-level choice screen.
    pub num_choices: usize,
    pub upgrades: Upgrades,
    /// Cells tolerated inside the death zone before the session dies.
    pub life: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_choices: 3,
            upgrades: Upgrades::default(),
            life: 2,
        }
    }
}

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    Title,
    Play,
    Balance,
    Lost,
}

/// One tick worth of sampled input for whichever stage is active.
/// `menu_left`/`menu_right`/`confirm` are edge-triggered.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct InputState {
    pub player: PlayerInput,
    pub menu_left: bool,
    pub menu_right: bool,
    pub confirm: bool,
}

// ============================================================================
// Game
// ============================================================================

/// The outer per-tick driver: dispatches input to whichever component is
/// active and carries level progression between them.
pub struct Game {
    pub stage: Stage,
    pub play: Tetris,
    pub balance: Balancing,
    pub level: u32,
    pub config: GameConfig,
}

impl Game {
    pub fn new() -> Self {
        Self::with_source(GameConfig::default(), Box::new(RandomBlockSource))
    }

    pub fn with_source(config: GameConfig, source: Box<dyn BlockSource>) -> Self {
        Self {
            stage: Stage::Title,
            play: Tetris::with_source(source),
            balance: Balancing::new(config.num_choices),
            level: 0,
            config,
        }
    }

    /// Advances the whole game one frame and returns the sound flags raised
    /// by whichever component ran.
    pub fn update(&mut self, input: &InputState) -> SoundFlags {
        let mut sounds = SoundFlags::default();

        match self.stage {
            Stage::Title => {
                if input.confirm {
                    sounds[Sound::MenuConfirm] = true;
                    self.start_run();
                }
            }
            Stage::Play => {
                let (session_over, play_sounds) = self.play.update(input.player, self.level);
                sounds = play_sounds;

                if session_over {
                    self.stage = Stage::Lost;
                }
                // The goal check runs after the death check and wins if both
                // trigger on the same tick: a killing clear that reaches the
                // goal still completes the level.
                if self.play.num_lines >= self.balance.get_goal_lines() {
                    self.stage = Stage::Balance;
                    self.level += 1;
                    self.balance.get_choice();
                }
            }
            Stage::Balance => {
                let (end, balance_sounds) =
                    self.balance
                        .update(input.menu_left, input.menu_right, input.confirm);
                sounds = balance_sounds;

                if end {
                    self.stage = Stage::Play;
                    self.play.init(
                        self.level,
                        &self.balance,
                        self.level as usize,
                        self.play.score,
                        self.config.upgrades,
                        self.config.life,
                        self.play.current_life,
                    );
                }
            }
            Stage::Lost => {
                if input.confirm {
                    self.stage = Stage::Title;
                    self.level = 0;
                }
            }
        }

        sounds
    }

    fn start_run(&mut self) {
        self.stage = Stage::Play;
        self.level = 0;
        self.balance = Balancing::new(self.config.num_choices);
        self.play.init(
            0,
            &self.balance,
            0,
            0,
            self.config.upgrades,
            self.config.life,
            self.config.life,
        );
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
