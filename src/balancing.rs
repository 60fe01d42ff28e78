use rand::Rng;

use crate::sound::{Sound, SoundFlags};
use crate::tetris::{NUM_SPEED_LEVELS, VISIBLE_HEIGHT};

// ============================================================================
// Configuration
// ============================================================================

pub const NUM_BALANCES: usize = 5;

pub const MAX_LEVEL_GOAL_LINES: usize = 2;
pub const MAX_LEVEL_SPEED: usize = 5;
pub const MAX_LEVEL_HIDDEN_LINES: usize = 5;
pub const MAX_LEVEL_DEATH_LINES: usize = 5;
pub const MAX_LEVEL_INVISIBLE_BLOCKS: usize = 3;

/// Frames the radial selector takes to rotate one position.
pub const CHOICE_TRANSITION_FRAMES: i32 = 15;

// ============================================================================
// Categories
// ============================================================================

/// The difficulty categories offered between levels. The discriminant
/// indexes the per-category level arrays.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Category {
    GoalLines = 0,
    Speed = 1,
    HiddenLines = 2,
    DeathLines = 3,
    InvisibleBlocks = 4,
}

impl Category {
    pub const ALL: [Category; NUM_BALANCES] = [
        Category::GoalLines,
        Category::Speed,
        Category::HiddenLines,
        Category::DeathLines,
        Category::InvisibleBlocks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::GoalLines => "Goal lines",
            Category::Speed => "Speed",
            Category::HiddenLines => "Hidden lines",
            Category::DeathLines => "Death lines",
            Category::InvisibleBlocks => "Invisible blocks",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::GoalLines => "More lines required to finish a level",
            Category::Speed => "Blocks fall faster",
            Category::HiddenLines => "The bottom of the well is shrouded",
            Category::DeathLines => "The death zone reaches further down",
            Category::InvisibleBlocks => "The falling block blinks out of sight",
        }
    }
}

// ============================================================================
// Balancing
// ============================================================================

pub struct Balancing {
    pub levels: [usize; NUM_BALANCES],
    pub max_levels: [usize; NUM_BALANCES],
    pub choice: usize,
    pub choice_direction: i32,
    pub choices: Vec<Option<Category>>,
    pub num_choices: usize,
    pub in_transition: bool,
    pub transition_frame: i32,
}

impl Balancing {
    pub fn new(num_choices: usize) -> Self {
        Self {
            levels: [0; NUM_BALANCES],
            max_levels: [
                MAX_LEVEL_GOAL_LINES,
                MAX_LEVEL_SPEED,
                MAX_LEVEL_HIDDEN_LINES,
                MAX_LEVEL_DEATH_LINES,
                MAX_LEVEL_INVISIBLE_BLOCKS,
            ],
            choice: 0,
            choice_direction: 0,
            choices: vec![None; num_choices],
            num_choices: 0,
            in_transition: false,
            transition_frame: 0,
        }
    }

    /// Regenerates the choice slate. Categories below their max are eligible;
    /// categories absent from the previous slate are entered twice so fresh
    /// offers are favored without hard-excluding last round's. Slots are
    /// drawn without replacement and de-duplicated; unfilled slots stay
    /// `None`.
    pub fn get_choice(&mut self) {
        let mut possible: Vec<Category> = Vec::with_capacity(2 * NUM_BALANCES);

        'categories: for cat in Category::ALL {
            if self.levels[cat as usize] < self.max_levels[cat as usize] {
                possible.push(cat);
                for old in &self.choices {
                    if *old == Some(cat) {
                        continue 'categories;
                    }
                }
                possible.push(cat);
            }
        }

        let mut slot = 0;
        while !possible.is_empty() && slot < self.choices.len() {
            let take = rand::thread_rng().gen_range(0..possible.len());
            let picked = possible[take];
            self.choices[slot] = Some(picked);
            possible.retain(|&c| c != picked);
            slot += 1;
        }

        self.num_choices = slot;

        for rest in slot..self.choices.len() {
            self.choices[rest] = None;
        }
    }

    /// Advances the selector one frame. Left/right requests enter a
    /// fixed-length rotation transition; the cursor only moves once the
    /// transition completes, so a held key cannot double-register. Confirm
    /// is honored only while idle and commits the centered choice.
    pub fn update(&mut self, left: bool, right: bool, confirm: bool) -> (bool, SoundFlags) {
        let mut sounds = SoundFlags::default();

        if self.in_transition {
            self.transition_frame += 1;
            if self.transition_frame >= CHOICE_TRANSITION_FRAMES {
                self.in_transition = false;
                self.transition_frame = 0;
                if self.num_choices > 0 {
                    if self.choice_direction < 0 {
                        self.choice = (self.choice + 1) % self.num_choices;
                    } else {
                        self.choice = (self.choice + self.num_choices - 1) % self.num_choices;
                    }
                }
            }
            return (false, sounds);
        }

        if left {
            sounds[Sound::MenuMove] = true;
            self.choice_direction = 1;
            self.in_transition = true;
        }

        if right {
            sounds[Sound::MenuMove] = true;
            self.choice_direction = -1;
            self.in_transition = true;
        }

        if confirm {
            match self.choices.get(self.choice).copied().flatten() {
                Some(cat) => {
                    self.levels[cat as usize] += 1;
                    sounds[Sound::MenuConfirm] = true;
                }
                // Every category maxed out: nothing to commit.
                None => sounds[Sound::MenuNo] = true,
            }
            self.choice = 0;
        }

        (confirm, sounds)
    }

    // ------------------------------------------------------------------------
    // Derived parameters
    // ------------------------------------------------------------------------

    pub fn get_goal_lines(&self) -> u32 {
        const GOAL_LINES: [u32; MAX_LEVEL_GOAL_LINES + 1] = [4, 8, 12];

        let level = self.levels[Category::GoalLines as usize];
        GOAL_LINES[level.min(GOAL_LINES.len() - 1)]
    }

    pub fn get_speed_level(&self, base_speed_level: usize) -> usize {
        const SPEED_STEPS: [usize; MAX_LEVEL_SPEED] = [1, 2, 4, 7, 10];

        let id = self.levels[Category::Speed as usize].min(SPEED_STEPS.len() - 1);
        (base_speed_level + SPEED_STEPS[id]).min(NUM_SPEED_LEVELS - 1)
    }

    pub fn get_hidden_lines(&self) -> usize {
        const HIDDEN_FACTOR: usize = 3;
        const MAX_HIDDEN_LINES: usize = 15;

        (HIDDEN_FACTOR * self.levels[Category::HiddenLines as usize]).min(MAX_HIDDEN_LINES)
    }

    pub fn get_death_lines(&self) -> usize {
        const MAX_DEATH_LINES: usize = 2 * VISIBLE_HEIGHT / 3 - 1;

        (2 * self.levels[Category::DeathLines as usize] + 1).min(MAX_DEATH_LINES)
    }

    pub fn get_invisible_blocks(&self) -> usize {
        self.levels[Category::InvisibleBlocks as usize]
    }
}
