use crate::balancing::{Balancing, MAX_LEVEL_INVISIBLE_BLOCKS};
use crate::block::{new_block, Block, BlockKind, BlockSource, RandomBlockSource};
use crate::sound::{Sound, SoundFlags};

// ============================================================================
// Configuration
// ============================================================================

pub const GRID_WIDTH: usize = 10;
pub const VISIBLE_HEIGHT: usize = 20;
pub const INVISIBLE_ROWS: usize = 4;
pub const TOTAL_HEIGHT: usize = VISIBLE_HEIGHT + INVISIBLE_ROWS;

/// Auto-descent period in frames, one entry per speed tier.
pub const SPEEDS: [i32; 16] = [60, 52, 46, 40, 34, 28, 24, 20, 16, 12, 10, 8, 6, 5, 4, 3];
pub const NUM_SPEED_LEVELS: usize = SPEEDS.len();

// Timing (in frames)
const MANUAL_DOWN_FRAMES: i32 = 4;
const LR_REPEAT_FRAMES: i32 = 6;
const LR_FIRST_MOVE_FRAMES: i32 = 15;
const REMOVE_ANIMATION_STEP_FRAMES: i32 = 8;
const DEATH_ANIMATION_FRAMES: i32 = 90;
pub const INVISIBLE_CYCLE_FRAMES: i32 = 30;

// Scoring
pub const SCORE_SINGLE: u32 = 40;
pub const SCORE_DOUBLE: u32 = 100;
pub const SCORE_TRIPLE: u32 = 300;
pub const SCORE_TETRIS: u32 = 1200;

/// Style rendered for rows mid-removal on odd animation steps.
pub const BREAK_STYLE: u8 = 8;

// ============================================================================
// Types
// ============================================================================

pub type Line = [u8; GRID_WIDTH];
pub type Grid = [Line; TOTAL_HEIGHT];

/// One tick worth of player intent. Movement and soft-drop are
/// level-triggered ("is pressed"); hold and the rotations are edge-triggered
/// ("was just pressed") and must be debounced by the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PlayerInput {
    pub move_down: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub hold: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
}

/// Run-level knobs handed to the engine at every level init.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Upgrades {
    pub better_rotation: bool,
    pub can_hold: bool,
}

impl Default for Upgrades {
    fn default() -> Self {
        Self {
            better_rotation: true,
            can_hold: true,
        }
    }
}

// ============================================================================
// Tetris Engine
// ============================================================================

/// One frame-stepped play session. Everything is a plain counter compared
/// against a limit each tick; multi-tick animations are explicit state.
pub struct Tetris {
    pub area: Grid,
    pub current_block: Block,
    pub next_block: Block,
    pub held_block: Option<Block>,
    pub auto_down_frame: i32,
    pub auto_down_frame_limit: i32,
    pub manual_down_frame: i32,
    pub manual_down_frame_limit: i32,
    pub lr_move_frame: i32,
    pub lr_move_frame_limit: i32,
    pub lr_first_move_frame: i32,
    pub lr_first_move_frame_limit: i32,
    pub manual_move_allowed: bool,
    pub num_lines: u32,
    pub drop_length: u32,
    pub death_lines: usize,
    pub hidden_lines: usize,
    // line removal and its animation
    pub to_check: [i16; 2],
    pub to_remove: [bool; 4],
    pub to_remove_num: usize,
    pub first_available: i16,
    pub remove_line_animation_frame: i32,
    pub remove_line_animation_step: i32,
    pub remove_line_animation_step_frames: i32,
    pub in_animation: bool,
    // invisible block cycling
    pub invisible_level: i32,
    pub invisible_step: i32,
    pub invisible_frame: i32,
    pub score: u32,
    // upgrades and lives
    pub better_rotation: bool,
    pub can_hold: bool,
    pub life: i32,
    pub current_life: i32,
    pub dead: bool,
    pub death_animation_frame: i32,
    source: Box<dyn BlockSource>,
}

impl Tetris {
    pub fn new() -> Self {
        Self::with_source(Box::new(RandomBlockSource))
    }

    pub fn with_source(source: Box<dyn BlockSource>) -> Self {
        Self {
            area: [[0; GRID_WIDTH]; TOTAL_HEIGHT],
            current_block: Block::new(BlockKind::I),
            next_block: Block::new(BlockKind::I),
            held_block: None,
            auto_down_frame: 0,
            auto_down_frame_limit: SPEEDS[0],
            manual_down_frame: 0,
            manual_down_frame_limit: MANUAL_DOWN_FRAMES,
            lr_move_frame: 0,
            lr_move_frame_limit: LR_REPEAT_FRAMES,
            lr_first_move_frame: 0,
            lr_first_move_frame_limit: LR_FIRST_MOVE_FRAMES,
            manual_move_allowed: true,
            num_lines: 0,
            drop_length: 0,
            death_lines: 0,
            hidden_lines: 0,
            to_check: [0, 0],
            to_remove: [false; 4],
            to_remove_num: 0,
            first_available: 0,
            remove_line_animation_frame: 0,
            remove_line_animation_step: 0,
            remove_line_animation_step_frames: REMOVE_ANIMATION_STEP_FRAMES,
            in_animation: false,
            invisible_level: 0,
            invisible_step: MAX_LEVEL_INVISIBLE_BLOCKS as i32,
            invisible_frame: 0,
            score: 0,
            better_rotation: false,
            can_hold: false,
            life: 0,
            current_life: 0,
            dead: false,
            death_animation_frame: 0,
            source,
        }
    }

    /// (Re)initializes the session for a level. Level 0 starts from a fresh
    /// grid and draws the initial block pair; later levels keep the grid,
    /// blocks and held slot from the previous level and only recompute the
    /// timer limits and per-level state from the balance.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        level: u32,
        balance: &Balancing,
        speed_level: usize,
        score: u32,
        upgrades: Upgrades,
        life: i32,
        current_life: i32,
    ) {
        if level == 0 {
            self.area = [[0; GRID_WIDTH]; TOTAL_HEIGHT];
            self.current_block = new_block(None, None, self.source.as_mut());
            self.current_block.set_initial_position();
            self.next_block = new_block(None, None, self.source.as_mut());
            self.held_block = None;
        }
        self.auto_down_frame = 0;
        self.auto_down_frame_limit = SPEEDS[balance.get_speed_level(speed_level)];
        self.manual_down_frame = 0;
        self.manual_down_frame_limit = MANUAL_DOWN_FRAMES;
        self.lr_move_frame = 0;
        self.lr_move_frame_limit = LR_REPEAT_FRAMES;
        self.lr_first_move_frame = 0;
        self.lr_first_move_frame_limit = LR_FIRST_MOVE_FRAMES;
        self.manual_move_allowed = true;
        self.num_lines = 0;
        self.drop_length = 0;
        self.death_lines = balance.get_death_lines();
        self.hidden_lines = balance.get_hidden_lines();
        self.to_check = [0, 0];
        self.to_remove = [false; 4];
        self.to_remove_num = 0;
        self.remove_line_animation_frame = 0;
        self.remove_line_animation_step = 0;
        self.remove_line_animation_step_frames = REMOVE_ANIMATION_STEP_FRAMES;
        self.invisible_frame = 0;
        self.invisible_step = MAX_LEVEL_INVISIBLE_BLOCKS as i32;
        self.invisible_level = balance.get_invisible_blocks() as i32;
        self.score = score;

        self.better_rotation = upgrades.better_rotation;
        self.can_hold = upgrades.can_hold;
        self.life = life;
        self.current_life = current_life;
        self.dead = false;
        self.death_animation_frame = 0;

        self.in_animation = false;
    }

    /// Advances the session one frame. Returns whether the session is over
    /// (death animation finished) and the sound flags raised this tick.
    pub fn update(&mut self, input: PlayerInput, level: u32) -> (bool, SoundFlags) {
        let mut sounds = SoundFlags::default();

        if self.dead {
            sounds[Sound::Death] = self.death_animation_frame == 0;
            self.death_animation_frame += 1;
            if self.death_animation_frame >= DEATH_ANIMATION_FRAMES {
                self.in_animation = false;
            }
            return (self.session_over(), sounds);
        }

        if self.remove_line_animation_step > 0 {
            self.remove_line_animation_frame += 1;
            if self.remove_line_animation_frame >= self.remove_line_animation_step_frames {
                self.remove_line_animation_step += 1;
                self.remove_line_animation_frame = 0;
            }

            // Scoring happens exactly once, on step 4's first sub-frame.
            if self.remove_line_animation_step == 4 && self.remove_line_animation_frame <= 0 {
                let gain = match self.to_remove_num {
                    1 => SCORE_SINGLE,
                    2 => SCORE_DOUBLE,
                    3 => SCORE_TRIPLE,
                    4 => SCORE_TETRIS,
                    _ => 0,
                };
                self.score += gain * (level + 1);
                self.num_lines += self.to_remove_num as u32;
            }

            if self.remove_line_animation_step < 8 {
                return (self.session_over(), sounds);
            }

            self.remove_line_animation_step = 0;

            sounds[Sound::LinesFalling] = true;
            self.remove_lines();

            self.to_remove = [false; 4];
            self.to_remove_num = 0;
            self.to_check = [0, 0];
            self.in_animation = false;

            self.set_up_next();

            return (self.session_over(), sounds);
        }

        if self.can_hold && input.hold {
            self.try_hold();
        }

        self.invisible_frame += 1;
        if self.invisible_frame >= INVISIBLE_CYCLE_FRAMES {
            self.invisible_step -= 1;
            self.invisible_frame = 0;
            if self.invisible_step <= 0 {
                self.invisible_step = MAX_LEVEL_INVISIBLE_BLOCKS as i32;
            }
        }

        let mut effective_rotation = false;

        if input.rotate_left && !input.rotate_right {
            effective_rotation = self.try_rotate(false);
        }

        if input.rotate_right && !input.rotate_left {
            effective_rotation = self.try_rotate(true);
        }

        sounds[Sound::Rotation] = effective_rotation;
        if effective_rotation && self.better_rotation {
            // lock-delay refresh
            self.auto_down_frame = 0;
        }

        let mut may_allow_manual_moves = false;

        // lateral movement, gated by a first-move delay and a repeat interval
        let mut x_move: i16 = 0;
        if input.move_left {
            x_move -= 1;
        }
        if input.move_right {
            x_move += 1;
        }

        if !input.move_left && !input.move_right {
            may_allow_manual_moves = true;
            self.lr_move_frame = 0;
            self.lr_first_move_frame = 0;
        }

        if !self.manual_move_allowed {
            x_move = 0;
        }

        if x_move != 0 {
            if self.lr_move_frame > 0
                || (self.lr_first_move_frame > 0
                    && self.lr_first_move_frame < self.lr_first_move_frame_limit)
            {
                x_move = 0;
            }
            self.lr_move_frame += 1;
            if self.lr_move_frame >= self.lr_move_frame_limit {
                self.lr_move_frame = 0;
            }
            if self.lr_first_move_frame < self.lr_first_move_frame_limit {
                self.lr_first_move_frame += 1;
            }
        }

        // automatic descent
        let mut auto_down = false;
        self.auto_down_frame += 1;
        if self.auto_down_frame >= self.auto_down_frame_limit {
            auto_down = true;
            self.auto_down_frame = 0;
        }

        // manual descent: fires on press, then repeats while held
        let mut manual_down = false;

        if !input.move_down {
            self.manual_down_frame = 0;
            self.manual_move_allowed = self.manual_move_allowed || may_allow_manual_moves;
            self.drop_length = 0;
        }

        if input.move_down && self.manual_move_allowed {
            manual_down = self.manual_down_frame == 0;
            self.manual_down_frame += 1;
            if self.manual_down_frame >= self.manual_down_frame_limit {
                self.manual_down_frame = 0;
            }
        }

        if manual_down {
            self.drop_length += 1;
        }

        let (stuck, lateral) = self.update_position(x_move, auto_down || manual_down);
        sounds[Sound::LateralMove] = lateral;

        if stuck {
            sounds[Sound::TouchGround] = true;

            self.write_in_grid();

            self.score += self.drop_length;

            let (num, first, flags) = self.check_lines();
            self.to_remove_num = num;
            self.first_available = first;
            self.to_remove = flags;

            if self.to_remove_num > 0 {
                self.remove_line_animation_step = 1;
                self.in_animation = true;
                sounds[Sound::LinesVanishing] = true;
                return (self.session_over(), sounds);
            }

            self.set_up_next();
        }

        (self.session_over(), sounds)
    }

    fn session_over(&self) -> bool {
        self.dead && !self.in_animation
    }

    // ------------------------------------------------------------------------
    // Movement & collision
    // ------------------------------------------------------------------------

    /// Whether a block of `kind` at `(x, y)` in the given rotation overlaps
    /// nothing and stays inside the grid.
    pub fn block_fits(&self, kind: BlockKind, rotation: usize, x: i16, y: i16) -> bool {
        kind.offsets()[rotation % 4].iter().all(|&(dx, dy)| {
            let cx = x + dx;
            let cy = y + dy;
            (0..GRID_WIDTH as i16).contains(&cx)
                && (0..TOTAL_HEIGHT as i16).contains(&cy)
                && self.area[cy as usize][cx as usize] == 0
        })
    }

    fn try_rotate(&mut self, clockwise: bool) -> bool {
        let block = self.current_block;
        let rotation = if clockwise {
            (block.rotation + 1) % 4
        } else {
            (block.rotation + 3) % 4
        };
        if self.block_fits(block.kind, rotation, block.x, block.y) {
            self.current_block.rotation = rotation;
            true
        } else {
            false
        }
    }

    /// Applies the resolved lateral/vertical deltas for this tick. Returns
    /// (stuck, lateral_moved); stuck means the descent was blocked and the
    /// block must lock.
    fn update_position(&mut self, x_move: i16, descend: bool) -> (bool, bool) {
        let block = self.current_block;

        let mut lateral = false;
        if x_move != 0 && self.block_fits(block.kind, block.rotation, block.x + x_move, block.y) {
            self.current_block.x += x_move;
            lateral = true;
        }

        let mut stuck = false;
        if descend {
            let block = self.current_block;
            if self.block_fits(block.kind, block.rotation, block.x, block.y + 1) {
                self.current_block.y += 1;
            } else {
                stuck = true;
            }
        }

        (stuck, lateral)
    }

    /// Swaps the current and held blocks if the incoming block is a legal
    /// placement at the current position; an empty held slot promotes the
    /// next block instead. An illegal swap is silently declined.
    fn try_hold(&mut self) {
        let current = self.current_block;
        let incoming = self.held_block.unwrap_or(self.next_block);
        if !self.block_fits(incoming.kind, incoming.rotation, current.x, current.y) {
            return;
        }

        match self.held_block {
            Some(held) => self.current_block = held,
            None => {
                self.current_block = self.next_block;
                self.next_block = new_block(
                    Some(current.kind),
                    Some(self.current_block.kind),
                    self.source.as_mut(),
                );
            }
        }
        self.current_block.x = current.x;
        self.current_block.y = current.y;
        self.held_block = Some(Block { x: 0, y: 0, ..current });
    }

    // ------------------------------------------------------------------------
    // Locking & line removal
    // ------------------------------------------------------------------------

    /// Writes the current block into the grid and records its occupied row
    /// range as the range to check for completed lines.
    fn write_in_grid(&mut self) {
        let block = self.current_block;
        let style = block.kind.style();
        let mut lo = TOTAL_HEIGHT as i16;
        let mut hi = 0;
        for (dx, dy) in block.cells() {
            let x = block.x + dx;
            let y = block.y + dy;
            self.area[y as usize][x as usize] = style;
            lo = lo.min(y);
            hi = hi.max(y);
        }
        self.to_check = [lo, hi];
    }

    /// Scans exactly the checked row range (at most 4 rows). A row is
    /// complete iff every cell is non-empty. The returned `first_available`
    /// is the bottom-most incomplete row in the range, used as the donor
    /// pointer for compaction, or one above the range if all rows complete.
    pub fn check_lines(&self) -> (usize, i16, [bool; 4]) {
        let mut to_remove = [false; 4];
        let mut to_remove_num = 0;
        let mut first_available = self.to_check[0] - 1;

        for (count, l) in (self.to_check[0]..=self.to_check[1]).enumerate() {
            if self.area[l as usize].iter().any(|&cell| cell == 0) {
                first_available = l;
                continue;
            }
            to_remove[count] = true;
            to_remove_num += 1;
        }

        (to_remove_num, first_available, to_remove)
    }

    /// Compacts the grid from the bottom of the checked range upward,
    /// copying from the nearest non-removed donor row and zero-filling once
    /// no donors remain. Rows below the checked range are never touched.
    pub fn remove_lines(&mut self) {
        let lo = self.to_check[0];
        let hi = self.to_check[1];
        let mut available = self.first_available;

        // inside the removal zone, skipping rows flagged for removal
        for y in (lo..=hi).rev() {
            if available >= 0 {
                self.area[y as usize] = self.area[available as usize];
                available -= 1;
                while available >= lo && self.to_remove[(available - lo) as usize] {
                    available -= 1;
                }
            } else {
                self.area[y as usize] = [0; GRID_WIDTH];
            }
        }

        // above the removal zone
        for y in (0..lo).rev() {
            if available >= 0 {
                self.area[y as usize] = self.area[available as usize];
                available -= 1;
            } else {
                self.area[y as usize] = [0; GRID_WIDTH];
            }
        }

        self.first_available = available;
    }

    // ------------------------------------------------------------------------
    // Death & spawning
    // ------------------------------------------------------------------------

    /// Counts current violations of the death zone (the invisible rows plus
    /// the death lines below them). `current_life` is rebuilt from `life` on
    /// every check; it measures the present overflow, not accumulated
    /// damage.
    pub fn lost(&mut self) {
        self.current_life = self.life;
        let rows = INVISIBLE_ROWS + self.death_lines;
        for y in 0..rows {
            for x in 0..GRID_WIDTH {
                if self.area[y][x] != 0 {
                    self.current_life -= 1;
                    if self.current_life < 0 {
                        self.dead = true;
                        return;
                    }
                }
            }
        }
    }

    fn set_up_next(&mut self) {
        self.lost();

        if self.dead {
            self.in_animation = true;
            return;
        }

        let future = new_block(
            Some(self.current_block.kind),
            Some(self.next_block.kind),
            self.source.as_mut(),
        );
        self.current_block = self.next_block;
        self.current_block.set_initial_position();
        self.next_block = future;

        self.manual_move_allowed = false;

        self.invisible_frame = 0;
        self.invisible_step = MAX_LEVEL_INVISIBLE_BLOCKS as i32;
    }

    // ------------------------------------------------------------------------
    // Presentation helpers
    // ------------------------------------------------------------------------

    /// Whether the active block should currently be drawn: never during a
    /// clear animation, and hidden while the invisible band covers it unless
    /// it is still inside the invisible spawn rows.
    pub fn current_block_visible(&self) -> bool {
        self.remove_line_animation_step == 0
            && (self.invisible_step > self.invisible_level
                || self.current_block.y < INVISIBLE_ROWS as i16)
    }

    /// Style to draw for a locked cell, accounting for the removal
    /// animation: rows flagged for removal show the break style on odd
    /// steps and disappear entirely on step 7. Returns 0 for nothing.
    pub fn cell_style(&self, x: usize, y: usize) -> u8 {
        let style = self.area[y][x];
        if style == 0 {
            return 0;
        }
        if self.remove_line_animation_step % 2 == 1 {
            let y = y as i16;
            if y >= self.to_check[0]
                && y <= self.to_check[1]
                && self.to_remove[(y - self.to_check[0]) as usize]
            {
                if self.remove_line_animation_step == 7 {
                    return 0;
                }
                return BREAK_STYLE;
            }
        }
        style
    }

    /// Count total filled cells in the grid.
    pub fn total_filled_cells(&self) -> usize {
        self.area.iter().flatten().filter(|&&cell| cell != 0).count()
    }
}

impl Default for Tetris {
    fn default() -> Self {
        Self::new()
    }
}
