use rand::Rng;

use crate::tetris::GRID_WIDTH;

// ============================================================================
// Block Kinds
// ============================================================================

/// The seven canonical tetromino shapes. The discriminant doubles as the
/// numeric id used by the spawn anti-repetition test.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockKind {
    I = 0,
    O = 1,
    J = 2,
    L = 3,
    S = 4,
    T = 5,
    Z = 6,
}

impl BlockKind {
    pub const ALL: [BlockKind; 7] = [
        BlockKind::I,
        BlockKind::O,
        BlockKind::J,
        BlockKind::L,
        BlockKind::S,
        BlockKind::T,
        BlockKind::Z,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Cell style written into the grid when a block of this kind locks.
    /// Style 0 is reserved for empty cells.
    pub fn style(self) -> u8 {
        self as u8 + 1
    }

    /// Occupied cell offsets for each of the four rotation states, anchored
    /// at the block position. All offsets stay inside a 4x4 box.
    pub fn offsets(self) -> [[(i16, i16); 4]; 4] {
        match self {
            BlockKind::I => [
                [(0, 0), (1, 0), (2, 0), (3, 0)],
                [(0, 0), (0, 1), (0, 2), (0, 3)],
                [(0, 0), (1, 0), (2, 0), (3, 0)],
                [(0, 0), (0, 1), (0, 2), (0, 3)],
            ],
            BlockKind::O => [
                [(0, 0), (1, 0), (0, 1), (1, 1)],
                [(0, 0), (1, 0), (0, 1), (1, 1)],
                [(0, 0), (1, 0), (0, 1), (1, 1)],
                [(0, 0), (1, 0), (0, 1), (1, 1)],
            ],
            BlockKind::J => [
                [(0, 0), (0, 1), (1, 1), (2, 1)],
                [(0, 0), (1, 0), (0, 1), (0, 2)],
                [(0, 0), (1, 0), (2, 0), (2, 1)],
                [(1, 0), (1, 1), (0, 2), (1, 2)],
            ],
            BlockKind::L => [
                [(2, 0), (0, 1), (1, 1), (2, 1)],
                [(0, 0), (0, 1), (0, 2), (1, 2)],
                [(0, 0), (1, 0), (2, 0), (0, 1)],
                [(0, 0), (1, 0), (1, 1), (1, 2)],
            ],
            BlockKind::S => [
                [(1, 0), (2, 0), (0, 1), (1, 1)],
                [(0, 0), (0, 1), (1, 1), (1, 2)],
                [(1, 0), (2, 0), (0, 1), (1, 1)],
                [(0, 0), (0, 1), (1, 1), (1, 2)],
            ],
            BlockKind::T => [
                [(1, 0), (0, 1), (1, 1), (2, 1)],
                [(0, 0), (0, 1), (1, 1), (0, 2)],
                [(0, 0), (1, 0), (2, 0), (1, 1)],
                [(1, 0), (0, 1), (1, 1), (1, 2)],
            ],
            BlockKind::Z => [
                [(0, 0), (1, 0), (1, 1), (2, 1)],
                [(1, 0), (0, 1), (1, 1), (0, 2)],
                [(0, 0), (1, 0), (1, 1), (2, 1)],
                [(1, 0), (0, 1), (1, 1), (0, 2)],
            ],
        }
    }
}

// ============================================================================
// Block
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Block {
    pub kind: BlockKind,
    pub rotation: usize,
    pub x: i16,
    pub y: i16,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            rotation: 0,
            x: 0,
            y: 0,
        }
    }

    /// Moves the anchor to the spawn column at the top of the invisible rows.
    pub fn set_initial_position(&mut self) {
        self.x = (GRID_WIDTH as i16 / 2) - 1;
        self.y = 0;
    }

    pub fn cells(&self) -> [(i16, i16); 4] {
        self.kind.offsets()[self.rotation % 4]
    }
}

// ============================================================================
// Block Source
// ============================================================================

/// Seam for randomness so tests can feed deterministic shape sequences.
pub trait BlockSource {
    fn next_kind(&mut self) -> BlockKind;
}

pub struct RandomBlockSource;

impl BlockSource for RandomBlockSource {
    fn next_kind(&mut self) -> BlockKind {
        BlockKind::ALL[rand::thread_rng().gen_range(0..BlockKind::ALL.len())]
    }
}

pub struct SequenceBlockSource {
    kinds: Vec<BlockKind>,
    index: usize,
}

impl SequenceBlockSource {
    pub fn new(kinds: Vec<BlockKind>) -> Self {
        Self { kinds, index: 0 }
    }
}

impl BlockSource for SequenceBlockSource {
    fn next_kind(&mut self) -> BlockKind {
        let kind = self.kinds[self.index % self.kinds.len()];
        self.index += 1;
        kind
    }
}

// ============================================================================
// Spawning
// ============================================================================

/// Draws the next block to spawn. With no history a single uniform draw is
/// returned as-is. Otherwise candidates whose id, bitwise-ORed with both
/// `current` and `next`, collapses back to `next`'s id are rejected, with a
/// budget of two retries before the last draw is accepted anyway. The OR
/// test is a weak guarantee, not a strict no-triple-repeat bag.
pub fn new_block(
    current: Option<BlockKind>,
    next: Option<BlockKind>,
    source: &mut dyn BlockSource,
) -> Block {
    let (Some(current), Some(next)) = (current, next) else {
        return Block::new(source.next_kind());
    };

    let mut candidate = source.next_kind();
    let mut count = 0;
    while count < 2 {
        if current.id() | next.id() | candidate.id() != next.id() {
            return Block::new(candidate);
        }
        candidate = source.next_kind();
        count += 1;
    }

    Block::new(candidate)
}
