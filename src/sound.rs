use std::ops::{Index, IndexMut};

/// One identifier per one-shot sound effect. The core only raises flags;
/// whatever front end is attached maps them to playback and drops them
/// again every tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sound {
    Rotation,
    LateralMove,
    TouchGround,
    LinesVanishing,
    LinesFalling,
    MenuMove,
    MenuConfirm,
    Coin,
    Buy,
    Death,
    MenuNo,
    Rocket,
}

pub const NUM_SOUNDS: usize = 12;

/// Per-tick sound triggers, one flag per `Sound`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SoundFlags([bool; NUM_SOUNDS]);

impl SoundFlags {
    pub fn any(&self) -> bool {
        self.0.iter().any(|&f| f)
    }
}

impl Index<Sound> for SoundFlags {
    type Output = bool;

    fn index(&self, sound: Sound) -> &bool {
        &self.0[sound as usize]
    }
}

impl IndexMut<Sound> for SoundFlags {
    fn index_mut(&mut self, sound: Sound) -> &mut bool {
        &mut self.0[sound as usize]
    }
}
