//! Engine tests. Everything is frame-stepped: a deterministic block source
//! plus a fixed number of `update` calls pins down the exact tick on which
//! scoring, compaction, movement and death happen.

use malustris::balancing::Balancing;
use malustris::block::{Block, BlockKind, SequenceBlockSource};
use malustris::sound::Sound;
use malustris::tetris::{
    PlayerInput, Tetris, Upgrades, BREAK_STYLE, GRID_WIDTH, SCORE_DOUBLE, SCORE_TETRIS, SPEEDS,
    TOTAL_HEIGHT,
};

// ============================================================================
// Helpers
// ============================================================================

fn engine(kinds: Vec<BlockKind>) -> Tetris {
    engine_with_upgrades(kinds, Upgrades::default())
}

fn engine_with_upgrades(kinds: Vec<BlockKind>, upgrades: Upgrades) -> Tetris {
    let mut tetris = Tetris::with_source(Box::new(SequenceBlockSource::new(kinds)));
    let balance = Balancing::new(3);
    tetris.init(0, &balance, 0, 0, upgrades, 0, 0);
    tetris
}

fn block(kind: BlockKind, x: i16, y: i16) -> Block {
    Block {
        kind,
        rotation: 0,
        x,
        y,
    }
}

fn idle() -> PlayerInput {
    PlayerInput::default()
}

fn down() -> PlayerInput {
    PlayerInput {
        move_down: true,
        ..Default::default()
    }
}

fn left() -> PlayerInput {
    PlayerInput {
        move_left: true,
        ..Default::default()
    }
}

fn hold() -> PlayerInput {
    PlayerInput {
        hold: true,
        ..Default::default()
    }
}

fn rotate_right() -> PlayerInput {
    PlayerInput {
        rotate_right: true,
        ..Default::default()
    }
}

/// Forces the next idle tick to descend automatically, so a lock can be
/// triggered without soft-drop score leaking into the assertion.
fn arm_auto_down(tetris: &mut Tetris) {
    tetris.auto_down_frame = tetris.auto_down_frame_limit - 1;
}

// ============================================================================
// Locking & Scoring Tests
// ============================================================================

mod locking_and_scoring {
    use super::*;

    #[test]
    fn clear_scores_once_on_step_four_and_compacts_on_step_eight() {
        let mut tetris = engine(vec![BlockKind::O]);

        // Bottom two rows complete except for the two columns the O fills.
        for x in 0..GRID_WIDTH {
            if x != 4 && x != 5 {
                tetris.area[22][x] = 1;
                tetris.area[23][x] = 1;
            }
        }
        tetris.current_block = block(BlockKind::O, 4, 22);
        arm_auto_down(&mut tetris);

        let (over, sounds) = tetris.update(idle(), 2);
        assert!(!over);
        assert!(sounds[Sound::TouchGround]);
        assert!(sounds[Sound::LinesVanishing]);
        assert!(tetris.in_animation);
        assert_eq!(tetris.remove_line_animation_step, 1);
        assert_eq!(tetris.to_remove_num, 2);
        assert_eq!(tetris.to_check, [22, 23]);

        // Nothing is scored during the first three animation steps.
        for _ in 0..23 {
            tetris.update(idle(), 2);
        }
        assert_eq!(tetris.score, 0);
        assert_eq!(tetris.num_lines, 0);

        // The 24th animation tick enters step 4 and scores exactly once,
        // multiplied by level + 1.
        tetris.update(idle(), 2);
        assert_eq!(tetris.score, SCORE_DOUBLE * 3);
        assert_eq!(tetris.num_lines, 2);

        // The grid is only compacted on the 56th tick (step 8).
        let mut falling = false;
        for _ in 24..56 {
            let (_, sounds) = tetris.update(idle(), 2);
            falling = falling || sounds[Sound::LinesFalling];
        }
        assert!(falling);
        assert_eq!(tetris.score, SCORE_DOUBLE * 3);
        assert_eq!(tetris.remove_line_animation_step, 0);
        assert!(!tetris.in_animation);
        assert_eq!(tetris.total_filled_cells(), 0);
    }

    #[test]
    fn four_row_clear_at_level_two_scores_3600() {
        let mut tetris = engine(vec![BlockKind::I]);

        // A vertical I drops into a four-deep slot at column 4.
        for y in 20..=23 {
            for x in 0..GRID_WIDTH {
                if x != 4 {
                    tetris.area[y][x] = 1;
                }
            }
        }
        tetris.current_block = Block {
            kind: BlockKind::I,
            rotation: 1,
            x: 4,
            y: 20,
        };
        arm_auto_down(&mut tetris);

        tetris.update(idle(), 2);
        assert_eq!(tetris.to_remove_num, 4);
        assert_eq!(tetris.to_check, [20, 23]);

        for _ in 0..24 {
            tetris.update(idle(), 2);
        }
        assert_eq!(tetris.score, SCORE_TETRIS * 3);
        assert_eq!(tetris.num_lines, 4);
    }

    #[test]
    fn soft_drop_scores_one_point_per_descent() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.current_block = block(BlockKind::O, 4, 20);

        // Descent ticks at 1, 5 and 9; the block falls twice and the third
        // press locks it, so the drop counter reads 3 at lock time.
        let mut ticks = 0;
        loop {
            let (_, sounds) = tetris.update(down(), 0);
            ticks += 1;
            assert!(ticks < 20, "block never locked");
            if sounds[Sound::TouchGround] {
                break;
            }
        }

        assert_eq!(tetris.score, 3);
        assert_eq!(tetris.to_check, [22, 23]);
    }

    #[test]
    fn lock_without_clear_spawns_next_and_disables_manual_moves() {
        let mut tetris = engine(vec![BlockKind::T, BlockKind::S, BlockKind::Z]);
        assert_eq!(tetris.current_block.kind, BlockKind::T);
        assert_eq!(tetris.next_block.kind, BlockKind::S);

        tetris.current_block = block(BlockKind::T, 0, 22);
        arm_auto_down(&mut tetris);

        let (over, sounds) = tetris.update(idle(), 0);
        assert!(!over);
        assert!(sounds[Sound::TouchGround]);
        assert!(!sounds[Sound::LinesVanishing]);

        assert_eq!(tetris.current_block.kind, BlockKind::S);
        assert_eq!((tetris.current_block.x, tetris.current_block.y), (4, 0));
        assert_eq!(tetris.next_block.kind, BlockKind::Z);
        assert!(!tetris.manual_move_allowed);
    }
}

// ============================================================================
// Movement Tests
// ============================================================================

mod movement {
    use super::*;

    #[test]
    fn held_direction_repeats_after_first_move_delay() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.current_block = block(BlockKind::O, 4, 10);

        // Tick 1 moves immediately.
        let (_, sounds) = tetris.update(left(), 0);
        assert_eq!(tetris.current_block.x, 3);
        assert!(sounds[Sound::LateralMove]);

        // Ticks 2..=18: inside the first-move delay, no movement.
        for _ in 0..17 {
            let (_, sounds) = tetris.update(left(), 0);
            assert!(!sounds[Sound::LateralMove]);
        }
        assert_eq!(tetris.current_block.x, 3);

        // Tick 19: delay elapsed, second move.
        tetris.update(left(), 0);
        assert_eq!(tetris.current_block.x, 2);

        // Then once per repeat interval: tick 25.
        for _ in 0..5 {
            tetris.update(left(), 0);
        }
        assert_eq!(tetris.current_block.x, 2);
        tetris.update(left(), 0);
        assert_eq!(tetris.current_block.x, 1);
    }

    #[test]
    fn releasing_the_key_resets_the_repeat_gate() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.current_block = block(BlockKind::O, 4, 10);

        tetris.update(left(), 0);
        assert_eq!(tetris.current_block.x, 3);

        tetris.update(idle(), 0);
        tetris.update(left(), 0);
        assert_eq!(tetris.current_block.x, 2);
    }

    #[test]
    fn movement_into_the_wall_is_declined() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.current_block = block(BlockKind::O, 0, 10);

        let (_, sounds) = tetris.update(left(), 0);
        assert_eq!(tetris.current_block.x, 0);
        assert!(!sounds[Sound::LateralMove]);
    }

    #[test]
    fn soft_drop_stays_disabled_until_released_after_spawn() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.current_block = block(BlockKind::O, 4, 22);

        // Locks with the key held; the freshly spawned block must not
        // inherit the press.
        tetris.update(down(), 0);
        assert!(!tetris.manual_move_allowed);

        for _ in 0..5 {
            tetris.update(down(), 0);
        }
        assert_eq!(tetris.current_block.y, 0);

        // One released tick re-arms, the next press descends again.
        tetris.update(idle(), 0);
        assert!(tetris.manual_move_allowed);
        tetris.update(down(), 0);
        assert_eq!(tetris.current_block.y, 1);
    }
}

// ============================================================================
// Rotation Tests
// ============================================================================

mod rotation {
    use super::*;

    #[test]
    fn rotation_applies_and_raises_the_sound() {
        let mut tetris = engine(vec![BlockKind::T]);
        tetris.current_block = block(BlockKind::T, 4, 10);

        let (_, sounds) = tetris.update(rotate_right(), 0);
        assert_eq!(tetris.current_block.rotation, 1);
        assert!(sounds[Sound::Rotation]);
    }

    #[test]
    fn opposite_rotations_on_the_same_tick_cancel() {
        let mut tetris = engine(vec![BlockKind::T]);
        tetris.current_block = block(BlockKind::T, 4, 10);

        let input = PlayerInput {
            rotate_left: true,
            rotate_right: true,
            ..Default::default()
        };
        let (_, sounds) = tetris.update(input, 0);
        assert_eq!(tetris.current_block.rotation, 0);
        assert!(!sounds[Sound::Rotation]);
    }

    #[test]
    fn blocked_rotation_is_declined() {
        let mut tetris = engine(vec![BlockKind::T]);
        tetris.current_block = block(BlockKind::T, 4, 10);
        // Occupies a cell of the rotated footprint but not the current one.
        tetris.area[10][4] = 1;

        let (_, sounds) = tetris.update(rotate_right(), 0);
        assert_eq!(tetris.current_block.rotation, 0);
        assert!(!sounds[Sound::Rotation]);
    }

    #[test]
    fn better_rotation_refreshes_the_auto_down_timer() {
        let mut tetris = engine(vec![BlockKind::T]);
        tetris.current_block = block(BlockKind::T, 4, 10);
        tetris.auto_down_frame = 30;

        tetris.update(rotate_right(), 0);
        assert_eq!(tetris.auto_down_frame, 1);
    }

    #[test]
    fn without_the_upgrade_rotation_keeps_the_timer() {
        let upgrades = Upgrades {
            better_rotation: false,
            can_hold: true,
        };
        let mut tetris = engine_with_upgrades(vec![BlockKind::T], upgrades);
        tetris.current_block = block(BlockKind::T, 4, 10);
        tetris.auto_down_frame = 30;

        tetris.update(rotate_right(), 0);
        assert_eq!(tetris.auto_down_frame, 31);
    }
}

// ============================================================================
// Hold Tests
// ============================================================================

mod holding {
    use super::*;

    #[test]
    fn hold_into_the_empty_slot_promotes_the_next_block() {
        let mut tetris = engine(vec![BlockKind::I, BlockKind::O, BlockKind::T]);
        assert_eq!(tetris.current_block.kind, BlockKind::I);
        assert_eq!(tetris.next_block.kind, BlockKind::O);

        tetris.update(hold(), 0);

        let held = tetris.held_block.expect("slot filled");
        assert_eq!(held.kind, BlockKind::I);
        assert_eq!((held.x, held.y), (0, 0));
        assert_eq!(tetris.current_block.kind, BlockKind::O);
        assert_eq!((tetris.current_block.x, tetris.current_block.y), (4, 0));
        assert_eq!(tetris.next_block.kind, BlockKind::T);
    }

    #[test]
    fn second_hold_swaps_back_and_keeps_the_position() {
        let mut tetris = engine(vec![BlockKind::I, BlockKind::O, BlockKind::T]);

        tetris.update(hold(), 0);
        tetris.update(hold(), 0);

        let held = tetris.held_block.expect("slot filled");
        assert_eq!(held.kind, BlockKind::O);
        assert_eq!(tetris.current_block.kind, BlockKind::I);
        assert_eq!((tetris.current_block.x, tetris.current_block.y), (4, 0));
        // The queue is not consumed by a swap.
        assert_eq!(tetris.next_block.kind, BlockKind::T);
    }

    #[test]
    fn hold_is_declined_when_the_incoming_block_does_not_fit() {
        let mut tetris = engine(vec![BlockKind::I, BlockKind::O]);
        // The O at the I's anchor would overlap this cell; the I does not.
        tetris.area[1][4] = 1;

        tetris.update(hold(), 0);

        assert!(tetris.held_block.is_none());
        assert_eq!(tetris.current_block.kind, BlockKind::I);
    }

    #[test]
    fn hold_is_inert_without_the_upgrade() {
        let upgrades = Upgrades {
            better_rotation: true,
            can_hold: false,
        };
        let mut tetris = engine_with_upgrades(vec![BlockKind::I, BlockKind::O], upgrades);

        tetris.update(hold(), 0);

        assert!(tetris.held_block.is_none());
        assert_eq!(tetris.current_block.kind, BlockKind::I);
    }
}

// ============================================================================
// Line Check & Compaction Tests
// ============================================================================

mod lines {
    use super::*;

    #[test]
    fn incomplete_rows_yield_no_removals() {
        let mut tetris = engine(vec![BlockKind::O]);
        // Rows 18..=21 each miss one cell.
        for y in 18..=21 {
            for x in 0..GRID_WIDTH {
                if x != y - 18 {
                    tetris.area[y][x] = 1;
                }
            }
        }
        tetris.to_check = [18, 21];

        let (num, first_available, flags) = tetris.check_lines();

        assert_eq!(num, 0);
        assert_eq!(first_available, 21);
        assert_eq!(flags, [false; 4]);
    }

    #[test]
    fn fully_complete_range_points_the_donor_above_it() {
        let mut tetris = engine(vec![BlockKind::O]);
        for y in 20..=23 {
            tetris.area[y] = [1; GRID_WIDTH];
        }
        tetris.to_check = [20, 23];

        let (num, first_available, flags) = tetris.check_lines();

        assert_eq!(num, 4);
        assert_eq!(first_available, 19);
        assert_eq!(flags, [true; 4]);
    }

    #[test]
    fn compaction_skips_removed_rows_and_zero_fills() {
        let mut tetris = engine(vec![BlockKind::O]);
        // Distinct styles per row so the copies can be traced.
        tetris.area[18][0] = 5;
        tetris.area[19][1] = 6;
        tetris.area[20] = [1; GRID_WIDTH];
        tetris.area[20][9] = 0;
        tetris.area[21] = [2; GRID_WIDTH];
        tetris.area[22] = [3; GRID_WIDTH];
        tetris.area[22][0] = 0;
        tetris.area[23] = [4; GRID_WIDTH];
        tetris.to_check = [20, 23];

        let (num, first_available, flags) = tetris.check_lines();
        assert_eq!(num, 2);
        assert_eq!(first_available, 22);
        assert_eq!(flags, [false, true, false, true]);

        tetris.to_remove_num = num;
        tetris.first_available = first_available;
        tetris.to_remove = flags;
        let filled_before = tetris.total_filled_cells();

        tetris.remove_lines();

        // Two full rows vanished, every other cell survived.
        assert_eq!(
            tetris.total_filled_cells(),
            filled_before - 2 * GRID_WIDTH
        );
        // Bottom-up: 23 <- old 22, 22 <- old 20, 21 <- old 19, 20 <- old 18.
        assert_eq!(tetris.area[23][5], 3);
        assert_eq!(tetris.area[23][0], 0);
        assert_eq!(tetris.area[22][5], 1);
        assert_eq!(tetris.area[22][9], 0);
        assert_eq!(tetris.area[21][1], 6);
        assert_eq!(tetris.area[20][0], 5);
        for y in 0..20 {
            assert_eq!(tetris.area[y], [0; GRID_WIDTH]);
        }
    }

    #[test]
    fn rows_below_the_checked_range_are_never_touched() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.area[20] = [7; GRID_WIDTH];
        tetris.area[21] = [7; GRID_WIDTH];
        tetris.area[22][3] = 2;
        tetris.area[23] = [3; GRID_WIDTH];
        tetris.area[23][8] = 0;
        tetris.to_check = [18, 21];

        let (num, first_available, flags) = tetris.check_lines();
        assert_eq!(num, 2);
        assert_eq!(first_available, 19);
        tetris.to_remove_num = num;
        tetris.first_available = first_available;
        tetris.to_remove = flags;

        let row_22 = tetris.area[22];
        let row_23 = tetris.area[23];

        tetris.remove_lines();

        assert_eq!(tetris.area[22], row_22);
        assert_eq!(tetris.area[23], row_23);
    }

    #[test]
    fn checked_range_stays_bounded_over_a_long_session() {
        let mut kinds = BlockKind::ALL.to_vec();
        kinds.extend([BlockKind::O, BlockKind::I]);
        let mut tetris = engine(kinds);

        // Soft-drop everything, releasing the key periodically so the next
        // block can descend too.
        for tick in 0..2500 {
            let input = if tick % 10 == 0 { idle() } else { down() };
            let (over, _) = tetris.update(input, 0);

            let [lo, hi] = tetris.to_check;
            assert!(lo >= 0);
            assert!(hi < TOTAL_HEIGHT as i16);
            assert!(hi - lo <= 3);

            if over {
                break;
            }
        }
    }
}

// ============================================================================
// Death Tests
// ============================================================================

mod death {
    use super::*;

    #[test]
    fn life_absorbs_death_zone_cells_until_it_runs_out() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.death_lines = 3;
        tetris.life = 2;

        // Two cells inside the zone (4 invisible rows + 3 death lines).
        tetris.area[0][0] = 1;
        tetris.area[3][5] = 1;
        tetris.lost();
        assert_eq!(tetris.current_life, 0);
        assert!(!tetris.dead);

        // A third pushes the remaining life below zero.
        tetris.area[6][2] = 1;
        tetris.lost();
        assert_eq!(tetris.current_life, -1);
        assert!(tetris.dead);
    }

    #[test]
    fn cells_below_the_death_zone_are_ignored() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.death_lines = 3;
        tetris.life = 0;

        // First row below the zone.
        tetris.area[7][0] = 1;
        tetris.lost();

        assert_eq!(tetris.current_life, 0);
        assert!(!tetris.dead);
    }

    #[test]
    fn current_life_is_recomputed_not_accumulated() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.death_lines = 1;
        tetris.life = 2;

        tetris.area[0][0] = 1;
        tetris.lost();
        assert_eq!(tetris.current_life, 1);

        // Clearing the zone restores the full budget on the next check.
        tetris.area[0][0] = 0;
        tetris.lost();
        assert_eq!(tetris.current_life, 2);
    }

    #[test]
    fn death_plays_out_over_ninety_frames() {
        let mut tetris = engine(vec![BlockKind::O]);
        // One cell in the zone and no life: the next lock kills.
        tetris.area[0][0] = 1;
        tetris.current_block = block(BlockKind::O, 4, 22);
        arm_auto_down(&mut tetris);

        let (over, _) = tetris.update(idle(), 0);
        assert!(tetris.dead);
        assert!(tetris.in_animation);
        assert!(!over);

        // The death sound fires on the first animation frame only.
        let (_, sounds) = tetris.update(idle(), 0);
        assert!(sounds[Sound::Death]);
        let (_, sounds) = tetris.update(idle(), 0);
        assert!(!sounds[Sound::Death]);

        let mut over = false;
        for _ in 0..87 {
            let (o, _) = tetris.update(idle(), 0);
            over = o;
        }
        assert!(!over, "animation ended early");

        let (over, _) = tetris.update(idle(), 0);
        assert!(over);
        assert!(!tetris.in_animation);
    }
}

// ============================================================================
// Invisible Block & Presentation Tests
// ============================================================================

mod invisibility {
    use super::*;

    #[test]
    fn invisible_step_cycles_down_every_thirty_frames() {
        let mut tetris = engine(vec![BlockKind::O]);
        assert_eq!(tetris.invisible_step, 3);

        for _ in 0..30 {
            tetris.update(idle(), 0);
        }
        assert_eq!(tetris.invisible_step, 2);

        for _ in 0..30 {
            tetris.update(idle(), 0);
        }
        assert_eq!(tetris.invisible_step, 1);

        // 1 wraps straight back to 3; the block never reaches step 0.
        for _ in 0..30 {
            tetris.update(idle(), 0);
        }
        assert_eq!(tetris.invisible_step, 3);
    }

    #[test]
    fn block_hides_only_below_the_spawn_rows() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.invisible_level = 3;

        // Inside the invisible spawn rows the block always shows.
        tetris.current_block = block(BlockKind::O, 4, 2);
        assert!(tetris.current_block_visible());

        // Below them, level 3 covers every step of the cycle.
        tetris.current_block = block(BlockKind::O, 4, 10);
        assert!(!tetris.current_block_visible());

        // Level 0 never hides anything.
        tetris.invisible_level = 0;
        assert!(tetris.current_block_visible());
    }

    #[test]
    fn block_is_hidden_during_the_clear_animation() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.remove_line_animation_step = 1;
        assert!(!tetris.current_block_visible());
    }

    #[test]
    fn flagged_rows_break_up_on_odd_steps_and_vanish_on_step_seven() {
        let mut tetris = engine(vec![BlockKind::O]);
        tetris.area[20] = [2; GRID_WIDTH];
        tetris.area[21][0] = 3;
        tetris.to_check = [20, 21];
        tetris.to_remove = [true, false, false, false];

        tetris.remove_line_animation_step = 1;
        assert_eq!(tetris.cell_style(4, 20), BREAK_STYLE);
        assert_eq!(tetris.cell_style(0, 21), 3);

        tetris.remove_line_animation_step = 2;
        assert_eq!(tetris.cell_style(4, 20), 2);

        tetris.remove_line_animation_step = 7;
        assert_eq!(tetris.cell_style(4, 20), 0);
        assert_eq!(tetris.cell_style(0, 21), 3);
    }
}

// ============================================================================
// Init Tests
// ============================================================================

mod init {
    use super::*;

    #[test]
    fn later_levels_keep_the_grid_and_rebuild_the_parameters() {
        let mut tetris = engine(vec![
            BlockKind::I,
            BlockKind::O,
            BlockKind::T,
            BlockKind::S,
        ]);
        tetris.area[23][0] = 7;

        let mut balance = Balancing::new(3);
        balance.levels = [0, 0, 2, 2, 1];

        tetris.init(1, &balance, 1, 500, Upgrades::default(), 2, 1);

        assert_eq!(tetris.area[23][0], 7);
        assert_eq!(tetris.score, 500);
        assert_eq!(tetris.num_lines, 0);
        assert_eq!(tetris.hidden_lines, 6);
        assert_eq!(tetris.death_lines, 5);
        assert_eq!(tetris.invisible_level, 1);
        assert_eq!(tetris.life, 2);
        assert_eq!(tetris.current_life, 1);
        assert_eq!(
            tetris.auto_down_frame_limit,
            SPEEDS[balance.get_speed_level(1)]
        );
    }

    #[test]
    fn level_zero_starts_from_a_fresh_grid() {
        let mut tetris = engine(vec![BlockKind::I, BlockKind::O]);
        tetris.area[23][0] = 7;
        tetris.held_block = Some(block(BlockKind::T, 0, 0));

        let balance = Balancing::new(3);
        tetris.init(0, &balance, 0, 0, Upgrades::default(), 2, 2);

        assert_eq!(tetris.total_filled_cells(), 0);
        assert!(tetris.held_block.is_none());
        assert_eq!(tetris.score, 0);
    }
}
