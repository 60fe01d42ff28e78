use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io::{self, stdout},
    time::{Duration, Instant},
};

use malustris::balancing::{Balancing, Category};
use malustris::block::BlockKind;
use malustris::game::{Game, InputState, Stage};
use malustris::tetris::{
    Tetris, BREAK_STYLE, GRID_WIDTH, INVISIBLE_ROWS, TOTAL_HEIGHT, VISIBLE_HEIGHT,
};

// ============================================================================
// Visual Constants
// ============================================================================

const FRAME_DURATION: Duration = Duration::from_millis(16);

const CELL_WIDTH: u16 = 2;
const BLOCK_CHAR: &str = "██";
const EMPTY_CHAR: &str = "  ";
const SHROUD_CHAR: &str = "▒▒";

// ============================================================================
// Color Mapping
// ============================================================================

fn style_color(style: u8) -> Color {
    match style {
        1 => Color::Cyan,             // I
        2 => Color::Yellow,           // O
        3 => Color::Blue,             // J
        4 => Color::Rgb(255, 165, 0), // L
        5 => Color::Green,            // S
        6 => Color::Magenta,          // T
        7 => Color::Red,              // Z
        BREAK_STYLE => Color::White,
        _ => Color::DarkGray,
    }
}

fn kind_color(kind: BlockKind) -> Color {
    style_color(kind.style())
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, game: &Game) {
    let area = frame.size();

    match game.stage {
        Stage::Title => render_title(frame, area),
        Stage::Play => render_play(frame, game, area),
        Stage::Balance => render_balance(frame, game, area),
        Stage::Lost => render_lost(frame, game, area),
    }
}

fn render_title(frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "M A L U S T R I S",
            Style::default().fg(Color::Magenta),
        )),
        Line::from(""),
        Line::from("Clear the goal lines to finish each level."),
        Line::from("Every level up forces a new malus on you."),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to start",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Malustris ")
            .title_alignment(Alignment::Center),
    );

    let popup_area = centered_rect(50, 11, area);
    frame.render_widget(paragraph, popup_area);
}

fn render_play(frame: &mut Frame, game: &Game, area: Rect) {
    let grid_display_width = (GRID_WIDTH as u16 * CELL_WIDTH) + 2;
    let grid_display_height = VISIBLE_HEIGHT as u16 + 2;
    let side_width = 12;
    let info_width = 16;
    let total_width = grid_display_width + side_width + info_width + 4;
    let total_height = grid_display_height + 3;

    let main_area = centered_rect(total_width, total_height, area);

    let vertical = Layout::vertical([
        Constraint::Length(grid_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let game_row = vertical[0];

    let horizontal = Layout::horizontal([
        Constraint::Length(grid_display_width),
        Constraint::Length(side_width),
        Constraint::Length(info_width),
    ])
    .split(game_row);

    render_grid(frame, &game.play, horizontal[0]);
    render_side(frame, &game.play, horizontal[1]);
    render_info(frame, game, horizontal[2]);

    let controls_area = Rect {
        x: area.x,
        y: game_row.y + game_row.height,
        width: area.width,
        height: 2,
    };

    if controls_area.y + 1 < area.height {
        let controls = Paragraph::new(vec![Line::from(
            "←→/AD: Move | ↓/S: Drop | Z/X: Rotate | Space: Hold | Q/ESC: Quit",
        )])
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(controls, controls_area);
    }
}

/// Style at a visible cell, with the active block overlaid into empty cells
/// whenever the engine says it should be drawn.
fn visual_cell(play: &Tetris, x: usize, y: usize) -> u8 {
    let style = play.cell_style(x, y);
    if style != 0 {
        return style;
    }

    if play.current_block_visible() {
        let block = play.current_block;
        for (dx, dy) in block.cells() {
            if block.x + dx == x as i16 && block.y + dy == y as i16 {
                return block.kind.style();
            }
        }
    }

    0
}

fn render_grid(frame: &mut Frame, play: &Tetris, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Malustris ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();

    for y in INVISIBLE_ROWS..TOTAL_HEIGHT {
        let mut spans: Vec<Span> = Vec::new();

        if y >= TOTAL_HEIGHT - play.hidden_lines {
            // the hidden-lines malus shrouds the bottom of the well
            for _ in 0..GRID_WIDTH {
                spans.push(Span::styled(
                    SHROUD_CHAR,
                    Style::default().fg(Color::DarkGray),
                ));
            }
        } else {
            for x in 0..GRID_WIDTH {
                let style = visual_cell(play, x, y);
                let (symbol, span_style) = if style == 0 {
                    (EMPTY_CHAR, Style::default())
                } else {
                    (BLOCK_CHAR, Style::default().fg(style_color(style)))
                };
                spans.push(Span::styled(symbol, span_style));
            }
        }

        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    frame.render_widget(paragraph, inner);
}

fn block_preview(kind: BlockKind) -> Vec<Line<'static>> {
    let cells = kind.offsets()[0];
    let color = kind_color(kind);
    let max_y = cells.iter().map(|&(_, y)| y).max().unwrap_or(0);

    let mut lines = Vec::new();
    for y in 0i16..=max_y {
        let mut spans: Vec<Span> = vec![Span::raw(" ")];
        for x in 0i16..4i16 {
            if cells.contains(&(x, y)) {
                spans.push(Span::styled(BLOCK_CHAR, Style::default().fg(color)));
            } else {
                spans.push(Span::raw(EMPTY_CHAR));
            }
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn render_side(frame: &mut Frame, play: &Tetris, area: Rect) {
    let halves = Layout::vertical([Constraint::Length(6), Constraint::Length(6)]).split(area);

    let next = Block::default()
        .borders(Borders::ALL)
        .title(" Next ")
        .title_alignment(Alignment::Center);
    let inner = next.inner(halves[0]);
    frame.render_widget(next, halves[0]);
    frame.render_widget(Paragraph::new(block_preview(play.next_block.kind)), inner);

    let held = Block::default()
        .borders(Borders::ALL)
        .title(" Hold ")
        .title_alignment(Alignment::Center);
    let inner = held.inner(halves[1]);
    frame.render_widget(held, halves[1]);
    if let Some(held_block) = play.held_block {
        frame.render_widget(Paragraph::new(block_preview(held_block.kind)), inner);
    }
}

fn render_info(frame: &mut Frame, game: &Game, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let play = &game.play;

    let mut hearts = String::new();
    for i in 0..play.life {
        hearts.push(if i < play.current_life { '♥' } else { '♡' });
        hearts.push(' ');
    }

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Score", Style::default().fg(Color::Yellow))),
        Line::from(format!("{}", play.score)),
        Line::from(""),
        Line::from(Span::styled("Lines", Style::default().fg(Color::Cyan))),
        Line::from(format!(
            "{}/{}",
            play.num_lines,
            game.balance.get_goal_lines()
        )),
        Line::from(""),
        Line::from(Span::styled("Level", Style::default().fg(Color::Green))),
        Line::from(format!("{}", game.level)),
        Line::from(""),
        Line::from(Span::styled(hearts, Style::default().fg(Color::Red))),
    ];

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn level_pips(balance: &Balancing, cat: Category) -> String {
    let level = balance.levels[cat as usize];
    let max = balance.max_levels[cat as usize];
    let mut pips = String::new();
    for i in 0..max {
        pips.push(if i < level { '●' } else { '○' });
    }
    pips
}

fn render_choice_slot(
    frame: &mut Frame,
    balance: &Balancing,
    slot: Option<Category>,
    highlighted: bool,
    area: Rect,
) {
    let border_style = if highlighted {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default().borders(Borders::ALL).style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = match slot {
        Some(cat) => vec![
            Line::from(""),
            Line::from(Span::styled(cat.name(), Style::default().fg(Color::White))),
            Line::from(""),
            Line::from(Span::styled(
                level_pips(balance, cat),
                Style::default().fg(Color::Yellow),
            )),
        ],
        None => vec![
            Line::from(""),
            Line::from(Span::styled("—", Style::default().fg(Color::DarkGray))),
        ],
    };

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_balance(frame: &mut Frame, game: &Game, area: Rect) {
    let balance = &game.balance;

    let main_area = centered_rect(66, 15, area);
    let rows = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(8),
        Constraint::Length(3),
    ])
    .split(main_area);

    let title = Paragraph::new(vec![
        Line::from(Span::styled(
            "LEVEL COMPLETE",
            Style::default().fg(Color::Green),
        )),
        Line::from("Choose your next malus"),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(title, rows[0]);

    let slots = Layout::horizontal([
        Constraint::Length(22),
        Constraint::Length(22),
        Constraint::Length(22),
    ])
    .split(rows[1]);

    let n = balance.num_choices;
    let (prev, center, next) = if n == 0 {
        (None, None, None)
    } else {
        let center = balance.choices[balance.choice];
        if n >= 2 {
            (
                balance.choices[(balance.choice + n - 1) % n],
                center,
                balance.choices[(balance.choice + 1) % n],
            )
        } else {
            (None, center, None)
        }
    };

    // The highlight drops out mid-transition, matching the selector not
    // committing its rotation until the animation completes.
    let highlight = !balance.in_transition;
    render_choice_slot(frame, balance, prev, false, slots[0]);
    render_choice_slot(frame, balance, center, highlight, slots[1]);
    render_choice_slot(frame, balance, next, false, slots[2]);

    let description = match center {
        Some(cat) => cat.description(),
        None => "Nothing left to worsen",
    };
    let footer = Paragraph::new(vec![
        Line::from(description),
        Line::from(Span::styled(
            "←→: Rotate | Enter: Confirm",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(footer, rows[2]);
}

fn render_lost(frame: &mut Frame, game: &Game, area: Rect) {
    render_play(frame, game, area);

    let play = &game.play;
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Score: {}", play.score)),
        Line::from(format!("Level: {}", game.level)),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter for title",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Game Over ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    let popup_area = centered_rect(28, 11, area);
    frame.render_widget(paragraph, popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Input Sampling
// ============================================================================

/// Folds a key press seen during this frame's poll window into the tick's
/// input. Terminals report no key releases, so "pressed" approximates to
/// "an event arrived this frame" and held-key repeat rides on the terminal's
/// own auto-repeat.
fn apply_key(code: KeyCode, input: &mut InputState, quit: &mut bool) {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => *quit = true,
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => {
            input.player.move_down = true;
        }
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => {
            input.player.move_left = true;
            input.menu_left = true;
        }
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => {
            input.player.move_right = true;
            input.menu_right = true;
        }
        KeyCode::Char('z') | KeyCode::Char('Z') => {
            input.player.rotate_left = true;
        }
        KeyCode::Up | KeyCode::Char('x') | KeyCode::Char('X') => {
            input.player.rotate_right = true;
        }
        KeyCode::Char(' ') | KeyCode::Char('c') | KeyCode::Char('C') => {
            input.player.hold = true;
        }
        KeyCode::Enter => input.confirm = true,
        _ => {}
    }
}

// ============================================================================
// Main Loop
// ============================================================================

fn main() -> io::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut game = Game::new();
    let mut last_frame = Instant::now();

    loop {
        terminal.draw(|frame| render(frame, &game))?;

        let mut input = InputState::default();
        let mut quit = false;

        while last_frame.elapsed() < FRAME_DURATION {
            let timeout = FRAME_DURATION
                .checked_sub(last_frame.elapsed())
                .unwrap_or(Duration::ZERO);
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        apply_key(key.code, &mut input, &mut quit);
                    }
                }
            }
        }

        if quit {
            break;
        }

        // The terminal build carries no audio device; the flags stay the
        // core's contract for front ends that do.
        let _sounds = game.update(&input);
        last_frame = Instant::now();
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
