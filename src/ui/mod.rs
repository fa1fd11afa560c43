use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event as CrosstermEvent, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing::info;

use crate::{
    config::{self, ConfigError, FieldConfig},
    control::{FrameClock, ModeController, ScrollThreshold, TickHandle, TickOutcome},
    core::Field,
    project::Projector,
    render::{FrameBuffer, TerminalSurface},
    types::{ColorTag, Mode},
};

/// Frame clock paced to a fixed refresh interval. Timestamps are milliseconds
/// since the clock was created.
#[derive(Debug)]
pub struct PacedClock {
    origin: Instant,
    interval: Duration,
    pending: Option<TickHandle>,
    next_handle: u64,
    last_fire: Option<Instant>,
}

impl PacedClock {
    pub fn new(origin: Instant, interval: Duration) -> Self {
        Self {
            origin,
            interval,
            pending: None,
            next_handle: 0,
            last_fire: None,
        }
    }

    /// Hands out the pending tick once a refresh interval has passed since the
    /// previous one.
    pub fn due(&mut self, now: Instant) -> Option<(TickHandle, f64)> {
        let handle = self.pending?;
        if let Some(last) = self.last_fire {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.pending = None;
        self.last_fire = Some(now);
        let timestamp = now.saturating_duration_since(self.origin).as_secs_f64() * 1000.0;
        Some((handle, timestamp))
    }
}

impl FrameClock for PacedClock {
    fn request_tick(&mut self) -> TickHandle {
        self.next_handle += 1;
        let handle = TickHandle(self.next_handle);
        self.pending = Some(handle);
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

struct App {
    field: Field,
    projector: Projector,
    controller: ModeController,
    surface: TerminalSurface,
    clock: PacedClock,
    scroll: ScrollThreshold,
    scroll_offset: f32,
    framebuf: FrameBuffer,
    ticks: usize,
}

impl App {
    fn new(config: FieldConfig, reduced_motion: bool, origin: Instant) -> Result<Self, ConfigError> {
        let projector = Projector::new(&config);
        let field = Field::new(config)?;
        let surface = TerminalSurface::new(field.bodies());
        let mut app = Self {
            field,
            projector,
            controller: ModeController::new(reduced_motion),
            surface,
            clock: PacedClock::new(origin, Duration::from_secs_f32(1.0 / config::SIM_HZ)),
            scroll: ScrollThreshold::new(0.0),
            scroll_offset: 0.0,
            framebuf: FrameBuffer::new(0, 0),
            ticks: 0,
        };
        app.controller.ensure_running(&mut app.clock);
        Ok(app)
    }

    /// Fits the surface to a viewport of `cols`x`rows` cells, remounting the
    /// elements when the size changed.
    fn layout(&mut self, cols: u16, rows: u16) {
        if !self.surface.resize(cols, rows) {
            return;
        }
        info!(cols, rows, "viewport resized");
        self.projector
            .mount(self.field.bodies(), self.controller.mode(), &mut self.surface);
        self.scroll
            .set_threshold(rows as f32 * config::SCROLL_THRESHOLD_RATIO);
        self.scroll_by(0.0);
    }

    fn scroll_by(&mut self, rows: f32) {
        self.scroll_offset = (self.scroll_offset + rows).max(0.0);
        if let Some(mode) = self.scroll.update(self.scroll_offset) {
            self.set_mode(mode);
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        self.controller.on_mode_change(
            mode,
            &mut self.field,
            &mut self.projector,
            &mut self.surface,
            &mut self.clock,
        );
    }

    fn toggle_reduced_motion(&mut self) {
        let reduced = !self.controller.reduced_motion();
        self.controller
            .on_reduced_motion_change(reduced, &mut self.clock);
    }

    fn pump(&mut self, now: Instant) -> Option<TickOutcome> {
        let (handle, timestamp) = self.clock.due(now)?;
        let outcome = self.controller.on_tick(
            handle,
            timestamp,
            &mut self.field,
            &mut self.projector,
            &mut self.surface,
            &mut self.clock,
        );
        if outcome != TickOutcome::Stopped {
            self.ticks += 1;
        }
        Some(outcome)
    }

    fn status(&self) -> String {
        format!(
            "mode: {} | active: {}/{} | loop: {} | reduced motion: {} | scroll: {:.0}",
            self.controller.mode().label(),
            self.field.active_count(),
            self.field.bodies().len(),
            if self.controller.is_running() { "running" } else { "stopped" },
            if self.controller.reduced_motion() { "on" } else { "off" },
            self.scroll_offset,
        )
    }
}

pub fn run(config: FieldConfig, reduced_motion: bool) -> Result<()> {
    let mut app = App::new(config, reduced_motion, Instant::now())?;

    let mut stdout = io::stdout();
    enable_raw_mode().context("failed to enable raw mode")?;
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
    if let Err(err) = terminal.hide_cursor() {
        tracing::error!(?err, "failed to hide cursor");
    }

    let result = run_event_loop(&mut terminal, &mut app);

    if let Err(err) = terminal.show_cursor() {
        tracing::error!(?err, "failed to show cursor");
    }
    if let Err(err) = disable_raw_mode() {
        tracing::error!(?err, "failed to disable raw mode");
    }
    if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
        tracing::error!(?err, "failed to leave alternate screen");
    }
    result
}

fn run_event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let render_interval = Duration::from_secs_f32(1.0 / config::RENDER_HZ);
    let mut last_render: Option<Instant> = None;

    loop {
        let chunks = split(terminal.size()?);
        let viewport = Block::default().borders(Borders::ALL).inner(chunks[1]);
        app.layout(viewport.width, viewport.height);
        app.pump(Instant::now());

        while event::poll(Duration::from_millis(0))? {
            if let CrosstermEvent::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Down => app.scroll_by(config::SCROLL_STEP_ROWS),
                    KeyCode::Up => app.scroll_by(-config::SCROLL_STEP_ROWS),
                    KeyCode::PageDown => app.scroll_by(config::SCROLL_PAGE_ROWS),
                    KeyCode::PageUp => app.scroll_by(-config::SCROLL_PAGE_ROWS),
                    KeyCode::Home => app.scroll_by(-app.scroll_offset),
                    KeyCode::Char('m') => app.toggle_reduced_motion(),
                    _ => {}
                }
            }
        }

        if last_render.is_none_or(|at| at.elapsed() >= render_interval) {
            app.surface.rasterize(&mut app.framebuf);
            terminal.draw(|frame| draw(frame, app))?;
            last_render = Some(Instant::now());
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

fn split(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

fn draw(frame: &mut Frame, app: &App) {
    let chunks = split(frame.size());

    let header = Paragraph::new(app.status())
        .block(Block::default().borders(Borders::ALL).title("ballfield"));
    frame.render_widget(header, chunks[0]);

    let framebuf = &app.framebuf;
    let lines: Vec<Line> = (0..framebuf.height())
        .map(|y| {
            let spans: Vec<Span> = (0..framebuf.width())
                .map(|x| {
                    let cell = framebuf.get(x, y);
                    let style = match cell.color {
                        Some(tag) => Style::default().fg(color_for(tag)),
                        None => Style::default(),
                    };
                    Span::styled(cell.ch.to_string(), style)
                })
                .collect();
            Line::from(spans)
        })
        .collect();
    let viewport =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Field"));
    frame.render_widget(viewport, chunks[1]);

    let footer = Paragraph::new("↑↓ PgUp PgDn Home: scroll | m: reduced motion | q: quit")
        .block(Block::default().borders(Borders::ALL).title("Controls"));
    frame.render_widget(footer, chunks[2]);
}

fn color_for(tag: ColorTag) -> Color {
    match tag {
        ColorTag::Gold => Color::Yellow,
        ColorTag::Purple => Color::Magenta,
        ColorTag::Neutral1 => Color::White,
        ColorTag::Neutral2 => Color::Gray,
    }
}

pub const HEADLESS_COLS: u16 = 100;
pub const HEADLESS_ROWS: u16 = 40;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessSummary {
    pub frames: usize,
    pub ticks: usize,
    pub scatter_frame: usize,
    pub idle_frame: Option<usize>,
    pub final_active: usize,
    pub final_visible: usize,
}

/// Synthetic time at which `frame` fires: one interval per frame, counting the
/// first frame as one interval past the origin.
fn frame_offset(interval: Duration, frame: usize) -> Duration {
    let nanos = interval.as_nanos().saturating_mul(frame as u128 + 1);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Runs the field offscreen on a synthetic 60 Hz clock: the first half of the
/// frames in cluster mode, the rest in scatter.
pub fn run_headless(config: FieldConfig, frames: usize, reduced_motion: bool) -> Result<HeadlessSummary> {
    let origin = Instant::now();
    let interval = Duration::from_secs_f32(1.0 / config::SIM_HZ);
    let mut app = App::new(config, reduced_motion, origin)?;
    app.layout(HEADLESS_COLS, HEADLESS_ROWS);

    let scatter_frame = frames / 2;
    let mut idle_frame = None;
    for frame in 0..frames {
        if frame == scatter_frame {
            app.set_mode(Mode::Scatter);
        }
        let now = origin + frame_offset(interval, frame);
        if app.pump(now) == Some(TickOutcome::Idle) {
            idle_frame = Some(frame);
        }
    }

    let summary = HeadlessSummary {
        frames,
        ticks: app.ticks,
        scatter_frame,
        idle_frame,
        final_active: app.field.active_count(),
        final_visible: app.surface.visible_count(),
    };
    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        scatter_frame = summary.scatter_frame,
        idle_frame = ?summary.idle_frame,
        final_active = summary.final_active,
        final_visible = summary.final_visible,
        "headless run completed"
    );
    Ok(summary)
}
