use std::{
    io::{Stdout, Write},
    time::{Duration, Instant},
};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, Stylize},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::Rng;

use crate::{
    animation::{AnimationKind, Animator, Step},
    data::Data,
    geometry::{CanvasTransform, Point, path_length, resample},
    matcher::UserStroke,
    mode::{ControllerEvent, Mode, ModeController, Stage, TestHint},
    quiz::QuizState,
};

const HEADER_ROWS: u16 = 5;
const FOOTER_ROWS: u16 = 2;
const SPEED_STEP: f64 = 0.25;
const BAR_WIDTH: usize = 20;

/// Where the drawing square sits on screen, in terminal cells.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Canvas {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
}

impl Canvas {
    /// Cells are roughly twice as tall as wide, so the square is twice as many
    /// columns as rows.
    fn layout(columns: u16, rows: u16) -> Self {
        let top = HEADER_ROWS + 1;
        let height = rows.saturating_sub(top + 1 + FOOTER_ROWS).max(4);
        let width = height
            .saturating_mul(2)
            .min(columns.saturating_sub(2))
            .max(8);
        Self {
            left: columns.saturating_sub(width) / 2,
            top,
            width,
            height,
        }
    }

    fn transform(&self) -> CanvasTransform {
        CanvasTransform {
            offset_x: self.left as f64,
            offset_y: self.top as f64,
            ..CanvasTransform::fit(self.width as f64, self.height as f64)
        }
    }

    fn contains(&self, column: u16, row: u16) -> bool {
        (self.left..self.left + self.width).contains(&column)
            && (self.top..self.top + self.height).contains(&row)
    }

    /// The middle of a cell, in logical space.
    fn to_logical(&self, column: u16, row: u16) -> Point {
        self.transform()
            .to_logical(Point::new(column as f64 + 0.5, row as f64 + 0.5))
    }

    fn cell(&self, logical: Point) -> Option<(u16, u16)> {
        let p = self.transform().to_canvas(logical);
        if p.x < 0.0 || p.y < 0.0 {
            return None;
        }
        let (column, row) = (p.x.floor() as u16, p.y.floor() as u16);
        self.contains(column, row).then_some((column, row))
    }

    /// Cells covered by the first `fraction` of `path`.
    fn cells(&self, path: &[Point], fraction: f64) -> Vec<(u16, u16)> {
        let t = self.transform();
        let step = (t.scale_x.min(t.scale_y) / 2.0).max(1.0);
        let n = ((path_length(path) / step).ceil() as usize).max(2);
        let keep = ((n as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize).min(n);
        let mut cells: Vec<(u16, u16)> = resample(path, n)
            .into_iter()
            .take(keep)
            .filter_map(|p| self.cell(p))
            .collect();
        cells.dedup();
        cells
    }
}

struct Playback {
    animator: Animator,
    shown: Vec<usize>,
    /// Stroke being drawn: index, when it started, how long it takes.
    current: Option<(usize, Instant, Duration)>,
    due: Instant,
}

fn countdown_bar(fraction: f64, remaining: Duration) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!(
        "[{}{}] {:.1}s",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        remaining.as_secs_f64()
    )
}

fn title(stdout: &mut Stdout, columns: u16) -> anyhow::Result<()> {
    let header_text = "HANZIDRILL";
    queue!(
        stdout,
        MoveTo(
            columns.saturating_sub(header_text.len().try_into().unwrap_or(u16::MAX)) / 2,
            0
        ),
        Print(header_text.red()),
    )?;
    Ok(())
}

struct Drill<'a, R: Rng> {
    controller: &'a mut ModeController<R>,
    data: &'a mut Data,
    canvas: Canvas,
    ink: Option<UserStroke>,
    playback: Option<Playback>,
    answer: String,
    tone: Option<u8>,
    verdict: Option<String>,
    message: String,
    finished: bool,
    quit: bool,
}

impl<'a, R: Rng> Drill<'a, R> {
    fn new(controller: &'a mut ModeController<R>, data: &'a mut Data) -> anyhow::Result<Self> {
        let (columns, rows) = terminal::size()?;
        Ok(Self {
            controller,
            data,
            canvas: Canvas::layout(columns, rows),
            ink: None,
            playback: None,
            answer: String::new(),
            tone: None,
            verdict: None,
            message: String::new(),
            finished: false,
            quit: false,
        })
    }

    fn run(&mut self, stdout: &mut Stdout) -> anyhow::Result<()> {
        let tick = self.controller.settings().tick();
        self.controller.start()?;
        self.drain();
        let mut last = Instant::now();
        while !self.quit {
            self.render(stdout)?;
            let timeout = self.playback.as_ref().map_or(tick, |p| {
                p.due.saturating_duration_since(Instant::now()).min(tick)
            });
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) => self.on_key(key)?,
                    Event::Mouse(mouse) => self.on_mouse(mouse),
                    Event::Resize(columns, rows) => self.canvas = Canvas::layout(columns, rows),
                    _ => {}
                }
            }
            let now = Instant::now();
            self.controller.tick(now - last);
            last = now;
            self.advance_playback(now);
            self.drain();
        }
        self.controller.leave();
        self.drain();
        Ok(())
    }

    fn drain(&mut self) {
        for event in self.controller.drain_events() {
            match event {
                ControllerEvent::StrokeAccepted(_) => self.message.clear(),
                ControllerEvent::Mistake => {
                    self.message = "Not quite, try that stroke again.".into()
                }
                ControllerEvent::Feedback(text) => self.message = text.into(),
                ControllerEvent::StageChanged(stage) => self.on_stage(stage),
                ControllerEvent::Result(result) => {
                    self.data.record(&result);
                    let outcome = if result.completed {
                        format!("{}: {} points", result.character, result.score)
                    } else {
                        format!("{}: no points", result.character)
                    };
                    self.message = match self.verdict.take() {
                        Some(verdict) => format!("{verdict} {outcome}"),
                        None => outcome,
                    };
                }
                ControllerEvent::Abandoned(result) => {
                    log::debug!("left {:?} unfinished", result.character);
                }
                ControllerEvent::TimeUp => self.verdict = Some("Time's up!".into()),
                ControllerEvent::RoundAdvanced(snapshot) => {
                    self.message = format!(
                        "Round {}: {} characters to go",
                        snapshot.current_round, snapshot.remaining
                    );
                }
                ControllerEvent::SessionComplete => self.finished = true,
            }
        }
    }

    fn on_stage(&mut self, stage: Stage) {
        self.ink = None;
        self.playback = None;
        if stage == Stage::Pinyin {
            self.answer.clear();
            self.tone = None;
            self.message = "How is it read? Type the pinyin and press Enter.".into();
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        let interrupt =
            key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if interrupt || key.code == KeyCode::Esc || self.finished {
            self.quit = true;
            return Ok(());
        }
        if self.controller.stage() == Some(Stage::Pinyin) {
            self.on_pinyin_key(key.code);
            return Ok(());
        }
        let speed = self.controller.speed();
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Char('h') if self.playback.is_none() => {
                if let Some(animator) = self.controller.hint() {
                    self.play(animator);
                }
            }
            KeyCode::Char('p') => {
                if let Some(playback) = &mut self.playback {
                    if matches!(playback.animator.kind(), AnimationKind::Demo { .. }) {
                        playback.animator.stop_handle().stop();
                        playback.due = Instant::now();
                    }
                } else if let Some(animator) = self.controller.demo(true) {
                    self.play(animator);
                }
            }
            KeyCode::Char('+' | '=') => speed.set(speed.get() + SPEED_STEP),
            KeyCode::Char('-') => speed.set(speed.get() - SPEED_STEP),
            KeyCode::Char('r') => {
                self.playback = None;
                self.controller.reset();
            }
            KeyCode::Char('s') => {
                self.playback = None;
                self.controller.skip_tracing();
            }
            KeyCode::Char('d') => self.controller.redraw(),
            KeyCode::Enter => self.controller.next()?,
            _ => {}
        }
        Ok(())
    }

    fn on_pinyin_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(c) if c.is_alphanumeric() || c == ':' => self.answer.push(c),
            KeyCode::Backspace => {
                self.answer.pop();
            }
            KeyCode::Tab => {
                self.tone = match self.tone {
                    None => Some(1),
                    Some(5) => None,
                    Some(t) => Some(t + 1),
                };
            }
            KeyCode::Enter => {
                let reading = self
                    .controller
                    .quiz()
                    .and_then(|q| q.reference().pinyin.clone())
                    .unwrap_or_default();
                if let Some(correct) = self.controller.submit_pinyin(&self.answer, self.tone) {
                    self.verdict = Some(if correct {
                        "Correct!".into()
                    } else {
                        format!("It is read {reading}.")
                    });
                }
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent) {
        if self.playback.is_some() || self.finished {
            return;
        }
        let point = self.canvas.to_logical(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if self.canvas.contains(mouse.column, mouse.row) {
                    self.ink = Some(UserStroke::new(vec![point]));
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(ink) = &mut self.ink {
                    ink.push(point);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(mut ink) = self.ink.take() {
                    ink.push(point);
                    self.controller.submit_stroke(&ink);
                }
            }
            _ => {}
        }
    }

    fn play(&mut self, animator: Animator) {
        self.ink = None;
        self.playback = Some(Playback {
            animator,
            shown: vec![],
            current: None,
            due: Instant::now(),
        });
    }

    fn advance_playback(&mut self, now: Instant) {
        let Some(playback) = &mut self.playback else {
            return;
        };
        while now >= playback.due {
            if let Some((index, ..)) = playback.current.take() {
                playback.shown.push(index);
            }
            match playback.animator.next_step() {
                Step::Clear => playback.shown.clear(),
                Step::Stroke { index, duration } => {
                    playback.current = Some((index, now, duration));
                    playback.due = now + duration;
                }
                Step::Pause(pause) => playback.due = now + pause,
                Step::Finished => {
                    self.playback = None;
                    self.controller.finish_animation();
                    return;
                }
            }
        }
    }

    fn plot(
        &self,
        stdout: &mut Stdout,
        path: &[Point],
        fraction: f64,
        ink: char,
        color: Color,
    ) -> anyhow::Result<()> {
        for (column, row) in self.canvas.cells(path, fraction) {
            queue!(stdout, MoveTo(column, row), Print(ink.with(color)))?;
        }
        Ok(())
    }

    fn frame(&self, stdout: &mut Stdout) -> anyhow::Result<()> {
        let Canvas {
            left,
            top,
            width,
            height,
        } = self.canvas;
        let edge = "─".repeat(width as usize);
        queue!(
            stdout,
            MoveTo(left.saturating_sub(1), top - 1),
            Print(format!("┌{edge}┐").dark_grey()),
            MoveTo(left.saturating_sub(1), top + height),
            Print(format!("└{edge}┘").dark_grey()),
        )?;
        for row in top..top + height {
            queue!(
                stdout,
                MoveTo(left.saturating_sub(1), row),
                Print("│".dark_grey()),
                MoveTo(left + width, row),
                Print("│".dark_grey()),
            )?;
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        let Some(quiz) = self.controller.quiz() else {
            return String::new();
        };
        let reference = quiz.reference();
        let stage = self.controller.stage();
        let glyph = if self.controller.mode() == Mode::Practice || stage == Some(Stage::Success) {
            reference.character.as_str()
        } else if self.controller.test_hint() == TestHint::None {
            "?"
        } else {
            "♪"
        };
        let reading = reference
            .pinyin
            .as_deref()
            .filter(|_| self.controller.reveal_pinyin() && stage != Some(Stage::Pinyin));
        match reading {
            Some(reading) => format!("{glyph}  {reading}"),
            None => glyph.to_string(),
        }
    }

    fn render(&self, stdout: &mut Stdout) -> anyhow::Result<()> {
        let (columns, rows) = terminal::size()?;
        queue!(stdout, Clear(ClearType::All))?;
        title(stdout, columns)?;

        if self.finished {
            queue!(
                stdout,
                MoveTo(0, 2),
                Print(format!(
                    "Every character mastered in {} rounds. Press any key to leave.",
                    self.controller.scheduler().current_round()
                )),
            )?;
            stdout.flush()?;
            return Ok(());
        }

        let snapshot = self.controller.snapshot();
        let quiz = self.controller.quiz();
        let watching = quiz.is_some_and(|q| matches!(q.state(), QuizState::Animating(_)));
        let stage = match self.controller.stage() {
            _ if watching => "watching",
            Some(Stage::Guided) => "trace it",
            Some(Stage::Memory) => "from memory",
            Some(Stage::Pinyin) => "pinyin",
            Some(Stage::Success) => "done",
            None => "loading",
        };
        queue!(
            stdout,
            MoveTo(0, 1),
            Print(format!(
                "{:?} · round {} · {} left · {stage} · speed {:.2}x",
                self.controller.mode(),
                snapshot.current_round,
                snapshot.remaining,
                self.controller.speed().get()
            )),
            MoveTo(0, 2),
            Print(self.prompt().bold()),
        )?;
        if let Some(quiz) = quiz {
            let streak = self
                .controller
                .scheduler()
                .progress(quiz.character())
                .map_or(0, |p| p.perfect_rounds);
            queue!(
                stdout,
                Print(format!(
                    "   mistakes {} · clean rounds {streak}/{}",
                    quiz.mistakes(),
                    self.controller.settings().mastery_threshold
                )),
            )?;
        }
        if let Some(countdown) = self.controller.countdown() {
            let bar = countdown_bar(countdown.fraction(), countdown.remaining());
            let color = if countdown.is_running() {
                Color::Yellow
            } else {
                Color::Red
            };
            queue!(stdout, Print("   "), Print(bar.with(color)))?;
        }
        queue!(stdout, MoveTo(0, 3), Print(self.message.as_str().green()))?;

        self.frame(stdout)?;
        if let Some(quiz) = quiz {
            let strokes = &quiz.reference().strokes;
            if self.controller.outline_visible() {
                for stroke in strokes {
                    self.plot(stdout, stroke, 1.0, '·', Color::DarkGrey)?;
                }
            }
            let written = if self.controller.stage() == Some(Stage::Success) {
                strokes.len()
            } else {
                quiz.expected_stroke().min(strokes.len())
            };
            for stroke in &strokes[..written] {
                self.plot(stdout, stroke, 1.0, '█', Color::White)?;
            }
            if let Some(playback) = &self.playback {
                for stroke in playback.shown.iter().filter_map(|&i| strokes.get(i)) {
                    self.plot(stdout, stroke, 1.0, '█', Color::Yellow)?;
                }
                let current = playback
                    .current
                    .and_then(|(i, started, duration)| Some((strokes.get(i)?, started, duration)));
                if let Some((stroke, started, duration)) = current {
                    let fraction =
                        started.elapsed().as_secs_f64() / duration.as_secs_f64().max(1e-3);
                    self.plot(stdout, stroke, fraction, '█', Color::Yellow)?;
                }
            }
        }
        if let Some(ink) = &self.ink {
            self.plot(stdout, &ink.points, 1.0, '•', Color::Cyan)?;
        }

        queue!(stdout, MoveTo(0, rows.saturating_sub(1)), Print(self.help().dark_grey()))?;
        stdout.flush()?;
        Ok(())
    }

    fn help(&self) -> String {
        if let Some(playback) = &self.playback {
            return match playback.animator.kind() {
                AnimationKind::Demo { .. } => format!(
                    "demo, pass {}   p: stop  +/-: speed",
                    playback.animator.loops() + 1
                ),
                AnimationKind::Hint { .. } => "hint   +/-: speed".to_string(),
            };
        }
        match self.controller.stage() {
            Some(Stage::Pinyin) => format!(
                "pinyin: {}_  tone: {}   Tab: pick tone  Enter: check  Esc: quit",
                self.answer,
                self.tone.map_or("-".to_string(), |t| t.to_string())
            ),
            Some(Stage::Success) => "Enter: next  d: draw again  q: quit".to_string(),
            _ if self.controller.can_animate() => {
                "h: hint  p: play/stop  +/-: speed  s: skip tracing  r: reset  q: quit".to_string()
            }
            _ => "r: reset  q: quit".to_string(),
        }
    }
}

/// Runs a drill in the alternate screen until the user quits or every character
/// is mastered. Scores land in `data`.
pub fn run_drill<R: Rng>(
    controller: &mut ModeController<R>,
    data: &mut Data,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, Hide)?;
    let result = Drill::new(controller, data).and_then(|mut drill| drill.run(&mut stdout));
    execute!(stdout, DisableMouseCapture, Show, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    result
}
