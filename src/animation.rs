//! Stroke-by-stroke playback for hints and full demonstrations.
//!
//! The [`Animator`] does not sleep or draw; it hands out [`Step`]s and the front end
//! performs them. Speed is read from a shared [`SpeedCell`] at every stroke boundary,
//! so a change made mid-playback applies to the next stroke without touching the
//! one being drawn.

use std::{cell::Cell, rc::Rc, time::Duration};

pub const MIN_SPEED: f64 = 0.75;
pub const MAX_SPEED: f64 = 3.5;

const STROKE_MS: f64 = 600.0;
const STROKE_PAUSE_MS: f64 = 150.0;
const MIN_STROKE_PAUSE_MS: f64 = 30.0;
const LOOP_PAUSE_MS: f64 = 400.0;
const MIN_LOOP_PAUSE_MS: f64 = 100.0;

/// Playback speed multiplier shared between the control surface and the player.
#[derive(Debug, Clone)]
pub struct SpeedCell(Rc<Cell<f64>>);

impl SpeedCell {
    pub fn new(speed: f64) -> Self {
        Self(Rc::new(Cell::new(speed.clamp(MIN_SPEED, MAX_SPEED))))
    }

    pub fn get(&self) -> f64 {
        self.0.get()
    }

    pub fn set(&self, speed: f64) {
        self.0.set(speed.clamp(MIN_SPEED, MAX_SPEED));
    }
}

impl Default for SpeedCell {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_micros((ms * 1000.0).round() as u64)
}

pub fn stroke_duration(speed: f64) -> Duration {
    millis(STROKE_MS / speed)
}

pub fn stroke_pause(speed: f64) -> Duration {
    millis((STROKE_PAUSE_MS / speed).max(MIN_STROKE_PAUSE_MS))
}

pub fn loop_pause(speed: f64) -> Duration {
    millis((LOOP_PAUSE_MS / speed).max(MIN_LOOP_PAUSE_MS))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnimationKind {
    /// Just the stroke the user is stuck on.
    Hint { stroke: usize },
    /// Every stroke in order, repeating while `looping`.
    Demo { looping: bool },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Step {
    /// Wipe whatever the previous loop drew.
    Clear,
    Stroke { index: usize, duration: Duration },
    Pause(Duration),
    Finished,
}

/// Clears the "still playing" flag of an [`Animator`] from outside.
#[derive(Debug, Clone)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug)]
pub struct Animator {
    kind: AnimationKind,
    stroke_count: usize,
    speed: SpeedCell,
    running: Rc<Cell<bool>>,
    next: usize,
    /// Whether the step after the next stroke should be a pause.
    pending_pause: bool,
    cleared: bool,
    loops: usize,
}

impl Animator {
    pub fn new(kind: AnimationKind, stroke_count: usize, speed: SpeedCell) -> Self {
        let next = match kind {
            AnimationKind::Hint { stroke } => stroke,
            AnimationKind::Demo { .. } => 0,
        };
        Self {
            kind,
            stroke_count,
            speed,
            running: Rc::new(Cell::new(true)),
            next,
            pending_pause: false,
            cleared: false,
            loops: 0,
        }
    }

    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.running.clone())
    }

    /// Completed passes through the character.
    pub fn loops(&self) -> usize {
        self.loops
    }

    pub fn next_step(&mut self) -> Step {
        if !self.running.get() {
            return Step::Finished;
        }
        let speed = self.speed.get();
        match self.kind {
            AnimationKind::Hint { stroke } => {
                if self.next == stroke && stroke < self.stroke_count {
                    self.next += 1;
                    return Step::Stroke {
                        index: stroke,
                        duration: stroke_duration(speed),
                    };
                }
                self.running.set(false);
                Step::Finished
            }
            AnimationKind::Demo { looping } => {
                if self.pending_pause {
                    self.pending_pause = false;
                    return Step::Pause(stroke_pause(speed));
                }
                if !self.cleared {
                    self.cleared = true;
                    return Step::Clear;
                }
                if self.next < self.stroke_count {
                    let index = self.next;
                    self.next += 1;
                    self.pending_pause = self.next < self.stroke_count;
                    return Step::Stroke {
                        index,
                        duration: stroke_duration(speed),
                    };
                }
                self.loops += 1;
                if looping && self.stroke_count > 0 {
                    self.next = 0;
                    self.cleared = false;
                    return Step::Pause(loop_pause(speed));
                }
                self.running.set(false);
                Step::Finished
            }
        }
    }
}
