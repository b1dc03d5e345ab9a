//! The per-character quiz: stroke progression, mistakes, hints and demos.

use std::rc::Rc;

use serde::Serialize;

use crate::{
    animation::{AnimationKind, Animator, SpeedCell, StopHandle},
    character::ReferenceCharacter,
    matcher::{self, Rejection, UserStroke},
};

/// Mistakes reported for an attempt that ran out of time.
pub const TIMEOUT_MISTAKES: u32 = 10;
const POINTS_PER_MISTAKE: u32 = 5;

pub fn score(mistakes: u32) -> u32 {
    100u32.saturating_sub(mistakes.saturating_mul(POINTS_PER_MISTAKE))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizResult {
    pub character: String,
    pub mistakes: u32,
    pub completed: bool,
    pub score: u32,
}

impl QuizResult {
    pub fn completed(character: &str, mistakes: u32) -> Self {
        Self {
            character: character.to_string(),
            mistakes,
            completed: true,
            score: score(mistakes),
        }
    }

    pub fn cancelled(character: &str, mistakes: u32) -> Self {
        Self {
            character: character.to_string(),
            mistakes,
            completed: false,
            score: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuizState {
    Idle,
    AwaitingStroke,
    Animating(AnimationKind),
    Completed,
    Cancelled,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The user left or switched characters.
    Abandoned,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    StrokeAccepted(usize),
    Mistake,
    Finished(QuizResult),
}

/// One attempt at one character. Never reused: redoing a character means a new
/// session.
#[derive(Debug)]
pub struct QuizSession {
    reference: Rc<ReferenceCharacter>,
    leniency: f64,
    expected: usize,
    mistakes: u32,
    state: QuizState,
    animation: Option<StopHandle>,
}

impl QuizSession {
    pub fn new(reference: Rc<ReferenceCharacter>, leniency: f64) -> Self {
        Self {
            reference,
            leniency,
            expected: 0,
            mistakes: 0,
            state: QuizState::Idle,
            animation: None,
        }
    }

    pub fn character(&self) -> &str {
        &self.reference.character
    }

    pub fn reference(&self) -> &ReferenceCharacter {
        &self.reference
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn expected_stroke(&self) -> usize {
        self.expected
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    pub fn stroke_count(&self) -> usize {
        self.reference.stroke_count()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, QuizState::Completed | QuizState::Cancelled)
    }

    /// Whether drawn strokes are currently being graded.
    pub fn is_live(&self) -> bool {
        self.state == QuizState::AwaitingStroke
    }

    pub fn start(&mut self) {
        if self.state != QuizState::Idle {
            return;
        }
        self.restart();
    }

    fn restart(&mut self) {
        self.expected = 0;
        self.mistakes = 0;
        self.state = QuizState::AwaitingStroke;
    }

    /// Grades one finished stroke. Taps and strokes arriving while the session is
    /// not live produce no events.
    pub fn submit_stroke(&mut self, stroke: &UserStroke) -> Vec<QuizEvent> {
        if !self.is_live() || stroke.is_tap() {
            return vec![];
        }
        let result = matcher::match_stroke(stroke, &self.reference, self.expected, self.leniency);
        if result.accepted {
            self.expected += 1;
            let mut events = vec![QuizEvent::StrokeAccepted(result.matched_stroke_index)];
            if self.expected == self.stroke_count() {
                self.state = QuizState::Completed;
                log::info!(
                    "completed {:?} with {} mistakes",
                    self.character(),
                    self.mistakes
                );
                events.push(QuizEvent::Finished(QuizResult::completed(
                    self.character(),
                    self.mistakes,
                )));
            }
            return events;
        }
        if result.is_mistake() {
            self.mistakes += 1;
            if let Some(Rejection::Mismatch {
                deviation,
                similarity,
            }) = result.rejection
            {
                log::info!(
                    "mistake on stroke {} of {:?}: off by {deviation:.1}, cos {similarity:.2}",
                    self.expected,
                    self.character()
                );
            }
            return vec![QuizEvent::Mistake];
        }
        if result.rejection == Some(Rejection::AlreadyComplete) {
            log::warn!(
                "stroke submitted to {:?} past its last stroke",
                self.character()
            );
        }
        vec![]
    }

    fn animate(&mut self, kind: AnimationKind, speed: SpeedCell) -> Option<Animator> {
        if !matches!(self.state, QuizState::Idle | QuizState::AwaitingStroke) {
            return None;
        }
        let animator = Animator::new(kind, self.stroke_count(), speed);
        self.animation = Some(animator.stop_handle());
        self.state = QuizState::Animating(kind);
        Some(animator)
    }

    /// Plays the stroke the user is stuck on. Progress is kept.
    pub fn hint(&mut self, speed: SpeedCell) -> Option<Animator> {
        let stroke = self.expected.min(self.stroke_count().saturating_sub(1));
        self.animate(AnimationKind::Hint { stroke }, speed)
    }

    /// Plays every stroke in order; finishing it restarts the quiz.
    pub fn demo(&mut self, looping: bool, speed: SpeedCell) -> Option<Animator> {
        self.animate(AnimationKind::Demo { looping }, speed)
    }

    /// Ends the running animation, whether it played out or was stopped.
    pub fn finish_animation(&mut self) {
        let QuizState::Animating(kind) = self.state else {
            return;
        };
        if let Some(handle) = self.animation.take() {
            if handle.is_running() {
                log::debug!("{kind:?} on {:?} stopped early", self.character());
            }
            handle.stop();
        }
        match kind {
            AnimationKind::Hint { .. } => self.state = QuizState::AwaitingStroke,
            AnimationKind::Demo { .. } => self.restart(),
        }
    }

    /// Tears the session down. Returns the result only the first time.
    pub fn cancel(&mut self, reason: CancelReason) -> Option<QuizResult> {
        if self.is_finished() {
            return None;
        }
        if let Some(handle) = self.animation.take() {
            handle.stop();
        }
        self.state = QuizState::Cancelled;
        let mistakes = match reason {
            CancelReason::Abandoned => self.mistakes,
            CancelReason::TimedOut => TIMEOUT_MISTAKES,
        };
        log::info!("cancelled {:?} ({reason:?})", self.character());
        Some(QuizResult::cancelled(self.character(), mistakes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        animation::Step,
        matcher::tests::{backwards, shi, sloppy},
    };

    fn session() -> QuizSession {
        let mut quiz = QuizSession::new(Rc::new(shi()), 1.0);
        quiz.start();
        quiz
    }

    #[test]
    pub fn scoring() {
        assert_eq!(score(0), 100);
        assert_eq!(score(1), 95);
        assert_eq!(score(19), 5);
        assert_eq!(score(20), 0);
        assert_eq!(score(u32::MAX), 0);
    }

    #[test]
    pub fn shi_with_one_mistake() {
        let mut quiz = session();
        let reference = shi();
        assert_eq!(quiz.state(), QuizState::AwaitingStroke);

        assert_eq!(
            quiz.submit_stroke(&sloppy(&reference.strokes[0], 10.0)),
            vec![QuizEvent::StrokeAccepted(0)]
        );
        assert_eq!(quiz.expected_stroke(), 1);

        assert_eq!(
            quiz.submit_stroke(&backwards(&reference.strokes[1])),
            vec![QuizEvent::Mistake]
        );
        assert_eq!(quiz.expected_stroke(), 1);
        assert_eq!(quiz.mistakes(), 1);

        let events = quiz.submit_stroke(&sloppy(&reference.strokes[1], -10.0));
        assert_eq!(
            events,
            vec![
                QuizEvent::StrokeAccepted(1),
                QuizEvent::Finished(QuizResult {
                    character: "十".into(),
                    mistakes: 1,
                    completed: true,
                    score: 95,
                })
            ]
        );
        assert_eq!(quiz.state(), QuizState::Completed);
        assert!(quiz.submit_stroke(&sloppy(&reference.strokes[1], 0.0)).is_empty());
        assert_eq!(quiz.cancel(CancelReason::Abandoned), None);
    }

    #[test]
    pub fn index_never_goes_back() {
        let mut quiz = session();
        let reference = shi();
        let mut last = quiz.expected_stroke();
        let attempts = [
            backwards(&reference.strokes[0]),
            sloppy(&reference.strokes[1], 0.0),
            sloppy(&reference.strokes[0], 0.0),
            backwards(&reference.strokes[1]),
            sloppy(&reference.strokes[0], 0.0),
        ];
        for stroke in &attempts {
            let events = quiz.submit_stroke(stroke);
            let now = quiz.expected_stroke();
            assert!(now >= last);
            assert_eq!(now > last, events.contains(&QuizEvent::StrokeAccepted(last)));
            last = now;
        }
        assert_eq!(quiz.mistakes(), 4);
    }

    #[test]
    pub fn taps_are_not_mistakes() {
        let mut quiz = session();
        let tap = UserStroke::new(vec![shi().strokes[0][0]]);
        assert!(quiz.submit_stroke(&tap).is_empty());
        let p = shi().strokes[0][0];
        assert!(quiz.submit_stroke(&UserStroke::new(vec![p, p, p])).is_empty());
        assert_eq!(quiz.mistakes(), 0);
        assert_eq!(quiz.expected_stroke(), 0);
    }

    #[test]
    pub fn idle_session_ignores_strokes() {
        let mut quiz = QuizSession::new(Rc::new(shi()), 1.0);
        assert!(quiz.submit_stroke(&sloppy(&shi().strokes[0], 0.0)).is_empty());
        assert_eq!(quiz.state(), QuizState::Idle);
    }

    #[test]
    pub fn hint_keeps_progress() {
        let mut quiz = session();
        let reference = shi();
        quiz.submit_stroke(&sloppy(&reference.strokes[0], 0.0));
        quiz.submit_stroke(&backwards(&reference.strokes[1]));

        let mut anim = quiz.hint(SpeedCell::default()).unwrap();
        assert_eq!(quiz.state(), QuizState::Animating(AnimationKind::Hint { stroke: 1 }));
        assert!(matches!(anim.next_step(), Step::Stroke { index: 1, .. }));
        // not graded while animating
        assert!(quiz.submit_stroke(&sloppy(&reference.strokes[1], 0.0)).is_empty());
        quiz.finish_animation();

        assert_eq!(quiz.state(), QuizState::AwaitingStroke);
        assert_eq!(quiz.expected_stroke(), 1);
        assert_eq!(quiz.mistakes(), 1);
    }

    #[test]
    pub fn stopping_demo_restarts_quiz() {
        let mut quiz = session();
        let reference = shi();
        quiz.submit_stroke(&sloppy(&reference.strokes[0], 0.0));
        quiz.submit_stroke(&backwards(&reference.strokes[1]));

        let mut anim = quiz.demo(true, SpeedCell::default()).unwrap();
        anim.next_step();
        quiz.finish_animation();
        assert_eq!(anim.next_step(), Step::Finished);
        assert_eq!(quiz.state(), QuizState::AwaitingStroke);
        assert_eq!(quiz.expected_stroke(), 0);
        assert_eq!(quiz.mistakes(), 0);
    }

    #[test]
    pub fn cancel_reports_once() {
        let mut quiz = session();
        quiz.submit_stroke(&backwards(&shi().strokes[0]));
        let result = quiz.cancel(CancelReason::Abandoned).unwrap();
        assert_eq!(result, QuizResult::cancelled("十", 1));
        assert_eq!(result.score, 0);
        assert_eq!(quiz.cancel(CancelReason::TimedOut), None);
        assert!(quiz.hint(SpeedCell::default()).is_none());
    }

    #[test]
    pub fn timeout_uses_sentinel() {
        let mut quiz = session();
        let mut anim = quiz.demo(true, SpeedCell::default()).unwrap();
        let result = quiz.cancel(CancelReason::TimedOut).unwrap();
        assert_eq!(result.mistakes, TIMEOUT_MISTAKES);
        assert!(!result.completed);
        assert_eq!(anim.next_step(), Step::Finished);
    }
}
