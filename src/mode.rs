//! Mode rules layered over the quiz and the round scheduler: the practice stages,
//! test-mode hiding, and the time-attack countdown.

use std::{rc::Rc, time::Duration};

use clap::ValueEnum;
use rand::Rng;

use crate::{
    animation::{Animator, SpeedCell},
    character::{CharacterSource, DataError, LoadTicket, ReferenceCache, ReferenceCharacter},
    config::Settings,
    matcher::UserStroke,
    pinyin,
    quiz::{CancelReason, QuizEvent, QuizResult, QuizSession},
    scheduler::{RoundOutcome, RoundScheduler, RoundSnapshot},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Untimed, traced first and then written from memory.
    #[default]
    Practice,
    /// Character hidden from the start.
    Test,
    /// Character hidden, against the clock.
    TimeAttack,
}

/// What a test prompt gives away. Audio is played by the front end, if it can.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum TestHint {
    None,
    AudioOnly,
    #[default]
    AudioPinyin,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    Guided,
    Memory,
    Pinyin,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    StrokeAccepted(usize),
    Mistake,
    StageChanged(Stage),
    Feedback(&'static str),
    /// A scored attempt: finished, or timed out.
    Result(QuizResult),
    /// The user left mid-attempt. Not scored.
    Abandoned(QuizResult),
    TimeUp,
    RoundAdvanced(RoundSnapshot),
    SessionComplete,
}

/// Time-attack clock. Expiry is reported by exactly one [`Countdown::tick`].
#[derive(Debug, Clone)]
pub struct Countdown {
    limit: Duration,
    remaining: Duration,
    running: bool,
}

impl Countdown {
    pub fn start(limit: Duration) -> Self {
        Self {
            limit,
            remaining: limit,
            running: true,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Remaining time as a fraction of the limit.
    pub fn fraction(&self) -> f64 {
        if self.limit.is_zero() {
            return 0.0;
        }
        self.remaining.as_secs_f64() / self.limit.as_secs_f64()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn penalize(&mut self, penalty: Duration) {
        if self.running {
            self.remaining = self.remaining.saturating_sub(penalty);
        }
    }

    /// Returns `true` on the tick that runs the clock out, and never again.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if !self.running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.running = false;
            return true;
        }
        false
    }

    pub fn stop(&mut self) {
        self.running = false;
    }
}

/// The character currently on screen and everything about its current attempt.
struct Active {
    reference: Rc<ReferenceCharacter>,
    quiz: QuizSession,
    stage: Stage,
    countdown: Option<Countdown>,
    /// Mistakes that count towards the attempt's score.
    mistakes: u32,
    memory_mistakes: u32,
}

pub struct ModeController<R: Rng> {
    mode: Mode,
    test_hint: TestHint,
    settings: Settings,
    speed: SpeedCell,
    scheduler: RoundScheduler,
    source: Box<dyn CharacterSource>,
    cache: ReferenceCache,
    pending: Option<LoadTicket>,
    position: usize,
    active: Option<Active>,
    events: Vec<ControllerEvent>,
    rng: R,
}

impl<R: Rng> ModeController<R> {
    pub fn new(
        mode: Mode,
        settings: Settings,
        characters: &[String],
        source: Box<dyn CharacterSource>,
        rng: R,
    ) -> Self {
        let settings = settings.sanitized();
        let scheduler = RoundScheduler::with_policy(
            characters,
            settings.mastery_threshold,
            settings.shuffle_later_rounds,
        );
        Self {
            mode,
            test_hint: TestHint::default(),
            speed: SpeedCell::new(settings.animation_speed),
            settings,
            scheduler,
            source,
            cache: ReferenceCache::default(),
            pending: None,
            position: 0,
            active: None,
            events: vec![],
            rng,
        }
    }

    pub fn with_test_hint(mut self, hint: TestHint) -> Self {
        self.test_hint = hint;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn speed(&self) -> SpeedCell {
        self.speed.clone()
    }

    pub fn scheduler(&self) -> &RoundScheduler {
        &self.scheduler
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        self.scheduler.snapshot()
    }

    pub fn current_character(&self) -> Option<&str> {
        self.scheduler.queue().get(self.position).map(String::as_str)
    }

    pub fn quiz(&self) -> Option<&QuizSession> {
        self.active.as_ref().map(|a| &a.quiz)
    }

    pub fn stage(&self) -> Option<Stage> {
        self.active.as_ref().map(|a| a.stage)
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.active.as_ref().and_then(|a| a.countdown.as_ref())
    }

    pub fn outline_visible(&self) -> bool {
        self.mode == Mode::Practice && self.stage() == Some(Stage::Guided)
    }

    pub fn test_hint(&self) -> TestHint {
        self.test_hint
    }

    pub fn reveal_pinyin(&self) -> bool {
        match self.mode {
            Mode::Test => self.test_hint == TestHint::AudioPinyin,
            Mode::Practice | Mode::TimeAttack => true,
        }
    }

    pub fn can_animate(&self) -> bool {
        self.outline_visible()
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.events)
    }

    fn first_stage(&self) -> Stage {
        match self.mode {
            Mode::Practice => Stage::Guided,
            Mode::Test | Mode::TimeAttack => Stage::Memory,
        }
    }

    fn new_quiz(&self, reference: &Rc<ReferenceCharacter>) -> QuizSession {
        let mut quiz = QuizSession::new(reference.clone(), self.settings.leniency.factor());
        quiz.start();
        quiz
    }

    fn new_countdown(&self) -> Option<Countdown> {
        (self.mode == Mode::TimeAttack).then(|| Countdown::start(self.settings.time_limit()))
    }

    fn set_stage(&mut self, stage: Stage) {
        if let Some(active) = &mut self.active {
            active.stage = stage;
            log::info!("{:?} -> {stage:?}", active.reference.character);
            self.events.push(ControllerEvent::StageChanged(stage));
        }
    }

    /// Swaps in a fresh quiz for the same character at `stage`.
    fn restart_quiz(&mut self, stage: Stage) {
        let Some(active) = &self.active else {
            return;
        };
        let quiz = self.new_quiz(&active.reference);
        if let Some(active) = &mut self.active {
            active.quiz = quiz;
        }
        self.set_stage(stage);
    }

    /// Ends whatever is on screen. A live attempt is reported as abandoned.
    fn teardown(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if active.stage == Stage::Success {
            return;
        }
        if let Some(result) = active.quiz.cancel(CancelReason::Abandoned) {
            self.events.push(ControllerEvent::Abandoned(result));
        }
    }

    /// Loads every queued character up front so missing data surfaces before the
    /// drill starts.
    pub fn preload(&mut self) -> Result<(), DataError> {
        for c in self.scheduler.queue().to_vec() {
            self.cache.fetch(self.source.as_ref(), &c)?;
        }
        Ok(())
    }

    /// Tears down the current attempt and asks for the current character's data.
    /// `None` when the drill is over.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        self.teardown();
        let character = self.current_character()?.to_string();
        let ticket = self.cache.begin(&character);
        self.pending = Some(ticket.clone());
        Some(ticket)
    }

    /// Applies a finished load. Returns `Ok(false)` for a stale ticket, whose data
    /// is dropped.
    pub fn complete_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<ReferenceCharacter, DataError>,
    ) -> Result<bool, DataError> {
        if self.pending.as_ref() != Some(ticket) {
            log::warn!("ignoring load of {:?} for a previous character", ticket.character());
            return Ok(false);
        }
        self.pending = None;
        let Some(reference) = self.cache.finish(ticket, result)? else {
            return Ok(false);
        };
        self.activate(reference);
        Ok(true)
    }

    fn activate(&mut self, reference: Rc<ReferenceCharacter>) {
        let stage = self.first_stage();
        self.active = Some(Active {
            quiz: self.new_quiz(&reference),
            countdown: self.new_countdown(),
            reference,
            stage,
            mistakes: 0,
            memory_mistakes: 0,
        });
        self.events.push(ControllerEvent::StageChanged(stage));
    }

    /// Shows the current character, from cache when possible.
    pub fn load_current(&mut self) -> Result<(), DataError> {
        let Some(ticket) = self.begin_load() else {
            return Ok(());
        };
        if let Some(hit) = self.cache.get(ticket.character()) {
            self.pending = None;
            self.activate(hit);
            return Ok(());
        }
        let result = self.source.load(ticket.character());
        self.complete_load(&ticket, result)?;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), DataError> {
        self.position = 0;
        if self.scheduler.is_complete() {
            self.events.push(ControllerEvent::SessionComplete);
            return Ok(());
        }
        self.load_current()
    }

    pub fn submit_stroke(&mut self, stroke: &UserStroke) {
        let Some(active) = &mut self.active else {
            return;
        };
        if !matches!(active.stage, Stage::Guided | Stage::Memory) {
            return;
        }
        for event in active.quiz.submit_stroke(stroke) {
            match event {
                QuizEvent::StrokeAccepted(i) => {
                    self.events.push(ControllerEvent::StrokeAccepted(i))
                }
                QuizEvent::Mistake => {
                    self.events.push(ControllerEvent::Mistake);
                    self.on_mistake();
                }
                QuizEvent::Finished(result) => self.on_quiz_finished(result),
            }
        }
    }

    fn on_mistake(&mut self) {
        let penalty = self.settings.mistake_penalty();
        let Some(active) = &mut self.active else {
            return;
        };
        match (self.mode, active.stage) {
            (Mode::Practice, Stage::Memory) => {
                active.memory_mistakes += 1;
                active.mistakes += 1;
                self.events.push(ControllerEvent::Feedback("Incorrect! Review the character."));
                self.restart_quiz(Stage::Guided);
            }
            (Mode::TimeAttack, _) => {
                if let Some(countdown) = &mut active.countdown {
                    countdown.penalize(penalty);
                }
            }
            _ => {}
        }
    }

    fn on_quiz_finished(&mut self, result: QuizResult) {
        let chance = self.settings.pinyin_check_chance;
        let Some(active) = &mut self.active else {
            return;
        };
        match (self.mode, active.stage) {
            (Mode::Practice, Stage::Guided) => {
                self.events.push(ControllerEvent::Feedback("Perfect! Now try from memory."));
                self.restart_quiz(Stage::Memory);
            }
            (Mode::Practice, _) => {
                active.mistakes += result.mistakes;
                let has_reading = active.reference.pinyin.is_some();
                let check = has_reading
                    && (active.memory_mistakes > 0 || self.rng.random_bool(chance));
                if check {
                    self.set_stage(Stage::Pinyin);
                } else {
                    self.succeed();
                }
            }
            (Mode::Test | Mode::TimeAttack, _) => {
                active.mistakes += result.mistakes;
                if let Some(countdown) = &mut active.countdown {
                    countdown.stop();
                }
                self.succeed();
            }
        }
    }

    /// Grades the pinyin check. Either way the attempt moves on to success.
    pub fn submit_pinyin(&mut self, typed: &str, tone: Option<u8>) -> Option<bool> {
        let active = self.active.as_mut().filter(|a| a.stage == Stage::Pinyin)?;
        let reading = active.reference.pinyin.as_deref().unwrap_or_default();
        let correct = pinyin::check_pinyin(typed, tone, reading);
        if !correct {
            active.mistakes += 1;
            self.events.push(ControllerEvent::Mistake);
        }
        self.succeed();
        Some(correct)
    }

    fn succeed(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let result = QuizResult::completed(&active.reference.character, active.mistakes);
        if self
            .scheduler
            .record_attempt(&result.character, result.mistakes)
            .is_err()
        {
            log::error!("{:?} finished outside the drill", result.character);
        }
        self.events.push(ControllerEvent::Result(result));
        self.set_stage(Stage::Success);
    }

    /// Advances the clock. Running out cancels the attempt and scores it zero.
    pub fn tick(&mut self, elapsed: Duration) {
        let Some(active) = &mut self.active else {
            return;
        };
        let expired = active.countdown.as_mut().is_some_and(|c| c.tick(elapsed));
        if !expired {
            return;
        }
        let Some(result) = active.quiz.cancel(CancelReason::TimedOut) else {
            return;
        };
        if self
            .scheduler
            .record_attempt(&result.character, result.mistakes)
            .is_err()
        {
            log::error!("{:?} timed out outside the drill", result.character);
        }
        self.events.push(ControllerEvent::TimeUp);
        self.events.push(ControllerEvent::Result(result));
        self.set_stage(Stage::Success);
    }

    pub fn hint(&mut self) -> Option<Animator> {
        if !self.can_animate() {
            return None;
        }
        let speed = self.speed.clone();
        self.active.as_mut()?.quiz.hint(speed)
    }

    pub fn demo(&mut self, looping: bool) -> Option<Animator> {
        if !self.can_animate() {
            return None;
        }
        let speed = self.speed.clone();
        self.active.as_mut()?.quiz.demo(looping, speed)
    }

    pub fn finish_animation(&mut self) {
        if let Some(active) = &mut self.active {
            active.quiz.finish_animation();
        }
    }

    /// Practice only: go straight from tracing to writing from memory.
    pub fn skip_tracing(&mut self) {
        if self.mode == Mode::Practice && self.stage() == Some(Stage::Guided) {
            self.restart_quiz(Stage::Memory);
        }
    }

    /// Starts the current stage over. The clock restarts too.
    pub fn reset(&mut self) {
        let countdown = self.new_countdown();
        let Some(active) = &mut self.active else {
            return;
        };
        if !matches!(active.stage, Stage::Guided | Stage::Memory) {
            return;
        }
        active.countdown = countdown;
        let stage = active.stage;
        self.restart_quiz(stage);
    }

    /// From success: another full attempt at the same character.
    pub fn redraw(&mut self) {
        if self.stage() != Some(Stage::Success) {
            return;
        }
        if let Some(reference) = self.active.take().map(|a| a.reference) {
            self.activate(reference);
        }
    }

    /// From success: the next queued character, or the next round.
    pub fn next(&mut self) -> Result<(), DataError> {
        if self.stage() != Some(Stage::Success) {
            return Ok(());
        }
        self.position += 1;
        if self.position >= self.scheduler.queue().len() {
            self.position = 0;
            match self.scheduler.advance_round(&mut self.rng) {
                RoundOutcome::Next { round, queue } => {
                    log::debug!("round {round} order: {queue:?}");
                    self.events
                        .push(ControllerEvent::RoundAdvanced(self.scheduler.snapshot()));
                }
                RoundOutcome::SessionComplete => {
                    self.active = None;
                    self.events.push(ControllerEvent::SessionComplete);
                    return Ok(());
                }
            }
        }
        self.load_current()
    }

    /// Leaves the drill, abandoning whatever is in progress.
    pub fn leave(&mut self) {
        self.teardown();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        animation::Step,
        geometry::Point,
        matcher::tests::{backwards, shi, sloppy},
    };

    struct Fixed(HashMap<String, ReferenceCharacter>);

    impl CharacterSource for Fixed {
        fn load(&self, character: &str) -> Result<ReferenceCharacter, DataError> {
            self.0
                .get(character)
                .cloned()
                .ok_or_else(|| DataError::NotFound {
                    character: character.to_string(),
                })
        }
    }

    fn yi() -> ReferenceCharacter {
        ReferenceCharacter::new(
            "一",
            vec![vec![Point::new(100.0, 500.0), Point::new(920.0, 500.0)]],
            Some("yī".into()),
        )
        .unwrap()
    }

    fn source() -> Box<dyn CharacterSource> {
        Box::new(Fixed(HashMap::from([
            ("十".to_string(), shi()),
            ("一".to_string(), yi()),
        ])))
    }

    fn controller(mode: Mode, chars: &[&str], settings: Settings) -> ModeController<StdRng> {
        let chars: Vec<String> = chars.iter().map(|c| c.to_string()).collect();
        let rng = StdRng::seed_from_u64(42);
        let mut c = ModeController::new(mode, settings, &chars, source(), rng);
        c.start().unwrap();
        c
    }

    fn write_correctly(c: &mut ModeController<StdRng>) {
        let reference = c.quiz().unwrap().reference().clone();
        for stroke in &reference.strokes {
            c.submit_stroke(&sloppy(stroke, 5.0));
        }
    }

    fn results(events: &[ControllerEvent]) -> Vec<QuizResult> {
        events
            .iter()
            .filter_map(|e| match e {
                ControllerEvent::Result(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    fn no_pinyin() -> Settings {
        Settings {
            pinyin_check_chance: 0.0,
            ..Settings::default()
        }
    }

    #[test]
    pub fn guided_then_memory_then_success() {
        let mut c = controller(Mode::Practice, &["十"], no_pinyin());
        assert_eq!(c.stage(), Some(Stage::Guided));
        assert!(c.outline_visible());

        write_correctly(&mut c);
        let events = c.drain_events();
        assert!(results(&events).is_empty());
        assert_eq!(c.stage(), Some(Stage::Memory));
        assert!(!c.outline_visible());
        assert_eq!(c.quiz().unwrap().expected_stroke(), 0);

        write_correctly(&mut c);
        let events = c.drain_events();
        assert_eq!(results(&events), vec![QuizResult::completed("十", 0)]);
        assert_eq!(c.stage(), Some(Stage::Success));
        assert!(c.scheduler().unattempted().is_empty());
    }

    #[test]
    pub fn guided_mistakes_do_not_count() {
        let mut c = controller(Mode::Practice, &["十"], no_pinyin());
        c.submit_stroke(&backwards(&shi().strokes[0]));
        assert_eq!(c.stage(), Some(Stage::Guided));
        write_correctly(&mut c);
        write_correctly(&mut c);
        let events = c.drain_events();
        assert_eq!(results(&events), vec![QuizResult::completed("十", 0)]);
    }

    #[test]
    pub fn memory_mistake_demotes_and_forces_pinyin() {
        let mut c = controller(Mode::Practice, &["十"], no_pinyin());
        write_correctly(&mut c);
        c.submit_stroke(&backwards(&shi().strokes[0]));
        assert_eq!(c.stage(), Some(Stage::Guided));
        let feedback = ControllerEvent::Feedback("Incorrect! Review the character.");
        assert!(c.drain_events().contains(&feedback));

        write_correctly(&mut c);
        write_correctly(&mut c);
        assert_eq!(c.stage(), Some(Stage::Pinyin));
        c.drain_events();
        c.submit_stroke(&sloppy(&shi().strokes[0], 0.0));
        assert!(c.drain_events().is_empty());

        assert_eq!(c.submit_pinyin("shi4", None), Some(false));
        let events = c.drain_events();
        assert_eq!(results(&events), vec![QuizResult::completed("十", 2)]);
        assert_eq!(results(&events)[0].score, 90);
        assert_eq!(c.stage(), Some(Stage::Success));
        assert_eq!(c.submit_pinyin("shi2", None), None);
    }

    #[test]
    pub fn out_of_range_settings_are_repaired() {
        let settings = Settings {
            pinyin_check_chance: 1.5,
            time_limit_secs: 1e30,
            ..Settings::default()
        };
        let mut c = controller(Mode::Practice, &["十"], settings);
        assert_eq!(c.settings().pinyin_check_chance, 0.3);
        assert_eq!(c.settings().time_limit_secs, 3600.0);
        write_correctly(&mut c);
        write_correctly(&mut c);
        assert!(matches!(c.stage(), Some(Stage::Pinyin | Stage::Success)));
    }

    #[test]
    pub fn clean_memory_always_checks_pinyin_at_full_chance() {
        let settings = Settings {
            pinyin_check_chance: 1.0,
            ..Settings::default()
        };
        let mut c = controller(Mode::Practice, &["十"], settings);
        write_correctly(&mut c);
        write_correctly(&mut c);
        assert_eq!(c.stage(), Some(Stage::Pinyin));
        assert_eq!(c.submit_pinyin("shi", Some(2)), Some(true));
        let events = c.drain_events();
        assert_eq!(results(&events), vec![QuizResult::completed("十", 0)]);
    }

    #[test]
    pub fn skip_tracing_goes_to_memory() {
        let mut c = controller(Mode::Practice, &["十"], no_pinyin());
        c.skip_tracing();
        assert_eq!(c.stage(), Some(Stage::Memory));
        write_correctly(&mut c);
        assert_eq!(c.stage(), Some(Stage::Success));
    }

    #[test]
    pub fn hints_only_while_tracing() {
        let mut c = controller(Mode::Practice, &["十"], no_pinyin());
        let mut anim = c.hint().unwrap();
        assert!(matches!(anim.next_step(), Step::Stroke { index: 0, .. }));
        c.finish_animation();
        c.skip_tracing();
        assert!(c.hint().is_none());

        let mut t = controller(Mode::Test, &["十"], no_pinyin());
        assert!(t.demo(true).is_none());
    }

    #[test]
    pub fn test_mode_scores_directly() {
        let mut c =
            controller(Mode::Test, &["十"], no_pinyin()).with_test_hint(TestHint::AudioOnly);
        assert_eq!(c.stage(), Some(Stage::Memory));
        assert!(!c.outline_visible());
        assert!(!c.reveal_pinyin());
        c.submit_stroke(&backwards(&shi().strokes[0]));
        assert_eq!(c.stage(), Some(Stage::Memory));
        write_correctly(&mut c);
        let events = c.drain_events();
        assert_eq!(results(&events), vec![QuizResult::completed("十", 1)]);
    }

    #[test]
    pub fn time_attack_expiry_reports_once() {
        let mut c = controller(Mode::TimeAttack, &["十"], Settings::default());
        let tick = Duration::from_millis(100);
        let mut elapsed = Duration::ZERO;
        let mut all = vec![];
        for step in 1..=200u32 {
            if step == 10 || step == 20 || step == 30 {
                c.submit_stroke(&backwards(&shi().strokes[0]));
            }
            c.tick(tick);
            elapsed += tick;
            let events = c.drain_events();
            if !results(&events).is_empty() {
                assert!(elapsed <= Duration::from_millis(6500));
            }
            all.extend(events);
        }
        assert_eq!(
            results(&all),
            vec![QuizResult {
                character: "十".into(),
                mistakes: crate::quiz::TIMEOUT_MISTAKES,
                completed: false,
                score: 0,
            }]
        );
        assert_eq!(all.iter().filter(|e| **e == ControllerEvent::TimeUp).count(), 1);
        assert!(!c.countdown().unwrap().is_running());
        assert_eq!(c.countdown().unwrap().remaining(), Duration::ZERO);
        assert_eq!(c.stage(), Some(Stage::Success));
    }

    #[test]
    pub fn finishing_in_time_stops_the_clock() {
        let mut c = controller(Mode::TimeAttack, &["十"], Settings::default());
        c.tick(Duration::from_secs(2));
        write_correctly(&mut c);
        let left = c.countdown().unwrap().remaining();
        c.tick(Duration::from_secs(20));
        let events = c.drain_events();
        assert_eq!(results(&events), vec![QuizResult::completed("十", 0)]);
        assert!(!events.contains(&ControllerEvent::TimeUp));
        assert_eq!(c.countdown().unwrap().remaining(), left);
    }

    #[test]
    pub fn countdown_penalties() {
        let mut clock = Countdown::start(Duration::from_secs(10));
        clock.penalize(Duration::from_millis(1200));
        assert_eq!(clock.remaining(), Duration::from_millis(8800));
        assert!(!clock.tick(Duration::from_millis(8700)));
        assert!(clock.tick(Duration::from_millis(100)));
        assert!(!clock.tick(Duration::from_millis(100)));
        assert!(!clock.is_running());
    }

    #[test]
    pub fn rounds_run_until_mastered() {
        let mut c = controller(Mode::Test, &["十", "一"], no_pinyin());
        let mut rounds = 0;
        loop {
            write_correctly(&mut c);
            c.next().unwrap();
            let events = c.drain_events();
            if events.iter().any(|e| matches!(e, ControllerEvent::RoundAdvanced(_))) {
                rounds += 1;
            }
            if events.contains(&ControllerEvent::SessionComplete) {
                break;
            }
            assert!(rounds < 5, "drill should end after two clean rounds");
        }
        assert_eq!(rounds, 1);
        assert!(c.quiz().is_none());
    }

    #[test]
    pub fn redraw_stays_in_round() {
        let mut c = controller(Mode::Practice, &["十", "一"], no_pinyin());
        write_correctly(&mut c);
        write_correctly(&mut c);
        c.redraw();
        assert_eq!(c.stage(), Some(Stage::Guided));
        assert_eq!(c.current_character(), Some("十"));
        assert_eq!(c.snapshot().remaining, 1);
    }

    #[test]
    pub fn leaving_abandons_live_attempt() {
        let mut c = controller(Mode::Test, &["十"], no_pinyin());
        c.submit_stroke(&backwards(&shi().strokes[0]));
        c.drain_events();
        c.leave();
        let events = c.drain_events();
        assert_eq!(
            events,
            vec![ControllerEvent::Abandoned(QuizResult::cancelled("十", 1))]
        );
        assert!(c.quiz().is_none());
    }

    #[test]
    pub fn stale_load_is_ignored() {
        let mut c = controller(Mode::Test, &["十", "一"], no_pinyin());
        let old = c.begin_load().unwrap();
        let current = c.begin_load().unwrap();
        assert!(!c.complete_load(&old, Ok(shi())).unwrap());
        assert!(c.quiz().is_none());
        assert!(c.complete_load(&current, Ok(shi())).unwrap());
        assert!(c.quiz().is_some());
    }

    #[test]
    pub fn missing_data_is_fatal() {
        let chars = vec!["十".to_string(), "龍".to_string()];
        let mut c = ModeController::new(
            Mode::Practice,
            Settings::default(),
            &chars,
            source(),
            StdRng::seed_from_u64(0),
        );
        assert!(matches!(
            c.preload(),
            Err(DataError::NotFound { character }) if character == "龍"
        ));
    }
}
