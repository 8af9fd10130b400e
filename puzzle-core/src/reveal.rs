use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::VariantUrls;
use crate::guess::{judge_guess, GuessVerdict};
use crate::scramble::Variant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Grid15,
    Grid10,
    Grid5,
    Answer,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Grid15 => Some(Phase::Grid10),
            Phase::Grid10 => Some(Phase::Grid5),
            Phase::Grid5 => Some(Phase::Answer),
            Phase::Answer => None,
        }
    }

    pub fn variant(self) -> Variant {
        match self {
            Phase::Grid15 => Variant::Grid15,
            Phase::Grid10 => Variant::Grid10,
            Phase::Grid5 => Variant::Grid5,
            Phase::Answer => Variant::Original,
        }
    }

    pub fn accepts_guesses(self) -> bool {
        !matches!(self, Phase::Answer)
    }
}

/// Seconds spent in each phase of a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseDurations {
    #[serde(rename = "duration15x15")]
    pub grid15: u32,
    #[serde(rename = "duration10x10")]
    pub grid10: u32,
    #[serde(rename = "duration5x5")]
    pub grid5: u32,
    #[serde(rename = "durationAnswer")]
    pub answer: u32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            grid15: 10,
            grid10: 10,
            grid5: 5,
            answer: 5,
        }
    }
}

impl PhaseDurations {
    pub fn for_phase(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Grid15 => self.grid15,
            Phase::Grid10 => self.grid10,
            Phase::Grid5 => self.grid5,
            Phase::Answer => self.answer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Round {
    pub answer: String,
    #[serde(flatten)]
    pub urls: VariantUrls,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    AwaitingStart,
    Playing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRecord {
    pub round: usize,
    pub guess: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SessionEvent {
    RoundStarted { round: usize },
    PhaseChanged { round: usize, phase: Phase, seconds: u32 },
    GuessJudged { round: usize, guess: String, verdict: GuessVerdict },
    SessionCompleted { score: u32, total: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("game has no rounds")]
    NoRounds,
    #[error("session already started")]
    AlreadyStarted,
    #[error("not accepting guesses")]
    NotAcceptingGuesses,
}

/// One playthrough: the timed reveal of every round plus the running score.
///
/// Ticks and guesses must be applied one at a time; a host with several
/// threads keeps the session behind a lock.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    rounds: Vec<Round>,
    durations: PhaseDurations,
    status: SessionStatus,
    round: usize,
    phase: Phase,
    remaining: u32,
    score: u32,
    answers: Vec<AnswerRecord>,
}

impl Session {
    pub fn new(rounds: Vec<Round>, durations: PhaseDurations) -> Result<Self, SessionError> {
        if rounds.is_empty() {
            return Err(SessionError::NoRounds);
        }
        Ok(Self {
            rounds,
            durations,
            status: SessionStatus::AwaitingStart,
            round: 0,
            phase: Phase::Grid15,
            remaining: durations.grid15,
            score: 0,
            answers: Vec::new(),
        })
    }

    pub fn start(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        if self.status != SessionStatus::AwaitingStart {
            return Err(SessionError::AlreadyStarted);
        }
        self.status = SessionStatus::Playing;
        let mut events = Vec::new();
        self.enter_round(0, &mut events);
        self.skip_empty_phases(&mut events);
        Ok(events)
    }

    /// Advances the clock by one second. Ignored unless the session is playing.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status != SessionStatus::Playing {
            return events;
        }
        self.remaining = self.remaining.saturating_sub(1);
        self.skip_empty_phases(&mut events);
        events
    }

    /// Judges a guess against the current round. A correct guess scores and
    /// jumps straight to the answer reveal; anything else leaves the clock
    /// alone.
    pub fn submit_guess(
        &mut self,
        guess: &str,
    ) -> Result<(GuessVerdict, Vec<SessionEvent>), SessionError> {
        if self.status != SessionStatus::Playing || !self.phase.accepts_guesses() {
            return Err(SessionError::NotAcceptingGuesses);
        }

        let verdict = judge_guess(guess, &self.rounds[self.round].answer);
        let correct = verdict.is_correct();
        self.answers.push(AnswerRecord {
            round: self.round,
            guess: guess.to_string(),
            correct,
        });

        let mut events = vec![SessionEvent::GuessJudged {
            round: self.round,
            guess: guess.to_string(),
            verdict,
        }];
        if correct {
            self.score += 1;
            self.enter_phase(Phase::Answer, &mut events);
            self.skip_empty_phases(&mut events);
        }
        Ok((verdict, events))
    }

    /// Back to the pre-start state with every round and the score reset.
    pub fn restart(&mut self) {
        self.status = SessionStatus::AwaitingStart;
        self.round = 0;
        self.phase = Phase::Grid15;
        self.remaining = self.durations.grid15;
        self.score = 0;
        self.answers.clear();
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn round_index(&self) -> usize {
        self.round
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn current_round(&self) -> &Round {
        &self.rounds[self.round]
    }

    pub fn current_image_url(&self) -> &str {
        self.current_round().urls.url(self.phase.variant())
    }

    fn enter_round(&mut self, index: usize, events: &mut Vec<SessionEvent>) {
        self.round = index;
        events.push(SessionEvent::RoundStarted { round: index });
        self.enter_phase(Phase::Grid15, events);
    }

    fn enter_phase(&mut self, phase: Phase, events: &mut Vec<SessionEvent>) {
        self.phase = phase;
        self.remaining = self.durations.for_phase(phase);
        events.push(SessionEvent::PhaseChanged {
            round: self.round,
            phase,
            seconds: self.remaining,
        });
    }

    // Fires transitions until the clock shows time left or the session ends,
    // so a zero-second phase is passed through rather than stuck on.
    fn skip_empty_phases(&mut self, events: &mut Vec<SessionEvent>) {
        while self.status == SessionStatus::Playing && self.remaining == 0 {
            match self.phase.next() {
                Some(next) => self.enter_phase(next, events),
                None if self.round + 1 < self.rounds.len() => {
                    self.enter_round(self.round + 1, events)
                }
                None => {
                    self.status = SessionStatus::Completed;
                    events.push(SessionEvent::SessionCompleted {
                        score: self.score,
                        total: self.rounds.len(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(answer: &str) -> Round {
        let slug = answer.to_lowercase().replace(' ', "-");
        Round {
            answer: answer.to_string(),
            urls: VariantUrls {
                original_url: format!("/blobs/original/{slug}"),
                grid15_url: format!("/blobs/grid15/{slug}"),
                grid10_url: format!("/blobs/grid10/{slug}"),
                grid5_url: format!("/blobs/grid5/{slug}"),
            },
        }
    }

    fn durations() -> PhaseDurations {
        PhaseDurations {
            grid15: 10,
            grid10: 8,
            grid5: 5,
            answer: 3,
        }
    }

    fn started(answers: &[&str]) -> Session {
        let mut session =
            Session::new(answers.iter().map(|a| round(a)).collect(), durations()).unwrap();
        session.start().unwrap();
        session
    }

    fn tick_n(session: &mut Session, n: u32) -> Vec<SessionEvent> {
        (0..n).flat_map(|_| session.tick()).collect()
    }

    #[test]
    fn phases_advance_in_fixed_order_on_timer_expiry() {
        let mut session = started(&["Batman"]);
        assert_eq!(session.phase(), Phase::Grid15);
        assert_eq!(session.remaining(), 10);

        tick_n(&mut session, 9);
        assert_eq!(session.phase(), Phase::Grid15);
        assert_eq!(session.remaining(), 1);

        let events = session.tick();
        assert_eq!(session.phase(), Phase::Grid10);
        assert_eq!(session.remaining(), 8);
        assert_eq!(
            events,
            vec![SessionEvent::PhaseChanged {
                round: 0,
                phase: Phase::Grid10,
                seconds: 8
            }]
        );

        tick_n(&mut session, 8);
        assert_eq!(session.phase(), Phase::Grid5);
        tick_n(&mut session, 5);
        assert_eq!(session.phase(), Phase::Answer);
        assert_eq!(session.remaining(), 3);
        assert_eq!(session.current_image_url(), "/blobs/original/batman");
    }

    #[test]
    fn image_url_tracks_phase() {
        let mut session = started(&["Dark Knight"]);
        assert_eq!(session.current_image_url(), "/blobs/grid15/dark-knight");
        tick_n(&mut session, 10);
        assert_eq!(session.current_image_url(), "/blobs/grid10/dark-knight");
        tick_n(&mut session, 8);
        assert_eq!(session.current_image_url(), "/blobs/grid5/dark-knight");
    }

    #[test]
    fn answer_phase_moves_to_next_round_then_completes() {
        let mut session = started(&["Jaws", "Alien"]);
        tick_n(&mut session, 10 + 8 + 5 + 3);
        assert_eq!(session.round_index(), 1);
        assert_eq!(session.phase(), Phase::Grid15);
        assert_eq!(session.status(), SessionStatus::Playing);

        let events = tick_n(&mut session, 10 + 8 + 5 + 3);
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(
            events.last(),
            Some(&SessionEvent::SessionCompleted { score: 0, total: 2 })
        );

        // Late ticks are ignored.
        let frozen = session.clone();
        assert!(tick_n(&mut session, 5).is_empty());
        assert_eq!(session, frozen);
    }

    #[test]
    fn correct_guess_scores_and_jumps_to_answer() {
        let mut session = started(&["Dark Knight", "Jaws"]);
        tick_n(&mut session, 3);

        let (verdict, events) = session.submit_guess("the dark knight").unwrap();
        assert_eq!(verdict, GuessVerdict::Correct);
        assert_eq!(session.score(), 1);
        assert_eq!(session.phase(), Phase::Answer);
        assert_eq!(session.remaining(), 3);
        assert_eq!(events.len(), 2);

        // No second score for the same round.
        assert_eq!(
            session.submit_guess("dark knight"),
            Err(SessionError::NotAcceptingGuesses)
        );

        tick_n(&mut session, 3);
        assert_eq!(session.round_index(), 1);
        assert_eq!(session.phase(), Phase::Grid15);
    }

    #[test]
    fn wrong_guess_keeps_phase_and_clock() {
        let mut session = started(&["Batman"]);
        tick_n(&mut session, 4);

        let (verdict, _) = session.submit_guess("Superman").unwrap();
        assert_eq!(verdict, GuessVerdict::Incorrect);
        assert_eq!(session.phase(), Phase::Grid15);
        assert_eq!(session.remaining(), 6);

        let (verdict, _) = session.submit_guess("batman").unwrap();
        assert_eq!(verdict, GuessVerdict::Correct);
        assert_eq!(
            session.answers(),
            &[
                AnswerRecord {
                    round: 0,
                    guess: "Superman".into(),
                    correct: false
                },
                AnswerRecord {
                    round: 0,
                    guess: "batman".into(),
                    correct: true
                },
            ]
        );
    }

    #[test]
    fn ticks_and_guesses_wait_for_start() {
        let mut session = Session::new(vec![round("Batman")], durations()).unwrap();
        assert!(session.tick().is_empty());
        assert_eq!(session.remaining(), 10);
        assert_eq!(
            session.submit_guess("batman"),
            Err(SessionError::NotAcceptingGuesses)
        );

        let events = session.start().unwrap();
        assert_eq!(events[0], SessionEvent::RoundStarted { round: 0 });
        assert_eq!(session.start(), Err(SessionError::AlreadyStarted));
    }

    #[test]
    fn final_score_and_restart() {
        let mut session = started(&["Batman"]);
        session.submit_guess("Batman").unwrap();
        let events = tick_n(&mut session, 3);
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(
            events.last(),
            Some(&SessionEvent::SessionCompleted { score: 1, total: 1 })
        );

        session.restart();
        assert_eq!(session.status(), SessionStatus::AwaitingStart);
        assert_eq!(session.score(), 0);
        assert!(session.answers().is_empty());
        assert_eq!(session.phase(), Phase::Grid15);
        assert_eq!(session.remaining(), 10);
        session.start().unwrap();
    }

    #[test]
    fn zero_second_phases_are_skipped() {
        let durations = PhaseDurations {
            grid15: 2,
            grid10: 0,
            grid5: 1,
            answer: 0,
        };
        let mut session = Session::new(vec![round("Jaws"), round("Heat")], durations).unwrap();
        session.start().unwrap();
        tick_n(&mut session, 2);
        assert_eq!(session.phase(), Phase::Grid5);
        session.tick();
        assert_eq!(session.round_index(), 1);
        assert_eq!(session.phase(), Phase::Grid15);

        let mut instant = Session::new(vec![round("Jaws")], PhaseDurations {
            grid15: 0,
            grid10: 0,
            grid5: 0,
            answer: 0,
        })
        .unwrap();
        instant.start().unwrap();
        assert_eq!(instant.status(), SessionStatus::Completed);
    }

    #[test]
    fn empty_round_list_is_rejected() {
        assert_eq!(
            Session::new(vec![], PhaseDurations::default()),
            Err(SessionError::NoRounds)
        );
    }
}
