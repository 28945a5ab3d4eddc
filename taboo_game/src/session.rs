use std::collections::BTreeSet;
use std::io::Write;

use taboo::TargetTable;
use tracing::{info, warn};

use crate::{play_round, verdict_text, Collaborators, GameError, SessionConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    RoundInProgress { round_index: usize },
    RoundComplete { round_index: usize },
    SessionComplete,
    SessionAborted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionScore {
    pub correct: usize,
    pub total_rounds: usize,
}

impl std::fmt::Display for SessionScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} out of {}", self.correct, self.total_rounds)
    }
}

/// A single player's run of several rounds.
///
/// Owns the pool of unused answers and the running score; both only change
/// between rounds.
pub struct Session {
    config: SessionConfig,
    table: TargetTable,
    available: BTreeSet<String>,
    played: Vec<String>,
    score: SessionScore,
    state: SessionState,
    collaborators: Collaborators,
}

impl Session {
    pub fn new(config: SessionConfig, table: TargetTable, collaborators: Collaborators) -> Self {
        let available = table.answers();
        Self {
            config,
            table,
            available,
            played: Vec::new(),
            score: SessionScore::default(),
            state: SessionState::Idle,
            collaborators,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn score(&self) -> SessionScore {
        self.score
    }

    /// Answers in the order they were played.
    pub fn played_answers(&self) -> &[String] {
        &self.played
    }

    /// Plays all rounds and prints the final score.
    ///
    /// Any error aborts the session on the spot, without a summary.
    pub fn run(&mut self) -> Result<SessionScore, GameError> {
        match self.run_rounds() {
            Ok(score) => {
                self.state = SessionState::SessionComplete;
                Ok(score)
            }
            Err(err) => {
                self.state = SessionState::SessionAborted;
                Err(err)
            }
        }
    }

    fn run_rounds(&mut self) -> Result<SessionScore, GameError> {
        let labels = self
            .collaborators
            .detector
            .labels()
            .map_err(GameError::detector)?;
        self.table
            .check_vocabulary(&labels[..])
            .map_err(crate::ConfigError::from)?;

        if self.config.rounds > self.available.len() {
            warn!(
                rounds = self.config.rounds,
                num_targets = self.available.len(),
                "More rounds requested than there are targets"
            );
        }

        for round_index in 1..=self.config.rounds {
            self.state = SessionState::RoundInProgress { round_index };
            let outcome = play_round(
                &mut self.config.rng,
                round_index,
                &mut self.available,
                &self.table,
                &self.config.output_dir,
                &mut self.collaborators,
                &mut self.config.recorder,
            )?;
            self.collaborators.presenter.present(&outcome.verdict)?;

            if outcome.verdict.found {
                self.score.correct += 1;
            }
            self.score.total_rounds += 1;
            self.played.push(outcome.answer);
            self.state = SessionState::RoundComplete { round_index };

            writeln!(
                self.collaborators.output,
                "\n{} Score so far: {}\n",
                verdict_text(outcome.verdict.found),
                self.score
            )
            .map_err(GameError::Terminal)?;
        }

        info!(correct = self.score.correct, total_rounds = self.score.total_rounds, "Session complete");
        writeln!(self.collaborators.output, "Final score: {}", self.score)
            .and_then(|_| self.collaborators.output.flush())
            .map_err(GameError::Terminal)?;
        Ok(self.score)
    }
}
