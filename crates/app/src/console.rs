use std::io::Write;

use jlpt_core::model::{Category, Level, MASTERY_THRESHOLD, ProgressState, Question};
use services::{
    AnswerReport, BatchOutcome, QuizLoopService, SessionController, SessionError, SessionStep,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

type ConsoleResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Line-oriented quiz front end over any async reader and sync writer.
pub struct Console<R, W> {
    input: Lines<R>,
    out: W,
}

/// What the learner typed at an answer prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Choice(usize),
    Quit,
    Invalid,
}

fn parse_reply(line: &str, options: usize) -> Reply {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("q") || trimmed.eq_ignore_ascii_case("quit") {
        return Reply::Quit;
    }
    match trimmed.parse::<usize>() {
        Ok(n) if (1..=options).contains(&n) => Reply::Choice(n - 1),
        _ => Reply::Invalid,
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, out: W) -> Self {
        Self {
            input: input.lines(),
            out,
        }
    }

    /// Drive an already started session until it finishes, stalls or the
    /// learner quits.
    pub async fn run_session(
        &mut self,
        quiz: &QuizLoopService,
        session: &mut SessionController,
        state: &mut ProgressState,
    ) -> ConsoleResult<()> {
        loop {
            let Some(question) = session.current_question().cloned() else {
                writeln!(self.out, "No questions available right now.")?;
                break;
            };
            self.render_question(session, &question)?;

            let choice = loop {
                write!(self.out, "Your answer (1-{}, q to quit): ", question.options().len())?;
                self.out.flush()?;
                let Some(line) = self.input.next_line().await? else {
                    session.end();
                    return Ok(());
                };
                match parse_reply(&line, question.options().len()) {
                    Reply::Choice(choice) => break choice,
                    Reply::Quit => {
                        session.end();
                        return Ok(());
                    }
                    Reply::Invalid => writeln!(self.out, "Please enter an option number.")?,
                }
            };

            let report = quiz.answer(session, state, choice).await?;
            self.render_feedback(&report)?;

            match quiz.advance(session, state).await? {
                SessionStep::Next
                | SessionStep::Refilled(BatchOutcome::Ready { .. } | BatchOutcome::Empty) => {}
                SessionStep::Finished => {
                    writeln!(self.out, "Review finished.")?;
                    break;
                }
                SessionStep::Refilled(BatchOutcome::Aborted | BatchOutcome::Discarded) => {
                    writeln!(self.out, "Could not load more questions; session ended.")?;
                    break;
                }
            }
        }

        if let Some(progress) = session.progress() {
            writeln!(
                self.out,
                "Answered {} ({} correct).",
                progress.answered, progress.correct
            )?;
        }
        session.end();
        Ok(())
    }

    fn render_question(
        &mut self,
        session: &SessionController,
        question: &Question,
    ) -> ConsoleResult<()> {
        writeln!(self.out)?;
        if let Some(progress) = session.progress() {
            writeln!(
                self.out,
                "[{} / {}] question {}",
                progress.level.label(),
                progress.category.label(),
                progress.position
            )?;
        }
        if let Some(script) = question.listening_text() {
            writeln!(self.out, "(listen) {script}")?;
        }
        writeln!(self.out, "{}", question.text())?;
        for (i, option) in question.options().iter().enumerate() {
            writeln!(self.out, "  {}. {option}", i + 1)?;
        }
        Ok(())
    }

    fn render_feedback(&mut self, report: &AnswerReport) -> ConsoleResult<()> {
        let question = &report.outcome.question;
        if report.outcome.correct {
            writeln!(self.out, "Correct!")?;
        } else {
            writeln!(
                self.out,
                "Incorrect. The answer is {}. {}",
                question.correct_index() + 1,
                question.correct_option().unwrap_or_default()
            )?;
        }
        for text in [
            question.translation(),
            question.core_analysis(),
            question.wrong_options_analysis(),
        ] {
            if !text.is_empty() {
                writeln!(self.out, "  {text}")?;
            }
        }
        if let Some(update) = report.score {
            writeln!(
                self.out,
                "Score: {} -> {} ({:+})",
                update.previous.min(MASTERY_THRESHOLD),
                update.current.min(MASTERY_THRESHOLD),
                update.delta()
            )?;
        }
        if report.mastery_achieved() {
            writeln!(
                self.out,
                "Mastered {} / {}!",
                report.outcome.level.label(),
                report.outcome.category.label()
            )?;
        }
        if let Some(level) = report.unlocked() {
            writeln!(self.out, "Unlocked {}.", level.label())?;
        }
        Ok(())
    }

    /// Print every level with its lock state, scores and pending reviews.
    pub fn print_status(&mut self, state: &ProgressState) -> ConsoleResult<()> {
        for level in Level::ALL {
            let lock = if state.is_unlocked(level) { " " } else { "x" };
            writeln!(self.out, "[{lock}] {}", level.label())?;
            for &category in level.categories() {
                let mark = if state.is_mastered(level, category) {
                    "*"
                } else {
                    " "
                };
                writeln!(
                    self.out,
                    "    {mark} {:<26} {:>3}/100  review: {}",
                    category.label(),
                    state.display_score(level, category),
                    state.wrong_questions_for(level, category).count()
                )?;
            }
        }
        Ok(())
    }
}

/// Pick the pair to practise when none was given: the newest unlocked level
/// and its first category.
#[must_use]
pub fn default_target(state: &ProgressState) -> (Level, Category) {
    let level = state
        .unlocked_levels()
        .iter()
        .next_back()
        .copied()
        .unwrap_or_else(Level::first);
    (level, level.categories()[0])
}

/// Pick the pair to review when none was given: that of the oldest missed
/// question.
#[must_use]
pub fn review_target(state: &ProgressState) -> Option<(Level, Category)> {
    state
        .wrong_questions()
        .first()
        .map(|q| (q.level(), q.category()))
}

/// Map a start failure to a learner-facing line.
#[must_use]
pub fn describe_start_error(err: &SessionError) -> String {
    match err {
        SessionError::Locked(level) => format!("{} is still locked.", level.label()),
        SessionError::InvalidCategory { level, category } => {
            format!("{} has no {} quiz.", level.label(), category.label())
        }
        SessionError::Empty => "Nothing to review.".to_string(),
        other => other.to_string(),
    }
}
