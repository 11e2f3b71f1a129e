//! Terminal renderer for conversation turns, payloads and quizzes.
//!
//! Output contract:
//! - streamed text, committed turns and quiz views → the wrapped writer
//! - the `▋` cursor and loading line only when the writer is a terminal

use std::io::{self, IsTerminal, Stdout, Write};

use prep_core::chat::{QUICK_ACTIONS, QueryQuota, Turn, TurnContent};
use prep_core::payload::{self, Block, Explanation, Payload};
use prep_core::quiz::{QuizEngine, Question, Score};

const CURSOR: &str = "▋";
const ERASE_CURSOR: &str = "\u{8} \u{8}";
const CLEAR_LINE: &str = "\r\x1b[2K";
const LOADING: &str = "Generating response...";

pub const WELCOME_TITLE: &str = "Welcome to SSC CGL Preparation Assistant";
const WELCOME_BODY: &str = "Ask me anything about SSC CGL exam preparation. I can help you with \
concepts, practice questions, current affairs, and preparation strategies.";

pub struct Renderer<W: Write> {
    out: W,
    decorate: bool,
    cursor_shown: bool,
    loading_shown: bool,
    /// Text streamed for the current turn.
    streamed: String,
}

impl Renderer<Stdout> {
    pub fn stdout() -> Self {
        let out = io::stdout();
        let decorate = out.is_terminal();
        Self::new(out, decorate)
    }
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, decorate: bool) -> Self {
        Self {
            out,
            decorate,
            cursor_shown: false,
            loading_shown: false,
            streamed: String::new(),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn welcome(&mut self, quota: QueryQuota) -> io::Result<()> {
        writeln!(self.out, "{WELCOME_TITLE}")?;
        writeln!(self.out, "{WELCOME_BODY}")?;
        writeln!(self.out)?;
        writeln!(self.out, "{quota}")?;
        writeln!(
            self.out,
            "Type /actions for quick prompts, /action <n> [subject] to use one, :q to quit."
        )?;
        self.out.flush()
    }

    pub fn prompt(&mut self, prefix: &str) -> io::Result<()> {
        write!(self.out, "{prefix}")?;
        self.out.flush()
    }

    /// One line of status text (not part of the conversation).
    pub fn notice(&mut self, message: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.out, "{message}")?;
        self.out.flush()
    }

    pub fn actions(&mut self) -> io::Result<()> {
        for (index, action) in QUICK_ACTIONS.iter().enumerate() {
            writeln!(
                self.out,
                "{}. {} ({}): {} {}",
                index + 1,
                action.title,
                action.description,
                action.prompt,
                action.subject
            )?;
        }
        self.out.flush()
    }

    pub fn loading(&mut self) -> io::Result<()> {
        self.streamed.clear();
        if self.decorate {
            write!(self.out, "{LOADING}")?;
            self.loading_shown = true;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn delta(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.clear_decorations()?;
        write!(self.out, "{text}")?;
        self.streamed.push_str(text);
        if self.decorate {
            write!(self.out, "{CURSOR}")?;
            self.cursor_shown = true;
        }
        self.out.flush()
    }

    /// Stream ended with nothing committed.
    pub fn end_stream(&mut self) -> io::Result<()> {
        self.clear_decorations()?;
        if !std::mem::take(&mut self.streamed).is_empty() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    /// Renders a committed assistant turn after its stream.
    ///
    /// Plain text that was already streamed verbatim only gets its newline.
    /// Returns the classified payload so callers can start a quiz.
    pub fn finish_turn(&mut self, turn: &Turn) -> io::Result<Option<Payload>> {
        self.clear_decorations()?;
        let streamed = std::mem::take(&mut self.streamed);
        if !streamed.is_empty() {
            writeln!(self.out)?;
        }

        let payload = turn.payload();
        match (&turn.content, &payload) {
            (TurnContent::Error(message), _) => writeln!(self.out, "Error: {message}")?,
            (TurnContent::Text(text), Some(Payload::Text(_))) if *text == streamed => {}
            (_, Some(payload)) => {
                if !streamed.is_empty() {
                    writeln!(self.out)?;
                }
                self.payload(payload)?;
            }
            (_, None) => {}
        }
        self.out.flush()?;
        Ok(payload)
    }

    pub fn payload(&mut self, payload: &Payload) -> io::Result<()> {
        match payload {
            Payload::Quiz(set) => self.quiz(&QuizEngine::new(set.clone())),
            Payload::Explanation(explanation) => self.explanation(explanation),
            Payload::General(blocks) => self.blocks(blocks),
            Payload::Text(text) => writeln!(self.out, "{text}"),
            Payload::Raw(value) => writeln!(self.out, "{}", payload::pretty_json(value)),
        }
    }

    pub fn explanation(&mut self, explanation: &Explanation) -> io::Result<()> {
        writeln!(self.out, "{}", explanation.title())?;
        let Some(body) = &explanation.body else {
            return writeln!(self.out, "{}", Explanation::MISSING_CONTENT);
        };

        if let Some(summary) = &body.summary {
            writeln!(self.out)?;
            writeln!(self.out, "{summary}")?;
        }
        for concept in &body.key_concepts {
            writeln!(self.out)?;
            writeln!(self.out, "▸ {}", concept.title)?;
            if let Some(text) = &concept.explanation {
                writeln!(self.out, "  {text}")?;
            }
            if !concept.examples.is_empty() {
                writeln!(self.out, "  Examples:")?;
                for example in &concept.examples {
                    writeln!(self.out, "    • {example}")?;
                }
            }
            if !concept.formulas.is_empty() {
                writeln!(self.out, "  Key Formulas:")?;
                for formula in &concept.formulas {
                    writeln!(self.out, "    {formula}")?;
                }
            }
        }
        self.bullets("Pro Tips:", &body.tips)?;
        self.bullets("Common Mistakes:", &body.common_mistakes)
    }

    pub fn blocks(&mut self, blocks: &[Block]) -> io::Result<()> {
        let mut indent = 0;
        for block in blocks {
            match block {
                Block::Heading { level, text } => {
                    indent = level.saturating_sub(1) * 2;
                    writeln!(self.out, "{:indent$}{text}", "")?;
                }
                Block::Paragraph { text } => writeln!(self.out, "{:w$}{text}", "", w = indent + 2)?,
                Block::Item { level, n, text } => {
                    let w = level.saturating_sub(1) * 2 + 2;
                    writeln!(self.out, "{:w$}{n}. {text}", "")?;
                }
            }
        }
        Ok(())
    }

    /// Full quiz view: questions, options, badges and explanations once
    /// submitted, and the score line.
    pub fn quiz(&mut self, engine: &QuizEngine) -> io::Result<()> {
        let set = engine.set();
        writeln!(self.out, "{}", set.title())?;
        for (index, question) in set.questions.iter().enumerate() {
            writeln!(self.out)?;
            self.question(engine, index, question)?;
        }
        if let Some(score) = engine.score() {
            writeln!(self.out)?;
            self.score(score)?;
        }
        self.out.flush()
    }

    pub fn quiz_help(&mut self) -> io::Result<()> {
        self.notice(
            "Answer with `<question> <option>` (e.g. `1 B`), then `submit`. \
             Also: `explain <n>`, `show`, `reset`, `done`.",
        )
    }

    pub fn score(&mut self, score: Score) -> io::Result<()> {
        writeln!(
            self.out,
            "You got {} out of {} questions correct! ({}%)",
            score.correct,
            score.total,
            score.percentage()
        )
    }

    /// Explanation for one question, or a note when it has none.
    pub fn question_explanation(&mut self, number: usize, question: &Question) -> io::Result<()> {
        match &question.explanation {
            Some(text) => writeln!(self.out, "Question {number}: {text}"),
            None => writeln!(self.out, "Question {number} has no explanation."),
        }
    }

    fn question(&mut self, engine: &QuizEngine, index: usize, question: &Question) -> io::Result<()> {
        let badge = match engine.verdict(&question.id) {
            Some(true) => " [Correct]",
            Some(false) => " [Incorrect]",
            None => "",
        };
        writeln!(self.out, "Question {}{badge}", index + 1)?;
        writeln!(self.out, "{}", question.text)?;

        let chosen = engine.answer(&question.id);
        for option in &question.options {
            let selected = chosen == Some(option.id.as_str());
            let marker = match (engine.is_submitted(), selected) {
                (true, _) if question.is_correct(&option.id) => "✓",
                (true, true) => "✗",
                (false, true) => ">",
                _ => " ",
            };
            writeln!(self.out, "  {marker} {}. {}", option.id, option.text)?;
        }

        if engine.explanation_visible(&question.id)
            && let Some(text) = &question.explanation
        {
            writeln!(self.out, "  Explanation: {text}")?;
        }
        Ok(())
    }

    fn bullets(&mut self, heading: &str, items: &[String]) -> io::Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        writeln!(self.out)?;
        writeln!(self.out, "{heading}")?;
        for item in items {
            writeln!(self.out, "  • {item}")?;
        }
        Ok(())
    }

    fn clear_decorations(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.cursor_shown) {
            write!(self.out, "{ERASE_CURSOR}")?;
        }
        if std::mem::take(&mut self.loading_shown) {
            write!(self.out, "{CLEAR_LINE}")?;
        }
        Ok(())
    }
}
