//! Interactive chat loop with quick actions and MCQ practice mode.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, bail};
use prep_core::api::auth::AuthApi;
use prep_core::chat::{ChatClient, ChatDriver, Progress, QueryQuota, SendError, find_action};
use prep_core::payload::Payload;
use prep_core::quiz::{QuizEngine, QuizError};
use prep_core::session::SessionMonitor;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cli::AppContext;
use crate::render::Renderer;

const QUIT_COMMAND: &str = ":q";
const CHAT_PROMPT: &str = "you> ";
const QUIZ_PROMPT: &str = "quiz> ";
const SESSION_ENDED: &str = "\nYour session has ended. Log in again with `prep login`.";

/// A committed reply: the turn index and what it classified as.
pub(crate) struct Reply {
    pub turn: usize,
    pub payload: Option<Payload>,
}

pub(crate) fn new_driver(ctx: &AppContext) -> ChatDriver {
    ChatDriver::new(
        Arc::new(ChatClient::new(ctx.backend.clone())),
        QueryQuota::new(ctx.config.daily_query_limit),
    )
}

/// Renders the active request until it finishes.
pub(crate) async fn stream_reply<W: Write>(
    driver: &mut ChatDriver,
    renderer: &mut Renderer<W>,
) -> Result<Option<Reply>> {
    renderer.loading()?;
    while let Some(progress) = driver.next_update().await {
        match progress {
            Progress::Delta(text) => renderer.delta(&text)?,
            Progress::Committed(turn) => {
                let payload = match driver.conversation().turns().get(turn) {
                    Some(committed) => renderer.finish_turn(committed)?,
                    None => None,
                };
                return Ok(Some(Reply { turn, payload }));
            }
            Progress::Ended => break,
        }
    }
    renderer.end_stream()?;
    Ok(None)
}

/// How a streamed request ended in the REPL.
enum Streamed {
    Reply(Option<Reply>),
    /// The session was logged out first; the request was cancelled.
    SessionEnded,
}

/// [`stream_reply`], abandoned as soon as `logged_out` reports logout.
async fn stream_until_logout<W: Write>(
    driver: &mut ChatDriver,
    renderer: &mut Renderer<W>,
    logged_out: &mut watch::Receiver<bool>,
) -> Result<Streamed> {
    let reply = tokio::select! {
        reply = stream_reply(driver, renderer) => Some(reply?),
        Ok(_) = logged_out.wait_for(|authenticated| !*authenticated) => None,
    };
    if let Some(reply) = reply {
        return Ok(Streamed::Reply(reply));
    }

    if driver.is_busy() {
        tracing::info!(request = ?driver.active_request(), "session ended mid-reply");
        driver.cancel();
    }
    renderer.end_stream()?;
    Ok(Streamed::SessionEnded)
}

pub async fn run(ctx: &AppContext) -> Result<()> {
    if !ctx.session.is_authenticated() {
        bail!("{}", SendError::NotAuthenticated);
    }

    let cancel = CancellationToken::new();
    let _monitor_guard = cancel.clone().drop_guard();
    if let Some(interval) = ctx.config.session_check_interval() {
        let auth = AuthApi::new(ctx.backend.clone());
        SessionMonitor::new(ctx.session.clone(), auth, interval).spawn(cancel.clone());
    }

    let mut driver = new_driver(ctx);
    let mut renderer = Renderer::stdout();
    renderer.welcome(driver.quota())?;

    let mut logged_out = ctx.session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quiz: Option<QuizEngine> = None;

    loop {
        renderer.prompt(if quiz.is_some() { QUIZ_PROMPT } else { CHAT_PROMPT })?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Ok(_) = logged_out.wait_for(|authenticated| !*authenticated) => {
                renderer.notice(SESSION_ENDED)?;
                return Ok(());
            }
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == QUIT_COMMAND {
            renderer.notice("Goodbye!")?;
            break;
        }

        if let Some(engine) = quiz.as_mut() {
            match quiz_command(engine, input, &mut renderer)? {
                QuizOutcome::Handled => continue,
                QuizOutcome::Leave => {
                    quiz = None;
                    renderer.notice("Left practice mode.")?;
                    continue;
                }
                QuizOutcome::NotACommand => quiz = None,
            }
        }

        let query = match parse_action(input) {
            Some(Ok(query)) => query,
            Some(Err(message)) => {
                renderer.notice(message)?;
                continue;
            }
            None if input == "/actions" => {
                renderer.actions()?;
                continue;
            }
            None => input.to_string(),
        };

        if let Err(err) = driver.send(&query) {
            renderer.notice(err)?;
            continue;
        }
        match stream_until_logout(&mut driver, &mut renderer, &mut logged_out).await? {
            Streamed::Reply(Some(reply)) => {
                tracing::debug!(turn = reply.turn, "reply committed");
                if let Some(Payload::Quiz(set)) = reply.payload {
                    quiz = Some(QuizEngine::new(set));
                    renderer.quiz_help()?;
                }
            }
            Streamed::Reply(None) => {}
            Streamed::SessionEnded => {
                renderer.notice(SESSION_ENDED)?;
                return Ok(());
            }
        }
        renderer.notice(driver.quota())?;
    }

    Ok(())
}

/// `/action <n|title> [subject]` expanded to its query text.
fn parse_action(input: &str) -> Option<Result<String, String>> {
    let rest = input.strip_prefix("/action ")?.trim();
    let (name, subject) = match rest.split_once(char::is_whitespace) {
        Some((name, subject)) => (name, Some(subject.trim()).filter(|s| !s.is_empty())),
        None => (rest, None),
    };
    Some(
        find_action(name)
            .map(|action| action.message(subject))
            .ok_or_else(|| format!("Unknown quick action `{name}`. Type /actions to list them.")),
    )
}

enum QuizOutcome {
    Handled,
    Leave,
    NotACommand,
}

fn quiz_command<W: Write>(
    engine: &mut QuizEngine,
    input: &str,
    renderer: &mut Renderer<W>,
) -> Result<QuizOutcome> {
    let mut words = input.split_whitespace();
    let (Some(first), second, None) = (words.next(), words.next(), words.next()) else {
        return Ok(QuizOutcome::NotACommand);
    };

    match (first.to_ascii_lowercase().as_str(), second) {
        ("submit", None) => match engine.submit() {
            Ok(_) => renderer.quiz(engine)?,
            Err(err) => renderer.notice(err)?,
        },
        ("show", None) => renderer.quiz(engine)?,
        ("reset", None) => {
            engine.reset();
            renderer.notice("Answers cleared.")?;
        }
        ("done", None) => return Ok(QuizOutcome::Leave),
        ("explain", Some(n)) => {
            let Some((number, question_id)) = question_at(engine, n) else {
                if n.parse::<usize>().is_err() {
                    return Ok(QuizOutcome::NotACommand);
                }
                renderer.notice(format!("No question {n}."))?;
                return Ok(QuizOutcome::Handled);
            };
            match engine.toggle_explanation(&question_id) {
                Ok(true) => {
                    if let Some(question) = engine.set().question(&question_id) {
                        renderer.question_explanation(number, question)?;
                    }
                }
                Ok(false) => renderer.notice(format!("Explanation {number} hidden."))?,
                Err(err) => renderer.notice(err)?,
            }
        }
        (n, Some(option)) => {
            if n.parse::<usize>().is_err() {
                return Ok(QuizOutcome::NotACommand);
            }
            let Some((number, _)) = question_at(engine, n) else {
                renderer.notice(format!("No question {n}."))?;
                return Ok(QuizOutcome::Handled);
            };
            match select(engine, number, option) {
                Ok(option_id) => renderer.notice(format!("Question {number}: {option_id}"))?,
                Err(err) => renderer.notice(err)?,
            }
        }
        _ => return Ok(QuizOutcome::NotACommand),
    }
    Ok(QuizOutcome::Handled)
}

/// 1-based question number to `(number, id)`.
fn question_at(engine: &QuizEngine, n: &str) -> Option<(usize, String)> {
    let number: usize = n.parse().ok()?;
    let question = engine.set().questions.get(number.checked_sub(1)?)?;
    Some((number, question.id.clone()))
}

/// Option by id (case-insensitive), falling back to a 1-based position.
fn select(engine: &mut QuizEngine, number: usize, option: &str) -> Result<String, QuizError> {
    let matched = engine.set().questions.get(number - 1).and_then(|q| {
        q.options
            .iter()
            .find(|o| o.id.eq_ignore_ascii_case(option))
            .map(|o| (q.id.clone(), o.id.clone()))
    });
    if let Some((question_id, option_id)) = matched {
        engine.select(&question_id, &option_id)?;
        return Ok(option_id);
    }
    match option.parse::<usize>() {
        Ok(position) if position > 0 => engine.select_option_at(number - 1, position - 1),
        _ => Err(QuizError::UnknownOption {
            question: number.to_string(),
            option: option.to_string(),
        }),
    }
}
