//! One-shot query and quick-action listing.

use anyhow::{Context, Result, anyhow, bail};
use prep_core::chat::{TurnContent, find_action};

use super::chat::{new_driver, stream_reply};
use crate::cli::AppContext;
use crate::render::Renderer;

pub fn list_actions() -> Result<()> {
    Renderer::stdout().actions().context("write actions")
}

pub async fn run(ctx: &AppContext, prompt: Option<String>, action: Option<String>) -> Result<()> {
    let query = match (action, prompt) {
        (Some(name), subject) => find_action(&name)
            .map(|action| action.message(subject.as_deref()))
            .ok_or_else(|| anyhow!("Unknown quick action `{name}`. Run `prep actions` to list them."))?,
        (None, Some(prompt)) => prompt,
        (None, None) => bail!("Nothing to ask. Pass --prompt <query> or --action <n>."),
    };

    let mut driver = new_driver(ctx);
    driver.send(&query)?;

    let mut renderer = Renderer::stdout();
    let Some(reply) = stream_reply(&mut driver, &mut renderer).await? else {
        return Ok(());
    };
    if let Some(turn) = driver.conversation().turns().get(reply.turn)
        && let TurnContent::Error(message) = &turn.content
    {
        bail!("{message}");
    }
    Ok(())
}
