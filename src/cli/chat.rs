//! CLI `chat` command — interactive streaming conversation.
//!
//! `/exit` ends the session and forgets the access code, `/reset` starts a
//! fresh session. Ctrl-C during a reply cancels that reply; Ctrl-C at the
//! prompt or end of input leaves like closing the page: the end-session
//! beacon is queued and given a short window to go out.

use std::io::Write;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use hrdai::api::types::RetrievalTrace;
use hrdai::chat::tools::{display_name, ToolKind};
use hrdai::chat::{Conversation, Opening};
use hrdai::config::HrdaiConfig;
use hrdai::{ApiError, TurnEvent};

use super::{spinner, ClientContext};

const HELP: &str = "Commands: /reset  /context  /exit  /help   (Ctrl-C cancels a reply)";

pub async fn chat(ctx: &ClientContext, config: &HrdaiConfig) -> Result<()> {
    if ctx.client.store().access_code().is_none() {
        bail!("No access code. Run `hrdai login <CODE>` first.");
    }

    let mut conversation = Conversation::new(ctx.client.clone(), config.chat.intro_message.clone());
    open(&mut conversation, Reason::Start).await?;
    println!("{HELP}\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match line.trim() {
            "" => continue,
            "/help" => println!("{HELP}"),
            "/context" => print_trace(conversation.retrieval_trace()),
            "/exit" => {
                let pb = spinner("Saving your session...");
                conversation.exit().await;
                pb.finish_and_clear();
                println!("Session ended. Access code cleared.");
                return Ok(());
            }
            "/reset" => open(&mut conversation, Reason::Reset).await?,
            text => run_turn(&mut conversation, text).await?,
        }
    }

    if conversation.teardown() {
        ctx.beacon.flush(ctx.beacon_timeout).await;
    }
    Ok(())
}

enum Reason {
    Start,
    Reset,
}

async fn open(conversation: &mut Conversation, reason: Reason) -> Result<()> {
    let pb = match reason {
        Reason::Start => spinner("Preparing your assistant..."),
        Reason::Reset => spinner("Saving session and starting over..."),
    };
    let opening = match reason {
        Reason::Start => conversation.load_greeting().await,
        Reason::Reset => conversation.reset().await,
    };
    pb.finish_and_clear();

    if let Opening::Intro(Some(e)) = &opening {
        if e.is_auth() {
            bail!("{e} Run `hrdai login <CODE>`.");
        }
    }
    if let Some(message) = conversation.messages().last() {
        println!("hrdai> {}\n", message.content);
    }
    Ok(())
}

async fn run_turn(conversation: &mut Conversation, text: &str) -> Result<()> {
    let mut stream = conversation.send(text);
    let mut started = false;

    loop {
        let event = tokio::select! {
            event = stream.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                stream.cancel();
                conversation.cancel();
                println!("\n[cancelled]\n");
                return Ok(());
            }
        };
        let Some(event) = event else { break };

        render(&event, &mut started)?;
        conversation.apply(&event);

        if let TurnEvent::Error(e) = &event {
            if let Some(message) = conversation.messages().last().filter(|m| m.is_error) {
                println!("hrdai> {}\n", message.content);
            }
            if matches!(e, ApiError::Unauthorized) {
                bail!("{e}");
            }
        }
    }

    if conversation.is_loading() {
        conversation.cancel();
    }
    Ok(())
}

fn render(event: &TurnEvent, started: &mut bool) -> Result<()> {
    let mut out = std::io::stdout();
    match event {
        TurnEvent::RetrievalTrace(trace) => {
            println!(
                "  · context: {} item(s), {} strateg(ies){}",
                trace.total_items(),
                trace.strategies_used.len(),
                trace
                    .timing_ms
                    .map(|ms| format!(", {ms:.0}ms"))
                    .unwrap_or_default()
            );
        }
        TurnEvent::ToolCalls(calls) => {
            for call in calls {
                let status = match call.success {
                    Some(true) => "ok",
                    Some(false) => "failed",
                    None => "pending",
                };
                println!(
                    "  · {}: {} [{status}]",
                    ToolKind::classify(&call.name),
                    display_name(&call.name)
                );
            }
        }
        TurnEvent::ToolStart(start) => {
            println!(
                "  · {}: {} ...",
                ToolKind::classify(&start.name),
                display_name(&start.name)
            );
        }
        TurnEvent::ToolComplete(complete) => {
            let outcome = if complete.succeeded() { "done" } else { "failed" };
            let timing = complete
                .duration_ms
                .map(|ms| format!(" ({ms:.0}ms)"))
                .unwrap_or_default();
            match &complete.error {
                Some(error) => println!("  · {} {outcome}{timing}: {error}", display_name(&complete.name)),
                None => println!("  · {} {outcome}{timing}", display_name(&complete.name)),
            }
        }
        TurnEvent::Content(delta) => {
            if !*started {
                print!("hrdai> ");
                *started = true;
            }
            print!("{delta}");
            out.flush()?;
        }
        TurnEvent::Done(summary) => {
            if *started {
                println!();
            }
            if let Some(ms) = summary.response_time_ms {
                println!("  · {ms:.0}ms");
            }
            println!();
        }
        TurnEvent::Error(_) => {
            if *started {
                println!();
            }
        }
    }
    Ok(())
}

fn print_trace(trace: Option<&RetrievalTrace>) {
    let Some(trace) = trace else {
        println!("No context retrieved yet.");
        return;
    };

    if !trace.strategies_used.is_empty() {
        let strategies: Vec<String> = trace
            .strategies_used
            .iter()
            .map(|s| s.replace('_', " ").to_lowercase())
            .collect();
        println!("Strategies: {}", strategies.join(", "));
    }
    for entity in &trace.entities_retrieved {
        let kind = entity.entity_type.as_deref().unwrap_or("entity");
        match entity.relationship_to_self.as_deref() {
            Some(rel) => println!("  [{kind}] {} ({rel})", entity.name),
            None => println!("  [{kind}] {}", entity.name),
        }
    }
    for topic in &trace.topics_retrieved {
        match topic.status.as_deref() {
            Some(status) => println!("  [topic] {} ({status})", topic.name),
            None => println!("  [topic] {}", topic.name),
        }
    }
    for episode in &trace.episodes_retrieved {
        println!("  [episode] {}", episode.summary);
    }
    if let Some(ms) = trace.timing_ms {
        println!("Retrieved in {ms:.0}ms");
    }
}
