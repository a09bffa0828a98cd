//! `offerdesk chat`: Interactive or single-message chat as one end user.

use std::sync::Arc;
use offerdesk_agent::{FailureKind, OfferContextInstruction, Orchestrator, TurnOutcome};
use offerdesk_config::AppConfig;
use offerdesk_core::message::{NewTurn, UserId};
use offerdesk_core::store::ConversationStore;
use offerdesk_store::Stores;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(user: String, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OFFERDESK_API_KEY=...");
        eprintln!("    GEMINI_API_KEY=...");
        eprintln!();
        eprintln!("  Or add `api_key` to the [model] section of:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = offerdesk_providers::build_from_config(&config.model)?;
    let stores = offerdesk_store::open(&config.store).await?;
    let instruction = Arc::new(OfferContextInstruction::new(
        config.orchestrator.system_instruction.clone(),
        stores.offers.clone(),
    ));
    let desk = Orchestrator::new(provider, stores.clone(), instruction)
        .configured(&config.model, &config.orchestrator);
    let user = UserId::new(user);

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = exchange(&desk, &stores, &user, msg).await?;
        eprint!("\r              \r");
        println!("{reply}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  OfferDesk — Interactive Mode");
    println!();
    println!("  Model:    {}", config.model.name);
    println!("  User:     {user}");
    println!("  Storage:  {}", config.store.backend);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        eprint!("  ...");
        let reply = exchange(&desk, &stores, &user, line.to_string()).await?;
        eprint!("\r     \r");
        println!();
        for text_line in reply.lines() {
            println!("  Desk > {text_line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Store the user's message, run one turn and render the outcome.
async fn exchange(
    desk: &Orchestrator,
    stores: &Stores,
    user: &UserId,
    message: String,
) -> Result<String, Box<dyn std::error::Error>> {
    stores
        .conversations
        .append_turn(NewTurn::user(user.clone(), message))
        .await?;

    Ok(match desk.handle(user).await {
        TurnOutcome::Reply(reply) => match reply.attachment {
            Some(file) => format!("{}\n[attached: {} ({})]", reply.text, file.filename, file.mime_type),
            None => reply.text,
        },
        TurnOutcome::Failed(kind) => failure_text(kind).to_string(),
    })
}

fn failure_text(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::NoResponse => "[no answer from the model, please rephrase]",
        FailureKind::MaxRounds => "[the desk could not finish this request, please try again]",
        FailureKind::Internal => "[something went wrong, see the log for details]",
    }
}
