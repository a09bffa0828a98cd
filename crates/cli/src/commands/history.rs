//! `offerdesk history`: Show a user's stored turns.

use offerdesk_core::message::{Role, Turn, UserId};
use offerdesk_core::store::ConversationStore;

pub async fn run(user: String, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let stores = offerdesk_store::open(&config.store).await?;
    let user = UserId::new(user);

    let turns = stores.conversations.load_recent_turns(&user, limit).await?;
    if turns.is_empty() {
        println!("No turns stored for {user}.");
        return Ok(());
    }

    for turn in &turns {
        println!("{}", render(turn));
    }
    Ok(())
}

fn render(turn: &Turn) -> String {
    let who = match (turn.role, turn.by_operator) {
        (Role::User, _) => "user",
        (Role::Assistant, true) => "operator",
        (Role::Assistant, false) => "desk",
    };
    let mut line = format!(
        "{} {:<8} {}",
        turn.created_at.format("%Y-%m-%d %H:%M:%S"),
        who,
        turn.content.as_deref().unwrap_or("")
    );
    if let Some(file) = &turn.attachment {
        line.push_str(&format!(" [file {file}]"));
    }
    if turn.off_policy {
        line.push_str(" (off-policy)");
    }
    line
}
