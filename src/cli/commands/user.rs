use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_fields, output_success};
use crate::cli::{open_state, OutputFormat};
use crate::database::models::NewToken;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user and an admin token for it")]
    Create {
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "Email address (unique)")]
        email: String,
    },

    #[command(about = "Show a user by id or email")]
    Show {
        #[arg(help = "User id or email")]
        user: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = open_state().await?;

    match cmd {
        UserCommands::Create { name, email } => {
            let user = state.users().create(&name, &email).await?;
            let token = state
                .tokens()
                .create(
                    &user.id,
                    NewToken {
                        name: "admin".to_string(),
                        permissions: Some(json!(["admin"])),
                        table_access: None,
                        allowed_ips: Vec::new(),
                        allowed_domains: Vec::new(),
                        expires_at: None,
                    },
                )
                .await?;
            let secret = token.token.clone().unwrap_or_default();

            output_success(
                &output_format,
                &format!("Created user {} with admin token {}", user.id, token.id),
                Some(json!({ "user": user, "token": token })),
            )?;
            if matches!(output_format, OutputFormat::Text) {
                println!("Admin token (shown once): {}", secret);
            }
            Ok(())
        }
        UserCommands::Show { user } => {
            let found = if user.contains('@') {
                state
                    .users()
                    .find_by_email(&user)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("No user with email {}", user))?
            } else {
                state.users().get(&user).await?
            };

            output_fields(
                &output_format,
                &[
                    ("id", found.id),
                    ("name", found.name),
                    ("email", found.email),
                    ("createdAt", found.created_at),
                ],
            )
        }
    }
}
