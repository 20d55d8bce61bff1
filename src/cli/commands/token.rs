use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{output_success, split_list};
use crate::cli::{open_state, OutputFormat};
use crate::database::models::NewToken;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Create an API token (the secret is printed once)")]
    Create {
        #[arg(long, help = "Owning user id")]
        user: String,
        #[arg(long, help = "Token name")]
        name: String,
        #[arg(long, default_value = "read", help = "Permissions: read,write,delete,admin or *")]
        permissions: String,
        #[arg(long, help = "Restrict to these table ids (comma separated)")]
        tables: Option<String>,
        #[arg(long, default_value = "", help = "IP whitelist: addresses or CIDRs (comma separated)")]
        ips: String,
        #[arg(long, default_value = "", help = "Domain whitelist, e.g. shop.example.com,*.example.com")]
        domains: String,
        #[arg(long, help = "Expiry as RFC 3339 or YYYY-MM-DD")]
        expires: Option<String>,
    },

    #[command(about = "List a user's tokens")]
    List {
        #[arg(long, help = "Owning user id")]
        user: String,
    },

    #[command(about = "Delete a token")]
    Delete {
        #[arg(long, help = "Owning user id")]
        user: String,
        #[arg(help = "Token id")]
        id: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = open_state().await?;
    let tokens = state.tokens();

    match cmd {
        TokenCommands::Create {
            user,
            name,
            permissions,
            tables,
            ips,
            domains,
            expires,
        } => {
            let new_token = NewToken {
                name,
                permissions: Some(Value::String(permissions)),
                table_access: tables.as_deref().map(split_list),
                allowed_ips: split_list(&ips),
                allowed_domains: split_list(&domains),
                expires_at: expires,
            };
            let created = tokens.create(&user, new_token).await?;
            let secret = created.token.clone().unwrap_or_default();

            output_success(
                &output_format,
                &format!("Created token {} ({})", created.id, created.permissions.join(",")),
                Some(json!({ "token": created })),
            )?;
            if matches!(output_format, OutputFormat::Text) {
                println!("Token (shown once): {}", secret);
            }
            Ok(())
        }
        TokenCommands::List { user } => {
            let list = tokens.list(&user).await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "tokens": list }))?),
                OutputFormat::Text => {
                    if list.is_empty() {
                        println!("No tokens for user {}", user);
                    }
                    for token in list {
                        println!(
                            "{}  {:<20} {:<12} [{}]{}",
                            token.id,
                            token.name,
                            token.token_prefix,
                            token.permissions.join(","),
                            token.expires_at.map(|e| format!(" expires {}", e)).unwrap_or_default()
                        );
                    }
                }
            }
            Ok(())
        }
        TokenCommands::Delete { user, id } => {
            tokens.delete(&user, &id).await?;
            output_success(&output_format, &format!("Deleted token {}", id), Some(json!({ "id": id })))
        }
    }
}
