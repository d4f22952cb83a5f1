use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::prelude::*;
use std::sync::Arc;

use herald::commands::{PingCommand, PrefixCommand, SetPrefixCommand};
use herald::core::Config;
use herald::dispatch::{
    DispatchHandler, Dispatcher, GuildConfigFile, JsonSink, LevelPermissionProvider,
    MemoryGuildStore,
};

/// Permission level needed to change a guild's prefix
const MANAGE_PREFIX_LEVEL: u8 = 5;

fn load_guild_store(config: &Config) -> MemoryGuildStore {
    let Some(path) = config.guild_config_path.as_deref() else {
        return MemoryGuildStore::new();
    };

    match GuildConfigFile::load(path) {
        Ok(file) => {
            let store = MemoryGuildStore::from_file(&file);
            info!("📄 Loaded {} guild prefix overrides from {path}", store.len());
            store
        }
        Err(e) => {
            if std::path::Path::new(path).exists() {
                error!("❌ Failed to load guild config from {path}: {e}");
            } else {
                warn!("📄 No guild config found at {path} - starting without overrides");
            }
            MemoryGuildStore::new()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting command dispatcher...");

    let options = config.dispatch.clone();
    let guild_store = Arc::new(load_guild_store(&config));
    let permissions = Arc::new(LevelPermissionProvider::new(
        options.owner_id,
        options.owner_permission_level,
    ));

    let dispatcher = Dispatcher::builder(options.clone())
        .guild_store(guild_store.clone())
        .permissions(permissions)
        .sink(Arc::new(JsonSink::new(options.log_to_console)))
        .command(Arc::new(PingCommand))?
        .command(Arc::new(PrefixCommand::new(
            options.prefix.clone(),
            guild_store.clone(),
        )))?
        .command(Arc::new(SetPrefixCommand::new(
            guild_store,
            MANAGE_PREFIX_LEVEL,
        )))?
        .build()?;

    let handler = DispatchHandler::new(Arc::new(dispatcher));

    let mut intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    if options.parse_direct_messages {
        intents |= GatewayIntents::DIRECT_MESSAGES;
    }

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("Establishing WebSocket connection to Discord gateway...");
    info!("Gateway intents: {intents:?}");

    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    Ok(())
}
