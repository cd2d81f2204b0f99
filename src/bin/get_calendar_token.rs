use physcal::components::google_calendar::{BrowserAuthorizer, InteractiveAuthorizer, TokenManager};
use physcal::config::Config;
use physcal::error::BotResult;

#[tokio::main]
async fn main() -> BotResult<()> {
    // Load configuration
    let config = Config::load()?;

    let token_manager = TokenManager::new(&config, reqwest::Client::new());
    let secrets = token_manager.load_secrets()?;

    // Always run the consent flow, replacing whatever token is stored
    let authorizer = BrowserAuthorizer::new(token_manager.clone(), config.redirect_port);
    let token = authorizer.authorize(&secrets).await?;
    token_manager.save_token(&token)?;

    println!("Token successfully saved to {}!", config.token_path.display());

    Ok(())
}
