//! Mints a bearer token for an owner id, signed with JWT_SECRET.
//! Usage: issue_token <owner_id> [hours]
use campaign_studio::config::AppConfig;
use campaign_studio::middleware::auth::JwtKeys;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let owner_id = match args.next() {
        Some(owner) if !owner.trim().is_empty() => owner,
        _ => {
            eprintln!("❌ Usage: issue_token <owner_id> [hours]");
            std::process::exit(2);
        }
    };
    let hours: i64 = args.next().map(|h| h.parse()).transpose()?.unwrap_or(24);

    let config = AppConfig::from_env()?;
    let token = JwtKeys::new(&config.jwt_secret).issue_token(&owner_id, chrono::Duration::hours(hours))?;

    println!("🔐 Token for {} (valid {}h):", owner_id, hours);
    println!("{}", token);
    Ok(())
}
