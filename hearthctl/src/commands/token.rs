//! Token command. Mints session tokens outside the login flow. This is
//! also the only path that creates admin profiles; the registration
//! endpoint refuses the role.

use anyhow::{bail, Context, Result};
use clap::Args;
use letting::Role;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Path to the SQLite database
    #[arg(long, env = "HEARTH_DB")]
    pub db: PathBuf,

    /// Profile email to mint a token for
    #[arg(long)]
    pub email: String,

    /// Expected role; the mint is refused if the stored profile differs
    #[arg(long)]
    pub role: String,

    /// HS256 signing secret (same one the service runs with)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Token lifetime, humantime style (e.g. 12h, 30m)
    #[arg(long, default_value = "12h")]
    pub ttl: String,

    /// Create the profile if missing. Only valid with --role admin.
    #[arg(long)]
    pub create_admin: bool,

    /// Password for a newly created admin profile
    #[arg(long, requires = "create_admin")]
    pub password: Option<String>,

    /// Display name for a newly created admin profile
    #[arg(long, default_value = "Administrator")]
    pub display_name: String,
}

pub fn run(args: TokenArgs) -> Result<()> {
    let role: Role = args
        .role
        .parse()
        .map_err(|e: letting::UnknownVariant| anyhow::anyhow!(e))?;
    let ttl = humantime::parse_duration(&args.ttl)
        .with_context(|| format!("parsing --ttl {}", args.ttl))?;
    if args.secret.len() < 32 {
        bail!("secret must be at least 32 bytes");
    }
    if args.create_admin && role != Role::Admin {
        bail!("--create-admin only makes sense with --role admin");
    }

    let store = hearth_store::Store::open(&args.db)
        .with_context(|| format!("opening database at {}", args.db.display()))?;

    let profile = match store.profile_by_email(&args.email)? {
        Some(profile) => {
            if profile.role != role {
                bail!(
                    "{} is registered as {}, not {}",
                    args.email,
                    profile.role,
                    role
                );
            }
            profile
        }
        None if args.create_admin => {
            let Some(password) = args.password.as_deref() else {
                bail!("--password is required when creating an admin profile");
            };
            if password.len() < 8 {
                bail!("password must be at least 8 characters");
            }
            let pepper = std::env::var("HEARTH_PEPPER").ok();
            let password_hash = hearth_web::auth::hash_password(password, pepper.as_deref())?;
            let profile = store.create_profile(hearth_store::NewProfile {
                email: args.email.clone(),
                password_hash,
                display_name: args.display_name.clone(),
                phone: None,
                role: Role::Admin,
            })?;
            eprintln!("✓ Created admin profile {}", profile.email);
            profile
        }
        None => bail!("no profile registered under {}", args.email),
    };

    let token = hearth_web::auth::issue_token(&profile, &args.secret, ttl)?;
    println!("{}", token);
    Ok(())
}
