use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use fitness_gateway::db::{UserCreate, UserStoreError};
use fitness_gateway::types::ProviderName;
use fitness_gateway::{
    DatabaseConfig, UserRole, UserStore, create_app, create_connection, ensure_schema,
    load_gateway_config,
};

#[derive(Parser)]
#[command(name = "fitness-gateway")]
#[command(about = "Token-based authentication gateway for the fitness API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway HTTP server
    Server {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
    /// Initialize the database
    Init {
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
    /// Seed an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fitness_gateway=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { port, db_url } => {
            let gateway = load_gateway_config()?;

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for gateway server: {}", db_config.url);

            let app = create_app(gateway, db_config).await?;

            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
            info!("Gateway listening on http://0.0.0.0:{}", port);

            axum::serve(listener, app).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for initialization: {}", db_config.url);

            info!("Initializing database...");
            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
            db_url,
        } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;

            let email = fitness_gateway::auth::normalize_email(&email);
            let password_hash = fitness_gateway::auth::hash_password(&password)?;

            let store = UserStore::new(db);
            let create = UserCreate {
                email: email.clone(),
                password_hash: Some(password_hash),
                first_name,
                last_name,
                role: UserRole::Admin,
                provider: ProviderName::local(),
                provider_id: None,
                avatar_url: None,
            };

            match store.create(create).await {
                Ok(user) => {
                    println!("Administrator account created.");
                    println!();
                    println!("  Email: {}", user.email);
                    println!("  Role:  {}", user.role.as_str());
                }
                Err(UserStoreError::DuplicateEmail) => {
                    println!("An account with email '{}' already exists.", email);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}
