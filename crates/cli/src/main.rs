//! Clementine CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! clementine-cli migrate
//!
//! # Create an admin user
//! clementine-cli admin create -e admin@example.com -n "Admin Name" -p <password>
//!
//! # Seed the catalog and coupons with demo data
//! clementine-cli seed
//!
//! # Delete expired sessions and carts (passive TTL sweep)
//! clementine-cli sweep sessions
//! clementine-cli sweep carts
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout)] // CLI output goes to stdout by design

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sqlx::PgPool;

use clementine_core::{DiscountKind, UserRole};
use clementine_server::db::coupons::NewCoupon;
use clementine_server::db::products::NewProduct;
use clementine_server::db::users::UserRepository;
use clementine_server::db::{
    CartRepository, CouponRepository, ProductRepository, SessionRepository, create_pool,
};
use clementine_server::services::auth::hash_password;

#[derive(Parser)]
#[command(name = "clementine-cli")]
#[command(author, version, about = "Clementine CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database with demo products and coupons
    Seed,
    /// Delete rows whose TTL has passed
    Sweep {
        #[command(subcommand)]
        target: SweepTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Password (min 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SweepTarget {
    /// Delete expired session rows
    Sessions,
    /// Delete carts past their retention window
    Carts,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clementine_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let pool = connect().await?;

    match cli.command {
        Commands::Migrate => migrate(&pool).await?,
        Commands::Admin {
            action: AdminAction::Create {
                email,
                name,
                password,
            },
        } => create_admin(&pool, &email, &name, &password).await?,
        Commands::Seed => seed(&pool).await?,
        Commands::Sweep { target } => sweep(&pool, &target).await?,
    }

    Ok(())
}

/// Connect using `CLEMENTINE_DATABASE_URL` (or `DATABASE_URL`).
async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let url = std::env::var("CLEMENTINE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| "CLEMENTINE_DATABASE_URL (or DATABASE_URL) must be set")?;

    Ok(create_pool(&SecretString::from(url)).await?)
}

/// Apply pending migrations from the server crate.
async fn migrate(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    sqlx::migrate!("../server/migrations").run(pool).await?;
    println!("Migrations applied");
    Ok(())
}

/// Create an admin account.
async fn create_admin(
    pool: &PgPool,
    email: &str,
    name: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if password.len() < 8 {
        return Err("password must be at least 8 characters".into());
    }

    let email = clementine_core::Email::parse(email)?;
    let password_hash = hash_password(password).map_err(|e| e.to_string())?;

    let user = UserRepository::new(pool)
        .create(name, &email, &password_hash, UserRole::Admin)
        .await?;

    println!("Admin user {} created (id {})", user.email, user.id);
    Ok(())
}

/// Seed demo products and coupons.
async fn seed(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let products = ProductRepository::new(pool);
    let coupons = CouponRepository::new(pool);

    let catalog = [
        ("Keepsake Mug", "keepsake-mug", "Stoneware mug, 350 ml.", "14.50", 120),
        ("Linen Tote", "linen-tote", "Natural linen tote bag.", "24.00", 80),
        ("Beeswax Candle", "beeswax-candle", "Hand-poured, 40h burn.", "19.99", 60),
        ("Walnut Coaster Set", "walnut-coaster-set", "Set of four.", "32.00", 45),
        ("Field Notebook", "field-notebook", "Dot grid, 96 pages.", "9.75", 200),
    ];

    for (name, slug, description, price, stock) in catalog {
        let product = products
            .create(&NewProduct {
                name: name.to_owned(),
                slug: slug.to_owned(),
                description: description.to_owned(),
                price: price.parse()?,
                stock,
                image_url: None,
            })
            .await?;
        println!("Seeded product {} ({})", product.name, product.slug);
    }

    let welcome = coupons
        .create(&NewCoupon {
            code: "WELCOME10".to_owned(),
            description: Some("10% off your first order".to_owned()),
            kind: DiscountKind::Percentage,
            value: "10".parse()?,
            min_purchase: "20".parse()?,
            max_discount: Some("25".parse()?),
            usage_limit: None,
            valid_until: Utc::now() + Duration::days(365),
        })
        .await?;
    println!("Seeded coupon {}", welcome.code);

    let flat = coupons
        .create(&NewCoupon {
            code: "SAVE10".to_owned(),
            description: Some("$10 off orders over $20".to_owned()),
            kind: DiscountKind::Fixed,
            value: "10".parse()?,
            min_purchase: "20".parse()?,
            max_discount: None,
            usage_limit: Some(500),
            valid_until: Utc::now() + Duration::days(90),
        })
        .await?;
    println!("Seeded coupon {}", flat.code);

    Ok(())
}

/// Delete expired rows.
async fn sweep(pool: &PgPool, target: &SweepTarget) -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();
    let removed = match target {
        SweepTarget::Sessions => SessionRepository::new(pool).purge_expired(now).await?,
        SweepTarget::Carts => CartRepository::new(pool).purge_expired(now).await?,
    };
    println!("Removed {removed} expired rows");
    Ok(())
}
