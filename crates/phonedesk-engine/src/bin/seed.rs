//! # Seed Data Generator
//!
//! Populates the database with demo handsets for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 units into the configured database (default)
//! cargo run -p phonedesk-engine --bin seed
//!
//! # Generate custom amount
//! cargo run -p phonedesk-engine --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p phonedesk-engine --bin seed -- --db ./data/phonedesk.db
//! ```
//!
//! Without `--db` the path comes from `engine.toml` / `PHONEDESK_DB_PATH`.
//!
//! ## Generated Inventory
//! Every unit is a separate row (one IMEI, one sale):
//! - Brands: Apple, Samsung, Google, Xiaomi, Motorola
//! - Id: `{BRAND}-{MODEL}-{INDEX}`
//! - Storage variants raise the price
//! - Cost is 70-85% of the selling price
//! - Tax mode cycles through exclusive, inclusive and exempt

use phonedesk_core::{InventoryStatus, Money, TaxRate};
use phonedesk_db::{Database, NewInventoryItem};
use phonedesk_engine::{telemetry, EngineConfig};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Brands and their models with a base price in whole units.
const CATALOG: &[(&str, &str, &[(&str, i64)])] = &[
    (
        "apple",
        "Apple",
        &[("iPhone 15", 799), ("iPhone 15 Pro", 999), ("iPhone 14", 699), ("iPhone SE", 429)],
    ),
    (
        "samsung",
        "Samsung",
        &[("Galaxy S24", 799), ("Galaxy A55", 449), ("Galaxy Z Flip5", 999), ("Galaxy A15", 199)],
    ),
    ("google", "Google", &[("Pixel 8", 699), ("Pixel 8a", 499), ("Pixel 8 Pro", 999)]),
    ("xiaomi", "Xiaomi", &[("Redmi Note 13", 249), ("Xiaomi 14", 899), ("Poco X6", 299)]),
    ("motorola", "Motorola", &[("Moto G84", 279), ("Edge 40", 549)]),
];

/// Storage variants and their price addon.
const STORAGE: &[(&str, i64)] = &[("128GB", 0), ("256GB", 100), ("512GB", 250)];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 1500, 1700];

/// Demo store locations
const LOCATIONS: &[(&str, &str)] = &[("main", "Main Street"), ("mall", "City Mall Kiosk")];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("PhoneDesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of units to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: from engine.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load_or_default(None);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    config.validate()?;

    println!("🌱 PhoneDesk Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!("Units:    {}", count);
    println!();

    let db = Database::new(config.db_config()).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.inventory().count(None).await?;
    if existing > 0 {
        println!("⚠ Database already has {} units", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let inventory = db.inventory();
    for (brand_id, brand_name, _) in CATALOG {
        inventory.upsert_brand(brand_id, brand_name).await?;
    }
    for (location_id, location_name) in LOCATIONS {
        inventory.upsert_location(location_id, location_name).await?;
    }
    println!("✓ {} brands, {} locations", CATALOG.len(), LOCATIONS.len());

    println!();
    println!("Generating units...");

    let mut generated = 0;
    let mut attempts = 0;
    let start = std::time::Instant::now();

    'outer: loop {
        for (brand_id, _, models) in CATALOG {
            for (model, base_price) in models.iter() {
                for (storage, addon) in STORAGE {
                    if generated >= count || attempts >= count * 2 {
                        break 'outer;
                    }

                    let item = generate_unit(brand_id, model, storage, base_price + addon, attempts);
                    attempts += 1;
                    if let Err(e) = inventory.insert(&item).await {
                        warn!(item_id = %item.id, error = %e, "Failed to insert unit");
                        continue;
                    }

                    generated += 1;
                    if generated % 50 == 0 {
                        println!("  Generated {} units...", generated);
                    }
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} units in {:?}", generated, elapsed);
    println!("  Available: {}", inventory.count(Some(InventoryStatus::Available)).await?);
    info!(generated, elapsed_ms = elapsed.as_millis() as u64, "Seed complete");

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds a single sellable unit with deterministic pseudo-random data.
fn generate_unit(brand_id: &str, model: &str, storage: &str, price_units: i64, seed: usize) -> NewInventoryItem {
    let code: String = model
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_uppercase();
    let id = format!("{}-{}-{:05}", brand_id.to_uppercase(), code, seed);

    let selling_price = Money::from_units(price_units);

    // Cost 70-85% of price
    let cost_pct = 70 + (seed % 16) as i64;
    let cost_price = Money::from_raw(selling_price.raw() * cost_pct / 100).round_to_cents();

    let mut item = NewInventoryItem::new(id, format!("{} {}", model, storage), cost_price, selling_price);
    item.brand_id = Some(brand_id.to_string());
    item.tax_rate = TaxRate::from_bps(TAX_RATES[seed % TAX_RATES.len()]);
    match seed % 3 {
        0 => item.is_tax_inclusive = true,
        1 => item.is_tax_exempt = true,
        _ => {}
    }
    item
}
