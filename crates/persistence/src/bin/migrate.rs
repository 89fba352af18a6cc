#![deny(warnings)]

use persistence::{default_sqlite_url, load_name_file, IdentityReturn, SqliteStore};
use std::path::Path;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .or_else(|| std::env::var("ROSTER_DATABASE_URL").ok())
        .unwrap_or_else(|| default_sqlite_url().to_string());
    let store = SqliteStore::connect(&url, IdentityReturn::Ids)?;
    // Optional second argument: YAML name pool to load into the name tables.
    if let Some(names) = args.next() {
        let pool = load_name_file(Path::new(&names))?;
        let written = store.seed_names(&pool)?;
        println!("Seeded {} names from {}", written, names);
    }
    store.close();
    println!("DB migrated at {}", url);
    Ok(())
}
