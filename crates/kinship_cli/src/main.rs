//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `kinship_core` linkage and
//!   schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("kinship_core ping={}", kinship_core::ping());
    println!("kinship_core version={}", kinship_core::core_version());

    match kinship_core::db::open_db_in_memory() {
        Ok(_) => println!("kinship_core schema=ok"),
        Err(err) => {
            eprintln!("kinship_core schema=error {err}");
            std::process::exit(1);
        }
    }
}
