//! Standalone reconciliation audit
//!
//! Usage: `audit [--env <name>]` (loads `config/<name>.yaml`, default `dev`).
//! Exits 1 when the ledger is not zero-sum or any balance has drifted.

use anyhow::Context;

use payflow::config::AppConfig;
use payflow::db::Database;
use payflow::ledger::LedgerAudit;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).with_context(|| format!("loading config for '{}'", env))?;
    payflow::logging::init_cli_logging("warn");

    let db = Database::connect(&config.database.url, 1)
        .await
        .context("connecting to PostgreSQL")?;

    println!("=== Ledger Reconciliation Audit ({}) ===", env);

    let report = LedgerAudit::new(db.pool().clone())
        .run()
        .await
        .context("running reconciliation")?;

    for m in &report.mismatches {
        println!(
            "❌ MISMATCH account {}: balance {}, entry sum {}",
            m.account_id, m.balance, m.entry_sum
        );
    }

    println!("-------------------------------------------");
    if report.passed {
        println!("✅ AUDIT PASSED: global sum 0, no drifted balances");
        Ok(())
    } else {
        println!(
            "⚠️ AUDIT FAILED: global sum {}, mismatches {}",
            report.global_sum,
            report.mismatches.len()
        );
        std::process::exit(1);
    }
}
