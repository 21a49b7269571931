use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 19] = [
        "RUST_LOG",
        "WPG_HOST",
        "WPG_PORT",
        "WPG_DATABASE_URL",
        "WPG_DB_MAX_CONNECTIONS",
        "WPG_USE_X_FORWARDED_FOR",
        "WPG_USE_FORWARDED",
        "WPG_LEDGER_MAX_RETRIES",
        "WPG_RECONCILE_ENABLED",
        "WPG_RECONCILE_INTERVAL",
        "WPG_RECONCILE_MIN_AGE",
        "WPG_RECONCILE_BATCH_SIZE",
        "WPG_RECONCILE_PROVIDER_SPACING_MS",
        "WPG_MIDTRANS_ENABLED",
        "WPG_MIDTRANS_BASE_URL",
        "WPG_TRIPAY_ENABLED",
        "WPG_TRIPAY_BASE_URL",
        "WPG_GATEWAY_REQUEST_TIMEOUT",
        "WPG_GATEWAY_CONNECT_TIMEOUT",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
