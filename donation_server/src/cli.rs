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
    // Keys and the gateway public key are deliberately absent
    const DISPLAY_ENVS: [&str; 19] = [
        "RUST_LOG",
        "DPG_HOST",
        "DPG_PORT",
        "DPG_DATABASE_URL",
        "DPG_PUBLIC_BASE_URL",
        "DPG_USE_X_FORWARDED_FOR",
        "DPG_USE_FORWARDED",
        "DPG_GATEWAY_API_URL",
        "DPG_GATEWAY_URL",
        "DPG_GATEWAY_TIMEOUT",
        "DPG_CONFIG_CACHE_TTL",
        "DPG_VENDOR_SN",
        "DPG_APP_ID",
        "DPG_TERMINAL_SN",
        "DPG_DEVICE_ID",
        "DPG_MERCHANT_NAME",
        "DPG_STORE_NAME",
        "DPG_HEARTBEAT_INTERVAL",
        "DPG_HEARTBEAT_TIMEOUT",
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
