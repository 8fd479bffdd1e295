// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::rt::System;
use actix_web::{App, HttpServer, middleware::Logger, web};
use log::{LevelFilter, info};
use std::io::Write;
use std::sync::Arc;

mod admin;
mod api;
mod app_state;
mod audit;
mod config;
mod csrf;
mod iam;
mod runtime_paths;
mod security;

use app_state::AppState;
use config::ValidatedConfig;
use csrf::CsrfValidationMiddlewareFactory;
use iam::FileUserStore;
use iam::store::bootstrap_users_file;
use runtime_paths::RuntimePaths;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let parsed_args = match parse_args() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("❌ Invalid command line arguments: {}", error);
            eprintln!("❌ Use -C <root> to set the runtime directory.");
            return 1;
        }
    };

    if matches!(parsed_args.mode, RunMode::Help) {
        print!("{}", help_text());
        return 0;
    }

    let runtime_paths = match RuntimePaths::from_root(&parsed_args.runtime_root) {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("❌ Runtime directory error: {}", error);
            return 1;
        }
    };

    let (validated_config, created_config) = match config::load_or_create(&runtime_paths.config_file)
    {
        Ok(result) => result,
        Err(error) => {
            eprintln!("❌ Configuration error: {}", error);
            eprintln!("❌ Application cannot start with invalid configuration.");
            return 1;
        }
    };

    let created_users = match bootstrap_users_file(&runtime_paths.users_file) {
        Ok(created) => created,
        Err(error) => {
            eprintln!("❌ Users bootstrap error: {}", error);
            return 1;
        }
    };
    if created_config || created_users {
        eprintln!("[bootstrap] review the generated files before exposing the server");
    }

    let result = System::new().block_on(run_server(validated_config, runtime_paths));
    match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("❌ Server failed to start: {}", error);
            1
        }
    }
}

async fn run_server(
    validated_config: ValidatedConfig,
    runtime_paths: RuntimePaths,
) -> std::io::Result<()> {
    let validated_config = Arc::new(validated_config);

    // Parse log level from config
    let log_level = match validated_config.logging.level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    // Configure logging with a stable format
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .map_err(|error| std::io::Error::other(error.to_string()))?;

    log_startup_info(&validated_config, &runtime_paths);

    let user_store = match FileUserStore::new(runtime_paths.users_file.clone()) {
        Ok(store) => Arc::new(store),
        Err(error) => {
            eprintln!("❌ Failed to initialize user store: {}", error);
            return Err(std::io::Error::other(error.to_string()));
        }
    };

    let app_state = web::Data::new(AppState::new(
        validated_config.clone(),
        runtime_paths,
        user_store,
    ));
    info!("✅ App state initialized for {}", validated_config.app.name);

    // Leave the intake maximum plus headroom; anything larger fails the
    // validators anyway and there is no reason to buffer it.
    let payload_limit =
        ((validated_config.uploads.intake.max_file_size_mb + 2) * 1024 * 1024) as usize;

    let workers = validated_config.server.workers;
    let address = (
        validated_config.server.host.clone(),
        validated_config.server.port,
    );

    let factory = move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(web::PayloadConfig::new(payload_limit))
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .wrap(CsrfValidationMiddlewareFactory)
            .configure(api::configure)
    };

    HttpServer::new(factory)
        .workers(workers)
        .bind(address)?
        .run()
        .await
}

fn log_startup_info(config: &ValidatedConfig, runtime_paths: &RuntimePaths) {
    info!("Starting {} - {}", config.app.name, config.app.description);
    info!("Workers: {}", config.server.workers);
    info!(
        "Listening on {}:{}",
        config.server.host, config.server.port
    );
    info!(
        "Uploads directory (canonical): {}",
        runtime_paths.uploads_dir.display()
    );
    info!(
        "State directory (canonical): {}",
        runtime_paths.state_dir.display()
    );
    info!("Config file: {}", runtime_paths.config_file.display());
    info!("Users file: {}", runtime_paths.users_file.display());
    info!("Runtime root: {}", runtime_paths.root.display());
    info!(
        "Admin session timeout: {} minutes (warning at {} seconds)",
        config.security.admin_session.timeout_minutes, config.security.admin_session.warning_seconds
    );
}

#[derive(Debug)]
enum RunMode {
    Serve,
    Help,
}

#[derive(Debug)]
struct ParsedArgs {
    runtime_root: std::path::PathBuf,
    mode: RunMode,
}

fn parse_args() -> Result<ParsedArgs, String> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<ParsedArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    if args.iter().any(|arg| is_help_flag(arg)) {
        return Ok(ParsedArgs {
            runtime_root: std::path::PathBuf::from("."),
            mode: RunMode::Help,
        });
    }

    let mut args = args.into_iter();
    let mut runtime_root = std::path::PathBuf::from(".");

    while let Some(arg) = args.next() {
        if arg == "--" {
            continue;
        } else if arg == "-C" {
            let value = args
                .next()
                .ok_or_else(|| "Missing value for -C".to_string())?;
            runtime_root = std::path::PathBuf::from(value);
        } else {
            return Err(format!("Unknown argument '{}'", arg));
        }
    }

    let runtime_root = make_runtime_root_absolute(runtime_root)?;

    Ok(ParsedArgs {
        runtime_root,
        mode: RunMode::Serve,
    })
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help"
}

fn make_runtime_root_absolute(
    runtime_root: std::path::PathBuf,
) -> Result<std::path::PathBuf, String> {
    if runtime_root.is_absolute() {
        return Ok(runtime_root);
    }

    let current_dir = std::env::current_dir()
        .map_err(|error| format!("Failed to resolve current directory: {}", error))?;
    Ok(current_dir.join(runtime_root))
}

fn help_text() -> String {
    "immoshot - portal server for the ImmoShot photo editing service\n\
     \n\
     Usage: immoshot [-C <root>]\n\
     \n\
     Options:\n\
     \x20\x20-C <root>    Runtime directory (config.yaml, users.yaml, uploads/, state/)\n\
     \x20\x20-h, --help   Show this help\n"
        .to_string()
}
