//! pingtest - command-line entry point

use clap::Parser;
use pingtest::{app::App, cli::Cli, error::AppError, VERSION};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue at: {}/issues", pingtest::PROJECT_URL);
    }));

    let cli = Cli::parse();

    if cli.version {
        println!("{}", VERSION);
        return;
    }

    if let Err(message) = cli.validate() {
        eprintln!("{}", AppError::validation(message).format_for_console(cli.use_colors()));
        process::exit(1);
    }

    let use_colors = cli.use_colors();
    let result = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{}", e.format_for_console(use_colors));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    if let AppError::Config(_) = error {
        eprintln!();
        eprintln!("Configuration help:");
        eprintln!("  - Check your .env file and PINGTEST_* variables");
        eprintln!("  - Mirrors must be http(s) URLs ending in '/'");
        eprintln!("  - Concurrency must be 1-1000, attempts 1-10");
    }
}
