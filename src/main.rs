mod cli;
mod core;
mod logging;

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(e) = cli::run_main().await {
        crate::core::terminal::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
