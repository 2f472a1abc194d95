use podman_compose_updater::{args, run_app};

#[tokio::main]
async fn main() {
    // Parse and validate command-line arguments
    let args = args::args_checks();

    // Run the application logic
    if let Err(e) = run_app(&args).await {
        eprintln!("Application error: {e}");
        std::process::exit(1);
    }
}
