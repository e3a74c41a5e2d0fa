//! IBCI CLI entry point.

fn main() {
    if let Err(e) = ibci::cli::run_cli() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
