fn main() {
    if let Err(e) = testvault::cli::run() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
}
