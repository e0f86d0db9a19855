fn main() {
    if let Err(err) = csv_drift::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
