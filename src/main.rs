fn main() {
    if let Err(err) = csv_converter::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
