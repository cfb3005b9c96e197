fn main() {
    if let Err(err) = aggregator_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
