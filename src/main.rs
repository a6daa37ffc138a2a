fn main() {
    pretty_env_logger::init();

    if let Err(err) = searchset::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
