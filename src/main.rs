fn main() {
    if let Err(err) = hsis_prep::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
