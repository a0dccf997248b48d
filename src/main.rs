fn main() {
    match dmct::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(err.exit_code());
        }
    }
}
