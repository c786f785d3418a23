fn main() {
    let args = std::env::args();

    if let Err(err) = filebind::run(args) {
        eprintln!("filebind error: {err:#}");
        std::process::exit(1);
    }
}
