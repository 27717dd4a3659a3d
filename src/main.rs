fn main() {
    if let Err(err) = cloudviz_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
