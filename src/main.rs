use std::process;

fn main() {
    if let Err(err) = legend_sim::app::run() {
        eprintln!("fatal: {err:#}");
        process::exit(1);
    }
}
