fn main() {
    urg_pipeline::cli::run();
}
