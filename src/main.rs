fn main() {
    if let Err(err) = meiliscan::cli::run() {
        meiliscan::ui::eprintln_error(&err);
        std::process::exit(meiliscan::exit::exit_code(&err));
    }
}
