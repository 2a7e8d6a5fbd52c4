use std::fmt::Display;

pub type Result<T> = std::result::Result<T, String>;

pub fn handle_error_and_exit(err: String) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}

/// Prefixes an I/O or parsing error with the file it concerns.
pub fn file_error(path: impl Display, err: impl Display) -> String {
    format!("{}: {}", path, err)
}
