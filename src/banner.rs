// src/banner.rs

/// Prints the application startup banner to stderr, keeping stdout for command output.
pub fn print_banner() {
    // Using a raw string literal for the multi-line banner
    let banner = r#"
 _____    _       __  __ _       _
| ____|__| |_   _|  \/  (_)_ __ | |_
|  _| / _` | | | | |\/| | | '_ \| __|
| |__| (_| | |_| | |  | | | | | | |_
|_____\__,_|\__,_|_|  |_|_|_| |_|\__|

    Problem Generation Client
"#;
    eprintln!("{}", banner);
}
