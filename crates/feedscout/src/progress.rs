use indicatif::ProgressStyle;

pub fn feed_spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<10} {spinner:.cyan.bold} [{elapsed_precise}] iterations {pos} • {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner())
    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}
