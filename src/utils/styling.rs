//! Terminal styling utilities for the analysis console output

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji, Style};

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ERROR: Emoji<'_, '_> = Emoji("❌ ", "[x] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static MOUNTAIN: Emoji<'_, '_> = Emoji("🏔️  ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static IMAGES: Emoji<'_, '_> = Emoji("🖼️  ", "");
pub static SEED: Emoji<'_, '_> = Emoji("🎲 ", "");
pub static SPLIT: Emoji<'_, '_> = Emoji("✂️  ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "");

/// Colour palette used by the output helpers.
///
/// Colours are stored as `#RRGGBB` strings and resolved to the nearest
/// xterm-256 colour when styling terminal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub primary: String,
    pub accent: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: "#2E86AB".to_string(),
            accent: "#F18F01".to_string(),
        }
    }
}

impl Palette {
    pub fn primary_style(&self) -> Style {
        hex_style(&self.primary)
    }

    pub fn accent_style(&self) -> Style {
        hex_style(&self.accent)
    }
}

/// Build a foreground style from a `#RRGGBB` colour, falling back to an
/// unstyled `Style` when the string does not parse.
pub fn hex_style(hex: &str) -> Style {
    match parse_hex(hex) {
        Some((r, g, b)) => Style::new().color256(rgb_to_ansi256(r, g, b)),
        None => Style::new(),
    }
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Map an RGB triple onto the 6x6x6 colour cube of the xterm-256 palette.
pub fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
    let level = |c: u8| -> u8 {
        if c < 48 {
            0
        } else if c < 115 {
            1
        } else {
            (c - 35) / 40
        }
    };
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

/// Print the application banner
pub fn print_banner(version: &str, palette: &Palette) {
    let banner = r#"
    ███████╗ ██████╗ █████╗ ██████╗ ██████╗
    ██╔════╝██╔════╝██╔══██╗██╔══██╗██╔══██╗
    ███████╗██║     ███████║██████╔╝██████╔╝
    ╚════██║██║     ██╔══██║██╔══██╗██╔═══╝
    ███████║╚██████╗██║  ██║██║  ██║██║
    ╚══════╝ ╚═════╝╚═╝  ╚═╝╚═╝  ╚═╝╚═╝
    "#;

    println!();
    println!("{}", palette.primary_style().bold().apply_to(banner));
    println!(
        "    {}{}",
        MOUNTAIN,
        style("Landslide susceptibility analysis").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print configuration card
pub fn print_config(
    input: &Path,
    images_dir: &Path,
    seed: u64,
    test_size: f64,
    palette: &Palette,
) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        palette.primary_style().bold().apply_to("⚙️  Configuration"),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!(
        "    │  {} Raster: {:<39}│",
        FOLDER,
        truncate_path(input, 38)
    );
    println!(
        "    │  {} Images: {:<39}│",
        IMAGES,
        truncate_path(images_dir, 38)
    );
    println!("    ├{}┤", line);
    println!(
        "    │  {} Random seed:     {:<30}│",
        SEED,
        palette.accent_style().apply_to(seed)
    );
    println!(
        "    │  {} Test partition:  {:<30}│",
        SPLIT,
        palette
            .accent_style()
            .apply_to(format!("{:.0}%", test_size * 100.0))
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str, palette: &Palette) {
    println!();
    println!(
        "    {} {} {}",
        palette
            .primary_style()
            .bold()
            .apply_to(format!("STEP {}", step_num)),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("    {}{}", WARN, style(message).yellow());
}

/// Print a fatal error, including its cause chain
pub fn print_error(error: &anyhow::Error) {
    eprintln!();
    eprintln!("    {}{}", ERROR, style(format!("{:#}", error)).red().bold());
}

/// Print the message shown when the run is interrupted with Ctrl-C
pub fn print_interrupted() {
    eprintln!();
    eprintln!();
    eprintln!(
        "    {}{}",
        WARN,
        style("Analysis interrupted by user").yellow().bold()
    );
}

/// Print the elapsed time of a step
pub fn print_step_time(elapsed: Duration) {
    println!(
        "    {}{}",
        CLOCK,
        style(format!("{:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print a labelled count with an optional percentage
pub fn print_count(description: &str, count: usize, total: Option<usize>) {
    match total {
        Some(total) if total > 0 => println!(
            "      {} {} {}",
            style(count).yellow().bold(),
            description,
            style(format!("({:.1}%)", count as f64 / total as f64 * 100.0)).dim()
        ),
        _ => println!("      {} {}", style(count).yellow().bold(), description),
    }
}

/// Print the final completion message
pub fn print_completion(palette: &Palette) {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        palette.primary_style().bold().apply_to("Analysis complete!")
    );
    println!();
}

// Helper functions

fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let tail: String = s
            .chars()
            .rev()
            .take(max_len.saturating_sub(3))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{}", tail)
    }
}
