use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Color as CtColor, Stylize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::download::{JobStatus, JobView};
use crate::search::PublicTrack;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 255,
    };
    pub const MAGENTA: Color = Color::Rgb {
        r: 255,
        g: 0,
        b: 255,
    };
    pub const PURPLE: Color = Color::Rgb {
        r: 180,
        g: 100,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 136,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const YELLOW: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const BLUE: Color = Color::Rgb {
        r: 100,
        g: 149,
        b: 237,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Box Drawing Characters
// ═══════════════════════════════════════════════════════════════════════════════

pub mod box_chars {
    pub const SINGLE_HORIZONTAL: &str = "─";
    pub const SINGLE_VERTICAL: &str = "│";

    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";

    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";

    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Banner and Prompt
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_banner(download_dir: &str, automation_url: &str) {
    println!(
        "{}{}{}",
        "  pezzottify".with(colors::CYAN).bold(),
        " ▸ ".with(colors::PURPLE).bold(),
        "fetcher".with(colors::MAGENTA).bold()
    );
    println!(
        "{}",
        "  ═══════════════════════════════════════════════".with(colors::DIM)
    );
    print_key_value("Downloads", download_dir);
    print_key_value("Automation", automation_url);
    println!();
}

pub fn get_prompt() -> String {
    format!(
        "{}{} ",
        "♪".with(colors::CYAN).bold(),
        "❯".with(colors::MAGENTA).bold(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Indicators
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.to_string().with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    println!(
        " {} {}",
        box_chars::CROSS_MARK.to_string().with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::ORANGE).bold(),
        message.with(colors::ORANGE)
    );
}

pub fn print_info(message: &str) {
    println!(
        " {} {}",
        "ℹ".with(colors::BLUE).bold(),
        message.with(colors::BLUE)
    );
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::PURPLE),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        box_chars::BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Formatting Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Cuts `text` to at most `max_width` terminal columns, marking the cut
/// with an ellipsis.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// `m:ss`, or a dash when the duration is unknown.
pub fn format_duration(seconds: u32) -> String {
    if seconds == 0 {
        return "-".to_string();
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn status_color(status: JobStatus) -> CtColor {
    match status {
        JobStatus::Queued => colors::DIM,
        JobStatus::Preparing => colors::YELLOW,
        JobStatus::Downloading | JobStatus::Saving => colors::CYAN,
        JobStatus::Done => colors::GREEN,
        JobStatus::Failed => colors::RED,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table Display
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: Vec<&str>) -> Self {
        let col_widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        TableBuilder {
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
            col_widths,
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (i, cell) in row.iter().enumerate() {
            if i < self.col_widths.len() {
                self.col_widths[i] = self.col_widths[i].max(cell.width());
            }
        }
        self.rows.push(row);
    }

    fn print_border(&self, left: &str, junction: &str, right: &str) {
        print!("{}", left.with(colors::CYAN));
        for (i, width) in self.col_widths.iter().enumerate() {
            print!(
                "{}",
                box_chars::SINGLE_HORIZONTAL
                    .repeat(width + 2)
                    .with(colors::CYAN)
            );
            if i + 1 < self.col_widths.len() {
                print!("{}", junction.with(colors::CYAN));
            }
        }
        println!("{}", right.with(colors::CYAN));
    }

    pub fn print(&self) {
        self.print_border(
            box_chars::ROUND_TOP_LEFT,
            box_chars::T_TOP,
            box_chars::ROUND_TOP_RIGHT,
        );

        print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
        for (i, header) in self.headers.iter().enumerate() {
            let padding = self.col_widths[i] - header.width();
            print!(
                " {}{} ",
                header.clone().with(colors::CYAN).bold(),
                " ".repeat(padding)
            );
            print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
        }
        println!();

        self.print_border(box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT);

        for row in &self.rows {
            print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
            for (i, cell) in row.iter().enumerate() {
                let width = self.col_widths.get(i).unwrap_or(&0);
                let padding = width.saturating_sub(cell.width());
                print!(
                    " {}{} ",
                    cell.clone().with(colors::WHITE),
                    " ".repeat(padding)
                );
                print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
            }
            println!();
        }

        self.print_border(
            box_chars::ROUND_BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::ROUND_BOTTOM_RIGHT,
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Search Results and Jobs
// ═══════════════════════════════════════════════════════════════════════════════

const TITLE_COLUMN_WIDTH: usize = 36;
const ARTIST_COLUMN_WIDTH: usize = 24;

pub fn print_track_table(tracks: &[PublicTrack]) {
    if tracks.is_empty() {
        print_empty_list("No results");
        return;
    }
    let mut table = TableBuilder::new(vec!["#", "Title", "Artist", "Album", "Time", "DL"]);
    for track in tracks {
        table.add_row(vec![
            track.index.to_string(),
            truncate_to_width(&track.title, TITLE_COLUMN_WIDTH),
            truncate_to_width(&track.artist, ARTIST_COLUMN_WIDTH),
            truncate_to_width(&track.album, ARTIST_COLUMN_WIDTH),
            format_duration(track.duration),
            if track.downloadable { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.print();
}

pub fn print_job_line(job: &JobView) {
    let color = status_color(job.status);
    println!(
        "  {} {} {} {:>3}% {} {}",
        box_chars::BULLET.with(color),
        job.id.as_str().with(colors::DIM),
        format!("{:<11}", job.status.as_str()).with(color).bold(),
        job.progress,
        truncate_to_width(&job.title, TITLE_COLUMN_WIDTH).with(colors::WHITE),
        job.artist.as_str().with(colors::DIM)
    );
}

pub fn print_job_details(job: &JobView) {
    print_job_line(job);
    print_key_value("Phase", &job.phase);
    print_key_value("Setting", job.download_setting.as_str());
    if !job.album.is_empty() {
        print_key_value("Album", &job.album);
    }
    if let Some(error) = &job.error {
        print_error(error);
    }
    if let Some(song) = &job.song {
        print_key_value("File", &song.filename);
        print_key_value("Song id", &song.id);
    }
    if let Some(bytes) = job.total_bytes {
        print_key_value("Size", &format!("{} bytes", bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate_to_width("Queen", 10), "Queen");
    }

    #[test]
    fn test_truncate_respects_wide_chars() {
        let cut = truncate_to_width("東京フレンズ東京フレンズ", 7);
        assert!(cut.width() <= 7);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(354), "5:54");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(0), "-");
    }
}
