//! Terminal rendering module for rich markdown output
//!
//! Uses termimad for inline markdown styling. Fenced blocks hold captured
//! Terraform output and are printed verbatim, never styled.

use anyhow::Result;
use termimad::{crossterm::style::Color, MadSkin};

const FENCE: &str = "```";

/// Terminal renderer that can switch between rich and plain text output
pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    /// Create a new terminal renderer
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();

        skin.set_headers_fg(Color::Blue);
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.inline_code.set_bg(Color::AnsiValue(238));

        Self { rich_enabled, skin }
    }

    /// Render markdown text to terminal
    pub fn render(&self, markdown: &str) -> Result<()> {
        if !self.rich_enabled {
            print!("{markdown}");
            return Ok(());
        }

        let mut in_fence = false;
        for line in markdown.lines() {
            if line.starts_with(FENCE) {
                in_fence = !in_fence;
                continue;
            }
            match line_style(line, in_fence) {
                LineStyle::Verbatim => println!("\x1b[2m{line}\x1b[0m"),
                LineStyle::Header => println!("\x1b[34m{line}\x1b[0m"),
                LineStyle::Inline => {
                    self.skin.print_inline(line);
                    println!();
                }
            }
        }
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineStyle {
    Verbatim,
    Header,
    Inline,
}

fn line_style(line: &str, in_fence: bool) -> LineStyle {
    if in_fence {
        LineStyle::Verbatim
    } else if line.starts_with('#') {
        LineStyle::Header
    } else {
        LineStyle::Inline
    }
}
