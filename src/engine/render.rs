// ── Kaiwa Engine: View Projection ──────────────────────────────────────────
// Rendering is a pure function of a message's raw content: markdown parsed
// into ANSI-styled terminal text, or the identity when the renderer is
// disabled. The raw content stays the single source of truth — the painted
// view can always be regenerated from it.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

// ── ANSI codes ─────────────────────────────────────────────────────────────

const BOLD: &str = "\x1b[1m";
const BOLD_OFF: &str = "\x1b[22m";
const ITALIC: &str = "\x1b[3m";
const ITALIC_OFF: &str = "\x1b[23m";
const UNDERLINE: &str = "\x1b[4m";
const UNDERLINE_OFF: &str = "\x1b[24m";
const STRIKE: &str = "\x1b[9m";
const STRIKE_OFF: &str = "\x1b[29m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const FG_DEFAULT: &str = "\x1b[39m";
const RESET: &str = "\x1b[0m";

// ── Renderer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    /// Markdown → ANSI-styled text.
    Markdown,
    /// Raw text shown as-is.
    Plain,
}

impl Renderer {
    pub fn render(&self, raw: &str) -> String {
        match self {
            Renderer::Markdown => markdown_to_ansi(raw),
            Renderer::Plain => raw.to_string(),
        }
    }
}

// ── Markdown walk ──────────────────────────────────────────────────────────

/// Walk the pulldown-cmark event stream into styled terminal text.
/// Block structure maps to blank lines, inline emphasis to SGR attributes.
fn markdown_to_ansi(raw: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(raw, opts);

    let mut out = String::new();
    // Per-level ordered-list counters; `None` marks a bulleted level.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut link_dest: Option<String> = None;

    for ev in parser {
        match ev {
            Event::Start(tag) => match tag {
                Tag::Heading { .. } => {
                    out.push_str(BOLD);
                    out.push_str(UNDERLINE);
                }
                Tag::Strong => out.push_str(BOLD),
                Tag::Emphasis => out.push_str(ITALIC),
                Tag::Strikethrough => out.push_str(STRIKE),
                Tag::CodeBlock(_) => out.push_str(DIM),
                Tag::List(start) => lists.push(start),
                Tag::Item => match lists.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{:>2}. ", n));
                        *n += 1;
                    }
                    _ => out.push_str("  • "),
                },
                Tag::Link { dest_url, .. } => {
                    link_dest = Some(dest_url.to_string());
                    out.push_str(UNDERLINE);
                }
                _ => {}
            },
            Event::End(tag) => match tag {
                TagEnd::Heading(_) => {
                    out.push_str(RESET);
                    out.push_str("\n\n");
                }
                TagEnd::Strong => out.push_str(BOLD_OFF),
                TagEnd::Emphasis => out.push_str(ITALIC_OFF),
                TagEnd::Strikethrough => out.push_str(STRIKE_OFF),
                TagEnd::CodeBlock => {
                    out.push_str(RESET);
                    out.push('\n');
                }
                TagEnd::List(_) => {
                    lists.pop();
                    if lists.is_empty() {
                        out.push('\n');
                    }
                }
                TagEnd::Item => out.push('\n'),
                TagEnd::Paragraph => out.push_str("\n\n"),
                TagEnd::Link => {
                    out.push_str(UNDERLINE_OFF);
                    if let Some(dest) = link_dest.take() {
                        out.push_str(&format!(" ({})", dest));
                    }
                }
                TagEnd::TableHead | TagEnd::TableRow => out.push('\n'),
                TagEnd::TableCell => out.push_str("  "),
                _ => {}
            },
            Event::Text(t) => out.push_str(&t),
            Event::Code(t) => {
                out.push_str(CYAN);
                out.push_str(&t);
                out.push_str(FG_DEFAULT);
            }
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => out.push_str("────────\n\n"),
            Event::TaskListMarker(done) => {
                out.push_str(if done { "[x] " } else { "[ ] " })
            }
            Event::Html(h) | Event::InlineHtml(h) => out.push_str(&h),
            _ => {}
        }
    }

    out.trim_end().to_string()
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_is_identity() {
        let raw = "**not bold** `not code`";
        assert_eq!(Renderer::Plain.render(raw), raw);
    }

    #[test]
    fn bold_gets_sgr() {
        let out = Renderer::Markdown.render("a **b** c");
        assert!(out.contains(BOLD));
        assert!(out.contains("b"));
        assert!(out.contains(BOLD_OFF));
    }

    #[test]
    fn inline_code_colored() {
        let out = Renderer::Markdown.render("run `cargo` now");
        assert!(out.contains(&format!("{}cargo{}", CYAN, FG_DEFAULT)));
    }

    #[test]
    fn heading_then_paragraph() {
        let out = Renderer::Markdown.render("# Title\n\nbody");
        assert!(out.starts_with(&format!("{}{}Title", BOLD, UNDERLINE)));
        assert!(out.ends_with("body"));
    }

    #[test]
    fn lists_bullets_and_numbers() {
        let out = Renderer::Markdown.render("- a\n- b");
        assert_eq!(out.matches("  • ").count(), 2);
        let out = Renderer::Markdown.render("1. a\n2. b");
        assert!(out.contains(" 1. a"));
        assert!(out.contains(" 2. b"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let raw = "## h\n\n- x\n- *y*\n\n`z`";
        assert_eq!(Renderer::Markdown.render(raw), Renderer::Markdown.render(raw));
    }
}
