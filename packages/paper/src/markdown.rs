/// Markdown conversion for descriptor content
use pulldown_cmark::{html, Options, Parser};

pub trait MarkdownConverter {
    /// Convert markdown text to markup. Must be pure and deterministic.
    fn parse(&self, text: &str) -> String;
}

/// CommonMark with tables, strikethrough and task lists
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl MarkdownConverter for CommonMark {
    fn parse(&self, text: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(text, options));
        out
    }
}
