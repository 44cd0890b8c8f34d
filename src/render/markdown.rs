//! Markdown rendering using pulldown-cmark.
//!
//! A heading of level 1 that opens the document is treated as the document
//! title: it is reported separately and left out of the HTML fragment.

use super::{RenderError, Rendered, Renderer};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

/// Options for markdown conversion
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    /// Enable tables extension
    pub tables: bool,
    /// Enable footnotes extension
    pub footnotes: bool,
    /// Enable strikethrough extension
    pub strikethrough: bool,
    /// Enable task lists extension
    pub task_lists: bool,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
        }
    }
}

impl MarkdownRenderer {
    fn options(&self) -> Options {
        let mut opts = Options::empty();
        if self.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            opts.insert(Options::ENABLE_TASKLISTS);
        }
        opts
    }

    /// Split off a leading H1, returning its plain text and the remaining events.
    fn split_title<'a>(&self, text: &'a str) -> (Option<String>, Vec<Event<'a>>) {
        let mut events = Parser::new_ext(text, self.options()).peekable();

        let opens_with_h1 = matches!(
            events.peek(),
            Some(Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }))
        );
        if !opens_with_h1 {
            return (None, events.collect());
        }

        events.next();
        let mut title = String::new();
        for event in events.by_ref() {
            match event {
                Event::End(TagEnd::Heading(HeadingLevel::H1)) => break,
                Event::Text(t) | Event::Code(t) => title.push_str(&t),
                Event::SoftBreak | Event::HardBreak => title.push(' '),
                _ => {}
            }
        }

        let title = title.trim().to_owned();
        let title = (!title.is_empty()).then_some(title);
        (title, events.collect())
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, text: &str) -> Result<Rendered, RenderError> {
        let (title, events) = self.split_title(text);
        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        Ok(Rendered { title, html: out })
    }

    fn extract_title(&self, text: &str) -> Option<String> {
        self.split_title(text).0
    }
}
