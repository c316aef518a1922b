use serde::Serialize;
use std::fmt;

use crate::history::HistoryEntry;

pub const EMPTY_PLACEHOLDER: &str = "No history yet. Generate a monster to see it here.";
pub const LABEL_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailCard {
    /// Position in the history log; 0 is the newest.
    pub index: usize,
    pub label: String,
    pub image_url: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GalleryView {
    Empty { message: String },
    Cards { cards: Vec<ThumbnailCard> },
}

impl Default for GalleryView {
    fn default() -> Self {
        GalleryView::Empty {
            message: EMPTY_PLACEHOLDER.to_string(),
        }
    }
}

impl GalleryView {
    pub fn cards(&self) -> &[ThumbnailCard] {
        match self {
            GalleryView::Empty { .. } => &[],
            GalleryView::Cards { cards } => cards,
        }
    }

    pub fn card(&self, index: usize) -> Option<&ThumbnailCard> {
        self.cards().get(index)
    }
}

/// First 30 characters of the prompt, with `...` when something was cut.
pub fn card_label(prompt: &str) -> String {
    if prompt.chars().count() > LABEL_CHARS {
        let head: String = prompt.chars().take(LABEL_CHARS).collect();
        format!("{head}...")
    } else {
        prompt.to_string()
    }
}

/// Builds a fresh view of `log`; nothing from a previous render carries over.
pub fn render(log: &[HistoryEntry]) -> GalleryView {
    if log.is_empty() {
        return GalleryView::default();
    }
    let cards = log
        .iter()
        .enumerate()
        .map(|(index, entry)| ThumbnailCard {
            index,
            label: card_label(&entry.prompt),
            image_url: entry.image_url.clone(),
            prompt: entry.prompt.clone(),
        })
        .collect();
    GalleryView::Cards { cards }
}

impl fmt::Display for GalleryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GalleryView::Empty { message } => write!(f, "{message}"),
            GalleryView::Cards { cards } => {
                for card in cards {
                    writeln!(f, "[{:>2}] {}", card.index, card.label)?;
                    writeln!(f, "     {}", card.image_url)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prompt: &str) -> HistoryEntry {
        HistoryEntry {
            prompt: prompt.to_string(),
            image_url: format!("https://cdn/{}.png", prompt.len()),
            timestamp: 0,
        }
    }

    #[test]
    fn labels_cut_at_thirty_chars() {
        let exact = "x".repeat(30);
        assert_eq!(card_label(&exact), exact);

        let long = "A terrifying dragon with glowing eyes";
        assert_eq!(card_label(long), "A terrifying dragon with glowi...");

        let wide = "🐉".repeat(31);
        assert_eq!(card_label(&wide), format!("{}...", "🐉".repeat(30)));
    }

    #[test]
    fn empty_log_renders_placeholder() {
        let view = render(&[]);
        assert_eq!(view.to_string(), EMPTY_PLACEHOLDER);
        assert!(view.cards().is_empty());
    }

    #[test]
    fn cards_follow_log_order() {
        let log = vec![entry("newest"), entry("older"), entry("oldest")];
        let view = render(&log);
        let labels: Vec<_> = view.cards().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["newest", "older", "oldest"]);
        assert_eq!(view.card(1).unwrap().index, 1);
        assert!(view.card(3).is_none());
    }

    #[test]
    fn rerender_replaces_previous_view() {
        let first = render(&[entry("a"), entry("b")]);
        let second = render(&[entry("c")]);
        assert_eq!(first.cards().len(), 2);
        assert_eq!(second.cards().len(), 1);
        assert_eq!(second.card(0).unwrap().prompt, "c");
    }
}
