use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseTrigger {
    Button,
    Backdrop,
}

/// The full-size viewer. One lives in the app state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lightbox {
    image_src: Option<String>,
    caption: String,
    visible: bool,
}

impl Lightbox {
    pub fn open(&mut self, image_url: &str, caption: &str) {
        self.image_src = Some(image_url.to_string());
        self.caption = caption.to_string();
        self.visible = true;
        debug!(%image_url, "lightbox opened");
    }

    /// Hides the viewer and drops its image source. Returns false if it was already closed.
    pub fn close(&mut self, trigger: CloseTrigger) -> bool {
        if !self.visible {
            return false;
        }
        self.visible = false;
        self.image_src = None;
        debug!(?trigger, "lightbox closed");
        true
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn image_src(&self) -> Option<&str> {
        self.image_src.as_deref()
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_close_clears_source() {
        let mut lb = Lightbox::default();
        lb.open("https://cdn/a.png", "A terrifying imp");
        assert!(lb.is_visible());
        assert_eq!(lb.image_src(), Some("https://cdn/a.png"));
        assert_eq!(lb.caption(), "A terrifying imp");

        assert!(lb.close(CloseTrigger::Backdrop));
        assert!(!lb.is_visible());
        assert_eq!(lb.image_src(), None);
    }

    #[test]
    fn closing_twice_is_a_no_op() {
        let mut lb = Lightbox::default();
        assert!(!lb.close(CloseTrigger::Button));

        lb.open("u", "c");
        assert!(lb.close(CloseTrigger::Button));
        let after_first = lb.clone();
        assert!(!lb.close(CloseTrigger::Backdrop));
        assert_eq!(lb, after_first);
    }

    #[test]
    fn reopening_replaces_image_and_caption() {
        let mut lb = Lightbox::default();
        lb.open("u1", "c1");
        lb.open("u2", "c2");
        assert_eq!(lb.image_src(), Some("u2"));
        assert_eq!(lb.caption(), "c2");
    }
}
