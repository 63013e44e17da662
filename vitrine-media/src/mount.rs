/// Immutable configuration a page hands to a media component when mounting
/// it. Only `src` is required; the rest are display hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMount {
    pub src: String,
    pub poster: Option<String>,
    pub theme_color: Option<String>,
    pub title: Option<String>,
}

impl MediaMount {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            poster: None,
            theme_color: None,
            title: None,
        }
    }

    pub fn with_poster(mut self, poster: impl Into<String>) -> Self {
        self.poster = Some(poster.into());
        self
    }

    pub fn with_theme_color(mut self, color: impl Into<String>) -> Self {
        self.theme_color = Some(color.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
