//! Playing-song window
//!
//! Titles currently in the mix buffer, oldest first, with a count of how many
//! are audible and which one is master. Titles are appended when a
//! transition is scheduled, well before its `in` event fires, so the window
//! usually holds one more title than is audible.

use std::collections::VecDeque;

use super::TransitionKind;

#[derive(Debug, Clone, Default)]
pub struct PlayingWindow {
    titles: VecDeque<String>,
    /// Absolute index of `titles[0]` in the whole stream
    first_index: usize,
    /// Absolute index of the master song
    master: usize,
    audible: usize,
    ins: usize,
    outs: usize,
}

impl PlayingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the title of a song that will come in later.
    pub fn push_title(&mut self, title: impl Into<String>) {
        self.titles.push_back(title.into());
    }

    /// Update the window for one fired event.
    pub fn apply(&mut self, kind: TransitionKind) {
        match kind {
            TransitionKind::In => {
                self.audible += 1;
                self.ins += 1;
            }
            TransitionKind::Out => {
                self.audible = self.audible.saturating_sub(1);
                self.outs += 1;
                if self.titles.pop_front().is_some() {
                    self.first_index += 1;
                }
            }
            TransitionKind::Switch => {
                self.master += 1;
            }
        }
    }

    /// Number of songs currently audible
    pub fn audible(&self) -> usize {
        self.audible
    }

    /// Absolute stream index of the master song
    pub fn master_index(&self) -> usize {
        self.master
    }

    /// `in` events applied minus `out` events applied
    pub fn net_events(&self) -> isize {
        self.ins as isize - self.outs as isize
    }

    pub fn master_title(&self) -> &str {
        self.master
            .checked_sub(self.first_index)
            .and_then(|i| self.titles.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// "Now playing" text: one audible title per line with the master
    /// upper-cased, then the fade type in brackets while songs overlap.
    pub fn describe(&self, fade_type: Option<&str>) -> String {
        let mut out = String::from("Now playing:\n");
        for (i, title) in self.titles.iter().take(self.audible).enumerate() {
            if self.first_index + i == self.master {
                out.push_str(&title.to_uppercase());
            } else {
                out.push_str(title);
            }
            out.push('\n');
        }
        if self.audible > 1 {
            if let Some(fade) = fade_type {
                out.push('[');
                out.push_str(fade);
                out.push(']');
            }
        }
        out
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.titles.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(titles: &[&str]) -> PlayingWindow {
        let mut window = PlayingWindow::new();
        for title in titles {
            window.push_title(*title);
        }
        window
    }

    #[test]
    fn test_single_song_description() {
        let mut window = window(&["alpha", "beta"]);
        window.apply(TransitionKind::In);

        assert_eq!(window.describe(Some("chill")), "Now playing:\nALPHA\n");
        assert_eq!(window.master_title(), "alpha");
    }

    #[test]
    fn test_overlap_lists_fade_type() {
        let mut window = window(&["alpha", "beta"]);
        window.apply(TransitionKind::In);
        window.apply(TransitionKind::In);

        assert_eq!(
            window.describe(Some("rolling")),
            "Now playing:\nALPHA\nbeta\n[rolling]"
        );

        window.apply(TransitionKind::Switch);
        assert_eq!(window.master_title(), "beta");
        assert_eq!(window.describe(None), "Now playing:\nalpha\nBETA\n");
    }

    #[test]
    fn test_out_drops_oldest_title_and_keeps_master() {
        let mut window = window(&["alpha", "beta", "gamma"]);
        window.apply(TransitionKind::In);
        window.apply(TransitionKind::In);
        window.apply(TransitionKind::Switch);
        window.apply(TransitionKind::Out);

        assert_eq!(window.audible(), 1);
        assert_eq!(window.master_index(), 1);
        assert_eq!(window.master_title(), "beta");
        assert_eq!(window.titles().collect::<Vec<_>>(), vec!["beta", "gamma"]);
        assert_eq!(window.net_events(), 1);
    }

    #[test]
    fn test_empty_window_has_empty_master_title() {
        let window = PlayingWindow::new();
        assert_eq!(window.master_title(), "");
        assert_eq!(window.describe(None), "Now playing:\n");
    }
}
