//! Passthrough renderer using crossterm
//!
//! The active pane owns the whole screen above the status line and its
//! output is written through untouched. Inactive panes keep a bounded byte
//! history that is replayed when they regain focus, and measure as empty
//! while hidden.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

use crossterm::{
    cursor::{MoveTo, RestorePosition, SavePosition},
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::core::session::SessionId;
use crate::wm::resize::GridSize;
use crate::wm::surface::{Surface, SurfaceFactory};

/// Bytes of output kept per hidden pane
pub const HISTORY_LIMIT: usize = 64 * 1024;

const STATUS_BG: Color = Color::Rgb { r: 0, g: 100, b: 0 };
const STATUS_FG: Color = Color::Rgb { r: 255, g: 255, b: 255 };
const PROMPT_BG: Color = Color::Rgb { r: 200, g: 200, b: 0 };
const PROMPT_FG: Color = Color::Rgb { r: 0, g: 0, b: 0 };

/// The host terminal, shared by every surface
pub struct Screen {
    out: Box<dyn Write>,
    width: u16,
    height: u16,
    entered: bool,
}

pub type SharedScreen = Rc<RefCell<Screen>>;

impl Screen {
    pub fn new(out: Box<dyn Write>, width: u16, height: u16) -> Self {
        Self {
            out,
            width,
            height,
            entered: false,
        }
    }

    pub fn shared(self) -> SharedScreen {
        Rc::new(RefCell::new(self))
    }

    /// Raw mode, alternate screen, scroll region above the status line
    pub fn enter(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        queue!(self.out, EnterAlternateScreen, Clear(ClearType::All), MoveTo(0, 0))?;
        self.entered = true;
        self.set_scroll_region()?;
        self.out.flush()
    }

    pub fn leave(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        // Full-height scroll region, autowrap on
        write!(self.out, "\x1b[r\x1b[?7h")?;
        queue!(self.out, ResetColor, LeaveAlternateScreen)?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        self.entered = false;
        Ok(())
    }

    pub fn set_size(&mut self, width: u16, height: u16) -> io::Result<()> {
        self.width = width;
        self.height = height;
        self.set_scroll_region()
    }

    fn set_scroll_region(&mut self) -> io::Result<()> {
        let content = self.content_size();
        if !content.is_empty() {
            write!(self.out, "\x1b[1;{}r", content.rows)?;
        }
        Ok(())
    }

    /// Area available to the active pane
    pub fn content_size(&self) -> GridSize {
        GridSize::new(self.width, self.height.saturating_sub(1))
    }

    fn passthrough(&mut self, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data)?;
        self.out.flush()
    }

    /// Wipe the pane area and home the cursor
    fn clear_content(&mut self) -> io::Result<()> {
        queue!(self.out, ResetColor, Clear(ClearType::All), MoveTo(0, 0))?;
        self.set_scroll_region()?;
        queue!(self.out, MoveTo(0, 0))?;
        Ok(())
    }

    /// Draw the status line without disturbing the pane's cursor
    pub fn draw_status(&mut self, status: &Status) -> io::Result<()> {
        if self.height == 0 {
            return Ok(());
        }
        let width = self.width as usize;
        let (bg, fg) = if status.highlighted {
            (PROMPT_BG, PROMPT_FG)
        } else {
            (STATUS_BG, STATUS_FG)
        };
        let line = status.render(width);
        queue!(
            self.out,
            SavePosition,
            MoveTo(0, self.height - 1),
            SetBackgroundColor(bg),
            SetForegroundColor(fg),
            Print(line),
            ResetColor,
            RestorePosition
        )?;
        self.out.flush()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// Status line content
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub left: String,
    pub right: String,
    /// Prompt or prefix mode; drawn in the attention colour
    pub highlighted: bool,
}

impl Status {
    /// Left text, padding, right text, exactly `width` columns wide.
    /// The right side is dropped first when space runs out.
    pub fn render(&self, width: usize) -> String {
        let left = truncate_to_width(&format!(" {}", self.left), width);
        let used = display_width(&left);
        let right = format!("{} ", self.right);
        let right_width = display_width(&right);

        let mut line = left;
        if used + right_width + 1 <= width {
            line.push_str(&" ".repeat(width - used - right_width));
            line.push_str(&right);
        } else {
            line.push_str(&" ".repeat(width - used));
        }
        line
    }
}

pub fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Longest prefix of `s` that fits in `width` columns
pub fn truncate_to_width(s: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// One pane's view of the screen
pub struct PassthroughSurface {
    session: SessionId,
    screen: SharedScreen,
    history: VecDeque<u8>,
    active: bool,
}

impl PassthroughSurface {
    pub fn new(session: SessionId, screen: SharedScreen) -> Self {
        Self {
            session,
            screen,
            history: VecDeque::new(),
            active: false,
        }
    }

    fn remember(&mut self, data: &[u8]) {
        self.history.extend(data);
        let excess = self.history.len().saturating_sub(HISTORY_LIMIT);
        self.history.drain(..excess);
    }
}

impl Surface for PassthroughSurface {
    fn write(&mut self, data: &[u8]) {
        self.remember(data);
        if self.active {
            if let Err(e) = self.screen.borrow_mut().passthrough(data) {
                debug!(session = %self.session, error = %e, "screen write failed");
            }
        }
    }

    fn measure_grid_size(&self) -> GridSize {
        if self.active {
            self.screen.borrow().content_size()
        } else {
            GridSize::default()
        }
    }

    fn focus(&mut self) {
        self.active = true;
        let replay: Vec<u8> = self.history.iter().copied().collect();
        let mut screen = self.screen.borrow_mut();
        let result = screen
            .clear_content()
            .and_then(|_| screen.passthrough(&replay));
        if let Err(e) = result {
            debug!(session = %self.session, error = %e, "replay failed");
        }
    }

    fn blur(&mut self) {
        self.active = false;
    }

    fn dispose(&mut self) {
        self.active = false;
        self.history.clear();
    }
}

/// Builds [`PassthroughSurface`]s on a shared screen
pub struct PassthroughFactory {
    screen: SharedScreen,
}

impl PassthroughFactory {
    pub fn new(screen: SharedScreen) -> Self {
        Self { screen }
    }
}

impl SurfaceFactory for PassthroughFactory {
    fn create(&mut self, session: SessionId) -> Box<dyn Surface> {
        Box::new(PassthroughSurface::new(session, Rc::clone(&self.screen)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn screen() -> (SharedScreen, SharedBuf) {
        let buf = SharedBuf::default();
        (Screen::new(Box::new(buf.clone()), 80, 25).shared(), buf)
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_truncate_by_display_width() {
        assert_eq!(truncate_to_width("hello", 3), "hel");
        // Wide characters take two columns
        assert_eq!(truncate_to_width("日本語", 5), "日本");
        assert_eq!(display_width("日本"), 4);
        assert_eq!(truncate_to_width("", 10), "");
    }

    #[test]
    fn test_status_line_fills_width() {
        let status = Status {
            left: "H[1 2]".to_string(),
            right: "pane 2".to_string(),
            highlighted: false,
        };
        let line = status.render(20);
        assert_eq!(display_width(&line), 20);
        assert!(line.starts_with(" H[1 2]"));
        assert!(line.ends_with("pane 2 "));

        // No room: right side goes, left is cut
        let line = status.render(5);
        assert_eq!(line, " H[1 ");
    }

    #[test]
    fn test_hidden_surface_measures_empty_and_buffers() {
        let (screen, buf) = screen();
        let mut surface = PassthroughSurface::new(SessionId(1), screen);
        surface.write(b"hidden output");
        assert!(surface.measure_grid_size().is_empty());
        assert!(!contains(&buf.0.borrow(), b"hidden output"));

        surface.focus();
        assert_eq!(surface.measure_grid_size(), GridSize::new(80, 24));
        assert!(contains(&buf.0.borrow(), b"hidden output"));

        surface.write(b"live");
        assert!(contains(&buf.0.borrow(), b"live"));
    }

    #[test]
    fn test_history_is_bounded() {
        let (screen, _) = screen();
        let mut surface = PassthroughSurface::new(SessionId(1), screen);
        surface.write(&vec![b'a'; HISTORY_LIMIT]);
        surface.write(b"tail");
        assert_eq!(surface.history.len(), HISTORY_LIMIT);
        let end: Vec<u8> = surface.history.iter().rev().take(4).rev().copied().collect();
        assert_eq!(end, b"tail".to_vec());
    }

    #[test]
    fn test_blur_and_dispose() {
        let (screen, _) = screen();
        let mut factory = PassthroughFactory::new(screen);
        let mut surface = factory.create(SessionId(3));
        surface.focus();
        assert!(!surface.measure_grid_size().is_empty());
        surface.blur();
        assert!(surface.measure_grid_size().is_empty());
        surface.dispose();
        assert!(surface.measure_grid_size().is_empty());
    }
}
