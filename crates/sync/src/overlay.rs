//! Remote cursor marker layout
//!
//! Works on the rendered output rather than the logical tree: a surface
//! reports its text runs and line breaks in document order, and resolves a
//! position inside them to a screen rectangle. The walk uses the same
//! counting rules as [`to_anchor`](crate::offset::to_anchor), so a marker
//! lands where the remote caret is.

use mdcollab_protocol::ClientCursor;

/// One rendered leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedRun<H> {
    /// Text run of `len` characters
    Text { handle: H, len: usize },
    /// Rendered line break
    Break { handle: H },
}

/// A point inside the rendered runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPosition<H> {
    InText { handle: H, offset: usize },
    /// Immediately before a break, on the line it ends
    BeforeBreak { handle: H },
    /// Start of the empty line a trailing break opens
    AfterBreak { handle: H },
}

/// Find the run hosting `offset`
///
/// `None` when nothing is rendered at that offset: an empty document, or an
/// offset past the rendered content.
pub fn locate<H: Clone>(runs: &[RenderedRun<H>], offset: usize) -> Option<RunPosition<H>> {
    let mut remaining = offset;
    for run in runs {
        match run {
            RenderedRun::Text { handle, len } => {
                if remaining <= *len {
                    return Some(RunPosition::InText {
                        handle: handle.clone(),
                        offset: remaining,
                    });
                }
                remaining -= len;
            }
            RenderedRun::Break { handle } => {
                if remaining == 0 {
                    return Some(RunPosition::BeforeBreak {
                        handle: handle.clone(),
                    });
                }
                remaining -= 1;
            }
        }
    }
    match runs.last() {
        Some(RenderedRun::Break { handle }) if remaining == 0 => Some(RunPosition::AfterBreak {
            handle: handle.clone(),
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rendered editor the overlay paints over
pub trait RenderSurface {
    type Handle: Clone;

    /// Rendered runs in document order; `None` while not mounted
    fn runs(&self) -> Option<Vec<RenderedRun<Self::Handle>>>;

    /// Viewport rectangle of a collapsed caret at `position`
    fn caret_rect(&self, position: &RunPosition<Self::Handle>) -> Option<Rect>;

    /// Viewport rectangle of the editable surface
    fn bounds(&self) -> Rect;

    /// Current (horizontal, vertical) scroll of the editable surface
    fn scroll_offset(&self) -> (f64, f64);
}

/// Positioned marker, in pixels relative to the editable surface
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
    pub left: f64,
    pub top: f64,
    pub width_px: f64,
    pub height_em: f64,
    pub color: &'static str,
}

/// Same palette as the presence list
const PALETTE: [&str; 8] = [
    "#ff6b6b", "#4ecdc4", "#ffe66d", "#95e1d3", "#f38181", "#aa96da", "#fcbad3", "#a8d8ea",
];

/// Stable colour for a client id
pub fn color_for(id: &str) -> &'static str {
    // FNV-1a; must not depend on the platform or the std hasher
    let hash = id
        .bytes()
        .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
    PALETTE[hash as usize % PALETTE.len()]
}

const MARKER_WIDTH_PX: f64 = 2.0;
const BASE_FONT_PX: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRenderer {
    font_px: f64,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(BASE_FONT_PX)
    }
}

impl OverlayRenderer {
    pub const fn new(font_px: f64) -> Self {
        Self { font_px }
    }

    pub fn set_font_px(&mut self, font_px: f64) {
        self.font_px = font_px;
    }

    /// Marker height, growing 0.15em per 2px above 16px
    pub fn marker_height_em(&self) -> f64 {
        ((self.font_px - BASE_FONT_PX) / 2.0).mul_add(0.15, 1.1)
    }

    /// Lay out one marker per cursor that has a rendered host
    pub fn layout<S: RenderSurface + ?Sized>(&self, surface: &S, cursors: &[ClientCursor]) -> Vec<Marker> {
        let Some(runs) = surface.runs() else {
            return Vec::new();
        };
        let bounds = surface.bounds();
        let (scroll_x, scroll_y) = surface.scroll_offset();

        cursors
            .iter()
            .filter_map(|cursor| {
                let Some(rect) = locate(&runs, cursor.offset).and_then(|pos| surface.caret_rect(&pos)) else {
                    tracing::trace!(client_id = %cursor.id, offset = cursor.offset, "no rendered host for cursor");
                    return None;
                };
                Some(Marker {
                    id: cursor.id.clone(),
                    left: rect.x - bounds.x + scroll_x,
                    top: rect.y - bounds.y + scroll_y,
                    width_px: MARKER_WIDTH_PX,
                    height_em: self.marker_height_em(),
                    color: color_for(&cursor.id),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Monospace surface: 10px per character, 20px per line, placed at (100, 50)
    struct Grid {
        lines: Vec<String>,
        scroll: (f64, f64),
        mounted: bool,
    }

    impl Grid {
        fn new(text: &str) -> Self {
            Self {
                lines: text.split('\n').map(str::to_string).collect(),
                scroll: (0.0, 0.0),
                mounted: true,
            }
        }

        fn at(line: usize, col: usize) -> Rect {
            Rect {
                x: 100.0 + col as f64 * 10.0,
                y: 50.0 + line as f64 * 20.0,
                width: 0.0,
                height: 20.0,
            }
        }
    }

    impl RenderSurface for Grid {
        type Handle = usize;

        fn runs(&self) -> Option<Vec<RenderedRun<usize>>> {
            if !self.mounted {
                return None;
            }
            let mut runs = Vec::new();
            for (line, text) in self.lines.iter().enumerate() {
                if line > 0 {
                    runs.push(RenderedRun::Break { handle: line - 1 });
                }
                if !text.is_empty() {
                    runs.push(RenderedRun::Text {
                        handle: line,
                        len: text.chars().count(),
                    });
                }
            }
            Some(runs)
        }

        fn caret_rect(&self, position: &RunPosition<usize>) -> Option<Rect> {
            Some(match position {
                RunPosition::InText { handle, offset } => Self::at(*handle, *offset),
                RunPosition::BeforeBreak { handle } => Self::at(*handle, self.lines.get(*handle)?.chars().count()),
                RunPosition::AfterBreak { handle } => Self::at(handle + 1, 0),
            })
        }

        fn bounds(&self) -> Rect {
            Rect {
                x: 100.0,
                y: 50.0,
                width: 800.0,
                height: 600.0,
            }
        }

        fn scroll_offset(&self) -> (f64, f64) {
            self.scroll
        }
    }

    fn text_runs(lens: &[usize]) -> Vec<RenderedRun<usize>> {
        lens.iter()
            .enumerate()
            .map(|(handle, &len)| RenderedRun::Text { handle, len })
            .collect()
    }

    #[test]
    fn locate_walks_split_runs() {
        let runs = text_runs(&[2, 3]);
        assert_eq!(locate(&runs, 1), Some(RunPosition::InText { handle: 0, offset: 1 }));
        assert_eq!(locate(&runs, 2), Some(RunPosition::InText { handle: 0, offset: 2 }));
        assert_eq!(locate(&runs, 4), Some(RunPosition::InText { handle: 1, offset: 2 }));
        assert_eq!(locate(&runs, 6), None);
    }

    #[test]
    fn locate_counts_breaks_as_one() {
        // "ab\n\ncd"
        let runs = vec![
            RenderedRun::Text { handle: 0, len: 2 },
            RenderedRun::Break { handle: 1 },
            RenderedRun::Break { handle: 2 },
            RenderedRun::Text { handle: 3, len: 2 },
        ];
        assert_eq!(locate(&runs, 3), Some(RunPosition::BeforeBreak { handle: 2 }));
        assert_eq!(locate(&runs, 5), Some(RunPosition::InText { handle: 3, offset: 1 }));
    }

    #[test]
    fn trailing_empty_line_is_hosted_by_its_break() {
        let runs = vec![RenderedRun::Text { handle: 0, len: 2 }, RenderedRun::Break { handle: 1 }];
        assert_eq!(locate(&runs, 3), Some(RunPosition::AfterBreak { handle: 1 }));
        assert_eq!(locate(&runs, 4), None);
    }

    #[test]
    fn empty_document_hosts_nothing() {
        assert_eq!(locate::<usize>(&[], 0), None);
    }

    #[test]
    fn markers_are_relative_to_surface_and_scroll() {
        let mut grid = Grid::new("abc\ndef");
        grid.scroll = (5.0, 40.0);
        let markers = OverlayRenderer::default().layout(&grid, &[ClientCursor::new("b", 5)]);
        assert_eq!(markers.len(), 1);
        let marker = &markers[0];
        assert_eq!(marker.id, "b");
        assert!((marker.left - 15.0).abs() < f64::EPSILON);
        assert!((marker.top - 60.0).abs() < f64::EPSILON);
        assert!((marker.width_px - 2.0).abs() < f64::EPSILON);
        assert_eq!(marker.color, color_for("b"));
    }

    #[test]
    fn unhostable_cursors_are_skipped() {
        let grid = Grid::new("ab");
        let cursors = [ClientCursor::new("far", 99), ClientCursor::new("near", 1)];
        let markers = OverlayRenderer::default().layout(&grid, &cursors);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, "near");
    }

    #[test]
    fn unmounted_surface_draws_nothing() {
        let mut grid = Grid::new("abc");
        grid.mounted = false;
        assert!(OverlayRenderer::default()
            .layout(&grid, &[ClientCursor::new("a", 1)])
            .is_empty());
    }

    #[test]
    fn marker_height_scales_with_font() {
        let mut renderer = OverlayRenderer::default();
        assert!((renderer.marker_height_em() - 1.1).abs() < 1e-9);
        renderer.set_font_px(20.0);
        assert!((renderer.marker_height_em() - 1.4).abs() < 1e-9);
    }

    #[test]
    fn colors_are_stable_and_from_palette() {
        assert_eq!(color_for("client-a"), color_for("client-a"));
        assert!(PALETTE.contains(&color_for("")));
        assert!(PALETTE.contains(&color_for("x")));
    }
}
