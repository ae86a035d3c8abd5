//! Season/episode rating heatmap

use std::path::Path;
use std::process::Command;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::imdb::Episode;

pub const DEFAULT_DPI: u32 = 200;
/// Figure sizing: a third of an inch per cell, with the
/// shorter side scaled up to at least this many inches.
const MIN_FIGURE_INCHES: f64 = 2.3;
const CELL_INCHES: f64 = 1.0 / 3.0;

/// Highest season or episode number a grid accepts.
pub const MAX_GRID_INDEX: u32 = 1000;

const CELL_TEXT_PT: f64 = 7.0;
const LABEL_PT: f64 = 9.0;
const TITLE_PT: f64 = 12.0;

/// Ratings laid out for display: row 0 is the last season, column `e - 1`
/// is episode `e`. Unrated or missing episodes are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingsGrid {
    seasons: u32,
    episodes: u32,
    cells: Vec<Option<f64>>,
}

impl RatingsGrid {
    pub fn from_episodes(episodes: &[Episode]) -> Self {
        let valid: Vec<&Episode> = episodes
            .iter()
            .filter(|ep| {
                if ep.season == 0 || ep.episode == 0 {
                    warn!(
                        "Skipping S{} E{} \"{}\": seasons and episodes start at 1",
                        ep.season, ep.episode, ep.name
                    );
                    return false;
                }
                if ep.season > MAX_GRID_INDEX || ep.episode > MAX_GRID_INDEX {
                    warn!(
                        "Skipping S{} E{} \"{}\": seasons and episodes stop at {}",
                        ep.season, ep.episode, ep.name, MAX_GRID_INDEX
                    );
                    return false;
                }
                true
            })
            .collect();

        let seasons = valid.iter().map(|ep| ep.season).max().unwrap_or(0);
        let width = valid.iter().map(|ep| ep.episode).max().unwrap_or(0);
        let size = (seasons as usize)
            .checked_mul(width as usize)
            .unwrap_or(0);
        let mut cells = vec![None; size];

        for ep in valid {
            if ep.rating.is_finite() && ep.rating > 0.0 {
                let row = (seasons - ep.season) as usize;
                let col = (ep.episode - 1) as usize;
                if let Some(cell) = cells.get_mut(row * width as usize + col) {
                    *cell = Some(ep.rating);
                }
            }
        }

        Self {
            seasons,
            episodes: width,
            cells,
        }
    }

    pub fn seasons(&self) -> u32 {
        self.seasons
    }

    /// Width of the grid: the highest episode number of any season.
    pub fn episodes(&self) -> u32 {
        self.episodes
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Rating of a 1-based season/episode.
    pub fn get(&self, season: u32, episode: u32) -> Option<f64> {
        if season == 0 || episode == 0 || season > self.seasons || episode > self.episodes {
            return None;
        }
        let row = (self.seasons - season) as usize;
        let col = (episode - 1) as usize;
        self.cells
            .get(row * self.episodes as usize + col)
            .copied()
            .flatten()
    }

    /// Rows in display order, last season first.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<f64>]> {
        self.cells.chunks(self.episodes.max(1) as usize)
    }

    pub fn rating_range(&self) -> Option<(f64, f64)> {
        self.cells.iter().flatten().fold(None, |acc, &r| match acc {
            None => Some((r, r)),
            Some((lo, hi)) => Some((lo.min(r), hi.max(r))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapStyle {
    pub dark_mode: bool,
    /// RGB in 0..=1
    pub dark_color: (f64, f64, f64),
    pub dpi: u32,
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self {
            dark_mode: false,
            dark_color: (0.16, 0.16, 0.16),
            dpi: DEFAULT_DPI,
        }
    }
}

impl HeatmapStyle {
    pub fn dark() -> Self {
        Self {
            dark_mode: true,
            ..Self::default()
        }
    }

    fn background(&self) -> RGBColor {
        if self.dark_mode {
            let (r, g, b) = self.dark_color;
            RGBColor(channel(r), channel(g), channel(b))
        } else {
            WHITE
        }
    }

    fn foreground(&self) -> RGBColor {
        if self.dark_mode {
            WHITE
        } else {
            BLACK
        }
    }

    fn pt_to_px(&self, pt: f64) -> f64 {
        pt * self.dpi as f64 / 72.0
    }
}

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Image size in pixels for `grid` at `dpi`.
pub fn figure_size(grid: &RatingsGrid, dpi: u32) -> (u32, u32) {
    let mut width = grid.episodes().max(1) as f64 * CELL_INCHES;
    let mut height = grid.seasons().max(1) as f64 * CELL_INCHES;

    let shorter = width.min(height);
    if shorter < MIN_FIGURE_INCHES {
        let scale = MIN_FIGURE_INCHES / shorter;
        width *= scale;
        height *= scale;
    }

    (
        (width * dpi as f64).round() as u32,
        (height * dpi as f64).round() as u32,
    )
}

/// Sequential purple → teal → yellow scale over `t` in 0..=1.
fn cell_color(t: f64) -> HSLColor {
    let t = t.clamp(0.0, 1.0);
    HSLColor((270.0 - 210.0 * t) / 360.0, 0.75, 0.28 + 0.32 * t)
}

/// Position of `rating` on the colour scale spanning `lo..=hi`. A grid with
/// a single distinct rating sits at the midpoint.
fn scale_position(rating: f64, lo: f64, hi: f64) -> f64 {
    let span = hi - lo;
    if span > 0.0 {
        ((rating - lo) / span).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

fn tick_label(value: f64) -> String {
    if (value - value.round()).abs() < 1e-6 && value >= 0.0 {
        format!("{}", value.round() as i64 + 1)
    } else {
        String::new()
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> ScraperError {
    ScraperError::Plot(e.to_string())
}

/// Render `grid` to a PNG at `path`. Underscores in `title` read as spaces.
pub fn render_png(
    title: &str,
    grid: &RatingsGrid,
    path: &Path,
    style: &HeatmapStyle,
) -> Result<(), ScraperError> {
    let (lo, hi) = grid
        .rating_range()
        .ok_or_else(|| ScraperError::Plot(format!("no ratings to plot for '{}'", title)))?;

    let size = figure_size(grid, style.dpi);
    let seasons = grid.seasons();
    let episodes = grid.episodes();
    let fg = style.foreground();
    let label_px = style.pt_to_px(LABEL_PT);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&style.background()).map_err(plot_err)?;

    let caption = title.replace('_', " ");
    let mut chart = ChartBuilder::on(&root)
        .caption(
            caption,
            ("sans-serif", style.pt_to_px(TITLE_PT)).into_font().color(&fg),
        )
        .margin((label_px * 0.8) as u32)
        .x_label_area_size((label_px * 2.6) as u32)
        .y_label_area_size((label_px * 2.6) as u32)
        .build_cartesian_2d(
            -0.5f64..episodes as f64 - 0.5,
            -0.5f64..seasons as f64 - 0.5,
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Episode")
        .y_desc("Season")
        .x_labels(episodes as usize)
        .y_labels(seasons as usize)
        .x_label_formatter(&|x: &f64| tick_label(*x))
        .y_label_formatter(&|y: &f64| tick_label(*y))
        .label_style(("sans-serif", label_px).into_font().color(&fg))
        .axis_desc_style(("sans-serif", label_px).into_font().color(&fg))
        .axis_style(&fg)
        .draw()
        .map_err(plot_err)?;

    // (x, y, rating) in chart coordinates, season 1 at the bottom
    let cells: Vec<(f64, f64, f64)> = grid
        .rows()
        .enumerate()
        .flat_map(|(row, cells)| {
            let y = (seasons - 1 - row as u32) as f64;
            cells
                .iter()
                .enumerate()
                .filter_map(move |(col, cell)| cell.map(|r| (col as f64, y, r)))
        })
        .collect();

    chart
        .draw_series(cells.iter().map(|&(x, y, rating)| {
            Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                cell_color(scale_position(rating, lo, hi)).filled(),
            )
        }))
        .map_err(plot_err)?;

    let text_style = ("sans-serif", style.pt_to_px(CELL_TEXT_PT))
        .into_font()
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart
        .draw_series(cells.iter().map(|&(x, y, rating)| {
            Text::new(format!("{:.1}", rating), (x, y), text_style.clone())
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    info!("Wrote heatmap {:?} ({}x{})", path, size.0, size.1);
    Ok(())
}

/// Open `path` in the platform image viewer.
pub fn show(path: &Path) -> Result<(), ScraperError> {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(all(unix, not(target_os = "macos")))]
    let mut command = Command::new("xdg-open");

    let status = command.arg(path).status()?;
    if !status.success() {
        return Err(ScraperError::Plot(format!(
            "image viewer exited with {} for {:?}",
            status, path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(season: u32, episode: u32, rating: f64) -> Episode {
        Episode {
            season,
            episode,
            name: format!("S{season}E{episode}"),
            rating,
        }
    }

    #[test]
    fn test_grid_dimensions_and_orientation() {
        let grid = RatingsGrid::from_episodes(&[
            ep(1, 1, 8.0),
            ep(1, 2, 8.2),
            ep(1, 3, 8.4),
            ep(2, 1, 9.0),
            ep(2, 2, 9.1),
        ]);

        assert_eq!((grid.seasons(), grid.episodes()), (2, 3));
        let rows: Vec<&[Option<f64>]> = grid.rows().collect();
        // last season on top
        assert_eq!(rows[0], &[Some(9.0), Some(9.1), None][..]);
        assert_eq!(rows[1], &[Some(8.0), Some(8.2), Some(8.4)][..]);
        assert_eq!(grid.get(2, 2), Some(9.1));
        assert_eq!(grid.get(2, 3), None);
        assert_eq!(grid.get(3, 1), None);
    }

    #[test]
    fn test_zero_ratings_are_masked() {
        let grid = RatingsGrid::from_episodes(&[ep(1, 1, 0.0), ep(1, 2, 7.5)]);
        assert_eq!(grid.get(1, 1), None);
        assert_eq!(grid.rating_range(), Some((7.5, 7.5)));
    }

    #[test]
    fn test_zero_indices_are_skipped() {
        let grid = RatingsGrid::from_episodes(&[ep(0, 1, 8.0), ep(1, 0, 8.0), ep(1, 1, 6.0)]);
        assert_eq!((grid.seasons(), grid.episodes()), (1, 1));
        assert_eq!(grid.get(1, 1), Some(6.0));
    }

    #[test]
    fn test_out_of_range_indices_are_skipped() {
        let table = "season,episode,name,rating\n70000,70000,Far,8.0\n1,1,Near,7.0\n1,4000,Long,6.0\n";
        let episodes = crate::serializer::read_episodes(table.as_bytes()).unwrap();

        let grid = RatingsGrid::from_episodes(&episodes);

        assert_eq!((grid.seasons(), grid.episodes()), (1, 1));
        assert_eq!(grid.get(1, 1), Some(7.0));
        assert_eq!(grid.get(70000, 70000), None);
    }

    #[test]
    fn test_grid_accepts_max_index() {
        let grid = RatingsGrid::from_episodes(&[ep(MAX_GRID_INDEX, MAX_GRID_INDEX, 9.0)]);
        assert_eq!(grid.seasons(), MAX_GRID_INDEX);
        assert_eq!(grid.get(MAX_GRID_INDEX, MAX_GRID_INDEX), Some(9.0));
        assert_eq!(grid.get(1, 1), None);
    }

    #[test]
    fn test_empty_grid() {
        let grid = RatingsGrid::from_episodes(&[]);
        assert!(grid.is_empty());
        assert_eq!(grid.rating_range(), None);
        assert_eq!(grid.rows().count(), 0);
    }

    #[test]
    fn test_figure_size_scales_short_side() {
        // 10 episodes x 1 season: 3.33 x 0.33 in, scaled so height is 2.3 in
        let grid = RatingsGrid::from_episodes(
            &(1..=10).map(|e| ep(1, e, 7.0)).collect::<Vec<_>>(),
        );
        assert_eq!(figure_size(&grid, 100), (2300, 230));
    }

    #[test]
    fn test_figure_size_large_grid_unscaled() {
        let episodes: Vec<Episode> = (1..=9)
            .flat_map(|s| (1..=12).map(move |e| ep(s, e, 8.0)))
            .collect();
        let grid = RatingsGrid::from_episodes(&episodes);
        assert_eq!(figure_size(&grid, 100), (400, 300));
    }

    #[test]
    fn test_tick_label_only_on_cells() {
        assert_eq!(tick_label(0.0), "1");
        assert_eq!(tick_label(4.0), "5");
        assert_eq!(tick_label(0.5), "");
        assert_eq!(tick_label(-0.5), "");
    }

    #[test]
    fn test_scale_position() {
        assert_eq!(scale_position(7.0, 7.0, 9.0), 0.0);
        assert_eq!(scale_position(9.0, 7.0, 9.0), 1.0);
        assert!((scale_position(8.0, 7.0, 9.0) - 0.5).abs() < 1e-9);
        // single distinct rating
        assert_eq!(scale_position(8.3, 8.3, 8.3), 0.5);
    }

    #[test]
    fn test_cell_color_endpoints() {
        let HSLColor(h, s, l) = cell_color(0.0);
        assert!((h - 0.75).abs() < 1e-9);
        assert!((s - 0.75).abs() < 1e-9);
        assert!((l - 0.28).abs() < 1e-9);

        let HSLColor(h, _, l) = cell_color(1.0);
        assert!((h - 60.0 / 360.0).abs() < 1e-9);
        assert!((l - 0.60).abs() < 1e-9);

        // lightness grows with the rating
        let HSLColor(_, _, mid) = cell_color(0.5);
        assert!(mid > 0.28 && mid < 0.60);

        let HSLColor(below, ..) = cell_color(-1.0);
        let HSLColor(above, ..) = cell_color(2.0);
        assert!((below - 0.75).abs() < 1e-9);
        assert!((above - 60.0 / 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_dark_style_colors() {
        let style = HeatmapStyle::dark();
        assert_eq!(style.background(), RGBColor(41, 41, 41));
        assert_eq!(style.foreground(), WHITE);
        assert_eq!(HeatmapStyle::default().background(), WHITE);
    }

    #[test]
    fn test_render_empty_grid_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_png(
            "Nothing",
            &RatingsGrid::from_episodes(&[]),
            &dir.path().join("nothing.png"),
            &HeatmapStyle::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScraperError::Plot(_)));
    }

    #[test]
    #[ignore] // needs system fonts: cargo test test_render_png -- --ignored
    fn test_render_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dark.png");
        let grid = RatingsGrid::from_episodes(&[ep(1, 1, 8.5), ep(1, 2, 8.1), ep(2, 1, 9.2)]);

        render_png("Dark", &grid, &path, &HeatmapStyle { dpi: 72, ..HeatmapStyle::dark() }).unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }
}
