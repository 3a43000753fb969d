use anyhow::Error;
use image::imageops::FilterType;
use image::DynamicImage;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::InjuryLabel;

/// Upper half block: foreground paints the top pixel, background the bottom.
const HALF_BLOCK: &str = "\u{2580}";

/// Render `image` as coloured half blocks fitting inside `width` x `height`
/// terminal cells, keeping the aspect ratio. Each cell carries two pixel rows.
pub(crate) fn image_preview_lines(
    image: &DynamicImage,
    width: u16,
    height: u16,
) -> Vec<Line<'static>> {
    if width == 0 || height == 0 || image.width() == 0 || image.height() == 0 {
        return Vec::new();
    }

    let thumbnail = image
        .resize(u32::from(width), u32::from(height) * 2, FilterType::Triangle)
        .to_rgb8();
    let (thumb_width, thumb_height) = thumbnail.dimensions();

    let mut lines = Vec::with_capacity(thumb_height.div_ceil(2) as usize);
    for top in (0..thumb_height).step_by(2) {
        let spans: Vec<Span<'static>> = (0..thumb_width)
            .map(|x| {
                let upper = thumbnail.get_pixel(x, top).0;
                let mut style = Style::default().fg(Color::Rgb(upper[0], upper[1], upper[2]));
                if top + 1 < thumb_height {
                    let lower = thumbnail.get_pixel(x, top + 1).0;
                    style = style.bg(Color::Rgb(lower[0], lower[1], lower[2]));
                }
                Span::styled(HALF_BLOCK, style)
            })
            .collect();
        lines.push(Line::from(spans));
    }
    lines
}

/// History row colour for a stored label; unparsed text stays grey.
pub(crate) fn label_style(label: Option<InjuryLabel>) -> Style {
    match label {
        Some(InjuryLabel::Abrasion) => Style::default().fg(Color::LightYellow),
        Some(InjuryLabel::Bruise) => Style::default().fg(Color::LightMagenta),
        Some(InjuryLabel::Burn) => Style::default().fg(Color::LightRed),
        Some(InjuryLabel::Unknown) => Style::default().fg(Color::Gray),
        None => Style::default().fg(Color::DarkGray),
    }
}

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}
