/*!
 * Show-notes rendering.
 *
 * Each segment becomes a `"{time} {title}\n{text}"` block and blocks are
 * separated by a blank line.
 */

use crate::segments::Segment;

const BLOCK_SEPARATOR: &str = "\n\n";

/// Render segments into the show-notes document
///
/// When `titles` is given, segments and titles are paired by position and
/// rendering stops at the shorter of the two. Otherwise each segment's own
/// title is used.
pub fn format_show_notes(segments: &[Segment], titles: Option<&[String]>) -> String {
    let blocks: Vec<String> = match titles {
        Some(titles) => segments.iter()
            .zip(titles.iter())
            .map(|(segment, title)| render_block(&segment.start_time, title, &segment.text))
            .collect(),
        None => segments.iter()
            .map(|segment| render_block(&segment.start_time, segment.title_or_empty(), &segment.text))
            .collect(),
    };

    blocks.join(BLOCK_SEPARATOR)
}

fn render_block(time: &str, title: &str, text: &str) -> String {
    format!("{} {}\n{}", time, title, text)
}
