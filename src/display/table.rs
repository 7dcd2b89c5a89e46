use crate::api::models::AnonRecord;
use crate::core::session::{ResultSession, Tab};
use crate::core::view::{PageFigure, PanelStats, PanelView, RecordSource};
use crate::error::AppError;
use crate::utils::text::{sanitize_cell, truncate_text_unicode};
use comfy_table::{Attribute, Cell, Color, Table, presets};
use crossterm::terminal;

const VALUE_COLUMN_WIDTH: usize = 40;

/// Renderer for the result view: pure projections from session state to
/// terminal output, no side effects on state.
pub struct TableDisplay {
    max_width: Option<usize>,
    use_colors: bool,
}

impl Default for TableDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl TableDisplay {
    pub fn new() -> Self {
        Self {
            max_width: Self::detect_terminal_width(),
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }

    fn detect_terminal_width() -> Option<usize> {
        match terminal::size() {
            Ok((cols, _rows)) => {
                let width = cols as usize;
                // Clamp for stability on unusual terminals
                Some(width.clamp(40, 200))
            }
            Err(_) => Some(80),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Render the data panel: record table plus summary counters. Loading,
    /// failure, and empty record sets all produce an explicit message, never
    /// a bare empty table.
    pub fn render_panel(&self, panel: &PanelView) -> Result<String, AppError> {
        let body = match panel.source {
            RecordSource::Loading => "Loading anonymization records...".to_string(),
            RecordSource::Failed => "No data available (the record fetch failed).".to_string(),
            RecordSource::Records(records) if records.is_empty() => {
                "No anonymization records found.".to_string()
            }
            RecordSource::Records(records) => {
                self.render_record_table(records, panel.tab == Tab::Aggregated)?
            }
        };

        Ok(format!("{}\n{}", body, self.render_stats(&panel.stats)))
    }

    fn render_record_table(
        &self,
        records: &[AnonRecord],
        include_page_column: bool,
    ) -> Result<String, AppError> {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL);
        table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width as u16);
        }

        let mut headers = vec!["Entity", "Original", "Anonymized"];
        if include_page_column {
            headers.push("Page");
        }
        if self.use_colors {
            table.set_header(
                headers
                    .iter()
                    .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
                    .collect::<Vec<_>>(),
            );
        } else {
            table.set_header(headers);
        }

        for record in records {
            let original = self.format_value(&record.original_value);
            let mut row = vec![
                Cell::new(sanitize_cell(&record.entity_key)),
                Cell::new(&original),
            ];

            match &record.anonymized_value {
                Some(replacement) => row.push(Cell::new(self.format_value(replacement))),
                None => {
                    let cell = Cell::new("(not anonymized)");
                    row.push(if self.use_colors {
                        cell.fg(Color::DarkGrey).add_attribute(Attribute::Italic)
                    } else {
                        cell
                    });
                }
            }

            if include_page_column {
                let page = record
                    .page_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                row.push(Cell::new(page));
            }

            table.add_row(row);
        }

        Ok(table.to_string())
    }

    fn format_value(&self, value: &str) -> String {
        truncate_text_unicode(&sanitize_cell(value), VALUE_COLUMN_WIDTH)
    }

    /// Summary counters: total records, how many carry a replacement, and
    /// the page figure for the active tab.
    pub fn render_stats(&self, stats: &PanelStats) -> String {
        let pages = match stats.pages {
            PageFigure::Total(count) => format!("Pages: {}", count),
            PageFigure::Current(page_number) => format!("Page: {}", page_number),
            PageFigure::Unknown => "Pages: -".to_string(),
        };
        format!(
            "Total: {} | Anonymized: {} | {}",
            stats.total, stats.anonymized, pages
        )
    }

    /// One entry per page, the selected page bracketed. Empty and unresolved
    /// page lists each render an explicit state.
    pub fn render_page_strip(&self, session: &ResultSession) -> String {
        if !session.pages_resolved() {
            return "Pages: loading...".to_string();
        }
        if session.page_list().is_empty() {
            return "No pages available.".to_string();
        }

        let entries: Vec<String> = session
            .page_list()
            .iter()
            .enumerate()
            .map(|(index, page)| {
                if Some(index) == session.selected_index() {
                    format!("[{}]", page.page_number)
                } else {
                    page.page_number.to_string()
                }
            })
            .collect();
        format!("Pages: {}", entries.join(" "))
    }

    /// Preview pane: the presigned URL for the selected page, or the
    /// explicit placeholder when there is no page or the exchange failed.
    pub fn render_preview(&self, url: Option<&str>) -> String {
        match url {
            Some(url) => format!("Preview: {}", url),
            None => "No preview available.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::view::{PageFigure, PanelStats, PanelView, RecordSource};

    fn display() -> TableDisplay {
        TableDisplay::new().with_colors(false).with_max_width(120)
    }

    fn record(key: &str, original: &str, replacement: Option<&str>, page: Option<u32>) -> AnonRecord {
        AnonRecord {
            entity_key: key.to_string(),
            original_value: original.to_string(),
            anonymized_value: replacement.map(str::to_string),
            page_number: page,
        }
    }

    fn panel<'a>(source: RecordSource<'a>, tab: Tab, pages: PageFigure) -> PanelView<'a> {
        let (total, anonymized) = match source {
            RecordSource::Records(records) => (
                records.len(),
                records.iter().filter(|r| r.is_anonymized()).count(),
            ),
            _ => (0, 0),
        };
        PanelView {
            tab,
            source,
            stats: PanelStats {
                total,
                anonymized,
                pages,
            },
        }
    }

    #[test]
    fn test_render_panel_with_records() {
        let records = vec![
            record("NAME", "Alice", Some("PERSON_1"), Some(1)),
            record("EMAIL", "a@b.example", None, Some(2)),
        ];
        let view = panel(
            RecordSource::Records(&records),
            Tab::Aggregated,
            PageFigure::Total(3),
        );
        let output = display().render_panel(&view).unwrap();

        assert!(output.contains("NAME"));
        assert!(output.contains("PERSON_1"));
        assert!(output.contains("(not anonymized)"));
        assert!(output.contains("Page"));
        assert!(output.contains("Total: 2 | Anonymized: 1 | Pages: 3"));
    }

    #[test]
    fn test_render_panel_per_page_omits_page_column() {
        let records = vec![record("NAME", "Alice", Some("PERSON_1"), None)];
        let view = panel(
            RecordSource::Records(&records),
            Tab::PerPage,
            PageFigure::Current(2),
        );
        let output = display().render_panel(&view).unwrap();
        assert!(!output.contains("│ Page"));
        assert!(output.contains("Page: 2"));
    }

    #[test]
    fn test_render_panel_empty_is_explicit_message_not_empty_table() {
        let view = panel(
            RecordSource::Records(&[]),
            Tab::PerPage,
            PageFigure::Current(2),
        );
        let output = display().render_panel(&view).unwrap();
        assert!(output.contains("No anonymization records found."));
        assert!(output.contains("Total: 0"));
        // No table frame appears in the empty state
        assert!(!output.contains("│"));
    }

    #[test]
    fn test_render_panel_failed_and_loading_states() {
        let failed = panel(RecordSource::Failed, Tab::Aggregated, PageFigure::Unknown);
        let output = display().render_panel(&failed).unwrap();
        assert!(output.contains("No data available"));

        let loading = panel(RecordSource::Loading, Tab::Aggregated, PageFigure::Unknown);
        let output = display().render_panel(&loading).unwrap();
        assert!(output.contains("Loading"));
    }

    #[test]
    fn test_render_panel_sanitizes_hostile_values() {
        let records = vec![record("NAME", "evil\x1b[2Jtext", Some("P\x1b_1"), Some(1))];
        let view = panel(
            RecordSource::Records(&records),
            Tab::Aggregated,
            PageFigure::Total(1),
        );
        let output = display().render_panel(&view).unwrap();
        assert!(!output.contains('\x1b'));
    }

    #[test]
    fn test_render_page_strip_marks_selection() {
        let mut session = ResultSession::new();
        let token = session.open("task-1");
        session.apply_page_list(
            token,
            vec![
                crate::api::models::PageRef {
                    page_number: 1,
                    image_ref: "k1".to_string(),
                },
                crate::api::models::PageRef {
                    page_number: 2,
                    image_ref: "k2".to_string(),
                },
            ],
        );
        session.select_page(1);
        assert_eq!(display().render_page_strip(&session), "Pages: 1 [2]");
    }

    #[test]
    fn test_render_page_strip_states() {
        let mut session = ResultSession::new();
        let token = session.open("task-1");
        assert_eq!(display().render_page_strip(&session), "Pages: loading...");

        session.apply_page_list_failure(token);
        assert_eq!(display().render_page_strip(&session), "No pages available.");
    }

    #[test]
    fn test_render_preview() {
        let d = display();
        assert_eq!(
            d.render_preview(Some("https://signed.example/1")),
            "Preview: https://signed.example/1"
        );
        assert_eq!(d.render_preview(None), "No preview available.");
    }
}
