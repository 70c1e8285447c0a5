//! The ID sheet: header setup, ID collection and per-row writes.

use rust_core::{CellValue, XlsxEditor, cell_ref};
use std::path::Path;

use crate::{
    api::Article,
    config::{BODY_HEADER, ERROR_HEADER, ID_HEADER, TITLE_HEADER, is_valid_id},
    error::{EnrichError, Result},
};

/// 1-based column numbers of the columns the job reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub id: u32,
    pub title: u32,
    pub body: u32,
    pub error: u32,
}

/// A valid ID and the sheet row it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRow {
    pub id: i64,
    pub row: u32,
}

pub struct EnrichSheet {
    editor: XlsxEditor,
    columns: Columns,
}

impl EnrichSheet {
    /// Opens `sheet_name` and makes sure it has Title, Body and Error columns.
    pub fn open(path: &Path, sheet_name: &str) -> Result<Self> {
        if !path.exists() {
            return Err(EnrichError::FileNotFound(path.to_path_buf()));
        }
        let invalid = |e: anyhow::Error| EnrichError::InvalidFormat {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        };

        let names = rust_core::scan(path).map_err(invalid)?;
        if !names.iter().any(|n| n == sheet_name) {
            return Err(EnrichError::MissingSheet(sheet_name.to_owned()));
        }
        let editor = XlsxEditor::open(path, sheet_name).map_err(invalid)?;
        ensure_columns(editor)
    }

    pub fn columns(&self) -> Columns {
        self.columns
    }

    pub fn editor(&self) -> &XlsxEditor {
        &self.editor
    }

    /// Valid IDs of the data rows (row 2 on), in row order. Cells that do not
    /// hold an integer are skipped without comment.
    pub fn collect_ids(&self) -> Result<Vec<IdRow>> {
        let rows = self.editor.rows()?;
        Ok(rows
            .iter()
            .filter(|r| r.index >= 2)
            .filter_map(|r| {
                let id = parse_id(r.get(self.columns.id)?)?;
                is_valid_id(id).then_some(IdRow { id, row: r.index })
            })
            .collect())
    }

    /// Fills Title/Body and clears a stale Error cell.
    pub fn write_article(&mut self, row: u32, article: &Article) -> Result<()> {
        self.editor
            .set_cell(&cell_ref(self.columns.title, row), article.title.as_str())?;
        self.editor
            .set_cell(&cell_ref(self.columns.body, row), article.body.as_str())?;
        self.editor.clear_cell(&cell_ref(self.columns.error, row))?;
        Ok(())
    }

    /// Fills the Error cell and clears stale Title/Body cells.
    pub fn write_error(&mut self, row: u32, reference_url: &str) -> Result<()> {
        self.editor
            .set_cell(&cell_ref(self.columns.error, row), reference_url)?;
        self.editor.clear_cell(&cell_ref(self.columns.title, row))?;
        self.editor.clear_cell(&cell_ref(self.columns.body, row))?;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.editor.is_dirty()
    }

    /// Writes the workbook back over the file it was opened from.
    pub fn save(&mut self) -> Result<()> {
        self.editor.save_in_place()?;
        Ok(())
    }
}

/// Finds the ID column and appends whichever of Title, Body and Error is
/// missing after the last used column. The header row is made bold when
/// anything was added.
fn ensure_columns(mut editor: XlsxEditor) -> Result<EnrichSheet> {
    let header: Vec<(u32, String)> = editor
        .row(1)?
        .map(|r| r.cells.iter().map(|(c, v)| (*c, v.to_text())).collect())
        .unwrap_or_default();
    let find = |name: &str| header.iter().find(|(_, h)| h == name).map(|(c, _)| *c);

    let id = find(ID_HEADER)
        .ok_or_else(|| EnrichError::MissingIdColumn(editor.sheet_name().to_owned()))?;

    let mut next = editor.max_column()? + 1;
    let mut added = Vec::new();
    let mut column_for = |name: &'static str| {
        find(name).unwrap_or_else(|| {
            let col = next;
            next += 1;
            added.push((col, name));
            col
        })
    };
    let title = column_for(TITLE_HEADER);
    let body = column_for(BODY_HEADER);
    let error = column_for(ERROR_HEADER);

    if !added.is_empty() {
        for (col, name) in &added {
            editor.set_cell(&cell_ref(*col, 1), *name)?;
        }
        let header_cols = header.iter().map(|(c, _)| *c).chain(added.iter().map(|(c, _)| *c));
        for col in header_cols {
            editor.set_bold(&cell_ref(col, 1))?;
        }
        log::info!(
            "Added {} columns to sheet '{}'",
            added.iter().map(|(_, n)| *n).collect::<Vec<_>>().join("/"),
            editor.sheet_name()
        );
    }

    Ok(EnrichSheet {
        editor,
        columns: Columns {
            id,
            title,
            body,
            error,
        },
    })
}

/// Numbers are truncated toward zero; text must be a plain integer.
pub fn parse_id(value: &CellValue) -> Option<i64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}
