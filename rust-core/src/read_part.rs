//! Reading cell values back out of the loaded sheet.

use crate::{XlsxEditor, split_coord};
use anyhow::{Context, Result};
use quick_xml::{
    Reader,
    events::{BytesRef, BytesStart, Event},
};
use std::collections::BTreeMap;

/// A cell value as stored in the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Error literal such as `#N/A`.
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The value as Excel would display it in a general-format cell.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(true) => "TRUE".into(),
            CellValue::Bool(false) => "FALSE".into(),
            CellValue::Error(code) => code.clone(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<&String> for CellValue {
    fn from(s: &String) -> Self {
        CellValue::Text(s.clone())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// One `<row>` of the sheet. Only non-empty cells are kept, keyed by
/// 1-based column number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    pub index: u32,
    pub cells: BTreeMap<u32, CellValue>,
}

impl SheetRow {
    pub fn get(&self, col: u32) -> Option<&CellValue> {
        self.cells.get(&col)
    }
}

/// Bounding box of the cells present in a sheet, as `(col, row)` pairs.
/// Both are `(0, 0)` when the sheet has no cells.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Extent {
    pub min: (u32, u32),
    pub max: (u32, u32),
}

impl XlsxEditor {
    /// All rows of the sheet, in document order.
    pub fn rows(&self) -> Result<Vec<SheetRow>> {
        parse_rows(&self.sheet_xml, &self.shared_strings)
    }

    pub fn row(&self, index: u32) -> Result<Option<SheetRow>> {
        Ok(self.rows()?.into_iter().find(|r| r.index == index))
    }

    pub fn cell(&self, coord: &str) -> Result<CellValue> {
        let (col, row) = split_coord(coord)?;
        Ok(self
            .row(row)?
            .and_then(|mut r| r.cells.remove(&col))
            .unwrap_or(CellValue::Empty))
    }

    /// Largest column number holding a cell (styled-only cells included);
    /// 0 for an empty sheet.
    pub fn max_column(&self) -> Result<u32> {
        Ok(used_extent(&self.sheet_xml)?.max.0)
    }
}

#[derive(Default)]
struct PendingCell {
    col: u32,
    kind: Option<String>,
    text: String,
}

pub(crate) fn parse_rows(sheet_xml: &[u8], shared: &[String]) -> Result<Vec<SheetRow>> {
    let mut reader = Reader::from_reader(sheet_xml);

    let mut rows = Vec::new();
    let mut current: Option<SheetRow> = None;
    let mut cell: Option<PendingCell> = None;
    let mut next_row = 1u32;
    let mut next_col = 1u32;
    let (mut in_v, mut in_t, mut in_rph) = (false, false, false);

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e)?.unwrap_or(next_row);
                    current = Some(SheetRow {
                        index,
                        cells: BTreeMap::new(),
                    });
                    next_col = 1;
                }
                b"c" => {
                    let (col, kind) = cell_header(&e, next_col)?;
                    next_col = col + 1;
                    cell = Some(PendingCell {
                        col,
                        kind,
                        text: String::new(),
                    });
                }
                b"v" => in_v = true,
                b"t" => in_t = true,
                b"rPh" => in_rph = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e)?.unwrap_or(next_row);
                    next_row = index + 1;
                    rows.push(SheetRow {
                        index,
                        cells: BTreeMap::new(),
                    });
                }
                b"c" => {
                    let (col, _) = cell_header(&e, next_col)?;
                    next_col = col + 1;
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(r) = current.take() {
                        next_row = r.index + 1;
                        rows.push(r);
                    }
                }
                b"c" => {
                    if let Some(p) = cell.take() {
                        let value = finish_cell(p.kind.as_deref(), p.text, shared)?;
                        if let Some(r) = current.as_mut().filter(|_| value != CellValue::Empty) {
                            r.cells.insert(p.col, value);
                        }
                    }
                }
                b"v" => in_v = false,
                b"t" => in_t = false,
                b"rPh" => in_rph = false,
                _ => {}
            },
            Event::Text(e) if in_v || (in_t && !in_rph) => {
                if let Some(p) = cell.as_mut() {
                    p.text.push_str(&e.decode()?);
                }
            }
            Event::CData(e) if in_v || (in_t && !in_rph) => {
                if let Some(p) = cell.as_mut() {
                    p.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) if in_v || (in_t && !in_rph) => {
                if let Some(p) = cell.as_mut() {
                    push_entity(&mut p.text, &e)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

fn finish_cell(kind: Option<&str>, text: String, shared: &[String]) -> Result<CellValue> {
    Ok(match kind {
        Some("s") => {
            let idx: usize = text
                .trim()
                .parse()
                .with_context(|| format!("bad shared string index `{text}`"))?;
            let s = shared
                .get(idx)
                .with_context(|| format!("shared string {idx} out of range"))?;
            CellValue::Text(s.clone())
        }
        Some("inlineStr") | Some("str") => CellValue::Text(text),
        Some("b") => CellValue::Bool(text.trim() == "1"),
        Some("e") => CellValue::Error(text),
        _ if text.is_empty() => CellValue::Empty,
        _ => match text.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(text),
        },
    })
}

fn row_index(e: &BytesStart<'_>) -> Result<Option<u32>> {
    for a in e.attributes().with_checks(false).flatten() {
        if a.key.as_ref() == b"r" {
            let v = std::str::from_utf8(&a.value)?;
            return Ok(Some(v.parse().with_context(|| format!("bad row number `{v}`"))?));
        }
    }
    Ok(None)
}

/// `(column, t attribute)` of a `<c>` start tag; cells without `r` follow
/// the previous one.
fn cell_header(e: &BytesStart<'_>, next_col: u32) -> Result<(u32, Option<String>)> {
    let mut col = next_col;
    let mut kind = None;
    for a in e.attributes().with_checks(false).flatten() {
        match a.key.as_ref() {
            b"r" => col = split_coord(std::str::from_utf8(&a.value)?)?.0,
            b"t" => kind = Some(String::from_utf8_lossy(&a.value).into_owned()),
            _ => {}
        }
    }
    Ok((col, kind))
}

fn push_entity(out: &mut String, e: &BytesRef<'_>) -> Result<()> {
    if let Some(ch) = e.resolve_char_ref()? {
        out.push(ch);
        return Ok(());
    }
    let name = e.decode()?;
    match quick_xml::escape::resolve_predefined_entity(&name) {
        Some(s) => out.push_str(s),
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        }
    }
    Ok(())
}

/// Plain text of every `<si>` in sharedStrings.xml. Rich-text runs are
/// concatenated; phonetic hints (`<rPh>`) are skipped.
pub(crate) fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);

    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let (mut in_t, mut in_rph) = (false, false);

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                b"rPh" => in_rph = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => out.push(current.take().unwrap_or_default()),
                b"t" => in_t = false,
                b"rPh" => in_rph = false,
                _ => {}
            },
            Event::Text(e) if in_t && !in_rph => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&e.decode()?);
                }
            }
            Event::CData(e) if in_t && !in_rph => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) if in_t && !in_rph => {
                if let Some(s) = current.as_mut() {
                    push_entity(s, &e)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Scans every `<c r="…">` in the sheet and returns their bounding box.
pub(crate) fn used_extent(sheet_xml: &[u8]) -> Result<Extent> {
    let mut reader = Reader::from_reader(sheet_xml);
    let mut ext: Option<Extent> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let Some(r) = e
                    .attributes()
                    .with_checks(false)
                    .flatten()
                    .find(|a| a.key.as_ref() == b"r")
                else {
                    continue;
                };
                let (col, row) = split_coord(std::str::from_utf8(&r.value)?)?;
                ext = Some(match ext {
                    None => Extent {
                        min: (col, row),
                        max: (col, row),
                    },
                    Some(x) => Extent {
                        min: (x.min.0.min(col), x.min.1.min(row)),
                        max: (x.max.0.max(col), x.max.1.max(row)),
                    },
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ext.unwrap_or_default())
}
