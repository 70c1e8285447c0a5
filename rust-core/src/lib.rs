//! lib.rs: in-place xlsx editing core.
//! Only the edited worksheet part and styles.xml are rewritten on save;
//! every other part of the package is copied through untouched.

#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;
mod read_part;
pub mod style;

pub use read_part::{CellValue, SheetRow};
pub use style::{cell_ref, column_letters, split_coord};

use anyhow::{Context, Result, bail};
use quick_xml::{
    Reader, Writer,
    events::{BytesText, Event},
};
use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PATH: &str = "xl/styles.xml";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

/// Excel refuses to open cells holding more characters than this.
pub const MAX_CELL_CHARS: usize = 32_767;

/// `XlsxEditor` opens one sheet of an XLSX package, lets you read and edit
/// its cells, and writes the package back out.
pub struct XlsxEditor {
    src_path: PathBuf,
    sheet_name: String,
    sheet_path: String,
    sheet_xml: Vec<u8>,
    styles_xml: Vec<u8>,
    shared_strings: Vec<String>,
    last_row: u32,
    dirty: bool,
}

/// Byte offsets of one `<c>` element inside `sheet_xml`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CellSpan {
    pub start: usize,
    pub tag_end: usize,
    pub end: usize,
}

/// Work with files
impl XlsxEditor {
    /// Opens the workbook at `src` and prepares the sheet called `sheet_name`.
    ///
    /// The worksheet part is found through `xl/workbook.xml` and its
    /// relationships, so the sheet's position in the tab bar does not matter.
    pub fn open<P: AsRef<Path>>(src: P, sheet_name: &str) -> Result<Self> {
        let src_path = src.as_ref().to_path_buf();
        let mut zip = zip::ZipArchive::new(
            File::open(&src_path).with_context(|| format!("cannot open {}", src_path.display()))?,
        )
        .with_context(|| format!("{} is not an xlsx package", src_path.display()))?;

        let workbook_xml = read_zip_entry(&mut zip, WORKBOOK_PATH)?;
        let rels_xml = read_zip_entry(&mut zip, WORKBOOK_RELS_PATH)?;
        let sheet_path = resolve_sheet_path(&workbook_xml, &rels_xml, sheet_name)?;

        let mut sheet_xml = read_zip_entry(&mut zip, &sheet_path)?;
        expand_empty_sheet_data(&mut sheet_xml)?;
        let styles_xml = read_zip_entry(&mut zip, STYLES_PATH)?;

        // sharedStrings.xml is optional: files with only inline strings omit it
        let shared_strings = match zip.by_name(SHARED_STRINGS_PATH) {
            Ok(mut part) => {
                let mut buf = Vec::with_capacity(part.size() as usize);
                part.read_to_end(&mut buf)?;
                read_part::parse_shared_strings(&buf)?
            }
            Err(zip::result::ZipError::FileNotFound) => Vec::new(),
            Err(e) => return Err(e).context("cannot read xl/sharedStrings.xml"),
        };

        let (_, last_row) = read_part::used_extent(&sheet_xml)?.max;
        log::debug!(
            "opened sheet '{}' ({}) in {}, last row {}",
            sheet_name,
            sheet_path,
            src_path.display(),
            last_row
        );

        Ok(Self {
            src_path,
            sheet_name: sheet_name.to_owned(),
            sheet_path,
            sheet_xml,
            styles_xml,
            shared_strings,
            last_row,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.src_path
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn last_row(&self) -> u32 {
        self.last_row
    }

    /// True when cells or styles changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the package to `dst`.
    ///
    /// The new package goes to a temporary file in the destination directory
    /// which is then renamed over `dst`, so `dst` is never left half-written.
    /// Saving over the source path is fine.
    pub fn save<P: AsRef<Path>>(&mut self, dst: P) -> Result<()> {
        self.refresh_dimension()?;

        let dst = dst.as_ref();
        let dir = match dst.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("cannot create a temporary file in {}", dir.display()))?;

        {
            let mut zin = zip::ZipArchive::new(File::open(&self.src_path)?)?;
            let mut zout = zip::ZipWriter::new(&mut tmp);

            let opt: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .compression_level(Some(1));

            for i in 0..zin.len() {
                let file = zin.by_index_raw(i)?;
                let name = file.name().to_owned();

                if name == self.sheet_path {
                    zout.start_file(name.as_str(), opt)?;
                    zout.write_all(&self.sheet_xml)?;
                } else if name == STYLES_PATH {
                    zout.start_file(name.as_str(), opt)?;
                    zout.write_all(&self.styles_xml)?;
                } else {
                    zout.raw_copy_file(file)?;
                }
            }
            zout.finish()?;
        }

        // NamedTempFile is created 0600; keep whatever mode the target had
        if let Ok(meta) = fs::metadata(dst) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.persist(dst)
            .with_context(|| format!("cannot replace {}", dst.display()))?;

        self.src_path = dst.to_path_buf();
        self.dirty = false;
        log::debug!("saved {}", dst.display());
        Ok(())
    }

    /// Saves back over the file the editor was opened from.
    pub fn save_in_place(&mut self) -> Result<()> {
        let dst = self.src_path.clone();
        self.save(dst)
    }
}

/// Main
impl XlsxEditor {
    /// Sets the value of a cell, creating the row and the cell when needed.
    ///
    /// An existing cell keeps its style (`s` attribute). Text is always
    /// written as an inline string, so numeric-looking text stays text.
    pub fn set_cell<V: Into<CellValue>>(&mut self, coord: &str, value: V) -> Result<()> {
        let coord = coord.to_ascii_uppercase();
        let (_, row) = split_coord(&coord)?;
        self.ensure_row(row)?;

        let existing = self.locate_cell(&coord)?;
        let style = existing.and_then(|span| self.style_attr(span));
        let xml = cell_xml(&coord, style, &value.into())?;

        match existing {
            Some(span) => {
                self.sheet_xml.splice(span.start..span.end, xml);
            }
            None => self.insert_cell_xml(&coord, xml)?,
        }
        self.touch(row);
        Ok(())
    }

    /// Removes a cell (value and style). Returns whether it existed.
    pub fn clear_cell(&mut self, coord: &str) -> Result<bool> {
        let coord = coord.to_ascii_uppercase();
        let Some(span) = self.locate_cell(&coord)? else {
            return Ok(false);
        };
        self.sheet_xml.drain(span.start..span.end);
        self.dirty = true;
        Ok(true)
    }

    /// Points a cell at cell format `style` (an index into `cellXfs`).
    /// A missing cell is created empty.
    pub(crate) fn set_style_id(&mut self, coord: &str, style: u32) -> Result<()> {
        let coord = coord.to_ascii_uppercase();
        let (_, row) = split_coord(&coord)?;
        match self.locate_cell(&coord)? {
            Some(span) => {
                let mut tag = self.sheet_xml[span.start..span.tag_end].to_vec();
                set_attr(&mut tag, b"s", &style.to_string())?;
                self.sheet_xml.splice(span.start..span.tag_end, tag);
            }
            None => {
                let xml = format!(r#"<c r="{coord}" s="{style}"/>"#).into_bytes();
                self.insert_cell_xml(&coord, xml)?;
            }
        }
        self.touch(row);
        Ok(())
    }

    pub(crate) fn cell_style_id(&self, coord: &str) -> Result<Option<u32>> {
        Ok(self
            .locate_cell(&coord.to_ascii_uppercase())?
            .and_then(|span| self.style_attr(span)))
    }

    fn touch(&mut self, row: u32) {
        if row > self.last_row {
            self.last_row = row;
        }
        self.dirty = true;
    }

    fn style_attr(&self, span: CellSpan) -> Option<u32> {
        let tag = &self.sheet_xml[span.start..span.tag_end];
        let pos = find_bytes(tag, b" s=\"")? + 4;
        let end = find_bytes_from(tag, b"\"", pos)?;
        std::str::from_utf8(&tag[pos..end]).ok()?.parse().ok()
    }

    /// `(start, end)` of `<row r="N">…</row>` (or of a self-closing `<row/>`).
    fn row_span(&self, row: u32) -> Result<Option<(usize, usize)>> {
        let marker = format!(r#"<row r="{row}""#);
        let Some(start) = find_bytes(&self.sheet_xml, marker.as_bytes()) else {
            return Ok(None);
        };
        let tag_end = find_bytes_from(&self.sheet_xml, b">", start)
            .context("malformed <row> tag")?
            + 1;
        if self.sheet_xml[tag_end - 2] == b'/' {
            return Ok(Some((start, tag_end)));
        }
        let end = find_bytes_from(&self.sheet_xml, b"</row>", tag_end)
            .context("</row> not found")?
            + b"</row>".len();
        Ok(Some((start, end)))
    }

    pub(crate) fn locate_cell(&self, coord: &str) -> Result<Option<CellSpan>> {
        let (_, row) = split_coord(coord)?;
        let Some((row_start, row_end)) = self.row_span(row)? else {
            return Ok(None);
        };
        let marker = format!(r#"<c r="{coord}""#);
        let Some(rel) = find_bytes(&self.sheet_xml[row_start..row_end], marker.as_bytes()) else {
            return Ok(None);
        };
        let start = row_start + rel;
        let tag_end = find_bytes_from(&self.sheet_xml, b">", start)
            .context("malformed <c> tag")?
            + 1;
        let end = if self.sheet_xml[tag_end - 2] == b'/' {
            tag_end
        } else {
            find_bytes_from(&self.sheet_xml, b"</c>", tag_end).context("</c> not found")? + 4
        };
        Ok(Some(CellSpan {
            start,
            tag_end,
            end,
        }))
    }

    /// Makes sure row `row` exists as an open `<row>…</row>` element.
    ///
    /// The `spans` hint is dropped from rows we touch; it is optional and
    /// would go stale once cells are added past it.
    fn ensure_row(&mut self, row: u32) -> Result<(usize, usize)> {
        if self.row_span(row)?.is_none() {
            self.insert_row(row)?;
        }
        let marker = format!(r#"<row r="{row}""#);
        let start = find_bytes(&self.sheet_xml, marker.as_bytes()).context("row not found")?;
        let tag_end = find_bytes_from(&self.sheet_xml, b">", start)
            .context("malformed <row> tag")?
            + 1;

        let mut tag = self.sheet_xml[start..tag_end].to_vec();
        remove_attr(&mut tag, b"spans");
        if tag.ends_with(b"/>") {
            tag.truncate(tag.len() - 2);
            tag.extend_from_slice(b"></row>");
        }
        self.sheet_xml.splice(start..tag_end, tag);

        self.row_span(row)?.context("row not found after insert")
    }

    /// Inserts an empty `<row r="N"></row>` keeping rows sorted by `r`;
    /// out-of-order rows make Excel report "recovered records".
    fn insert_row(&mut self, row: u32) -> Result<()> {
        let new_row = format!(r#"<row r="{row}"></row>"#);

        let mut insert_pos: Option<usize> = None;
        let mut search_idx = 0;
        while let Some(abs) = find_bytes_from(&self.sheet_xml, b"<row r=\"", search_idx) {
            let num_start = abs + b"<row r=\"".len();
            let num_end = find_bytes_from(&self.sheet_xml, b"\"", num_start)
                .context("malformed <row> tag")?;
            let existing: Option<u32> = std::str::from_utf8(&self.sheet_xml[num_start..num_end])
                .ok()
                .and_then(|s| s.parse().ok());
            if existing.is_some_and(|r| r > row) {
                insert_pos = Some(abs);
                break;
            }
            search_idx = num_end;
        }

        let pos = match insert_pos {
            Some(p) => p,
            None => rfind_bytes(&self.sheet_xml, b"</sheetData>")
                .context("</sheetData> tag not found")?,
        };
        self.sheet_xml.splice(pos..pos, new_row.into_bytes());
        Ok(())
    }

    /// Inserts a ready `<c>` element into its row, keeping cells in column order.
    fn insert_cell_xml(&mut self, coord: &str, cell_xml: Vec<u8>) -> Result<()> {
        let (col, row) = split_coord(coord)?;
        let (row_start, row_end) = self.ensure_row(row)?;
        let close = row_end - b"</row>".len();

        let mut insert_pos = close;
        let mut i = row_start;
        while let Some(c_pos) = find_bytes_from(&self.sheet_xml[..close], b"<c r=\"", i) {
            let val_start = c_pos + b"<c r=\"".len();
            let val_end = find_bytes_from(&self.sheet_xml, b"\"", val_start)
                .context("malformed <c> tag")?;
            let existing = std::str::from_utf8(&self.sheet_xml[val_start..val_end])?;
            if split_coord(existing).is_ok_and(|(c, _)| c > col) {
                insert_pos = c_pos;
                break;
            }
            i = val_end;
        }
        self.sheet_xml.splice(insert_pos..insert_pos, cell_xml);
        Ok(())
    }

    /// Rewrites `<dimension ref>` so it covers every cell now in the sheet.
    fn refresh_dimension(&mut self) -> Result<()> {
        let Some(pos) = find_bytes(&self.sheet_xml, b"<dimension ") else {
            return Ok(());
        };
        let extent = read_part::used_extent(&self.sheet_xml)?;
        if extent.max.0 == 0 || extent.max.1 == 0 {
            return Ok(());
        }
        let val_start = find_bytes_from(&self.sheet_xml, b"ref=\"", pos)
            .context("<dimension> without ref")?
            + b"ref=\"".len();
        let val_end = find_bytes_from(&self.sheet_xml, b"\"", val_start)
            .context("malformed <dimension> tag")?;

        let first = cell_ref(extent.min.0, extent.min.1);
        let last = cell_ref(extent.max.0, extent.max.1);
        let new_ref = if first == last { first } else { format!("{first}:{last}") };
        self.sheet_xml.splice(val_start..val_end, new_ref.into_bytes());
        Ok(())
    }
}

/// Lists the sheet names of a workbook, in tab order.
pub fn scan<P: AsRef<Path>>(src: P) -> Result<Vec<String>> {
    let mut zip = zip::ZipArchive::new(File::open(src)?)?;
    let wb_xml = read_zip_entry(&mut zip, WORKBOOK_PATH)?;

    let mut reader = Reader::from_reader(wb_xml.as_slice());
    reader.config_mut().trim_text(true);

    let mut names = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                if let Some(n) = e.attributes().with_checks(false).flatten().find_map(|a| {
                    (a.key.as_ref() == b"name").then(|| String::from_utf8_lossy(&a.value).into_owned())
                }) {
                    names.push(unescape_attr(&n));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(names)
}

fn read_zip_entry<R: Read + std::io::Seek>(
    zip: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>> {
    let mut part = zip.by_name(name).with_context(|| format!("{name} not found"))?;
    let mut buf = Vec::with_capacity(part.size() as usize);
    part.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Finds the worksheet part for `sheet_name`: its `r:id` in workbook.xml,
/// then the matching `Target` in workbook.xml.rels.
fn resolve_sheet_path(workbook_xml: &[u8], rels_xml: &[u8], sheet_name: &str) -> Result<String> {
    let mut rdr = Reader::from_reader(workbook_xml);
    rdr.config_mut().trim_text(true);

    let mut target_rid: Option<String> = None;
    loop {
        match rdr.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                let mut name: Option<String> = None;
                let mut rid: Option<String> = None;
                for a in e.attributes().with_checks(false).flatten() {
                    let v = String::from_utf8_lossy(&a.value).into_owned();
                    if a.key.as_ref() == b"name" {
                        name = Some(unescape_attr(&v));
                    } else if a.key.local_name().as_ref() == b"id" {
                        rid = Some(v);
                    }
                }
                if name.as_deref() == Some(sheet_name) {
                    target_rid = rid;
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let target_rid =
        target_rid.with_context(|| format!("Sheet `{sheet_name}` not found in workbook.xml"))?;

    let mut rdr = Reader::from_reader(rels_xml);
    rdr.config_mut().trim_text(true);

    let mut target: Option<String> = None;
    loop {
        match rdr.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id: Option<String> = None;
                let mut tgt: Option<String> = None;
                for a in e.attributes().with_checks(false).flatten() {
                    let v = String::from_utf8_lossy(&a.value).into_owned();
                    match a.key.as_ref() {
                        b"Id" => id = Some(v),
                        b"Target" => tgt = Some(v),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(target_rid.as_str()) {
                    target = tgt;
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let target = target.with_context(|| {
        format!("Relationship for `{sheet_name}` not found in workbook.xml.rels")
    })?;

    // Target is relative to xl/ unless it is package-absolute
    Ok(match target.strip_prefix('/') {
        Some(abs) => abs.to_owned(),
        None if target.starts_with("xl/") => target,
        None => format!("xl/{target}"),
    })
}

/// `<sheetData/>` has nowhere to insert rows; open it up.
fn expand_empty_sheet_data(sheet_xml: &mut Vec<u8>) -> Result<()> {
    if find_bytes(sheet_xml, b"</sheetData>").is_some() {
        return Ok(());
    }
    let pos = find_bytes(sheet_xml, b"<sheetData").context("<sheetData> not found")?;
    let end = find_bytes_from(sheet_xml, b"/>", pos).context("malformed <sheetData> tag")?;
    sheet_xml.splice(end..end + 2, b"></sheetData>".iter().copied());
    Ok(())
}

/// Builds one `<c>` element.
fn cell_xml(coord: &str, style: Option<u32>, value: &CellValue) -> Result<Vec<u8>> {
    let style = style.map(|s| s.to_string());
    let mut writer = Writer::new(Vec::new());
    let mut c_elem = writer.create_element("c").with_attribute(("r", coord));
    if let Some(s) = style.as_deref() {
        c_elem = c_elem.with_attribute(("s", s));
    }

    match value {
        CellValue::Empty => {
            c_elem.write_empty()?;
        }
        CellValue::Text(text) => {
            let text = xml_safe_text(text);
            c_elem
                .with_attribute(("t", "inlineStr"))
                .write_inner_content(|w| {
                    w.create_element("is").write_inner_content(|w2| {
                        let mut t_elem = w2.create_element("t");
                        if text.trim() != text || text.contains('\n') {
                            t_elem = t_elem.with_attribute(("xml:space", "preserve"));
                        }
                        t_elem.write_text_content(BytesText::new(&text))?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
        }
        CellValue::Number(n) => {
            if !n.is_finite() {
                bail!("cannot store {n} in cell {coord}");
            }
            c_elem.write_inner_content(|w| {
                w.create_element("v")
                    .write_text_content(BytesText::new(&n.to_string()))?;
                Ok(())
            })?;
        }
        CellValue::Bool(b) => {
            c_elem
                .with_attribute(("t", "b"))
                .write_inner_content(|w| {
                    w.create_element("v")
                        .write_text_content(BytesText::new(if *b { "1" } else { "0" }))?;
                    Ok(())
                })?;
        }
        CellValue::Error(code) => {
            c_elem
                .with_attribute(("t", "e"))
                .write_inner_content(|w| {
                    w.create_element("v").write_text_content(BytesText::new(code))?;
                    Ok(())
                })?;
        }
    }
    Ok(writer.into_inner())
}

/// Drops characters XML 1.0 cannot carry and clamps to Excel's cell limit.
fn xml_safe_text(text: &str) -> String {
    let mut out: String = text
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect();
    if out.chars().count() > MAX_CELL_CHARS {
        log::warn!(
            "cell text of {} characters truncated to {MAX_CELL_CHARS}",
            out.chars().count()
        );
        out = out.chars().take(MAX_CELL_CHARS).collect();
    }
    out
}

fn unescape_attr(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_owned())
}

/* ========================== BYTE/STRING HELPERS =========================== */

pub(crate) fn find_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(hay, needle)
}

pub(crate) fn find_bytes_from(hay: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if start > hay.len() {
        return None;
    }
    memchr::memmem::find(&hay[start..], needle).map(|p| p + start)
}

pub(crate) fn rfind_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::rfind(hay, needle)
}

/// Increments `count="N"` on the first `tag` start tag. A tag without a
/// `count` attribute is left alone (the attribute is optional).
pub(crate) fn bump_count(xml: &mut Vec<u8>, tag: &[u8]) -> Result<()> {
    let pos = find_bytes(xml, tag).with_context(|| {
        format!("{} not found", String::from_utf8_lossy(tag))
    })?;
    let tag_end = find_bytes_from(xml, b">", pos).context("malformed start tag")?;
    let Some(a) = find_bytes_from(&xml[..tag_end], b" count=\"", pos) else {
        return Ok(());
    };
    let start = a + b" count=\"".len();
    let end = find_bytes_from(xml, b"\"", start).context("closing quote not found")?;
    let num: u32 = std::str::from_utf8(&xml[start..end])?.parse()?;
    xml.splice(start..end, (num + 1).to_string().bytes());
    Ok(())
}

/// Sets `name="value"` on a start tag held in `tag` (which may be `<x …/>`).
pub(crate) fn set_attr(tag: &mut Vec<u8>, name: &[u8], value: &str) -> Result<()> {
    let mut needle = Vec::with_capacity(name.len() + 3);
    needle.push(b' ');
    needle.extend_from_slice(name);
    needle.extend_from_slice(b"=\"");

    if let Some(pos) = find_bytes(tag, &needle) {
        let start = pos + needle.len();
        let end = find_bytes_from(tag, b"\"", start).context("attr closing '\"' not found")?;
        tag.splice(start..end, value.bytes());
        return Ok(());
    }
    let insert = if tag.ends_with(b"/>") {
        tag.len() - 2
    } else if tag.ends_with(b">") {
        tag.len() - 1
    } else {
        bail!("not a start tag: {}", String::from_utf8_lossy(tag));
    };
    let attr = format!(" {}=\"{}\"", String::from_utf8_lossy(name), value);
    tag.splice(insert..insert, attr.into_bytes());
    Ok(())
}

/// Removes `name="…"` from a start tag, if present.
pub(crate) fn remove_attr(tag: &mut Vec<u8>, name: &[u8]) {
    let mut needle = Vec::with_capacity(name.len() + 3);
    needle.push(b' ');
    needle.extend_from_slice(name);
    needle.extend_from_slice(b"=\"");

    if let Some(pos) = find_bytes(tag, &needle) {
        if let Some(end) = find_bytes_from(tag, b"\"", pos + needle.len()) {
            tag.drain(pos..end + 1);
        }
    }
}
