//! style.rs – bold header cells + cell coordinate helpers

use anyhow::{Context, Result, bail};
use quick_xml::{Reader, events::Event};
use regex::Regex;

use crate::{XlsxEditor, bump_count, find_bytes, set_attr};

/// Excel's last column, `XFD`.
pub const MAX_COLUMN: u32 = 16_384;

/* ========================== TARGET PARSER ================================= */

#[derive(Debug, PartialEq)]
enum Target {
    Cell(String),
    Rect { c0: u32, r0: u32, c1: u32, r1: u32 },
}

impl Target {
    fn cells(&self) -> Vec<String> {
        match self {
            Target::Cell(c) => vec![c.clone()],
            Target::Rect { c0, r0, c1, r1 } => (*r0.min(r1)..=*r0.max(r1))
                .flat_map(|r| (*c0.min(c1)..=*c0.max(c1)).map(move |c| cell_ref(c, r)))
                .collect(),
        }
    }
}

fn parse_target(s: &str) -> Result<Target> {
    let re_cell = Regex::new(r"^([A-Za-z]+)([0-9]+)$")?;
    let re_rect = Regex::new(r"^([A-Za-z]+[0-9]+):([A-Za-z]+[0-9]+)$")?;

    if re_cell.is_match(s) {
        split_coord(s)?;
        return Ok(Target::Cell(s.to_ascii_uppercase()));
    }
    if let Some(caps) = re_rect.captures(s) {
        let (c0, r0) = split_coord(&caps[1])?;
        let (c1, r1) = split_coord(&caps[2])?;
        return Ok(Target::Rect { c0, r0, c1, r1 });
    }
    bail!("invalid range syntax: {s}");
}

/* ========================== PUBLIC API ==================================== */

impl XlsxEditor {
    /// Makes every cell in `range` (`"B2"` or `"A1:C1"`) bold.
    ///
    /// Each cell keeps the rest of its formatting: its font is cloned with
    /// `<b/>` added and its cell format is cloned to point at that font.
    /// Clones are shared between cells and reused across calls, so bolding
    /// an already bold cell changes nothing.
    pub fn set_bold(&mut self, range: &str) -> Result<&mut Self> {
        for coord in parse_target(range)?.cells() {
            self.bold_one_cell(&coord)?;
        }
        Ok(self)
    }

    pub fn is_bold(&self, coord: &str) -> Result<bool> {
        let xf_id = self.cell_style_id(coord)?.unwrap_or(0);
        let xfs = element_spans(&self.styles_xml, b"cellXfs", b"xf")?;
        let Some(&(xs, xe)) = xfs.get(xf_id as usize) else {
            return Ok(false);
        };
        let font_id = attr_u32(&self.styles_xml[xs..xe], b"fontId")?.unwrap_or(0);
        let fonts = element_spans(&self.styles_xml, b"fonts", b"font")?;
        match fonts.get(font_id as usize) {
            Some(&(fs, fe)) => font_is_bold(&self.styles_xml[fs..fe]),
            None => Ok(false),
        }
    }
}

/* ========================== LOW-LEVEL HELPERS ============================= */

impl XlsxEditor {
    fn bold_one_cell(&mut self, coord: &str) -> Result<()> {
        let xf_id = self.cell_style_id(coord)?.unwrap_or(0);

        let xfs = element_spans(&self.styles_xml, b"cellXfs", b"xf")?;
        let &(xs, xe) = xfs
            .get(xf_id as usize)
            .with_context(|| format!("styles.xml: cell format {xf_id} not found"))?;
        let xf_xml = self.styles_xml[xs..xe].to_vec();

        let font_id = attr_u32(&xf_xml, b"fontId")?.unwrap_or(0);
        let fonts = element_spans(&self.styles_xml, b"fonts", b"font")?;
        let &(fs, fe) = fonts
            .get(font_id as usize)
            .with_context(|| format!("styles.xml: font {font_id} not found"))?;
        let font_xml = &self.styles_xml[fs..fe];

        if font_is_bold(font_xml)? {
            return Ok(());
        }

        let bold_font = make_bold(font_xml)?;
        let bold_font_id = self.ensure_font(&bold_font)?;

        let new_xf = with_attrs(
            &xf_xml,
            &[
                (&b"fontId"[..], bold_font_id.to_string().as_str()),
                (&b"applyFont"[..], "1"),
            ],
        )?;
        let new_xf_id = self.ensure_xf(&new_xf)?;
        log::trace!("{coord}: cell format {xf_id} -> {new_xf_id} (font {font_id} -> {bold_font_id})");

        self.set_style_id(coord, new_xf_id)
    }

    /// Index of a `<font>` equal to `font_xml`, appending it if absent.
    fn ensure_font(&mut self, font_xml: &[u8]) -> Result<u32> {
        let fonts = element_spans(&self.styles_xml, b"fonts", b"font")?;
        if let Some(i) = fonts
            .iter()
            .position(|&(s, e)| &self.styles_xml[s..e] == font_xml)
        {
            return Ok(i as u32);
        }
        let insert = find_bytes(&self.styles_xml, b"</fonts>")
            .context("<fonts> block not found in styles.xml")?;
        self.styles_xml
            .splice(insert..insert, font_xml.iter().copied());
        bump_count(&mut self.styles_xml, b"<fonts")?;
        self.dirty = true;
        Ok(fonts.len() as u32)
    }

    /// Index of an `<xf>` in `<cellXfs>` equal to `xf_xml`, appending it if absent.
    fn ensure_xf(&mut self, xf_xml: &[u8]) -> Result<u32> {
        let xfs = element_spans(&self.styles_xml, b"cellXfs", b"xf")?;
        if let Some(i) = xfs.iter().position(|&(s, e)| &self.styles_xml[s..e] == xf_xml) {
            return Ok(i as u32);
        }
        let pos = find_bytes(&self.styles_xml, b"</cellXfs>")
            .context("styles.xml: </cellXfs> not found")?;
        self.styles_xml.splice(pos..pos, xf_xml.iter().copied());
        bump_count(&mut self.styles_xml, b"<cellXfs")?;
        self.dirty = true;
        Ok(xfs.len() as u32)
    }
}

/// Byte spans of the `child` elements directly under the first `parent`.
fn element_spans(xml: &[u8], parent: &[u8], child: &[u8]) -> Result<Vec<(usize, usize)>> {
    let mut rdr = Reader::from_reader(xml);
    let mut spans = Vec::new();
    let mut inside = false;

    loop {
        let before = rdr.buffer_position() as usize;
        match rdr.read_event()? {
            Event::Start(e) if !inside && e.local_name().as_ref() == parent => inside = true,
            Event::End(e) if inside && e.local_name().as_ref() == parent => break,
            Event::Start(e) if inside => {
                rdr.read_to_end(e.name())?;
                if e.local_name().as_ref() == child {
                    spans.push((before, rdr.buffer_position() as usize));
                }
            }
            Event::Empty(e) if inside && e.local_name().as_ref() == child => {
                spans.push((before, rdr.buffer_position() as usize));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(spans)
}

fn attr_u32(element: &[u8], name: &[u8]) -> Result<Option<u32>> {
    let mut rdr = Reader::from_reader(element);
    loop {
        match rdr.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                for a in e.attributes().with_checks(false).flatten() {
                    if a.key.as_ref() == name {
                        return Ok(Some(std::str::from_utf8(&a.value)?.trim().parse()?));
                    }
                }
                return Ok(None);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// `<b/>` and `<b val="1"/>` are bold; `<b val="0"/>` is not.
fn font_is_bold(font_xml: &[u8]) -> Result<bool> {
    let mut rdr = Reader::from_reader(font_xml);
    loop {
        match rdr.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"b" => {
                let off = e
                    .attributes()
                    .with_checks(false)
                    .flatten()
                    .find(|a| a.key.as_ref() == b"val")
                    .is_some_and(|a| matches!(a.value.as_ref(), b"0" | b"false"));
                return Ok(!off);
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
    }
}

/// Same font with a `<b/>` as the first child (Excel wants it first).
fn make_bold(font_xml: &[u8]) -> Result<Vec<u8>> {
    let re_b = Regex::new(r"<b(\s[^>]*)?/>")?;
    let text = std::str::from_utf8(font_xml)?;
    let text = re_b.replace_all(text, "");

    let tag_end = text.find('>').context("malformed <font> element")?;
    let mut out = String::with_capacity(text.len() + 16);
    if text[..tag_end].ends_with('/') {
        let name_end = text[1..]
            .find(|c: char| c.is_whitespace() || c == '/')
            .map_or(tag_end, |p| p + 1);
        out.push_str(&text[..tag_end - 1]);
        out.push_str("><b/></");
        out.push_str(&text[1..name_end]);
        out.push('>');
    } else {
        out.push_str(&text[..=tag_end]);
        out.push_str("<b/>");
        out.push_str(&text[tag_end + 1..]);
    }
    Ok(out.into_bytes())
}

/// Sets attributes on the start tag of `element`, leaving its children alone.
fn with_attrs(element: &[u8], attrs: &[(&[u8], &str)]) -> Result<Vec<u8>> {
    let tag_end = find_bytes(element, b">").context("malformed element")? + 1;
    let mut tag = element[..tag_end].to_vec();
    for (name, value) in attrs {
        set_attr(&mut tag, name, value)?;
    }
    tag.extend_from_slice(&element[tag_end..]);
    Ok(tag)
}

/* ========================== COORDINATES =================================== */

/// 1 → `A`, 27 → `AA`.
pub fn column_letters(mut col: u32) -> String {
    let mut s = Vec::new();
    while col > 0 {
        s.push(b'A' + ((col - 1) % 26) as u8);
        col = (col - 1) / 26;
    }
    s.reverse();
    String::from_utf8_lossy(&s).into_owned()
}

/// `A` → 1, `aa` → 27.
pub fn column_number(letters: &str) -> Result<u32> {
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        bail!("invalid column `{letters}`");
    }
    let n = letters.bytes().try_fold(0u32, |acc, b| {
        acc.checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)
    });
    match n {
        Some(n) if n <= MAX_COLUMN => Ok(n),
        _ => bail!("column `{letters}` is past {}", column_letters(MAX_COLUMN)),
    }
}

/// `"B7"` → `(2, 7)`.
pub fn split_coord(coord: &str) -> Result<(u32, u32)> {
    let p = coord
        .find(|c: char| c.is_ascii_digit())
        .with_context(|| format!("invalid cell reference `{coord}`"))?;
    let col = column_number(&coord[..p])
        .with_context(|| format!("invalid cell reference `{coord}`"))?;
    let row: u32 = coord[p..]
        .parse()
        .with_context(|| format!("invalid cell reference `{coord}`"))?;
    if row == 0 {
        bail!("invalid cell reference `{coord}`");
    }
    Ok((col, row))
}

/// `(2, 7)` → `"B7"`.
pub fn cell_ref(col: u32, row: u32) -> String {
    format!("{}{}", column_letters(col), row)
}
