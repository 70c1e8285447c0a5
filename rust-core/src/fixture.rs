//! Small hand-built workbooks for tests.
//!
//! The layout mirrors what Excel writes: shared strings, a `<dimension>`,
//! `spans` on rows, a one-font stylesheet. Odd-numbered sheets get a
//! package-absolute relationship target (`/xl/worksheets/…`), even ones a
//! relative target, so both resolution paths get exercised.

use anyhow::Result;
use quick_xml::escape::escape;
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::cell_ref;

#[derive(Debug, Clone, PartialEq)]
pub enum FixtureCell {
    /// Text stored in sharedStrings.xml.
    Shared(String),
    /// Text stored inline (`t="inlineStr"`).
    Inline(String),
    Number(f64),
    /// No `<c>` element at all.
    Blank,
}

impl FixtureCell {
    pub fn shared(s: &str) -> Self {
        FixtureCell::Shared(s.to_owned())
    }

    pub fn inline(s: &str) -> Self {
        FixtureCell::Inline(s.to_owned())
    }
}

#[derive(Debug, Clone)]
pub struct FixtureSheet {
    pub name: String,
    /// `rows[0]` is row 1. An empty row is written as `<row r="N"/>`.
    pub rows: Vec<Vec<FixtureCell>>,
}

impl FixtureSheet {
    pub fn new(name: &str, rows: Vec<Vec<FixtureCell>>) -> Self {
        Self {
            name: name.to_owned(),
            rows,
        }
    }
}

pub const APP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>Microsoft Excel</Application></Properties>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Writes an xlsx package at `path` holding `sheets` in tab order.
pub fn write_workbook<P: AsRef<Path>>(path: P, sheets: &[FixtureSheet]) -> Result<()> {
    let mut shared: Vec<String> = Vec::new();
    let mut sheet_parts = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        sheet_parts.push(sheet_xml(sheet, &mut shared));
    }

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape(sheet.name.as_str())
        ));
        let target = if i % 2 == 0 {
            format!("worksheets/sheet{n}.xml")
        } else {
            format!("/xl/worksheets/sheet{n}.xml")
        };
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="{target}"/>"#
        ));
    }
    let n = sheets.len();
    rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#,
        n + 1,
        n + 2
    ));
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");

    let mut sst = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        shared.len()
    );
    for s in &shared {
        sst.push_str(&format!("<si><t>{}</t></si>", escape(s.as_str())));
    }
    sst.push_str("</sst>");

    let mut zip = ZipWriter::new(File::create(path)?);
    let opt = SimpleFileOptions::default();
    let mut put = |name: &str, body: &str| -> Result<()> {
        zip.start_file(name, opt)?;
        zip.write_all(body.as_bytes())?;
        Ok(())
    };

    put("[Content_Types].xml", &content_types)?;
    put(
        "_rels/.rels",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/></Relationships>"#,
    )?;
    put("docProps/app.xml", APP_XML)?;
    put("xl/workbook.xml", &workbook)?;
    put("xl/_rels/workbook.xml.rels", &rels)?;
    put("xl/styles.xml", STYLES_XML)?;
    put("xl/sharedStrings.xml", &sst)?;
    for (i, part) in sheet_parts.iter().enumerate() {
        put(&format!("xl/worksheets/sheet{}.xml", i + 1), part)?;
    }
    zip.finish()?;
    Ok(())
}

fn sheet_xml(sheet: &FixtureSheet, shared: &mut Vec<String>) -> String {
    let max_col = sheet.rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
    let dimension = if max_col == 0 {
        "A1".to_owned()
    } else {
        format!("A1:{}", cell_ref(max_col, sheet.rows.len() as u32))
    };

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="{dimension}"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/>"#
    );
    if sheet.rows.is_empty() {
        xml.push_str("<sheetData/>");
    } else {
        xml.push_str("<sheetData>");
        for (i, row) in sheet.rows.iter().enumerate() {
            let r = i + 1;
            if row.is_empty() {
                xml.push_str(&format!(r#"<row r="{r}"/>"#));
                continue;
            }
            xml.push_str(&format!(r#"<row r="{r}" spans="1:{}">"#, row.len()));
            for (j, cell) in row.iter().enumerate() {
                let coord = cell_ref(j as u32 + 1, r as u32);
                match cell {
                    FixtureCell::Shared(s) => {
                        let idx = match shared.iter().position(|x| x == s) {
                            Some(idx) => idx,
                            None => {
                                shared.push(s.clone());
                                shared.len() - 1
                            }
                        };
                        xml.push_str(&format!(r#"<c r="{coord}" t="s"><v>{idx}</v></c>"#));
                    }
                    FixtureCell::Inline(s) => xml.push_str(&format!(
                        r#"<c r="{coord}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(s.as_str())
                    )),
                    FixtureCell::Number(n) => {
                        xml.push_str(&format!(r#"<c r="{coord}"><v>{n}</v></c>"#))
                    }
                    FixtureCell::Blank => {}
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
    }
    xml.push_str(r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#);
    xml
}

/// Raw content of one part of the package at `path`.
pub fn read_entry<P: AsRef<Path>>(path: P, entry: &str) -> Result<String> {
    let mut zip = ZipArchive::new(File::open(path)?)?;
    let mut part = zip.by_name(entry)?;
    let mut out = String::new();
    part.read_to_string(&mut out)?;
    Ok(out)
}
