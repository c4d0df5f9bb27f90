//! Built-in text extraction for office documents and PDFs.
//!
//! DOCX, PPTX and XLSX are zip archives of XML parts; only the parts that carry
//! visible text are read. PDFs go through `pdf-extract`.

use crate::extractor::DocumentConverter;
use crate::utils::extension_label;
use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::panic;
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

/// Default converter, needs no external tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfficeConverter;

impl DocumentConverter for OfficeConverter {
    fn convert(&self, path: &Path) -> Result<String> {
        match extension_label(path).as_str() {
            "pdf" => pdf_text(path),
            "docx" => docx_text(&mut open_archive(path)?),
            "pptx" => pptx_text(&mut open_archive(path)?),
            "xlsx" => xlsx_text(&mut open_archive(path)?),
            other => bail!("Unsupported document type: .{other}"),
        }
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Not a valid office archive: {}", path.display()))
}

fn pdf_text(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed files instead of returning an error.
    match panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(anyhow!("Failed to extract PDF text: {err}")),
        Err(_) => bail!("PDF parser panicked on {}", path.display()),
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("Failed to open part {name}")),
    };

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .with_context(|| format!("Failed to read part {name}"))?;
    Ok(Some(xml))
}

/// Parts named `{prefix}{n}.xml`, ordered by `n`.
fn numbered_parts<R: Read + Seek>(archive: &ZipArchive<R>, prefix: &str) -> Vec<(u32, String)> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(prefix)?.strip_suffix(".xml")?;
            Some((number.parse().ok()?, name.to_string()))
        })
        .collect();
    parts.sort();
    parts
}

fn docx_text<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let xml = read_part(archive, "word/document.xml")?
        .context("Archive has no word/document.xml")?;
    paragraph_text(&xml)
}

fn pptx_text<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let slides = numbered_parts(archive, "ppt/slides/slide");
    if slides.is_empty() {
        bail!("Archive has no slides");
    }

    let mut out = String::new();
    for (number, name) in slides {
        let Some(xml) = read_part(archive, &name)? else {
            continue;
        };
        debug!("Reading slide {number}");
        out.push_str(&format!("<!-- Slide number: {number} -->\n"));
        out.push_str(paragraph_text(&xml)?.trim_end());
        out.push_str("\n\n");
    }
    Ok(out)
}

/// Text of WordprocessingML / DrawingML: `t` runs, one line per `p`.
fn paragraph_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => out.push('\n'),
                b"tab" if in_run => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

fn xlsx_text<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let shared = match read_part(archive, "xl/sharedStrings.xml")? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };
    let names = match read_part(archive, "xl/workbook.xml")? {
        Some(xml) => sheet_names(&xml)?,
        None => Vec::new(),
    };

    let sheets = numbered_parts(archive, "xl/worksheets/sheet");
    if sheets.is_empty() {
        bail!("Archive has no worksheets");
    }

    let mut out = String::new();
    for (index, (number, part)) in sheets.into_iter().enumerate() {
        let Some(xml) = read_part(archive, &part)? else {
            continue;
        };
        let name = names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{number}"));

        out.push_str(&format!("## {name}\n"));
        let rows = sheet_rows(&xml, &shared)
            .with_context(|| format!("Failed to read worksheet {part}"))?;
        out.push_str(&markdown_table(&rows));
        out.push('\n');
    }
    Ok(out)
}

fn shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic hints (`rPh`) repeat the text in another script.
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text && !in_phonetic => current.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

fn sheet_names(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut names = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if let Some(name) = attribute(&e, "name")? {
                    names.push(name);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(names)
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    match e.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Last column a worksheet may have (`XFD`).
const MAX_COLUMN: usize = 16_383;

/// Zero-based column of a cell reference such as `B3`, `None` when the
/// reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>> {
    let mut number = 0usize;
    for b in reference.bytes().take_while(u8::is_ascii_alphabetic) {
        let digit = usize::from(b.to_ascii_uppercase() - b'A' + 1);
        number = number
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .filter(|n| *n <= MAX_COLUMN + 1)
            .with_context(|| format!("Cell reference out of range: {reference}"))?;
    }
    Ok(number.checked_sub(1))
}

fn cell_column(e: &BytesStart<'_>, current: usize) -> Result<usize> {
    match attribute(e, "r")? {
        Some(reference) => Ok(column_index(&reference)?.unwrap_or(current)),
        None => Ok(current),
    }
}

fn sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut column = 0usize;
    let mut cell_type: Option<String> = None;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    column = cell_column(&e, column)?;
                    cell_type = attribute(&e, "t")?;
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                column = cell_column(&e, column)? + 1;
            }
            Event::Text(t) if in_value => value.push_str(&t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if column > MAX_COLUMN {
                        bail!("Row has more than {} columns", MAX_COLUMN + 1);
                    }
                    let text = cell_text(cell_type.as_deref(), &value, shared);
                    if row.len() <= column {
                        row.resize(column + 1, String::new());
                    }
                    row[column] = text;
                    column += 1;
                }
                b"row" => {
                    rows.push(std::mem::take(&mut row));
                    column = 0;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows)
}

fn cell_text(cell_type: Option<&str>, value: &str, shared: &[String]) -> String {
    match cell_type {
        Some("s") => value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .cloned()
            .unwrap_or_default(),
        Some("b") => match value.trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        _ => value.to_string(),
    }
}

fn markdown_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|c| {
                row.get(c)
                    .map(|v| v.replace('|', "\\|").replace('\n', " "))
                    .unwrap_or_default()
            })
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
        if i == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract_file;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn archive(parts: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        let cursor = zip.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:pPr><w:tabs><w:tab w:val="left"/></w:tabs></w:pPr>
              <w:r><w:t>Hello</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve">world &amp; co</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let mut docx = archive(&[("word/document.xml", xml)]);

        assert_eq!(docx_text(&mut docx).unwrap(), "Hello\tworld & co\nSecond\n");
    }

    #[test]
    fn docx_without_body_is_an_error() {
        let mut docx = archive(&[("other.xml", "<x/>")]);
        assert!(docx_text(&mut docx).is_err());
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let slide = |text: &str| {
            format!(r#"<p:sld xmlns:a="a" xmlns:p="p"><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:sld>"#)
        };
        let s1 = slide("first");
        let s2 = slide("second");
        let s10 = slide("tenth");
        let mut pptx = archive(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
            ("ppt/slides/_rels/slide1.xml.rels", "<r/>"),
        ]);

        let text = pptx_text(&mut pptx).unwrap();
        assert_eq!(
            text,
            "<!-- Slide number: 1 -->\nfirst\n\n\
             <!-- Slide number: 2 -->\nsecond\n\n\
             <!-- Slide number: 10 -->\ntenth\n\n"
        );
    }

    #[test]
    fn xlsx_sheets_become_tables() {
        let workbook = r#"<workbook><sheets>
            <sheet name="Prices" sheetId="1"/>
        </sheets></workbook>"#;
        let strings = r#"<sst><si><t>item</t></si><si><t>cost</t></si><si><r><t>ap</t></r><r><t>ple</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
            <row r="2"><c r="A2" t="s"><v>2</v></c><c r="C2"><v>3.5</v></c></row>
            <row r="3"><c r="A3" t="inlineStr"><is><t>a|b</t></is></c><c r="B3" t="b"><v>1</v></c></row>
        </sheetData></worksheet>"#;
        let mut xlsx = archive(&[
            ("xl/workbook.xml", workbook),
            ("xl/sharedStrings.xml", strings),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        let text = xlsx_text(&mut xlsx).unwrap();
        assert_eq!(
            text,
            "## Prices\n\
             | item | cost |  |\n\
             | --- | --- | --- |\n\
             | apple |  | 3.5 |\n\
             | a\\|b | TRUE |  |\n\n"
        );
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("Z9").unwrap(), Some(25));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("xfd7").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
    }

    #[test]
    fn column_past_xfd_is_an_error() {
        assert!(column_index("XFE1").is_err());
        assert!(column_index("ZZZZZZZ1").is_err());
        assert!(column_index("ZZZZZZZZZZZZZZ1").is_err());
    }

    #[test]
    fn oversized_cell_reference_fails_the_sheet() {
        let workbook = r#"<workbook><sheets><sheet name="S"/></sheets></workbook>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="ZZZZZZZZZZZZZZ1"><v>1</v></c></row>
        </sheetData></worksheet>"#;
        let mut xlsx = archive(&[
            ("xl/workbook.xml", workbook),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        let err = xlsx_text(&mut xlsx).unwrap_err();
        assert!(format!("{err:#}").contains("out of range"));
    }

    #[test]
    fn unaddressed_cells_past_the_last_column_fail_the_sheet() {
        let workbook = r#"<workbook><sheets><sheet name="S"/></sheets></workbook>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="XFD1"><v>1</v></c><c><v>2</v></c></row>
        </sheetData></worksheet>"#;
        let mut xlsx = archive(&[
            ("xl/workbook.xml", workbook),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        assert!(xlsx_text(&mut xlsx).is_err());
    }

    #[test]
    fn bad_workbook_is_dropped_and_the_run_goes_on() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="ZZZZZZZ1"><v>1</v></c></row>
        </sheetData></worksheet>"#;
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in [
            ("xl/workbook.xml", r#"<workbook><sheets><sheet name="S"/></sheets></workbook>"#),
            ("xl/worksheets/sheet1.xml", sheet),
        ] {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();
        std::fs::write(root.join("huge.xlsx"), bytes).unwrap();

        assert!(extract_file(&root.join("huge.xlsx"), root, &OfficeConverter).is_none());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = OfficeConverter.convert(Path::new("notes.odt")).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();

        assert!(OfficeConverter.convert(&path).is_err());
    }
}
