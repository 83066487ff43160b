use std::io::Read;
use std::path::Path;

use super::walker::DocFormat;
use super::IngestError;

pub fn extract_text(path: &Path, format: DocFormat) -> Result<String, IngestError> {
    match format {
        DocFormat::PlainText => extract_plain_text(path),
        DocFormat::Pdf => extract_pdf(path),
        DocFormat::Html => extract_html(path),
        DocFormat::Docx => extract_docx(path),
    }
}

fn extract_plain_text(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn extract_pdf(path: &Path) -> Result<String, IngestError> {
    pdf_extract::extract_text(path).map_err(|e| IngestError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn extract_html(path: &Path) -> Result<String, IngestError> {
    let html = extract_plain_text(path)?;
    Ok(strip_html(&html))
}

fn extract_docx(path: &Path) -> Result<String, IngestError> {
    let io_err = |source: std::io::Error| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parse_err = |reason: String| IngestError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let file = std::fs::File::open(path).map_err(io_err)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| parse_err(format!("not a DOCX archive: {}", e)))?;

    let mut xml_content = String::new();
    match archive.by_name("word/document.xml") {
        Ok(mut entry) => {
            entry
                .read_to_string(&mut xml_content)
                .map_err(|e| parse_err(format!("unreadable document.xml: {}", e)))?;
        }
        Err(_) => return Err(parse_err("no word/document.xml in archive".to_string())),
    }

    Ok(collect_text_runs(&xml_content))
}

/// Concatenate the bodies of the `<w:t>` text runs in a DOCX document
/// part. Runs never nest, so a single linear scan suffices.
fn collect_text_runs(xml: &str) -> String {
    const CLOSE: &str = "</w:t>";
    let mut texts: Vec<&str> = Vec::new();
    let mut rest = xml;

    while let Some(open) = rest.find("<w:t") {
        let after = &rest[open + 4..];
        // `<w:t>` or `<w:t attr...>`, not `<w:tbl>` and friends.
        if !matches!(after.as_bytes().first(), Some(b'>') | Some(b' ')) {
            rest = after;
            continue;
        }
        let Some(tag_end) = after.find('>') else { break };
        let body = &after[tag_end + 1..];
        // Self-closing runs carry no text.
        if after[..tag_end].ends_with('/') {
            rest = body;
            continue;
        }
        let Some(close) = body.find(CLOSE) else { break };
        if close > 0 {
            texts.push(&body[..close]);
        }
        rest = &body[close + CLOSE.len()..];
    }

    texts.join(" ")
}

/// Reduce an HTML page to its visible text: script/style subtrees are
/// dropped, remaining tags stripped, common entities decoded, and
/// whitespace collapsed.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        if let Some(skipped) = skip_element(after, "script").or_else(|| skip_element(after, "style"))
        {
            rest = skipped;
            continue;
        }
        // HTML comments
        if let Some(comment) = after.strip_prefix("!--") {
            rest = match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
            continue;
        }
        match after.find('>') {
            Some(close) => {
                let tag = &after[..close];
                // Block-level boundaries keep words apart after stripping.
                if !tag.is_empty() {
                    out.push(' ');
                }
                rest = &after[close + 1..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);

    let decoded = decode_entities(&out);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// If `after_lt` opens the named element, return the input past its
/// closing tag (or the empty remainder when unterminated).
fn skip_element<'a>(after_lt: &'a str, name: &str) -> Option<&'a str> {
    let lowered = after_lt.get(..name.len())?.to_lowercase();
    if lowered != name {
        return None;
    }
    let following = after_lt.as_bytes().get(name.len());
    if !matches!(following, Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n')) {
        return None;
    }
    let close = format!("</{}", name);
    match find_ascii_ci(after_lt, &close) {
        Some(pos) => {
            let tail = &after_lt[pos..];
            match tail.find('>') {
                Some(end) => Some(&tail[end + 1..]),
                None => Some(""),
            }
        }
        None => Some(""),
    }
}

/// Byte-wise case-insensitive search for an ASCII needle; the returned
/// offset is valid in the original string.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
