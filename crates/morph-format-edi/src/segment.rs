//! Raw EDI segment reader
//!
//! Breaks scanner tokens into `(element_index, component_index, data)`
//! triples according to the configured delimiter set. No structural or
//! hierarchical validation happens here; the reader hands out whatever the
//! input contains.
//!
//! The reader maintains a reusable segment buffer: everything returned by
//! [`SegmentReader::read`] is invalidated by the next call.

use crate::scanner::{CrLfStrippingReader, DelimScanner};
use crate::{Error, Result};
use std::io::Read;
use std::ops::Range;
use tracing::trace;

/// Delimiter configuration for one EDI input, as declared by the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    /// Segment delimiter (required, possibly multi-byte).
    pub segment: Vec<u8>,
    /// Element delimiter (required, possibly multi-byte).
    pub element: Vec<u8>,
    /// Component delimiter; absent means elements have a single component.
    pub component: Option<Vec<u8>>,
    /// Repetition delimiter; absent means elements do not repeat.
    pub repetition: Option<Vec<u8>>,
    /// Release byte escaping the byte after it, itself included.
    pub release: Option<u8>,
    /// Strip all CR and LF bytes from the input before scanning.
    pub ignore_crlf: bool,
}

impl Delimiters {
    /// X12-style defaults: `~` segments, `*` elements.
    pub fn new(segment: impl Into<Vec<u8>>, element: impl Into<Vec<u8>>) -> Self {
        Self {
            segment: segment.into(),
            element: element.into(),
            component: None,
            repetition: None,
            release: None,
            ignore_crlf: false,
        }
    }

    /// Set the component delimiter.
    pub fn with_component(mut self, component: impl Into<Vec<u8>>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set the repetition delimiter.
    pub fn with_repetition(mut self, repetition: impl Into<Vec<u8>>) -> Self {
        self.repetition = Some(repetition.into());
        self
    }

    /// Set the release byte.
    pub fn with_release(mut self, release: u8) -> Self {
        self.release = Some(release);
        self
    }

    /// Strip CR/LF before scanning.
    pub fn with_ignore_crlf(mut self, ignore: bool) -> Self {
        self.ignore_crlf = ignore;
        self
    }
}

#[derive(Debug, Clone)]
struct ElemSpan {
    elem_index: usize,
    comp_index: usize,
    range: Range<usize>,
}

/// One element (or component / repetition value) of a raw segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawElem<'a> {
    /// 1-based element index; 0 is the segment-name slot.
    pub elem_index: usize,
    /// 1-based component index within the element.
    pub comp_index: usize,
    /// Element data, not unescaped. Borrow into the reader's buffer.
    pub data: &'a [u8],
}

/// Borrowed view of the most recently read segment.
///
/// All slices point into the reader's reusable buffer and become invalid on
/// the next `read` call; copy out anything that must outlive it.
#[derive(Debug)]
pub struct RawSeg<'a> {
    name: &'a str,
    token: &'a [u8],
    elems: &'a [ElemSpan],
}

impl<'a> RawSeg<'a> {
    /// Segment name (the element at index 0).
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The raw token bytes of the whole segment, delimiter excluded.
    pub fn raw(&self) -> &'a [u8] {
        self.token
    }

    /// Elements in order, the name slot first.
    pub fn elems(&self) -> impl Iterator<Item = RawElem<'a>> + '_ {
        self.elems.iter().map(|span| RawElem {
            elem_index: span.elem_index,
            comp_index: span.comp_index,
            data: &self.token[span.range.clone()],
        })
    }

    /// Number of element entries, the name slot included.
    pub fn elem_count(&self) -> usize {
        self.elems.len()
    }
}

/// Streaming raw-segment reader.
pub struct SegmentReader {
    scanner: DelimScanner<Box<dyn Read>>,
    delims: Delimiters,
    rune_begin: usize,
    rune_end: usize,
    seg_count: usize,
    token: Vec<u8>,
    elems: Vec<ElemSpan>,
    name: String,
}

impl SegmentReader {
    /// Create a reader over `input` with the given delimiter set.
    pub fn new(input: impl Read + 'static, delims: Delimiters) -> Self {
        let stream: Box<dyn Read> = if delims.ignore_crlf {
            Box::new(CrLfStrippingReader::new(input))
        } else {
            Box::new(input)
        };
        let scanner = DelimScanner::new(stream, delims.segment.clone(), delims.release);
        Self {
            scanner,
            delims,
            rune_begin: 1,
            rune_end: 1,
            seg_count: 0,
            token: Vec::new(),
            elems: Vec::new(),
            name: String::new(),
        }
    }

    /// Read the next raw segment. `None` at end of input.
    ///
    /// Tokens consisting solely of CR and/or LF bytes are skipped, which
    /// tolerates trailing blank lines in otherwise well-formed inputs.
    pub fn read(&mut self) -> Result<Option<RawSeg<'_>>> {
        self.token.clear();
        loop {
            let Some(token) = self.scanner.next_token()? else {
                return Ok(None);
            };
            let (count, only_crlf) = rune_count_and_only_crlf(token);
            self.rune_begin = self.rune_end;
            self.rune_end += count;
            if only_crlf {
                continue;
            }
            self.token.extend_from_slice(token);
            break;
        }
        self.seg_count += 1;
        self.split_token()?;
        self.name.clear();
        let name_span = &self.elems[0];
        self.name.push_str(&String::from_utf8_lossy(
            &self.token[name_span.range.clone()],
        ));
        trace!(segment = %self.name, elems = self.elems.len(), "read raw segment");
        Ok(Some(RawSeg {
            name: &self.name,
            token: &self.token,
            elems: &self.elems,
        }))
    }

    fn split_token(&mut self) -> Result<()> {
        self.elems.clear();
        let mut end = self.token.len();
        // Some inputs use a bare '\n' segment delimiter but carry a stray
        // '\r' as well; drop it.
        if self.delims.segment == b"\n" && self.token.ends_with(b"\r") {
            end -= 1;
        }

        let release = self.delims.release;
        let elem_delim = self.delims.element.clone();
        let rep_delim = self.delims.repetition.clone();
        let comp_delim = self.delims.component.clone();

        for (i, elem_range) in split_with_esc(&self.token[..end], &elem_delim, release)
            .into_iter()
            .enumerate()
        {
            // An element holding repetition delimiters is a concatenation of
            // several element values.
            let rep_ranges: Vec<Range<usize>> = match &rep_delim {
                Some(rd) => split_with_esc(&self.token[elem_range.clone()], rd, release)
                    .into_iter()
                    .map(|r| shift(r, elem_range.start))
                    .collect(),
                None => vec![elem_range.clone()],
            };
            for rep_range in rep_ranges {
                match &comp_delim {
                    None => self.elems.push(ElemSpan {
                        elem_index: i,
                        comp_index: 1,
                        range: rep_range,
                    }),
                    Some(cd) => {
                        for (j, comp_range) in
                            split_with_esc(&self.token[rep_range.clone()], cd, release)
                                .into_iter()
                                .enumerate()
                        {
                            self.elems.push(ElemSpan {
                                elem_index: i,
                                comp_index: j + 1,
                                range: shift(comp_range, rep_range.start),
                            });
                        }
                    }
                }
            }
        }

        if self.elems.is_empty() || self.elems[0].range.is_empty() {
            return Err(Error::invalid_edi(
                self.rune_begin,
                self.rune_end,
                "missing segment name",
            ));
        }
        Ok(())
    }

    /// Beginning rune position of the current segment, 1-based.
    pub fn rune_begin(&self) -> usize {
        self.rune_begin
    }

    /// Ending rune position of the current segment, 1-based.
    pub fn rune_end(&self) -> usize {
        self.rune_end
    }

    /// Number of segments read so far.
    pub fn segment_count(&self) -> usize {
        self.seg_count
    }
}

fn shift(r: Range<usize>, by: usize) -> Range<usize> {
    r.start + by..r.end + by
}

/// Split `data` on `delim`, honoring the release byte. Returns ranges into
/// `data`; escape sequences are left in place.
fn split_with_esc(data: &[u8], delim: &[u8], release: Option<u8>) -> Vec<Range<usize>> {
    if delim.is_empty() {
        return vec![0..data.len()];
    }
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        if Some(data[i]) == release {
            i += 2;
            continue;
        }
        if data[i..].starts_with(delim) {
            out.push(start..i);
            i += delim.len();
            start = i;
            continue;
        }
        i += 1;
    }
    out.push(start..data.len());
    out
}

/// Expand release sequences in `data`: the byte after each release byte is
/// kept literally, the release byte itself is dropped.
pub fn unescape(data: &[u8], release: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == release {
            if let Some(&next) = data.get(i + 1) {
                out.push(next);
            }
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

fn rune_count_and_only_crlf(bytes: &[u8]) -> (usize, bool) {
    let text = String::from_utf8_lossy(bytes);
    let mut count = 0;
    let mut only_crlf = true;
    for ch in text.chars() {
        if ch != '\r' && ch != '\n' {
            only_crlf = false;
        }
        count += 1;
    }
    (count, only_crlf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(input: &str, delims: Delimiters) -> SegmentReader {
        SegmentReader::new(Cursor::new(input.as_bytes().to_vec()), delims)
    }

    fn collect_elems(seg: &RawSeg<'_>) -> Vec<(usize, usize, String)> {
        seg.elems()
            .map(|e| {
                (
                    e.elem_index,
                    e.comp_index,
                    String::from_utf8_lossy(e.data).to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_single_delimited_segment() {
        let mut r = reader("ISA*00*x~", Delimiters::new("~", "*"));
        let seg = r.read().unwrap().unwrap();
        assert_eq!(seg.name(), "ISA");
        assert_eq!(
            collect_elems(&seg),
            vec![
                (0, 1, "ISA".to_string()),
                (1, 1, "00".to_string()),
                (2, 1, "x".to_string()),
            ]
        );
        assert!(r.read().unwrap().is_none());
    }

    #[test]
    fn test_release_escape_keeps_element_whole() {
        let mut r = reader("NM1*AB?*CD~", Delimiters::new("~", "*").with_release(b'?'));
        let seg = r.read().unwrap().unwrap();
        assert_eq!(
            collect_elems(&seg),
            vec![(0, 1, "NM1".to_string()), (1, 1, "AB?*CD".to_string())]
        );
    }

    #[test]
    fn test_repetition_then_component() {
        let delims = Delimiters::new("~", "*")
            .with_repetition("^")
            .with_component(":");
        let mut r = reader("REF*A^B:1*Z~", delims);
        let seg = r.read().unwrap().unwrap();
        assert_eq!(
            collect_elems(&seg),
            vec![
                (0, 1, "REF".to_string()),
                (1, 1, "A".to_string()),
                (1, 1, "B".to_string()),
                (1, 2, "1".to_string()),
                (2, 1, "Z".to_string()),
            ]
        );
    }

    #[test]
    fn test_trailing_crlf_tolerated() {
        let mut r = reader("ISA*1~\r\n", Delimiters::new("~", "*"));
        let seg = r.read().unwrap().unwrap();
        assert_eq!(seg.name(), "ISA");
        assert!(r.read().unwrap().is_none());
        assert_eq!(r.segment_count(), 1);
    }

    #[test]
    fn test_crlf_only_token_between_segments_skipped() {
        let mut r = reader("AAA*1~\r\n~BBB*2~", Delimiters::new("~", "*"));
        assert_eq!(r.read().unwrap().unwrap().name(), "AAA");
        let seg = r.read().unwrap().unwrap();
        assert_eq!(seg.name(), "BBB");
        assert_eq!(r.segment_count(), 2);
    }

    #[test]
    fn test_lf_delimiter_drops_stray_cr() {
        let mut r = reader("SEG*a\r\nSEG*b\n", Delimiters::new("\n", "*"));
        let seg = r.read().unwrap().unwrap();
        assert_eq!(
            collect_elems(&seg),
            vec![(0, 1, "SEG".to_string()), (1, 1, "a".to_string())]
        );
        let seg = r.read().unwrap().unwrap();
        assert_eq!(
            collect_elems(&seg),
            vec![(0, 1, "SEG".to_string()), (1, 1, "b".to_string())]
        );
    }

    #[test]
    fn test_missing_segment_name_is_invalid() {
        let mut r = reader("*a*b~", Delimiters::new("~", "*"));
        let err = r.read().unwrap_err();
        assert!(matches!(err, Error::InvalidEdi { .. }));
        assert!(err.to_string().contains("missing segment name"));
    }

    #[test]
    fn test_component_split() {
        let mut r = reader(
            "CLM*A:B:C*9~",
            Delimiters::new("~", "*").with_component(":"),
        );
        let seg = r.read().unwrap().unwrap();
        assert_eq!(
            collect_elems(&seg),
            vec![
                (0, 1, "CLM".to_string()),
                (1, 1, "A".to_string()),
                (1, 2, "B".to_string()),
                (1, 3, "C".to_string()),
                (2, 1, "9".to_string()),
            ]
        );
    }

    #[test]
    fn test_rune_positions_advance() {
        let mut r = reader("AAA*1~BB*2~", Delimiters::new("~", "*"));
        r.read().unwrap().unwrap();
        let (b1, e1) = (r.rune_begin(), r.rune_end());
        r.read().unwrap().unwrap();
        let (b2, e2) = (r.rune_begin(), r.rune_end());
        assert!(e1 > b1);
        assert_eq!(b2, e1);
        assert!(e2 > b2);
    }

    #[test]
    fn test_ignore_crlf_strips_before_scanning() {
        let delims = Delimiters::new("~", "*").with_ignore_crlf(true);
        let mut r = reader("IS\r\nA*0\n0~", delims);
        let seg = r.read().unwrap().unwrap();
        assert_eq!(seg.name(), "ISA");
        assert_eq!(
            collect_elems(&seg),
            vec![(0, 1, "ISA".to_string()), (1, 1, "00".to_string())]
        );
    }

    #[test]
    fn test_split_rejoin_roundtrip() {
        // Splitting then rejoining with the same delimiters reproduces the
        // original token bytes.
        let raw = "SEG*a?*b*c:d^e";
        let delims = Delimiters::new("~", "*")
            .with_component(":")
            .with_repetition("^")
            .with_release(b'?');
        let mut r = reader(&format!("{raw}~"), delims);
        let seg = r.read().unwrap().unwrap();
        assert_eq!(seg.raw(), raw.as_bytes());

        // Rebuild element text from the spans: every byte of the original
        // token is covered by exactly the delimiters plus element datas.
        let rebuilt: Vec<String> = seg
            .elems()
            .map(|e| String::from_utf8_lossy(e.data).to_string())
            .collect();
        assert_eq!(rebuilt, vec!["SEG", "a?*b", "c", "d", "e"]);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(b"AB?*CD", b'?'), b"AB*CD".to_vec());
        assert_eq!(unescape(b"A??B", b'?'), b"A?B".to_vec());
        assert_eq!(unescape(b"plain", b'?'), b"plain".to_vec());
        assert_eq!(unescape(b"trailing?", b'?'), b"trailing".to_vec());
    }

    #[test]
    fn test_empty_elements_keep_indices() {
        let mut r = reader("NAD*BY**12~", Delimiters::new("~", "*"));
        let seg = r.read().unwrap().unwrap();
        assert_eq!(
            collect_elems(&seg),
            vec![
                (0, 1, "NAD".to_string()),
                (1, 1, "BY".to_string()),
                (2, 1, "".to_string()),
                (3, 1, "12".to_string()),
            ]
        );
    }
}
