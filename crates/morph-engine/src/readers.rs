//! Format adapters
//!
//! Each supported input family is adapted onto one interface: a pull-based
//! reader of [`RawUnit`]s. A unit is one minimally parsed input record with
//! everything the ingester needs — a match key, canonical bytes for
//! fingerprinting, a generic raw view, and the shape of the IDR subtree to
//! build. Units own their data; nothing borrowed from the underlying
//! readers escapes here.

use crate::errors::Result;
use morph_format_edi::{Delimiters, SegmentReader};
use morph_format_flat::{ColumnSpec, DelimitedReader, FixedLengthReader};
use serde_json::{json, Value};
use std::io::Read;

/// Canonical separator between EDI element datas, per the fingerprint
/// contract.
pub const EDI_CANONICAL_SEP: u8 = 0x1f;

/// Subtree shape of one raw unit: a named child element with either a text
/// value or nested children.
#[derive(Debug, Clone)]
pub struct RawChild {
    pub name: String,
    pub text: Option<String>,
    pub children: Vec<RawChild>,
}

impl RawChild {
    /// Leaf child with a text value.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// Composite child.
    pub fn nested(name: impl Into<String>, children: Vec<RawChild>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children,
        }
    }
}

/// One minimally parsed input record, owned.
#[derive(Debug, Clone)]
pub struct RawUnit {
    /// Match key: the segment name for EDI, empty for flat formats (which
    /// match on `canonical` via declared patterns).
    pub name: String,
    /// Canonical bytes for fingerprinting and pattern matching.
    pub canonical: Vec<u8>,
    /// Generic raw view contributed to the output raw record.
    pub raw_value: Value,
    /// Child elements to build under the record's element node.
    pub children: Vec<RawChild>,
    /// Position for error decoration: line for flat inputs, segment ordinal
    /// for EDI.
    pub position: String,
}

/// Pull-based reader of raw units.
pub trait UnitReader {
    /// Next unit, `None` at end of input.
    fn next_unit(&mut self) -> Result<Option<RawUnit>>;

    /// Human-readable position of the most recent read.
    fn position(&self) -> String;

    /// Byte joining unit canonicals when a record spans several units.
    fn canonical_join(&self) -> u8;
}

/// EDI adapter over the raw-segment reader.
pub struct EdiUnitReader {
    inner: SegmentReader,
}

impl EdiUnitReader {
    /// Wrap `input` with the schema's delimiter set.
    pub fn new(input: impl Read + 'static, delims: Delimiters) -> Self {
        Self {
            inner: SegmentReader::new(input, delims),
        }
    }
}

impl UnitReader for EdiUnitReader {
    fn next_unit(&mut self) -> Result<Option<RawUnit>> {
        // Copy everything out of the borrowed segment view before touching
        // the reader again; its slices die on the next read.
        let (name, canonical, elems_view, children) = match self.inner.read()? {
            None => return Ok(None),
            Some(seg) => {
                let name = seg.name().to_string();
                let mut canonical = Vec::with_capacity(seg.raw().len());
                let mut elems_view = Vec::new();
                let mut children: Vec<RawChild> = Vec::new();

                for elem in seg.elems() {
                    if !canonical.is_empty() {
                        canonical.push(EDI_CANONICAL_SEP);
                    }
                    canonical.extend_from_slice(elem.data);
                    let data = String::from_utf8_lossy(elem.data).to_string();
                    elems_view.push(json!({
                        "element_index": elem.elem_index,
                        "component_index": elem.comp_index,
                        "data": data,
                    }));
                    if elem.elem_index == 0 {
                        continue; // the name slot is the element itself
                    }
                    let elem_name = format!("e{}", elem.elem_index);
                    if elem.comp_index == 1 {
                        children.push(RawChild::text(elem_name, data));
                    } else if let Some(parent) = children
                        .last_mut()
                        .filter(|c| c.name == elem_name)
                    {
                        // Components 2..N hang off the element opened by
                        // component 1.
                        if parent.children.is_empty() {
                            let first = parent.text.take().unwrap_or_default();
                            parent.children.push(RawChild::text("c1", first));
                        }
                        parent
                            .children
                            .push(RawChild::text(format!("c{}", elem.comp_index), data));
                    }
                }
                (name, canonical, elems_view, children)
            }
        };

        let position = format!(
            "segment {} (rune {}..{})",
            self.inner.segment_count(),
            self.inner.rune_begin(),
            self.inner.rune_end()
        );
        Ok(Some(RawUnit {
            name: name.clone(),
            canonical,
            raw_value: json!({"name": name, "elements": elems_view}),
            children,
            position,
        }))
    }

    fn position(&self) -> String {
        format!(
            "segment {} (rune {}..{})",
            self.inner.segment_count(),
            self.inner.rune_begin(),
            self.inner.rune_end()
        )
    }

    fn canonical_join(&self) -> u8 {
        EDI_CANONICAL_SEP
    }
}

fn row_to_unit(row: morph_format_flat::RowRecord) -> RawUnit {
    let mut view = serde_json::Map::new();
    let mut children = Vec::with_capacity(row.fields.len());
    for (name, value) in &row.fields {
        view.insert(name.clone(), Value::String(value.clone()));
        children.push(RawChild::text(name.clone(), value.clone()));
    }
    RawUnit {
        name: String::new(),
        canonical: row.raw,
        raw_value: Value::Object(view),
        children,
        position: format!("line {}", row.line),
    }
}

/// Fixed-length adapter.
pub struct FixedUnitReader {
    inner: FixedLengthReader,
}

impl FixedUnitReader {
    /// Wrap `input` with the schema's column specs.
    pub fn new(input: impl Read + 'static, columns: Vec<ColumnSpec>) -> Self {
        Self {
            inner: FixedLengthReader::new(input, columns),
        }
    }
}

impl UnitReader for FixedUnitReader {
    fn next_unit(&mut self) -> Result<Option<RawUnit>> {
        Ok(self.inner.next_record()?.map(row_to_unit))
    }

    fn position(&self) -> String {
        format!("line {}", self.inner.line())
    }

    fn canonical_join(&self) -> u8 {
        b'\n'
    }
}

/// Delimited (CSV-style) adapter.
pub struct DelimitedUnitReader {
    inner: DelimitedReader,
}

impl DelimitedUnitReader {
    /// Wrap `input`; see [`DelimitedReader::new`].
    pub fn new(
        input: impl Read + 'static,
        delimiter: u8,
        first_row_names: bool,
        columns: Vec<String>,
    ) -> Self {
        Self {
            inner: DelimitedReader::new(input, delimiter, first_row_names, columns),
        }
    }
}

impl UnitReader for DelimitedUnitReader {
    fn next_unit(&mut self) -> Result<Option<RawUnit>> {
        Ok(self.inner.next_record()?.map(row_to_unit))
    }

    fn position(&self) -> String {
        format!("line {}", self.inner.line())
    }

    fn canonical_join(&self) -> u8 {
        b'\n'
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_edi_unit_shape() {
        let delims = Delimiters::new("~", "*").with_component(":");
        let mut reader = EdiUnitReader::new(Cursor::new(b"CLM*A:B*9~".to_vec()), delims);
        let unit = reader.next_unit().unwrap().unwrap();

        assert_eq!(unit.name, "CLM");
        assert_eq!(unit.canonical, b"CLM\x1fA\x1fB\x1f9".to_vec());
        assert_eq!(unit.children.len(), 2);
        assert_eq!(unit.children[0].name, "e1");
        assert!(unit.children[0].text.is_none());
        let comps: Vec<&str> = unit.children[0]
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(comps, vec!["c1", "c2"]);
        assert_eq!(unit.children[1].name, "e2");
        assert_eq!(unit.children[1].text.as_deref(), Some("9"));
    }

    #[test]
    fn test_edi_repetitions_become_repeated_children() {
        let delims = Delimiters::new("~", "*").with_repetition("^");
        let mut reader = EdiUnitReader::new(Cursor::new(b"REF*A^B~".to_vec()), delims);
        let unit = reader.next_unit().unwrap().unwrap();
        let names: Vec<&str> = unit.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["e1", "e1"]);
        assert_eq!(unit.children[0].text.as_deref(), Some("A"));
        assert_eq!(unit.children[1].text.as_deref(), Some("B"));
    }

    #[test]
    fn test_fixed_unit() {
        let columns = vec![ColumnSpec::new("kind", 1, 1), ColumnSpec::new("val", 2, 4)];
        let mut reader = FixedUnitReader::new(Cursor::new(b"Habcd\n".to_vec()), columns);
        let unit = reader.next_unit().unwrap().unwrap();
        assert_eq!(unit.canonical, b"Habcd".to_vec());
        assert_eq!(unit.children[0].text.as_deref(), Some("H"));
        assert_eq!(unit.children[1].text.as_deref(), Some("abcd"));
        assert_eq!(unit.position, "line 1");
        assert!(reader.next_unit().unwrap().is_none());
    }

    #[test]
    fn test_delimited_unit() {
        let mut reader = DelimitedUnitReader::new(
            Cursor::new(b"name,age\nJohn,30\n".to_vec()),
            b',',
            true,
            Vec::new(),
        );
        let unit = reader.next_unit().unwrap().unwrap();
        assert_eq!(unit.raw_value["name"], "John");
        assert_eq!(unit.raw_value["age"], "30");
    }
}
