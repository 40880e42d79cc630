//! Annotation schemas.
//!
//! Each schema is a fixed, ordered list of fields. Records are one line,
//! fields separated by `;`, text fields wrapped in `"`. Because `;` and `'`
//! are structural in this format, text values never contain them: they are
//! rewritten to `,` and `|` before writing.

use crate::error::{EngineError, Result};
use memchr::memchr_iter;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Field separator of annotation lines.
pub const FIELD_DELIMITER: u8 = b';';

/// Quote wrapped around text fields.
pub const QUOTE: char = '"';

/// How a field is represented on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Quoted and sanitized.
    Text,
    /// Bare; empty or a decimal number.
    Numeric,
}

/// One column of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
    }
}

const fn numeric(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Numeric,
    }
}

const BLAST_FIELDS: &[FieldSpec] = &[
    text("seq_id"),
    text("nt_seq_id"),
    text("aa_seq_id"),
    numeric("hit_num"),
    numeric("hsp_num"),
    numeric("iteration_iter_num"),
    text("hit_id"),
    text("hit_def"),
    text("hit_accession"),
    numeric("hsp_evalue"),
    numeric("hsp_identity"),
    numeric("hsp_positive"),
    numeric("hsp_gaps"),
    numeric("hsp_align_len"),
];

const MERGER_FIELDS: &[FieldSpec] = &[
    text("seq_id"),
    text("nt_seq_id"),
    text("aa_seq_id"),
    numeric("hit_num"),
    numeric("hsp_num"),
    numeric("iteration_iter_num"),
    text("hit_id"),
    text("hit_def"),
    text("hit_accession"),
    numeric("hsp_evalue"),
    numeric("hsp_identity"),
    numeric("hsp_align_len"),
    text("algorithm"),
];

const INTERPRO_FIELDS: &[FieldSpec] = &[
    text("seq_id"),
    text("nt_seq_id"),
    text("aa_seq_id"),
    text("interpro_goterms"),
    text("panther_goterms"),
    text("metacyc_pathways"),
    text("reactome_pathways"),
];

const EMAPPER_FIELDS: &[FieldSpec] = &[
    text("seq_id"),
    text("nt_seq_id"),
    text("aa_seq_id"),
    text("seed_ortholog"),
    numeric("evalue"),
    numeric("score"),
    text("preferred_name"),
    text("go_terms"),
    text("ec"),
    text("kegg_ko"),
    text("kegg_pathway"),
    text("description"),
];

/// Closed set of annotation layouts the engine understands.
///
/// Selected once per operation; every record of a stream shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    /// Hits parsed from BLAST+ XML output.
    Blast,
    /// Merged hits from several alignment tools.
    Merger,
    /// InterProScan GO terms and pathways.
    Interpro,
    /// eggNOG-mapper functional annotation.
    Emapper,
}

impl SchemaType {
    pub const ALL: [SchemaType; 4] = [
        SchemaType::Blast,
        SchemaType::Merger,
        SchemaType::Interpro,
        SchemaType::Emapper,
    ];

    /// Ordered field list of this schema. The first field is the key.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            SchemaType::Blast => BLAST_FIELDS,
            SchemaType::Merger => MERGER_FIELDS,
            SchemaType::Interpro => INTERPRO_FIELDS,
            SchemaType::Emapper => EMAPPER_FIELDS,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    /// Position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// The fixed column header line.
    pub fn header_line(&self) -> String {
        let names: Vec<String> = self
            .fields()
            .iter()
            .map(|f| format!("{QUOTE}{}{QUOTE}", f.name))
            .collect();
        names.join(";")
    }

    /// Encode field values into one record line.
    ///
    /// Text values are sanitized and quoted; numeric values are written bare.
    pub fn encode<S: AsRef<str>>(&self, values: &[S]) -> Result<String> {
        let fields = self.fields();
        if values.len() != fields.len() {
            return Err(EngineError::Argument(format!(
                "{} records have {} fields, got {}",
                self,
                fields.len(),
                values.len()
            )));
        }

        let mut line = String::with_capacity(values.iter().map(|v| v.as_ref().len() + 3).sum());
        for (i, (spec, value)) in fields.iter().zip(values).enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER as char);
            }
            match spec.kind {
                FieldKind::Text => {
                    line.push(QUOTE);
                    line.push_str(&sanitize(value.as_ref()));
                    line.push(QUOTE);
                }
                FieldKind::Numeric => line.push_str(value.as_ref()),
            }
        }
        Ok(line)
    }

    /// Split one record line into unquoted field values.
    ///
    /// `record` is the 1-based ordinal used in diagnostics.
    pub fn decode(&self, line: &str, source_name: &str, record: usize) -> Result<Vec<String>> {
        let fields = self.fields();
        let bytes = line.as_bytes();

        let mut values = Vec::with_capacity(fields.len());
        let mut start = 0;
        for end in memchr_iter(FIELD_DELIMITER, bytes).chain(std::iter::once(bytes.len())) {
            values.push(&line[start..end]);
            start = end + 1;
        }

        if values.len() != fields.len() {
            return Err(EngineError::format(
                source_name,
                record,
                format!(
                    "expected {} fields for {} records, got {}",
                    fields.len(),
                    self,
                    values.len()
                ),
            ));
        }

        fields
            .iter()
            .zip(values)
            .map(|(spec, raw)| match spec.kind {
                FieldKind::Text => Ok(unquote(raw).to_string()),
                FieldKind::Numeric => {
                    let raw = raw.trim();
                    let finite = raw.parse::<f64>().map(f64::is_finite).unwrap_or(false);
                    if raw.is_empty() || finite {
                        Ok(raw.to_string())
                    } else {
                        Err(EngineError::format(
                            source_name,
                            record,
                            format!("field '{}' is not numeric: '{}'", spec.name, raw),
                        ))
                    }
                }
            })
            .collect()
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            SchemaType::Blast => "BLAST",
            SchemaType::Merger => "MERGER",
            SchemaType::Interpro => "INTERPRO",
            SchemaType::Emapper => "EMAPPER",
        };
        f.write_str(tag)
    }
}

impl FromStr for SchemaType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        SchemaType::ALL
            .into_iter()
            .find(|schema| schema.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                EngineError::Argument(format!(
                    "unknown annotation type '{}' (expected one of BLAST, MERGER, INTERPRO, EMAPPER)",
                    s
                ))
            })
    }
}

/// Replace the reserved characters `'` and `;` in a text value.
pub fn sanitize(value: &str) -> Cow<'_, str> {
    if value.contains(['\'', ';']) {
        Cow::Owned(value.replace('\'', "|").replace(';', ","))
    } else {
        Cow::Borrowed(value)
    }
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix(QUOTE)
        .and_then(|r| r.strip_suffix(QUOTE))
        .unwrap_or(raw)
}
