// CSV assembly for bracket exports.

/// Quote a field if it contains a comma, quote, or newline (RFC 4180).
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render one CSV line, without the trailing newline.
pub fn render_line(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a whole CSV document with CRLF line endings.
pub fn render_document(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&render_line(row));
        out.push_str("\r\n");
    }
    out
}

/// Download filename for a bracket export: `{tournament}_{bracket}.csv`.
pub fn export_filename(tournament_name: &str, bracket_name: &str) -> String {
    format!("{tournament_name}_{bracket_name}.csv")
}
