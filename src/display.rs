//! Terminal grid for a single movie row.

use crate::models::SheetRow;

/// Renders a header line and one value line as a box-drawn grid. Cells may
/// span several lines; every cell is centered in its column.
pub fn render_table(headers: &[&str], values: &[&str]) -> String {
    let columns = headers.len().max(values.len());
    let cell = |list: &[&str], idx: usize| -> Vec<String> {
        list.get(idx)
            .copied()
            .unwrap_or_default()
            .split('\n')
            .map(str::to_string)
            .collect()
    };
    let header_cells: Vec<Vec<String>> = (0..columns).map(|i| cell(headers, i)).collect();
    let value_cells: Vec<Vec<String>> = (0..columns).map(|i| cell(values, i)).collect();

    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            header_cells[i]
                .iter()
                .chain(value_cells[i].iter())
                .map(|l| l.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&border(&widths, '╒', '═', '╤', '╕'));
    push_row(&mut out, &header_cells, &widths);
    out.push_str(&border(&widths, '╞', '═', '╪', '╡'));
    push_row(&mut out, &value_cells, &widths);
    out.push_str(&border(&widths, '╘', '═', '╧', '╛'));
    out.truncate(out.trim_end_matches('\n').len());
    out
}

pub fn render_row(row: &SheetRow) -> String {
    let (headers, values): (Vec<&str>, Vec<&str>) = row.pairs().unzip();
    render_table(&headers, &values)
}

/// Row as logged after storing it: without the checkbox and the poster formula.
pub fn render_stored_row(row: &SheetRow) -> String {
    let (headers, values) = row.without(&["Watched?", "Movie Poster"]);
    render_table(&headers, &values)
}

fn border(widths: &[usize], left: char, fill: char, join: char, right: char) -> String {
    let mut line = String::new();
    line.push(left);
    for (i, w) in widths.iter().enumerate() {
        if i > 0 {
            line.push(join);
        }
        line.extend(std::iter::repeat(fill).take(w + 2));
    }
    line.push(right);
    line.push('\n');
    line
}

fn push_row(out: &mut String, cells: &[Vec<String>], widths: &[usize]) {
    let height = cells.iter().map(Vec::len).max().unwrap_or(1);
    for line_idx in 0..height {
        out.push('│');
        for (i, w) in widths.iter().enumerate() {
            let text = cells[i].get(line_idx).map(String::as_str).unwrap_or("");
            out.push(' ');
            out.push_str(&center(text, *w));
            out.push(' ');
            out.push('│');
        }
        out.push('\n');
    }
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let pad = width - len;
    let left = pad / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(pad - left))
}
