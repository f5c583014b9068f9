//! Casing transfer from a model string onto a target string.

/// Render `target` with the capitalization pattern of `model`.
///
/// Position `i` of the target is upper-cased iff the last model character
/// seen at or before `i` is upper case. Past the end of the model the last
/// flag carries forward; with an empty model everything is lower-cased.
pub fn apply_casing(model: &str, target: &str) -> String {
    let mut model = model.chars();
    let mut upper = false;
    let mut out = String::with_capacity(target.len());
    for c in target.chars() {
        if let Some(m) = model.next() {
            upper = m.is_uppercase();
        }
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
