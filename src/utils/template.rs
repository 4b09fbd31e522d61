//! `{placeholder}` substitution for cursor URL templates

use crate::utils::error::SourceError;

/// Substitute `{name}` placeholders in `template` with `values`
///
/// `{{` and `}}` produce literal braces. Values that the template does not
/// reference are ignored; a placeholder without a value is an error.
pub fn format_template(template: &str, values: &[(&str, &str)]) -> Result<String, SourceError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let rest = &template[i + 1..];
                let end = rest.find('}').ok_or_else(|| {
                    SourceError::Template(format!("unclosed placeholder in {template:?}"))
                })?;
                let name = &rest[..end];
                let value = values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        SourceError::Template(format!("no value for placeholder {{{name}}}"))
                    })?;
                out.push_str(value);
                let closing = i + 1 + end;
                while chars.next_if(|(j, _)| *j <= closing).is_some() {}
            }
            '}' => {
                return Err(SourceError::Template(format!(
                    "single '}}' in {template:?}"
                )));
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
