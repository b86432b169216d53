/*
 * This file is part of the Alfred Dashboard Gateway.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::tenant::dashboard::value::ParamValue;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

/// `{{ name }}` markers; whitespace inside the braces is tolerated.
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static regex")
});

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("Parâmetro '{0}' não foi informado")]
    MissingParam(String),
}

/// A positional prepared statement: the rewritten text plus the ordered
/// argument list. User values never appear in `text`; they only travel in
/// `args`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub args: Vec<ParamValue>,
}

/// Compiles a stored query template into a prepared statement.
///
/// Markers are replaced left to right with `$n` placeholders; repeated
/// names reuse one slot. Parameters present in the bundle but not
/// referenced by any marker are accepted and logged. After substitution,
/// every placeholder holding an array value has its `IN (…)` /
/// `NOT IN (…)` context rewritten to `= ANY(…)` / `<> ALL(…)` so the
/// driver can bind the array as a single positional parameter.
pub fn compile(
    template: &str,
    params: &BTreeMap<String, ParamValue>,
) -> Result<CompiledQuery, TemplateError> {
    let mut args: Vec<ParamValue> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut array_slots: Vec<usize> = Vec::new();

    let mut text = String::with_capacity(template.len());
    let mut last = 0;
    for captures in MARKER.captures_iter(template) {
        let marker = captures.get(0).expect("capture 0 always present");
        let name = &captures[1];

        let slot = match slots.get(name) {
            Some(slot) => *slot,
            None => {
                let value = params
                    .get(name)
                    .ok_or_else(|| TemplateError::MissingParam(name.to_string()))?;
                args.push(value.clone());
                let slot = args.len();
                slots.insert(name.to_string(), slot);
                if value.is_array() {
                    array_slots.push(slot);
                }
                slot
            }
        };

        text.push_str(&template[last..marker.start()]);
        text.push('$');
        text.push_str(&slot.to_string());
        last = marker.end();
    }
    text.push_str(&template[last..]);

    for name in params.keys() {
        if !slots.contains_key(name) {
            warn!("Parameter {name} is not referenced by the query template");
        }
    }

    for slot in array_slots {
        text = rewrite_array_operators(&text, slot);
    }

    Ok(CompiledQuery { text, args })
}

/// Rewrites `IN ( $k [::cast] )` to `= ANY($k[::cast])` and
/// `NOT IN ( $k [::cast] )` to `<> ALL($k[::cast])` for one placeholder,
/// case-insensitively, preserving any cast suffix verbatim. Applying the
/// rewrite twice yields the same text: the produced forms no longer match
/// the pattern.
fn rewrite_array_operators(text: &str, slot: usize) -> String {
    let pattern = format!(
        r"(?i)\b(not\s+)?in\s*\(\s*\${slot}(\s*::\s*[a-z0-9_\[\]]+)?\s*\)"
    );
    let Ok(regex) = Regex::new(&pattern) else {
        warn!("Could not build array rewrite pattern for slot {slot}");
        return text.to_string();
    };
    regex
        .replace_all(text, |captures: &regex::Captures| {
            let cast = captures.get(2).map(|m| m.as_str()).unwrap_or("");
            if captures.get(1).is_some() {
                format!("<> ALL(${slot}{cast})")
            } else {
                format!("= ANY(${slot}{cast})")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params_of(entries: Vec<(&str, ParamValue)>) -> BTreeMap<String, ParamValue> {
        entries
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn markers_become_positional_placeholders() {
        let params = params_of(vec![
            ("inicio", ParamValue::Text("2025-01-01".to_string())),
            ("fim", ParamValue::Text("2025-01-31".to_string())),
        ]);

        let compiled = compile(
            "SELECT * FROM vendas WHERE data >= {{inicio}} AND data <= {{ fim }}",
            &params,
        )
        .unwrap();

        assert_eq!(
            compiled.text,
            "SELECT * FROM vendas WHERE data >= $1 AND data <= $2"
        );
        assert_eq!(compiled.args.len(), 2);
    }

    #[test]
    fn repeated_markers_share_one_slot() {
        let params = params_of(vec![("dia", ParamValue::Text("2025-01-01".to_string()))]);

        let compiled = compile(
            "SELECT * FROM a WHERE inicio = {{dia}} OR fim = {{dia}}",
            &params,
        )
        .unwrap();

        assert_eq!(compiled.text, "SELECT * FROM a WHERE inicio = $1 OR fim = $1");
        assert_eq!(compiled.args.len(), 1);
    }

    #[test]
    fn missing_parameter_fails_with_the_exact_message() {
        let error = compile("SELECT {{faltando}}", &BTreeMap::new()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Parâmetro 'faltando' não foi informado"
        );
    }

    #[test]
    fn string_values_never_reach_the_text() {
        let injection = "'; DROP TABLE x;--";
        let params = params_of(vec![("nome", ParamValue::Text(injection.to_string()))]);

        let compiled = compile("SELECT * FROM c WHERE nome = {{nome}}", &params).unwrap();

        assert!(!compiled.text.contains(injection));
        assert!(!compiled.text.contains("DROP"));
        assert_eq!(
            compiled.args,
            vec![ParamValue::Text(injection.to_string())]
        );
    }

    #[test]
    fn array_in_rewrite() {
        let params = params_of(vec![(
            "statuses",
            ParamValue::TextArray(vec!["a".to_string(), "b".to_string()]),
        )]);

        let compiled = compile(
            "SELECT * FROM r WHERE status IN ({{statuses}})",
            &params,
        )
        .unwrap();

        assert_eq!(compiled.text, "SELECT * FROM r WHERE status = ANY($1)");
        assert_eq!(
            compiled.args,
            vec![ParamValue::TextArray(vec!["a".to_string(), "b".to_string()])]
        );
    }

    #[test]
    fn array_not_in_rewrite_preserves_cast() {
        let params = params_of(vec![("ids", ParamValue::IntArray(vec![1, 2]))]);

        let compiled = compile(
            "SELECT * FROM reservas WHERE quarto_id NOT IN ({{ids}}::int[])",
            &params,
        )
        .unwrap();

        assert_eq!(
            compiled.text,
            "SELECT * FROM reservas WHERE quarto_id <> ALL($1::int[])"
        );
        assert_eq!(compiled.args, vec![ParamValue::IntArray(vec![1, 2])]);
    }

    #[test]
    fn rewrite_is_case_insensitive_and_whitespace_tolerant() {
        let params = params_of(vec![(
            "statuses",
            ParamValue::TextArray(vec!["a".to_string()]),
        )]);

        let compiled = compile(
            "select * from r where status not in (  {{statuses}}  )",
            &params,
        )
        .unwrap();

        assert_eq!(compiled.text, "select * from r where status <> ALL($1)");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_array_operators("WHERE a IN ($1) AND b NOT IN ($1::int[])", 1);
        let twice = rewrite_array_operators(&once, 1);
        assert_eq!(once, "WHERE a = ANY($1) AND b <> ALL($1::int[])");
        assert_eq!(once, twice);
    }

    #[test]
    fn scalar_placeholders_are_not_rewritten() {
        let params = params_of(vec![("id", ParamValue::Int(7))]);

        let compiled = compile("SELECT * FROM c WHERE id IN ({{id}})", &params).unwrap();

        assert_eq!(compiled.text, "SELECT * FROM c WHERE id IN ($1)");
    }

    #[test]
    fn higher_numbered_slots_do_not_clash_with_prefixes() {
        let text = "WHERE a IN ($1) AND b IN ($12)";
        assert_eq!(
            rewrite_array_operators(text, 1),
            "WHERE a = ANY($1) AND b IN ($12)"
        );
    }

    #[test]
    fn join_keyword_is_not_mistaken_for_in() {
        let params = params_of(vec![("ids", ParamValue::IntArray(vec![1]))]);

        let compiled = compile(
            "SELECT * FROM a JOIN ({{ids}}) x ON TRUE",
            &params,
        )
        .unwrap();

        assert_eq!(compiled.text, "SELECT * FROM a JOIN ($1) x ON TRUE");
    }

    #[test]
    fn unreferenced_parameters_are_accepted() {
        let params = params_of(vec![
            ("usado", ParamValue::Int(1)),
            ("sobrando", ParamValue::Int(2)),
        ]);

        let compiled = compile("SELECT {{usado}}", &params).unwrap();

        assert_eq!(compiled.args.len(), 1);
    }
}
