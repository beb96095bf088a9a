//! Translation of builder clauses into document-store filters.

use crate::db::document::{
    ID_FIELD, OBJECT_ID_FIELD, field_value_to_bson, id_to_bson, id_value_to_bson, json_to_bson,
};
use crate::error::{DbError, DbResult};
use crate::models::FieldValue;
use crate::orm::builder::{Clause, SortDirection};
use mongodb::bson::{Bson, Document, doc};
use serde_json::Value as JsonValue;

fn document_field(field: &str) -> &str {
    if field == ID_FIELD { OBJECT_ID_FIELD } else { field }
}

fn to_bson(field: &str, value: &JsonValue) -> DbResult<Bson> {
    if field == ID_FIELD {
        id_to_bson(value)
    } else {
        json_to_bson(value)
    }
}

fn value_to_bson(field: &str, value: &FieldValue) -> DbResult<Bson> {
    if field == ID_FIELD {
        id_value_to_bson(value)
    } else {
        field_value_to_bson(value)
    }
}

fn list_to_bson(clause: &Clause) -> DbResult<Bson> {
    match clause.value.to_json() {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| to_bson(&clause.field, item))
            .collect::<DbResult<Vec<Bson>>>()
            .map(Bson::Array),
        other => Err(DbError::invalid_input(format!(
            "{} expects an array, got {}",
            clause.operator, other
        ))),
    }
}

/// Convert a SQL `LIKE` pattern to an anchored regular expression.
pub fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push('$');
    regex
}

fn like_pattern(clause: &Clause) -> DbResult<String> {
    match &clause.value {
        FieldValue::Text(s) => Ok(like_to_regex(s)),
        other => Err(DbError::invalid_input(format!(
            "{} expects a text pattern, got {}",
            clause.operator,
            other.type_name()
        ))),
    }
}

fn condition(clause: &Clause) -> DbResult<Bson> {
    let value = || value_to_bson(&clause.field, &clause.value);

    let condition = match clause.operator.trim().to_ascii_uppercase().as_str() {
        "=" | "==" => value()?,
        "!=" | "<>" => Bson::Document(doc! { "$ne": value()? }),
        ">" => Bson::Document(doc! { "$gt": value()? }),
        ">=" => Bson::Document(doc! { "$gte": value()? }),
        "<" => Bson::Document(doc! { "$lt": value()? }),
        "<=" => Bson::Document(doc! { "$lte": value()? }),
        "LIKE" => Bson::Document(doc! { "$regex": like_pattern(clause)? }),
        "ILIKE" => Bson::Document(doc! { "$regex": like_pattern(clause)?, "$options": "i" }),
        "IN" => Bson::Document(doc! { "$in": list_to_bson(clause)? }),
        "NOT IN" => Bson::Document(doc! { "$nin": list_to_bson(clause)? }),
        _ => {
            return Err(DbError::unsupported(
                format!("operator '{}'", clause.operator),
                "document",
            ));
        }
    };
    Ok(condition)
}

/// Build the filter for AND-combined clauses.
///
/// Clauses on distinct fields merge into one document. When a field repeats,
/// every clause becomes its own `$and` term so none overwrites another.
pub fn to_document_filter(clauses: &[Clause]) -> DbResult<Document> {
    let mut terms: Vec<(String, Bson)> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        terms.push((document_field(&clause.field).to_string(), condition(clause)?));
    }

    let repeats = terms
        .iter()
        .enumerate()
        .any(|(i, (field, _))| terms[..i].iter().any(|(f, _)| f == field));

    if repeats {
        let all: Vec<Bson> = terms
            .into_iter()
            .map(|(field, cond)| {
                let mut term = Document::new();
                term.insert(field, cond);
                Bson::Document(term)
            })
            .collect();
        Ok(doc! { "$and": all })
    } else {
        Ok(terms.into_iter().collect())
    }
}

/// Sort document for a single ordering clause.
pub fn to_sort(field: &str, direction: SortDirection) -> Document {
    let order = match direction {
        SortDirection::Asc => 1,
        SortDirection::Desc => -1,
    };
    let mut sort = Document::new();
    sort.insert(document_field(field), order);
    sort
}
